//! Integration tests for the game server over real TCP connections
//!
//! These tests start the server on an ephemeral port and talk to it the way a
//! game client does: read fixed-size frames, send text control tokens.

use server::config::ServerConfig;
use server::network::{Server, ServerHandle};
use server::spawn::IceTarget;
use shared::{
    ClientMessage, EnemyKind, FruitKind, Snapshot, Tile, FRAME_LEN, GRID_HEIGHT, GRID_WIDTH,
    PLAYER_SPAWN,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(2);

async fn start_server(max_clients: usize) -> (SocketAddr, ServerHandle) {
    let config = ServerConfig::new("127.0.0.1:0")
        .with_max_clients(max_clients)
        .with_send_timeout(Duration::from_millis(500))
        .with_rng_seed(Some(2024));
    let server = Server::bind(config).await.expect("Failed to bind server");
    let addr = server.local_addr().unwrap();
    let handle = server.handle();
    tokio::spawn(server.run());
    (addr, handle)
}

async fn read_frame(stream: &mut TcpStream) -> Snapshot {
    let mut frame = vec![0u8; FRAME_LEN];
    timeout(WAIT, stream.read_exact(&mut frame))
        .await
        .expect("Timed out waiting for a frame")
        .expect("Failed to read frame");
    Snapshot::decode(&frame).expect("Malformed frame")
}

/// Connects and consumes the initial frame.
async fn join(addr: SocketAddr) -> (TcpStream, Snapshot) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let frame = read_frame(&mut stream).await;
    (stream, frame)
}

async fn wait_for_count(handle: &ServerHandle, expected: usize) {
    for _ in 0..200 {
        if handle.connected_count().await == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("Expected {} connected clients", expected);
}

async fn newest_session(handle: &ServerHandle) -> u32 {
    handle
        .sessions()
        .await
        .iter()
        .map(|summary| summary.id)
        .max()
        .expect("No sessions")
}

async fn wait_for_bonus(handle: &ServerHandle, client_id: u32, bonus: bool) {
    for _ in 0..200 {
        if let Some(summary) = handle.session(client_id).await {
            if summary.phase.is_bonus() == bonus {
                return;
            }
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("Client {} never reached bonus = {}", client_id, bonus);
}

/// SESSION LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    /// A new connection receives the canonical starting grid
    #[tokio::test]
    async fn initial_frame_has_starting_layout() {
        let (addr, handle) = start_server(2).await;
        let (_stream, frame) = join(addr).await;

        let grid = frame.tiles().unwrap();
        assert_eq!(grid.count(Tile::Player), 1);
        assert_eq!(grid.get(PLAYER_SPAWN.0, PLAYER_SPAWN.1), Some(Tile::Player));
        assert_eq!(grid.get(0, 0), Some(Tile::Platform));
        assert_eq!(grid.get(11, 0), Some(Tile::BonusZone));
        assert_eq!((frame.enemy_count, frame.fruit_count, frame.score), (0, 0, 0));
        assert_eq!(frame.active_enemies().count(), 0);

        assert_eq!(handle.connected_count().await, 1);
    }

    /// Connections beyond capacity are closed without a frame
    #[tokio::test]
    async fn full_registry_closes_extra_connections() {
        let (addr, handle) = start_server(2).await;
        let (_first, _) = join(addr).await;
        let (_second, _) = join(addr).await;

        let mut extra = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 64];
        let result = timeout(WAIT, extra.read(&mut buf))
            .await
            .expect("Extra connection was left open");
        assert!(matches!(result, Ok(0) | Err(_)));
        assert_eq!(handle.connected_count().await, 2);
    }

    /// A closed connection frees its slot and a reconnect gets a new identity
    #[tokio::test]
    async fn disconnect_frees_slot() {
        let (addr, handle) = start_server(1).await;
        let (first, _) = join(addr).await;
        let first_id = newest_session(&handle).await;

        drop(first);
        wait_for_count(&handle, 0).await;

        let (_second, frame) = join(addr).await;
        let second_id = newest_session(&handle).await;
        assert!(second_id > first_id);
        assert_eq!(frame.enemy_count, 0);
    }

    /// Shutdown closes every live connection
    #[tokio::test]
    async fn shutdown_closes_clients() {
        let (addr, handle) = start_server(2).await;
        let (mut stream, _) = join(addr).await;

        handle.shutdown();

        let mut buf = [0u8; 64];
        let result = timeout(WAIT, stream.read(&mut buf))
            .await
            .expect("Connection stayed open after shutdown");
        assert!(matches!(result, Ok(0) | Err(_)));
        wait_for_count(&handle, 0).await;
    }
}

/// OPERATOR COMMAND TESTS
mod command_tests {
    use super::*;

    /// A Foca lands on a side column, standing on a platform or on the floor row
    #[tokio::test]
    async fn foca_spawn_reaches_client() {
        let (addr, handle) = start_server(2).await;
        let (mut stream, initial) = join(addr).await;
        let before = initial.tiles().unwrap();

        let report = handle
            .spawn_enemy_for_all_clients(EnemyKind::Foca, IceTarget::default())
            .await;
        assert_eq!(report.placed, 1);

        let frame = read_frame(&mut stream).await;
        assert_eq!(frame.enemy_count, 1);
        let foca = frame.enemies[0];
        assert!(foca.is_active());
        assert_eq!(foca.kind, EnemyKind::Foca as i32);
        assert!(foca.x == 1 || foca.x == GRID_WIDTH as i32 - 2);

        let floor = GRID_HEIGHT as i32 - 2;
        if foca.y != floor {
            assert_eq!(before.get(foca.x, foca.y), Some(Tile::Empty));
            assert_eq!(before.get(foca.x, foca.y + 1), Some(Tile::Platform));
        }
        assert_eq!(frame.tiles().unwrap().get(foca.x, foca.y), Some(Tile::EnemyFoca));
    }

    /// Entities are reported once and then drained
    #[tokio::test]
    async fn frames_carry_only_new_entities() {
        let (addr, handle) = start_server(2).await;
        let (mut stream, _) = join(addr).await;

        handle
            .spawn_enemy_for_all_clients(EnemyKind::Bird, IceTarget::default())
            .await;
        let first = read_frame(&mut stream).await;
        assert_eq!(first.enemy_count, 1);
        assert_eq!(first.enemies[0].y, GRID_HEIGHT as i32 - 2);

        handle.clear_all_enemies().await;
        let second = read_frame(&mut stream).await;
        assert_eq!(second.enemy_count, 0);
        assert_eq!(second.active_enemies().count(), 0);
    }

    /// BONUS disables enemy spawns and enables fruit spawns
    #[tokio::test]
    async fn bonus_phase_switches_spawns() {
        let (addr, handle) = start_server(2).await;
        let (mut stream, _) = join(addr).await;
        let id = newest_session(&handle).await;

        stream.write_all(b"BONUS").await.unwrap();
        wait_for_bonus(&handle, id, true).await;

        let report = handle
            .spawn_enemy_for_all_clients(EnemyKind::Foca, IceTarget::default())
            .await;
        assert_eq!((report.placed, report.gated), (0, 1));
        let frame = read_frame(&mut stream).await;
        assert_eq!(frame.enemy_count, 0);

        let report = handle.spawn_fruit_for_all_clients(FruitKind::Eggplant).await;
        assert_eq!(report.placed, 1);
        let frame = read_frame(&mut stream).await;
        assert_eq!(frame.fruit_count, 1);
        let fruit = frame.fruits[0];
        assert_eq!(fruit.kind, FruitKind::Eggplant as i32);
        assert_eq!(frame.tiles().unwrap().get(fruit.x, fruit.y), Some(Tile::FruitC));

        stream.write_all(b"BONUSOFF").await.unwrap();
        wait_for_bonus(&handle, id, false).await;

        let report = handle.spawn_fruit_for_all_clients(FruitKind::Orange).await;
        assert_eq!(report.gated, 1);
        read_frame(&mut stream).await;
    }

    /// The structured client record toggles the phase like raw text does
    #[tokio::test]
    async fn structured_message_toggles_phase() {
        let (addr, handle) = start_server(2).await;
        let (mut stream, _) = join(addr).await;
        let id = newest_session(&handle).await;

        let record = ClientMessage::new(id as i32, "please BONUS now")
            .to_bytes()
            .unwrap();
        stream.write_all(&record).await.unwrap();
        wait_for_bonus(&handle, id, true).await;
    }

    /// Each session's phase is independent
    #[tokio::test]
    async fn broadcast_respects_each_session_phase() {
        let (addr, handle) = start_server(2).await;
        let (mut normal, _) = join(addr).await;
        let (mut bonus, _) = join(addr).await;
        let bonus_id = newest_session(&handle).await;

        bonus.write_all(b"BONUS").await.unwrap();
        wait_for_bonus(&handle, bonus_id, true).await;

        let report = handle.spawn_fruit_for_all_clients(FruitKind::Banana).await;
        assert_eq!(report.sessions, 2);
        assert_eq!((report.placed, report.gated), (1, 1));

        assert_eq!(read_frame(&mut normal).await.fruit_count, 0);
        assert_eq!(read_frame(&mut bonus).await.fruit_count, 1);
    }

    /// Only one Ice hazard exists per session and it is never drawn
    #[tokio::test]
    async fn ice_spawn_replaces_previous_ice() {
        let (addr, handle) = start_server(2).await;
        let (mut stream, _) = join(addr).await;
        let id = newest_session(&handle).await;

        for col in [4, 9, 30] {
            let report = handle
                .spawn_enemy_for_all_clients(EnemyKind::Ice, IceTarget::clamped(1, col))
                .await;
            assert_eq!(report.placed, 1);

            let frame = read_frame(&mut stream).await;
            assert_eq!(frame.enemy_count, 1);
            let ice = frame.enemies[0];
            assert_eq!((ice.x, ice.y), (col.min(GRID_WIDTH as i32 - 1), 1));
            assert_eq!(frame.tiles().unwrap().count(Tile::EnemyIce), 0);
        }
        assert_eq!(handle.session(id).await.unwrap().enemies, 0);
    }
}

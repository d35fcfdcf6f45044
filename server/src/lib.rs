//! # Game Server Library
//!
//! This library is the authoritative back end of a small multiplayer
//! platform game. Every connected player gets a private tile-grid world.
//! An operator injects enemies and fruit into all live worlds on demand, and
//! each world is streamed to its own player as fixed-layout binary frames.
//!
//! ## Core Responsibilities
//!
//! ### Per-Session Worlds
//! Each session owns a [`game::GameState`]: the grid, the player position,
//! bounded enemy and fruit pools, and a score that is carried but never
//! changed here. Every mutation ends in a full grid rebuild, so the rendered
//! grid can never drift from the entity pools.
//!
//! ### Session Management
//! Handles the complete lifecycle of client connections including:
//! - Slot allocation in a fixed-capacity registry
//! - Initial frame on connect
//! - Bonus-phase toggles sent by the client as text tokens
//! - Disconnection on peer close, transport error or send timeout
//!
//! ### Operator Fan-Out
//! Spawn and clear commands run on every live session at once. Each session
//! receives one frame per command, after which the entities it carried are
//! drained: a frame reports what was placed since the previous one, not
//! what is alive.
//!
//! ## Architecture Design
//!
//! ### Task Per Session
//! The accept loop, one receive task per session and the operator console
//! all run on the tokio runtime. The registry lock is only held to claim,
//! release or list slots. Everything done to a session, including the
//! socket write and the drain that follows it, happens under that session's
//! own mutex.
//!
//! ### Bounded Sends
//! Every frame write is bounded by a timeout. A session whose peer stops
//! reading is closed rather than allowed to stall the broadcast.
//!
//! ## Module Organization
//!
//! ### Spawn Module (`spawn`)
//! Placement searches for Foca, Bird and Ice enemies and for fruit.
//!
//! ### Game Module (`game`)
//! `GameState`, the bonus phase and the commands that mutate a world.
//!
//! ### Client Manager Module (`client_manager`)
//! Session state, snapshot delivery and the slot registry.
//!
//! ### Network Module (`network`)
//! TCP listener, receive loops, broadcast fan-out and shutdown.
//!
//! ### Operator Module (`operator`)
//! Line-oriented console standing in for the control panel.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use shared::{EnemyKind, FruitKind};
//! use server::spawn::IceTarget;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::new("127.0.0.1:8888")).await?;
//!     let handle = server.handle();
//!     tokio::spawn(server.run());
//!
//!     // Later, from the operator side:
//!     handle.spawn_enemy_for_all_clients(EnemyKind::Foca, IceTarget::default()).await;
//!     handle.spawn_fruit_for_all_clients(FruitKind::Orange).await;
//!     handle.shutdown();
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod operator;
pub mod spawn;

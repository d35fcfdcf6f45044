//! Minimal game client for exercising a running server by hand.

use clap::Parser;
use log::info;
use shared::{ClientMessage, Snapshot, FRAME_LEN};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8888")]
    server: String,
    /// Start a bonus phase right after connecting
    #[clap(short, long)]
    bonus: bool,
    /// Number of frames to print before exiting, 0 for no limit
    #[clap(short, long, default_value = "0")]
    frames: usize,
    /// Send the bonus token inside a structured client message
    #[clap(long)]
    structured: bool,
}

fn print_frame(number: usize, snapshot: &Snapshot) {
    println!("Frame {} (score {})", number, snapshot.score);
    match snapshot.tiles() {
        Some(grid) => print!("{}", grid),
        None => println!("<grid holds unknown tile codes>"),
    }

    println!("Enemies: {}", snapshot.enemy_count);
    for slot in snapshot.active_enemies() {
        println!("  type {} at ({}, {})", slot.kind, slot.x, slot.y);
    }
    println!("Fruits: {}", snapshot.fruit_count);
    for slot in snapshot.active_fruits() {
        println!("  type {} at ({}, {})", slot.kind, slot.x, slot.y);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {}", args.server);

    if args.bonus {
        let message = if args.structured {
            ClientMessage::new(0, "BONUS").to_bytes()?
        } else {
            b"BONUS".to_vec()
        };
        stream.write_all(&message).await?;
        info!("Requested bonus phase");
    }

    let mut frame = vec![0u8; FRAME_LEN];
    let mut received = 0;
    while args.frames == 0 || received < args.frames {
        if let Err(e) = stream.read_exact(&mut frame).await {
            info!("Connection closed: {}", e);
            break;
        }
        received += 1;
        let snapshot = Snapshot::decode(&frame)?;
        print_frame(received, &snapshot);
    }

    Ok(())
}

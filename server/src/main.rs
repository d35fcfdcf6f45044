use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use server::operator::run_console;
use shared::DEFAULT_PORT;
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::mpsc;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Maximum number of concurrent clients
    #[clap(short, long, default_value = "2")]
    max_clients: usize,
    /// Upper bound on delivering one frame to a client, in milliseconds
    #[clap(long, default_value = "2000")]
    send_timeout_ms: u64,
    /// Seed for reproducible spawn placement
    #[clap(long)]
    seed: Option<u64>,
}

/// Forwards stdin lines from a plain thread so a pending read never holds
/// up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig::new(format!("{}:{}", args.host, args.port))
        .with_max_clients(args.max_clients)
        .with_send_timeout(Duration::from_millis(args.send_timeout_ms))
        .with_rng_seed(args.seed);

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    let handle = server.handle();

    tokio::spawn(run_console(spawn_stdin_reader(), handle.clone()));

    let signal_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            signal_handle.shutdown();
        }
    });

    info!("Commands: foca, bird, ice [row col], fruit <kind>, clear enemies, clear fruits, status, quit");
    server.run().await;
    Ok(())
}

use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of connected players
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Housekeeping ticks per second
    #[arg(short, long, default_value = "10")]
    tick_rate: u32,

    /// Seconds of silence before a player is considered gone
    #[arg(long, default_value = "5")]
    client_timeout_secs: u64,

    /// Seed for destination choice
    #[arg(long)]
    seed: Option<u64>,

    /// Fail deliveries whose deadline has passed instead of waiting for the client
    #[arg(long)]
    sweep_expired: bool,

    /// Extra seconds past the deadline before the sweep fails a delivery
    #[arg(long, default_value = "5")]
    sweep_grace_secs: u64,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            addr: format!("{}:{}", self.host, self.port),
            max_clients: self.max_clients,
            tick_duration: Duration::from_secs_f32(1.0 / self.tick_rate.max(1) as f32),
            client_timeout: Duration::from_secs(self.client_timeout_secs),
            seed: self.seed,
            sweep_expired: self.sweep_expired,
            sweep_grace: Duration::from_secs(self.sweep_grace_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();
    info!(
        "Starting delivery server on {} (max {} players, expired sweep: {})",
        config.addr, config.max_clients, config.sweep_expired
    );

    let mut server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

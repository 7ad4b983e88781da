use clap::Parser;
use client::config::ClientConfig;
use client::network::Client;
use log::info;
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Autopilot top speed
    #[arg(long, default_value_t = shared::VEHICLE_CONFIG.max_speed)]
    speed: f32,

    /// Expected autopilot jumps per second
    #[arg(long, default_value = "0.05", value_parser = parse_jump_rate)]
    jump_chance: f32,

    /// Seed for the autopilot
    #[arg(long)]
    seed: Option<u64>,

    /// Leave after this many resolved deliveries (0 keeps going)
    #[arg(short, long, default_value = "0")]
    deliveries: u32,
}

fn parse_jump_rate(value: &str) -> Result<f32, String> {
    let rate: f32 = value.parse().map_err(|e| format!("{}", e))?;
    if !rate.is_finite() || rate < 0.0 {
        return Err(format!("expected a non-negative number, got {}", value));
    }
    Ok(rate)
}

impl Args {
    fn into_config(self) -> ClientConfig {
        ClientConfig {
            server_addr: self.server,
            fake_ping_ms: self.fake_ping,
            max_speed: self.speed,
            jump_rate: self.jump_chance,
            seed: self.seed,
            max_deliveries: (self.deliveries > 0).then_some(self.deliveries),
            ..ClientConfig::default()
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

    info!("Starting delivery client...");
    info!("Connecting to: {}", config.server_addr);
    if config.fake_ping_ms > 0 {
        info!("Simulating {}ms latency", config.fake_ping_ms);
    }

    let mut client = Client::new(config).await?;

    tokio::select! {
        result = client.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

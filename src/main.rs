use clap::Parser;
use tracing_subscriber::EnvFilter;

use swerve_runtime::runtime::{self, RuntimeOptions};

/// Swerve drive control runtime.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Serial port of the motor-controller bus; omit to run on offline
    /// actuators (simulation / bench).
    #[arg(long)]
    port: Option<String>,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let options = RuntimeOptions {
        serial_port: args.port,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

//! oneshot-client: send one message to a oneshot-echo server and print
//! what comes back.

use clap::Parser;
use oneshot_echo::client::{send_message, DEFAULT_REQUEST};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "oneshot-client")]
#[command(version = "0.1.0")]
#[command(about = "Send a single message to a oneshot-echo server", long_about = None)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Message to send
    #[arg(short, long, default_value = DEFAULT_REQUEST)]
    message: String,

    /// Connect/send/receive timeout in milliseconds (0 = none)
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let timeout = (args.timeout_ms > 0).then(|| Duration::from_millis(args.timeout_ms));

    match send_message(args.addr, args.message.as_bytes(), timeout) {
        Ok(response) => {
            info!(addr = %args.addr, bytes = response.len(), "Connection was successful");
            println!("Response was:\n {}", String::from_utf8_lossy(&response));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(addr = %args.addr, error = %e, "Connection failed");
            ExitCode::FAILURE
        }
    }
}

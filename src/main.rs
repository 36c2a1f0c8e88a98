//! oneshot-echo server binary.

use oneshot_echo::{Config, Server, ServerError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        runtime = ?config.runtime,
        max_connections = config.max_connections,
        buffer_size = config.buffer_size,
        echo = ?config.echo,
        "Starting oneshot-echo server"
    );

    if let Err(e) = run(config) {
        error!(error = %e, "Server stopped");
        std::process::exit(e.exit_code());
    }
}

fn run(config: Config) -> Result<(), ServerError> {
    let server = Server::bind(config)?;
    server.run()
}

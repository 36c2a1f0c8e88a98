//! mio-based event loop implementation.
//!
//! Readiness-based I/O using mio (epoll on Linux, kqueue on macOS).

mod event_loop;

use crate::config::Config;
use crate::error::ServerError;
use std::net::TcpListener;

/// Run the multiplexer using the mio backend.
pub fn run(listener: TcpListener, config: &Config) -> Result<(), ServerError> {
    event_loop::run(listener, config)
}

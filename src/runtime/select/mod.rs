//! `select(2)` event loop implementation.
//!
//! The closest match to the classic socket-API multiplexer: a persistent
//! descriptor bitmask is copied into a scratch set before every wait,
//! since `select` overwrites its input with the ready subset.

mod event_loop;
mod fd_set;

pub use fd_set::{FdSet, FD_LIMIT};

use crate::config::Config;
use crate::error::ServerError;
use std::net::TcpListener;

/// Run the multiplexer using the select backend.
pub fn run(listener: TcpListener, config: &Config) -> Result<(), ServerError> {
    event_loop::run(listener, config)
}

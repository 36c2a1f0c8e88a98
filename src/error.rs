//! Server error types.

use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::os::unix::io::RawFd;
use thiserror::Error;

/// Errors that stop the server.
///
/// Per-connection failures never surface here; they are logged and the
/// connection is dropped.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("readiness wait failed: {0}")]
    Wait(#[source] io::Error),
    #[error("descriptor {0} exceeds the select() limit of {limit}", limit = libc::FD_SETSIZE)]
    DescriptorLimit(RawFd),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ServerError {
    /// Process exit status: the OS error code when there is one, else 1.
    pub fn exit_code(&self) -> i32 {
        let os = match self {
            ServerError::Bind { source, .. } => source.raw_os_error(),
            ServerError::Wait(source) | ServerError::Io(source) => source.raw_os_error(),
            ServerError::InvalidAddress { .. } | ServerError::DescriptorLimit(_) => None,
        };
        match os {
            Some(code) if code != 0 => code,
            _ => 1,
        }
    }
}

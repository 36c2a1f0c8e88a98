//! One-shot acknowledge-and-echo protocol.
//!
//! Every connection performs exactly one exchange and is then closed:
//!
//! ```text
//! Server: Message Received Successfully:\n
//! Client: <payload, at most buffer_size - 1 bytes>
//! Server: <payload echoed back>
//! (server closes)
//! ```
//!
//! There is no framing. The payload is whatever a single receive returns,
//! and anything beyond the receive window is dropped.
//!
//! The simple-server variant keeps the acknowledgment but disables the
//! echo (`EchoMode::Off`), usually with the shorter `msg received\n`
//! acknowledgment.

pub mod handler;

pub use handler::{serve, Exchange};

use clap::ValueEnum;
use serde::Deserialize;

/// Acknowledgment sent before the payload is read.
pub const DEFAULT_ACK: &str = "Message Received Successfully:\n";

/// Acknowledgment used by the simple (non-echoing) server.
pub const SIMPLE_ACK: &str = "msg received\n";

/// Size of the receive buffer; one byte is always left zeroed.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// How the received payload is sent back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EchoMode {
    /// Echo exactly the bytes received.
    #[default]
    Exact,
    /// Echo up to the first NUL byte, treating the payload as a C string.
    Text,
    /// Do not echo anything.
    Off,
}

impl EchoMode {
    /// Select the slice of `received` that gets echoed.
    pub fn reply<'a>(&self, received: &'a [u8]) -> &'a [u8] {
        match self {
            EchoMode::Exact => received,
            EchoMode::Text => {
                let end = received
                    .iter()
                    .position(|&b| b == 0)
                    .unwrap_or(received.len());
                &received[..end]
            }
            EchoMode::Off => &[],
        }
    }
}

/// Per-exchange settings, resolved from the server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Bytes written before the payload is read.
    pub ack: Vec<u8>,
    /// Receive buffer size. At most `buffer_size - 1` bytes are read.
    pub buffer_size: usize,
    pub echo: EchoMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ack: DEFAULT_ACK.as_bytes().to_vec(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            echo: EchoMode::Exact,
        }
    }
}

impl Settings {
    /// Largest payload a single exchange will accept.
    pub fn receive_limit(&self) -> usize {
        self.buffer_size.saturating_sub(1)
    }
}

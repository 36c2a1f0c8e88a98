//! oneshot-echo: a single-threaded, readiness-multiplexed echo server.
//!
//! Every client gets exactly one exchange: an acknowledgment, one received
//! payload echoed back, then the connection is closed.
//!
//! Features:
//! - mio (epoll/kqueue), `select(2)` and blocking accept backends
//! - Bounded watch set; connections past the limit are rejected
//! - Exact, C-string or disabled echo
//! - Configuration via CLI arguments or TOML file

pub mod client;
pub mod config;
pub mod error;
pub mod protocols;
pub mod runtime;

pub use config::Config;
pub use error::ServerError;
pub use runtime::Server;

//! Single-threaded connection multiplexer.
//!
//! A listening socket and the accepted clients are watched for
//! readability. A ready listener yields a new client in the watch set; a
//! ready client gets its one-shot exchange and is then closed.
//!
//! Backends share the listener setup and per-connection dispatch:
//! - `mio_impl`: mio readiness (epoll on Linux, kqueue on macOS)
//! - `select`: `select(2)` over a fixed-size descriptor bitmask
//! - `blocking`: sequential accept, no multiplexing

mod blocking;
mod mio_impl;
mod select;
mod watch_set;

pub use select::{FdSet, FD_LIMIT};
pub use watch_set::WatchSet;

use crate::config::{Config, RuntimeType};
use crate::error::ServerError;
use crate::protocols::oneshot::{self, Settings};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::os::fd::AsFd;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A bound listening endpoint and the configuration to serve it with.
pub struct Server {
    listener: TcpListener,
    config: Config,
}

impl Server {
    /// Create, bind and listen on the configured address.
    ///
    /// Failures here are fatal to the caller; there is no retry and no
    /// fallback port.
    pub fn bind(config: Config) -> Result<Self, ServerError> {
        let addr: SocketAddr =
            config
                .listen
                .parse()
                .map_err(|source| ServerError::InvalidAddress {
                    addr: config.listen.clone(),
                    source,
                })?;

        let nonblocking = config.runtime != RuntimeType::Blocking;
        let listener = create_listener(addr, config.backlog, nonblocking)
            .map_err(|source| ServerError::Bind { addr, source })?;

        info!(
            addr = %listener.local_addr()?,
            backlog = config.backlog,
            runtime = ?config.runtime,
            "Listening"
        );

        Ok(Self { listener, config })
    }

    /// Address actually bound, useful when listening on port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the accept/dispatch loop. Only returns on a fatal error.
    pub fn run(self) -> Result<(), ServerError> {
        match self.config.runtime {
            RuntimeType::Mio => mio_impl::run(self.listener, &self.config),
            RuntimeType::Select => select::run(self.listener, &self.config),
            RuntimeType::Blocking => blocking::run(self.listener, &self.config),
        }
    }
}

/// Create a TCP listener with SO_REUSEADDR and the given backlog.
fn create_listener(addr: SocketAddr, backlog: i32, nonblocking: bool) -> io::Result<TcpListener> {
    let socket = Socket::new(
        match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        },
        Type::STREAM,
        Some(Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(nonblocking)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}

/// Put a connection into blocking mode with the per-connection timeout.
fn prepare_for_exchange<S: AsFd>(stream: &S, timeout: Option<Duration>) -> io::Result<()> {
    let socket = SockRef::from(stream);
    socket.set_nonblocking(false)?;
    socket.set_read_timeout(timeout)?;
    socket.set_write_timeout(timeout)?;
    Ok(())
}

/// Serve one client and close it.
///
/// Errors are per-connection: they are logged and the connection is
/// dropped, the loop carries on.
fn serve_connection<S>(
    conn_id: usize,
    peer: SocketAddr,
    mut stream: S,
    settings: &Settings,
    timeout: Option<Duration>,
) where
    S: Read + Write + AsFd,
{
    let result = prepare_for_exchange(&stream, timeout)
        .and_then(|()| oneshot::serve(&mut stream, settings));

    match result {
        Ok(exchange) => debug!(
            conn_id,
            peer = %peer,
            received = exchange.received,
            echoed = exchange.echoed,
            "Exchange complete"
        ),
        Err(e) => warn!(conn_id, peer = %peer, error = %e, "Exchange failed"),
    }

    drop(stream);
    debug!(conn_id, peer = %peer, "Connection closed");
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Server;
    use crate::config::{Config, RuntimeType};
    use std::net::SocketAddr;
    use std::thread;

    /// Bind a server on an ephemeral loopback port and run it in the
    /// background. The thread is left running for the rest of the test
    /// process.
    pub fn spawn_server(runtime: RuntimeType, tweak: impl FnOnce(&mut Config)) -> SocketAddr {
        let mut config = Config {
            listen: "127.0.0.1:0".to_string(),
            runtime,
            ..Config::default()
        };
        tweak(&mut config);

        let server = Server::bind(config).unwrap();
        let addr = server.local_addr().unwrap();
        thread::Builder::new()
            .name(format!("{runtime:?}-server"))
            .spawn(move || server.run())
            .unwrap();
        addr
    }
}

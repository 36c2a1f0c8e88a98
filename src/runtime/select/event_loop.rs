//! select event loop.

use super::fd_set::{FdSet, FD_LIMIT};
use crate::config::Config;
use crate::error::ServerError;
use crate::runtime::{serve_connection, WatchSet};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use tracing::{debug, info, warn};

struct SelectConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

/// Run the select-based multiplexer on an already listening socket.
pub fn run(listener: TcpListener, config: &Config) -> Result<(), ServerError> {
    let listener_fd = listener.as_raw_fd();

    let mut current = FdSet::new();
    if !current.insert(listener_fd) {
        return Err(ServerError::DescriptorLimit(listener_fd));
    }

    // The listener occupies one slot of the bitmask.
    let capacity = config.max_connections.min(FD_LIMIT - 1);
    let mut watch: WatchSet<SelectConnection> = WatchSet::new(capacity);
    let mut due: Vec<(RawFd, usize)> = Vec::new();
    let settings = config.exchange();
    let timeout = config.io_timeout();

    info!(max_connections = capacity, fd_limit = FD_LIMIT, "select event loop started");

    loop {
        let mut ready = current;

        debug!(watched = current.len(), "Waiting for a request");
        if let Err(e) = ready.wait_readable() {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(ServerError::Wait(e));
        }

        // Clients ready in this round, collected before the accept grows the set.
        due.clear();
        due.extend(
            watch
                .iter()
                .map(|(conn_id, conn)| (conn.stream.as_raw_fd(), conn_id))
                .filter(|&(fd, _)| ready.contains(fd)),
        );
        due.sort_unstable();

        if ready.contains(listener_fd) {
            accept_connection(&listener, &mut current, &mut watch);
        }

        for &(fd, conn_id) in &due {
            let Some(conn) = watch.remove(conn_id) else {
                continue;
            };
            current.remove(fd);
            serve_connection(conn_id, conn.peer, conn.stream, &settings, timeout);
        }
    }
}

/// Accept a single pending connection and start watching it.
fn accept_connection(
    listener: &TcpListener,
    current: &mut FdSet,
    watch: &mut WatchSet<SelectConnection>,
) {
    let (stream, peer) = match listener.accept() {
        Ok(accepted) => accepted,
        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
        Err(e) => {
            warn!(error = %e, "Accept error");
            return;
        }
    };

    let fd = stream.as_raw_fd();
    if watch.is_full() {
        warn!(peer = %peer, capacity = watch.capacity(), "Connection limit reached, rejecting");
        return;
    }
    if !current.insert(fd) {
        warn!(peer = %peer, fd, fd_limit = FD_LIMIT, "Descriptor outside select() range, rejecting");
        return;
    }

    match watch.insert(SelectConnection { stream, peer }) {
        Some(conn_id) => {
            debug!(conn_id, fd, peer = %peer, watched = current.len(), "Accepted connection")
        }
        None => {
            current.remove(fd);
        }
    }
}

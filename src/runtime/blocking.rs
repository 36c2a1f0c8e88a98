//! Sequential accept loop without multiplexing.
//!
//! Each connection is accepted and served to completion before the next
//! one is looked at. A client that connects but never sends holds up the
//! queue until the per-connection timeout fires.

use crate::config::Config;
use crate::error::ServerError;
use crate::runtime::serve_connection;
use std::io;
use std::net::TcpListener;
use tracing::{debug, info, warn};

/// Run the blocking accept loop on an already listening socket.
pub fn run(listener: TcpListener, config: &Config) -> Result<(), ServerError> {
    listener.set_nonblocking(false)?;
    let settings = config.exchange();
    let timeout = config.io_timeout();
    let mut next_id: usize = 0;

    info!("blocking accept loop started");

    loop {
        debug!("Waiting for a connection");
        match listener.accept() {
            Ok((stream, peer)) => {
                let conn_id = next_id;
                next_id = next_id.wrapping_add(1);
                debug!(conn_id, peer = %peer, "Accepted connection");
                serve_connection(conn_id, peer, stream, &settings, timeout);
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => warn!(error = %e, "Accept error"),
        }
    }
}

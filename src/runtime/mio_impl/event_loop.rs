//! mio event loop implementation.
//!
//! Readiness-based model: poll tells us when sockets are ready. A ready
//! listener is drained of pending connections; a ready client is taken out
//! of the watch set, served once and closed. Uses epoll on Linux, kqueue on
//! macOS.

use crate::config::Config;
use crate::error::ServerError;
use crate::runtime::{serve_connection, WatchSet};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

const LISTENER_TOKEN: Token = Token(usize::MAX);

/// A watched client; its watch-set id is its mio token.
struct MioConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

/// Run the mio-based multiplexer on an already listening socket.
pub fn run(listener: std::net::TcpListener, config: &Config) -> Result<(), ServerError> {
    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(config.events_capacity);

    let mut listener = TcpListener::from_std(listener);
    poll.registry()
        .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

    let mut watch: WatchSet<MioConnection> = WatchSet::new(config.max_connections);
    let mut ready: Vec<usize> = Vec::with_capacity(config.events_capacity);
    let settings = config.exchange();
    let timeout = config.io_timeout();

    info!(
        max_connections = config.max_connections,
        events_capacity = config.events_capacity,
        "mio event loop started"
    );

    loop {
        debug!(watched = watch.watched(), "Waiting for a request");
        if let Err(e) = poll.poll(&mut events, None) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(ServerError::Wait(e));
        }

        ready.clear();
        let mut listener_ready = false;
        for event in events.iter() {
            match event.token() {
                LISTENER_TOKEN => listener_ready = true,
                Token(conn_id) => ready.push(conn_id),
            }
        }

        // Accept before dispatching the clients that were ready alongside.
        if listener_ready {
            accept_connections(&listener, &poll, &mut watch);
        }

        ready.sort_unstable();
        ready.dedup();
        for conn_id in ready.drain(..) {
            let Some(mut conn) = watch.remove(conn_id) else {
                continue;
            };
            if let Err(e) = poll.registry().deregister(&mut conn.stream) {
                debug!(conn_id, error = %e, "Deregister failed");
            }
            serve_connection(conn_id, conn.peer, conn.stream, &settings, timeout);
        }
    }
}

/// Accept until the listener would block.
///
/// Readiness is edge-triggered, so leaving connections in the backlog
/// would stall them until the next one arrives.
fn accept_connections(
    listener: &TcpListener,
    poll: &Poll,
    watch: &mut WatchSet<MioConnection>,
) {
    loop {
        match listener.accept() {
            Ok((mut stream, peer)) => {
                let Some(conn_id) = watch.next_id() else {
                    warn!(peer = %peer, capacity = watch.capacity(), "Connection limit reached, rejecting");
                    continue;
                };

                if let Err(e) =
                    poll.registry()
                        .register(&mut stream, Token(conn_id), Interest::READABLE)
                {
                    warn!(conn_id, peer = %peer, error = %e, "Failed to register connection");
                    continue;
                }

                let inserted = watch.insert(MioConnection { stream, peer });
                debug_assert_eq!(inserted, Some(conn_id));
                debug!(conn_id, peer = %peer, watched = watch.watched(), "Accepted connection");
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionAborted | io::ErrorKind::Interrupted
                ) =>
            {
                debug!(error = %e, "Transient accept error");
            }
            Err(e) => {
                warn!(error = %e, "Accept error");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{send_message, split_reply};
    use crate::config::RuntimeType;
    use crate::protocols::oneshot::{EchoMode, DEFAULT_ACK};
    use crate::runtime::test_support::spawn_server;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Duration;

    const TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

    #[test]
    fn test_hello_scenario() {
        let addr = spawn_server(RuntimeType::Mio, |_| {});
        let response = send_message(addr, b"hello", TIMEOUT).unwrap();
        assert_eq!(response, [DEFAULT_ACK.as_bytes(), &b"hello"[..]].concat());
    }

    #[test]
    fn test_two_clients_back_to_back() {
        let addr = spawn_server(RuntimeType::Mio, |_| {});

        let mut first = TcpStream::connect(addr).unwrap();
        let mut second = TcpStream::connect(addr).unwrap();
        for stream in [&first, &second] {
            stream.set_read_timeout(TIMEOUT).unwrap();
        }

        // Second client is served while the first is still idle.
        second.write_all(b"second").unwrap();
        let mut reply = Vec::new();
        second.read_to_end(&mut reply).unwrap();
        assert_eq!(split_reply(&reply, DEFAULT_ACK.as_bytes()), Some(&b"second"[..]));

        first.write_all(b"first").unwrap();
        let mut reply = Vec::new();
        first.read_to_end(&mut reply).unwrap();
        assert_eq!(split_reply(&reply, DEFAULT_ACK.as_bytes()), Some(&b"first"[..]));
    }

    #[test]
    fn test_boundary_payloads() {
        let addr = spawn_server(RuntimeType::Mio, |_| {});

        let full = vec![b'q'; 1023];
        let response = send_message(addr, &full, TIMEOUT).unwrap();
        assert_eq!(split_reply(&response, DEFAULT_ACK.as_bytes()), Some(&full[..]));

        let oversized = vec![b'z'; 2048];
        let response = send_message(addr, &oversized, TIMEOUT).unwrap();
        let echo = split_reply(&response, DEFAULT_ACK.as_bytes()).unwrap();
        assert!(echo.len() <= 1023);
        assert!(echo.iter().all(|&b| b == b'z'));
    }

    #[test]
    fn test_many_sequential_clients() {
        let addr = spawn_server(RuntimeType::Mio, |config| config.max_connections = 4);
        for i in 0..20 {
            let payload = format!("client-{i}");
            let response = send_message(addr, payload.as_bytes(), TIMEOUT).unwrap();
            assert_eq!(
                split_reply(&response, DEFAULT_ACK.as_bytes()),
                Some(payload.as_bytes())
            );
        }
    }

    #[test]
    fn test_capacity_rejects_extra_connection() {
        let addr = spawn_server(RuntimeType::Mio, |config| config.max_connections = 1);

        let mut held = TcpStream::connect(addr).unwrap();
        held.set_read_timeout(TIMEOUT).unwrap();
        std::thread::sleep(Duration::from_millis(100));

        // Over the limit: accepted and immediately closed.
        let mut rejected = TcpStream::connect(addr).unwrap();
        rejected.set_read_timeout(TIMEOUT).unwrap();
        let mut buf = Vec::new();
        let _ = rejected.read_to_end(&mut buf);
        assert!(buf.is_empty());

        held.write_all(b"kept").unwrap();
        let mut reply = Vec::new();
        held.read_to_end(&mut reply).unwrap();
        assert_eq!(split_reply(&reply, DEFAULT_ACK.as_bytes()), Some(&b"kept"[..]));
    }

    #[test]
    fn test_text_echo_mode() {
        let addr = spawn_server(RuntimeType::Mio, |config| config.echo = EchoMode::Text);
        let response = send_message(addr, b"ab\0cd", TIMEOUT).unwrap();
        assert_eq!(response, [DEFAULT_ACK.as_bytes(), &b"ab"[..]].concat());
    }

    #[test]
    fn test_client_closes_without_sending() {
        let addr = spawn_server(RuntimeType::Mio, |_| {});

        let silent = TcpStream::connect(addr).unwrap();
        drop(silent);

        // The loop survives and keeps serving.
        let response = send_message(addr, b"still alive", TIMEOUT).unwrap();
        assert_eq!(response, [DEFAULT_ACK.as_bytes(), &b"still alive"[..]].concat());
    }
}

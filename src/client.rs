//! Blocking client for the one-shot exchange.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tracing::debug;

/// Request sent by `oneshot-client` when no message is given.
pub const DEFAULT_REQUEST: &str = "GET: \\ HTTP/1.1\r\nHost:google.com\r\n\r\n";

/// Connect, send `payload` in full and read everything the server sends
/// back until it closes the connection.
///
/// The server closes after a single receive, so a payload larger than its
/// receive window leaves unread data behind and the peer answers with a
/// reset. A reset that arrives after response bytes is treated as end of
/// stream.
pub fn send_message(
    addr: SocketAddr,
    payload: &[u8],
    timeout: Option<Duration>,
) -> io::Result<Vec<u8>> {
    let mut stream = match timeout {
        Some(t) => TcpStream::connect_timeout(&addr, t)?,
        None => TcpStream::connect(addr)?,
    };
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;
    debug!(addr = %addr, "Connected");

    stream.write_all(payload)?;
    debug!(sent = payload.len(), "Payload sent");

    read_until_close(&mut stream)
}

fn read_until_close<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut response = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => response.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset && !response.is_empty() => break,
            Err(e) => return Err(e),
        }
    }
    Ok(response)
}

/// Strip the acknowledgment off a response, leaving the echo.
///
/// Returns `None` if the response does not start with `ack`.
pub fn split_reply<'a>(response: &'a [u8], ack: &[u8]) -> Option<&'a [u8]> {
    response.strip_prefix(ack)
}

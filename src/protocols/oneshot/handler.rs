//! One-shot exchange handler.

use super::Settings;
use std::io::{self, Read, Write};
use tracing::info;

/// Summary of a completed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    /// Bytes read from the client.
    pub received: usize,
    /// Bytes written back after the acknowledgment.
    pub echoed: usize,
}

/// Run a single acknowledge/receive/echo exchange on `stream`.
///
/// Exactly one receive is performed. Input beyond
/// `settings.receive_limit()` is left unread, and a peer that closes
/// without sending gets an empty echo. Closing the stream is up to the
/// caller.
pub fn serve<S: Read + Write>(stream: &mut S, settings: &Settings) -> io::Result<Exchange> {
    stream.write_all(&settings.ack)?;
    info!(ack = %String::from_utf8_lossy(&settings.ack).trim_end(), "Sent acknowledgment");

    let mut buffer = vec![0u8; settings.buffer_size];
    let limit = settings.receive_limit();
    let received = receive_once(stream, &mut buffer[..limit])?;

    let reply = settings.echo.reply(&buffer[..received]);
    stream.write_all(reply)?;
    stream.flush()?;

    info!(
        received,
        echoed = reply.len(),
        payload = %String::from_utf8_lossy(reply),
        "Echoed payload"
    );

    Ok(Exchange {
        received,
        echoed: reply.len(),
    })
}

/// One receive, retried only if interrupted by a signal.
fn receive_once<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

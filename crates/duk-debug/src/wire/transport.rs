//! Runtime connection transport.
//! - WireConnector: connect seam (TCP in production, in-memory in tests)
//! - spawn_reader: line reassembly thread feeding inbound frames

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::error::{WireError, WireResult};

/// An open duplex connection to the runtime.
pub struct WireConnection {
    pub peer: String,
    pub writer: Box<dyn Write + Send>,
    pub reader: Box<dyn BufRead + Send>,
}

impl std::fmt::Debug for WireConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireConnection")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// Opens connections to a runtime endpoint.
pub trait WireConnector: Send {
    fn connect(&mut self, host: &str, port: u16) -> WireResult<WireConnection>;
}

/// Plain TCP connector.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl WireConnector for TcpConnector {
    fn connect(&mut self, host: &str, port: u16) -> WireResult<WireConnection> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect((host, port)).map_err(|source| WireError::Connect {
            addr: addr.clone(),
            source,
        })?;
        if let Err(err) = stream.set_nodelay(true) {
            debug!("set_nodelay failed on {addr}: {err}");
        }
        let reader = stream.try_clone().map_err(|source| WireError::Connect {
            addr: addr.clone(),
            source,
        })?;
        Ok(WireConnection {
            peer: addr,
            writer: Box::new(TcpWriter(stream)),
            reader: Box::new(BufReader::new(reader)),
        })
    }
}

/// Write half that shuts the socket down when dropped so the reader thread sees EOF.
#[derive(Debug)]
struct TcpWriter(TcpStream);

impl Write for TcpWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Drop for TcpWriter {
    fn drop(&mut self) {
        let _ = self.0.shutdown(Shutdown::Both);
    }
}

/// Inbound traffic from the runtime, one complete frame at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireInbound {
    Frame(String),
    Closed,
}

/// Read newline-delimited frames until EOF, handing each to `deliver`.
///
/// Partial reads are buffered by the `BufRead` until the terminating newline
/// arrives. A line that is not valid UTF-8 is delivered lossily and left to the
/// decoder; only EOF and I/O errors end the reader. Stops early when `deliver`
/// returns `false`.
pub fn spawn_reader<F>(mut reader: Box<dyn BufRead + Send>, mut deliver: F) -> JoinHandle<()>
where
    F: FnMut(WireInbound) -> bool + Send + 'static,
{
    thread::spawn(move || {
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let Some(frame) = frame_text(&line) else {
                        continue;
                    };
                    if !deliver(WireInbound::Frame(frame)) {
                        return;
                    }
                }
                Err(err) => {
                    warn!("runtime read failed: {err}");
                    break;
                }
            }
        }
        deliver(WireInbound::Closed);
    })
}

/// Strip the line terminator; `None` for blank lines.
fn frame_text(line: &[u8]) -> Option<String> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.to_string(),
        Err(err) => {
            warn!("runtime frame is not valid UTF-8: {err}");
            String::from_utf8_lossy(line).into_owned()
        }
    };
    let frame = text.trim_end_matches(['\r', '\n']);
    if frame.trim().is_empty() {
        return None;
    }
    Some(frame.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_text_skips_blank_lines_and_tolerates_bad_utf8() {
        assert_eq!(frame_text(b"\r\n"), None);
        assert_eq!(frame_text(b"{\"reply\":true}\r\n").as_deref(), Some("{\"reply\":true}"));
        let frame = frame_text(b"[\"a\xff\"]\n").unwrap();
        assert_eq!(frame, "[\"a\u{fffd}\"]");
    }
}

//! [`Connection`]: owns the TCP socket, performs the handshake, and offers
//! blocking `send_all`/`recv_exact` bounded by a caller-supplied deadline
//! (component C3).
//!
//! Mirrors the teacher's accept-loop handshake shape (bounded read, then a
//! reply) but client-side: write the single handshake byte, read the
//! server's one-byte identifier, both under the same deadline.

use std::{
    io::{ErrorKind, Read, Write},
    net::{SocketAddr, TcpStream},
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

/// Handshake byte sent by the client (`-127` as a signed byte).
pub const HANDSHAKE_BYTE: u8 = 0x81;

/// Errors internal to the transport layer. Distinguishes transport-level
/// closure (retried by [`crate::exchange::Exchange`]) from everything else
/// (terminal).
#[derive(Debug)]
pub(crate) enum ConnectionError {
    /// The peer closed the connection, or the socket was never open.
    Disconnected,
    /// The deadline elapsed before the operation completed.
    Timeout,
    /// Any other I/O failure.
    Io(std::io::Error),
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
                Self::Disconnected
            }
            ErrorKind::WouldBlock | ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(err),
        }
    }
}

/// Owns the client's single TCP socket to the remote map server.
pub(crate) struct Connection {
    addr: SocketAddr,
    stream: Option<TcpStream>,
    /// Server's handshake reply byte, kept only for logging.
    peer_id: Option<u8>,
}

fn remaining(deadline: Instant) -> Result<Duration, ConnectionError> {
    let now = Instant::now();
    if now >= deadline {
        return Err(ConnectionError::Timeout);
    }
    Ok(deadline - now)
}

impl Connection {
    /// Construct a client in the `Disconnected` state for `addr`.
    pub(crate) const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stream: None,
            peer_id: None,
        }
    }

    /// Whether the socket is currently open.
    pub(crate) const fn is_connected(&self) -> bool { self.stream.is_some() }

    /// The configured remote address (used to stamp [`crate::error::RemoteFailure`]).
    pub(crate) const fn remote_addr(&self) -> SocketAddr { self.addr }

    /// Single non-blocking-effort connect attempt; swallows failure so
    /// construction never fails when the server is absent.
    pub(crate) fn attempt_connect(&mut self, timeout: Duration) {
        match Self::open(self.addr, Instant::now() + timeout) {
            Ok((stream, peer_id)) => {
                self.stream = Some(stream);
                self.peer_id = Some(peer_id);
            }
            Err(err) => {
                debug!(addr = %self.addr, ?err, "initial connect attempt failed, will retry lazily");
            }
        }
    }

    fn open(addr: SocketAddr, deadline: Instant) -> Result<(TcpStream, u8), ConnectionError> {
        loop {
            let budget = remaining(deadline)?;
            match TcpStream::connect_timeout(&addr, budget) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    let peer_id = Self::handshake(&stream, deadline)?;
                    return Ok((stream, peer_id));
                }
                Err(err) if matches!(err.kind(), ErrorKind::TimedOut) => {
                    return Err(ConnectionError::Timeout);
                }
                Err(_) => {
                    // Swallow and retry until the deadline fires.
                    if Instant::now() >= deadline {
                        return Err(ConnectionError::Timeout);
                    }
                }
            }
        }
    }

    fn handshake(stream: &TcpStream, deadline: Instant) -> Result<u8, ConnectionError> {
        let mut handshake_stream = stream.try_clone()?;
        handshake_stream.set_write_timeout(Some(remaining(deadline)?))?;
        handshake_stream.write_all(&[HANDSHAKE_BYTE])?;
        handshake_stream.set_read_timeout(Some(remaining(deadline)?))?;
        let mut reply = [0u8; 1];
        handshake_stream.read_exact(&mut reply)?;
        Ok(reply[0])
    }

    /// Close any existing socket, open a fresh one, and perform the
    /// handshake again, retrying transport failures until `deadline`.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Timeout`] if the deadline elapses before a
    /// connection is established, or a propagated I/O error for anything
    /// that is not a transient connect failure.
    pub(crate) fn lazy_connect(&mut self, deadline: Instant) -> Result<(), ConnectionError> {
        self.close();
        let (stream, peer_id) = Self::open(self.addr, deadline)?;
        info!(addr = %self.addr, peer_id, "connected to remote map server");
        self.stream = Some(stream);
        self.peer_id = Some(peer_id);
        Ok(())
    }

    /// Write `bytes` in full, checking the deadline on every partial write.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Disconnected`] if there is no open socket,
    /// [`ConnectionError::Timeout`] if the deadline elapses, or a propagated
    /// I/O error otherwise.
    pub(crate) fn send_all(&mut self, bytes: &[u8], deadline: Instant) -> Result<(), ConnectionError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::Disconnected)?;
        let mut offset = 0usize;
        while offset < bytes.len() {
            let budget = remaining(deadline)?;
            stream.set_write_timeout(Some(budget))?;
            let Some(chunk) = bytes.get(offset..) else {
                break;
            };
            let n = stream.write(chunk)?;
            if n == 0 {
                return Err(ConnectionError::Disconnected);
            }
            offset += n;
        }
        Ok(())
    }

    /// Fill `buf` completely, checking the deadline on every partial read.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Disconnected`] if there is no open socket
    /// or the peer closes mid-read, [`ConnectionError::Timeout`] if the
    /// deadline elapses, or a propagated I/O error otherwise.
    pub(crate) fn recv_exact(&mut self, buf: &mut [u8], deadline: Instant) -> Result<(), ConnectionError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::Disconnected)?;
        let mut offset = 0usize;
        while offset < buf.len() {
            let budget = remaining(deadline)?;
            stream.set_read_timeout(Some(budget))?;
            let Some(dst) = buf.get_mut(offset..) else {
                break;
            };
            let n = stream.read(dst)?;
            if n == 0 {
                return Err(ConnectionError::Disconnected);
            }
            offset += n;
        }
        Ok(())
    }

    /// Best-effort, idempotent close.
    pub(crate) fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.shutdown(std::net::Shutdown::Both) {
                warn!(addr = %self.addr, ?err, "error shutting down socket (ignored)");
            }
        }
        self.peer_id = None;
    }
}

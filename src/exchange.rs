//! [`Exchange`]: orchestrates one request/response round trip — reconnect on
//! transport-level closure, deadline enforcement, and terminal propagation of
//! protocol/remote errors (component C7).

use std::time::Instant;

use tracing::debug;

use crate::{
    buffer::FramedBuffer,
    connection::{Connection, ConnectionError},
    error::RemoteMapError,
    response::{self, ConnectionErrorOrFailure},
};

/// Drives a single request already staged in `buf` through `conn`.
pub(crate) struct Exchange<'a> {
    conn: &'a mut Connection,
}

impl<'a> Exchange<'a> {
    pub(crate) fn new(conn: &'a mut Connection) -> Self { Self { conn } }

    /// Send the request bytes currently in `buf` (positioned at 0, `limit`
    /// at the written length) and, if `expects_response`, read the matching
    /// response frame back into `buf`.
    ///
    /// Retries transparently on transport-level closure, resending the same
    /// bytes (and so the same transaction id) until `deadline` elapses.
    /// Protocol violations and remote failures are terminal. Per spec §7,
    /// a timeout or protocol violation also closes the socket, so the next
    /// operation observes `Disconnected` and reconnects cleanly rather than
    /// reading a stale, desynchronized frame off the old connection; a
    /// `RemoteFailure` does not close the connection, since the server
    /// answered in-protocol and the socket is still in a known state.
    ///
    /// # Errors
    /// Returns [`RemoteMapError::RemoteCallTimeout`] if the deadline elapses
    /// while retrying, or any other terminal error surfaced by
    /// [`response::read_response`].
    pub(crate) fn send_and_receive(
        &mut self,
        buf: &mut FramedBuffer,
        request: &[u8],
        expected_txn: u64,
        expects_response: bool,
        deadline: Instant,
        timeout: std::time::Duration,
    ) -> Result<(), RemoteMapError> {
        loop {
            if !self.conn.is_connected() {
                self.reconnect_or_time_out(deadline, timeout)?;
            }

            match self.try_once(buf, request, expected_txn, expects_response, deadline) {
                Ok(()) => return Ok(()),
                Err(ConnectionErrorOrFailure::Failure(
                    err @ RemoteMapError::ProtocolViolation { .. },
                )) => {
                    self.conn.close();
                    return Err(err);
                }
                Err(ConnectionErrorOrFailure::Failure(err)) => return Err(err),
                Err(ConnectionErrorOrFailure::Connection(ConnectionError::Disconnected)) => {
                    debug!("transport closed mid-exchange, reconnecting and resending");
                    self.reconnect_or_time_out(deadline, timeout)?;
                }
                Err(ConnectionErrorOrFailure::Connection(ConnectionError::Timeout)) => {
                    self.conn.close();
                    return Err(RemoteMapError::RemoteCallTimeout(timeout));
                }
                Err(ConnectionErrorOrFailure::Connection(ConnectionError::Io(io))) => {
                    self.conn.close();
                    return Err(RemoteMapError::Io(io));
                }
            }
        }
    }

    fn try_once(
        &mut self,
        buf: &mut FramedBuffer,
        request: &[u8],
        expected_txn: u64,
        expects_response: bool,
        deadline: Instant,
    ) -> Result<(), ConnectionErrorOrFailure> {
        self.conn.send_all(request, deadline)?;
        if !expects_response {
            return Ok(());
        }
        buf.clear();
        response::read_response(self.conn, buf, expected_txn, deadline, self.conn_addr())
    }

    fn reconnect_or_time_out(
        &mut self,
        deadline: Instant,
        timeout: std::time::Duration,
    ) -> Result<(), RemoteMapError> {
        if Instant::now() >= deadline {
            return Err(RemoteMapError::RemoteCallTimeout(timeout));
        }
        self.conn.lazy_connect(deadline).map_err(|err| match err {
            ConnectionError::Timeout => RemoteMapError::RemoteCallTimeout(timeout),
            ConnectionError::Disconnected => {
                RemoteMapError::Io(std::io::Error::other("server unreachable"))
            }
            ConnectionError::Io(io) => RemoteMapError::Io(io),
        })
    }

    fn conn_addr(&self) -> std::net::SocketAddr { self.conn.remote_addr() }
}

//! [`ResponseReader`]: reads one length-prefixed response frame, validates
//! the echoed transaction id, and surfaces either a payload cursor or a
//! reconstructed [`RemoteFailure`] (component C6).

use std::{net::SocketAddr, time::Instant};

use crate::{
    buffer::FramedBuffer,
    connection::{Connection, ConnectionError},
    error::{RemoteFailure, RemoteFrame, RemoteMapError},
};

/// Read one response frame for `expected_txn` out of `conn` into `buf`.
///
/// On success, `buf`'s cursor is positioned at the start of the payload and
/// `buf.limit()` is the end of the payload, ready for the caller's
/// `Serializer` to read from.
///
/// # Errors
/// Returns [`RemoteMapError::ProtocolViolation`] if the echoed transaction id
/// does not match, [`RemoteMapError::RemoteFailure`] if the server reported
/// an exception, or an I/O-flavoured error for transport failures (the
/// caller — [`crate::exchange::Exchange`] — is responsible for turning a
/// disconnect into a retry).
pub(crate) fn read_response(
    conn: &mut Connection,
    buf: &mut FramedBuffer,
    expected_txn: u64,
    deadline: Instant,
    remote_endpoint: SocketAddr,
) -> Result<(), ConnectionErrorOrFailure> {
    let mut size_bytes = [0u8; 4];
    conn.recv_exact(&mut size_bytes, deadline)?;
    let size = u32::from_ne_bytes(size_bytes) as usize;

    if buf.capacity() < size + 4 {
        buf.resize(size + 4, 0);
    }
    let mut body = vec![0u8; size];
    conn.recv_exact(&mut body, deadline)?;

    buf.clear();
    write_frame_bytes(buf, &size_bytes, &body).map_err(truncated)?;
    buf.seal_from(4);

    let is_exception = buf.read_u8().map_err(truncated)? != 0;
    let echoed_txn = buf.read_u64().map_err(truncated)?;
    if echoed_txn != expected_txn {
        return Err(ConnectionErrorOrFailure::Failure(
            RemoteMapError::ProtocolViolation {
                expected: expected_txn,
                actual: echoed_txn,
            },
        ));
    }

    if is_exception {
        let failure = decode_remote_exception(buf, remote_endpoint).map_err(truncated)?;
        return Err(ConnectionErrorOrFailure::Failure(failure.into()));
    }

    Ok(())
}

/// Either a transport-level error (handled by [`crate::exchange::Exchange`]'s
/// retry loop) or a terminal, fully-formed [`RemoteMapError`].
pub(crate) enum ConnectionErrorOrFailure {
    Connection(ConnectionError),
    Failure(RemoteMapError),
}

impl From<ConnectionError> for ConnectionErrorOrFailure {
    fn from(err: ConnectionError) -> Self { Self::Connection(err) }
}

fn write_frame_bytes(
    buf: &mut FramedBuffer,
    size_bytes: &[u8; 4],
    body: &[u8],
) -> Result<(), crate::error::OutOfSpace> {
    buf.write_bytes(size_bytes)?;
    buf.write_bytes(body)
}

pub(crate) fn truncated(_: crate::error::OutOfSpace) -> ConnectionErrorOrFailure {
    ConnectionErrorOrFailure::Failure(RemoteMapError::Io(std::io::Error::other(
        "truncated response frame",
    )))
}

fn read_len_prefixed_string(buf: &mut FramedBuffer) -> Result<String, crate::error::OutOfSpace> {
    let len = crate::codec::read_stop_bit(buf)? as usize;
    let bytes = buf.read_bytes(len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn decode_remote_exception(
    buf: &mut FramedBuffer,
    remote_endpoint: SocketAddr,
) -> Result<RemoteFailure, crate::error::OutOfSpace> {
    let server_class_name = read_len_prefixed_string(buf)?;
    let server_message = read_len_prefixed_string(buf)?;
    let frame_count = crate::codec::read_stop_bit(buf)?;
    let mut server_stack = Vec::with_capacity(frame_count as usize);
    for _ in 0..frame_count {
        let class_name = read_len_prefixed_string(buf)?;
        let method_name = read_len_prefixed_string(buf)?;
        let file = if buf.read_bool()? {
            Some(read_len_prefixed_string(buf)?)
        } else {
            None
        };
        let line = if buf.read_bool()? { Some(buf.read_u32()?) } else { None };
        server_stack.push(RemoteFrame {
            class_name,
            method_name,
            file,
            line,
        });
    }
    Ok(RemoteFailure {
        server_class_name,
        server_message,
        server_stack,
        remote_endpoint,
    })
}

//! [`read_chunked`]: reassembles a multi-chunk streaming response
//! (`KEY_SET`/`VALUES`/`ENTRY_SET`) into a single `Vec<T>` (component C8).
//!
//! Each chunk is itself a complete response frame sharing the originating
//! transaction id. A chunk with `has_more_entries = false` terminates the
//! stream.

use std::{net::SocketAddr, time::Instant};

use crate::{
    buffer::FramedBuffer,
    connection::Connection,
    error::OutOfSpace,
    response::{self, ConnectionErrorOrFailure, truncated},
};

/// Read a chunked collection response, decoding each entry with `read_entry`.
///
/// `buf` must already hold the first chunk's payload (the caller reads the
/// first response frame with [`response::read_response`] before calling
/// this), positioned at the start of that chunk's `has_more_entries` flag.
///
/// # Errors
/// Propagates transport and protocol errors from subsequent chunk reads, or
/// a truncated-frame error if an entry cannot be decoded.
pub(crate) fn read_chunked<T>(
    conn: &mut Connection,
    buf: &mut FramedBuffer,
    expected_txn: u64,
    deadline: Instant,
    remote_endpoint: SocketAddr,
    mut read_entry: impl FnMut(&mut FramedBuffer) -> Result<T, OutOfSpace>,
) -> Result<Vec<T>, ConnectionErrorOrFailure> {
    let mut entries = Vec::new();
    loop {
        let has_more = buf.read_bool().map_err(truncated)?;
        let count = buf.read_u32().map_err(truncated)?;
        for _ in 0..count {
            entries.push(read_entry(buf).map_err(truncated)?);
        }
        if !has_more {
            return Ok(entries);
        }
        // Our blocking transport reads exactly the bytes a frame declares,
        // so there is never a trailing unread tail to preserve; `compact`
        // still runs for parity with a buffered-channel transport where it
        // would matter.
        buf.compact();
        response::read_response(conn, buf, expected_txn, deadline, remote_endpoint)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MIN_CAPACITY;

    #[test]
    fn decodes_entries_from_a_single_final_chunk() {
        // Build a buffer that already looks like a decoded final chunk:
        // has_more=false, count=2, entries "p" and "q" encoded as len+bytes.
        let mut buf = FramedBuffer::with_capacity(MIN_CAPACITY);
        buf.write_bool(false).expect("fits");
        buf.write_u32(2).expect("fits");
        write_str(&mut buf, "p");
        write_str(&mut buf, "q");
        buf.set_position(0);

        let mut conn = Connection::new("127.0.0.1:0".parse().expect("valid addr"));
        let result = read_chunked(&mut conn, &mut buf, 0, Instant::now(), "127.0.0.1:0".parse().expect("valid addr"), |b| {
            let len = b.read_u32()? as usize;
            let bytes = b.read_bytes(len)?;
            Ok(String::from_utf8_lossy(bytes).into_owned())
        });

        match result {
            Ok(values) => assert_eq!(values, vec!["p".to_string(), "q".to_string()]),
            Err(_) => panic!("single-chunk read should not touch the connection"),
        }
    }

    fn write_str(buf: &mut FramedBuffer, s: &str) {
        buf.write_u32(s.len() as u32).expect("fits");
        buf.write_bytes(s.as_bytes()).expect("fits");
    }
}

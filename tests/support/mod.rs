//! In-process mock remote map server for the integration tests.
//!
//! Mirrors the teacher's `TcpListener::bind("127.0.0.1:0")` + spawned-thread
//! accept pattern (see `server/legacy/unit_tests.rs`), adapted to this
//! crate's blocking, single-connection transport.

use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
};

/// A server the tests fully script: bind, accept one connection, hand back
/// the accepted stream for the test to drive by hand.
pub struct MockServer {
    listener: TcpListener,
}

impl MockServer {
    /// Bind to an ephemeral port on loopback.
    pub fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        Self { listener }
    }

    /// The address clients should connect to.
    pub fn addr(&self) -> SocketAddr {
        self.listener.local_addr().expect("listener has a local address")
    }

    /// Accept one connection and perform the server side of the handshake,
    /// replying with `peer_byte`.
    pub fn accept_with_handshake(&self, peer_byte: u8) -> TcpStream {
        let (mut stream, _peer) = self.listener.accept().expect("accept connection");
        let mut client_byte = [0u8; 1];
        stream.read_exact(&mut client_byte).expect("read handshake byte");
        assert_eq!(client_byte[0], remote_map_client::HANDSHAKE_BYTE);
        stream.write_all(&[peer_byte]).expect("write handshake reply");
        stream
    }
}

/// One parsed request frame: event tag, transaction id (if the event
/// expects a response), and the raw argument bytes after the header.
pub struct ReceivedRequest {
    /// The event tag byte (operation ordinal).
    pub tag: u8,
    /// The transaction id, if this event expects a response.
    pub txn: Option<u64>,
    /// Argument bytes following the header.
    pub args: Vec<u8>,
}

/// Read one request frame: `[tag:1][size:4][body:size]`. `expects_response`
/// tells the reader whether the first 8 bytes of `body` are a transaction
/// id (true for every event except the `_WITHOUT_ACK` variants).
pub fn read_request(stream: &mut TcpStream, expects_response: bool) -> ReceivedRequest {
    let mut tag_byte = [0u8; 1];
    stream.read_exact(&mut tag_byte).expect("read tag");
    let mut size_bytes = [0u8; 4];
    stream.read_exact(&mut size_bytes).expect("read size");
    let size = u32::from_ne_bytes(size_bytes) as usize;
    let mut body = vec![0u8; size];
    stream.read_exact(&mut body).expect("read body");

    if expects_response {
        let (txn_bytes, args) = body.split_at(8);
        let txn = u64::from_ne_bytes(txn_bytes.try_into().expect("8-byte txn slot"));
        ReceivedRequest {
            tag: tag_byte[0],
            txn: Some(txn),
            args: args.to_vec(),
        }
    } else {
        ReceivedRequest {
            tag: tag_byte[0],
            txn: None,
            args: body,
        }
    }
}

/// Write one response frame: `[size:4][isException:1][txn:8][payload]`.
pub fn write_response(stream: &mut TcpStream, is_exception: bool, txn: u64, payload: &[u8]) {
    let body_len = 1 + 8 + payload.len();
    let size = u32::try_from(body_len).expect("test payload fits u32");
    stream.write_all(&size.to_ne_bytes()).expect("write size");
    stream
        .write_all(&[u8::from(is_exception)])
        .expect("write exception flag");
    stream.write_all(&txn.to_ne_bytes()).expect("write txn");
    stream.write_all(payload).expect("write payload");
}

/// Encode a blob the way [`remote_map_client::codec::BlobCodec`] does: a
/// stop-bit length prefix followed by the raw bytes.
pub fn encode_blob(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut len = bytes.len() as u64;
    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
            out.push(byte);
        } else {
            out.push(byte);
            break;
        }
    }
    out.extend_from_slice(bytes);
    out
}

//! End-to-end scenarios against an in-process mock server, covering the
//! concrete cases and invariants.

#![cfg_attr(test, expect(clippy::unwrap_used, reason = "test code can panic"))]
#![cfg_attr(test, expect(clippy::expect_used, reason = "test code can panic"))]

mod support;

use std::{thread, time::Duration};

use remote_map_client::{RemoteMapClient, RemoteMapConfig, codec::BlobCodec};
use support::{MockServer, encode_blob, read_request, write_response};

fn config(addr: std::net::SocketAddr) -> RemoteMapConfig {
    RemoteMapConfig {
        remote_address: addr,
        timeout_ms: 2_000,
        name: "test-map".to_owned(),
        put_returns_null: false,
        remove_returns_null: false,
        entry_size_hint: 256,
    }
}

/// S1 — `size()` round trip: server expects event tag 3 (`SIZE`), a
/// transaction id, and responds with an `i32` count.
#[test]
fn size_round_trip() {
    let server = MockServer::bind();
    let addr = server.addr();
    let handle = thread::spawn(move || {
        let mut stream = server.accept_with_handshake(0x07);
        let req = read_request(&mut stream, true);
        assert_eq!(req.tag, remote_map_client::EventTag::Size.ordinal());
        assert!(req.txn.expect("size expects a txn id") >= 1);
        write_response(&mut stream, false, req.txn.expect("txn"), &42i32.to_ne_bytes());
    });

    let client = RemoteMapClient::new(config(addr), BlobCodec, BlobCodec);
    let result = client.size().expect("size succeeds");
    assert_eq!(result, 42);
    handle.join().expect("mock server thread");
}

/// S3 — `put` with `put_returns_null = true` uses `PUT_WITHOUT_ACK` (tag 9),
/// omits the transaction id, and never reads a response.
#[test]
fn put_without_ack_skips_response() {
    let server = MockServer::bind();
    let addr = server.addr();
    let handle = thread::spawn(move || {
        let mut stream = server.accept_with_handshake(0x07);
        let req = read_request(&mut stream, false);
        assert_eq!(req.tag, remote_map_client::EventTag::PutWithoutAck.ordinal());
        assert!(req.txn.is_none());
        let mut expected = encode_blob(b"a");
        expected.extend(encode_blob(b"b"));
        assert_eq!(req.args, expected);
    });

    let mut cfg = config(addr);
    cfg.put_returns_null = true;
    let client = RemoteMapClient::new(cfg, BlobCodec, BlobCodec);
    let prior = client.put(&b"a".to_vec(), &b"b".to_vec()).expect("put succeeds");
    assert_eq!(prior, None);
    handle.join().expect("mock server thread");
}

/// S4 — the transport closes between send and receive; the client
/// reconnects within the deadline and resends with the same transaction id.
#[test]
fn reconnect_resends_same_transaction_id() {
    let server = MockServer::bind();
    let addr = server.addr();
    let handle = thread::spawn(move || {
        let mut first = server.accept_with_handshake(0x07);
        let first_req = read_request(&mut first, true);
        drop(first); // close without responding

        let mut second = server.accept_with_handshake(0x07);
        let second_req = read_request(&mut second, true);
        assert_eq!(first_req.txn, second_req.txn, "retry must reuse the transaction id");
        write_response(&mut second, false, second_req.txn.expect("txn"), &7i32.to_ne_bytes());
    });

    let client = RemoteMapClient::new(config(addr), BlobCodec, BlobCodec);
    let result = client.size().expect("size succeeds after reconnect");
    assert_eq!(result, 7);
    handle.join().expect("mock server thread");
}

/// S5 — the server reports a remote exception; the client raises
/// `RemoteFailure` with a synthetic `~ remote tcp ~ host port` frame.
#[test]
fn remote_exception_is_surfaced_with_endpoint() {
    let server = MockServer::bind();
    let addr = server.addr();
    let handle = thread::spawn(move || {
        let mut stream = server.accept_with_handshake(0x07);
        let req = read_request(&mut stream, true);
        let mut payload = Vec::new();
        payload.extend(encode_blob(b"java.lang.IllegalStateException"));
        payload.extend(encode_blob(b"missing table"));
        payload.push(0); // stop-bit zero frame count
        write_response(&mut stream, true, req.txn.expect("txn"), &payload);
    });

    let client = RemoteMapClient::new(config(addr), BlobCodec, BlobCodec);
    let err = client.get(&b"k".to_vec()).expect_err("server reported an exception");
    let message = err.to_string();
    assert!(message.contains("missing table"));
    let remote_map_client::RemoteMapError::RemoteFailure(failure) = err else {
        panic!("expected RemoteFailure, got {err:?}");
    };
    assert_eq!(failure.remote_endpoint, addr);
    assert!(failure.to_string().contains("~ remote tcp ~"));
    handle.join().expect("mock server thread");
}

/// S6 — `values()` reassembles a two-chunk streaming response in order.
#[test]
fn chunked_values_concatenate_in_order() {
    let server = MockServer::bind();
    let addr = server.addr();
    let handle = thread::spawn(move || {
        let mut stream = server.accept_with_handshake(0x07);
        let req = read_request(&mut stream, true);
        let txn = req.txn.expect("txn");

        let mut first_chunk = Vec::new();
        first_chunk.push(1u8); // has_more = true
        first_chunk.extend(3u32.to_ne_bytes());
        for value in [b"x".as_slice(), b"y", b"z"] {
            first_chunk.extend(encode_blob(value));
        }
        write_response(&mut stream, false, txn, &first_chunk);

        let mut second_chunk = Vec::new();
        second_chunk.push(0u8); // has_more = false
        second_chunk.extend(2u32.to_ne_bytes());
        for value in [b"p".as_slice(), b"q"] {
            second_chunk.extend(encode_blob(value));
        }
        write_response(&mut stream, false, txn, &second_chunk);
    });

    let client = RemoteMapClient::new(config(addr), BlobCodec, BlobCodec);
    let values = client.values().expect("values succeeds");
    let as_strings: Vec<String> = values
        .into_iter()
        .map(|v| String::from_utf8(v).expect("utf8"))
        .collect();
    assert_eq!(as_strings, vec!["x", "y", "z", "p", "q"]);
    handle.join().expect("mock server thread");
}

/// Unsupported operations fail synchronously with no I/O at all — no mock
/// server is started for this test.
#[test]
fn unsupported_operations_fail_without_any_io() {
    let client = RemoteMapClient::new(
        config("127.0.0.1:1".parse().expect("valid addr")),
        BlobCodec,
        BlobCodec,
    );
    assert!(matches!(
        client.get_using(),
        Err(remote_map_client::RemoteMapError::Unsupported("get_using"))
    ));
    assert!(matches!(
        client.file(),
        Err(remote_map_client::RemoteMapError::Unsupported("file"))
    ));
}

/// A round trip deadline that can never be met raises `RemoteCallTimeout`
/// rather than hanging.
#[test]
fn timeout_is_raised_when_server_never_responds() {
    let server = MockServer::bind();
    let addr = server.addr();
    let handle = thread::spawn(move || {
        let _stream = server.accept_with_handshake(0x07);
        thread::sleep(Duration::from_millis(500));
    });

    let mut cfg = config(addr);
    cfg.timeout_ms = 100;
    let client = RemoteMapClient::new(cfg, BlobCodec, BlobCodec);
    let err = client.size().expect_err("server never responds in time");
    assert!(matches!(
        err,
        remote_map_client::RemoteMapError::RemoteCallTimeout(_)
    ));
    handle.join().expect("mock server thread");
}

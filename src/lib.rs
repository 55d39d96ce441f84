#![cfg_attr(test, expect(clippy::unwrap_used, reason = "test code can panic"))]
#![cfg_attr(test, expect(clippy::expect_used, reason = "test code can panic"))]
//! A stateless client for a remote Chronicle-Map-style map server.
//!
//! The client holds one TCP connection, one reused wire buffer, and one
//! transaction clock; every operation serializes through a single mutex
//! (spec §5) so a client instance is safe to share across threads but never
//! runs two requests concurrently. Callers needing parallelism should create
//! multiple client instances.
//!
//! ```no_run
//! use remote_map_client::{RemoteMapClient, RemoteMapConfig, codec::BlobCodec};
//!
//! # fn main() -> Result<(), remote_map_client::RemoteMapError> {
//! let config = RemoteMapConfig {
//!     remote_address: "127.0.0.1:9191".parse().expect("valid socket address"),
//!     timeout_ms: 5_000,
//!     name: "orders".to_owned(),
//!     put_returns_null: false,
//!     remove_returns_null: false,
//!     entry_size_hint: 256,
//! };
//! let client = RemoteMapClient::new(config, BlobCodec, BlobCodec);
//! client.put(&b"a".to_vec(), &b"b".to_vec())?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod client;
pub mod clock;
pub mod codec;
pub mod config;
pub(crate) mod chunked;
pub(crate) mod connection;
pub mod error;
pub mod event;
pub(crate) mod exchange;
pub(crate) mod request;
pub(crate) mod response;

pub use buffer::FramedBuffer;
pub use client::RemoteMapClient;
pub use clock::TransactionClock;
pub use config::RemoteMapConfig;
pub use connection::HANDSHAKE_BYTE;
pub use error::{RemoteFailure, RemoteFrame, RemoteMapError};
pub use event::EventTag;

//! Client configuration (spec §6's "collaborator config").
//!
//! The library itself never reads environment variables or files; the CLI
//! demo binary is responsible for assembling a [`RemoteMapConfig`] from
//! layered sources (see `src/bin/remote_map_cli.rs`).

use std::{net::SocketAddr, time::Duration};

/// Immutable configuration for one [`crate::client::RemoteMapClient`] instance.
#[derive(Debug, Clone)]
pub struct RemoteMapConfig {
    /// Address of the remote map server.
    pub remote_address: SocketAddr,
    /// Per-operation deadline, from connect through response decode.
    pub timeout_ms: u64,
    /// Human-readable map name, used only in logging.
    pub name: String,
    /// When true, `put` uses `PUT_WITHOUT_ACK` and always returns `None`
    /// without reading a response.
    pub put_returns_null: bool,
    /// Symmetric to `put_returns_null` for `remove`.
    pub remove_returns_null: bool,
    /// Initial guess at the largest single entry's encoded size, used to
    /// size the first `FramedBuffer` and seed `max_entry_size` for `put_all`.
    pub entry_size_hint: usize,
}

impl RemoteMapConfig {
    /// The configured timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_converts_milliseconds_to_duration() {
        let config = RemoteMapConfig {
            remote_address: "127.0.0.1:1234".parse().expect("valid addr"),
            timeout_ms: 2_500,
            name: "orders".to_owned(),
            put_returns_null: false,
            remove_returns_null: false,
            entry_size_hint: 128,
        };
        assert_eq!(config.timeout(), Duration::from_millis(2_500));
    }
}

//! [`TransactionClock`]: strictly monotonically increasing transaction ids
//! derived from wall-clock milliseconds (component C4).
//!
//! Not thread-safe on its own; serialized by the client's outer per-instance
//! mutex (spec §5), so a plain `&mut self` is the right shape here rather
//! than an atomic.

/// Generates strictly increasing transaction ids.
#[derive(Debug, Default)]
pub struct TransactionClock {
    last: Option<u64>,
}

impl TransactionClock {
    /// Create a clock that has not yet issued any id.
    #[must_use]
    pub const fn new() -> Self { Self { last: None } }

    /// Produce the next transaction id given the current wall-clock
    /// milliseconds.
    ///
    /// If `now_ms` is less than or equal to the last issued id, returns
    /// `last + 1`; otherwise returns and records `now_ms` directly. Checking
    /// `<=` rather than `==` keeps the sequence strictly increasing even
    /// after a burst of collisions has pushed `last` ahead of the wall clock.
    pub fn next(&mut self, now_ms: u64) -> u64 {
        let id = match self.last {
            Some(last) if now_ms <= last => last + 1,
            _ => now_ms,
        };
        self.last = Some(id);
        id
    }
}

//! The closed, positional event-tag enumeration.
//!
//! Ordinals are wire format: reordering this list breaks compatibility with
//! every deployed server, so the derive order below must never change.

/// Single-byte operation selector. The ordinal (declaration order) is the
/// value written to the wire, per spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventTag {
    /// Keep-alive ping; the server echoes it back.
    Heartbeat = 0,
    /// Server-pushed update to a previously observed entry (unused by this client).
    StatefulUpdate,
    /// `long_size()`.
    LongSize,
    /// `size()`.
    Size,
    /// `is_empty()`.
    IsEmpty,
    /// `contains_key()`.
    ContainsKey,
    /// `contains_value()`.
    ContainsValue,
    /// `get()`.
    Get,
    /// `put()`, acknowledged.
    Put,
    /// `put()`, fire-and-forget.
    PutWithoutAck,
    /// `remove()`, acknowledged.
    Remove,
    /// `remove()`, fire-and-forget.
    RemoveWithoutAck,
    /// `clear()`.
    Clear,
    /// `key_set()`.
    KeySet,
    /// `values()`.
    Values,
    /// `entry_set()`.
    EntrySet,
    /// `replace()`.
    Replace,
    /// `replace_with_old_and_new_value()`.
    ReplaceWithOldAndNewValue,
    /// `put_if_absent()`.
    PutIfAbsent,
    /// `remove_with_value()`.
    RemoveWithValue,
    /// `to_string_remote()`.
    ToString,
    /// `put_all()`, acknowledged.
    PutAll,
    /// `put_all()`, fire-and-forget.
    PutAllWithoutAck,
    /// `hash_code()`.
    HashCode,
    /// `map_for_key()`.
    MapForKey,
    /// `update_for_key()`.
    UpdateForKey,
}

impl EventTag {
    /// The byte written to the wire for this event.
    #[must_use]
    pub const fn ordinal(self) -> u8 { self as u8 }

    /// Does this event expect a response frame?
    ///
    /// All events expect a response except the `*_WITHOUT_ACK` fire-and-forget
    /// variants.
    #[must_use]
    pub const fn expects_response(self) -> bool {
        !matches!(
            self,
            Self::PutWithoutAck | Self::RemoveWithoutAck | Self::PutAllWithoutAck
        )
    }
}

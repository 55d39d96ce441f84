//! [`RequestBuilder`]: stages one request in a [`FramedBuffer`], handling
//! the grow-and-retry dance around `OutOfSpace` (component C5).

use crate::{buffer::FramedBuffer, codec, error::OutOfSpace, event::EventTag};

/// Retry a single encode step, growing `buf` on [`OutOfSpace`] and retrying
/// at the anchor (the position before this attempt began), per spec §4.5
/// step 5. Always eventually succeeds: each failed attempt grows the buffer
/// by at least one byte, so there is no path that returns without a result.
///
/// `max_entry_size` is raised by callers that observe larger entries (e.g.
/// `put_all`); this function only reads it to size the grow step.
pub(crate) fn encode_with_retry<F>(buf: &mut FramedBuffer, max_entry_size: usize, mut write: F)
where
    F: FnMut(&mut FramedBuffer) -> Result<(), OutOfSpace>,
{
    loop {
        let anchor = buf.position();
        match write(buf) {
            Ok(()) => return,
            Err(out_of_space) => {
                let growth = match out_of_space.required {
                    Some(needed) => needed.saturating_sub(buf.remaining()).max(max_entry_size),
                    None => max_entry_size,
                };
                buf.resize(buf.capacity() + growth.max(1), anchor);
            }
        }
    }
}

/// Stages the fixed request header (event tag, size slot, optional
/// transaction-id slot) and remembers where to patch the size field once the
/// payload is known.
pub(crate) struct RequestBuilder {
    size_slot: usize,
    expects_response: bool,
}

impl RequestBuilder {
    /// Begin a new request: clears `buf`, writes the event tag, and reserves
    /// the size (and, if `expects_response`, transaction-id) slots.
    pub(crate) fn begin(buf: &mut FramedBuffer, tag: EventTag, max_entry_size: usize) -> Self {
        buf.clear();
        encode_with_retry(buf, max_entry_size, |b| codec::write_event_tag(b, tag));
        let size_slot = buf.position();
        encode_with_retry(buf, max_entry_size, |b| b.skip(4));
        let expects_response = tag.expects_response();
        if expects_response {
            encode_with_retry(buf, max_entry_size, |b| b.skip(8));
        }
        Self {
            size_slot,
            expects_response,
        }
    }

    /// Patch the size field (and transaction id, if this operation expects a
    /// response) now that the payload has been written.
    pub(crate) fn finish(self, buf: &mut FramedBuffer, txn_id: Option<u64>) {
        let payload_len = u32::try_from(buf.position() - self.size_slot - 4).unwrap_or(u32::MAX);
        if self.expects_response {
            let id = txn_id.unwrap_or(0);
            buf.write_u64_at(self.size_slot + 4, id);
        }
        buf.write_u32_at(self.size_slot, payload_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventTag;

    #[test]
    fn begin_reserves_size_and_txn_slots_for_acked_ops() {
        let mut buf = FramedBuffer::with_capacity(128);
        let builder = RequestBuilder::begin(&mut buf, EventTag::Put, 128);
        // tag (1) + size (4) + txn (8) = 13
        assert_eq!(buf.position(), 13);
        builder.finish(&mut buf, Some(42));
        buf.set_position(0);
        assert_eq!(buf.read_u8().expect("tag"), EventTag::Put.ordinal());
        assert_eq!(buf.read_u32().expect("size"), 8); // just the txn id, no payload
        assert_eq!(buf.read_u64().expect("txn"), 42);
    }

    #[test]
    fn begin_skips_txn_slot_for_without_ack_ops() {
        let mut buf = FramedBuffer::with_capacity(128);
        let builder = RequestBuilder::begin(&mut buf, EventTag::PutWithoutAck, 128);
        assert_eq!(buf.position(), 5); // tag (1) + size (4), no txn slot
        builder.finish(&mut buf, None);
        buf.set_position(0);
        assert_eq!(buf.read_u8().expect("tag"), EventTag::PutWithoutAck.ordinal());
        assert_eq!(buf.read_u32().expect("size"), 0);
    }

    #[test]
    fn encode_with_retry_grows_buffer_and_preserves_anchor_retry() {
        let mut buf = FramedBuffer::with_capacity(128);
        buf.set_position(120);
        let mut attempts = 0;
        encode_with_retry(&mut buf, 128, |b| {
            attempts += 1;
            b.write_bytes(&[0u8; 32])
        });
        assert_eq!(attempts, 2, "first attempt fails, second succeeds post-resize");
        assert!(buf.capacity() > 128);
    }
}

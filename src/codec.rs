//! Wire-level primitive encoding and the `Serializer<T>` collaborator
//! contract (component C2).
//!
//! The codec itself only knows stop-bit varints, the event tag byte, and
//! transaction ids; key/value encoding is delegated to a caller-supplied
//! [`Serializer<T>`] so this crate never needs to know the map's key or
//! value types.

use crate::{buffer::FramedBuffer, error::OutOfSpace, event::EventTag};

/// A serializer/deserializer pair for one type, supplied by the caller.
///
/// Implementations may raise [`OutOfSpace`] from `write` when the buffer is
/// too small; [`crate::request::RequestBuilder`] catches it, grows the
/// buffer, and retries the write at the same anchor. `required` should be
/// populated whenever the implementation knows exactly how many bytes it
/// needed, so the grow step can size the new buffer precisely instead of
/// falling back to the generic `max_entry_size` bump.
pub trait Serializer<T> {
    /// Write `value` into `buf` at the current cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] if `buf` does not have enough room.
    fn write(&self, value: &T, buf: &mut FramedBuffer) -> Result<(), OutOfSpace>;

    /// Read one value from `buf` at the current cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] if `buf` does not contain a full encoded value.
    fn read(&self, buf: &mut FramedBuffer) -> Result<T, OutOfSpace>;
}

/// Length-prefixed opaque byte blob codec, used for the function-object
/// payloads of `MAP_FOR_KEY`/`UPDATE_FOR_KEY` and for decoding the server's
/// serialized remote-exception payload. Not user-configurable: both sides of
/// the wire agree on this framing independently of the key/value
/// serializers.
pub struct BlobCodec;

impl Serializer<Vec<u8>> for BlobCodec {
    fn write(&self, value: &Vec<u8>, buf: &mut FramedBuffer) -> Result<(), OutOfSpace> {
        write_stop_bit(buf, value.len() as u64)?;
        buf.write_bytes(value)
    }

    fn read(&self, buf: &mut FramedBuffer) -> Result<Vec<u8>, OutOfSpace> {
        let len = read_stop_bit(buf)? as usize;
        Ok(buf.read_bytes(len)?.to_vec())
    }
}

/// Write the event tag byte (the operation's ordinal).
pub(crate) fn write_event_tag(buf: &mut FramedBuffer, tag: EventTag) -> Result<(), OutOfSpace> {
    buf.write_u8(tag.ordinal())
}

/// Write an unsigned integer as a stop-bit varint: 7 bits per byte, high bit
/// set on every byte except the last.
pub fn write_stop_bit(buf: &mut FramedBuffer, mut value: u64) -> Result<(), OutOfSpace> {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
            buf.write_u8(byte)?;
        } else {
            buf.write_u8(byte)?;
            break;
        }
    }
    Ok(())
}

/// Read a stop-bit varint written by [`write_stop_bit`].
pub fn read_stop_bit(buf: &mut FramedBuffer) -> Result<u64, OutOfSpace> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = buf.read_u8()?;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::buffer::MIN_CAPACITY;

    #[test]
    fn stop_bit_round_trips_small_and_large_values() {
        for v in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = FramedBuffer::with_capacity(MIN_CAPACITY);
            write_stop_bit(&mut buf, v).expect("fits");
            buf.set_position(0);
            assert_eq!(read_stop_bit(&mut buf).expect("decodes"), v);
        }
    }

    #[test]
    fn blob_codec_round_trips() {
        let mut buf = FramedBuffer::with_capacity(MIN_CAPACITY);
        let blob = vec![1u8, 2, 3, 4, 5];
        BlobCodec.write(&blob, &mut buf).expect("fits");
        buf.set_position(0);
        assert_eq!(BlobCodec.read(&mut buf).expect("decodes"), blob);
    }

    proptest! {
        #[test]
        fn stop_bit_round_trips_any_u64(v in any::<u64>()) {
            let mut buf = FramedBuffer::with_capacity(4096);
            write_stop_bit(&mut buf, v).expect("fits 4096-byte buffer");
            buf.set_position(0);
            prop_assert_eq!(read_stop_bit(&mut buf).expect("decodes"), v);
        }
    }
}

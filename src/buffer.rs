//! [`FramedBuffer`]: a growable, native-endian byte buffer with cursor
//! semantics, plus in-place resize that preserves already-written bytes.
//!
//! This is the lowest layer of the protocol engine (component C1). Everything
//! above it — [`crate::codec`], [`crate::request`], [`crate::response`] —
//! reads and writes through this buffer rather than touching raw `Vec<u8>`.

#![expect(
    clippy::host_endian_bytes,
    reason = "the wire protocol is native-endian by contract (spec §3)"
)]

use crate::error::OutOfSpace;

/// Minimum capacity a [`FramedBuffer`] is ever constructed or resized to.
pub const MIN_CAPACITY: usize = 128;

/// A growable byte buffer with `(capacity, position, limit)` cursor
/// semantics, matching the classic byte-buffer model the wire protocol was
/// designed against.
///
/// Invariant: `0 <= position <= limit <= capacity` always holds between
/// public calls.
#[derive(Debug)]
pub struct FramedBuffer {
    data: Vec<u8>,
    position: usize,
    limit: usize,
}

impl FramedBuffer {
    /// Create a new buffer with at least `capacity` bytes (floored to
    /// [`MIN_CAPACITY`]).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let floored_capacity = capacity.max(MIN_CAPACITY);
        Self {
            data: vec![0u8; floored_capacity],
            position: 0,
            limit: floored_capacity,
        }
    }

    /// Current write/read cursor.
    #[must_use]
    pub const fn position(&self) -> usize { self.position }

    /// Upper bound readable/writable without a resize.
    #[must_use]
    pub const fn limit(&self) -> usize { self.limit }

    /// Total backing storage.
    #[must_use]
    pub const fn capacity(&self) -> usize { self.data.len() }

    /// Bytes available between `position` and `limit`.
    #[must_use]
    pub const fn remaining(&self) -> usize { self.limit - self.position }

    /// Reset the cursor: `position <- 0`, `limit <- capacity`.
    pub fn clear(&mut self) {
        self.position = 0;
        self.limit = self.data.len();
    }

    /// Move the cursor to an absolute position without touching contents.
    ///
    /// # Panics
    /// Panics if `pos` exceeds `limit`; callers only ever seek to positions
    /// they just wrote, so this is a programmer error, not a wire-data error.
    pub fn set_position(&mut self, pos: usize) {
        assert!(pos <= self.limit, "set_position past limit");
        self.position = pos;
    }

    /// Advance the cursor by `n` bytes without reading or writing.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] if the skip would cross `limit`.
    pub(crate) fn skip(&mut self, n: usize) -> Result<(), OutOfSpace> {
        let new_pos = self.position.checked_add(n).ok_or(OutOfSpace { required: None })?;
        if new_pos > self.limit {
            return Err(OutOfSpace {
                required: Some(new_pos - self.limit),
            });
        }
        self.position = new_pos;
        Ok(())
    }

    fn ensure_room(&self, n: usize) -> Result<(), OutOfSpace> {
        if self.position + n > self.limit {
            return Err(OutOfSpace {
                required: Some(self.position + n - self.limit),
            });
        }
        Ok(())
    }

    /// Write a single byte, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] if the write would cross `limit`.
    pub fn write_u8(&mut self, v: u8) -> Result<(), OutOfSpace> {
        self.ensure_room(1)?;
        let Some(slot) = self.data.get_mut(self.position) else {
            return Err(OutOfSpace { required: Some(1) });
        };
        *slot = v;
        self.position += 1;
        Ok(())
    }

    /// Write raw bytes, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] if the write would cross `limit`.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), OutOfSpace> {
        self.ensure_room(bytes.len())?;
        let Some(dst) = self.data.get_mut(self.position..self.position + bytes.len()) else {
            return Err(OutOfSpace {
                required: Some(bytes.len()),
            });
        };
        dst.copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }

    /// Write a native-endian `u32`, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] if the write would cross `limit`.
    pub fn write_u32(&mut self, v: u32) -> Result<(), OutOfSpace> { self.write_bytes(&v.to_ne_bytes()) }

    /// Write a native-endian `i32`, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] if the write would cross `limit`.
    pub fn write_i32(&mut self, v: i32) -> Result<(), OutOfSpace> { self.write_bytes(&v.to_ne_bytes()) }

    /// Write a native-endian `u64`, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] if the write would cross `limit`.
    pub fn write_u64(&mut self, v: u64) -> Result<(), OutOfSpace> { self.write_bytes(&v.to_ne_bytes()) }

    /// Write a native-endian `i64`, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] if the write would cross `limit`.
    pub fn write_i64(&mut self, v: i64) -> Result<(), OutOfSpace> { self.write_bytes(&v.to_ne_bytes()) }

    /// Write a boolean as a single byte, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] if the write would cross `limit`.
    pub fn write_bool(&mut self, v: bool) -> Result<(), OutOfSpace> { self.write_u8(u8::from(v)) }

    /// Patch a `u32` at `offset` without moving the cursor.
    ///
    /// # Panics
    /// Panics if `offset + 4` exceeds capacity; callers only patch slots they
    /// reserved earlier in the same encoding pass.
    pub fn write_u32_at(&mut self, offset: usize, v: u32) {
        let Some(dst) = self.data.get_mut(offset..offset + 4) else {
            panic!("write_u32_at out of bounds");
        };
        dst.copy_from_slice(&v.to_ne_bytes());
    }

    /// Patch a `u64` at `offset` without moving the cursor.
    ///
    /// # Panics
    /// Panics if `offset + 8` exceeds capacity; callers only patch slots they
    /// reserved earlier in the same encoding pass.
    pub fn write_u64_at(&mut self, offset: usize, v: u64) {
        let Some(dst) = self.data.get_mut(offset..offset + 8) else {
            panic!("write_u64_at out of bounds");
        };
        dst.copy_from_slice(&v.to_ne_bytes());
    }

    /// Read a single byte, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] (read-side: truncated) past `limit`.
    pub fn read_u8(&mut self) -> Result<u8, OutOfSpace> {
        let Some(&b) = self.data.get(self.position) else {
            return Err(OutOfSpace { required: Some(1) });
        };
        if self.position >= self.limit {
            return Err(OutOfSpace { required: Some(1) });
        }
        self.position += 1;
        Ok(b)
    }

    /// Read `n` raw bytes, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] (truncated) past `limit`.
    pub fn read_bytes(&mut self, n: usize) -> Result<&[u8], OutOfSpace> {
        if self.position + n > self.limit {
            return Err(OutOfSpace { required: Some(n) });
        }
        let Some(slice) = self.data.get(self.position..self.position + n) else {
            return Err(OutOfSpace { required: Some(n) });
        };
        self.position += n;
        Ok(slice)
    }

    /// Read a native-endian `u32`, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] (truncated) past `limit`.
    pub fn read_u32(&mut self) -> Result<u32, OutOfSpace> {
        let bytes = self.read_bytes(4)?;
        let arr: [u8; 4] = bytes.try_into().map_err(|_| OutOfSpace { required: Some(4) })?;
        Ok(u32::from_ne_bytes(arr))
    }

    /// Read a native-endian `i32`, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] (truncated) past `limit`.
    pub fn read_i32(&mut self) -> Result<i32, OutOfSpace> {
        let bytes = self.read_bytes(4)?;
        let arr: [u8; 4] = bytes.try_into().map_err(|_| OutOfSpace { required: Some(4) })?;
        Ok(i32::from_ne_bytes(arr))
    }

    /// Read a native-endian `u64`, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] (truncated) past `limit`.
    pub fn read_u64(&mut self) -> Result<u64, OutOfSpace> {
        let bytes = self.read_bytes(8)?;
        let arr: [u8; 8] = bytes.try_into().map_err(|_| OutOfSpace { required: Some(8) })?;
        Ok(u64::from_ne_bytes(arr))
    }

    /// Read a native-endian `i64`, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] (truncated) past `limit`.
    pub fn read_i64(&mut self) -> Result<i64, OutOfSpace> {
        let bytes = self.read_bytes(8)?;
        let arr: [u8; 8] = bytes.try_into().map_err(|_| OutOfSpace { required: Some(8) })?;
        Ok(i64::from_ne_bytes(arr))
    }

    /// Read a boolean byte, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfSpace`] (truncated) past `limit`.
    pub fn read_bool(&mut self) -> Result<bool, OutOfSpace> { Ok(self.read_u8()? != 0) }

    /// Grow the buffer to at least `new_capacity`, preserving bytes
    /// `[0, position)`, then restore the cursor to `anchor` so the caller can
    /// retry the write that triggered the resize.
    ///
    /// Never shrinks: if `new_capacity <= capacity()` the backing storage is
    /// still reallocated fresh (simplifying the invariant that resize always
    /// produces a buffer at least as large as requested) but capacity never
    /// decreases in practice because callers only call this after an
    /// [`OutOfSpace`].
    pub fn resize(&mut self, new_capacity: usize, anchor: usize) {
        let floored_capacity = new_capacity.max(self.data.len()).max(MIN_CAPACITY);
        let mut grown = vec![0u8; floored_capacity];
        let preserved = self.position.min(self.data.len());
        if let Some(src) = self.data.get(..preserved)
            && let Some(dst) = grown.get_mut(..preserved)
        {
            dst.copy_from_slice(src);
        }
        self.data = grown;
        self.limit = self.data.len();
        self.position = anchor;
    }

    /// Shift any unread bytes (`[position, limit)`) to offset zero and reset
    /// the cursor to the end of that shifted region, discarding consumed
    /// bytes. Used by [`crate::chunked::ChunkedIterator`] between chunk
    /// reads so trailing bytes from one frame are not lost when the next
    /// frame is read into the same buffer.
    pub fn compact(&mut self) {
        let unread = self.limit - self.position;
        if unread == 0 {
            self.clear();
            return;
        }
        self.data.copy_within(self.position..self.limit, 0);
        self.position = unread;
        self.limit = self.data.len();
    }

    /// Cap `limit` at the current cursor and move the cursor back to
    /// `read_from`. Used once a frame has been fully written into the
    /// buffer, so subsequent reads cannot run past the frame into stale
    /// bytes left over from a larger previous frame.
    pub(crate) fn seal_from(&mut self, read_from: usize) {
        self.limit = self.position;
        self.position = read_from;
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn starts_with_capacity_at_least_128() {
        let buf = FramedBuffer::with_capacity(16);
        assert!(buf.capacity() >= MIN_CAPACITY);
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.limit(), buf.capacity());
    }

    #[test]
    fn write_past_limit_raises_out_of_space() {
        let mut buf = FramedBuffer::with_capacity(MIN_CAPACITY);
        buf.set_position(buf.limit() - 2);
        assert!(buf.write_u32(42).is_err());
    }

    #[test]
    fn resize_preserves_written_prefix_and_restores_anchor() {
        let mut buf = FramedBuffer::with_capacity(MIN_CAPACITY);
        buf.write_bytes(b"hello").expect("fits");
        let anchor = buf.position();
        buf.resize(4096, anchor);
        assert_eq!(buf.capacity(), 4096);
        assert_eq!(buf.position(), anchor);
        buf.set_position(0);
        assert_eq!(buf.read_bytes(5).expect("preserved"), b"hello");
    }

    #[test]
    fn resize_never_shrinks() {
        let mut buf = FramedBuffer::with_capacity(4096);
        buf.resize(16, 0);
        assert!(buf.capacity() >= 4096);
    }

    #[test]
    fn compact_shifts_unread_tail_to_front() {
        let mut buf = FramedBuffer::with_capacity(MIN_CAPACITY);
        buf.write_bytes(b"abcdef").expect("fits");
        buf.set_position(2);
        buf.compact();
        assert_eq!(buf.position(), 4);
        buf.set_position(0);
        assert_eq!(buf.read_bytes(4).expect("shifted tail"), b"cdef");
    }

    proptest! {
        #[test]
        fn resize_preserves_prefix_bytes(
            prefix in proptest::collection::vec(any::<u8>(), 0..120),
            extra_capacity in 0usize..8192,
        ) {
            let mut buf = FramedBuffer::with_capacity(MIN_CAPACITY);
            buf.write_bytes(&prefix).expect("prefix fits initial capacity");
            let anchor = buf.position();
            buf.resize(buf.capacity() + extra_capacity, anchor);
            buf.set_position(0);
            let read_back = buf.read_bytes(prefix.len()).expect("preserved prefix");
            prop_assert_eq!(read_back, prefix.as_slice());
        }
    }
}

//! [`RemoteMapClient`]: the externally visible operation surface, mapping
//! each map operation to an (event tag, encoded arguments, decode pattern)
//! per spec §4.9 (component C9).

use std::{
    sync::Mutex,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use tracing::{debug, instrument};

use crate::{
    buffer::FramedBuffer,
    chunked,
    codec::{BlobCodec, Serializer, write_stop_bit},
    config::RemoteMapConfig,
    connection::Connection,
    clock::TransactionClock,
    error::{OutOfSpace, RemoteMapError},
    event::EventTag,
    exchange::Exchange,
    request::RequestBuilder,
    response::ConnectionErrorOrFailure,
};

/// Mutable state guarded by the client's single per-instance mutex (spec
/// §5): the socket, the reused framed buffer, the transaction clock, and the
/// running `max_entry_size` watermark used by `put_all`'s pre-grow heuristic.
struct Inner {
    conn: Connection,
    buf: FramedBuffer,
    clock: TransactionClock,
    max_entry_size: usize,
}

/// A stateless client for one remote map, parameterised over its key and
/// value serializers.
///
/// All operations serialize through a single internal mutex: the socket and
/// the reused buffer are shared, so no two operations on the same client may
/// be in flight concurrently (spec §5). Callers needing parallelism should
/// create multiple client instances.
pub struct RemoteMapClient<K, V, SK, SV> {
    config: RemoteMapConfig,
    key_codec: SK,
    value_codec: SV,
    inner: Mutex<Inner>,
    _marker: std::marker::PhantomData<(K, V)>,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

impl<K, V, SK, SV> RemoteMapClient<K, V, SK, SV>
where
    SK: Serializer<K>,
    SV: Serializer<V>,
{
    /// Construct a client for `config`. Attempts one eager connect, but
    /// never fails if the server is unreachable — the first real operation
    /// reconnects lazily.
    #[must_use]
    pub fn new(config: RemoteMapConfig, key_codec: SK, value_codec: SV) -> Self {
        let mut conn = Connection::new(config.remote_address);
        conn.attempt_connect(config.timeout());
        let capacity = config.entry_size_hint.max(crate::buffer::MIN_CAPACITY);
        let max_entry_size = capacity;
        Self {
            config,
            key_codec,
            value_codec,
            inner: Mutex::new(Inner {
                conn,
                buf: FramedBuffer::with_capacity(capacity),
                clock: TransactionClock::new(),
                max_entry_size,
            }),
            _marker: std::marker::PhantomData,
        }
    }

    fn deadline(&self) -> Instant { Instant::now() + self.config.timeout() }

    fn lock_inner(&self) -> Result<std::sync::MutexGuard<'_, Inner>, RemoteMapError> {
        self.inner
            .lock()
            .map_err(|_| RemoteMapError::Io(std::io::Error::other("client mutex poisoned")))
    }

    /// Run one request/response round trip: stage the header with
    /// `encode_args`, exchange it, then decode the payload with `decode`.
    /// `expects_response` selects the `_WITHOUT_ACK` behaviour for `Put` and
    /// `Remove`; callers pass the already-resolved tag.
    fn call<F, D, R>(
        &self,
        tag: EventTag,
        mut encode_args: F,
        decode: D,
    ) -> Result<R, RemoteMapError>
    where
        F: FnMut(&mut FramedBuffer) -> Result<(), OutOfSpace>,
        D: FnOnce(&mut FramedBuffer) -> Result<R, OutOfSpace>,
        R: Default,
    {
        let deadline = self.deadline();
        let timeout = self.config.timeout();
        let mut guard = self.lock_inner()?;
        let Inner {
            conn,
            buf,
            clock,
            max_entry_size,
        } = &mut *guard;

        let builder = RequestBuilder::begin(buf, tag, *max_entry_size);
        crate::request::encode_with_retry(buf, *max_entry_size, &mut encode_args);
        let txn = tag.expects_response().then(|| clock.next(now_millis()));
        builder.finish(buf, txn);

        let request_len = buf.position();
        *max_entry_size = (*max_entry_size).max(request_len);
        let mut request = vec![0u8; request_len];
        buf.set_position(0);
        request.copy_from_slice(buf.read_bytes(request_len).map_err(truncated_err)?);

        let mut exchange = Exchange::new(conn);
        exchange.send_and_receive(
            buf,
            &request,
            txn.unwrap_or(0),
            tag.expects_response(),
            deadline,
            timeout,
        )?;

        if !tag.expects_response() {
            return Ok(R::default());
        }
        decode(buf).map_err(truncated_err)
    }

    /// The number of entries in the map.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    #[instrument(skip(self))]
    pub fn size(&self) -> Result<i32, RemoteMapError> {
        self.call(EventTag::Size, no_args, FramedBuffer::read_i32)
    }

    /// The number of entries in the map, as a 64-bit count.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn long_size(&self) -> Result<i64, RemoteMapError> {
        self.call(EventTag::LongSize, no_args, FramedBuffer::read_i64)
    }

    /// Whether the map has no entries.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn is_empty(&self) -> Result<bool, RemoteMapError> {
        self.call(EventTag::IsEmpty, no_args, FramedBuffer::read_bool)
    }

    /// Whether `key` is present in the map.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn contains_key(&self, key: &K) -> Result<bool, RemoteMapError> {
        self.call(
            EventTag::ContainsKey,
            |b| self.key_codec.write(key, b),
            FramedBuffer::read_bool,
        )
    }

    /// Whether `value` is present as some entry's value.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn contains_value(&self, value: &V) -> Result<bool, RemoteMapError> {
        self.call(
            EventTag::ContainsValue,
            |b| self.value_codec.write(value, b),
            FramedBuffer::read_bool,
        )
    }

    /// The value mapped to `key`, or `None` if absent.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn get(&self, key: &K) -> Result<Option<V>, RemoteMapError> {
        self.call(
            EventTag::Get,
            |b| self.key_codec.write(key, b),
            |b| read_optional(b, &self.value_codec),
        )
    }

    /// Insert `value` for `key`, returning the prior value.
    ///
    /// When `config.put_returns_null` is set, uses `PUT_WITHOUT_ACK` and
    /// always returns `None` without reading a response (spec §6).
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn put(&self, key: &K, value: &V) -> Result<Option<V>, RemoteMapError> {
        let tag = if self.config.put_returns_null {
            EventTag::PutWithoutAck
        } else {
            EventTag::Put
        };
        self.call(
            tag,
            |b| {
                self.key_codec.write(key, b)?;
                self.value_codec.write(value, b)
            },
            |b| read_optional(b, &self.value_codec),
        )
    }

    /// Remove the entry for `key`, returning its prior value.
    ///
    /// When `config.remove_returns_null` is set, uses `REMOVE_WITHOUT_ACK`
    /// and always returns `None` without reading a response.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn remove(&self, key: &K) -> Result<Option<V>, RemoteMapError> {
        let tag = if self.config.remove_returns_null {
            EventTag::RemoveWithoutAck
        } else {
            EventTag::Remove
        };
        self.call(
            tag,
            |b| self.key_codec.write(key, b),
            |b| read_optional(b, &self.value_codec),
        )
    }

    /// Remove the entry for `key` only if it currently maps to `value`.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn remove_with_value(&self, key: &K, value: &V) -> Result<bool, RemoteMapError> {
        self.call(
            EventTag::RemoveWithValue,
            |b| {
                self.key_codec.write(key, b)?;
                self.value_codec.write(value, b)
            },
            FramedBuffer::read_bool,
        )
    }

    /// Replace the value for `key` if present, returning the prior value.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn replace(&self, key: &K, value: &V) -> Result<Option<V>, RemoteMapError> {
        self.call(
            EventTag::Replace,
            |b| {
                self.key_codec.write(key, b)?;
                self.value_codec.write(value, b)
            },
            |b| read_optional(b, &self.value_codec),
        )
    }

    /// Replace `key`'s value with `new` only if it currently equals `old`.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn replace_with_old_and_new_value(
        &self,
        key: &K,
        old: &V,
        new: &V,
    ) -> Result<bool, RemoteMapError> {
        self.call(
            EventTag::ReplaceWithOldAndNewValue,
            |b| {
                self.key_codec.write(key, b)?;
                self.value_codec.write(old, b)?;
                self.value_codec.write(new, b)
            },
            FramedBuffer::read_bool,
        )
    }

    /// Insert `value` for `key` only if `key` is absent, returning the
    /// existing value when the insert did not happen.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn put_if_absent(&self, key: &K, value: &V) -> Result<Option<V>, RemoteMapError> {
        self.call(
            EventTag::PutIfAbsent,
            |b| {
                self.key_codec.write(key, b)?;
                self.value_codec.write(value, b)
            },
            |b| read_optional(b, &self.value_codec),
        )
    }

    /// Remove every entry.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn clear(&self) -> Result<(), RemoteMapError> {
        self.call(EventTag::Clear, no_args, |_| Ok(()))
    }

    /// All keys currently in the map, in server-chunk order.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn key_set(&self) -> Result<Vec<K>, RemoteMapError> {
        self.call_chunked(EventTag::KeySet, no_args, |b| self.key_codec.read(b))
    }

    /// All values currently in the map, in server-chunk order.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn values(&self) -> Result<Vec<V>, RemoteMapError> {
        self.call_chunked(EventTag::Values, no_args, |b| self.value_codec.read(b))
    }

    /// All entries currently in the map, in server-chunk order.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn entry_set(&self) -> Result<Vec<(K, V)>, RemoteMapError> {
        self.call_chunked(EventTag::EntrySet, no_args, |b| {
            let key = self.key_codec.read(b)?;
            let value = self.value_codec.read(b)?;
            Ok((key, value))
        })
    }

    /// Insert every entry in `entries`.
    ///
    /// Pre-grows the buffer per-entry using the running `max_entry_size`
    /// watermark, per spec §4.9's `put_all` growth heuristic. When
    /// `config.put_returns_null` is set, uses `PUT_ALL_WITHOUT_ACK`.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn put_all(&self, entries: &[(K, V)]) -> Result<(), RemoteMapError> {
        let tag = if self.config.put_returns_null {
            EventTag::PutAllWithoutAck
        } else {
            EventTag::PutAll
        };
        let total = entries.len();
        self.call(
            tag,
            |b| {
                write_stop_bit(b, total as u64)?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    let before = b.position();
                    self.key_codec.write(key, b)?;
                    self.value_codec.write(value, b)?;
                    let entry_len = b.position() - before;
                    debug!(index, entry_len, "encoded put_all entry");
                }
                Ok(())
            },
            |_| Ok(()),
        )
    }

    /// Server-delegated hash code for this map.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn hash_code(&self) -> Result<i32, RemoteMapError> {
        self.call(EventTag::HashCode, no_args, FramedBuffer::read_i32)
    }

    /// Server-rendered string representation of this map.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn to_string_remote(&self) -> Result<String, RemoteMapError> {
        self.call(EventTag::ToString, no_args, |b| {
            let len = crate::codec::read_stop_bit(b)? as usize;
            let bytes = b.read_bytes(len)?;
            Ok(String::from_utf8_lossy(bytes).into_owned())
        })
    }

    /// Apply a caller-serialized remote function to the entry for `key`,
    /// returning its serialized result.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn map_for_key(&self, key: &K, function: &[u8]) -> Result<Vec<u8>, RemoteMapError> {
        self.call(
            EventTag::MapForKey,
            |b| {
                self.key_codec.write(key, b)?;
                BlobCodec.write(&function.to_vec(), b)
            },
            |b| BlobCodec.read(b),
        )
    }

    /// Apply a caller-serialized remote mutating function to the entry for
    /// `key`, returning its serialized result.
    ///
    /// # Errors
    /// Propagates transport, protocol, and remote failures (spec §7).
    pub fn update_for_key(&self, key: &K, function: &[u8]) -> Result<Vec<u8>, RemoteMapError> {
        self.call(
            EventTag::UpdateForKey,
            |b| {
                self.key_codec.write(key, b)?;
                BlobCodec.write(&function.to_vec(), b)
            },
            |b| BlobCodec.read(b),
        )
    }

    /// Always fails: `get_using` is not reachable over this wire protocol
    /// (spec §4.9).
    ///
    /// # Errors
    /// Always returns [`RemoteMapError::Unsupported`].
    pub fn get_using(&self) -> Result<(), RemoteMapError> {
        Err(RemoteMapError::Unsupported("get_using"))
    }

    /// Always fails: `acquire_using` is not reachable over this wire
    /// protocol (spec §4.9).
    ///
    /// # Errors
    /// Always returns [`RemoteMapError::Unsupported`].
    pub fn acquire_using(&self) -> Result<(), RemoteMapError> {
        Err(RemoteMapError::Unsupported("acquire_using"))
    }

    /// Always fails: `get_using_locked` is not reachable over this wire
    /// protocol (spec §4.9).
    ///
    /// # Errors
    /// Always returns [`RemoteMapError::Unsupported`].
    pub fn get_using_locked(&self) -> Result<(), RemoteMapError> {
        Err(RemoteMapError::Unsupported("get_using_locked"))
    }

    /// Always fails: `acquire_using_locked` is not reachable over this wire
    /// protocol (spec §4.9).
    ///
    /// # Errors
    /// Always returns [`RemoteMapError::Unsupported`].
    pub fn acquire_using_locked(&self) -> Result<(), RemoteMapError> {
        Err(RemoteMapError::Unsupported("acquire_using_locked"))
    }

    /// Always fails: bulk file import/export is not reachable over this
    /// wire protocol (spec §4.9).
    ///
    /// # Errors
    /// Always returns [`RemoteMapError::Unsupported`].
    pub fn get_all_from_file(&self) -> Result<(), RemoteMapError> {
        Err(RemoteMapError::Unsupported("get_all(file)"))
    }

    /// Always fails: bulk file import/export is not reachable over this
    /// wire protocol (spec §4.9).
    ///
    /// # Errors
    /// Always returns [`RemoteMapError::Unsupported`].
    pub fn put_all_from_file(&self) -> Result<(), RemoteMapError> {
        Err(RemoteMapError::Unsupported("put_all(file)"))
    }

    /// Always fails: the server-side backing file handle is not reachable
    /// over this wire protocol (spec §4.9).
    ///
    /// # Errors
    /// Always returns [`RemoteMapError::Unsupported`].
    pub fn file(&self) -> Result<(), RemoteMapError> {
        Err(RemoteMapError::Unsupported("file"))
    }

    fn call_chunked<F, D, R>(
        &self,
        tag: EventTag,
        mut encode_args: F,
        mut read_entry: D,
    ) -> Result<Vec<R>, RemoteMapError>
    where
        F: FnMut(&mut FramedBuffer) -> Result<(), OutOfSpace>,
        D: FnMut(&mut FramedBuffer) -> Result<R, OutOfSpace>,
    {
        let deadline = self.deadline();
        let timeout = self.config.timeout();
        let mut guard = self.lock_inner()?;
        let Inner {
            conn,
            buf,
            clock,
            max_entry_size,
        } = &mut *guard;

        let builder = RequestBuilder::begin(buf, tag, *max_entry_size);
        crate::request::encode_with_retry(buf, *max_entry_size, &mut encode_args);
        let txn = clock.next(now_millis());
        builder.finish(buf, Some(txn));

        let request_len = buf.position();
        let mut request = vec![0u8; request_len];
        buf.set_position(0);
        request.copy_from_slice(buf.read_bytes(request_len).map_err(truncated_err)?);

        let remote_addr = conn.remote_addr();
        let mut exchange = Exchange::new(conn);
        exchange.send_and_receive(buf, &request, txn, true, deadline, timeout)?;

        chunked::read_chunked(conn, buf, txn, deadline, remote_addr, &mut read_entry).map_err(
            |err| match err {
                ConnectionErrorOrFailure::Failure(failure) => failure,
                ConnectionErrorOrFailure::Connection(_) => {
                    RemoteMapError::Io(std::io::Error::other("transport closed mid-stream"))
                }
            },
        )
    }
}

fn no_args(_: &mut FramedBuffer) -> Result<(), OutOfSpace> { Ok(()) }

fn truncated_err(_: OutOfSpace) -> RemoteMapError {
    RemoteMapError::Io(std::io::Error::other("truncated response frame"))
}

fn read_optional<V>(
    buf: &mut FramedBuffer,
    codec: &impl Serializer<V>,
) -> Result<Option<V>, OutOfSpace> {
    let present = buf.read_bool()?;
    if present {
        Ok(Some(codec.read(buf)?))
    } else {
        Ok(None)
    }
}

//! The buffered byte channel shared by [`BinaryReader`](crate::BinaryReader) and
//! [`BinaryWriter`](crate::BinaryWriter).
//!
//! A channel owns the underlying stream, a fixed-size buffer with a cursor, the per-instance byte
//! order, and the sticky error state. Once an error has been recorded, the channel is never used
//! again and the error is never replaced.

use std::io::{self, Read, Write};

use tracing::{debug, warn};

use crate::codec::ByteOrder;

/// Size in bytes of the buffer owned by each reader and writer.
pub const BUFFER_CAPACITY: usize = 16384;

/// The error state of a reader or writer.
///
/// A reader or writer with no error reports `None` from its `error()` method. Once an error is
/// recorded it stays for the lifetime of the instance.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, thiserror::Error)]
pub enum StreamError {
    /// The underlying stream reported a failure while reading.
    #[error("error reading from the underlying stream")]
    GenericRead,

    /// The underlying stream reported a failure while writing.
    #[error("error writing to the underlying stream")]
    GenericWrite,

    /// The file could not be opened. Every other operation on the instance is a no-op.
    #[error("cannot open file")]
    CannotOpenFile,

    /// The file does not exist. Opening a missing file is reported as `CannotOpenFile`; this
    /// value is never produced by the readers and writers in this crate.
    #[error("file does not exist")]
    FileDoesNotExist,

    /// A read ran past the end of the input, or a ranged write selected bytes outside of the
    /// source slice.
    #[error("not enough data")]
    NotEnoughData,
}

pub(crate) struct Channel<T> {
    /// `None` if the stream could not be opened.
    inner: Option<T>,
    buf: Box<[u8]>,
    /// Next byte to read or write.
    pos: usize,
    /// Number of valid bytes in `buf` while reading.
    len: usize,
    order: Option<ByteOrder>,
    error: Option<StreamError>,
}

impl<T> Channel<T> {
    pub(crate) fn new(inner: T) -> Self {
        Self::build(Some(inner), None)
    }

    /// A channel whose stream could not be opened.
    pub(crate) fn failed(error: StreamError) -> Self {
        Self::build(None, Some(error))
    }

    fn build(inner: Option<T>, error: Option<StreamError>) -> Self {
        Self {
            inner,
            buf: vec![0u8; BUFFER_CAPACITY].into_boxed_slice(),
            pos: 0,
            len: 0,
            order: None,
            error,
        }
    }

    pub(crate) fn error(&self) -> Option<StreamError> {
        self.error
    }

    pub(crate) fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Records `error` unless an earlier error is already present.
    pub(crate) fn fail(&mut self, error: StreamError) {
        if self.error.is_none() {
            warn!(%error, "binary stream entered error state");
            self.error = Some(error);
        }
    }

    pub(crate) fn byte_order(&self) -> ByteOrder {
        self.order.unwrap_or(ByteOrder::NATIVE)
    }

    pub(crate) fn force_byte_order(&mut self, order: ByteOrder) {
        self.order = Some(order);
    }

    pub(crate) fn clear_byte_order_override(&mut self) {
        self.order = None;
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes in the buffer not yet consumed by the reader.
    pub(crate) fn buffered(&self) -> usize {
        self.len.saturating_sub(self.pos)
    }

    /// Number of bytes written into the buffer but not yet flushed.
    pub(crate) fn pending(&self) -> usize {
        self.pos
    }

    /// Takes the next unread byte from the buffer.
    pub(crate) fn take_byte(&mut self) -> Option<u8> {
        if self.pos >= self.len {
            return None;
        }
        let value = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(value)
    }

    /// Copies up to `out.len()` unread bytes from the buffer and returns how many were copied.
    pub(crate) fn take_bytes(&mut self, out: &mut [u8]) -> usize {
        let Some(available) = self.buf.get(self.pos..self.len) else {
            return 0;
        };
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        n
    }

    /// Appends a byte to the buffer. Returns `false` if the buffer is full.
    pub(crate) fn put_byte(&mut self, value: u8) -> bool {
        match self.buf.get_mut(self.pos) {
            Some(slot) => {
                *slot = value;
                self.pos += 1;
                true
            }
            None => false,
        }
    }

    /// Detaches the stream. The channel behaves as if it had never been opened afterwards.
    pub(crate) fn take_inner(&mut self) -> Option<T> {
        self.inner.take()
    }
}

impl<T: Read> Channel<T> {
    /// Discards the buffer and reads the next chunk from the stream. Returns the number of bytes
    /// now buffered; zero means the stream reached end of input.
    pub(crate) fn refill(&mut self) -> io::Result<usize> {
        self.pos = 0;
        self.len = 0;
        let Some(inner) = self.inner.as_mut() else {
            return Ok(0);
        };
        loop {
            match inner.read(&mut self.buf) {
                Ok(n) => {
                    debug!(bytes = n, "refilled read buffer");
                    self.len = n.min(self.buf.len());
                    return Ok(self.len);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

impl<T: Write> Channel<T> {
    /// Writes every buffered byte to the stream and empties the buffer. The buffer is emptied
    /// even if the stream fails.
    pub(crate) fn drain(&mut self) -> io::Result<()> {
        let pending = self.pos;
        self.pos = 0;
        let Some(inner) = self.inner.as_mut() else {
            return Ok(());
        };
        if pending > 0 {
            debug!(bytes = pending, "flushing write buffer");
            inner.write_all(&self.buf[..pending])?;
        }
        inner.flush()
    }
}

/// Generates the byte-order and error-state accessors that readers and writers share.
macro_rules! channel_accessors {
    () => {
        /// The byte order used for multi-byte values by this instance. This is the host order
        /// unless it has been overridden for this instance.
        pub fn byte_order(&self) -> $crate::ByteOrder {
            self.channel.byte_order()
        }

        /// Returns `true` if [`Self::byte_order`] is little-endian.
        pub fn is_little_endian(&self) -> bool {
            self.channel.byte_order().is_little()
        }

        /// Forces the byte order of this instance. Other instances and the process-wide order
        /// used by [`bytes_for`](crate::bytes_for) are not affected.
        pub fn force_byte_order(&mut self, order: $crate::ByteOrder) {
            self.channel.force_byte_order(order);
        }

        /// Goes back to using the host byte order for this instance.
        pub fn clear_byte_order_override(&mut self) {
            self.channel.clear_byte_order_override();
        }

        /// Returns `true` once any operation on this instance has failed.
        pub fn has_error(&self) -> bool {
            self.channel.has_error()
        }

        /// The first error recorded by this instance, if any.
        pub fn error(&self) -> Option<$crate::StreamError> {
            self.channel.error()
        }
    };
}

pub(crate) use channel_accessors;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::channel::{channel_accessors, Channel, StreamError};
use crate::codec::{ByteOrder, Scalar, Word};

/// Reads fixed-width values sequentially from a stream, through an internal buffer.
///
/// Multi-byte values are assembled in the byte order of this reader (see
/// [`BinaryReader::byte_order`]), which is the host order unless it has been forced.
///
/// Reads never return `Result`. When a read fails, the reader records the failure (see
/// [`BinaryReader::error`]) and returns zero, `false`, or an empty `Vec`. The first failure is
/// permanent: every later read returns the same defaults without touching the stream. Callers
/// must check [`BinaryReader::has_error`] before trusting a value.
///
/// A reader must not be shared between threads while it is being used. Separate readers over
/// separate streams are independent.
pub struct BinaryReader<R = File> {
    channel: Channel<R>,
    /// Set once the stream has reported end of input.
    eof: bool,
}

impl BinaryReader<File> {
    /// Opens the file at `path` for reading.
    ///
    /// This never fails directly. If the file cannot be opened, the returned reader is already
    /// in the [`StreamError::CannotOpenFile`] state.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => {
                debug!(path = %path.display(), "opened file for reading");
                Self::new(file)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot open file for reading");
                Self {
                    channel: Channel::failed(StreamError::CannotOpenFile),
                    eof: true,
                }
            }
        }
    }
}

impl<R: Read> BinaryReader<R> {
    /// Creates a reader over a stream that is already open.
    pub fn new(inner: R) -> Self {
        Self {
            channel: Channel::new(inner),
            eof: false,
        }
    }

    /// Creates a reader over `inner` whose byte order is forced to `order`.
    pub fn with_byte_order(inner: R, order: ByteOrder) -> Self {
        let mut reader = Self::new(inner);
        reader.force_byte_order(order);
        reader
    }

    channel_accessors!();

    /// Returns `true` until the stream has reported end of input and every buffered byte has
    /// been consumed.
    ///
    /// End of input is only noticed when the reader asks the stream for more data, so this can
    /// still return `true` immediately after the last byte of the stream has been read.
    pub fn has_more_data(&self) -> bool {
        !self.eof || self.channel.buffered() != 0
    }

    /// Detaches and returns the underlying stream. Returns `None` if the stream was never
    /// opened. Bytes that were buffered but not yet read are discarded.
    pub fn into_inner(mut self) -> Option<R> {
        self.channel.take_inner()
    }

    /// Reads one byte, refilling the buffer if it is empty.
    fn next_byte(&mut self) -> u8 {
        if self.channel.has_error() {
            return 0;
        }
        if self.channel.buffered() == 0 {
            self.fill_buffer();
            if self.channel.has_error() {
                return 0;
            }
        }
        match self.channel.take_byte() {
            Some(value) => value,
            None => {
                self.channel.fail(StreamError::NotEnoughData);
                0
            }
        }
    }

    fn fill_buffer(&mut self) {
        match self.channel.refill() {
            Ok(0) => self.eof = true,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "read from underlying stream failed");
                self.channel.fail(StreamError::GenericRead);
            }
        }
    }

    /// Reads the bytes of one word, byte by byte, and assembles them in this reader's byte order.
    fn read_word<W: Word>(&mut self) -> W {
        let mut raw = W::Bytes::default();
        for slot in raw.as_mut() {
            *slot = self.next_byte();
            if self.channel.has_error() {
                return W::default();
            }
        }
        W::from_bytes(raw, self.channel.byte_order())
    }

    /// Reads any [`Scalar`] value.
    pub fn read<T: Scalar>(&mut self) -> T {
        T::from_word(self.read_word())
    }

    /// Reads a `bool`. Any nonzero byte is `true`.
    pub fn read_bool(&mut self) -> bool {
        self.read()
    }

    /// Reads a single byte.
    pub fn read_byte(&mut self) -> u8 {
        self.next_byte()
    }

    /// Reads a single-byte C `char`.
    pub fn read_c_char(&mut self) -> core::ffi::c_char {
        self.next_byte() as core::ffi::c_char
    }

    /// Reads an `i8`.
    pub fn read_i8(&mut self) -> i8 {
        self.read()
    }

    /// Reads an `i16`.
    pub fn read_i16(&mut self) -> i16 {
        self.read()
    }

    /// Reads an `i32`.
    pub fn read_i32(&mut self) -> i32 {
        self.read()
    }

    /// Reads an `i64`.
    pub fn read_i64(&mut self) -> i64 {
        self.read()
    }

    /// Reads a `u8`.
    pub fn read_u8(&mut self) -> u8 {
        self.next_byte()
    }

    /// Reads a `u16`.
    pub fn read_u16(&mut self) -> u16 {
        self.read()
    }

    /// Reads a `u32`.
    pub fn read_u32(&mut self) -> u32 {
        self.read()
    }

    /// Reads a `u64`.
    pub fn read_u64(&mut self) -> u64 {
        self.read()
    }

    /// Reads an `f32` from its 4-byte IEEE-754 representation.
    pub fn read_f32(&mut self) -> f32 {
        self.read()
    }

    /// Reads an `f64` from its 8-byte IEEE-754 representation.
    pub fn read_f64(&mut self) -> f64 {
        self.read()
    }

    /// Reads `count` bytes.
    ///
    /// If the stream ends or fails before `count` bytes are read, this returns an empty `Vec`.
    /// The bytes consumed before the failure are not given back.
    pub fn read_bytes(&mut self, count: usize) -> Vec<u8> {
        if self.channel.has_error() {
            return Vec::new();
        }

        let mut bytes = vec![0u8; count.min(self.channel.capacity())];
        let mut filled = 0;
        while filled < count {
            if self.channel.buffered() == 0 {
                self.fill_buffer();
                if self.channel.has_error() {
                    return Vec::new();
                }
                if self.channel.buffered() == 0 {
                    self.channel.fail(StreamError::NotEnoughData);
                    return Vec::new();
                }
            }
            if filled == bytes.len() {
                let grow = (count - filled).min(self.channel.capacity());
                bytes.resize(filled + grow, 0);
            }
            filled += self.channel.take_bytes(&mut bytes[filled..]);
        }
        bytes
    }

    /// Reads `count` bytes as a byte string. Fails the same way as [`BinaryReader::read_bytes`].
    #[cfg(feature = "bstr")]
    pub fn read_bstring(&mut self, count: usize) -> bstr::BString {
        bstr::BString::from(self.read_bytes(count))
    }
}

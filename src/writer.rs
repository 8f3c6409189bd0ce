use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

use crate::channel::{channel_accessors, Channel, StreamError};
use crate::codec::{ByteOrder, Scalar, Word};

/// Writes fixed-width values sequentially to a stream, through an internal buffer.
///
/// Multi-byte values are laid out in the byte order of this writer (see
/// [`BinaryWriter::byte_order`]), which is the host order unless it has been forced. Bytes are
/// collected in a buffer of [`BUFFER_CAPACITY`](crate::BUFFER_CAPACITY) bytes, which is written
/// to the stream when it fills up, when [`BinaryWriter::flush`] is called, and when the writer is
/// dropped.
///
/// Writes never return `Result`. When a write fails, the writer records the failure (see
/// [`BinaryWriter::error`]) and every later write, including explicit flushes, does nothing.
/// Bytes accepted before the failure are still written out when the writer is dropped or
/// consumed with [`BinaryWriter::into_inner`], unless the stream itself failed. A multi-byte
/// value is not written atomically; if the stream fails part-way through, some of its bytes may
/// already have been written.
pub struct BinaryWriter<W: Write = File> {
    channel: Channel<W>,
}

impl BinaryWriter<File> {
    /// Opens the file at `path` for writing, creating it if it does not exist.
    ///
    /// If `overwrite` is `true` the file is truncated; otherwise new data is appended to it. If
    /// the file cannot be opened, the returned writer is already in the
    /// [`StreamError::CannotOpenFile`] state.
    pub fn create(path: impl AsRef<Path>, overwrite: bool) -> Self {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        options.create(true);
        if overwrite {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        match options.open(path) {
            Ok(file) => {
                debug!(path = %path.display(), overwrite, "opened file for writing");
                Self::new(file)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot open file for writing");
                Self {
                    channel: Channel::failed(StreamError::CannotOpenFile),
                }
            }
        }
    }
}

impl<W: Write> BinaryWriter<W> {
    /// Creates a writer over a stream that is already open.
    pub fn new(out: W) -> Self {
        Self {
            channel: Channel::new(out),
        }
    }

    /// Creates a writer over `out` whose byte order is forced to `order`.
    pub fn with_byte_order(out: W, order: ByteOrder) -> Self {
        let mut writer = Self::new(out);
        writer.force_byte_order(order);
        writer
    }

    channel_accessors!();

    /// Flushes the buffer, then detaches and returns the underlying stream. Returns `None` if
    /// the stream was never opened.
    ///
    /// Like dropping the writer, this writes out the bytes buffered before an error, as long as
    /// the error did not come from the stream.
    pub fn into_inner(mut self) -> Option<W> {
        self.flush_on_close();
        self.channel.take_inner()
    }

    /// Writes every buffered byte to the stream.
    ///
    /// Does nothing if the writer is in an error state. If the stream fails, the writer enters
    /// the [`StreamError::GenericWrite`] state and the buffered bytes are discarded.
    pub fn flush(&mut self) {
        if self.channel.has_error() {
            return;
        }
        if let Err(err) = self.channel.drain() {
            warn!(error = %err, "write to underlying stream failed");
            self.channel.fail(StreamError::GenericWrite);
        }
    }

    /// Writes out whatever is buffered before the stream is released. The buffer only ever holds
    /// bytes accepted before the first error, so they are written unless the stream is the
    /// thing that failed.
    fn flush_on_close(&mut self) {
        match self.channel.error() {
            None => self.flush(),
            Some(StreamError::GenericWrite | StreamError::CannotOpenFile) => {}
            Some(_) => {
                if let Err(err) = self.channel.drain() {
                    warn!(error = %err, "write to underlying stream failed while closing");
                }
            }
        }
    }

    fn put_byte(&mut self, value: u8) {
        if self.channel.pending() >= self.channel.capacity() {
            self.flush();
        }
        if self.channel.has_error() {
            return;
        }
        if !self.channel.put_byte(value) {
            // `flush` empties the buffer whenever it leaves the writer healthy.
            self.channel.fail(StreamError::GenericWrite);
        }
    }

    fn write_word<T: Word>(&mut self, word: T) {
        let bytes = word.to_bytes(self.channel.byte_order());
        for &b in bytes.as_ref() {
            if self.channel.has_error() {
                return;
            }
            self.put_byte(b);
        }
    }

    /// Writes any [`Scalar`] value.
    pub fn write<T: Scalar>(&mut self, value: T) {
        self.write_word(value.to_word())
    }

    /// Writes a `bool`. True is encoded as 1. False is encoded as 0.
    pub fn write_bool(&mut self, value: bool) {
        self.write(value)
    }

    /// Writes a single byte.
    pub fn write_byte(&mut self, value: u8) {
        self.put_byte(value)
    }

    /// Writes a single-byte C `char`.
    pub fn write_c_char(&mut self, value: core::ffi::c_char) {
        self.put_byte(value as u8)
    }

    /// Writes a single `i8` value
    pub fn write_i8(&mut self, value: i8) {
        self.write(value)
    }

    /// Writes a single `i16` value
    pub fn write_i16(&mut self, value: i16) {
        self.write(value)
    }

    /// Writes a single `i32` value
    pub fn write_i32(&mut self, value: i32) {
        self.write(value)
    }

    /// Writes a single `i64` value
    pub fn write_i64(&mut self, value: i64) {
        self.write(value)
    }

    /// Writes a single `u8` value
    pub fn write_u8(&mut self, value: u8) {
        self.put_byte(value)
    }

    /// Writes a single `u16` value
    pub fn write_u16(&mut self, value: u16) {
        self.write(value)
    }

    /// Writes a single `u32` value
    pub fn write_u32(&mut self, value: u32) {
        self.write(value)
    }

    /// Writes a single `u64` value
    pub fn write_u64(&mut self, value: u64) {
        self.write(value)
    }

    /// Writes an `f32` value using its 4-byte IEEE-754 representation.
    pub fn write_f32(&mut self, value: f32) {
        self.write(value)
    }

    /// Writes an `f64` value using its 8-byte IEEE-754 representation.
    pub fn write_f64(&mut self, value: f64) {
        self.write(value)
    }

    /// Writes all of `bytes`. This is `write_range(bytes, 0, bytes.len())`, so an empty slice
    /// puts the writer in the [`StreamError::NotEnoughData`] state.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_range(bytes, 0, bytes.len());
    }

    /// Writes `count` bytes of `bytes`, starting at index `start`.
    ///
    /// `start` must be the index of an element of `bytes` and `start + count` must not exceed
    /// `bytes.len()`. Otherwise nothing is written and the writer enters the
    /// [`StreamError::NotEnoughData`] state.
    pub fn write_range(&mut self, bytes: &[u8], start: usize, count: usize) {
        if self.channel.has_error() {
            return;
        }
        let selected = match start.checked_add(count) {
            Some(end) if start < bytes.len() && end <= bytes.len() => &bytes[start..end],
            _ => {
                self.channel.fail(StreamError::NotEnoughData);
                return;
            }
        };
        for &b in selected {
            if self.channel.has_error() {
                return;
            }
            self.put_byte(b);
        }
    }
}

impl<W: Write> Drop for BinaryWriter<W> {
    fn drop(&mut self) {
        self.flush_on_close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BUFFER_CAPACITY;
    use pretty_hex::PrettyHex;
    use std::io;

    /// Records each `write` call, and fails once `budget` bytes have been accepted.
    #[derive(Default)]
    struct Recorder {
        out: Vec<u8>,
        writes: Vec<usize>,
        budget: Option<usize>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(budget) = self.budget {
                if self.out.len() + buf.len() > budget {
                    return Err(io::Error::other("disk full"));
                }
            }
            self.writes.push(buf.len());
            self.out.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn mixed() {
        let mut w = BinaryWriter::with_byte_order(Vec::new(), ByteOrder::Big);
        w.write_u8(42);
        w.write_u16(0x0102);
        w.write_i32(-33);
        w.write_bool(true);
        let out = w.into_inner().unwrap();

        println!("{}", out.hex_dump());
        assert_eq!(out, [42, 0x01, 0x02, 0xff, 0xff, 0xff, 0xdf, 0x01]);
    }

    #[test]
    fn every_width_uses_instance_order() {
        let mut w = BinaryWriter::with_byte_order(Vec::new(), ByteOrder::Little);
        w.write_u16(0xaa55);
        w.write_u32(0x0102_0304);
        w.write_u64(0x0102_0304_0506_0708);
        w.force_byte_order(ByteOrder::Big);
        w.write_u16(0xaa55);
        w.write_u32(0x0102_0304);
        let out = w.into_inner().unwrap();
        assert_eq!(
            out,
            [
                0x55, 0xaa, 4, 3, 2, 1, 8, 7, 6, 5, 4, 3, 2, 1, //
                0xaa, 0x55, 1, 2, 3, 4,
            ]
        );
    }

    #[test]
    fn floats() {
        let mut w = BinaryWriter::with_byte_order(Vec::new(), ByteOrder::Big);
        w.write_f32(1.618);
        w.write_f64(-1009.2010);
        let out = w.into_inner().unwrap();
        assert_eq!(hex::encode(out), "3fcf1aa0c08f899ba5e353f8");
    }

    #[test]
    fn buffers_until_full() {
        let mut w = BinaryWriter::new(Recorder::default());
        for i in 0..BUFFER_CAPACITY {
            w.write_u8(i as u8);
        }
        w.write_u8(0xee);
        w.write_u8(0xff);
        let rec = w.into_inner().unwrap();
        assert_eq!(rec.writes, [BUFFER_CAPACITY, 2]);
        assert_eq!(rec.out.len(), BUFFER_CAPACITY + 2);
        assert_eq!(rec.out[BUFFER_CAPACITY..], [0xee, 0xff]);
    }

    #[test]
    fn drop_flushes() {
        let mut out = Vec::new();
        {
            let mut w = BinaryWriter::with_byte_order(&mut out, ByteOrder::Little);
            w.write_u32(16909060);
            w.write_bytes(b"xyz");
        }
        assert_eq!(out, [4, 3, 2, 1, b'x', b'y', b'z']);
    }

    #[test]
    fn write_range() {
        let mut w = BinaryWriter::new(Vec::new());
        w.write_range(b"abcdef", 1, 3);
        w.write_range(b"abcdef", 5, 1);
        w.write_range(b"abcdef", 0, 0);
        assert!(!w.has_error());
        assert_eq!(w.into_inner().unwrap(), b"bcdf");
    }

    #[test]
    fn write_range_out_of_bounds() {
        let mut w = BinaryWriter::new(Vec::new());
        w.write_u8(1);
        w.write_range(b"abc", 3, 0);
        assert_eq!(w.error(), Some(StreamError::NotEnoughData));

        let mut w = BinaryWriter::new(Vec::new());
        w.write_range(b"abc", 1, 3);
        assert_eq!(w.error(), Some(StreamError::NotEnoughData));
        assert_eq!(w.into_inner().unwrap(), Vec::<u8>::new());

        let mut w = BinaryWriter::new(Vec::new());
        w.write_range(b"abc", 1, usize::MAX);
        assert_eq!(w.error(), Some(StreamError::NotEnoughData));
    }

    #[test]
    fn empty_write_bytes_is_not_enough_data() {
        let mut w = BinaryWriter::new(Vec::new());
        w.write_bytes(&[]);
        assert_eq!(w.error(), Some(StreamError::NotEnoughData));
        w.write_u8(1);
        assert_eq!(w.into_inner().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn errored_writer_is_inert() {
        let mut w = BinaryWriter::new(Recorder::default());
        w.write_u8(9);
        w.write_range(b"abc", 7, 1);
        assert_eq!(w.error(), Some(StreamError::NotEnoughData));
        w.write_u64(u64::MAX);
        w.write_bytes(b"more");
        w.flush();
        assert_eq!(w.error(), Some(StreamError::NotEnoughData));
        assert_eq!(w.channel.pending(), 1);
        let rec = w.into_inner().unwrap();
        assert_eq!(rec.writes, [1]);
        assert_eq!(rec.out, [9]);
    }

    #[test]
    fn drop_keeps_bytes_written_before_error() {
        let mut out = Vec::new();
        {
            let mut w = BinaryWriter::with_byte_order(&mut out, ByteOrder::Big);
            w.write_u32(16909060);
            w.write_range(b"abc", 5, 1);
            assert_eq!(w.error(), Some(StreamError::NotEnoughData));
            w.write_u16(0xffff);
        }
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn drop_after_stream_failure_writes_nothing_more() {
        let mut w = BinaryWriter::new(Recorder {
            budget: Some(0),
            ..Recorder::default()
        });
        for _ in 0..=BUFFER_CAPACITY {
            w.write_u8(0x11);
        }
        assert_eq!(w.error(), Some(StreamError::GenericWrite));
        let rec = w.into_inner().unwrap();
        assert!(rec.writes.is_empty());
    }

    #[test]
    fn stream_failure_is_generic_write() {
        let mut w = BinaryWriter::new(Recorder {
            budget: Some(BUFFER_CAPACITY),
            ..Recorder::default()
        });
        for _ in 0..BUFFER_CAPACITY {
            w.write_u8(0xaa);
        }
        assert!(!w.has_error());
        // The second buffer-full of data does not fit.
        for _ in 0..BUFFER_CAPACITY {
            w.write_u8(0xbb);
        }
        assert!(!w.has_error());
        w.flush();
        assert_eq!(w.error(), Some(StreamError::GenericWrite));
        w.write_u32(5);
        w.flush();
        assert_eq!(w.error(), Some(StreamError::GenericWrite));
        let rec = w.into_inner().unwrap();
        assert_eq!(rec.out.len(), BUFFER_CAPACITY);
        assert!(rec.out.iter().all(|&b| b == 0xaa));
    }

    #[test]
    fn multi_byte_value_can_straddle_failure() {
        let mut w = BinaryWriter::with_byte_order(
            Recorder {
                budget: Some(0),
                ..Recorder::default()
            },
            ByteOrder::Big,
        );
        for _ in 0..BUFFER_CAPACITY - 2 {
            w.write_u8(0);
        }
        w.write_u32(0x0102_0304);
        assert_eq!(w.error(), Some(StreamError::GenericWrite));
        assert!(w.into_inner().unwrap().out.is_empty());
    }

    #[test]
    fn create_truncates_or_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        let mut w = BinaryWriter::create(&path, true);
        w.write_bytes(b"first");
        drop(w);

        let mut w = BinaryWriter::create(&path, false);
        w.write_bytes(b"+second");
        drop(w);
        assert_eq!(std::fs::read(&path).unwrap(), b"first+second");

        let mut w = BinaryWriter::create(&path, true);
        w.write_u8(b'!');
        drop(w);
        assert_eq!(std::fs::read(&path).unwrap(), b"!");
    }

    #[test]
    fn create_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = BinaryWriter::create(dir.path().join("no/such/dir.bin"), true);
        assert_eq!(w.error(), Some(StreamError::CannotOpenFile));
        w.write_u16(7);
        assert_eq!(w.error(), Some(StreamError::CannotOpenFile));
        assert!(w.into_inner().is_none());
    }
}

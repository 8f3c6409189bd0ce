//! Endian-aware conversion of fixed-width scalar values, and buffered sequential readers and
//! writers for binary files.
//!
//! The [`codec`] functions convert `bool`, `i8`..`i64`, `u8`..`u64`, `f32` and `f64` values to and
//! from bytes in either byte order. [`BinaryReader`] and [`BinaryWriter`] apply the same rules to
//! a stream, one value after another, with no headers, lengths or padding between values. The
//! layout of a file is whatever sequence of reads and writes the producer and consumer agree on.
//!
//! Stream operations do not return `Result`. Each reader and writer records the first error it
//! hits and turns every later operation into a no-op, so callers check `has_error()` after the
//! operations they care about.
//!
//! The stream types need the `std` feature, which is enabled by default.

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![forbid(unsafe_code)]
#![forbid(unused_must_use)]
#![warn(missing_docs)]

extern crate alloc;

pub mod codec;

#[cfg(feature = "std")]
mod channel;
#[cfg(feature = "std")]
mod reader;
#[cfg(feature = "std")]
mod writer;


pub use codec::{
    bytes_for, bytes_for_order, clear_order_override, effective_order, force_order,
    is_little_endian, value_from, value_from_order, ByteOrder, ConvertError, Scalar,
};

#[cfg(feature = "std")]
pub use channel::{StreamError, BUFFER_CAPACITY};
#[cfg(feature = "std")]
pub use reader::BinaryReader;
#[cfg(feature = "std")]
pub use writer::BinaryWriter;

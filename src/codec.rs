//! Converts fixed-width scalar values to and from byte sequences, with explicit control over
//! byte order.
//!
//! Every supported scalar has a fixed width of 1, 2, 4, or 8 bytes. Under [`ByteOrder::Little`]
//! the least-significant byte comes first; under [`ByteOrder::Big`] it comes last. Floating-point
//! values are reinterpreted bit-for-bit as unsigned integers of the same width before they are
//! laid out, so NaN payloads and signaling bits survive a round trip unchanged.
//!
//! The free functions [`bytes_for`] and [`value_from`] use the process-wide effective byte order.
//! That is the host order unless it has been overridden with [`force_order`]. The override is a
//! single setting shared by every thread; changing it while another thread is converting values
//! gives that thread whichever order it happens to observe. Code that needs a stable order should
//! call [`bytes_for_order`] and [`value_from_order`], or use the per-instance order of a reader or
//! writer.

use core::sync::atomic::{AtomicU8, Ordering};

use alloc::vec::Vec;
use zerocopy::byteorder::{BigEndian, LittleEndian, U16, U32, U64};

/// The order in which the bytes of a multi-byte value are laid out.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ByteOrder {
    /// Most-significant byte first.
    Big,
    /// Least-significant byte first.
    Little,
}

impl ByteOrder {
    /// The byte order of the host.
    #[cfg(target_endian = "little")]
    pub const NATIVE: Self = Self::Little;

    /// The byte order of the host.
    #[cfg(target_endian = "big")]
    pub const NATIVE: Self = Self::Big;

    /// Returns `true` for [`ByteOrder::Little`].
    pub fn is_little(self) -> bool {
        self == Self::Little
    }

    /// Returns the other byte order.
    pub fn opposite(self) -> Self {
        match self {
            Self::Big => Self::Little,
            Self::Little => Self::Big,
        }
    }
}

const OVERRIDE_UNSET: u8 = 0;
const OVERRIDE_BIG: u8 = 1;
const OVERRIDE_LITTLE: u8 = 2;

static ORDER_OVERRIDE: AtomicU8 = AtomicU8::new(OVERRIDE_UNSET);

/// Forces the process-wide byte order used by [`bytes_for`] and [`value_from`].
///
/// This does not affect readers or writers, which carry their own byte order.
pub fn force_order(order: ByteOrder) {
    let tag = match order {
        ByteOrder::Big => OVERRIDE_BIG,
        ByteOrder::Little => OVERRIDE_LITTLE,
    };
    ORDER_OVERRIDE.store(tag, Ordering::Relaxed);
}

/// Removes any process-wide override, so that the free conversion functions go back to using
/// [`ByteOrder::NATIVE`].
pub fn clear_order_override() {
    ORDER_OVERRIDE.store(OVERRIDE_UNSET, Ordering::Relaxed);
}

/// The byte order currently used by [`bytes_for`] and [`value_from`].
pub fn effective_order() -> ByteOrder {
    match ORDER_OVERRIDE.load(Ordering::Relaxed) {
        OVERRIDE_BIG => ByteOrder::Big,
        OVERRIDE_LITTLE => ByteOrder::Little,
        _ => ByteOrder::NATIVE,
    }
}

/// Returns `true` if [`effective_order`] is little-endian.
pub fn is_little_endian() -> bool {
    effective_order().is_little()
}

/// Error type for the conversion functions.
#[derive(Copy, Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum ConvertError {
    /// The byte sequence is shorter than the width of the requested type.
    #[error("not enough data: needed {needed} bytes, found {actual}")]
    NotEnoughData {
        /// Width of the requested type, in bytes.
        needed: usize,
        /// Length of the byte sequence that was supplied.
        actual: usize,
    },
}

/// Result type of the conversion functions.
pub type Result<T> = core::result::Result<T, ConvertError>;

mod private {
    pub trait Sealed {}
}

/// An unsigned integer that carries the raw bits of a [`Scalar`].
///
/// This trait is sealed; it is implemented for `u8`, `u16`, `u32` and `u64`.
pub trait Word: Copy + Default + private::Sealed {
    /// The byte array holding one encoded word.
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default;

    /// Width of the encoded word, in bytes.
    const WIDTH: usize;

    /// Lays out this word in the given byte order.
    fn to_bytes(self, order: ByteOrder) -> Self::Bytes;

    /// Assembles a word from bytes laid out in the given byte order.
    fn from_bytes(bytes: Self::Bytes, order: ByteOrder) -> Self;

    /// Assembles a word from the leading bytes of `bytes`. Trailing bytes are ignored.
    fn from_prefix(bytes: &[u8], order: ByteOrder) -> Result<Self> {
        let Some(prefix) = bytes.get(..Self::WIDTH) else {
            return Err(ConvertError::NotEnoughData {
                needed: Self::WIDTH,
                actual: bytes.len(),
            });
        };
        let mut raw = Self::Bytes::default();
        raw.as_mut().copy_from_slice(prefix);
        Ok(Self::from_bytes(raw, order))
    }
}

impl private::Sealed for u8 {}

impl Word for u8 {
    type Bytes = [u8; 1];
    const WIDTH: usize = 1;

    #[inline(always)]
    fn to_bytes(self, _order: ByteOrder) -> [u8; 1] {
        [self]
    }

    #[inline(always)]
    fn from_bytes(bytes: [u8; 1], _order: ByteOrder) -> u8 {
        bytes[0]
    }
}

macro_rules! multi_byte_word {
    ($int:ty, $wrapper:ident, $width:expr) => {
        impl private::Sealed for $int {}

        impl Word for $int {
            type Bytes = [u8; $width];
            const WIDTH: usize = $width;

            #[inline(always)]
            fn to_bytes(self, order: ByteOrder) -> [u8; $width] {
                match order {
                    ByteOrder::Big => $wrapper::<BigEndian>::new(self).to_bytes(),
                    ByteOrder::Little => $wrapper::<LittleEndian>::new(self).to_bytes(),
                }
            }

            #[inline(always)]
            fn from_bytes(bytes: [u8; $width], order: ByteOrder) -> $int {
                match order {
                    ByteOrder::Big => $wrapper::<BigEndian>::from_bytes(bytes).get(),
                    ByteOrder::Little => $wrapper::<LittleEndian>::from_bytes(bytes).get(),
                }
            }
        }
    };
}

multi_byte_word!(u16, U16, 2);
multi_byte_word!(u32, U32, 4);
multi_byte_word!(u64, U64, 8);

/// A fixed-width value that can be converted to and from bytes.
///
/// This trait is sealed. It is implemented for `bool`, `u8`, `i8`, `u16`, `i16`, `u32`, `i32`,
/// `u64`, `i64`, `f32` and `f64`. C's `char`, `signed char` and `unsigned char` correspond to
/// [`core::ffi::c_char`], `i8` and `u8`.
pub trait Scalar: Copy + private::Sealed {
    /// The unsigned word with the same width as this type.
    type Word: Word;

    /// Reinterprets this value as its raw word.
    fn to_word(self) -> Self::Word;

    /// Reinterprets a raw word as a value of this type.
    fn from_word(word: Self::Word) -> Self;
}

impl private::Sealed for bool {}

/// `false` is encoded as 0 and `true` as 1. Any nonzero byte decodes as `true`.
impl Scalar for bool {
    type Word = u8;

    fn to_word(self) -> u8 {
        self as u8
    }

    fn from_word(word: u8) -> bool {
        word != 0
    }
}

macro_rules! cast_scalar {
    ($($ty:ty => $word:ty),* $(,)?) => {
        $(
            impl Scalar for $ty {
                type Word = $word;

                #[inline(always)]
                fn to_word(self) -> $word {
                    self as $word
                }

                #[inline(always)]
                fn from_word(word: $word) -> $ty {
                    word as $ty
                }
            }
        )*
    };
}

/// The unsigned integers are their own words.
macro_rules! word_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scalar for $ty {
                type Word = $ty;

                #[inline(always)]
                fn to_word(self) -> $ty {
                    self
                }

                #[inline(always)]
                fn from_word(word: $ty) -> $ty {
                    word
                }
            }
        )*
    };
}

word_scalar!(u8, u16, u32, u64);

impl private::Sealed for i8 {}
impl private::Sealed for i16 {}
impl private::Sealed for i32 {}
impl private::Sealed for i64 {}

cast_scalar!(i8 => u8, i16 => u16, i32 => u32, i64 => u64);

impl private::Sealed for f32 {}

impl Scalar for f32 {
    type Word = u32;

    fn to_word(self) -> u32 {
        self.to_bits()
    }

    fn from_word(word: u32) -> f32 {
        f32::from_bits(word)
    }
}

impl private::Sealed for f64 {}

impl Scalar for f64 {
    type Word = u64;

    fn to_word(self) -> u64 {
        self.to_bits()
    }

    fn from_word(word: u64) -> f64 {
        f64::from_bits(word)
    }
}

/// Encodes `value` using the process-wide [`effective_order`].
pub fn bytes_for<T: Scalar>(value: T) -> Vec<u8> {
    bytes_for_order(value, effective_order())
}

/// Encodes `value` using the given byte order.
pub fn bytes_for_order<T: Scalar>(value: T, order: ByteOrder) -> Vec<u8> {
    value.to_word().to_bytes(order).as_ref().to_vec()
}

/// Decodes a value from the leading bytes of `bytes`, using the process-wide
/// [`effective_order`].
///
/// Returns `Err(ConvertError::NotEnoughData)` if `bytes` is shorter than the width of `T`. Bytes
/// beyond that width are ignored.
pub fn value_from<T: Scalar>(bytes: &[u8]) -> Result<T> {
    value_from_order(bytes, effective_order())
}

/// Decodes a value from the leading bytes of `bytes`, using the given byte order.
pub fn value_from_order<T: Scalar>(bytes: &[u8], order: ByteOrder) -> Result<T> {
    Ok(T::from_word(T::Word::from_prefix(bytes, order)?))
}

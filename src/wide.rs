//! 64-bit integers as a pair of unsigned 32-bit halves
//!
//! The wire format treats every 64-bit quantity (`int64`, `uint64`, `sint64`,
//! `fixed64`, `sfixed64`) as an opaque bit-pattern, and the only operations
//! the engine ever needs on such values are bit-level: splitting into 7-bit
//! groups for varints, zig-zag mapping, and fixed-width little-endian layout.
//! [`WideInt`] models exactly that, as a low and a high `u32` half, so that
//! every transformation is expressed once over the pair and shared between
//! the [`Writer`](crate::writer::Writer) and the [`Reader`](crate::parse::Reader).
//!
//! # Hash keys
//!
//! Map fields whose key type is a 64-bit integer key their entries by
//! [`HashKey`], a fixed 8-byte string derived from the two halves. Two
//! `WideInt` values map to the same key if and only if they hold the same
//! bit-pattern, so signedness is recovered from the field's declared key type
//! when the key is turned back into a number for encoding.

use std::fmt::{Debug, Display};

use num_integer::Integer;
#[cfg(feature = "serde_impls")]
use serde::{Deserialize, Serialize};

use crate::target::Target;

/// Two's complement factor between the low and high half
const TWO_32: f64 = 4_294_967_296.0;

/// A 64-bit quantity held as two unsigned 32-bit halves
///
/// Both halves are always interpreted as unsigned; any signed view of the
/// value (e.g. through [`WideInt::to_i64`]) is a reinterpretation of the
/// combined bit-pattern.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde_impls", derive(Serialize, Deserialize))]
pub struct WideInt {
    /// Low 32 bits
    pub lo: u32,
    /// High 32 bits
    pub hi: u32,
}

impl WideInt {
    /// Shared all-zero value
    pub const ZERO: WideInt = WideInt { lo: 0, hi: 0 };

    /// Constructs a `WideInt` from its low and high halves.
    #[inline]
    #[must_use]
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    /// Constructs a `WideInt` from a floating-point number.
    ///
    /// The magnitude is truncated toward zero and split at `2^32`; negative
    /// inputs are stored as the two's complement of their magnitude. Values
    /// whose magnitude does not fit into 64 bits saturate in the high half.
    #[must_use]
    pub fn from_number(value: f64) -> Self {
        if value == 0.0 || value.is_nan() {
            return Self::ZERO;
        }
        let sign = value < 0.0;
        let abs = value.abs().trunc();
        let lo = (abs % TWO_32) as u32;
        let hi = ((abs - lo as f64) / TWO_32) as u32;
        let bits = Self { lo, hi };
        if sign {
            bits.negate()
        } else {
            bits
        }
    }

    /// Converts back into a (possibly lossy) floating-point number.
    ///
    /// When `unsigned` is false and the high bit is set, the value is
    /// interpreted as a negative two's complement quantity.
    #[must_use]
    pub fn to_number(self, unsigned: bool) -> f64 {
        if !unsigned && self.hi >> 31 != 0 {
            let mag = self.negate();
            -(mag.lo as f64 + mag.hi as f64 * TWO_32)
        } else {
            self.lo as f64 + self.hi as f64 * TWO_32
        }
    }

    /// Two's complement negation over the full 64-bit pair.
    #[must_use]
    fn negate(self) -> Self {
        let lo = (!self.lo).wrapping_add(1);
        let hi = if lo == 0 {
            (!self.hi).wrapping_add(1)
        } else {
            !self.hi
        };
        Self { lo, hi }
    }

    #[inline]
    #[must_use]
    pub const fn to_u64(self) -> u64 {
        (self.hi as u64) << 32 | self.lo as u64
    }

    #[inline]
    #[must_use]
    pub const fn to_i64(self) -> i64 {
        self.to_u64() as i64
    }

    /// Returns `true` if both halves are zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.lo == 0 && self.hi == 0
    }

    /// Applies the zig-zag transform `(n << 1) ^ (n >> 63)` over the pair.
    ///
    /// Small-magnitude negative values become small unsigned values, so that
    /// they occupy few bytes once varint-encoded.
    #[must_use]
    pub const fn zz_encode(self) -> Self {
        let mask = ((self.hi as i32) >> 31) as u32;
        let hi = ((self.hi << 1) | (self.lo >> 31)) ^ mask;
        let lo = (self.lo << 1) ^ mask;
        Self { lo, hi }
    }

    /// Inverse of [`zz_encode`](WideInt::zz_encode).
    #[must_use]
    pub const fn zz_decode(self) -> Self {
        let mask = (self.lo & 1).wrapping_neg();
        let lo = ((self.lo >> 1) | (self.hi << 31)) ^ mask;
        let hi = (self.hi >> 1) ^ mask;
        Self { lo, hi }
    }

    /// Number of bytes this value occupies as a varint, from 1 to 10.
    ///
    /// Computed from the position of the highest set bit across both halves.
    #[must_use]
    pub fn varint_len(self) -> usize {
        let bits = 64 - self.to_u64().leading_zeros() as usize;
        if bits == 0 {
            1
        } else {
            Integer::div_ceil(&bits, &7)
        }
    }

    /// Appends the varint encoding of this value to `tgt`, returning the
    /// number of bytes written.
    pub fn write_varint<T: Target>(self, tgt: &mut T) -> usize {
        let (mut lo, mut hi) = (self.lo, self.hi);
        let mut n = 0;
        while hi != 0 || lo > 127 {
            n += tgt.push_one((lo & 127) as u8 | 128);
            lo = (lo >> 7) | (hi << 25);
            hi >>= 7;
        }
        n + tgt.push_one(lo as u8)
    }

    /// Appends the 8-byte little-endian layout of this value to `tgt`.
    pub fn write_fixed<T: Target>(self, tgt: &mut T) -> usize {
        tgt.push_many(self.lo.to_le_bytes()) + tgt.push_many(self.hi.to_le_bytes())
    }

    /// Converts into the fixed 8-byte key used for 64-bit map keys.
    #[must_use]
    pub fn to_hash_key(self) -> HashKey {
        let mut key = [0u8; 8];
        key[..4].copy_from_slice(&self.lo.to_le_bytes());
        key[4..].copy_from_slice(&self.hi.to_le_bytes());
        HashKey(key)
    }

    /// Recovers the value a [`HashKey`] was derived from.
    #[must_use]
    pub fn from_hash_key(key: HashKey) -> Self {
        let [a, b, c, d, e, f, g, h] = key.0;
        Self {
            lo: u32::from_le_bytes([a, b, c, d]),
            hi: u32::from_le_bytes([e, f, g, h]),
        }
    }
}

impl From<u64> for WideInt {
    fn from(value: u64) -> Self {
        Self {
            lo: value as u32,
            hi: (value >> 32) as u32,
        }
    }
}

impl From<i64> for WideInt {
    fn from(value: i64) -> Self {
        Self::from(value as u64)
    }
}

impl From<WideInt> for u64 {
    fn from(value: WideInt) -> Self {
        value.to_u64()
    }
}

impl From<WideInt> for i64 {
    fn from(value: WideInt) -> Self {
        value.to_i64()
    }
}

impl Debug for WideInt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WideInt({:#010x}:{:#010x})", self.hi, self.lo)
    }
}

impl Display for WideInt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.to_u64(), f)
    }
}

/// Fixed 8-byte key derived from a [`WideInt`], low half first
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde_impls", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct HashKey([u8; 8]);

impl HashKey {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

impl Debug for HashKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashKey({})", crate::util::hex_of_bytes(self.0))
    }
}

impl Display for HashKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&crate::util::hex_of_bytes(self.0))
    }
}

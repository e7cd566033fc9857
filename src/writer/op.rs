//! Pending write operations
//!
//! Each [`Op`] pairs a [`Payload`] (which selects the write routine and
//! carries the value) with the number of bytes it will produce, computed
//! once when the operation is queued. Operations are stored in an arena
//! owned by the [`Writer`](super::Writer) and linked by index.

use std::borrow::Cow;

use crate::target::Target;
use crate::wide::WideInt;

/// Number of bytes `value` occupies as a varint, from 1 to 5.
#[inline]
#[must_use]
pub const fn varint32_len(value: u32) -> usize {
    match value {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0xfff_ffff => 4,
        _ => 5,
    }
}

pub(crate) fn write_varint32<T: Target>(mut value: u32, tgt: &mut T) -> usize {
    let mut n = 0;
    while value > 127 {
        n += tgt.push_one((value & 127) as u8 | 128);
        value >>= 7;
    }
    n + tgt.push_one(value as u8)
}

/// Write routine and value of a single pending operation
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Payload<'a> {
    /// Sentinel heading every frame; writes nothing
    Noop,
    Byte(u8),
    Varint32(u32),
    Varint64(WideInt),
    Fixed32(u32),
    Fixed64(WideInt),
    Float(f32),
    Double(f64),
    Bytes(Cow<'a, [u8]>),
}

impl<'a> Payload<'a> {
    /// Exact number of bytes [`write`](Payload::write) will append
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        match self {
            Payload::Noop => 0,
            Payload::Byte(_) => 1,
            Payload::Varint32(v) => varint32_len(*v),
            Payload::Varint64(w) => w.varint_len(),
            Payload::Fixed32(_) | Payload::Float(_) => 4,
            Payload::Fixed64(_) | Payload::Double(_) => 8,
            Payload::Bytes(b) => b.len(),
        }
    }

    pub(crate) fn write<T: Target>(&self, tgt: &mut T) -> usize {
        match self {
            Payload::Noop => 0,
            Payload::Byte(b) => tgt.push_one(*b),
            Payload::Varint32(v) => write_varint32(*v, tgt),
            Payload::Varint64(w) => w.write_varint(tgt),
            Payload::Fixed32(v) => tgt.push_many(v.to_le_bytes()),
            Payload::Fixed64(w) => w.write_fixed(tgt),
            Payload::Float(f) => tgt.push_many(f.to_le_bytes()),
            Payload::Double(d) => tgt.push_many(d.to_le_bytes()),
            Payload::Bytes(b) => tgt.push_all(b),
        }
    }
}

/// A node in the pending-operation list
#[derive(Clone, Debug)]
pub(crate) struct Op<'a> {
    pub(crate) payload: Payload<'a>,
    pub(crate) len: usize,
    pub(crate) next: Option<usize>,
}

impl<'a> Op<'a> {
    pub(crate) fn new(payload: Payload<'a>) -> Self {
        let len = payload.len();
        Self {
            payload,
            len,
            next: None,
        }
    }

    pub(crate) const fn sentinel() -> Self {
        Self {
            payload: Payload::Noop,
            len: 0,
            next: None,
        }
    }
}

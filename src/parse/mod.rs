//! Sequential decoding of wire-format input
//!
//! A [`Reader`] is a forward-only cursor over a borrowed byte-slice. Every
//! read either consumes exactly the bytes of one wire-level token and
//! advances the cursor, or fails with a [`ParseError`] without reading past
//! the end of the buffer.
//!
//! Nested length-delimited regions are not modelled as sub-slices. Instead,
//! [`Reader::sub_limit`] reads a length prefix and returns the absolute
//! offset at which the region ends; callers decode while
//! [`pos`](Reader::pos) is below that offset and then confirm the region was
//! consumed exactly with [`Reader::close_limit`].

pub mod error;

use std::borrow::Cow;
use std::fmt::Display;

use crate::wide::WideInt;
use error::{ParseResult, TokenError, WindowError};

pub use error::ParseError;

/// Maximum number of bytes in a well-formed varint
pub const MAX_VARINT_LEN: usize = 10;

/// Physical encoding of a field, as carried in the low three bits of a tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Bit64 = 1,
    LengthDelimited = 2,
    /// Deprecated group start; never produced, rejected on skip
    StartGroup = 3,
    /// Deprecated group end; never produced, rejected on skip
    EndGroup = 4,
    Bit32 = 5,
}

impl WireType {
    #[inline]
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for WireType {
    type Error = TokenError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Bit64),
            2 => Ok(Self::LengthDelimited),
            3 => Ok(Self::StartGroup),
            4 => Ok(Self::EndGroup),
            5 => Ok(Self::Bit32),
            _ => Err(TokenError::InvalidWireType(raw)),
        }
    }
}

impl Display for WireType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WireType::Varint => "varint",
            WireType::Bit64 => "64-bit",
            WireType::LengthDelimited => "length-delimited",
            WireType::StartGroup => "start-group",
            WireType::EndGroup => "end-group",
            WireType::Bit32 => "32-bit",
        };
        write!(f, "{}({})", name, *self as u8)
    }
}

/// A decoded field key: field id and wire type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tag {
    pub id: u32,
    pub wire_type: WireType,
}

impl Tag {
    #[must_use]
    pub const fn new(id: u32, wire_type: WireType) -> Self {
        Self { id, wire_type }
    }

    /// Combined key value `(id << 3) | wire_type` as written on the wire.
    #[must_use]
    pub const fn key(self) -> u32 {
        (self.id << 3) | self.wire_type as u32
    }
}

/// Forward-only cursor over a wire-format buffer
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Offset of the next unread byte
    #[inline]
    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying buffer
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of bytes not yet read
    #[inline]
    #[must_use]
    pub fn remainder(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn consume(&mut self, n: usize) -> ParseResult<&'a [u8]> {
        match self.pos.checked_add(n) {
            Some(end) if end <= self.buf.len() => {
                let ret = &self.buf[self.pos..end];
                self.pos = end;
                Ok(ret)
            }
            _ => Err(WindowError::ConsumeWouldExceedLimit {
                offset: self.pos,
                requested: n,
                limit: self.buf.len(),
            }
            .into()),
        }
    }

    fn consume_arr<const N: usize>(&mut self) -> ParseResult<[u8; N]> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.consume(N)?);
        Ok(arr)
    }

    fn byte(&mut self) -> ParseResult<u8> {
        Ok(self.consume(1)?[0])
    }

    /// Reads a varint of up to 10 bytes as a full 64-bit quantity.
    ///
    /// Bits beyond the 64th carried by the final byte are discarded.
    pub fn varint64(&mut self) -> ParseResult<WideInt> {
        let start = self.pos;
        let mut acc: u64 = 0;
        for ix in 0..MAX_VARINT_LEN {
            let b = self.byte()?;
            acc |= ((b & 0x7f) as u64) << (7 * ix);
            if b & 0x80 == 0 {
                return Ok(WideInt::from(acc));
            }
        }
        Err(TokenError::NonTerminating(self.buf[start..self.pos].to_vec()).into())
    }

    /// Reads a varint and keeps its low 32 bits.
    ///
    /// Sign-extended negative `int32` values occupy ten bytes and are
    /// accepted here.
    #[inline]
    pub fn varint32(&mut self) -> ParseResult<u32> {
        Ok(self.varint64()?.lo)
    }

    /// Reads a field key, rejecting field id zero and undefined wire types.
    pub fn tag(&mut self) -> ParseResult<Tag> {
        let raw = self.varint32()?;
        let wire_type = WireType::try_from((raw & 7) as u8)?;
        let id = raw >> 3;
        if id == 0 {
            return Err(TokenError::InvalidFieldId(id).into());
        }
        Ok(Tag { id, wire_type })
    }

    pub fn uint32(&mut self) -> ParseResult<u32> {
        self.varint32()
    }

    pub fn int32(&mut self) -> ParseResult<i32> {
        Ok(self.varint32()? as i32)
    }

    pub fn sint32(&mut self) -> ParseResult<i32> {
        let n = self.varint32()?;
        Ok(((n >> 1) as i32) ^ -((n & 1) as i32))
    }

    pub fn uint64(&mut self) -> ParseResult<u64> {
        Ok(self.varint64()?.to_u64())
    }

    pub fn int64(&mut self) -> ParseResult<i64> {
        Ok(self.varint64()?.to_i64())
    }

    pub fn sint64(&mut self) -> ParseResult<i64> {
        Ok(self.varint64()?.zz_decode().to_i64())
    }

    /// Any non-zero varint is `true`.
    pub fn bool(&mut self) -> ParseResult<bool> {
        Ok(!self.varint64()?.is_zero())
    }

    pub fn fixed32(&mut self) -> ParseResult<u32> {
        Ok(u32::from_le_bytes(self.consume_arr()?))
    }

    pub fn sfixed32(&mut self) -> ParseResult<i32> {
        Ok(i32::from_le_bytes(self.consume_arr()?))
    }

    pub fn fixed64(&mut self) -> ParseResult<u64> {
        Ok(u64::from_le_bytes(self.consume_arr()?))
    }

    pub fn sfixed64(&mut self) -> ParseResult<i64> {
        Ok(i64::from_le_bytes(self.consume_arr()?))
    }

    pub fn float(&mut self) -> ParseResult<f32> {
        Ok(f32::from_le_bytes(self.consume_arr()?))
    }

    pub fn double(&mut self) -> ParseResult<f64> {
        Ok(f64::from_le_bytes(self.consume_arr()?))
    }

    /// Reads a length-prefixed payload, borrowing it from the input.
    pub fn bytes(&mut self) -> ParseResult<&'a [u8]> {
        let n = self.varint32()? as usize;
        if n > self.remainder() {
            return Err(WindowError::OpenWouldExceedBuffer {
                bytes_left: self.remainder(),
                request: n,
            }
            .into());
        }
        self.consume(n)
    }

    /// Reads a length-prefixed UTF-8 payload.
    pub fn string(&mut self) -> ParseResult<Cow<'a, str>> {
        let raw = self.bytes()?;
        cfg_if::cfg_if! {
            if #[cfg(feature = "lossy_strings")] {
                Ok(String::from_utf8_lossy(raw))
            } else {
                Ok(Cow::Borrowed(std::str::from_utf8(raw)?))
            }
        }
    }

    /// Skips `len` bytes, or a single varint if `len` is `None`.
    pub fn skip(&mut self, len: Option<usize>) -> ParseResult<()> {
        match len {
            Some(n) => {
                self.consume(n)?;
            }
            None => {
                let start = self.pos;
                loop {
                    if self.byte()? & 0x80 == 0 {
                        break;
                    }
                    if self.pos - start >= MAX_VARINT_LEN {
                        return Err(TokenError::NonTerminating(
                            self.buf[start..self.pos].to_vec(),
                        )
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Skips the payload of a field with the given wire type.
    ///
    /// Group wire types are not supported and fail with
    /// [`TokenError::InvalidWireType`].
    pub fn skip_type(&mut self, wire_type: WireType) -> ParseResult<()> {
        match wire_type {
            WireType::Varint => self.skip(None),
            WireType::Bit64 => self.skip(Some(8)),
            WireType::LengthDelimited => {
                let n = self.varint32()? as usize;
                self.skip(Some(n))
            }
            WireType::Bit32 => self.skip(Some(4)),
            WireType::StartGroup | WireType::EndGroup => {
                Err(TokenError::InvalidWireType(wire_type.to_u8()).into())
            }
        }
    }

    /// Reads a length prefix and returns the absolute offset at which the
    /// announced region ends.
    pub fn sub_limit(&mut self) -> ParseResult<usize> {
        let n = self.varint32()? as usize;
        if n > self.remainder() {
            return Err(WindowError::OpenWouldExceedBuffer {
                bytes_left: self.remainder(),
                request: n,
            }
            .into());
        }
        Ok(self.pos + n)
    }

    /// Confirms that the cursor did not run past the end of a region
    /// previously opened with [`sub_limit`](Reader::sub_limit).
    pub fn close_limit(&self, limit: usize) -> ParseResult<()> {
        if self.pos > limit {
            Err(WindowError::LimitOverrun {
                limit,
                offset: self.pos,
            }
            .into())
        } else {
            Ok(())
        }
    }

    /// Rebinds the reader to a new buffer, starting from its first byte.
    pub fn reset(&mut self, buf: &'a [u8]) {
        self.buf = buf;
        self.pos = 0;
    }

    /// Returns the unread remainder of the buffer and moves the cursor to
    /// its end.
    pub fn finish(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }
}

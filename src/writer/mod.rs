//! Deferred wire-format output
//!
//! The [`Writer`] does not write bytes when a value is pushed. Each call
//! queues an operation that knows its own encoded length, and the total
//! length of the current frame is tracked as operations are queued. This
//! allows a length-delimited sub-message to be written without measuring it
//! first:
//!
//! ```
//! # use protium::writer::Writer;
//! # use protium::parse::WireType;
//! let mut w = Writer::new();
//! w.tag(1, WireType::LengthDelimited).fork();
//! w.tag(1, WireType::Varint).uint32(150);
//! w.ldelim();
//! assert_eq!(w.finish(), vec![0x0a, 0x03, 0x08, 0x96, 0x01]);
//! ```
//!
//! [`fork`](Writer::fork) saves the current frame and starts an empty one;
//! [`ldelim`](Writer::ldelim) restores the saved frame, queues the length of
//! the forked frame as a varint, and splices the forked operations in after
//! it. Bytes are only produced by [`finish`](Writer::finish), in one pass
//! into a buffer allocated at its exact final size.

mod op;

use std::borrow::Cow;

use crate::internal::stack::Stack;
use crate::parse::WireType;
use crate::target::Target;
use crate::wide::WideInt;
use op::{Op, Payload};

pub use op::varint32_len;

/// Saved `(head, tail, len)` of an enclosing frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Frame {
    head: usize,
    tail: usize,
    len: usize,
}

cfg_if::cfg_if! {
    if #[cfg(feature = "smallvec_framestack")] {
        type FrameStack = smallvec::SmallVec<[Frame; 8]>;
    } else {
        type FrameStack = Vec<Frame>;
    }
}

/// Deferred binary output sink
///
/// The lifetime `'a` bounds borrowed `bytes`/`string` payloads, which are
/// not copied until [`finish`](Writer::finish).
#[derive(Clone, Debug)]
pub struct Writer<'a> {
    ops: Vec<Op<'a>>,
    head: usize,
    tail: usize,
    len: usize,
    states: FrameStack,
}

impl<'a> Default for Writer<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Writer<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ops: vec![Op::sentinel()],
            head: 0,
            tail: 0,
            len: 0,
            states: FrameStack::new(),
        }
    }

    /// Total byte-length of the operations queued in the current frame
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of forks not yet closed by `ldelim` or `reset`
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        Stack::depth(&self.states)
    }

    fn push(&mut self, payload: Payload<'a>) -> &mut Self {
        let op = Op::new(payload);
        let ix = self.ops.len();
        self.len += op.len;
        self.ops.push(op);
        self.ops[self.tail].next = Some(ix);
        self.tail = ix;
        self
    }

    /// Writes a field key for `id` and `wire_type`.
    pub fn tag(&mut self, id: u32, wire_type: WireType) -> &mut Self {
        self.uint32((id << 3) | wire_type.to_u8() as u32)
    }

    pub fn uint32(&mut self, value: u32) -> &mut Self {
        self.push(Payload::Varint32(value))
    }

    /// Negative values are sign-extended to ten bytes.
    pub fn int32(&mut self, value: i32) -> &mut Self {
        if value < 0 {
            self.push(Payload::Varint64(WideInt::from(value as i64)))
        } else {
            self.push(Payload::Varint32(value as u32))
        }
    }

    pub fn sint32(&mut self, value: i32) -> &mut Self {
        self.push(Payload::Varint32(((value << 1) ^ (value >> 31)) as u32))
    }

    /// Writes an arbitrary 64-bit pattern as a varint.
    pub fn varint64(&mut self, value: WideInt) -> &mut Self {
        self.push(Payload::Varint64(value))
    }

    pub fn uint64(&mut self, value: u64) -> &mut Self {
        self.varint64(WideInt::from(value))
    }

    pub fn int64(&mut self, value: i64) -> &mut Self {
        self.varint64(WideInt::from(value))
    }

    pub fn sint64(&mut self, value: i64) -> &mut Self {
        self.varint64(WideInt::from(value).zz_encode())
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.push(Payload::Byte(value as u8))
    }

    pub fn fixed32(&mut self, value: u32) -> &mut Self {
        self.push(Payload::Fixed32(value))
    }

    pub fn sfixed32(&mut self, value: i32) -> &mut Self {
        self.push(Payload::Fixed32(value as u32))
    }

    pub fn fixed64(&mut self, value: u64) -> &mut Self {
        self.push(Payload::Fixed64(WideInt::from(value)))
    }

    pub fn sfixed64(&mut self, value: i64) -> &mut Self {
        self.push(Payload::Fixed64(WideInt::from(value)))
    }

    pub fn float(&mut self, value: f32) -> &mut Self {
        self.push(Payload::Float(value))
    }

    pub fn double(&mut self, value: f64) -> &mut Self {
        self.push(Payload::Double(value))
    }

    /// Writes a length-prefixed byte payload.
    pub fn bytes(&mut self, value: impl Into<Cow<'a, [u8]>>) -> &mut Self {
        let value = value.into();
        if value.is_empty() {
            return self.push(Payload::Byte(0));
        }
        self.uint32(value.len() as u32);
        self.push(Payload::Bytes(value))
    }

    /// Writes a length-prefixed UTF-8 payload.
    pub fn string(&mut self, value: impl Into<Cow<'a, str>>) -> &mut Self {
        let bytes: Cow<'a, [u8]> = match value.into() {
            Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
            Cow::Owned(s) => Cow::Owned(s.into_bytes()),
        };
        self.bytes(bytes)
    }

    /// Splices pre-encoded bytes in verbatim, without a length prefix.
    pub fn raw(&mut self, value: impl Into<Cow<'a, [u8]>>) -> &mut Self {
        let value = value.into();
        if value.is_empty() {
            return self;
        }
        self.push(Payload::Bytes(value))
    }

    /// Saves the current frame and starts an empty one.
    pub fn fork(&mut self) -> &mut Self {
        let frame = Frame {
            head: self.head,
            tail: self.tail,
            len: self.len,
        };
        Stack::push(&mut self.states, frame);
        let ix = self.ops.len();
        self.ops.push(Op::sentinel());
        self.head = ix;
        self.tail = ix;
        self.len = 0;
        self
    }

    /// Drops the current frame. If a fork is open, the frame saved by it is
    /// restored; otherwise the writer is emptied.
    pub fn reset(&mut self) -> &mut Self {
        match Stack::pop(&mut self.states) {
            Some(frame) => self.restore(frame),
            None => self.clear(),
        }
        self
    }

    /// Closes the innermost fork, prefixing its contents with their length.
    ///
    /// # Panics
    ///
    /// Panics if no fork is open.
    pub fn ldelim(&mut self) -> &mut Self {
        let frame = match Stack::pop(&mut self.states) {
            Some(frame) => frame,
            None => panic!("Writer::ldelim called without a matching fork"),
        };
        self.splice(frame, true)
    }

    /// Closes the innermost fork without a length prefix, so that its
    /// contents continue the enclosing frame.
    ///
    /// # Panics
    ///
    /// Panics if no fork is open.
    pub fn join(&mut self) -> &mut Self {
        let frame = match Stack::pop(&mut self.states) {
            Some(frame) => frame,
            None => panic!("Writer::join called without a matching fork"),
        };
        self.splice(frame, false)
    }

    fn splice(&mut self, frame: Frame, prefixed: bool) -> &mut Self {
        let (head, tail, len) = (self.head, self.tail, self.len);
        self.restore(frame);
        if prefixed {
            self.uint32(len as u32);
        }
        if let Some(first) = self.ops[head].next {
            self.ops[self.tail].next = Some(first);
            self.tail = tail;
            self.len += len;
        }
        self
    }

    fn restore(&mut self, frame: Frame) {
        self.head = frame.head;
        self.tail = frame.tail;
        self.len = frame.len;
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.ops.push(Op::sentinel());
        Stack::clear(&mut self.states);
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }

    /// Replays the current frame into `tgt`, returning the number of bytes
    /// written, and leaves the writer empty.
    pub fn finish_into<T: Target>(&mut self, tgt: &mut T) -> usize {
        tgt.anticipate(self.len);
        let mut written = 0;
        let mut cursor = self.ops[self.head].next;
        while let Some(ix) = cursor {
            let op = &self.ops[ix];
            let n = op.payload.write(tgt);
            debug_assert_eq!(n, op.len);
            written += n;
            cursor = op.next;
        }
        debug_assert_eq!(written, self.len);
        self.clear();
        written
    }

    /// Returns the encoded bytes of the current frame, in a buffer of exactly
    /// [`len`](Writer::len) bytes, and leaves the writer empty.
    #[must_use = "finish empties the writer"]
    pub fn finish(&mut self) -> Vec<u8> {
        let mut buf: Vec<u8> = Target::create();
        self.finish_into(&mut buf);
        buf
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parse::Reader;
    use crate::util::hex_of_bytes;

    fn hex(w: &mut Writer) -> String {
        hex_of_bytes(w.finish())
    }

    #[test]
    fn scalars() {
        let mut w = Writer::new();
        w.uint32(300).sint32(-1).sint32(1).bool(true).bool(false);
        assert_eq!(hex(&mut w), "ac0201020100");

        w.int32(-1);
        assert_eq!(hex(&mut w), "ffffffffffffffffff01");

        w.sfixed32(-2).fixed32(1);
        assert_eq!(hex(&mut w), "feffffff01000000");

        w.sint64(i64::MIN);
        assert_eq!(hex(&mut w), "ffffffffffffffffff01");

        w.uint64(4294967296).fixed64(0x0102030405060708);
        assert_eq!(hex(&mut w), "80808080100807060504030201");

        w.float(1.0).double(1.0);
        assert_eq!(hex(&mut w), "0000803f000000000000f03f");
    }

    #[test]
    fn tags_are_varints() {
        let mut w = Writer::new();
        w.tag(1, WireType::Varint).tag(15, WireType::Bit32).tag(16, WireType::LengthDelimited);
        assert_eq!(hex(&mut w), "087d8201");
    }

    #[test]
    fn length_prefixed() {
        let mut w = Writer::new();
        w.string("abc").string(String::from("é")).bytes(&b""[..]).string("");
        assert_eq!(w.len(), 4 + 3 + 1 + 1);
        assert_eq!(hex(&mut w), "0361626302c3a90000");
    }

    #[test]
    fn three_level_nesting() {
        let mut w = Writer::new();
        w.tag(1, WireType::LengthDelimited).fork();
        w.tag(1, WireType::LengthDelimited).fork();
        w.tag(1, WireType::LengthDelimited).fork();
        assert_eq!(w.depth(), 3);
        w.tag(1, WireType::Varint).uint32(300);
        w.ldelim();
        w.ldelim();
        w.ldelim();
        assert_eq!(w.depth(), 0);
        assert_eq!(w.len(), 9);
        let out = w.finish();
        assert_eq!(hex_of_bytes(&out), "0a070a050a0308ac02");

        let mut r = Reader::new(&out);
        let mut expected = 7;
        for _ in 0..3 {
            r.tag().unwrap();
            let end = r.sub_limit().unwrap();
            assert_eq!(end - r.pos(), expected);
            assert_eq!(r.len() - r.pos(), expected);
            expected -= 2;
        }
    }

    #[test]
    fn empty_fork_keeps_following_writes() {
        let mut w = Writer::new();
        w.tag(1, WireType::LengthDelimited).fork().ldelim();
        w.tag(2, WireType::Varint).uint32(1);
        assert_eq!(hex(&mut w), "0a001001");
    }

    #[test]
    fn reset_discards_fork() {
        let mut w = Writer::new();
        w.uint32(1).fork().uint32(2).uint32(3);
        assert_eq!(w.len(), 2);
        w.reset();
        assert_eq!(w.len(), 1);
        w.uint32(4);
        assert_eq!(hex(&mut w), "0104");

        w.uint32(5).reset();
        assert!(w.is_empty());
    }

    #[test]
    fn join_splices_without_prefix() {
        let mut w = Writer::new();
        w.uint32(1).fork().uint32(2).fork().uint32(3).ldelim();
        w.join().uint32(4);
        assert_eq!(w.depth(), 0);
        assert_eq!(w.len(), 5);
        assert_eq!(hex(&mut w), "0102010304");
    }

    #[test]
    fn finish_leaves_writer_reusable() {
        let mut w = Writer::new();
        w.fork().uint32(9);
        let inner = w.finish();
        assert_eq!(inner, vec![9]);
        assert_eq!(w.depth(), 0);
        assert!(w.is_empty());
        w.raw(&[1u8, 2, 3][..]);
        assert_eq!(hex(&mut w), "010203");
    }

    #[test]
    #[should_panic(expected = "without a matching fork")]
    fn unbalanced_ldelim_panics() {
        let mut w = Writer::new();
        w.uint32(1).ldelim();
    }
}

//! Message codecs
//!
//! Every message type can be encoded, decoded and verified in one of two
//! ways: reflectively, by walking its field list on each call, or through a
//! routine specialized for that type ahead of the first call. The latter are
//! built lazily, once per type, and memoized in the type's descriptor; the
//! former remain available as the fallback whenever specialization is
//! disabled for a [`Root`] (see [`CodecMode`]) or unavailable in the build
//! (see [`codegen::supported`](crate::codegen::supported)).
//!
//! Both paths produce identical results for the same input.

pub mod decoder;
pub mod encoder;
pub mod verifier;
mod wire;

use std::fmt::{self, Debug};
use std::sync::{Arc, Once};

use once_cell::sync::OnceCell;

use crate::codegen;
use crate::error::{DecodeResult, EncodeResult, VerifyError};
use crate::parse::error::{ParseError, WindowError};
use crate::parse::Reader;
use crate::schema::{Root, TypeId};
use crate::value::Message;
use crate::writer::Writer;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use verifier::Verifier;

/// Specialized encoding routine of one type
pub type EncodeFn =
    Arc<dyn for<'a> Fn(&Root, &'a Message, &mut Writer<'a>) -> EncodeResult<()> + Send + Sync>;

/// Specialized decoding routine of one type; reads fields until the given
/// absolute offset.
pub type DecodeFn =
    Arc<dyn Fn(&Root, &mut Reader<'_>, usize, &mut Message) -> DecodeResult<()> + Send + Sync>;

/// Specialized verification routine of one type
pub type VerifyFn = Arc<dyn Fn(&Root, &Message) -> Result<(), VerifyError> + Send + Sync>;

/// Compile-once slots for the specialized routines of a type
#[derive(Clone, Default)]
pub(crate) struct CodecCache {
    encode: OnceCell<EncodeFn>,
    decode: OnceCell<DecodeFn>,
    verify: OnceCell<VerifyFn>,
}

impl CodecCache {
    pub(crate) fn is_populated(&self) -> bool {
        self.encode.get().is_some() || self.decode.get().is_some() || self.verify.get().is_some()
    }
}

impl Debug for CodecCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecCache")
            .field("encode", &self.encode.get().is_some())
            .field("decode", &self.decode.get().is_some())
            .field("verify", &self.verify.get().is_some())
            .finish()
    }
}

/// Strategy used by the codec entry points of a [`Root`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CodecMode {
    /// Specialized per-type routines, built on first use
    #[default]
    Compiled,
    /// Field-list walking on every call
    Reflective,
}

fn use_compiled(root: &Root) -> bool {
    if root.mode() == CodecMode::Reflective {
        return false;
    }
    if codegen::supported() {
        return true;
    }
    static FALLBACK: Once = Once::new();
    FALLBACK.call_once(|| {
        tracing::debug!("routine synthesis unavailable in this build, using reflective codecs")
    });
    false
}

pub(crate) fn encode_message<'a>(
    root: &Root,
    id: TypeId,
    msg: &'a Message,
    w: &mut Writer<'a>,
) -> EncodeResult<()> {
    let ty = root.type_of(id)?;
    if use_compiled(root) {
        let routine = ty.cache.encode.get_or_try_init(|| {
            tracing::trace!(ty = ty.name(), "building encoder");
            Encoder::new(root, id)?.generate()
        })?;
        routine(root, msg, w)
    } else {
        Encoder::new(root, id)?.encode(msg, w)
    }
}

pub(crate) fn decode_message(
    root: &Root,
    id: TypeId,
    r: &mut Reader<'_>,
    end: usize,
    into: &mut Message,
) -> DecodeResult<()> {
    let ty = root.type_of(id)?;
    if use_compiled(root) {
        let routine = ty.cache.decode.get_or_try_init(|| {
            tracing::trace!(ty = ty.name(), "building decoder");
            Decoder::new(root, id)?.generate()
        })?;
        routine(root, r, end, into)
    } else {
        Decoder::new(root, id)?.decode(r, end, into)
    }
}

pub(crate) fn verify_message(root: &Root, id: TypeId, msg: &Message) -> Result<(), VerifyError> {
    let ty = root.type_of(id)?;
    if use_compiled(root) {
        let routine = ty.cache.verify.get_or_try_init(|| {
            tracing::trace!(ty = ty.name(), "building verifier");
            Verifier::new(root, id)?.generate()
        })?;
        routine(root, msg)
    } else {
        Verifier::new(root, id)?.verify(msg)
    }
}

/// Entry points for one message type of a [`Root`]
///
/// ```
/// # use protium::schema::{Field, Root, Type};
/// # use protium::Message;
/// let mut root = Root::new();
/// let mut point = Type::new("Point");
/// point.add_field(Field::new("x", 1, "sint32")).unwrap()
///     .add_field(Field::new("y", 2, "sint32")).unwrap();
/// let point = root.add_type(point).unwrap();
/// root.resolve();
///
/// let codec = root.codec(point);
/// let bytes = codec.encode(&Message::new().with(1, -1).with(2, 2)).unwrap();
/// assert_eq!(bytes, [0x08, 0x01, 0x10, 0x04]);
/// let back = codec.decode(&bytes).unwrap();
/// assert_eq!(back.get(1), Some(&protium::Value::I32(-1)));
/// assert!(codec.verify(&back).is_ok());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Codec<'r> {
    root: &'r Root,
    id: TypeId,
}

impl<'r> Codec<'r> {
    #[must_use]
    pub fn new(root: &'r Root, id: TypeId) -> Self {
        Self { root, id }
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Appends the encoding of `msg` to `w`. On failure `w` is left as it
    /// was before the call.
    pub fn encode_into<'a>(&self, msg: &'a Message, w: &mut Writer<'a>) -> EncodeResult<()> {
        self.root.ensure_resolved()?;
        let depth = w.depth();
        w.fork();
        match encode_message(self.root, self.id, msg, w) {
            Ok(()) => {
                w.join();
                Ok(())
            }
            Err(err) => {
                while w.depth() > depth {
                    w.reset();
                }
                Err(err)
            }
        }
    }

    pub fn encode(&self, msg: &Message) -> EncodeResult<Vec<u8>> {
        let mut w = Writer::new();
        self.encode_into(msg, &mut w)?;
        Ok(w.finish())
    }

    /// Encodes `msg` preceded by its length as a varint.
    pub fn encode_delimited(&self, msg: &Message) -> EncodeResult<Vec<u8>> {
        let mut w = Writer::new();
        w.fork();
        self.encode_into(msg, &mut w)?;
        w.ldelim();
        Ok(w.finish())
    }

    /// Decodes a message from `r`, reading `len` bytes from the current
    /// position or, if `None`, everything up to the end of the buffer.
    pub fn decode_from(&self, r: &mut Reader<'_>, len: Option<usize>) -> DecodeResult<Message> {
        self.root.ensure_resolved()?;
        let end = match len {
            None => r.len(),
            Some(len) if len <= r.remainder() => r.pos() + len,
            Some(len) => {
                let err = ParseError::from(WindowError::OpenWouldExceedBuffer {
                    bytes_left: r.remainder(),
                    request: len,
                });
                return Err(err.into());
            }
        };
        let mut msg = Message::new();
        decode_message(self.root, self.id, r, end, &mut msg)?;
        r.close_limit(end)?;
        Ok(msg)
    }

    pub fn decode(&self, buf: &[u8]) -> DecodeResult<Message> {
        self.decode_from(&mut Reader::new(buf), None)
    }

    /// Decodes a message preceded by its length as a varint.
    pub fn decode_delimited(&self, buf: &[u8]) -> DecodeResult<Message> {
        let mut r = Reader::new(buf);
        let len = r.uint32()? as usize;
        self.decode_from(&mut r, Some(len))
    }

    /// Checks required-field presence, enum membership and nested validity,
    /// stopping at the first violation.
    pub fn verify(&self, msg: &Message) -> Result<(), VerifyError> {
        self.root.ensure_resolved()?;
        verify_message(self.root, self.id, msg)
    }

    /// Listings of the specialized encode, decode and verify routines.
    pub fn listings(&self) -> Result<[String; 3], crate::error::DescriptorError> {
        Ok([
            Encoder::new(self.root, self.id)?.listing()?,
            Decoder::new(self.root, self.id)?.listing()?,
            Verifier::new(self.root, self.id)?.listing()?,
        ])
    }
}

impl Root {
    /// Entry points for the message type `id`.
    #[must_use]
    pub fn codec(&self, id: TypeId) -> Codec<'_> {
        Codec::new(self, id)
    }
}

/// Encodes `msg` as a message of type `id`.
pub fn encode(root: &Root, id: TypeId, msg: &Message) -> EncodeResult<Vec<u8>> {
    root.codec(id).encode(msg)
}

/// Decodes the whole of `buf` as a message of type `id`.
pub fn decode(root: &Root, id: TypeId, buf: &[u8]) -> DecodeResult<Message> {
    root.codec(id).decode(buf)
}

/// Verifies `msg` against type `id`, returning the first violation found.
pub fn verify(root: &Root, id: TypeId, msg: &Message) -> Result<(), VerifyError> {
    root.codec(id).verify(msg)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::{DecodeError, DescriptorError, EncodeError};
    use crate::parse::WireType;
    use crate::schema::{Field, Type};

    fn tree() -> (Root, TypeId) {
        let mut root = Root::new();
        let mut node = Type::new("Node");
        node.add_field(Field::new("value", 1, "int32")).unwrap()
            .add_field(Field::new("next", 2, "Node")).unwrap();
        let id = root.add_type(node).unwrap();
        root.resolve();
        (root, id)
    }

    #[test]
    fn compiles_once_per_type() {
        let (root, id) = tree();
        assert!(!root.get(id).unwrap().is_compiled());
        let msg = Message::new().with(1, 1).with(2, Message::new().with(1, 2));
        let bytes = encode(&root, id, &msg).unwrap();
        assert_eq!(bytes, [0x08, 0x01, 0x12, 0x02, 0x08, 0x02]);
        assert_eq!(root.get(id).unwrap().is_compiled(), codegen::supported());
        assert_eq!(decode(&root, id, &bytes).unwrap(), msg);
    }

    #[test]
    fn failed_encode_leaves_writer_untouched() {
        for mode in [CodecMode::Compiled, CodecMode::Reflective] {
            let (mut root, id) = tree();
            root.set_mode(mode);
            let codec = root.codec(id);
            let bad = Message::new()
                .with(1, 1)
                .with(2, Message::new().with(2, Message::new().with(1, "oops")));
            let good = Message::new().with(1, 3);

            let mut w = Writer::new();
            w.tag(9, WireType::Varint).uint32(7);
            assert!(matches!(
                codec.encode_into(&bad, &mut w),
                Err(EncodeError::KindMismatch { .. })
            ));
            assert_eq!(w.depth(), 0);
            assert_eq!(w.len(), 2);
            codec.encode_into(&good, &mut w).unwrap();
            assert_eq!(w.finish(), [0x48, 0x07, 0x08, 0x03]);
        }
    }

    #[test]
    fn reflective_mode_leaves_cache_empty() {
        let (mut root, id) = tree();
        root.set_mode(CodecMode::Reflective);
        let msg = Message::new().with(1, 5);
        let bytes = encode(&root, id, &msg).unwrap();
        assert_eq!(decode(&root, id, &bytes).unwrap(), msg);
        assert!(verify(&root, id, &msg).is_ok());
        assert!(!root.get(id).unwrap().is_compiled());
    }

    #[test]
    fn mutation_drops_compiled_routines() {
        let (mut root, id) = tree();
        encode(&root, id, &Message::new()).unwrap();
        root.type_mut(id)
            .unwrap()
            .add_field(Field::new("name", 3, "string"))
            .unwrap();
        assert!(!root.get(id).unwrap().is_compiled());
        let bytes = encode(&root, id, &Message::new().with(3, "n")).unwrap();
        assert_eq!(bytes, [0x1a, 0x01, b'n']);
    }

    #[test]
    fn delimited_framing() {
        let (root, id) = tree();
        let codec = root.codec(id);
        let msg = Message::new().with(1, 150);
        let bytes = codec.encode_delimited(&msg).unwrap();
        assert_eq!(bytes, [0x03, 0x08, 0x96, 0x01]);
        assert_eq!(codec.decode_delimited(&bytes).unwrap(), msg);
        assert!(matches!(
            codec.decode_delimited(&bytes[..3]),
            Err(DecodeError::Parse(ParseError::Window(WindowError::OpenWouldExceedBuffer { .. })))
        ));
    }

    #[test]
    fn unresolved_roots_are_rejected() {
        let mut root = Root::new();
        let mut t = Type::new("T");
        t.add_field(Field::new("x", 1, "Missing")).unwrap();
        let id = root.add_type(t).unwrap();
        root.resolve();
        assert!(matches!(
            encode(&root, id, &Message::new()),
            Err(EncodeError::Descriptor(DescriptorError::Unresolved { .. }))
        ));
        assert!(matches!(
            decode(&root, id, &[]),
            Err(DecodeError::Descriptor(DescriptorError::Unresolved { .. }))
        ));
        assert!(verify(&root, id, &Message::new()).is_err());
    }

    #[test]
    fn truncated_input_fails() {
        let (root, id) = tree();
        let err = decode(&root, id, &[0x12, 0x05, 0x08]).unwrap_err();
        assert!(matches!(err, DecodeError::Parse(_)));
        assert!(decode(&root, id, &[0x08]).is_err());
        assert_eq!(decode(&root, id, &[]).unwrap(), Message::new());
    }
}

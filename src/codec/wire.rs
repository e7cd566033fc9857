//! Element-level read and write primitives
//!
//! Every scalar type (and the enum encoding) has one static [`WireOps`]
//! entry pairing its wire type with a write and a read routine. Both the
//! reflective and the compiled codecs go through these entries, the former
//! looking them up per value and the latter capturing them once per field,
//! so that the two paths cannot disagree about the bytes of a value.

use crate::error::{DecodeResult, EncodeError};
use crate::parse::error::{ParseResult, TokenError};
use crate::parse::{Reader, Tag, WireType};
use crate::schema::{FieldKind, Root, ScalarType, TypeId};
use crate::value::{MapKey, Message, Value};
use crate::wide::WideInt;
use crate::writer::Writer;

/// Writes one value without a key; `Err` carries the kind actually found.
pub(crate) type WriteFn = for<'a> fn(&mut Writer<'a>, &'a Value) -> Result<(), &'static str>;

/// Reads one value of a known wire type.
pub(crate) type ReadFn = fn(&mut Reader<'_>) -> ParseResult<Value>;

pub(crate) struct WireOps {
    /// Name of the writer/reader method, for listings
    pub(crate) method: &'static str,
    pub(crate) wire_type: WireType,
    /// Value kind accepted by `write`
    pub(crate) expects: &'static str,
    pub(crate) write: WriteFn,
    pub(crate) read: ReadFn,
}

macro_rules! wire_ops {
    ($($ops:ident: $method:ident, $wt:ident, $variant:ident, $expects:literal;)*) => {
        $(
            pub(crate) static $ops: WireOps = WireOps {
                method: stringify!($method),
                wire_type: WireType::$wt,
                expects: $expects,
                write: {
                    fn write<'a>(w: &mut Writer<'a>, v: &'a Value) -> Result<(), &'static str> {
                        match v {
                            Value::$variant(x) => {
                                w.$method(*x);
                                Ok(())
                            }
                            other => Err(other.kind_name()),
                        }
                    }
                    write
                },
                read: {
                    fn read(r: &mut Reader<'_>) -> ParseResult<Value> {
                        Ok(Value::$variant(r.$method()?))
                    }
                    read
                },
            };
        )*
    };
}

wire_ops! {
    DOUBLE: double, Bit64, F64, "double";
    FLOAT: float, Bit32, F32, "float";
    INT32: int32, Varint, I32, "int32";
    UINT32: uint32, Varint, U32, "uint32";
    SINT32: sint32, Varint, I32, "int32";
    FIXED32: fixed32, Bit32, U32, "uint32";
    SFIXED32: sfixed32, Bit32, I32, "int32";
    INT64: int64, Varint, I64, "int64";
    UINT64: uint64, Varint, U64, "uint64";
    SINT64: sint64, Varint, I64, "int64";
    FIXED64: fixed64, Bit64, U64, "uint64";
    SFIXED64: sfixed64, Bit64, I64, "int64";
    BOOL: bool, Varint, Bool, "bool";
    ENUM: int32, Varint, Enum, "enum";
}

pub(crate) static STRING: WireOps = WireOps {
    method: "string",
    wire_type: WireType::LengthDelimited,
    expects: "string",
    write: write_string,
    read: read_string,
};

pub(crate) static BYTES: WireOps = WireOps {
    method: "bytes",
    wire_type: WireType::LengthDelimited,
    expects: "bytes",
    write: write_bytes,
    read: read_bytes,
};

fn write_string<'a>(w: &mut Writer<'a>, v: &'a Value) -> Result<(), &'static str> {
    match v {
        Value::Str(s) => {
            w.string(s.as_str());
            Ok(())
        }
        other => Err(other.kind_name()),
    }
}

fn read_string(r: &mut Reader<'_>) -> ParseResult<Value> {
    Ok(Value::Str(r.string()?.into_owned()))
}

fn write_bytes<'a>(w: &mut Writer<'a>, v: &'a Value) -> Result<(), &'static str> {
    match v {
        Value::Bytes(b) => {
            w.bytes(b.as_slice());
            Ok(())
        }
        other => Err(other.kind_name()),
    }
}

fn read_bytes(r: &mut Reader<'_>) -> ParseResult<Value> {
    Ok(Value::Bytes(r.bytes()?.to_vec()))
}

/// Primitive table entry for a scalar type
pub(crate) fn scalar_ops(ty: ScalarType) -> &'static WireOps {
    match ty {
        ScalarType::Double => &DOUBLE,
        ScalarType::Float => &FLOAT,
        ScalarType::Int32 => &INT32,
        ScalarType::Uint32 => &UINT32,
        ScalarType::Sint32 => &SINT32,
        ScalarType::Fixed32 => &FIXED32,
        ScalarType::Sfixed32 => &SFIXED32,
        ScalarType::Int64 => &INT64,
        ScalarType::Uint64 => &UINT64,
        ScalarType::Sint64 => &SINT64,
        ScalarType::Fixed64 => &FIXED64,
        ScalarType::Sfixed64 => &SFIXED64,
        ScalarType::Bool => &BOOL,
        ScalarType::String => &STRING,
        ScalarType::Bytes => &BYTES,
    }
}

/// Primitive table entry for a field kind; `None` for message kinds.
pub(crate) fn kind_ops(kind: FieldKind) -> Option<&'static WireOps> {
    match kind {
        FieldKind::Scalar(ty) => Some(scalar_ops(ty)),
        FieldKind::Enum(_) => Some(&ENUM),
        FieldKind::Message(_) => None,
    }
}

/// Fails unless `tag` carries the `expected` wire type.
pub(crate) fn expect_wire(tag: Tag, expected: WireType) -> ParseResult<()> {
    if tag.wire_type == expected {
        Ok(())
    } else {
        Err(TokenError::UnexpectedWireType {
            id: tag.id,
            expected,
            actual: tag.wire_type,
        }
        .into())
    }
}

pub(crate) fn mismatch(path: String, expected: &'static str, found: &'static str) -> EncodeError {
    EncodeError::KindMismatch {
        field: path,
        expected,
        found,
    }
}

fn key_kind_name(key: &MapKey) -> &'static str {
    match key {
        MapKey::Bool(_) => "bool",
        MapKey::I32(_) => "int32",
        MapKey::U32(_) => "uint32",
        MapKey::Long(_) => "int64",
        MapKey::Str(_) => "string",
    }
}

/// Writes field 1 of a map entry.
pub(crate) fn write_key<'a>(
    w: &mut Writer<'a>,
    ty: ScalarType,
    key: &'a MapKey,
) -> Result<(), &'static str> {
    w.tag(1, ty.wire_type());
    match (ty, key) {
        (ScalarType::Bool, MapKey::Bool(b)) => w.bool(*b),
        (ScalarType::Int32, MapKey::I32(n)) => w.int32(*n),
        (ScalarType::Sint32, MapKey::I32(n)) => w.sint32(*n),
        (ScalarType::Sfixed32, MapKey::I32(n)) => w.sfixed32(*n),
        (ScalarType::Uint32, MapKey::U32(n)) => w.uint32(*n),
        (ScalarType::Fixed32, MapKey::U32(n)) => w.fixed32(*n),
        (ScalarType::Int64 | ScalarType::Uint64, MapKey::Long(h)) => {
            w.varint64(WideInt::from_hash_key(*h))
        }
        (ScalarType::Sint64, MapKey::Long(h)) => w.varint64(WideInt::from_hash_key(*h).zz_encode()),
        (ScalarType::Fixed64 | ScalarType::Sfixed64, MapKey::Long(h)) => {
            w.fixed64(WideInt::from_hash_key(*h).to_u64())
        }
        (ScalarType::String, MapKey::Str(s)) => w.string(s.as_str()),
        (_, other) => return Err(key_kind_name(other)),
    };
    Ok(())
}

/// Reads field 1 of a map entry.
pub(crate) fn read_key(r: &mut Reader<'_>, ty: ScalarType) -> ParseResult<MapKey> {
    let value = (scalar_ops(ty).read)(r)?;
    Ok(MapKey::from_value(value).unwrap_or_else(|| MapKey::zero(ty)))
}

/// Value of a map entry whose value was not on the wire
pub(crate) fn element_default(root: &Root, kind: FieldKind) -> Value {
    match kind {
        FieldKind::Scalar(ty) => ty.zero(),
        FieldKind::Enum(id) => Value::Enum(root.get_enum(id).map_or(0, |e| e.default_number())),
        FieldKind::Message(_) => Value::Message(Message::new()),
    }
}

/// Decodes a length-prefixed nested message of type `sub` into `into`,
/// merging with whatever it already holds.
pub(crate) fn decode_nested(
    root: &Root,
    sub: TypeId,
    r: &mut Reader<'_>,
    into: &mut Message,
) -> DecodeResult<()> {
    let end = r.sub_limit()?;
    super::decode_message(root, sub, r, end, into)?;
    r.close_limit(end)?;
    Ok(())
}

/// Reads a packed run of `ops` elements, appending them to `out`.
pub(crate) fn read_packed(
    ops: &WireOps,
    r: &mut Reader<'_>,
    out: &mut Vec<Value>,
) -> DecodeResult<()> {
    let end = r.sub_limit()?;
    while r.pos() < end {
        out.push((ops.read)(r)?);
    }
    r.close_limit(end)?;
    Ok(())
}

/// Reads one map entry, falling back to defaults for a missing key or value.
pub(crate) fn read_entry(
    root: &Root,
    key_ty: ScalarType,
    kind: FieldKind,
    r: &mut Reader<'_>,
) -> DecodeResult<(MapKey, Value)> {
    let end = r.sub_limit()?;
    let mut key = None;
    let mut value = None;
    while r.pos() < end {
        let tag = r.tag()?;
        match tag.id {
            1 => {
                expect_wire(tag, key_ty.wire_type())?;
                key = Some(read_key(r, key_ty)?);
            }
            2 => match kind {
                FieldKind::Message(sub) => {
                    expect_wire(tag, WireType::LengthDelimited)?;
                    let mut m = match value.take() {
                        Some(Value::Message(m)) => m,
                        _ => Message::new(),
                    };
                    decode_nested(root, sub, r, &mut m)?;
                    value = Some(Value::Message(m));
                }
                _ => {
                    let ops = kind_ops(kind).unwrap_or(&ENUM);
                    expect_wire(tag, ops.wire_type)?;
                    value = Some((ops.read)(r)?);
                }
            },
            _ => skip_unknown(r, tag)?,
        }
    }
    r.close_limit(end)?;
    Ok((
        key.unwrap_or_else(|| MapKey::zero(key_ty)),
        value.unwrap_or_else(|| element_default(root, kind)),
    ))
}

/// Skips a field the decoded type does not declare.
pub(crate) fn skip_unknown(r: &mut Reader<'_>, tag: Tag) -> ParseResult<()> {
    tracing::trace!(id = tag.id, wire_type = %tag.wire_type, "skipping unknown field");
    r.skip_type(tag.wire_type)
}

/// Returns the list stored under `id`, replacing any non-list value.
pub(crate) fn list_mut(msg: &mut Message, id: u32) -> &mut Vec<Value> {
    let slot = msg.get_or_insert_with(id, || Value::List(Vec::new()));
    if !matches!(slot, Value::List(_)) {
        *slot = Value::List(Vec::new());
    }
    match slot {
        Value::List(list) => list,
        _ => unreachable!("slot was just replaced by a list"),
    }
}

/// Returns the map stored under `id`, replacing any non-map value.
pub(crate) fn map_mut(
    msg: &mut Message,
    id: u32,
) -> &mut std::collections::BTreeMap<MapKey, Value> {
    let slot = msg.get_or_insert_with(id, || Value::Map(Default::default()));
    if !matches!(slot, Value::Map(_)) {
        *slot = Value::Map(Default::default());
    }
    match slot {
        Value::Map(map) => map,
        _ => unreachable!("slot was just replaced by a map"),
    }
}

/// Decodes a singular message occurrence, merging into an existing value.
pub(crate) fn merge_message(
    root: &Root,
    sub: TypeId,
    id: u32,
    r: &mut Reader<'_>,
    msg: &mut Message,
) -> DecodeResult<()> {
    if let Some(Value::Message(existing)) = msg.get_mut(id) {
        return decode_nested(root, sub, r, existing);
    }
    let mut fresh = Message::new();
    decode_nested(root, sub, r, &mut fresh)?;
    msg.set(id, fresh);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::hex_of_bytes;

    #[test]
    fn table_wire_types() {
        for ty in ScalarType::ALL {
            assert_eq!(scalar_ops(ty).wire_type, ty.wire_type());
            assert_eq!(scalar_ops(ty).method, ty.name());
            assert_eq!(scalar_ops(ty).expects, ty.zero().kind_name());
        }
    }

    #[test]
    fn ops_roundtrip_through_reader() {
        let values = [
            (ScalarType::Sint32, Value::I32(-3)),
            (ScalarType::Sfixed64, Value::I64(-9)),
            (ScalarType::Fixed32, Value::U32(7)),
            (ScalarType::Double, Value::F64(2.5)),
            (ScalarType::String, Value::Str("hé".into())),
            (ScalarType::Bytes, Value::Bytes(vec![0, 1])),
            (ScalarType::Bool, Value::Bool(true)),
        ];
        for (ty, v) in values.iter() {
            let mut w = Writer::new();
            (scalar_ops(*ty).write)(&mut w, v).unwrap();
            let buf = w.finish();
            let mut r = Reader::new(&buf);
            assert_eq!(&(scalar_ops(*ty).read)(&mut r).unwrap(), v);
            assert_eq!(r.remainder(), 0);
        }
    }

    #[test]
    fn write_rejects_wrong_kind() {
        let mut w = Writer::new();
        assert_eq!((INT32.write)(&mut w, &Value::U32(1)), Err("uint32"));
        assert_eq!((ENUM.write)(&mut w, &Value::I32(1)), Err("int32"));
    }

    #[test]
    fn long_keys_keep_signedness() {
        let key = MapKey::from_i64(-1);
        let mut w = Writer::new();
        write_key(&mut w, ScalarType::Sint64, &key).unwrap();
        assert_eq!(hex_of_bytes(w.finish()), "0801");
        let mut w = Writer::new();
        write_key(&mut w, ScalarType::Sfixed64, &key).unwrap();
        assert_eq!(hex_of_bytes(w.finish()), "09ffffffffffffffff");
        let mut w = Writer::new();
        assert_eq!(write_key(&mut w, ScalarType::String, &key), Err("int64"));
    }
}

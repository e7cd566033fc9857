//! Encoder synthesis
//!
//! [`Encoder::encode`] walks the field list of its type on every call and
//! decides per field how to write it. [`Encoder::generate`] makes those
//! decisions once: it selects one writer closure per field from the field's
//! shape and element kind, captures the primitive table entry, default value
//! and nested type handle it needs, and links the closures into a single
//! routine for the type.
//!
//! Fields are written in declaration order. For each field:
//!   * map fields write one length-delimited `{1: key, 2: value}` entry per
//!     element
//!   * packed fields write one length-delimited run of untagged elements
//!   * other repeated fields write one key and value per element
//!   * singular message fields are written when present
//!   * singular scalar and enum fields are written when present and either
//!     required, declared with explicit presence, or unequal to their default

use std::sync::Arc;

use crate::codec::wire::{kind_ops, mismatch, scalar_ops, write_key, WireOps, ENUM};
use crate::codec::EncodeFn;
use crate::codegen::Codegen;
use crate::error::{DescriptorError, EncodeError, EncodeResult};
use crate::gen;
use crate::parse::WireType;
use crate::schema::{FieldKind, Root, ScalarType, Shape, Type, TypeId};
use crate::value::{MapKey, Message, Value};
use crate::writer::Writer;

/// Failure of a single element write, before the field path is known
enum Failure {
    Kind {
        expected: &'static str,
        found: &'static str,
    },
    Nested(EncodeError),
}

impl Failure {
    fn at(self, path: &str) -> EncodeError {
        match self {
            Failure::Kind { expected, found } => mismatch(path.to_owned(), expected, found),
            Failure::Nested(err) => err,
        }
    }
}

fn write_scalar<'a>(
    ops: &WireOps,
    id: u32,
    value: &'a Value,
    w: &mut Writer<'a>,
) -> Result<(), Failure> {
    w.tag(id, ops.wire_type);
    (ops.write)(w, value).map_err(|found| Failure::Kind {
        expected: ops.expects,
        found,
    })
}

fn write_sub<'a>(
    root: &Root,
    id: u32,
    sub: TypeId,
    value: &'a Value,
    w: &mut Writer<'a>,
) -> Result<(), Failure> {
    let msg = value.as_message().ok_or(Failure::Kind {
        expected: "message",
        found: value.kind_name(),
    })?;
    w.tag(id, WireType::LengthDelimited).fork();
    if let Err(err) = super::encode_message(root, sub, msg, w) {
        w.reset();
        return Err(Failure::Nested(err));
    }
    w.ldelim();
    Ok(())
}

fn write_element<'a>(
    root: &Root,
    id: u32,
    kind: FieldKind,
    value: &'a Value,
    w: &mut Writer<'a>,
) -> Result<(), Failure> {
    match kind {
        FieldKind::Message(sub) => write_sub(root, id, sub, value, w),
        FieldKind::Scalar(ty) => write_scalar(scalar_ops(ty), id, value, w),
        FieldKind::Enum(_) => write_scalar(&ENUM, id, value, w),
    }
}

fn write_packed<'a>(
    ops: &WireOps,
    id: u32,
    items: &'a [Value],
    w: &mut Writer<'a>,
) -> Result<(), Failure> {
    if items.is_empty() {
        return Ok(());
    }
    w.tag(id, WireType::LengthDelimited).fork();
    for item in items {
        if let Err(found) = (ops.write)(w, item) {
            w.reset();
            return Err(Failure::Kind {
                expected: ops.expects,
                found,
            });
        }
    }
    w.ldelim();
    Ok(())
}

fn write_entry<'a>(
    root: &Root,
    id: u32,
    key_ty: ScalarType,
    kind: FieldKind,
    key: &'a MapKey,
    value: &'a Value,
    w: &mut Writer<'a>,
) -> Result<(), Failure> {
    w.tag(id, WireType::LengthDelimited).fork();
    let written = write_key(w, key_ty, key)
        .map_err(|found| Failure::Kind {
            expected: key_ty.name(),
            found,
        })
        .and_then(|()| write_element(root, 2, kind, value, w));
    match written {
        Ok(()) => {
            w.ldelim();
            Ok(())
        }
        Err(failure) => {
            w.reset();
            Err(failure)
        }
    }
}

fn list_of<'v>(value: &'v Value, path: &str) -> EncodeResult<&'v [Value]> {
    value
        .as_list()
        .ok_or_else(|| mismatch(path.to_owned(), "list", value.kind_name()))
}

fn check_declared(ty: &Type, msg: &Message) -> EncodeResult<()> {
    match msg.iter().find(|(id, _)| ty.field_by_id(*id).is_none()) {
        Some((id, _)) => Err(EncodeError::UnknownField {
            ty: ty.name().to_owned(),
            id,
        }),
        None => Ok(()),
    }
}

type FieldWriter =
    Box<dyn for<'a> Fn(&Root, &'a Message, &mut Writer<'a>) -> EncodeResult<()> + Send + Sync>;

fn field_writer<F>(f: F) -> FieldWriter
where
    F: for<'a> Fn(&Root, &'a Message, &mut Writer<'a>) -> EncodeResult<()> + Send + Sync + 'static,
{
    Box::new(f)
}

fn link<F>(f: F) -> EncodeFn
where
    F: for<'a> Fn(&Root, &'a Message, &mut Writer<'a>) -> EncodeResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Encoder bound to one message type
pub struct Encoder<'r> {
    root: &'r Root,
    ty: &'r Type,
}

impl<'r> Encoder<'r> {
    pub fn new(root: &'r Root, id: TypeId) -> Result<Self, DescriptorError> {
        Ok(Self {
            root,
            ty: root.type_of(id)?,
        })
    }

    /// Reflective encoding of `msg` into `w`.
    pub fn encode<'a>(&self, msg: &'a Message, w: &mut Writer<'a>) -> EncodeResult<()> {
        check_declared(self.ty, msg)?;
        for field in self.ty.fields() {
            let Some(value) = msg.get(field.id()) else {
                continue;
            };
            let id = field.id();
            let kind = field.kind()?;
            let path = format!("{}.{}", self.ty.name(), field.name());
            match field.shape()? {
                Shape::Map(key_ty) => {
                    let entries = value
                        .as_map()
                        .ok_or_else(|| mismatch(path.clone(), "map", value.kind_name()))?;
                    for (key, item) in entries {
                        write_entry(self.root, id, key_ty, kind, key, item, w)
                            .map_err(|f| f.at(&path))?;
                    }
                }
                Shape::Packed => {
                    let ops = kind_ops(kind).unwrap_or(&ENUM);
                    write_packed(ops, id, list_of(value, &path)?, w).map_err(|f| f.at(&path))?;
                }
                Shape::Repeated => {
                    for item in list_of(value, &path)? {
                        write_element(self.root, id, kind, item, w).map_err(|f| f.at(&path))?;
                    }
                }
                Shape::Singular => {
                    let write = matches!(kind, FieldKind::Message(_))
                        || field.is_required()
                        || field.has_explicit_presence()
                        || self.root.default_value(field).as_ref() != Some(value);
                    if write {
                        write_element(self.root, id, kind, value, w).map_err(|f| f.at(&path))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn plan(&self) -> Result<(Codegen, Vec<FieldWriter>), DescriptorError> {
        let mut gen = Codegen::new(["m", "w"]);
        let mut writers = Vec::with_capacity(self.ty.fields().len());
        for (ix, field) in self.ty.fields().iter().enumerate() {
            let id = field.id();
            let kind = field.kind()?;
            let path = format!("{}.{}", self.ty.name(), field.name());
            let writer = match (field.shape()?, kind) {
                (Shape::Map(key_ty), kind) => {
                    gen!(gen, "if (m.has({id})) {{");
                    gen!(gen, "for ((k, v) of m.get({id})) {{");
                    gen!(gen, "w.tag({id}, 2).fork()");
                    gen!(gen, "w.tag(1, {}).{}(k)", key_ty.wire_type().to_u8(), key_ty.name());
                    match kind_ops(kind) {
                        Some(ops) => gen!(gen, "w.tag(2, {}).{}(v)", ops.wire_type.to_u8(), ops.method),
                        None => gen!(gen, "types[{ix}].encode(v, w.tag(2, 2).fork()).ldelim()"),
                    };
                    gen!(gen, "w.ldelim()");
                    gen!(gen, "}}");
                    gen!(gen, "}}");
                    field_writer(move |root, msg, w| {
                        let Some(value) = msg.get(id) else {
                            return Ok(());
                        };
                        let entries = value
                            .as_map()
                            .ok_or_else(|| mismatch(path.clone(), "map", value.kind_name()))?;
                        for (key, item) in entries {
                            write_entry(root, id, key_ty, kind, key, item, w)
                                .map_err(|f| f.at(&path))?;
                        }
                        Ok(())
                    })
                }
                (Shape::Packed, kind) => {
                    let ops = kind_ops(kind).unwrap_or(&ENUM);
                    gen!(gen, "if (m.has({id})) {{");
                    gen!(gen, "w.tag({id}, 2).fork()");
                    gen!(gen, "for (v of m.get({id}))");
                    gen!(gen, "w.{}(v)", ops.method);
                    gen!(gen, "w.ldelim()");
                    gen!(gen, "}}");
                    field_writer(move |_, msg, w| match msg.get(id) {
                        Some(value) => {
                            write_packed(ops, id, list_of(value, &path)?, w).map_err(|f| f.at(&path))
                        }
                        None => Ok(()),
                    })
                }
                (Shape::Repeated, FieldKind::Message(sub)) => {
                    gen!(gen, "if (m.has({id})) {{");
                    gen!(gen, "for (v of m.get({id}))");
                    gen!(gen, "types[{ix}].encode(v, w.tag({id}, 2).fork()).ldelim()");
                    gen!(gen, "}}");
                    field_writer(move |root, msg, w| {
                        if let Some(value) = msg.get(id) {
                            for item in list_of(value, &path)? {
                                write_sub(root, id, sub, item, w).map_err(|f| f.at(&path))?;
                            }
                        }
                        Ok(())
                    })
                }
                (Shape::Repeated, kind) => {
                    let ops = kind_ops(kind).unwrap_or(&ENUM);
                    gen!(gen, "if (m.has({id})) {{");
                    gen!(gen, "for (v of m.get({id}))");
                    gen!(gen, "w.tag({id}, {}).{}(v)", ops.wire_type.to_u8(), ops.method);
                    gen!(gen, "}}");
                    field_writer(move |_, msg, w| {
                        if let Some(value) = msg.get(id) {
                            for item in list_of(value, &path)? {
                                write_scalar(ops, id, item, w).map_err(|f| f.at(&path))?;
                            }
                        }
                        Ok(())
                    })
                }
                (Shape::Singular, FieldKind::Message(sub)) => {
                    gen!(gen, "if (m.has({id}))");
                    gen!(gen, "types[{ix}].encode(m.get({id}), w.tag({id}, 2).fork()).ldelim()");
                    field_writer(move |root, msg, w| match msg.get(id) {
                        Some(value) => write_sub(root, id, sub, value, w).map_err(|f| f.at(&path)),
                        None => Ok(()),
                    })
                }
                (Shape::Singular, kind) => {
                    let ops = kind_ops(kind).unwrap_or(&ENUM);
                    let always = field.is_required() || field.has_explicit_presence();
                    let default = self.root.default_value(field);
                    match (&default, always) {
                        (Some(default), false) => {
                            gen!(gen, "if (m.has({id}) && m.get({id}) != {default:?})")
                        }
                        _ => gen!(gen, "if (m.has({id}))"),
                    };
                    gen!(gen, "w.tag({id}, {}).{}(m.get({id}))", ops.wire_type.to_u8(), ops.method);
                    field_writer(move |_, msg, w| match msg.get(id) {
                        Some(value) if always || default.as_ref() != Some(value) => {
                            write_scalar(ops, id, value, w).map_err(|f| f.at(&path))
                        }
                        _ => Ok(()),
                    })
                }
            };
            writers.push(writer);
        }
        gen!(gen, "return w");
        Ok((gen, writers))
    }

    /// Listing of the routine [`generate`](Encoder::generate) links.
    pub fn listing(&self) -> Result<String, DescriptorError> {
        let (gen, _) = self.plan()?;
        Ok(gen.str(&format!("{}$encode", self.ty.name())))
    }

    /// Builds the specialized encoding routine for this type.
    pub fn generate(&self) -> Result<EncodeFn, DescriptorError> {
        let (gen, writers) = self.plan()?;
        let name = self.ty.name().to_owned();
        let mut declared: Vec<u32> = self.ty.fields().iter().map(|f| f.id()).collect();
        declared.sort_unstable();
        Ok(gen.eof(
            &format!("{name}$encode"),
            (name, declared, writers),
            |(name, declared, writers)| {
                link(move |root, msg, w| {
                    if let Some((id, _)) = msg.iter().find(|(id, _)| declared.binary_search(id).is_err()) {
                        return Err(EncodeError::UnknownField { ty: name.clone(), id });
                    }
                    for write in writers.iter() {
                        write(root, msg, w)?;
                    }
                    Ok(())
                })
            },
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{Enum, Field};
    use crate::util::hex_of_bytes;

    fn root() -> (Root, TypeId) {
        let mut root = Root::new();
        let mut kind = Enum::new("Kind");
        kind.add_value("A", 0).unwrap().add_value("B", 1).unwrap();
        root.add_enum(kind).unwrap();
        let mut leaf = Type::new("Leaf");
        leaf.add_field(Field::new("n", 1, "int32")).unwrap();
        root.add_type(leaf).unwrap();
        let mut t = Type::new("T");
        t.add_field(Field::new("a", 1, "int32")).unwrap()
            .add_field(Field::new("s", 2, "string")).unwrap()
            .add_field(Field::new("packed", 3, "sint32").repeated().packed(true)).unwrap()
            .add_field(Field::new("loose", 4, "uint32").repeated()).unwrap()
            .add_field(Field::new("leaf", 5, "Leaf")).unwrap()
            .add_field(Field::new("kinds", 6, "Kind").repeated()).unwrap()
            .add_field(Field::new("byname", 7, "int32").map(ScalarType::String)).unwrap()
            .add_field(Field::new("req", 8, "bool").required()).unwrap();
        let id = root.add_type(t).unwrap();
        root.resolve();
        (root, id)
    }

    fn both(root: &Root, id: TypeId, msg: &Message) -> String {
        let enc = Encoder::new(root, id).unwrap();
        let mut w = Writer::new();
        enc.encode(msg, &mut w).unwrap();
        let reflective = hex_of_bytes(w.finish());
        let compiled = enc.generate().unwrap();
        let mut w = Writer::new();
        compiled(root, msg, &mut w).unwrap();
        assert_eq!(reflective, hex_of_bytes(w.finish()));
        reflective
    }

    #[test]
    fn defaults_are_omitted() {
        let (root, id) = root();
        let msg = Message::new().with(1, 0).with(2, "");
        assert_eq!(both(&root, id, &msg), "");
        let msg = Message::new().with(1, 150).with(8, false);
        assert_eq!(both(&root, id, &msg), "0896014000");
    }

    #[test]
    fn repeated_layouts() {
        let (root, id) = root();
        let list = |v: Vec<Value>| Value::List(v);
        let msg = Message::new()
            .with(3, list(vec![Value::I32(-1), Value::I32(1)]))
            .with(4, list(vec![Value::U32(1), Value::U32(2)]))
            .with(6, list(vec![Value::Enum(1)]));
        assert_eq!(both(&root, id, &msg), "1a020102200120023001");
    }

    #[test]
    fn nested_and_map() {
        let (root, id) = root();
        let mut map = std::collections::BTreeMap::new();
        map.insert(MapKey::from("a"), Value::I32(1));
        let msg = Message::new()
            .with(5, Message::new().with(1, 3))
            .with(7, Value::Map(map));
        assert_eq!(both(&root, id, &msg), "2a0208033a050a01611001");
    }

    #[test]
    fn contract_violations() {
        let (root, id) = root();
        let enc = Encoder::new(&root, id).unwrap();
        let compiled = enc.generate().unwrap();

        let msg = Message::new().with(99, 1);
        let mut w = Writer::new();
        assert!(matches!(enc.encode(&msg, &mut w), Err(EncodeError::UnknownField { id: 99, .. })));
        let mut w = Writer::new();
        assert!(matches!(compiled(&root, &msg, &mut w), Err(EncodeError::UnknownField { id: 99, .. })));

        let msg = Message::new().with(1, "nope");
        let mut w = Writer::new();
        let err = enc.encode(&msg, &mut w).unwrap_err();
        assert_eq!(
            err,
            EncodeError::KindMismatch { field: "T.a".into(), expected: "int32", found: "string" }
        );
        let mut w = Writer::new();
        assert_eq!(compiled(&root, &msg, &mut w).unwrap_err(), err);
    }

    #[test]
    fn failed_fields_close_their_forks() {
        let (root, id) = root();
        let enc = Encoder::new(&root, id).unwrap();
        let compiled = enc.generate().unwrap();
        let mut byname = std::collections::BTreeMap::new();
        byname.insert(MapKey::from("k"), Value::from("x"));
        let bad = [
            Message::new().with(3, vec![Value::I32(1), Value::from("x")]),
            Message::new().with(7, Value::Map(byname)),
            Message::new().with(5, Message::new().with(1, true)),
        ];
        for msg in &bad {
            let mut w = Writer::new();
            assert!(enc.encode(msg, &mut w).is_err());
            assert_eq!(w.depth(), 0);
            let mut w = Writer::new();
            assert!(compiled(&root, msg, &mut w).is_err());
            assert_eq!(w.depth(), 0);
        }
    }

    #[test]
    fn listing_shape() {
        let (root, id) = root();
        let listing = Encoder::new(&root, id).unwrap().listing().unwrap();
        assert!(listing.starts_with("fn T_encode(m, w) {\n"));
        assert!(listing.contains("\tif (m.has(1) && m.get(1) != I32(0))\n\t\tw.tag(1, 0).int32(m.get(1))\n"));
        assert!(listing.contains("\tif (m.has(8))\n\t\tw.tag(8, 0).bool(m.get(8))\n"));
        assert!(listing.ends_with("\treturn w\n}"));
    }
}

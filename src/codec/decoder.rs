//! Decoder synthesis
//!
//! Decoding reads tags until the end offset of the message and dispatches on
//! the field id. Ids the type does not declare are skipped by wire type.
//! Repeated fields of a packable kind accept both the packed and the
//! unpacked layout, whichever the field was declared with. Repeated
//! occurrences of a singular message field are merged, and map entries
//! accumulate into the field's map.
//!
//! The specialized routine replaces the field lookup with a table indexed by
//! field id (or a hash map, for types with sparse ids), each entry holding a
//! reader closure pre-selected for the field's shape and kind.

use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::wire::{
    decode_nested, expect_wire, kind_ops, list_mut, map_mut, merge_message, read_entry,
    read_packed, skip_unknown, WireOps, ENUM,
};
use crate::codec::DecodeFn;
use crate::codegen::Codegen;
use crate::error::{DecodeResult, DescriptorError};
use crate::gen;
use crate::parse::{Reader, Tag, WireType};
use crate::schema::{Field, FieldKind, Root, ScalarType, Shape, Type, TypeId};
use crate::value::{Message, Value};

fn read_singular(
    root: &Root,
    id: u32,
    kind: FieldKind,
    tag: Tag,
    r: &mut Reader<'_>,
    msg: &mut Message,
) -> DecodeResult<()> {
    match kind {
        FieldKind::Message(sub) => {
            expect_wire(tag, WireType::LengthDelimited)?;
            merge_message(root, sub, id, r, msg)
        }
        _ => read_scalar(kind_ops(kind).unwrap_or(&ENUM), id, tag, r, msg),
    }
}

fn read_scalar(
    ops: &WireOps,
    id: u32,
    tag: Tag,
    r: &mut Reader<'_>,
    msg: &mut Message,
) -> DecodeResult<()> {
    expect_wire(tag, ops.wire_type)?;
    msg.set(id, (ops.read)(r)?);
    Ok(())
}

fn read_sub_element(
    root: &Root,
    sub: TypeId,
    id: u32,
    tag: Tag,
    r: &mut Reader<'_>,
    msg: &mut Message,
) -> DecodeResult<()> {
    expect_wire(tag, WireType::LengthDelimited)?;
    let mut item = Message::new();
    decode_nested(root, sub, r, &mut item)?;
    list_mut(msg, id).push(Value::Message(item));
    Ok(())
}

fn read_scalar_element(
    ops: &WireOps,
    id: u32,
    tag: Tag,
    r: &mut Reader<'_>,
    msg: &mut Message,
) -> DecodeResult<()> {
    if tag.wire_type == WireType::LengthDelimited && ops.wire_type != WireType::LengthDelimited {
        return read_packed(ops, r, list_mut(msg, id));
    }
    expect_wire(tag, ops.wire_type)?;
    let item = (ops.read)(r)?;
    list_mut(msg, id).push(item);
    Ok(())
}

fn read_map_entry(
    root: &Root,
    id: u32,
    key_ty: ScalarType,
    kind: FieldKind,
    tag: Tag,
    r: &mut Reader<'_>,
    msg: &mut Message,
) -> DecodeResult<()> {
    expect_wire(tag, WireType::LengthDelimited)?;
    let (key, value) = read_entry(root, key_ty, kind, r)?;
    map_mut(msg, id).insert(key, value);
    Ok(())
}

fn read_field(
    root: &Root,
    field: &Field,
    tag: Tag,
    r: &mut Reader<'_>,
    msg: &mut Message,
) -> DecodeResult<()> {
    let id = field.id();
    let kind = field.kind()?;
    match (field.shape()?, kind) {
        (Shape::Map(key_ty), _) => read_map_entry(root, id, key_ty, kind, tag, r, msg),
        (Shape::Packed | Shape::Repeated, FieldKind::Message(sub)) => {
            read_sub_element(root, sub, id, tag, r, msg)
        }
        (Shape::Packed | Shape::Repeated, _) => {
            read_scalar_element(kind_ops(kind).unwrap_or(&ENUM), id, tag, r, msg)
        }
        (Shape::Singular, _) => read_singular(root, id, kind, tag, r, msg),
    }
}

type FieldReader =
    Box<dyn Fn(&Root, Tag, &mut Reader<'_>, &mut Message) -> DecodeResult<()> + Send + Sync>;

fn field_reader<F>(f: F) -> FieldReader
where
    F: Fn(&Root, Tag, &mut Reader<'_>, &mut Message) -> DecodeResult<()> + Send + Sync + 'static,
{
    Box::new(f)
}

fn link<F>(f: F) -> DecodeFn
where
    F: Fn(&Root, &mut Reader<'_>, usize, &mut Message) -> DecodeResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Field id to reader index
enum Dispatch {
    Dense(Vec<Option<usize>>),
    Sparse(HashMap<u32, usize>),
}

impl Dispatch {
    fn new(fields: &[Field]) -> Self {
        let max = fields.iter().map(|f| f.id() as usize).max().unwrap_or(0);
        if max <= fields.len() * 4 + 16 {
            let mut table = vec![None; max + 1];
            for (ix, field) in fields.iter().enumerate() {
                table[field.id() as usize] = Some(ix);
            }
            Dispatch::Dense(table)
        } else {
            Dispatch::Sparse(fields.iter().enumerate().map(|(ix, f)| (f.id(), ix)).collect())
        }
    }

    #[inline]
    fn get(&self, id: u32) -> Option<usize> {
        match self {
            Dispatch::Dense(table) => table.get(id as usize).copied().flatten(),
            Dispatch::Sparse(map) => map.get(&id).copied(),
        }
    }
}

/// Decoder bound to one message type
pub struct Decoder<'r> {
    root: &'r Root,
    ty: &'r Type,
}

impl<'r> Decoder<'r> {
    pub fn new(root: &'r Root, id: TypeId) -> Result<Self, DescriptorError> {
        Ok(Self {
            root,
            ty: root.type_of(id)?,
        })
    }

    /// Reflective decoding of the fields between the cursor and `end`,
    /// merged into `msg`.
    pub fn decode(&self, r: &mut Reader<'_>, end: usize, msg: &mut Message) -> DecodeResult<()> {
        while r.pos() < end {
            let tag = r.tag()?;
            match self.ty.field_by_id(tag.id) {
                Some(field) => read_field(self.root, field, tag, r, msg)?,
                None => skip_unknown(r, tag)?,
            }
        }
        Ok(())
    }

    fn plan(&self) -> Result<(Codegen, Vec<FieldReader>), DescriptorError> {
        let mut gen = Codegen::new(["r", "end", "m"]);
        gen!(gen, "while (r.pos < end) {{");
        gen!(gen, "t = r.tag()");
        gen!(gen, "switch (t.id) {{");
        let mut readers = Vec::with_capacity(self.ty.fields().len());
        for (ix, field) in self.ty.fields().iter().enumerate() {
            let id = field.id();
            let kind = field.kind()?;
            gen!(gen, "case {id}:");
            let reader = match (field.shape()?, kind) {
                (Shape::Map(key_ty), kind) => {
                    match kind_ops(kind) {
                        Some(ops) => gen!(gen, "m.map({id}).insert(r.entry({}, {}))", key_ty.name(), ops.method),
                        None => gen!(gen, "m.map({id}).insert(r.entry({}, types[{ix}]))", key_ty.name()),
                    };
                    field_reader(move |root, tag, r, msg| {
                        read_map_entry(root, id, key_ty, kind, tag, r, msg)
                    })
                }
                (Shape::Packed | Shape::Repeated, FieldKind::Message(sub)) => {
                    gen!(gen, "m.list({id}).push(types[{ix}].decode(r, r.uint32()))");
                    field_reader(move |root, tag, r, msg| read_sub_element(root, sub, id, tag, r, msg))
                }
                (Shape::Packed | Shape::Repeated, kind) => {
                    let ops = kind_ops(kind).unwrap_or(&ENUM);
                    if ops.wire_type != WireType::LengthDelimited {
                        gen!(gen, "if (t.wire == 2)");
                        gen!(gen, "r.packed(m.list({id}), r.{})", ops.method);
                        gen!(gen, "else");
                    }
                    gen!(gen, "m.list({id}).push(r.{}())", ops.method);
                    field_reader(move |_, tag, r, msg| read_scalar_element(ops, id, tag, r, msg))
                }
                (Shape::Singular, FieldKind::Message(sub)) => {
                    gen!(gen, "m.merge({id}, types[{ix}].decode(r, r.uint32()))");
                    field_reader(move |root, tag, r, msg| {
                        expect_wire(tag, WireType::LengthDelimited)?;
                        merge_message(root, sub, id, r, msg)
                    })
                }
                (Shape::Singular, kind) => {
                    let ops = kind_ops(kind).unwrap_or(&ENUM);
                    gen!(gen, "m.set({id}, r.{}())", ops.method);
                    field_reader(move |_, tag, r, msg| read_scalar(ops, id, tag, r, msg))
                }
            };
            gen!(gen, "break");
            readers.push(reader);
        }
        gen!(gen, "default:");
        gen!(gen, "r.skipType(t.wire)");
        gen!(gen, "break");
        gen!(gen, "}}");
        gen!(gen, "}}");
        gen!(gen, "return m");
        Ok((gen, readers))
    }

    /// Listing of the routine [`generate`](Decoder::generate) links.
    pub fn listing(&self) -> Result<String, DescriptorError> {
        let (gen, _) = self.plan()?;
        Ok(gen.str(&format!("{}$decode", self.ty.name())))
    }

    /// Builds the specialized decoding routine for this type.
    pub fn generate(&self) -> Result<DecodeFn, DescriptorError> {
        let (gen, readers) = self.plan()?;
        let dispatch = Dispatch::new(self.ty.fields());
        Ok(gen.eof(
            &format!("{}$decode", self.ty.name()),
            (dispatch, readers),
            |(dispatch, readers)| {
                link(move |root, r, end, msg| {
                    while r.pos() < end {
                        let tag = r.tag()?;
                        match dispatch.get(tag.id) {
                            Some(ix) => readers[ix](root, tag, r, msg)?,
                            None => skip_unknown(r, tag)?,
                        }
                    }
                    Ok(())
                })
            },
        ))
    }
}

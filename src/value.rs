//! Runtime message values
//!
//! A [`Message`] is a table of [`Value`]s keyed by field id. Its shape is
//! only given meaning by the [`Type`](crate::schema::Type) it is encoded,
//! decoded or verified against; the table itself holds no reference to a
//! descriptor.
//!
//! Map fields hold a `BTreeMap<MapKey, Value>`. Keys of 64-bit integer types
//! are stored as a [`HashKey`] and turned back into a number, with the
//! signedness of the field's declared key type, when encoded.

use std::collections::BTreeMap;

#[cfg(feature = "serde_impls")]
use serde::{Deserialize, Serialize};

use crate::schema::{FieldKind, Root, ScalarType, Shape, Type, TypeId};
use crate::wide::{HashKey, WideInt};

/// A single field value
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde_impls", derive(Serialize, Deserialize))]
pub enum Value {
    Bool(bool),
    /// `int32`, `sint32` and `sfixed32`
    I32(i32),
    /// `uint32` and `fixed32`
    U32(u32),
    /// `int64`, `sint64` and `sfixed64`
    I64(i64),
    /// `uint64` and `fixed64`
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Numeric value of an enum-typed field
    Enum(i32),
    Message(Message),
    /// Elements of a repeated field
    List(Vec<Value>),
    /// Entries of a map field
    Map(BTreeMap<MapKey, Value>),
}

impl Value {
    /// Short name of the shape of this value, for diagnostics
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "int32",
            Value::U32(_) => "uint32",
            Value::I64(_) => "int64",
            Value::U64(_) => "uint64",
            Value::F32(_) => "float",
            Value::F64(_) => "double",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::Message(_) => "message",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    #[must_use]
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<MapKey, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Message> for Value {
    fn from(v: Message) -> Self {
        Value::Message(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// Key of a map entry
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde_impls", derive(Serialize, Deserialize))]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    U32(u32),
    /// Any 64-bit integer key, by bit-pattern
    Long(HashKey),
    Str(String),
}

impl MapKey {
    #[must_use]
    pub fn from_i64(v: i64) -> Self {
        MapKey::Long(WideInt::from(v).to_hash_key())
    }

    #[must_use]
    pub fn from_u64(v: u64) -> Self {
        MapKey::Long(WideInt::from(v).to_hash_key())
    }

    /// Converts a scalar value read from the wire into a key.
    ///
    /// Returns `None` for values that cannot key a map.
    #[must_use]
    pub fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Bool(b) => Some(MapKey::Bool(b)),
            Value::I32(n) => Some(MapKey::I32(n)),
            Value::U32(n) => Some(MapKey::U32(n)),
            Value::I64(n) => Some(MapKey::from_i64(n)),
            Value::U64(n) => Some(MapKey::from_u64(n)),
            Value::Str(s) => Some(MapKey::Str(s)),
            _ => None,
        }
    }

    /// The key used for an entry whose key was not on the wire
    #[must_use]
    pub fn zero(ty: ScalarType) -> Self {
        if ty.is_long() {
            return MapKey::Long(WideInt::ZERO.to_hash_key());
        }
        MapKey::from_value(ty.zero()).unwrap_or(MapKey::Bool(false))
    }
}

impl From<&str> for MapKey {
    fn from(v: &str) -> Self {
        MapKey::Str(v.to_owned())
    }
}

impl From<i32> for MapKey {
    fn from(v: i32) -> Self {
        MapKey::I32(v)
    }
}

impl From<u32> for MapKey {
    fn from(v: u32) -> Self {
        MapKey::U32(v)
    }
}

impl From<bool> for MapKey {
    fn from(v: bool) -> Self {
        MapKey::Bool(v)
    }
}

/// Field table of a single message, keyed by field id
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde_impls", derive(Serialize, Deserialize))]
pub struct Message {
    fields: BTreeMap<u32, Value>,
}

impl Message {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`set`](Message::set).
    #[must_use]
    pub fn with(mut self, id: u32, value: impl Into<Value>) -> Self {
        self.set(id, value);
        self
    }

    /// Sets the value of field `id`, returning the previous value.
    pub fn set(&mut self, id: u32, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(id, value.into())
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&Value> {
        self.fields.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Value> {
        self.fields.get_mut(&id)
    }

    /// Returns the value of field `id`, inserting the result of `init` first
    /// if the field is absent.
    pub fn get_or_insert_with(&mut self, id: u32, init: impl FnOnce() -> Value) -> &mut Value {
        self.fields.entry(id).or_insert_with(init)
    }

    pub fn remove(&mut self, id: u32) -> Option<Value> {
        self.fields.remove(&id)
    }

    #[must_use]
    pub fn has(&self, id: u32) -> bool {
        self.fields.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over present fields in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Value)> + '_ {
        self.fields.iter().map(|(id, v)| (*id, v))
    }

    pub fn clear(&mut self) {
        self.fields.clear()
    }

    /// Default-aware equality against `other` under message type `ty`.
    ///
    /// A singular scalar or enum field that is absent compares equal to the
    /// same field holding its default value; an absent repeated or map field
    /// compares equal to an empty one. Nested messages are compared the same
    /// way. Ids not declared by `ty` must match exactly.
    #[must_use]
    pub fn equivalent(&self, root: &Root, ty: TypeId, other: &Message) -> bool {
        let Some(desc) = root.get(ty) else {
            return false;
        };
        for field in desc.fields() {
            let (a, b) = (self.get(field.id()), other.get(field.id()));
            let (Ok(kind), Ok(shape)) = (field.kind(), field.shape()) else {
                return a == b;
            };
            let same = match shape {
                Shape::Singular => match kind {
                    FieldKind::Message(sub) => match (a, b) {
                        (Some(Value::Message(x)), Some(Value::Message(y))) => {
                            x.equivalent(root, sub, y)
                        }
                        _ => a == b,
                    },
                    _ => {
                        let default = root.default_value(field);
                        a.or(default.as_ref()) == b.or(default.as_ref())
                    }
                },
                Shape::Repeated | Shape::Packed => {
                    let (x, y) = (
                        a.and_then(Value::as_list).unwrap_or(&[]),
                        b.and_then(Value::as_list).unwrap_or(&[]),
                    );
                    x.len() == y.len()
                        && x
                            .iter()
                            .zip(y)
                            .all(|(x, y)| elements_equivalent(root, kind, x, y))
                }
                Shape::Map(_) => {
                    let empty = BTreeMap::new();
                    let (x, y) = (
                        a.and_then(Value::as_map).unwrap_or(&empty),
                        b.and_then(Value::as_map).unwrap_or(&empty),
                    );
                    x.len() == y.len()
                        && x.iter().zip(y).all(|((kx, vx), (ky, vy))| {
                            kx == ky && elements_equivalent(root, kind, vx, vy)
                        })
                }
            };
            if !same {
                return false;
            }
        }
        undeclared(desc, self).eq(undeclared(desc, other))
    }
}

fn undeclared<'m>(
    desc: &'m Type,
    m: &'m Message,
) -> impl Iterator<Item = (u32, &'m Value)> + 'm {
    m.iter().filter(move |(id, _)| desc.field_by_id(*id).is_none())
}

fn elements_equivalent(root: &Root, kind: FieldKind, x: &Value, y: &Value) -> bool {
    match (kind, x, y) {
        (FieldKind::Message(sub), Value::Message(x), Value::Message(y)) => {
            x.equivalent(root, sub, y)
        }
        _ => x == y,
    }
}

impl FromIterator<(u32, Value)> for Message {
    fn from_iter<T: IntoIterator<Item = (u32, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

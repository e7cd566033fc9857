//! Scalar field types

use std::fmt::Display;

#[cfg(feature = "serde_impls")]
use serde::{Deserialize, Serialize};

use crate::parse::WireType;
use crate::value::Value;

/// The fixed set of scalar field types
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde_impls", derive(Serialize, Deserialize))]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Uint32,
    Sint32,
    Fixed32,
    Sfixed32,
    Int64,
    Uint64,
    Sint64,
    Fixed64,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    pub const ALL: [ScalarType; 15] = [
        ScalarType::Double,
        ScalarType::Float,
        ScalarType::Int32,
        ScalarType::Uint32,
        ScalarType::Sint32,
        ScalarType::Fixed32,
        ScalarType::Sfixed32,
        ScalarType::Int64,
        ScalarType::Uint64,
        ScalarType::Sint64,
        ScalarType::Fixed64,
        ScalarType::Sfixed64,
        ScalarType::Bool,
        ScalarType::String,
        ScalarType::Bytes,
    ];

    /// Name of this type as written in a schema
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Uint32 => "uint32",
            ScalarType::Sint32 => "sint32",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }

    /// Looks up a scalar type by its schema name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Wire type of a single, unpacked value of this type
    #[must_use]
    pub const fn wire_type(self) -> WireType {
        match self {
            ScalarType::Double | ScalarType::Fixed64 | ScalarType::Sfixed64 => WireType::Bit64,
            ScalarType::Float | ScalarType::Fixed32 | ScalarType::Sfixed32 => WireType::Bit32,
            ScalarType::String | ScalarType::Bytes => WireType::LengthDelimited,
            _ => WireType::Varint,
        }
    }

    /// Whether repeated values of this type may be written as one packed run
    #[must_use]
    pub const fn is_packable(self) -> bool {
        !matches!(self, ScalarType::String | ScalarType::Bytes)
    }

    /// Whether this type may be used as the key of a map field
    #[must_use]
    pub const fn is_map_key(self) -> bool {
        !matches!(
            self,
            ScalarType::Float | ScalarType::Double | ScalarType::Bytes
        )
    }

    /// Whether values of this type are 64-bit integers
    #[must_use]
    pub const fn is_long(self) -> bool {
        matches!(
            self,
            ScalarType::Int64
                | ScalarType::Uint64
                | ScalarType::Sint64
                | ScalarType::Fixed64
                | ScalarType::Sfixed64
        )
    }

    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarType::Int32
                | ScalarType::Sint32
                | ScalarType::Sfixed32
                | ScalarType::Int64
                | ScalarType::Sint64
                | ScalarType::Sfixed64
        )
    }

    /// The zero value of this type, used when no default is declared
    #[must_use]
    pub fn zero(self) -> Value {
        match self {
            ScalarType::Double => Value::F64(0.0),
            ScalarType::Float => Value::F32(0.0),
            ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => Value::I32(0),
            ScalarType::Uint32 | ScalarType::Fixed32 => Value::U32(0),
            ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => Value::I64(0),
            ScalarType::Uint64 | ScalarType::Fixed64 => Value::U64(0),
            ScalarType::Bool => Value::Bool(false),
            ScalarType::String => Value::Str(String::new()),
            ScalarType::Bytes => Value::Bytes(Vec::new()),
        }
    }
}

impl Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

//! Field descriptors

use crate::error::DescriptorError;
use crate::schema::{EnumId, ScalarType, TypeId};
use crate::value::Value;

/// Largest legal field id, `2^29 - 1`
pub const MAX_FIELD_ID: u32 = 536_870_911;

/// Cardinality rule of a field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Rule {
    #[default]
    Optional,
    Required,
    Repeated,
}

/// Declared type of a field, before resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ScalarType),
    /// Reference to a message or enum by (possibly relative) name
    Named(String),
}

/// Target of a named reference once bound by [`Root::resolve`](crate::schema::Root::resolve)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved {
    Message(TypeId),
    Enum(EnumId),
}

/// Element type of a resolved field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarType),
    Enum(EnumId),
    Message(TypeId),
}

impl FieldKind {
    /// Whether repeated elements of this kind may be written packed
    #[must_use]
    pub const fn is_packable(self) -> bool {
        match self {
            FieldKind::Scalar(ty) => ty.is_packable(),
            FieldKind::Enum(_) => true,
            FieldKind::Message(_) => false,
        }
    }
}

/// How the values of a field are laid out on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// At most one value
    Singular,
    /// One key per element
    Repeated,
    /// All elements in one length-delimited run
    Packed,
    /// One `{1: key, 2: value}` entry per element, keyed by the given type
    Map(ScalarType),
}

/// A single field of a message type
///
/// ```
/// # use protium::schema::{Field, ScalarType};
/// let tags = Field::new("tags", 4, "sint32").repeated().packed(true);
/// let index = Field::new("index", 5, "pkg.Entry").map(ScalarType::String);
/// assert!(tags.is_packed());
/// assert!(index.is_map());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    name: String,
    id: u32,
    ty: FieldType,
    rule: Rule,
    key: Option<ScalarType>,
    packed: bool,
    default: Option<Value>,
    explicit_presence: bool,
    resolved: Option<Resolved>,
}

impl Field {
    /// Declares field `name` with the given id and type name. Names that are
    /// not scalar type names are treated as references to be resolved.
    pub fn new(name: impl Into<String>, id: u32, type_name: &str) -> Self {
        let ty = match ScalarType::from_name(type_name) {
            Some(scalar) => FieldType::Scalar(scalar),
            None => FieldType::Named(type_name.to_owned()),
        };
        Self {
            name: name.into(),
            id,
            ty,
            rule: Rule::Optional,
            key: None,
            packed: false,
            default: None,
            explicit_presence: false,
            resolved: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.rule = Rule::Required;
        self
    }

    #[must_use]
    pub fn repeated(mut self) -> Self {
        self.rule = Rule::Repeated;
        self
    }

    /// Requests packed encoding. Only takes effect on repeated fields of a
    /// packable element type.
    #[must_use]
    pub fn packed(mut self, packed: bool) -> Self {
        self.packed = packed;
        self
    }

    /// Turns this field into a map keyed by `key`, with the declared type as
    /// the value type.
    #[must_use]
    pub fn map(mut self, key: ScalarType) -> Self {
        self.key = Some(key);
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Writes the field whenever it is present, even when it holds its
    /// default value.
    #[must_use]
    pub fn explicit_presence(mut self) -> Self {
        self.explicit_presence = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }

    #[must_use]
    pub fn rule(&self) -> Rule {
        self.rule
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.rule == Rule::Required
    }

    #[must_use]
    pub fn is_repeated(&self) -> bool {
        self.rule == Rule::Repeated
    }

    #[must_use]
    pub fn is_map(&self) -> bool {
        self.key.is_some()
    }

    #[must_use]
    pub fn key_type(&self) -> Option<ScalarType> {
        self.key
    }

    #[must_use]
    pub fn is_packed(&self) -> bool {
        self.packed
    }

    #[must_use]
    pub fn has_explicit_presence(&self) -> bool {
        self.explicit_presence
    }

    /// Declared default, if any
    #[must_use]
    pub fn declared_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    #[must_use]
    pub fn resolved(&self) -> Option<Resolved> {
        self.resolved
    }

    /// Name of the referenced type while it is still unbound
    #[must_use]
    pub fn pending_reference(&self) -> Option<&str> {
        match (&self.ty, self.resolved) {
            (FieldType::Named(name), None) => Some(name),
            _ => None,
        }
    }

    pub(crate) fn bind(&mut self, target: Resolved) -> bool {
        let changed = self.resolved != Some(target);
        self.resolved = Some(target);
        changed
    }

    /// Element type of this field.
    ///
    /// Fails with [`DescriptorError::Unresolved`] for references that have
    /// not been bound yet.
    pub fn kind(&self) -> Result<FieldKind, DescriptorError> {
        match (&self.ty, self.resolved) {
            (FieldType::Scalar(ty), _) => Ok(FieldKind::Scalar(*ty)),
            (FieldType::Named(_), Some(Resolved::Message(id))) => Ok(FieldKind::Message(id)),
            (FieldType::Named(_), Some(Resolved::Enum(id))) => Ok(FieldKind::Enum(id)),
            (FieldType::Named(reference), None) => Err(DescriptorError::Unresolved {
                field: self.name.clone(),
                reference: reference.clone(),
            }),
        }
    }

    /// Wire layout of this field.
    pub fn shape(&self) -> Result<Shape, DescriptorError> {
        let kind = self.kind()?;
        Ok(match self.key {
            Some(key) => Shape::Map(key),
            None if self.is_repeated() && self.packed && kind.is_packable() => Shape::Packed,
            None if self.is_repeated() => Shape::Repeated,
            None => Shape::Singular,
        })
    }
}

//! General error types
//!
//! This module contains the error types returned by the descriptor arena and
//! by the three codec entry points. Low-level failures of the
//! [`Reader`](crate::parse::Reader) have their own hierarchy in
//! [`parse::error`](crate::parse::error) and are wrapped by [`DecodeError`].
//!
//! The classes follow the taxonomy the engine is built around:
//!   * malformed input is a [`ParseError`], surfaced through [`DecodeError`]
//!   * contract violations by the caller are [`EncodeError`] or [`DescriptorError`]
//!   * semantic invalidity of a well-formed value is a [`VerifyError`]

use std::error::Error;
use std::fmt::{Debug, Display};

use crate::parse::error::ParseError;
use crate::schema::ScalarType;

/// Error type representing all possible conditions for invalidity
/// encountered when attempting to parse a string-type as a series
/// of hex-encoded bytes.
#[derive(Clone, PartialEq, Eq, Ord, PartialOrd)]
pub enum HexConvError {
    /// Error case for odd-length strings
    OddParity(String),
    /// Error case for strings containing non-hex characters,
    /// i.e. anything not in `[0-9a-fA-F]`.
    NonHex(String),
}

impl Debug for HexConvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OddParity(invalid) => {
                write!(f, "non-even length-parity for string `{}`", invalid)
            }
            Self::NonHex(invalid) => write!(f, "non-hex character found in string `{}`", invalid),
        }
    }
}

impl Display for HexConvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OddParity(_) => {
                write!(f, "hex-conversion failed on odd-length string")
            }
            Self::NonHex(_) => {
                write!(f, "hex-conversion failed on non-hex character")
            }
        }
    }
}

impl Error for HexConvError {}

/// Errors raised while assembling or resolving type descriptors
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescriptorError {
    /// Field ids must lie in `1..=536870911`
    InvalidFieldId { ty: String, field: String, id: u32 },
    /// Two fields of the same type share an id
    DuplicateFieldId { ty: String, id: u32 },
    /// Two fields of a type, or two types/enums of a root, share a name
    DuplicateName { scope: String, name: String },
    /// Map keys are restricted to integral, boolean and string scalars
    InvalidMapKey { field: String, key: ScalarType },
    /// A named type reference has not (yet) been bound by `Root::resolve`
    Unresolved { field: String, reference: String },
    /// A type handle that does not belong to the root it was used with
    UnknownType(usize),
}

impl Display for DescriptorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptorError::InvalidFieldId { ty, field, id } => {
                write!(f, "field {ty}.{field} has illegal id {id}")
            }
            DescriptorError::DuplicateFieldId { ty, id } => {
                write!(f, "type {ty} declares field id {id} more than once")
            }
            DescriptorError::DuplicateName { scope, name } => {
                write!(f, "duplicate name `{name}` in {scope}")
            }
            DescriptorError::InvalidMapKey { field, key } => {
                write!(f, "map field {field} cannot use {key} as key type")
            }
            DescriptorError::Unresolved { field, reference } => {
                write!(f, "field {field} refers to unresolved type `{reference}`")
            }
            DescriptorError::UnknownType(ix) => {
                write!(f, "type handle #{ix} does not belong to this root")
            }
        }
    }
}

impl Error for DescriptorError {}

/// Contract violations detected while encoding a message
#[derive(Clone, Debug, PartialEq)]
pub enum EncodeError {
    /// The message holds a value under an id its type does not declare
    UnknownField { ty: String, id: u32 },
    /// A field holds a value of a shape other than its declared type
    KindMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    Descriptor(DescriptorError),
}

impl From<DescriptorError> for EncodeError {
    fn from(err: DescriptorError) -> Self {
        Self::Descriptor(err)
    }
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::UnknownField { ty, id } => {
                write!(f, "message of type {ty} holds a value for undeclared field id {id}")
            }
            EncodeError::KindMismatch {
                field,
                expected,
                found,
            } => {
                write!(f, "field {field} expects {expected} but holds {found}")
            }
            EncodeError::Descriptor(err) => {
                write!(f, "cannot encode against descriptor: {err}")
            }
        }
    }
}

impl Error for EncodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EncodeError::Descriptor(err) => Some(err),
            _ => None,
        }
    }
}

pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

/// Failures of the decode entry points
#[derive(Debug)]
#[non_exhaustive]
pub enum DecodeError {
    /// The input was truncated or otherwise malformed
    Parse(ParseError),
    /// The descriptor could not drive decoding
    Descriptor(DescriptorError),
}

impl From<ParseError> for DecodeError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<DescriptorError> for DecodeError {
    fn from(err: DescriptorError) -> Self {
        Self::Descriptor(err)
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Parse(err) => {
                write!(f, "reader encountered error: {}", err)
            }
            DecodeError::Descriptor(err) => {
                write!(f, "cannot decode against descriptor: {}", err)
            }
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DecodeError::Parse(err) => Some(err),
            DecodeError::Descriptor(err) => Some(err),
        }
    }
}

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Classes of semantic invalidity reported by verification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyErrorKind {
    /// A required field holds no value
    MissingRequired,
    /// An enum-typed field holds a number outside the enum's value set
    UnknownEnumValue { value: i32, enum_name: String },
    /// The descriptor could not drive verification
    Descriptor(DescriptorError),
}

/// First violation found while verifying a message
///
/// The `Display` form is the human-readable reason, prefixed by the dotted
/// path of the offending field starting at the verified type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyError {
    path: String,
    kind: VerifyErrorKind,
}

impl VerifyError {
    pub(crate) fn new(path: impl Into<String>, kind: VerifyErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Prepends the name of the enclosing message field to the path.
    pub(crate) fn nested_in(mut self, ty: &str, field: &str) -> Self {
        self.path = if self.path.is_empty() {
            format!("{ty}.{field}")
        } else {
            format!("{ty}.{field}.{}", self.path)
        };
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn kind(&self) -> &VerifyErrorKind {
        &self.kind
    }
}

impl From<DescriptorError> for VerifyError {
    fn from(err: DescriptorError) -> Self {
        Self::new(String::new(), VerifyErrorKind::Descriptor(err))
    }
}

impl Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            VerifyErrorKind::MissingRequired => {
                write!(f, "{}: required field is missing", self.path)
            }
            VerifyErrorKind::UnknownEnumValue { value, enum_name } => {
                write!(f, "{}: {value} is not a value of enum {enum_name}", self.path)
            }
            VerifyErrorKind::Descriptor(err) => Display::fmt(err, f),
        }
    }
}

impl Error for VerifyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            VerifyErrorKind::Descriptor(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dummy<T: Send + Sync>() {}

    #[test]
    fn errors_threadsafe() {
        dummy::<DecodeError>();
        dummy::<EncodeError>();
        dummy::<VerifyError>();
    }

    #[test]
    fn verify_paths() {
        let err = VerifyError::new("Leaf.count", VerifyErrorKind::MissingRequired)
            .nested_in("Root", "leaf");
        assert_eq!(err.path(), "Root.leaf.Leaf.count");
        assert_eq!(err.to_string(), "Root.leaf.Leaf.count: required field is missing");
    }
}

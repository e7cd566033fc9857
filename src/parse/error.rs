//! Error types used to report failure in low-level parsing
//!
//! This module contains a hierarchy of types representing specific
//! classes of error that may arise as a result of calls to
//! [`Reader`](crate::parse::Reader) methods.
//!
//! # Layout
//!
//! This module defines the primary type `ParseError` and the alias
//! `ParseResult<T>`; it additionally defines various type-level refinements of
//! `ParseError`, grouped according to similar provenance or nature.

use std::error::Error;
use std::fmt::{Display, Formatter, Result};
use std::str::Utf8Error;

use crate::parse::WireType;
use crate::util::hex_of_bytes;

/// Enumeration type over all errors that may be encountered when reading
/// wire-format input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Error class encountered when a read would cross the end of the buffer
    /// or of an enclosing length-delimited region.
    Window(WindowError),
    /// Error class encountered when the binary-lexical contents of the buffer
    /// are invalid: illegal wire types, field id zero, over-long varints.
    Token(TokenError),
    /// Error class encountered when low-level parsing is successful but
    /// the raw value cannot be converted into the expected post-parse type.
    External(ExternalError),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            ParseError::Window(err) => Display::fmt(err, f),
            ParseError::Token(err) => Display::fmt(err, f),
            ParseError::External(err) => Display::fmt(err, f),
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseError::Window(err) => Some(err),
            ParseError::Token(err) => Some(err),
            ParseError::External(err) => Some(err),
        }
    }
}

/// Type alias for Result with an error type of [`ParseError`]
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Errors related to the bounds of the input and of nested regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowError {
    /// Error case when a read of some number of bytes would run past the
    /// end of the buffer. This is how truncated input is reported.
    ConsumeWouldExceedLimit {
        offset: usize,
        requested: usize,
        limit: usize,
    },
    /// Error case when a length prefix announces a region that would extend
    /// beyond the final byte in the buffer.
    OpenWouldExceedBuffer { bytes_left: usize, request: usize },
    /// Error case when a nested value ended past the end of the
    /// length-delimited region that was supposed to contain it.
    LimitOverrun { limit: usize, offset: usize },
}

impl From<WindowError> for ParseError {
    fn from(err: WindowError) -> Self {
        Self::Window(err)
    }
}

impl Display for WindowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match *self {
            WindowError::ConsumeWouldExceedLimit {
                limit,
                offset,
                requested,
            } => {
                write!(
                    f,
                    "cannot read {} bytes (currently at byte {} out of limit {})",
                    requested, offset, limit
                )
            }
            WindowError::OpenWouldExceedBuffer {
                bytes_left,
                request,
            } => {
                if bytes_left == 0 {
                    write!(
                        f,
                        "cannot open {}-byte region: buffer has been fully consumed",
                        request
                    )
                } else {
                    write!(
                        f,
                        "cannot open {}-byte region: buffer has only {} bytes remaining",
                        request, bytes_left
                    )
                }
            }
            WindowError::LimitOverrun { limit, offset } => {
                write!(
                    f,
                    "nested value ended at byte {} past its region limit {}",
                    offset, limit
                )
            }
        }
    }
}

impl Error for WindowError {}

/// Errors arising from unexpected tokens in the buffer
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenError {
    /// Low three bits of a tag do not name a supported wire type
    InvalidWireType(u8),
    /// Varint failed to terminate within 10 bytes
    NonTerminating(Vec<u8>),
    /// Tag carried field id zero
    InvalidFieldId(u32),
    /// A known field arrived with a wire type its declared type cannot accept
    UnexpectedWireType {
        id: u32,
        expected: WireType,
        actual: WireType,
    },
}

impl From<TokenError> for ParseError {
    fn from(tok_e: TokenError) -> Self {
        Self::Token(tok_e)
    }
}

impl Display for TokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::InvalidWireType(raw) => {
                write!(f, "invalid wire type {raw}")
            }
            Self::NonTerminating(buf) => {
                write!(f, "varint failed to terminate: {}", hex_of_bytes(buf))
            }
            Self::InvalidFieldId(id) => {
                write!(f, "invalid field id {id}")
            }
            Self::UnexpectedWireType {
                id,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "field {id} expects wire type {expected} but found {actual}"
                )
            }
        }
    }
}

impl Error for TokenError {}

/// Errors in converting successfully read raw values into their final types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalError {
    /// Error scenario in which a `string` payload was not valid UTF-8.
    UncoercableString(Utf8Error),
}

impl From<Utf8Error> for ExternalError {
    fn from(err: Utf8Error) -> Self {
        Self::UncoercableString(err)
    }
}

impl From<Utf8Error> for ParseError {
    fn from(err: Utf8Error) -> Self {
        Self::External(ExternalError::from(err))
    }
}

impl From<ExternalError> for ParseError {
    fn from(err: ExternalError) -> Self {
        Self::External(err)
    }
}

impl Display for ExternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ExternalError::UncoercableString(err) => {
                write!(f, "string field is not valid UTF-8: {}", err)
            }
        }
    }
}

impl Error for ExternalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExternalError::UncoercableString(err) => Some(err),
        }
    }
}

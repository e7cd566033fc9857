//! Type descriptors
//!
//! The codecs are driven entirely by descriptors: a [`Root`] arena of message
//! [`Type`]s (each an ordered list of [`Field`]s) and [`Enum`]s. How the
//! descriptors are produced is out of scope; they are usually built in code:
//!
//! ```
//! # use protium::schema::{Enum, Field, Root, ScalarType, Type};
//! let mut root = Root::new();
//! let mut kind = Enum::new("demo.Kind");
//! kind.add_value("PLAIN", 0)?.add_value("FANCY", 1)?;
//! root.add_enum(kind)?;
//!
//! let mut item = Type::new("demo.Item");
//! item.add_field(Field::new("name", 1, "string").required())?
//!     .add_field(Field::new("kind", 2, "Kind"))?
//!     .add_field(Field::new("attrs", 3, "int64").map(ScalarType::String))?;
//! let item = root.add_type(item)?;
//!
//! assert_eq!(root.resolve(), 0);
//! # let _ = item;
//! # Ok::<(), protium::error::DescriptorError>(())
//! ```

mod enums;
mod field;
mod message;
mod root;
mod scalar;

pub use enums::Enum;
pub use field::{Field, FieldKind, FieldType, Resolved, Rule, Shape, MAX_FIELD_ID};
pub use message::Type;
pub use root::{EnumId, Root, TypeId};
pub use scalar::ScalarType;

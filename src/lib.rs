//! Reflection-driven codecs for the protocol buffer wire format
//!
//! # Overview
//!
//! This library encodes, decodes and verifies protocol buffer messages whose
//! shape is only known at runtime. Message types are described by a
//! [`Root`](schema::Root) arena of descriptors, and message values by a
//! generic, id-keyed [`Message`] of [`Value`]s. No per-message Rust types
//! are generated; the descriptors alone drive every codec.
//!
//! The wire format itself is handled by two low-level components:
//!
//!   * [`Writer`] buffers a sequence of pending write operations, each with
//!     its byte length known as soon as it is queued. Nested messages are
//!     opened with [`Writer::fork`] and closed with [`Writer::ldelim`], which
//!     prefixes them with their length without measuring or copying them.
//!     [`Writer::finish`] then allocates the output exactly once.
//!   * [`Reader`] walks a borrowed buffer with a position cursor, bounding
//!     nested messages by absolute end offsets rather than by slicing.
//!
//! 64-bit varints are carried through both as a [`WideInt`] pair of 32-bit
//! halves, which also provides zig-zag coding and the fixed-width keys used
//! for 64-bit map keys.
//!
//! # Codecs
//!
//! For each message type, the [`codec`] module offers a reflective encoder,
//! decoder and verifier that walk the type's field list on every call, as
//! well as a specialized form of each, assembled once per type by
//! [`codegen`] from closures pre-selected for every field. The specialized
//! routines are built on first use and memoized in the type's descriptor;
//! both forms produce identical results.
//!
//! ```
//! use protium::schema::{Field, Root, ScalarType, Type};
//! use protium::Message;
//!
//! let mut root = Root::new();
//! let mut user = Type::new("demo.User");
//! user.add_field(Field::new("name", 1, "string").required()).unwrap()
//!     .add_field(Field::new("karma", 2, "sint64")).unwrap()
//!     .add_field(Field::new("labels", 3, "bool").map(ScalarType::String)).unwrap();
//! let user = root.add_type(user).unwrap();
//! root.resolve();
//!
//! let msg = Message::new().with(1, "ada").with(2, -3i64);
//! let bytes = protium::encode(&root, user, &msg).unwrap();
//! assert_eq!(protium::util::hex_of_bytes(&bytes), "0a036164611005");
//! assert_eq!(protium::decode(&root, user, &bytes).unwrap(), msg);
//! assert!(protium::verify(&root, user, &Message::new()).is_err());
//! ```
//!
//! # Features
//!
//!   * `codegen` (default): specialized routines. Without it every codec is
//!     reflective.
//!   * `serde_impls`: `Serialize`/`Deserialize` for values and scalar types.
//!   * `smallvec_framestack`: keeps the writer's fork stack inline.
//!   * `lossy_strings`: decode invalid UTF-8 lossily instead of failing.

pub mod codec;
pub mod codegen;
pub mod error;
mod internal;
pub mod parse;
pub mod schema;
pub mod target;
pub mod util;
pub mod value;
pub mod wide;
pub mod writer;

pub use crate::codec::{decode, encode, verify, Codec, CodecMode};
pub use crate::parse::{Reader, Tag, WireType};
pub use crate::schema::{Enum, Field, Root, ScalarType, Type, TypeId};
pub use crate::target::Target;
pub use crate::value::{MapKey, Message, Value};
pub use crate::wide::WideInt;
pub use crate::writer::Writer;

//! Verifier synthesis
//!
//! Verification checks that required fields are present, that enum fields
//! (and enum elements of repeated and map fields) hold declared values, and
//! that nested messages verify against their own type. The first violation
//! is returned; nothing is aggregated and the message is never modified.
//! Values of the wrong kind are not reported here, encoding rejects them.

use std::sync::Arc;

use crate::codec::VerifyFn;
use crate::codegen::Codegen;
use crate::error::{DescriptorError, VerifyError, VerifyErrorKind};
use crate::gen;
use crate::schema::{FieldKind, Root, Type, TypeId};
use crate::value::{Message, Value};

fn for_each_element<'v>(
    value: &'v Value,
    mut check: impl FnMut(&'v Value) -> Result<(), VerifyError>,
) -> Result<(), VerifyError> {
    match value {
        Value::List(items) => items.iter().try_for_each(check),
        Value::Map(entries) => entries.values().try_for_each(check),
        other => check(other),
    }
}

fn missing(path: &str) -> VerifyError {
    VerifyError::new(path, VerifyErrorKind::MissingRequired)
}

fn check_enum(
    value: &Value,
    path: &str,
    enum_name: &str,
    contains: impl Fn(i32) -> bool,
) -> Result<(), VerifyError> {
    match value {
        Value::Enum(n) | Value::I32(n) if !contains(*n) => Err(VerifyError::new(
            path,
            VerifyErrorKind::UnknownEnumValue {
                value: *n,
                enum_name: enum_name.to_owned(),
            },
        )),
        _ => Ok(()),
    }
}

fn check_sub(
    root: &Root,
    sub: TypeId,
    value: &Value,
    ty: &str,
    field: &str,
) -> Result<(), VerifyError> {
    match value.as_message() {
        Some(msg) => super::verify_message(root, sub, msg).map_err(|e| e.nested_in(ty, field)),
        None => Ok(()),
    }
}

type FieldCheck = Box<dyn Fn(&Root, &Message) -> Result<(), VerifyError> + Send + Sync>;

fn field_check<F>(f: F) -> FieldCheck
where
    F: Fn(&Root, &Message) -> Result<(), VerifyError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Verifier bound to one message type
pub struct Verifier<'r> {
    root: &'r Root,
    ty: &'r Type,
}

impl<'r> Verifier<'r> {
    pub fn new(root: &'r Root, id: TypeId) -> Result<Self, DescriptorError> {
        Ok(Self {
            root,
            ty: root.type_of(id)?,
        })
    }

    /// Reflective verification of `msg`.
    pub fn verify(&self, msg: &Message) -> Result<(), VerifyError> {
        let ty = self.ty.name();
        for field in self.ty.fields() {
            let path = format!("{}.{}", ty, field.name());
            let Some(value) = msg.get(field.id()) else {
                if field.is_required() {
                    return Err(missing(&path));
                }
                continue;
            };
            match field.kind()? {
                FieldKind::Scalar(_) => {}
                FieldKind::Enum(eid) => {
                    let en = self.root.enum_of(eid)?;
                    for_each_element(value, |v| check_enum(v, &path, en.name(), |n| en.contains(n)))?;
                }
                FieldKind::Message(sub) => {
                    for_each_element(value, |v| check_sub(self.root, sub, v, ty, field.name()))?;
                }
            }
        }
        Ok(())
    }

    fn plan(&self) -> Result<(Codegen, Vec<FieldCheck>), DescriptorError> {
        let mut gen = Codegen::new(["m"]);
        let mut checks = Vec::new();
        for (ix, field) in self.ty.fields().iter().enumerate() {
            let id = field.id();
            let required = field.is_required();
            let path = format!("{}.{}", self.ty.name(), field.name());
            if required {
                gen!(gen, "if (!m.has({id}))");
                gen!(gen, "return \"{path}: required field is missing\"");
            }
            let check = match field.kind()? {
                FieldKind::Scalar(_) if !required => continue,
                FieldKind::Scalar(_) => field_check(move |_, msg| {
                    if msg.has(id) {
                        Ok(())
                    } else {
                        Err(missing(&path))
                    }
                }),
                FieldKind::Enum(eid) => {
                    let en = self.root.enum_of(eid)?;
                    let mut numbers: Vec<i32> = en.values().map(|(_, n)| n).collect();
                    numbers.sort_unstable();
                    numbers.dedup();
                    let enum_name = en.name().to_owned();
                    gen!(gen, "if (m.has({id})) {{");
                    gen!(gen, "for (v of m.values({id})) {{");
                    gen!(gen, "if (!(v in {numbers:?}))");
                    gen!(gen, "return \"{path}: enum value expected\"");
                    gen!(gen, "}}");
                    gen!(gen, "}}");
                    field_check(move |_, msg| match msg.get(id) {
                        None if required => Err(missing(&path)),
                        None => Ok(()),
                        Some(value) => for_each_element(value, |v| {
                            check_enum(v, &path, &enum_name, |n| numbers.binary_search(&n).is_ok())
                        }),
                    })
                }
                FieldKind::Message(sub) => {
                    let ty = self.ty.name().to_owned();
                    let name = field.name().to_owned();
                    gen!(gen, "if (m.has({id})) {{");
                    gen!(gen, "for (v of m.values({id})) {{");
                    gen!(gen, "if (e = types[{ix}].verify(v))");
                    gen!(gen, "return \"{path}.\" + e");
                    gen!(gen, "}}");
                    gen!(gen, "}}");
                    field_check(move |root, msg| match msg.get(id) {
                        None if required => Err(missing(&path)),
                        None => Ok(()),
                        Some(value) => for_each_element(value, |v| check_sub(root, sub, v, &ty, &name)),
                    })
                }
            };
            checks.push(check);
        }
        gen!(gen, "return null");
        Ok((gen, checks))
    }

    /// Listing of the routine [`generate`](Verifier::generate) links.
    pub fn listing(&self) -> Result<String, DescriptorError> {
        let (gen, _) = self.plan()?;
        Ok(gen.str(&format!("{}$verify", self.ty.name())))
    }

    /// Builds the specialized verification routine for this type. Fields
    /// that can never fail verification are left out of it.
    pub fn generate(&self) -> Result<VerifyFn, DescriptorError> {
        let (gen, checks) = self.plan()?;
        Ok(gen.eof(&format!("{}$verify", self.ty.name()), checks, |checks| {
            Arc::new(move |root: &Root, msg: &Message| {
                checks.iter().try_for_each(|check| check(root, msg))
            }) as VerifyFn
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{Enum, Field, ScalarType};

    fn root() -> (Root, TypeId) {
        let mut root = Root::new();
        let mut color = Enum::new("Color");
        color.add_value("RED", 0).unwrap().add_value("BLUE", 2).unwrap();
        root.add_enum(color).unwrap();
        let mut inner = Type::new("Inner");
        inner.add_field(Field::new("req", 1, "string").required()).unwrap()
            .add_field(Field::new("color", 2, "Color")).unwrap();
        root.add_type(inner).unwrap();
        let mut outer = Type::new("Outer");
        outer.add_field(Field::new("id", 1, "uint64").required()).unwrap()
            .add_field(Field::new("inner", 2, "Inner")).unwrap()
            .add_field(Field::new("palette", 3, "Color").repeated()).unwrap()
            .add_field(Field::new("named", 4, "Color").map(ScalarType::String)).unwrap()
            .add_field(Field::new("note", 5, "string")).unwrap();
        let id = root.add_type(outer).unwrap();
        root.resolve();
        (root, id)
    }

    fn both(root: &Root, id: TypeId, msg: &Message) -> Result<(), VerifyError> {
        let v = Verifier::new(root, id).unwrap();
        let reflective = v.verify(msg);
        let compiled = v.generate().unwrap()(root, msg);
        assert_eq!(reflective, compiled);
        reflective
    }

    #[test]
    fn valid_message() {
        let (root, id) = root();
        let msg = Message::new()
            .with(1, 7u64)
            .with(2, Message::new().with(1, "x").with(2, Value::Enum(2)))
            .with(3, Value::List(vec![Value::Enum(0), Value::Enum(2)]));
        assert_eq!(both(&root, id, &msg), Ok(()));
    }

    #[test]
    fn missing_required() {
        let (root, id) = root();
        let err = both(&root, id, &Message::new()).unwrap_err();
        assert_eq!(err.to_string(), "Outer.id: required field is missing");

        let msg = Message::new().with(1, 7u64).with(2, Message::new());
        let err = both(&root, id, &msg).unwrap_err();
        assert_eq!(err.path(), "Outer.inner.Inner.req");
        assert_eq!(err.kind(), &VerifyErrorKind::MissingRequired);
    }

    #[test]
    fn unknown_enum_values() {
        let (root, id) = root();
        let msg = Message::new()
            .with(1, 7u64)
            .with(3, Value::List(vec![Value::Enum(0), Value::Enum(1)]));
        let err = both(&root, id, &msg).unwrap_err();
        assert_eq!(err.path(), "Outer.palette");
        assert_eq!(
            err.kind(),
            &VerifyErrorKind::UnknownEnumValue { value: 1, enum_name: "Color".into() }
        );

        let mut named = std::collections::BTreeMap::new();
        named.insert("a".into(), Value::Enum(5));
        let msg = Message::new().with(1, 7u64).with(4, Value::Map(named));
        assert_eq!(both(&root, id, &msg).unwrap_err().path(), "Outer.named");
    }

    #[test]
    fn first_violation_wins() {
        let (root, id) = root();
        let msg = Message::new()
            .with(2, Message::new())
            .with(3, Value::List(vec![Value::Enum(9)]));
        assert_eq!(both(&root, id, &msg).unwrap_err().path(), "Outer.id");
    }

    #[test]
    fn listing_skips_unchecked_fields() {
        let (root, id) = root();
        let listing = Verifier::new(&root, id).unwrap().listing().unwrap();
        assert!(listing.starts_with(
            "fn Outer_verify(m) {\n\tif (!m.has(1))\n\t\treturn \"Outer.id: required field is missing\"\n"
        ));
        assert!(listing.contains("\t\t\tif (!(v in [0, 2]))\n"));
        assert!(!listing.contains("m.has(5)"));
        assert!(listing.ends_with("\treturn null\n}"));
    }
}

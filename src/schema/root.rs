//! The descriptor arena
//!
//! A [`Root`] owns every message [`Type`] and [`Enum`] of a schema. Fields
//! refer to other types by name; [`Root::resolve`] binds those names to
//! [`TypeId`]/[`EnumId`] handles in a separate pass, so that types may be
//! registered in any order and may refer to each other cyclically.
//!
//! Names are resolved the way nested scopes are: a reference `Inner` from a
//! field of `pkg.Outer` is looked up as `pkg.Outer.Inner`, then `pkg.Inner`,
//! then `Inner`. A leading `.` makes a reference absolute.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::codec::CodecMode;
use crate::error::DescriptorError;
use crate::schema::enums::Enum;
use crate::schema::field::{Field, FieldKind, FieldType, Resolved};
use crate::schema::message::Type;
use crate::value::Value;

/// Handle of a message type within its [`Root`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub(crate) usize);

/// Handle of an enum within its [`Root`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnumId(pub(crate) usize);

impl TypeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl EnumId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Arena of message types and enums, linked by index
#[derive(Debug, Default)]
pub struct Root {
    types: Vec<Type>,
    enums: Vec<Enum>,
    names: HashMap<String, Resolved>,
    mode: CodecMode,
    /// Set once every reference has been confirmed bound; cleared by any
    /// mutation.
    checked: AtomicBool,
}

impl Root {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn claim_name(&mut self, name: &str, target: Resolved) -> Result<(), DescriptorError> {
        if self.names.contains_key(name) {
            return Err(DescriptorError::DuplicateName {
                scope: String::from("root"),
                name: name.to_owned(),
            });
        }
        self.names.insert(name.to_owned(), target);
        *self.checked.get_mut() = false;
        Ok(())
    }

    /// Registers a message type under its full name.
    pub fn add_type(&mut self, ty: Type) -> Result<TypeId, DescriptorError> {
        let id = TypeId(self.types.len());
        self.claim_name(ty.name(), Resolved::Message(id))?;
        self.types.push(ty);
        Ok(id)
    }

    /// Registers an enum under its full name.
    pub fn add_enum(&mut self, en: Enum) -> Result<EnumId, DescriptorError> {
        let id = EnumId(self.enums.len());
        self.claim_name(en.name(), Resolved::Enum(id))?;
        self.enums.push(en);
        Ok(id)
    }

    #[must_use]
    pub fn get(&self, id: TypeId) -> Option<&Type> {
        self.types.get(id.0)
    }

    #[must_use]
    pub fn get_enum(&self, id: EnumId) -> Option<&Enum> {
        self.enums.get(id.0)
    }

    /// Mutable access to a registered type. Its memoized codecs are dropped
    /// and the root must be resolved again before the next codec call if the
    /// change introduces new references.
    pub fn type_mut(&mut self, id: TypeId) -> Option<&mut Type> {
        *self.checked.get_mut() = false;
        let ty = self.types.get_mut(id.0)?;
        ty.invalidate();
        Some(ty)
    }

    /// Mutable access to a registered enum. Compiled verifiers capture enum
    /// value sets, so every memoized codec of the root is dropped.
    pub fn enum_mut(&mut self, id: EnumId) -> Option<&mut Enum> {
        for ty in self.types.iter_mut() {
            ty.invalidate();
        }
        self.enums.get_mut(id.0)
    }

    /// Finds a type or enum by full name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Resolved> {
        self.names.get(name.strip_prefix('.').unwrap_or(name)).copied()
    }

    #[must_use]
    pub fn lookup_type(&self, name: &str) -> Option<TypeId> {
        match self.lookup(name)? {
            Resolved::Message(id) => Some(id),
            Resolved::Enum(_) => None,
        }
    }

    #[must_use]
    pub fn lookup_enum(&self, name: &str) -> Option<EnumId> {
        match self.lookup(name)? {
            Resolved::Enum(id) => Some(id),
            Resolved::Message(_) => None,
        }
    }

    /// Iterates over all registered types with their handles.
    pub fn types(&self) -> impl Iterator<Item = (TypeId, &Type)> + '_ {
        self.types.iter().enumerate().map(|(ix, ty)| (TypeId(ix), ty))
    }

    /// Binds every named field reference that can be found, returning the
    /// number of references still pending.
    ///
    /// Resolution is idempotent; unknown names are left pending, so this may
    /// be called again after more types have been registered.
    pub fn resolve(&mut self) -> usize {
        let names = &self.names;
        let mut pending = 0;
        for ty in self.types.iter_mut() {
            let scope = ty.name().to_owned();
            let mut changed = false;
            for field in ty.fields_mut() {
                let reference = match field.field_type() {
                    FieldType::Named(reference) => reference.clone(),
                    FieldType::Scalar(_) => continue,
                };
                match lookup_scoped(names, &scope, &reference) {
                    Some(target) => changed |= field.bind(target),
                    None => pending += 1,
                }
            }
            if changed {
                ty.invalidate();
            }
        }
        tracing::debug!(pending, types = self.types.len(), "resolved descriptor references");
        pending
    }

    /// Lists `(field path, reference)` for every reference not yet bound.
    #[must_use]
    pub fn unresolved(&self) -> Vec<(String, String)> {
        self.types
            .iter()
            .flat_map(|ty| {
                ty.fields().iter().filter_map(move |f| {
                    f.pending_reference()
                        .map(|r| (format!("{}.{}", ty.name(), f.name()), r.to_owned()))
                })
            })
            .collect()
    }

    /// Selects between compiled and reflective codecs for this root.
    pub fn set_mode(&mut self, mode: CodecMode) {
        self.mode = mode;
    }

    #[must_use]
    pub fn mode(&self) -> CodecMode {
        self.mode
    }

    /// Value an absent singular field is equivalent to: its declared default,
    /// else the zero value of its scalar type or the first value of its enum.
    /// Message fields have no default.
    #[must_use]
    pub fn default_value(&self, field: &Field) -> Option<Value> {
        if let Some(default) = field.declared_default() {
            return Some(default.clone());
        }
        match field.kind().ok()? {
            FieldKind::Scalar(ty) => Some(ty.zero()),
            FieldKind::Enum(id) => Some(Value::Enum(self.get_enum(id)?.default_number())),
            FieldKind::Message(_) => None,
        }
    }

    pub(crate) fn type_of(&self, id: TypeId) -> Result<&Type, DescriptorError> {
        self.types.get(id.0).ok_or(DescriptorError::UnknownType(id.0))
    }

    pub(crate) fn enum_of(&self, id: EnumId) -> Result<&Enum, DescriptorError> {
        self.enums.get(id.0).ok_or(DescriptorError::UnknownType(id.0))
    }

    /// Fails with the first pending reference, if any.
    pub(crate) fn ensure_resolved(&self) -> Result<(), DescriptorError> {
        if self.checked.load(Ordering::Acquire) {
            return Ok(());
        }
        for ty in self.types.iter() {
            for field in ty.fields() {
                if let Some(reference) = field.pending_reference() {
                    return Err(DescriptorError::Unresolved {
                        field: format!("{}.{}", ty.name(), field.name()),
                        reference: reference.to_owned(),
                    });
                }
            }
        }
        self.checked.store(true, Ordering::Release);
        Ok(())
    }
}

fn lookup_scoped(
    names: &HashMap<String, Resolved>,
    scope: &str,
    reference: &str,
) -> Option<Resolved> {
    if let Some(absolute) = reference.strip_prefix('.') {
        return names.get(absolute).copied();
    }
    let mut scope = scope;
    loop {
        let found = if scope.is_empty() {
            names.get(reference).copied()
        } else {
            names.get(&format!("{scope}.{reference}")).copied()
        };
        if found.is_some() || scope.is_empty() {
            return found;
        }
        scope = scope.rsplit_once('.').map_or("", |(parent, _)| parent);
    }
}

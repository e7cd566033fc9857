//! Message type descriptors

use std::collections::HashMap;

use crate::codec::CodecCache;
use crate::error::DescriptorError;
use crate::schema::field::{Field, MAX_FIELD_ID};

/// An ordered list of fields, with lookup by id
///
/// Each `Type` also owns the slots in which its compiled codec closures are
/// memoized; any change to the field list clears them.
#[derive(Clone, Debug)]
pub struct Type {
    name: String,
    fields: Vec<Field>,
    by_id: HashMap<u32, usize>,
    pub(crate) cache: CodecCache,
}

impl Type {
    /// Creates an empty type with a (possibly dotted) full name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            by_id: HashMap::new(),
            cache: CodecCache::default(),
        }
    }

    /// Appends a field.
    ///
    /// Fails if the id is outside `1..=536870911` or already used, if the
    /// name is already used, or if a map field has a key type that cannot key
    /// a map.
    pub fn add_field(&mut self, field: Field) -> Result<&mut Self, DescriptorError> {
        let id = field.id();
        if id == 0 || id > MAX_FIELD_ID {
            return Err(DescriptorError::InvalidFieldId {
                ty: self.name.clone(),
                field: field.name().to_owned(),
                id,
            });
        }
        if self.by_id.contains_key(&id) {
            return Err(DescriptorError::DuplicateFieldId {
                ty: self.name.clone(),
                id,
            });
        }
        if self.field(field.name()).is_some() {
            return Err(DescriptorError::DuplicateName {
                scope: format!("type {}", self.name),
                name: field.name().to_owned(),
            });
        }
        if let Some(key) = field.key_type() {
            if !key.is_map_key() {
                return Err(DescriptorError::InvalidMapKey {
                    field: format!("{}.{}", self.name, field.name()),
                    key,
                });
            }
        }
        self.by_id.insert(id, self.fields.len());
        self.fields.push(field);
        self.invalidate();
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn field_by_id(&self, id: u32) -> Option<&Field> {
        self.by_id.get(&id).map(|&ix| &self.fields[ix])
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    /// Drops any memoized codec closures.
    pub fn invalidate(&mut self) {
        self.cache = CodecCache::default();
    }

    /// Whether a compiled codec is currently memoized for this type
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.cache.is_populated()
    }
}

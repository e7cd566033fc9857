//! Enum descriptors

use std::collections::HashSet;

use crate::error::DescriptorError;

/// Named set of `int32` values
///
/// Values keep their declaration order; the first declared value is the
/// default of fields of this enum type. Several names may share a number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Enum {
    name: String,
    values: Vec<(String, i32)>,
    numbers: HashSet<i32>,
}

impl Enum {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            numbers: HashSet::new(),
        }
    }

    /// Adds a named value, rejecting duplicate names.
    pub fn add_value(
        &mut self,
        name: impl Into<String>,
        number: i32,
    ) -> Result<&mut Self, DescriptorError> {
        let name = name.into();
        if self.values.iter().any(|(n, _)| *n == name) {
            return Err(DescriptorError::DuplicateName {
                scope: format!("enum {}", self.name),
                name,
            });
        }
        self.values.push((name, number));
        self.numbers.insert(number);
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared values, in order
    pub fn values(&self) -> impl Iterator<Item = (&str, i32)> + '_ {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    #[must_use]
    pub fn contains(&self, number: i32) -> bool {
        self.numbers.contains(&number)
    }

    /// First name declared for `number`
    #[must_use]
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, v)| *v == number)
            .map(|(n, _)| n.as_str())
    }

    /// Number of the first declared value, or zero for an empty enum
    #[must_use]
    pub fn default_number(&self) -> i32 {
        self.values.first().map_or(0, |(_, v)| *v)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn membership() {
        let mut e = Enum::new("Color");
        e.add_value("RED", 2)
            .unwrap()
            .add_value("GREEN", 5)
            .unwrap()
            .add_value("CRIMSON", 2)
            .unwrap();
        assert!(e.contains(5));
        assert!(!e.contains(0));
        assert_eq!(e.default_number(), 2);
        assert_eq!(e.name_of(2), Some("RED"));
        assert!(e.add_value("RED", 9).is_err());
        assert_eq!(e.values().count(), 3);
    }
}

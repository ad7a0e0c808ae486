//! Named properties shared across pipeline stages
//!
//! ## Table of Contents
//! - **Property**: A name/value pair with typed accessors
//! - **Properties**: Last-write-wins property bag keyed by name

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A named string value
///
/// The empty property (empty name, empty value) stands in for a missing
/// entry, so lookups never fail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    name: String,
    value: String,
}

impl Property {
    /// Create a new property
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }

    /// The empty property returned on lookup misses
    pub fn empty() -> Self {
        Self::default()
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw string value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// True for the missing-property placeholder
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Parse the value as an integer, or return `default`
    pub fn as_i64(&self, default: i64) -> i64 {
        self.value.trim().parse().unwrap_or(default)
    }

    /// Parse the value as a float, or return `default`
    pub fn as_f64(&self, default: f64) -> f64 {
        self.value.trim().parse().unwrap_or(default)
    }

    /// Interpret the value as a boolean, or return `default`
    pub fn as_bool(&self, default: bool) -> bool {
        match self.value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => true,
            "false" | "no" | "off" | "0" => false,
            _ => default,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Property bag keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    entries: HashMap<String, Property>,
}

impl Properties {
    /// Create an empty property bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property
    pub fn set(&mut self, prop: Property) {
        self.entries.insert(prop.name.clone(), prop);
    }

    /// Look up a property; misses yield [`Property::empty`]
    pub fn get(&self, name: &str) -> Property {
        self.entries.get(name).cloned().unwrap_or_default()
    }

    /// Check whether a property is present
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Remove a property, returning it if present
    pub fn remove(&mut self, name: &str) -> Option<Property> {
        self.entries.remove(name)
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the bag is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all properties in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.entries.values()
    }
}

impl FromIterator<Property> for Properties {
    fn from_iter<I: IntoIterator<Item = Property>>(iter: I) -> Self {
        let mut props = Properties::new();
        for prop in iter {
            props.set(prop);
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut props = Properties::new();
        props.set(Property::new("lod", 1));
        props.set(Property::new("lod", 3));

        assert_eq!(props.len(), 1);
        assert_eq!(props.get("lod").as_i64(0), 3);
    }

    #[test]
    fn test_missing_is_empty() {
        let props = Properties::new();
        let prop = props.get("nope");
        assert!(prop.is_empty());
        assert_eq!(prop.value(), "");
        assert_eq!(prop.as_f64(2.5), 2.5);
    }

    #[test]
    fn test_typed_accessors() {
        assert!(Property::new("fade", "Yes").as_bool(false));
        assert!(!Property::new("fade", "off").as_bool(true));
        assert!(Property::new("fade", "maybe").as_bool(true));
        assert_eq!(Property::new("height", " 12.5 ").as_f64(0.0), 12.5);
        assert_eq!(Property::new("bin", "x").as_i64(-1), -1);
    }
}

//! Metadata filtering for vector search
//!
//! Supports only equality filtering on top-level fields.
//! All conditions must match (AND semantics).

use crate::value::{Metadata, MetadataValue};
use std::collections::BTreeMap;

/// Metadata filter for search (equality only)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    /// Field equality conditions
    pub equals: BTreeMap<String, MetadataValue>,
}

impl MetadataFilter {
    /// Create an empty filter (matches all)
    pub fn new() -> Self {
        MetadataFilter {
            equals: BTreeMap::new(),
        }
    }

    /// Add an equality condition
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    /// Check if a metadata record matches every condition
    ///
    /// Integers and floats compare numerically, so a filter on `Integer(3)`
    /// matches a stored `Float(3.0)`. Other variants must match exactly.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.equals.iter().all(|(key, expected)| {
            metadata
                .get(key)
                .is_some_and(|actual| scalar_eq(expected, actual))
        })
    }

    /// Check if filter is empty (matches all)
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }

    /// Get the number of conditions in the filter
    pub fn len(&self) -> usize {
        self.equals.len()
    }
}

fn scalar_eq(expected: &MetadataValue, actual: &MetadataValue) -> bool {
    match (expected, actual) {
        (MetadataValue::String(a), MetadataValue::String(b)) => a == b,
        (MetadataValue::Bool(a), MetadataValue::Bool(b)) => a == b,
        (MetadataValue::Integer(a), MetadataValue::Integer(b)) => a == b,
        _ => match (expected.as_f64(), actual.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Metadata {
        let mut m = Metadata::new();
        m.insert("type".into(), "company".into());
        m.insert("employees".into(), 50i64.into());
        m.insert("archived".into(), false.into());
        m
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = MetadataFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&record()));
        assert!(filter.matches(&Metadata::new()));
    }

    #[test]
    fn test_all_conditions_must_match() {
        let filter = MetadataFilter::new()
            .eq("type", "company")
            .eq("archived", false);
        assert_eq!(filter.len(), 2);
        assert!(filter.matches(&record()));

        let filter = filter.eq("employees", 51i64);
        assert!(!filter.matches(&record()));
    }

    #[test]
    fn test_missing_field_does_not_match() {
        let filter = MetadataFilter::new().eq("owner", "alice");
        assert!(!filter.matches(&record()));
    }

    #[test]
    fn test_numeric_cross_variant_match() {
        let filter = MetadataFilter::new().eq("employees", 50.0);
        assert!(filter.matches(&record()));
    }

    #[test]
    fn test_type_mismatch_does_not_match() {
        let filter = MetadataFilter::new().eq("employees", "50");
        assert!(!filter.matches(&record()));
    }
}

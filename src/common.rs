//! Common utilities for DynamoDB operations.
//!
//! This module provides the expression compiler shared by read, write and transactional
//! operations: document paths, placeholder allocation, condition expressions, keys and
//! projections.

/// Condition expression building for filters and conditional writes.
pub mod condition;

/// Primary key values identifying a single item.
pub mod key;

/// Document paths into nested attributes.
pub mod path;

/// Attribute selection for projection expressions.
pub mod selection;

use aws_sdk_dynamodb::types;
use indexmap::IndexMap;
use std::collections;

/// Placeholder tables shared by all expressions of one request.
///
/// Names are replaced by `#0`, `#1`, ... and values by `:0`, `:1`, ... in order of first use.
/// A name or value that occurs twice reuses its placeholder.
///
/// ```rust
/// use aws_sdk_dynamodb::types::AttributeValue;
/// use dynamodb_mapper::common::Placeholders;
///
/// let mut placeholders = Placeholders::default();
/// assert_eq!(placeholders.name("id"), "#0");
/// assert_eq!(placeholders.name("id"), "#0");
/// assert_eq!(placeholders.value(AttributeValue::N("1".to_string())), ":0");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Placeholders {
    names: IndexMap<String, String>,
    values: Vec<(String, types::AttributeValue)>,
}

impl Placeholders {
    /// Placeholder of an attribute name.
    pub fn name(&mut self, name: &str) -> String {
        if let Some(placeholder) = self.names.get(name) {
            return placeholder.clone();
        }
        let placeholder = format!("#{}", self.names.len());
        self.names.insert(name.to_string(), placeholder.clone());
        placeholder
    }

    /// Placeholder of a value.
    pub fn value(&mut self, value: types::AttributeValue) -> String {
        if let Some((placeholder, _)) = self.values.iter().find(|(_, other)| *other == value) {
            return placeholder.clone();
        }
        let placeholder = format!(":{}", self.values.len());
        self.values.push((placeholder.clone(), value));
        placeholder
    }

    /// Whether no placeholder has been allocated.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.values.is_empty()
    }

    /// `ExpressionAttributeNames`, `None` when empty.
    pub fn expression_attribute_names(&self) -> Option<collections::HashMap<String, String>> {
        if self.names.is_empty() {
            return None;
        }
        let names = self
            .names
            .iter()
            .map(|(name, placeholder)| (placeholder.clone(), name.clone()))
            .collect();
        Some(names)
    }

    /// `ExpressionAttributeValues`, `None` when empty.
    pub fn expression_attribute_values(
        &self,
    ) -> Option<collections::HashMap<String, types::AttributeValue>> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().cloned().collect())
    }
}

/// A compiled expression together with its placeholder tables.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpressionInput {
    /// Expression text.
    pub expression: String,
    /// Placeholder to attribute name.
    pub expression_attribute_names: collections::HashMap<String, String>,
    /// Placeholder to value.
    pub expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

impl ExpressionInput {
    pub(crate) fn new(expression: String, placeholders: &Placeholders) -> Self {
        Self {
            expression,
            expression_attribute_names: placeholders
                .expression_attribute_names()
                .unwrap_or_default(),
            expression_attribute_values: placeholders
                .expression_attribute_values()
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_first_use_order() {
        let mut placeholders = Placeholders::default();
        assert_eq!(placeholders.name("b"), "#0");
        assert_eq!(placeholders.name("a"), "#1");
        assert_eq!(placeholders.name("b"), "#0");
        let one = types::AttributeValue::N("1".to_string());
        assert_eq!(placeholders.value(types::AttributeValue::S("x".to_string())), ":0");
        assert_eq!(placeholders.value(one.clone()), ":1");
        assert_eq!(placeholders.value(one), ":1");
        assert_eq!(
            placeholders.expression_attribute_names(),
            Some(collections::HashMap::from([
                ("#0".to_string(), "b".to_string()),
                ("#1".to_string(), "a".to_string()),
            ]))
        );
        assert_eq!(
            placeholders
                .expression_attribute_values()
                .map(|values| values.len()),
            Some(2)
        );
    }

    #[test]
    fn test_placeholders_empty() {
        let placeholders = Placeholders::default();
        assert!(placeholders.is_empty());
        assert_eq!(placeholders.expression_attribute_names(), None);
        assert_eq!(placeholders.expression_attribute_values(), None);
    }
}

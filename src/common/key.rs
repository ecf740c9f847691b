use crate::{
    Item,
    attribute::{Attribute, value::Value},
    error::{Error, Result},
    schema::Schema,
};

use std::collections;

/// Primary key values: partition key and optional sort key.
///
/// Attribute names and wire types come from the schema the keys are used with.
///
/// ```rust
/// use dynamodb_mapper::common::key::Keys;
///
/// let keys = Keys::new("user1").range(42);
/// assert!(keys.range_key.is_some());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Keys {
    /// Partition key value.
    pub hash_key: Value,
    /// Sort key value, for tables with composite keys.
    pub range_key: Option<Value>,
}

impl Keys {
    /// Keys of a table with a partition key only.
    pub fn new(hash_key: impl Into<Value>) -> Self {
        Self {
            hash_key: hash_key.into(),
            range_key: None,
        }
    }

    /// Add a sort key value.
    pub fn range(mut self, range_key: impl Into<Value>) -> Self {
        self.range_key = Some(range_key.into());
        self
    }

    /// Marshal against the primary key of `schema`.
    pub fn to_item(&self, schema: &Schema) -> Result<Item> {
        let mut keys = collections::HashMap::with_capacity(2);
        let hash_key = schema.hash_key();
        keys.insert(
            hash_key.name().to_string(),
            serialize_key(hash_key, &self.hash_key)?,
        );
        match (schema.range_key(), &self.range_key) {
            (Some(range_key), Some(value)) => {
                keys.insert(
                    range_key.name().to_string(),
                    serialize_key(range_key, value)?,
                );
            }
            (Some(range_key), None) => {
                return Err(Error::Validation(format!(
                    "schema {} requires a value for the range key {}",
                    schema.name(),
                    range_key.name()
                )));
            }
            (None, Some(_)) => {
                return Err(Error::Validation(format!(
                    "schema {} has no range key",
                    schema.name()
                )));
            }
            (None, None) => {}
        }
        Ok(keys)
    }
}

pub(crate) fn serialize_key(
    attribute: &Attribute,
    value: &Value,
) -> Result<aws_sdk_dynamodb::types::AttributeValue> {
    attribute.serialize(value)?.ok_or_else(|| {
        Error::Validation(format!("key attribute {} cannot be null", attribute.name()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use aws_sdk_dynamodb::types;
    use rstest::rstest;

    fn schema(with_range: bool) -> Schema {
        let builder = Schema::builder("Foo", "foo").attribute(Attribute::number("id").hash_key());
        let builder = if with_range {
            builder.attribute(Attribute::string("sort").range_key())
        } else {
            builder
        };
        builder.build().unwrap()
    }

    #[rstest]
    #[case::hash_only(
        false,
        Keys::new(1),
        collections::HashMap::from(
            [
                ("id".to_string(), types::AttributeValue::N("1".to_string())),
            ]
        )
    )]
    #[case::composite(
        true,
        Keys::new(1).range("a"),
        collections::HashMap::from(
            [
                ("id".to_string(), types::AttributeValue::N("1".to_string())),
                ("sort".to_string(), types::AttributeValue::S("a".to_string())),
            ]
        )
    )]
    fn test_to_item(#[case] with_range: bool, #[case] keys: Keys, #[case] expected: Item) {
        assert_eq!(keys.to_item(&schema(with_range)).unwrap(), expected);
    }

    #[rstest]
    #[case::missing_range(true, Keys::new(1))]
    #[case::unexpected_range(false, Keys::new(1).range("a"))]
    #[case::wrong_type(false, Keys::new("one"))]
    #[case::null_hash(false, Keys::new(Value::Null))]
    fn test_to_item_error(#[case] with_range: bool, #[case] keys: Keys) {
        assert!(keys.to_item(&schema(with_range)).is_err());
    }
}

//! Records: in-memory instances of a schema.

use crate::{
    Item,
    attribute::{Attribute, Role, value::Value},
    error::{Error, Result},
    schema::{Schema, registry::Registry},
};

use aws_sdk_dynamodb::types;
use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use std::{collections, sync};

/// Lifecycle of a record.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RecordState {
    /// Built locally, never written.
    #[default]
    New,
    /// Decoded from a stored item.
    Loaded,
    /// Written successfully.
    Saved,
    /// Deleted successfully.
    Deleted,
}

/// Instance of a schema: attribute values keyed by wire name.
///
/// ```rust
/// use dynamodb_mapper::{attribute::Attribute, record::Record, schema::Schema};
/// use std::sync::Arc;
///
/// let schema = Arc::new(
///     Schema::builder("LineItem", "line_items")
///         .attribute(Attribute::string("user_id").hash_key())
///         .attribute(Attribute::number("amount"))
///         .build()
///         .unwrap(),
/// );
/// let record = Record::new(&schema)
///     .with("user_id", "user1")
///     .unwrap()
///     .with("amount", 50)
///     .unwrap();
/// assert_eq!(record.serialize().unwrap().len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct Record {
    schema: sync::Arc<Schema>,
    values: IndexMap<String, Value>,
    state: RecordState,
}

impl Record {
    /// New record with defaults applied and the discriminator tag set.
    pub fn new(schema: &sync::Arc<Schema>) -> Self {
        let mut values = IndexMap::new();
        for attribute in schema.attributes() {
            if let Some(default) = attribute.default() {
                values.insert(attribute.name().to_string(), default.get());
            }
        }
        if let (Some(attribute), Some(tag)) = (
            schema.discriminator_attribute(),
            schema.discriminator_value(),
        ) {
            values.insert(attribute.name().to_string(), Value::from(tag));
        }
        Self {
            schema: sync::Arc::clone(schema),
            values,
            state: RecordState::New,
        }
    }

    /// Schema of the record.
    pub fn schema(&self) -> &sync::Arc<Schema> {
        &self.schema
    }

    /// Lifecycle state.
    pub fn state(&self) -> RecordState {
        self.state
    }

    /// All present values.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Value of an attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    fn attribute(&self, name: &str) -> Result<&Attribute> {
        self.schema.attribute(name).ok_or_else(|| {
            Error::Validation(format!(
                "schema {} has no attribute {name}",
                self.schema.name()
            ))
        })
    }

    /// Assign an attribute. Assigning null removes the value.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let attribute = self.attribute(name)?;
        if attribute.role() == Role::Discriminator
            && value.as_str() != self.schema.discriminator_value()
        {
            return Err(Error::Validation(format!(
                "discriminator {name} of schema {} cannot be reassigned",
                self.schema.name()
            )));
        }
        if value.is_null() {
            self.values.shift_remove(name);
        } else {
            self.values.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Remove a value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.shift_remove(name)
    }

    /// Current optimistic-locking version, `None` until first saved.
    pub fn version(&self) -> Option<i64> {
        let attribute = self.schema.version_attribute()?;
        self.values.get(attribute.name()).and_then(Value::as_i64)
    }

    pub(crate) fn set_version(&mut self, version: i64) {
        if let Some(attribute) = self.schema.version_attribute() {
            self.values
                .insert(attribute.name().to_string(), Value::from(version));
        }
    }

    pub(crate) fn mark(&mut self, state: RecordState) {
        self.state = state;
    }

    /// Marshalled primary key.
    pub fn keys(&self) -> Result<Item> {
        let mut keys = collections::HashMap::with_capacity(2);
        for attribute in std::iter::once(self.schema.hash_key()).chain(self.schema.range_key()) {
            let wire = self
                .values
                .get(attribute.name())
                .map(|value| attribute.serialize(value))
                .transpose()?
                .flatten()
                .ok_or_else(|| {
                    Error::Serialization(format!(
                        "key attribute {} of {} is missing",
                        attribute.name(),
                        self.schema.name()
                    ))
                })?;
            keys.insert(attribute.name().to_string(), wire);
        }
        Ok(keys)
    }

    /// Marshalled item with every present attribute.
    ///
    /// Fails when a non-nullable attribute is missing.
    pub fn serialize(&self) -> Result<Item> {
        let mut item = collections::HashMap::with_capacity(self.values.len());
        for attribute in self.schema.attributes() {
            let wire = match self.values.get(attribute.name()) {
                Some(value) => attribute.serialize(value)?,
                None => None,
            };
            match wire {
                Some(wire) => {
                    item.insert(attribute.name().to_string(), wire);
                }
                None if attribute.is_nullable() => {}
                None => {
                    return Err(Error::Serialization(format!(
                        "attribute {} of {} cannot be null",
                        attribute.name(),
                        self.schema.name()
                    )));
                }
            }
        }
        Ok(item)
    }

    /// Decode an item with a known schema. Unknown attributes are ignored.
    pub fn from_item(schema: &sync::Arc<Schema>, item: &Item) -> Result<Self> {
        let mut record = Self {
            schema: sync::Arc::clone(schema),
            values: IndexMap::with_capacity(item.len()),
            state: RecordState::Loaded,
        };
        record.load(item)?;
        Ok(record)
    }

    /// Decode an item of `table_name`, picking the schema from its discriminator tag.
    pub fn decode(registry: &Registry, table_name: &str, item: &Item) -> Result<Self> {
        let root = registry.resolve(table_name, None)?;
        let tag = root
            .discriminator_attribute()
            .and_then(|attribute| item.get(attribute.name()))
            .and_then(|value| match value {
                types::AttributeValue::S(tag) => Some(tag.as_str()),
                _ => None,
            });
        let schema = match tag {
            Some(tag) => registry.resolve(table_name, Some(tag))?,
            None => root,
        };
        Self::from_item(&schema, item)
    }

    pub(crate) fn load(&mut self, item: &Item) -> Result<()> {
        let mut values = IndexMap::with_capacity(item.len());
        for attribute in self.schema.attributes() {
            if let Some(wire) = item.get(attribute.name()) {
                let value = attribute.deserialize(wire)?;
                if !value.is_null() {
                    values.insert(attribute.name().to_string(), value);
                }
            }
        }
        self.values = values;
        Ok(())
    }

    /// Build a record from any serializable type whose fields match the attribute names.
    pub fn from_serialize<T: Serialize>(schema: &sync::Arc<Schema>, value: &T) -> Result<Self> {
        let item: Item = serde_dynamo::to_item(value)?;
        let mut record = Self::new(schema);
        for attribute in schema.attributes() {
            if let Some(wire) = item.get(attribute.name()) {
                let value = match attribute.deserialize(wire) {
                    Ok(value) => value,
                    // serde has no notion of the datetime or set attribute types
                    Err(_) => Value::from_wire(wire)?,
                };
                record.set(attribute.name(), value)?;
            }
        }
        Ok(record)
    }

    /// Convert the record into any deserializable type.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_dynamo::from_item(self.serialize()?)?)
    }
}

//! Attribute descriptors and their wire marshalling.
//!
//! An [`Attribute`] names a field of a schema, declares its type and nullability, and knows how
//! to convert a [`Value`] to and from DynamoDB's tagged wire representation.

/// Arbitrary-precision decimal numbers.
pub mod number;

/// Untyped in-memory attribute values.
pub mod value;

use crate::error::{Error, Result};
use number::Number;
use value::{Value, format_datetime, parse_datetime};

use aws_sdk_dynamodb::{primitives, types};
use base64::{Engine, engine::general_purpose::STANDARD};
use indexmap::IndexMap;
use std::{collections, fmt, sync};

/// Declared type of an attribute.
#[derive(Clone, Debug)]
pub enum AttributeType {
    /// `S`
    String,
    /// `N`
    Number,
    /// `B`
    Binary,
    /// `BOOL`
    Boolean,
    /// `NULL`
    Null,
    /// UTC timestamp stored as `S`.
    DateTime,
    /// `SS`
    StringSet,
    /// `NS`
    NumberSet,
    /// `BS`
    BinarySet,
    /// `L`, optionally with a descriptor for every element.
    List(Option<Box<Attribute>>),
    /// `M`, either with typed children or raw.
    Map(Option<Vec<Attribute>>),
}

impl AttributeType {
    /// Wire type tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::String | Self::DateTime => "S",
            Self::Number => "N",
            Self::Binary => "B",
            Self::Boolean => "BOOL",
            Self::Null => "NULL",
            Self::StringSet => "SS",
            Self::NumberSet => "NS",
            Self::BinarySet => "BS",
            Self::List(_) => "L",
            Self::Map(_) => "M",
        }
    }

    /// Key attribute type, for the types allowed in key schemas.
    pub fn scalar_type(&self) -> Option<types::ScalarAttributeType> {
        match self {
            Self::String | Self::DateTime => Some(types::ScalarAttributeType::S),
            Self::Number => Some(types::ScalarAttributeType::N),
            Self::Binary => Some(types::ScalarAttributeType::B),
            _ => None,
        }
    }

    fn is_set(&self) -> bool {
        matches!(self, Self::StringSet | Self::NumberSet | Self::BinarySet)
    }
}

/// Role of an attribute in the primary key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyRole {
    /// Partition key.
    Hash,
    /// Sort key.
    Range,
}

/// Special behavior attached to an attribute.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Role {
    /// Regular attribute.
    #[default]
    Plain,
    /// Optimistic-locking counter.
    Version,
    /// Tag selecting the concrete subtype of a stored item.
    Discriminator,
}

/// Default applied to new records.
#[derive(Clone)]
pub enum DefaultValue {
    /// A constant.
    Value(Value),
    /// A provider invoked once per new record.
    Provider(sync::Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Produce the default.
    pub fn get(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Provider(provider) => provider(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

/// Descriptor of a single attribute.
///
/// ```rust
/// use dynamodb_mapper::attribute::{Attribute, value::Value};
///
/// let attribute = Attribute::number("balance").default_value(0);
/// let wire = attribute.serialize(&Value::from(12)).unwrap();
/// assert!(wire.is_some());
/// ```
#[derive(Clone, Debug)]
pub struct Attribute {
    name: String,
    attribute_type: AttributeType,
    nullable: bool,
    default: Option<DefaultValue>,
    key: Option<KeyRole>,
    role: Role,
    legacy_encoding: bool,
    legacy_reads: bool,
}

impl Attribute {
    /// Attribute of the given type.
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        let nullable = attribute_type.is_set();
        Self {
            name: name.into(),
            attribute_type,
            nullable,
            default: None,
            key: None,
            role: Role::Plain,
            legacy_encoding: false,
            legacy_reads: false,
        }
    }

    /// String attribute.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::String)
    }

    /// Number attribute.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Number)
    }

    /// Binary attribute, canonical encoding.
    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Binary)
    }

    /// Boolean attribute.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Boolean)
    }

    /// Attribute that always holds the wire null.
    pub fn null(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Null)
    }

    /// UTC timestamp attribute.
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::DateTime)
    }

    /// String set attribute.
    pub fn string_set(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::StringSet)
    }

    /// Number set attribute.
    pub fn number_set(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::NumberSet)
    }

    /// Binary set attribute.
    pub fn binary_set(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::BinarySet)
    }

    /// List attribute with untyped elements.
    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::List(None))
    }

    /// List attribute whose elements follow `element`. The element name is ignored.
    pub fn list_of(name: impl Into<String>, element: Attribute) -> Self {
        Self::new(name, AttributeType::List(Some(Box::new(element))))
    }

    /// Map attribute with untyped entries.
    pub fn map(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Map(None))
    }

    /// Map attribute with typed children.
    pub fn map_of(name: impl Into<String>, children: Vec<Attribute>) -> Self {
        Self::new(name, AttributeType::Map(Some(children)))
    }

    /// Optimistic-locking version counter.
    pub fn version(name: impl Into<String>) -> Self {
        let mut attribute = Self::number(name).nullable();
        attribute.role = Role::Version;
        attribute
    }

    /// Discriminator tag.
    pub fn discriminator(name: impl Into<String>) -> Self {
        let mut attribute = Self::string(name);
        attribute.role = Role::Discriminator;
        attribute
    }

    /// Mark as partition key.
    pub fn hash_key(mut self) -> Self {
        self.key = Some(KeyRole::Hash);
        self
    }

    /// Mark as sort key.
    pub fn range_key(mut self) -> Self {
        self.key = Some(KeyRole::Range);
        self
    }

    /// Allow the attribute to be absent.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Constant default for new records.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Default computed for every new record.
    pub fn default_with<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Provider(sync::Arc::new(provider)));
        self
    }

    /// Store binary payloads as base64 text inside the binary value.
    ///
    /// Reads decode base64 payloads and keep payloads that are not valid base64 as raw bytes.
    /// Raw bytes that happen to be valid base64 (`b"abcd"`) cannot be told apart from a legacy
    /// payload and are decoded.
    pub fn legacy_encoding(mut self) -> Self {
        self.legacy_encoding = true;
        self.legacy_reads = true;
        self
    }

    /// Keep writing raw bytes but decode payloads written with the legacy base64 encoding.
    ///
    /// Without it a canonical descriptor returns a legacy payload as its base64 text. The same
    /// ambiguity as [`Attribute::legacy_encoding`] applies to raw bytes that are valid base64.
    pub fn accept_legacy_encoding(mut self) -> Self {
        self.legacy_reads = true;
        self
    }

    /// Wire name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn attribute_type(&self) -> &AttributeType {
        &self.attribute_type
    }

    /// Whether the attribute may be absent.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Default for new records.
    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Role in the primary key.
    pub fn key_role(&self) -> Option<KeyRole> {
        self.key
    }

    /// Special behavior.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether binary payloads use the legacy base64 encoding.
    pub fn is_legacy_encoding(&self) -> bool {
        self.legacy_encoding
    }

    /// Descriptor of the typed child `name` of a map attribute.
    pub fn child(&self, name: &str) -> Option<&Attribute> {
        match &self.attribute_type {
            AttributeType::Map(Some(children)) => {
                children.iter().find(|child| child.name == name)
            }
            _ => None,
        }
    }

    /// Descriptor of the elements of a typed list attribute.
    pub fn element(&self) -> Option<&Attribute> {
        match &self.attribute_type {
            AttributeType::List(Some(element)) => Some(element),
            _ => None,
        }
    }

    fn mismatch(&self, value: &Value) -> Error {
        Error::Serialization(format!(
            "attribute {} of type {} cannot hold a {} value",
            self.name,
            self.attribute_type.tag(),
            value.type_name()
        ))
    }

    fn wire_mismatch(&self) -> Error {
        Error::Serialization(format!(
            "attribute {} expected a {} value on the wire",
            self.name,
            self.attribute_type.tag()
        ))
    }

    fn encode_binary(&self, bytes: &[u8]) -> primitives::Blob {
        if self.legacy_encoding {
            primitives::Blob::new(STANDARD.encode(bytes))
        } else {
            primitives::Blob::new(bytes)
        }
    }

    fn decode_binary(&self, blob: &primitives::Blob) -> Vec<u8> {
        if self.legacy_reads {
            if let Ok(bytes) = STANDARD.decode(blob.as_ref()) {
                return bytes;
            }
        }
        blob.as_ref().to_vec()
    }

    /// Marshal a value.
    ///
    /// Returns `None` when the value is absent or an empty set, so that the attribute is left
    /// out of the item.
    pub fn serialize(&self, value: &Value) -> Result<Option<types::AttributeValue>> {
        if value.is_null() && !matches!(self.attribute_type, AttributeType::Null) {
            return Ok(None);
        }
        let wire = match (&self.attribute_type, value) {
            (AttributeType::String, Value::String(value)) => {
                types::AttributeValue::S(value.clone())
            }
            (AttributeType::Number, Value::Number(value)) => {
                types::AttributeValue::N(value.to_string())
            }
            (AttributeType::Binary, Value::Binary(value)) => {
                types::AttributeValue::B(self.encode_binary(value))
            }
            (AttributeType::Boolean, Value::Bool(value)) => types::AttributeValue::Bool(*value),
            (AttributeType::Null, Value::Null) => types::AttributeValue::Null(true),
            (AttributeType::DateTime, Value::DateTime(value)) => {
                types::AttributeValue::S(format_datetime(value))
            }
            (AttributeType::StringSet, Value::StringSet(values)) => {
                types::AttributeValue::Ss(values.iter().cloned().collect())
            }
            (AttributeType::NumberSet, Value::NumberSet(values)) => {
                types::AttributeValue::Ns(values.iter().map(Number::to_string).collect())
            }
            (AttributeType::BinarySet, Value::BinarySet(values)) => types::AttributeValue::Bs(
                values
                    .iter()
                    .map(|value| self.encode_binary(value))
                    .collect(),
            ),
            (AttributeType::List(element), Value::List(values)) => {
                let mut items = Vec::with_capacity(values.len());
                for value in values {
                    let item = match element {
                        Some(element) => element.serialize(value)?,
                        None => Some(value.clone().into_wire()),
                    };
                    items.push(item.unwrap_or(types::AttributeValue::Null(true)));
                }
                types::AttributeValue::L(items)
            }
            (AttributeType::Map(Some(children)), Value::Map(values)) => {
                if let Some(unknown) = values
                    .keys()
                    .find(|name| !children.iter().any(|child| &child.name == *name))
                {
                    return Err(Error::Serialization(format!(
                        "attribute {} has no child named {unknown}",
                        self.name
                    )));
                }
                let mut items = collections::HashMap::with_capacity(children.len());
                for child in children {
                    let wire = match values.get(&child.name) {
                        Some(value) => child.serialize(value)?,
                        None => None,
                    };
                    match wire {
                        Some(wire) => {
                            items.insert(child.name.clone(), wire);
                        }
                        None if child.nullable => {}
                        None => {
                            return Err(Error::Serialization(format!(
                                "attribute {}.{} cannot be null",
                                self.name, child.name
                            )));
                        }
                    }
                }
                types::AttributeValue::M(items)
            }
            (AttributeType::Map(None), Value::Map(_)) => value.clone().into_wire(),
            _ => return Err(self.mismatch(value)),
        };
        Ok(Some(wire))
    }

    /// Marshal a single element of a set attribute, as used by `contains`.
    pub(crate) fn serialize_element(&self, value: &Value) -> Result<types::AttributeValue> {
        match (&self.attribute_type, value) {
            (AttributeType::StringSet, Value::String(value)) => {
                Ok(types::AttributeValue::S(value.clone()))
            }
            (AttributeType::NumberSet, Value::Number(value)) => {
                Ok(types::AttributeValue::N(value.to_string()))
            }
            (AttributeType::BinarySet, Value::Binary(value)) => {
                Ok(types::AttributeValue::B(self.encode_binary(value)))
            }
            (AttributeType::List(Some(element)), value) => Ok(element
                .serialize(value)?
                .unwrap_or(types::AttributeValue::Null(true))),
            (AttributeType::StringSet | AttributeType::NumberSet | AttributeType::BinarySet, _) => {
                Err(self.mismatch(value))
            }
            _ => Ok(self
                .serialize(value)?
                .unwrap_or_else(|| value.clone().into_wire())),
        }
    }

    /// Unmarshal a wire value.
    pub fn deserialize(&self, wire: &types::AttributeValue) -> Result<Value> {
        let value = match (&self.attribute_type, wire) {
            (_, types::AttributeValue::Null(_)) => Value::Null,
            (AttributeType::String, types::AttributeValue::S(value)) => {
                Value::String(value.clone())
            }
            (AttributeType::DateTime, types::AttributeValue::S(value)) => {
                Value::DateTime(parse_datetime(value)?)
            }
            (AttributeType::Number, types::AttributeValue::N(value)) => {
                Value::Number(value.parse()?)
            }
            (AttributeType::Binary, types::AttributeValue::B(value)) => {
                Value::Binary(self.decode_binary(value))
            }
            (AttributeType::Boolean, types::AttributeValue::Bool(value)) => Value::Bool(*value),
            (AttributeType::StringSet, types::AttributeValue::Ss(values)) => {
                Value::StringSet(values.iter().cloned().collect())
            }
            (AttributeType::NumberSet, types::AttributeValue::Ns(values)) => Value::NumberSet(
                values
                    .iter()
                    .map(|value| value.parse())
                    .collect::<Result<_>>()?,
            ),
            (AttributeType::BinarySet, types::AttributeValue::Bs(values)) => Value::BinarySet(
                values
                    .iter()
                    .map(|value| self.decode_binary(value))
                    .collect(),
            ),
            (AttributeType::List(element), types::AttributeValue::L(values)) => Value::List(
                values
                    .iter()
                    .map(|value| match element {
                        Some(element) => element.deserialize(value),
                        None => Value::from_wire(value),
                    })
                    .collect::<Result<_>>()?,
            ),
            (AttributeType::Map(Some(children)), types::AttributeValue::M(values)) => {
                let mut items = IndexMap::with_capacity(children.len());
                for child in children {
                    if let Some(wire) = values.get(&child.name) {
                        let value = child.deserialize(wire)?;
                        if !value.is_null() {
                            items.insert(child.name.clone(), value);
                        }
                    }
                }
                Value::Map(items)
            }
            (AttributeType::Map(None), types::AttributeValue::M(_)) => Value::from_wire(wire)?,
            _ => return Err(self.wire_mismatch()),
        };
        Ok(value)
    }
}

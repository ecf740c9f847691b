use crate::{
    attribute::number::Number,
    error::{Error, Result},
};

use aws_sdk_dynamodb::{primitives, types};
use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use std::collections;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f+0000";
const DATETIME_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f+0000";

pub(crate) fn format_datetime(value: &DateTime<Utc>) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn parse_datetime(text: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, DATETIME_PARSE_FORMAT)
        .map(|value| value.and_utc())
        .map_err(|error| Error::Serialization(format!("invalid datetime {text:?}: {error}")))
}

/// In-memory value of an attribute.
///
/// Values are untyped: the attribute descriptor decides how they are marshalled.
/// Without a descriptor the natural wire type of the variant is used.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Text.
    String(String),
    /// Decimal number.
    Number(Number),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// UTC timestamp, stored as text.
    DateTime(DateTime<Utc>),
    /// Set of strings.
    StringSet(collections::BTreeSet<String>),
    /// Set of numbers.
    NumberSet(collections::BTreeSet<Number>),
    /// Set of byte strings.
    BinarySet(collections::BTreeSet<Vec<u8>>),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested map.
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Binary(_) => "binary",
            Self::DateTime(_) => "datetime",
            Self::StringSet(_) => "string set",
            Self::NumberSet(_) => "number set",
            Self::BinarySet(_) => "binary set",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Whether the value is absent, or an empty set.
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::StringSet(set) => set.is_empty(),
            Self::NumberSet(set) => set.is_empty(),
            Self::BinarySet(set) => set.is_empty(),
            _ => false,
        }
    }

    /// The text, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// The number, if this is a number.
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(value) => Some(value),
            _ => None,
        }
    }

    /// The number as an `i64`, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(Number::to_i64)
    }

    /// The boolean, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The bytes, if this is binary.
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(value) => Some(value),
            _ => None,
        }
    }

    /// The entries, if this is a map.
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(value) => Some(value),
            _ => None,
        }
    }

    /// The elements, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(value) => Some(value),
            _ => None,
        }
    }

    /// Marshal using the natural wire type of the variant.
    ///
    /// Empty sets become the wire null, since DynamoDB rejects empty sets.
    pub fn into_wire(self) -> types::AttributeValue {
        match self {
            Self::Null => types::AttributeValue::Null(true),
            Self::Bool(value) => types::AttributeValue::Bool(value),
            Self::String(value) => types::AttributeValue::S(value),
            Self::Number(value) => types::AttributeValue::N(value.to_string()),
            Self::Binary(value) => types::AttributeValue::B(primitives::Blob::new(value)),
            Self::DateTime(value) => types::AttributeValue::S(format_datetime(&value)),
            Self::StringSet(set) if set.is_empty() => types::AttributeValue::Null(true),
            Self::NumberSet(set) if set.is_empty() => types::AttributeValue::Null(true),
            Self::BinarySet(set) if set.is_empty() => types::AttributeValue::Null(true),
            Self::StringSet(set) => types::AttributeValue::Ss(set.into_iter().collect()),
            Self::NumberSet(set) => {
                types::AttributeValue::Ns(set.iter().map(Number::to_string).collect())
            }
            Self::BinarySet(set) => {
                types::AttributeValue::Bs(set.into_iter().map(primitives::Blob::new).collect())
            }
            Self::List(values) => {
                types::AttributeValue::L(values.into_iter().map(Self::into_wire).collect())
            }
            Self::Map(values) => types::AttributeValue::M(
                values
                    .into_iter()
                    .map(|(name, value)| (name, value.into_wire()))
                    .collect(),
            ),
        }
    }

    /// Unmarshal using the wire type tag alone.
    pub fn from_wire(value: &types::AttributeValue) -> Result<Self> {
        let value = match value {
            types::AttributeValue::Null(_) => Self::Null,
            types::AttributeValue::Bool(value) => Self::Bool(*value),
            types::AttributeValue::S(value) => Self::String(value.clone()),
            types::AttributeValue::N(value) => Self::Number(value.parse()?),
            types::AttributeValue::B(value) => Self::Binary(value.as_ref().to_vec()),
            types::AttributeValue::Ss(values) => Self::StringSet(values.iter().cloned().collect()),
            types::AttributeValue::Ns(values) => Self::NumberSet(
                values
                    .iter()
                    .map(|value| value.parse())
                    .collect::<Result<_>>()?,
            ),
            types::AttributeValue::Bs(values) => Self::BinarySet(
                values.iter().map(|value| value.as_ref().to_vec()).collect(),
            ),
            types::AttributeValue::L(values) => Self::List(
                values.iter().map(Self::from_wire).collect::<Result<_>>()?,
            ),
            types::AttributeValue::M(values) => Self::Map(
                values
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), Self::from_wire(value)?)))
                    .collect::<Result<_>>()?,
            ),
            _ => {
                return Err(Error::Serialization(
                    "unsupported attribute value type".to_string(),
                ));
            }
        };
        Ok(value)
    }

    /// Build a value from any serializable type.
    ///
    /// ```rust
    /// use dynamodb_mapper::attribute::value::Value;
    ///
    /// let value = Value::from_serialize(vec![1, 2]).unwrap();
    /// assert_eq!(value, Value::List(vec![Value::from(1), Value::from(2)]));
    /// ```
    pub fn from_serialize<T: Serialize>(value: T) -> Result<Self> {
        let wire: types::AttributeValue = serde_dynamo::to_attribute_value(value)?;
        Self::from_wire(&wire)
    }

    /// Convert the value into any deserializable type.
    pub fn deserialize_into<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_dynamo::from_attribute_value(self.into_wire())?)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Self::Number(value)
    }
}

macro_rules! impl_from_integer {
    ($($integer:ty),*) => {
        $(
            impl From<$integer> for Value {
                fn from(value: $integer) -> Self {
                    Self::Number(Number::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Binary(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<collections::BTreeSet<String>> for Value {
    fn from(value: collections::BTreeSet<String>) -> Self {
        Self::StringSet(value)
    }
}

impl From<collections::BTreeSet<Number>> for Value {
    fn from(value: collections::BTreeSet<Number>) -> Self {
        Self::NumberSet(value)
    }
}

impl From<collections::BTreeSet<Vec<u8>>> for Value {
    fn from(value: collections::BTreeSet<Vec<u8>>) -> Self {
        Self::BinarySet(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(value: IndexMap<String, Value>) -> Self {
        Self::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

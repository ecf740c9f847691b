use crate::{
    attribute::{Attribute, value::Value},
    common::{ExpressionInput, Placeholders, path::Path},
    error::{Error, Result},
    schema::Schema,
};

use aws_sdk_dynamodb::types;
use std::ops;

/// Logical operator for combining conditions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogicalOperator {
    /// Logical AND - all conditions must be true.
    And,
    /// Logical OR - at least one condition must be true.
    Or,
}

impl ops::Deref for LogicalOperator {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// Comparison operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Comparator {
    /// `=`
    Equals,
    /// `<>`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

impl ops::Deref for Comparator {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Equals => "=",
            Self::NotEqual => "<>",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// A literal, marshalled with the descriptor of the compared path.
    Value(Value),
    /// Another attribute.
    Path(Path),
    /// Size of another attribute.
    Size(Path),
}

/// Condition expression tree, used for conditional writes, filters and key conditions.
///
/// Conditions are usually built from a [`Path`]:
///
/// ```rust
/// use dynamodb_mapper::common::{condition::Condition, path::Path};
///
/// let condition = Path::new("balance").ge(50).and(Path::new("status").exists());
/// assert!(matches!(condition, Condition::Logical(..)));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// `path <op> operand`
    Compare(Path, Comparator, Operand),
    /// `size(path) <op> operand`
    CompareSize(Path, Comparator, Operand),
    /// `path BETWEEN low AND high`
    Between(Path, Value, Value),
    /// `path IN (values)`
    In(Path, Vec<Value>),
    /// `attribute_exists(path)`
    Exists(Path),
    /// `attribute_not_exists(path)`
    NotExists(Path),
    /// `begins_with(path, prefix)`
    BeginsWith(Path, Value),
    /// `contains(path, value)`; for sets the value is a single element.
    Contains(Path, Value),
    /// `attribute_type(path, tag)`
    IsType(Path, String),
    /// Conjunction or disjunction of conditions.
    Logical(LogicalOperator, Vec<Condition>),
    /// Negation.
    Not(Box<Condition>),
}

impl Path {
    fn compare(self, comparator: Comparator, value: impl Into<Value>) -> Condition {
        Condition::Compare(self, comparator, Operand::Value(value.into()))
    }

    /// `path = value`
    pub fn eq(self, value: impl Into<Value>) -> Condition {
        self.compare(Comparator::Equals, value)
    }

    /// `path <> value`
    pub fn ne(self, value: impl Into<Value>) -> Condition {
        self.compare(Comparator::NotEqual, value)
    }

    /// `path < value`
    pub fn lt(self, value: impl Into<Value>) -> Condition {
        self.compare(Comparator::LessThan, value)
    }

    /// `path <= value`
    pub fn le(self, value: impl Into<Value>) -> Condition {
        self.compare(Comparator::LessThanOrEqual, value)
    }

    /// `path > value`
    pub fn gt(self, value: impl Into<Value>) -> Condition {
        self.compare(Comparator::GreaterThan, value)
    }

    /// `path >= value`
    pub fn ge(self, value: impl Into<Value>) -> Condition {
        self.compare(Comparator::GreaterThanOrEqual, value)
    }

    /// `path BETWEEN low AND high`, inclusive.
    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Condition {
        Condition::Between(self, low.into(), high.into())
    }

    /// `path IN (values)`. An empty list fails to compile.
    pub fn is_in<I, V>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Condition::In(self, values.into_iter().map(Into::into).collect())
    }

    /// `attribute_exists(path)`
    pub fn exists(self) -> Condition {
        Condition::Exists(self)
    }

    /// `attribute_not_exists(path)`
    pub fn does_not_exist(self) -> Condition {
        Condition::NotExists(self)
    }

    /// `begins_with(path, prefix)`
    pub fn begins_with(self, prefix: impl Into<Value>) -> Condition {
        Condition::BeginsWith(self, prefix.into())
    }

    /// `contains(path, value)`
    pub fn contains(self, value: impl Into<Value>) -> Condition {
        Condition::Contains(self, value.into())
    }

    /// `attribute_type(path, tag)` with a wire type tag such as `S` or `NS`.
    pub fn is_type(self, tag: impl Into<String>) -> Condition {
        Condition::IsType(self, tag.into())
    }
}

impl Condition {
    /// Conjunction with `other`. Nested conjunctions are flattened.
    pub fn and(self, other: Condition) -> Self {
        self.combine(LogicalOperator::And, other)
    }

    /// Disjunction with `other`. Nested disjunctions are flattened.
    pub fn or(self, other: Condition) -> Self {
        self.combine(LogicalOperator::Or, other)
    }

    fn combine(self, operator: LogicalOperator, other: Condition) -> Self {
        match self {
            Self::Logical(own, mut conditions) if own == operator => {
                conditions.push(other);
                Self::Logical(own, conditions)
            }
            condition => Self::Logical(operator, vec![condition, other]),
        }
    }

    /// Conjunction of all `conditions`, `None` when empty.
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Option<Self> {
        let mut conditions: Vec<_> = conditions.into_iter().collect();
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Self::Logical(LogicalOperator::And, conditions)),
        }
    }

    /// Compile against the placeholder tables of a request.
    ///
    /// Literal values are marshalled with the schema descriptor of the compared path when one
    /// exists, and by their natural wire type otherwise.
    pub fn compile(
        &self,
        schema: Option<&Schema>,
        placeholders: &mut Placeholders,
    ) -> Result<String> {
        let descriptor = |path: &Path| schema.and_then(|schema| schema.descriptor_for(path));
        let expression = match self {
            Self::Compare(path, comparator, operand) => {
                let left = path.compile(placeholders);
                let right = compile_operand(descriptor(path), operand, placeholders)?;
                format!("{left} {} {right}", &**comparator)
            }
            Self::CompareSize(path, comparator, operand) => {
                let left = path.compile(placeholders);
                let right = compile_operand(None, operand, placeholders)?;
                format!("size({left}) {} {right}", &**comparator)
            }
            Self::Between(path, low, high) => {
                let left = path.compile(placeholders);
                let low = compile_value(descriptor(path), low, placeholders)?;
                let high = compile_value(descriptor(path), high, placeholders)?;
                format!("{left} BETWEEN {low} AND {high}")
            }
            Self::In(path, values) => {
                if values.is_empty() {
                    return Err(Error::Validation(format!(
                        "IN condition on {path} needs at least one value"
                    )));
                }
                let left = path.compile(placeholders);
                let values = values
                    .iter()
                    .map(|value| compile_value(descriptor(path), value, placeholders))
                    .collect::<Result<Vec<_>>>()?;
                format!("{left} IN ({})", values.join(", "))
            }
            Self::Exists(path) => format!("attribute_exists({})", path.compile(placeholders)),
            Self::NotExists(path) => {
                format!("attribute_not_exists({})", path.compile(placeholders))
            }
            Self::BeginsWith(path, prefix) => {
                let left = path.compile(placeholders);
                let right = compile_value(descriptor(path), prefix, placeholders)?;
                format!("begins_with({left}, {right})")
            }
            Self::Contains(path, value) => {
                let left = path.compile(placeholders);
                let wire = match descriptor(path) {
                    Some(attribute) => attribute.serialize_element(value)?,
                    None => value.clone().into_wire(),
                };
                let right = placeholders.value(wire);
                format!("contains({left}, {right})")
            }
            Self::IsType(path, tag) => {
                let left = path.compile(placeholders);
                let right = placeholders.value(types::AttributeValue::S(tag.clone()));
                format!("attribute_type({left}, {right})")
            }
            Self::Logical(operator, conditions) => match conditions.as_slice() {
                [] => {
                    return Err(Error::Validation(
                        "logical condition needs at least one operand".to_string(),
                    ));
                }
                [condition] => condition.compile(schema, placeholders)?,
                conditions => {
                    let expressions = conditions
                        .iter()
                        .map(|condition| condition.compile(schema, placeholders))
                        .collect::<Result<Vec<_>>>()?;
                    format!("({})", expressions.join(&**operator))
                }
            },
            Self::Not(condition) => format!("(NOT {})", condition.compile(schema, placeholders)?),
        };
        Ok(expression)
    }

    /// Compile into a standalone expression with its own placeholder tables.
    pub fn to_expression(&self, schema: Option<&Schema>) -> Result<ExpressionInput> {
        let mut placeholders = Placeholders::default();
        let expression = self.compile(schema, &mut placeholders)?;
        Ok(ExpressionInput::new(expression, &placeholders))
    }
}

impl ops::Not for Condition {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}

impl Path {
    /// `size(path)`, usable as an operand of [`Condition::CompareSize`] or a comparison.
    pub fn size(self) -> Operand {
        Operand::Size(self)
    }
}

fn compile_value(
    descriptor: Option<&Attribute>,
    value: &Value,
    placeholders: &mut Placeholders,
) -> Result<String> {
    let wire = match descriptor {
        Some(attribute) => attribute
            .serialize(value)?
            .unwrap_or(types::AttributeValue::Null(true)),
        None => value.clone().into_wire(),
    };
    Ok(placeholders.value(wire))
}

fn compile_operand(
    descriptor: Option<&Attribute>,
    operand: &Operand,
    placeholders: &mut Placeholders,
) -> Result<String> {
    match operand {
        Operand::Value(value) => compile_value(descriptor, value, placeholders),
        Operand::Path(path) => Ok(path.compile(placeholders)),
        Operand::Size(path) => Ok(format!("size({})", path.compile(placeholders))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use aws_sdk_dynamodb::primitives;
    use rstest::rstest;
    use std::collections;

    fn schema() -> Schema {
        Schema::builder("Account", "accounts")
            .attribute(Attribute::string("id").hash_key())
            .attribute(Attribute::number("balance"))
            .attribute(Attribute::string_set("tags"))
            .attribute(Attribute::binary("payload").legacy_encoding())
            .attribute(Attribute::list_of("scores", Attribute::number("score")))
            .build()
            .unwrap()
    }

    #[rstest]
    #[case::equals(
        Path::new("id").eq("a"),
        ExpressionInput {
            expression: "#0 = :0".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#0".to_string(), "id".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (":0".to_string(), types::AttributeValue::S("a".to_string())),
                ]
            ),
        }
    )]
    #[case::between(
        Path::new("balance").between(1, 10),
        ExpressionInput {
            expression: "#0 BETWEEN :0 AND :1".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#0".to_string(), "balance".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (":0".to_string(), types::AttributeValue::N("1".to_string())),
                    (":1".to_string(), types::AttributeValue::N("10".to_string())),
                ]
            ),
        }
    )]
    #[case::in_deduplicates(
        Path::new("id").is_in(["a", "b", "a"]),
        ExpressionInput {
            expression: "#0 IN (:0, :1, :0)".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#0".to_string(), "id".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (":0".to_string(), types::AttributeValue::S("a".to_string())),
                    (":1".to_string(), types::AttributeValue::S("b".to_string())),
                ]
            ),
        }
    )]
    #[case::not_exists(
        Path::new("version").does_not_exist(),
        ExpressionInput {
            expression: "attribute_not_exists(#0)".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#0".to_string(), "version".to_string()),
                ]
            ),
            ..Default::default()
        }
    )]
    #[case::contains_set_element(
        Path::new("tags").contains("red"),
        ExpressionInput {
            expression: "contains(#0, :0)".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#0".to_string(), "tags".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (":0".to_string(), types::AttributeValue::S("red".to_string())),
                ]
            ),
        }
    )]
    #[case::legacy_binary(
        Path::new("payload").eq(b"\x00\x01".as_slice()),
        ExpressionInput {
            expression: "#0 = :0".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#0".to_string(), "payload".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (":0".to_string(), types::AttributeValue::B(primitives::Blob::new("AAE="))),
                ]
            ),
        }
    )]
    #[case::nested_logical(
        Path::new("balance")
            .ge(50)
            .and(Path::new("id").begins_with("user").or(Path::new("tags").exists()))
            .and(!Path::new("scores").index(0).gt(3)),
        ExpressionInput {
            expression: "(#0 >= :0 AND (begins_with(#1, :1) OR attribute_exists(#2)) AND (NOT #3[0] > :2))".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#0".to_string(), "balance".to_string()),
                    ("#1".to_string(), "id".to_string()),
                    ("#2".to_string(), "tags".to_string()),
                    ("#3".to_string(), "scores".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (":0".to_string(), types::AttributeValue::N("50".to_string())),
                    (":1".to_string(), types::AttributeValue::S("user".to_string())),
                    (":2".to_string(), types::AttributeValue::N("3".to_string())),
                ]
            ),
        }
    )]
    #[case::size(
        Condition::CompareSize(
            Path::new("tags"),
            Comparator::LessThan,
            Operand::Value(Value::from(3)),
        ),
        ExpressionInput {
            expression: "size(#0) < :0".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#0".to_string(), "tags".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (":0".to_string(), types::AttributeValue::N("3".to_string())),
                ]
            ),
        }
    )]
    #[case::compare_paths(
        Condition::Compare(
            Path::new("balance"),
            Comparator::NotEqual,
            Operand::Path(Path::new("limit")),
        ),
        ExpressionInput {
            expression: "#0 <> #1".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#0".to_string(), "balance".to_string()),
                    ("#1".to_string(), "limit".to_string()),
                ]
            ),
            ..Default::default()
        }
    )]
    fn test_compile(#[case] condition: Condition, #[case] expected: ExpressionInput) {
        let schema = schema();
        let compiled = condition.to_expression(Some(&schema)).unwrap();
        assert_eq!(compiled, expected);
        // compiling twice yields the same expression
        assert_eq!(condition.to_expression(Some(&schema)).unwrap(), expected);
    }

    #[rstest]
    #[case::empty_in(Path::new("id").is_in(Vec::<Value>::new()))]
    #[case::empty_logical(Condition::Logical(LogicalOperator::Or, vec![]))]
    #[case::type_mismatch(Path::new("balance").eq("fifty"))]
    #[case::set_element_mismatch(Path::new("tags").contains(3))]
    fn test_compile_error(#[case] condition: Condition) {
        assert!(condition.to_expression(Some(&schema())).is_err());
    }

    #[test]
    fn test_all() {
        assert_eq!(Condition::all(vec![]), None);
        assert_eq!(
            Condition::all(vec![Path::new("a").exists()]),
            Some(Path::new("a").exists())
        );
    }
}

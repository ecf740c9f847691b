use crate::{
    attribute::value::Value,
    common::{Placeholders, condition::Condition, path::Path},
    error::{Error, TransportError, codes},
    record::Record,
    schema::Schema,
    write::update_item::{SetInput, UpdateAction},
};

use aws_sdk_dynamodb::types;
use std::collections;

/// Processed write parameters, ready to be sent.
///
/// Holds the compiled condition expression and the placeholder tables shared with the
/// update expression, if any.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteInput {
    /// Compiled condition expression.
    pub condition_expression: Option<String>,
    /// Placeholder to attribute name.
    pub expression_attribute_names: Option<collections::HashMap<String, String>>,
    /// Placeholder to value.
    pub expression_attribute_values: Option<collections::HashMap<String, types::AttributeValue>>,
    /// Whether to return the consumed capacity.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// Whether to return item collection metrics.
    pub return_item_collection_metrics: Option<types::ReturnItemCollectionMetrics>,
    /// Which item attributes to return.
    pub return_values: Option<types::ReturnValue>,
    /// Which item attributes to return when the condition fails.
    pub return_values_on_condition_check_failure:
        Option<types::ReturnValuesOnConditionCheckFailure>,
    /// Target table.
    pub table_name: String,
}

impl WriteInput {
    pub(crate) fn new(
        schema: &Schema,
        write_args: &WriteArgs,
        condition_expression: Option<String>,
        placeholders: &Placeholders,
    ) -> Self {
        Self {
            condition_expression,
            expression_attribute_names: placeholders.expression_attribute_names(),
            expression_attribute_values: placeholders.expression_attribute_values(),
            return_consumed_capacity: write_args.return_consumed_capacity.clone(),
            return_item_collection_metrics: write_args.return_item_collection_metrics.clone(),
            return_values: write_args.return_values.clone(),
            return_values_on_condition_check_failure: write_args
                .return_values_on_condition_check_failure
                .clone(),
            table_name: schema.table_name().to_string(),
        }
    }
}

/// Arguments common to all write operations (Put, Update, Delete).
///
/// The table comes from the schema of the written record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteArgs {
    /// Condition expression that must be true for the operation to succeed.
    ///
    /// For versioned schemas the version condition is appended to it.
    pub condition: Option<Condition>,
    /// Skip the version condition. The version is still incremented.
    pub skip_version_condition: bool,
    /// Whether to return the consumed capacity information.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// Whether to return item collection metrics.
    pub return_item_collection_metrics: Option<types::ReturnItemCollectionMetrics>,
    /// Which item attributes to return in the response.
    ///
    /// Ignored inside transactions.
    pub return_values: Option<types::ReturnValue>,
    /// Which item attributes to return if a condition check fails.
    pub return_values_on_condition_check_failure:
        Option<types::ReturnValuesOnConditionCheckFailure>,
}

/// Optimistic-locking state of a record about to be written.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct VersionCheck {
    attribute: String,
    current: Option<i64>,
}

impl VersionCheck {
    /// Version state of `record`, `None` for schemas without a version attribute.
    pub(crate) fn of(record: &Record) -> Option<Self> {
        let attribute = record.schema().version_attribute()?;
        Some(Self {
            attribute: attribute.name().to_string(),
            current: record.version(),
        })
    }

    pub(crate) fn attribute(&self) -> &str {
        &self.attribute
    }

    /// The stored version must still be the one last seen, or absent for new records.
    pub(crate) fn condition(&self) -> Condition {
        let path = Path::new(&self.attribute);
        match self.current {
            Some(current) => path.eq(current),
            None => path.does_not_exist(),
        }
    }

    /// Version written by a successful save or update.
    pub(crate) fn next(&self) -> i64 {
        self.current.map_or(1, |current| current + 1)
    }

    /// Update action bumping the stored version.
    pub(crate) fn action(&self) -> UpdateAction {
        let path = Path::new(&self.attribute);
        match self.current {
            Some(_) => UpdateAction::Add(path, Value::from(1)),
            None => UpdateAction::Set(path, SetInput::Assign(Value::from(1))),
        }
    }
}

/// User condition and version condition, joined with AND.
pub(crate) fn merge_conditions(
    write_args: &WriteArgs,
    version: Option<&VersionCheck>,
) -> Option<Condition> {
    let version = version
        .filter(|_| !write_args.skip_version_condition)
        .map(VersionCheck::condition);
    Condition::all(write_args.condition.clone().into_iter().chain(version))
}

/// Map a failed single-item write onto the mapper error.
pub(crate) fn write_error(cause: TransportError, wrap: fn(TransportError) -> Error) -> Error {
    if cause.is(codes::CONDITIONAL_CHECK_FAILED) {
        Error::ConditionCheckFailed(cause)
    } else {
        wrap(cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::attribute::Attribute;

    use rstest::rstest;
    use std::sync;

    fn record(version: Option<i64>) -> Record {
        let schema = sync::Arc::new(
            Schema::builder("Foo", "foo")
                .attribute(Attribute::number("bar").hash_key())
                .attribute(Attribute::version("version"))
                .build()
                .unwrap(),
        );
        let mut record = Record::new(&schema).with("bar", 21).unwrap();
        if let Some(version) = version {
            record.set("version", version).unwrap();
        }
        record
    }

    #[rstest]
    #[case::new(None, Path::new("version").does_not_exist(), 1)]
    #[case::saved(Some(3), Path::new("version").eq(3), 4)]
    fn test_version_check(
        #[case] version: Option<i64>,
        #[case] expected_condition: Condition,
        #[case] expected_next: i64,
    ) {
        let check = VersionCheck::of(&record(version)).unwrap();
        assert_eq!(check.condition(), expected_condition);
        assert_eq!(check.next(), expected_next);
    }

    #[rstest]
    #[case::both(
        WriteArgs {
            condition: Some(Path::new("bar").exists()),
            ..Default::default()
        },
        Some(Path::new("bar").exists().and(Path::new("version").eq(3)))
    )]
    #[case::skipped(
        WriteArgs {
            condition: Some(Path::new("bar").exists()),
            skip_version_condition: true,
            ..Default::default()
        },
        Some(Path::new("bar").exists())
    )]
    #[case::version_only(
        WriteArgs::default(),
        Some(Path::new("version").eq(3))
    )]
    fn test_merge_conditions(#[case] write_args: WriteArgs, #[case] expected: Option<Condition>) {
        let check = VersionCheck::of(&record(Some(3)));
        assert_eq!(merge_conditions(&write_args, check.as_ref()), expected);
    }

    #[test]
    fn test_write_error() {
        let error = write_error(
            TransportError::new(codes::CONDITIONAL_CHECK_FAILED, "The conditional request failed"),
            Error::Put,
        );
        assert!(matches!(error, Error::ConditionCheckFailed(_)));
        let error = write_error(TransportError::new(codes::VALIDATION, "bad"), Error::Put);
        assert!(matches!(error, Error::Put(_)));
    }
}

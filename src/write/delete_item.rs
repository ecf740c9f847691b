use crate::{
    Item,
    common::Placeholders,
    error::{Error, Result},
    record::{Record, RecordState},
    transport::{Request, Response, Transport},
    write,
};

/// Processed delete item request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeleteItemInput {
    /// Primary key of the deleted item.
    pub keys: Item,
    /// Condition, placeholder tables and return options.
    pub write_operation: write::common::WriteInput,
}

/// Delete item operation.
///
/// For versioned schemas the delete is conditioned on the last known version.
///
/// ```rust,no_run
/// use dynamodb_mapper::{record::Record, transport::Transport, write};
///
/// # async fn example(transport: &dyn Transport, record: &mut Record) -> dynamodb_mapper::error::Result<()> {
/// let delete_item = write::delete_item::DeleteItem {
///     record,
///     write_args: Default::default(),
/// };
/// delete_item.send(transport).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DeleteItem<'r> {
    /// The record to delete. Only its key and version are read.
    pub record: &'r mut Record,
    /// Additional write operation arguments (condition, return values, etc.).
    pub write_args: write::common::WriteArgs,
}

impl TryFrom<&DeleteItem<'_>> for DeleteItemInput {
    type Error = Error;

    fn try_from(delete_item: &DeleteItem<'_>) -> Result<Self> {
        let record = &*delete_item.record;
        let schema = record.schema();
        let keys = record.keys()?;
        let version = write::common::VersionCheck::of(record);
        let condition = write::common::merge_conditions(&delete_item.write_args, version.as_ref());
        let mut placeholders = Placeholders::default();
        let condition_expression = condition
            .map(|condition| condition.compile(Some(schema), &mut placeholders))
            .transpose()?;
        let write_operation = write::common::WriteInput::new(
            schema,
            &delete_item.write_args,
            condition_expression,
            &placeholders,
        );
        let operation = Self {
            keys,
            write_operation,
        };
        Ok(operation)
    }
}

impl DeleteItem<'_> {
    /// Execute the delete item operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.delete_item", skip_all, err)
    )]
    pub async fn send(self, transport: &dyn Transport) -> Result<Option<Item>> {
        let delete_item: DeleteItemInput = (&self).try_into()?;
        let attributes = match transport.request(Request::DeleteItem(delete_item)).await {
            Ok(Response::DeleteItem { attributes }) => attributes,
            Ok(_) => return Err(Error::UnexpectedResponse { action: "DeleteItem" }),
            Err(cause) => return Err(write::common::write_error(cause, Error::Delete)),
        };
        self.record.mark(RecordState::Deleted);
        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        attribute::Attribute, common::path::Path, schema::Schema, write::common::WriteArgs,
    };

    use aws_sdk_dynamodb::types;
    use rstest::rstest;
    use std::{collections, sync};

    fn record(version: Option<i64>) -> Record {
        let schema = sync::Arc::new(
            Schema::builder("Order", "orders")
                .attribute(Attribute::string("customer").hash_key())
                .attribute(Attribute::number("placed_at").range_key())
                .attribute(Attribute::version("version"))
                .build()
                .unwrap(),
        );
        let mut record = Record::new(&schema)
            .with("customer", "c1")
            .unwrap()
            .with("placed_at", 100)
            .unwrap();
        if let Some(version) = version {
            record.set("version", version).unwrap();
        }
        record
    }

    fn keys() -> Item {
        collections::HashMap::from([
            ("customer".to_string(), types::AttributeValue::S("c1".to_string())),
            ("placed_at".to_string(), types::AttributeValue::N("100".to_string())),
        ])
    }

    #[rstest]
    #[case::unsaved(
        None,
        WriteArgs::default(),
        DeleteItemInput {
            keys: keys(),
            write_operation: write::common::WriteInput {
                condition_expression: Some("attribute_not_exists(#0)".to_string()),
                expression_attribute_names: Some(
                    collections::HashMap::from(
                        [
                            ("#0".to_string(), "version".to_string()),
                        ]
                    )
                ),
                table_name: "orders".to_string(),
                ..Default::default()
            },
        }
    )]
    #[case::saved_with_condition(
        Some(2),
        WriteArgs {
            condition: Some(Path::new("placed_at").lt(200)),
            return_values: Some(types::ReturnValue::AllOld),
            ..Default::default()
        },
        DeleteItemInput {
            keys: keys(),
            write_operation: write::common::WriteInput {
                condition_expression: Some("(#0 < :0 AND #1 = :1)".to_string()),
                expression_attribute_names: Some(
                    collections::HashMap::from(
                        [
                            ("#0".to_string(), "placed_at".to_string()),
                            ("#1".to_string(), "version".to_string()),
                        ]
                    )
                ),
                expression_attribute_values: Some(
                    collections::HashMap::from(
                        [
                            (":0".to_string(), types::AttributeValue::N("200".to_string())),
                            (":1".to_string(), types::AttributeValue::N("2".to_string())),
                        ]
                    )
                ),
                return_values: Some(types::ReturnValue::AllOld),
                table_name: "orders".to_string(),
                ..Default::default()
            },
        }
    )]
    #[case::skip_version_condition(
        Some(2),
        WriteArgs {
            skip_version_condition: true,
            ..Default::default()
        },
        DeleteItemInput {
            keys: keys(),
            write_operation: write::common::WriteInput {
                table_name: "orders".to_string(),
                ..Default::default()
            },
        }
    )]
    fn test_delete_item(
        #[case] version: Option<i64>,
        #[case] write_args: WriteArgs,
        #[case] expected: DeleteItemInput,
    ) {
        let mut record = record(version);
        let delete_item = DeleteItem {
            record: &mut record,
            write_args,
        };
        let actual: DeleteItemInput = (&delete_item).try_into().unwrap();
        assert_eq!(actual, expected);
    }
}

use crate::{
    Item,
    common::Placeholders,
    error::{Error, Result},
    record::{Record, RecordState},
    transport::{Request, Response, Transport},
    write,
};

use aws_sdk_dynamodb::types;

/// Processed put item request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PutItemInput {
    /// The full item, version included.
    pub item: Item,
    /// Condition, placeholder tables and return options.
    pub write_operation: write::common::WriteInput,
}

/// Put item operation.
///
/// Replaces the whole stored item with the record. For versioned schemas the item carries the
/// next version and the write is conditioned on the last known one.
///
/// ```rust,no_run
/// use dynamodb_mapper::{record::Record, transport::Transport, write};
///
/// # async fn example(transport: &dyn Transport, record: &mut Record) -> dynamodb_mapper::error::Result<()> {
/// let put_item = write::put_item::PutItem {
///     record,
///     write_args: Default::default(),
/// };
/// put_item.send(transport).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PutItem<'r> {
    /// The record to write.
    pub record: &'r mut Record,
    /// Additional write operation arguments (condition, return values, etc.).
    pub write_args: write::common::WriteArgs,
}

impl TryFrom<&PutItem<'_>> for PutItemInput {
    type Error = Error;

    fn try_from(put_item: &PutItem<'_>) -> Result<Self> {
        let record = &*put_item.record;
        let schema = record.schema();
        let mut item = record.serialize()?;
        let version = write::common::VersionCheck::of(record);
        if let Some(version) = &version {
            item.insert(
                version.attribute().to_string(),
                types::AttributeValue::N(version.next().to_string()),
            );
        }
        let condition = write::common::merge_conditions(&put_item.write_args, version.as_ref());
        let mut placeholders = Placeholders::default();
        let condition_expression = condition
            .map(|condition| condition.compile(Some(schema), &mut placeholders))
            .transpose()?;
        let write_operation = write::common::WriteInput::new(
            schema,
            &put_item.write_args,
            condition_expression,
            &placeholders,
        );
        let operation = Self {
            item,
            write_operation,
        };
        Ok(operation)
    }
}

impl PutItem<'_> {
    /// Execute the put item operation.
    ///
    /// The local version is advanced only once the write is confirmed.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.put_item", skip_all, err)
    )]
    pub async fn send(self, transport: &dyn Transport) -> Result<Option<Item>> {
        let put_item: PutItemInput = (&self).try_into()?;
        let next_version = write::common::VersionCheck::of(self.record).map(|version| version.next());
        let attributes = match transport.request(Request::PutItem(put_item)).await {
            Ok(Response::PutItem { attributes }) => attributes,
            Ok(_) => return Err(Error::UnexpectedResponse { action: "PutItem" }),
            Err(cause) => return Err(write::common::write_error(cause, Error::Put)),
        };
        if let Some(version) = next_version {
            self.record.set_version(version);
        }
        self.record.mark(RecordState::Saved);
        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        attribute::Attribute,
        common::path::Path,
        schema::Schema,
        write::common::WriteArgs,
    };

    use rstest::rstest;
    use std::{collections, sync};

    fn record(versioned: bool, version: Option<i64>) -> Record {
        let builder = Schema::builder("User", "users")
            .attribute(Attribute::string("id").hash_key())
            .attribute(Attribute::string("name").nullable());
        let builder = if versioned {
            builder.attribute(Attribute::version("version"))
        } else {
            builder
        };
        let schema = sync::Arc::new(builder.build().unwrap());
        let mut record = Record::new(&schema)
            .with("id", "1")
            .unwrap()
            .with("name", "John")
            .unwrap();
        if let Some(version) = version {
            record.set("version", version).unwrap();
        }
        record
    }

    #[rstest]
    #[case::plain(
        false,
        None,
        WriteArgs::default(),
        PutItemInput {
            item: collections::HashMap::from(
                [
                    ("id".to_string(), types::AttributeValue::S("1".to_string())),
                    ("name".to_string(), types::AttributeValue::S("John".to_string())),
                ]
            ),
            write_operation: write::common::WriteInput {
                table_name: "users".to_string(),
                ..Default::default()
            },
        }
    )]
    #[case::user_condition(
        false,
        None,
        WriteArgs {
            condition: Some(Path::new("id").does_not_exist()),
            return_values: Some(types::ReturnValue::AllOld),
            ..Default::default()
        },
        PutItemInput {
            item: collections::HashMap::from(
                [
                    ("id".to_string(), types::AttributeValue::S("1".to_string())),
                    ("name".to_string(), types::AttributeValue::S("John".to_string())),
                ]
            ),
            write_operation: write::common::WriteInput {
                condition_expression: Some("attribute_not_exists(#0)".to_string()),
                expression_attribute_names: Some(
                    collections::HashMap::from(
                        [
                            ("#0".to_string(), "id".to_string()),
                        ]
                    )
                ),
                return_values: Some(types::ReturnValue::AllOld),
                table_name: "users".to_string(),
                ..Default::default()
            },
        }
    )]
    #[case::first_version(
        true,
        None,
        WriteArgs::default(),
        PutItemInput {
            item: collections::HashMap::from(
                [
                    ("id".to_string(), types::AttributeValue::S("1".to_string())),
                    ("name".to_string(), types::AttributeValue::S("John".to_string())),
                    ("version".to_string(), types::AttributeValue::N("1".to_string())),
                ]
            ),
            write_operation: write::common::WriteInput {
                condition_expression: Some("attribute_not_exists(#0)".to_string()),
                expression_attribute_names: Some(
                    collections::HashMap::from(
                        [
                            ("#0".to_string(), "version".to_string()),
                        ]
                    )
                ),
                table_name: "users".to_string(),
                ..Default::default()
            },
        }
    )]
    #[case::next_version(
        true,
        Some(7),
        WriteArgs::default(),
        PutItemInput {
            item: collections::HashMap::from(
                [
                    ("id".to_string(), types::AttributeValue::S("1".to_string())),
                    ("name".to_string(), types::AttributeValue::S("John".to_string())),
                    ("version".to_string(), types::AttributeValue::N("8".to_string())),
                ]
            ),
            write_operation: write::common::WriteInput {
                condition_expression: Some("#0 = :0".to_string()),
                expression_attribute_names: Some(
                    collections::HashMap::from(
                        [
                            ("#0".to_string(), "version".to_string()),
                        ]
                    )
                ),
                expression_attribute_values: Some(
                    collections::HashMap::from(
                        [
                            (":0".to_string(), types::AttributeValue::N("7".to_string())),
                        ]
                    )
                ),
                table_name: "users".to_string(),
                ..Default::default()
            },
        }
    )]
    fn test_put_item(
        #[case] versioned: bool,
        #[case] version: Option<i64>,
        #[case] write_args: WriteArgs,
        #[case] expected: PutItemInput,
    ) {
        let mut record = record(versioned, version);
        let put_item = PutItem {
            record: &mut record,
            write_args,
        };
        let actual: PutItemInput = (&put_item).try_into().unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_put_item_missing_key() {
        let schema = sync::Arc::new(
            Schema::builder("User", "users")
                .attribute(Attribute::string("id").hash_key())
                .build()
                .unwrap(),
        );
        let mut record = Record::new(&schema);
        let put_item = PutItem {
            record: &mut record,
            write_args: WriteArgs::default(),
        };
        assert!(PutItemInput::try_from(&put_item).is_err());
    }
}

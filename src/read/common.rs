use crate::{
    Item,
    common::{Placeholders, condition::Condition, path::Path, selection::Selection},
    error::{Error, Result},
    record::Record,
    schema::{Schema, registry::Registry},
};

use aws_sdk_dynamodb::types;
use std::{collections, sync};

/// Processed single-item read parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SingleReadInput {
    /// Whether to use a strongly consistent read.
    pub consistent_read: Option<bool>,
    /// Placeholder to attribute name, for the projection.
    pub expression_attribute_names: Option<collections::HashMap<String, String>>,
    /// Compiled projection expression.
    pub projection_expression: Option<String>,
    /// Whether to return the consumed capacity.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// Table to read from.
    pub table_name: String,
}

/// Arguments for single-item read operations (GetItem).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SingleReadArgs {
    /// Whether to use a consistent read.
    ///
    /// `true` for strongly consistent reads, `false` or `None` for eventually consistent reads.
    pub consistent_read: Option<bool>,
    /// Which attributes to retrieve (projection expression).
    ///
    /// If `None`, all attributes are retrieved.
    pub selection: Option<Selection>,
    /// Whether to return the consumed capacity information.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
}

impl SingleReadInput {
    pub(crate) fn new(schema: &Schema, single_read_args: &SingleReadArgs) -> Self {
        let (expression_attribute_names, projection_expression) =
            match &single_read_args.selection {
                Some(selection) => {
                    let mut placeholders = Placeholders::default();
                    let projection_expression = selection.compile(&mut placeholders);
                    (
                        placeholders.expression_attribute_names(),
                        Some(projection_expression),
                    )
                }
                None => (None, None),
            };
        Self {
            consistent_read: single_read_args.consistent_read,
            expression_attribute_names,
            projection_expression,
            return_consumed_capacity: single_read_args.return_consumed_capacity.clone(),
            table_name: schema.table_name().to_string(),
        }
    }
}

/// Processed multiple-item read parameters, shared by Query and Scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultipleReadInput {
    /// Whether to use a strongly consistent read.
    pub consistent_read: Option<bool>,
    /// Key of the item after which the page starts.
    pub exclusive_start_key: Option<Item>,
    /// Placeholder to attribute name.
    pub expression_attribute_names: Option<collections::HashMap<String, String>>,
    /// Placeholder to value.
    pub expression_attribute_values: Option<collections::HashMap<String, types::AttributeValue>>,
    /// Compiled filter expression.
    pub filter_expression: Option<String>,
    /// Index to read instead of the table.
    pub index_name: Option<String>,
    /// Items evaluated per page.
    pub limit: Option<i32>,
    /// Compiled projection expression.
    pub projection_expression: Option<String>,
    /// Whether to return the consumed capacity.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// Which attributes to return.
    pub select: Option<types::Select>,
    /// Table to read from.
    pub table_name: String,
}

/// Arguments for multiple-item read operations (Query, Scan).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultipleReadArgs {
    /// Filter applied by the service after reading.
    ///
    /// Reads of a subtype additionally filter on the discriminator tags of the subtype.
    pub filter: Option<Condition>,
    /// Whether to use a consistent read.
    pub consistent_read: Option<bool>,
    /// Key of the item after which the read starts.
    ///
    /// Usually the `last_evaluated_key` of a previous cursor.
    pub exclusive_start_key: Option<Item>,
    /// The name of a global or local secondary index declared by the schema.
    pub index_name: Option<String>,
    /// Maximum number of records yielded across all pages.
    pub limit: Option<usize>,
    /// Items evaluated per page. Defaults to `limit` when only that is set.
    pub page_size: Option<i32>,
    /// Which attributes to return.
    pub select: Option<types::Select>,
    /// Which attributes to retrieve (projection expression).
    pub selection: Option<Selection>,
    /// Whether to return the consumed capacity information.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
}

impl MultipleReadArgs {
    /// Page size sent with each request.
    pub(crate) fn request_limit(&self) -> Option<i32> {
        self.page_size.or_else(|| {
            self.limit
                .map(|limit| i32::try_from(limit).unwrap_or(i32::MAX))
        })
    }
}

impl MultipleReadInput {
    /// Compile the filter and projection into `placeholders`, after anything already in it.
    pub(crate) fn compile(
        schema: &Schema,
        registry: &Registry,
        multiple_read_args: &MultipleReadArgs,
        placeholders: &mut Placeholders,
    ) -> Result<Self> {
        if let Some(index_name) = &multiple_read_args.index_name
            && schema.index(index_name).is_none()
        {
            return Err(Error::Validation(format!(
                "schema {} has no index named {index_name}",
                schema.name()
            )));
        }
        if multiple_read_args.limit == Some(0) {
            return Err(Error::Validation("limit must be positive".to_string()));
        }
        let filter = Condition::all(
            multiple_read_args
                .filter
                .clone()
                .into_iter()
                .chain(subtype_filter(schema, registry)),
        );
        let filter_expression = filter
            .map(|filter| filter.compile(Some(schema), placeholders))
            .transpose()?;
        let projection_expression = multiple_read_args
            .selection
            .as_ref()
            .map(|selection| selection.compile(placeholders));
        let operation = Self {
            consistent_read: multiple_read_args.consistent_read,
            exclusive_start_key: multiple_read_args.exclusive_start_key.clone(),
            expression_attribute_names: placeholders.expression_attribute_names(),
            expression_attribute_values: placeholders.expression_attribute_values(),
            filter_expression,
            index_name: multiple_read_args.index_name.clone(),
            limit: multiple_read_args.request_limit(),
            projection_expression,
            return_consumed_capacity: multiple_read_args.return_consumed_capacity.clone(),
            select: multiple_read_args.select.clone(),
            table_name: schema.table_name().to_string(),
        };
        Ok(operation)
    }
}

/// `discriminator IN (tags)` for reads of a subtype that shares its table with other schemas.
fn subtype_filter(schema: &Schema, registry: &Registry) -> Option<Condition> {
    if !registry.needs_subtype_filter(schema) {
        return None;
    }
    let attribute = schema.discriminator_attribute()?;
    Some(Path::new(attribute.name()).is_in(registry.subtype_tags(schema)))
}

/// Decode a read item, picking the subtype from its discriminator tag when the schema is
/// registered.
pub(crate) fn decode(registry: &Registry, schema: &sync::Arc<Schema>, item: &Item) -> Result<Record> {
    if schema.discriminator_attribute().is_some()
        && registry
            .schema(schema.table_name(), schema.name())
            .is_some()
    {
        registry.decode(schema.table_name(), item)
    } else {
        Record::from_item(schema, item)
    }
}

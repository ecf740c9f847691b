use crate::{
    attribute::{Attribute, value::Value},
    common::{
        Placeholders,
        condition::{Comparator, Condition, Operand},
        key::serialize_key,
    },
    error::{Error, Result},
    read::{self, cursor::Cursor},
    schema::{Schema, registry::Registry},
    transport::Transport,
};

use std::sync;

/// Processed query request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryInput {
    /// Compiled key condition, sharing the placeholder tables of the read operation.
    pub key_condition_expression: String,
    /// Table or index, filter, projection and paging.
    pub multiple_read_operation: read::common::MultipleReadInput,
    /// Whether to read the sort key in ascending order.
    pub scan_index_forward: Option<bool>,
}

/// Query operation.
///
/// Reads the items sharing a partition key, from the table or from one of the schema's
/// indexes, lazily through a [`Cursor`].
///
/// ```rust,no_run
/// use dynamodb_mapper::{
///     common::path::Path, read, schema::{Schema, registry::Registry}, transport::Transport,
/// };
/// use std::sync::Arc;
///
/// # async fn example(
/// #     transport: &dyn Transport,
/// #     registry: &Registry,
/// #     schema: Arc<Schema>,
/// # ) -> dynamodb_mapper::error::Result<()> {
/// let query = read::query::Query {
///     range_key_condition: Some(Path::new("created_at").ge(1_700_000_000)),
///     ..read::query::Query::new(schema, "user1")
/// };
/// let mut cursor = query.cursor(transport, registry)?;
/// while let Some(record) = cursor.next().await {
///     let record = record?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Query {
    /// Schema of the queried records.
    pub schema: sync::Arc<Schema>,
    /// Partition key value of the table, or of the index when one is named.
    pub hash_key: Value,
    /// Condition on the sort key: a comparison, `between` or `begins_with`.
    pub range_key_condition: Option<Condition>,
    /// Whether to read the sort key in ascending order.
    pub scan_index_forward: Option<bool>,
    /// Additional read operation arguments (index, filter, selection, limit, etc.).
    pub multiple_read_args: read::common::MultipleReadArgs,
}

impl Query {
    /// Query a partition of the table.
    pub fn new(schema: sync::Arc<Schema>, hash_key: impl Into<Value>) -> Self {
        Self {
            schema,
            hash_key: hash_key.into(),
            range_key_condition: None,
            scan_index_forward: None,
            multiple_read_args: Default::default(),
        }
    }

    /// Key attributes of the queried table or index.
    fn key_attributes(&self) -> Result<(&Attribute, Option<&Attribute>)> {
        match &self.multiple_read_args.index_name {
            Some(index_name) => {
                let index = self.schema.index(index_name).ok_or_else(|| {
                    Error::Validation(format!(
                        "schema {} has no index named {index_name}",
                        self.schema.name()
                    ))
                })?;
                Ok((index.hash_key(), index.sort_key()))
            }
            None => Ok((self.schema.hash_key(), self.schema.range_key())),
        }
    }

    fn check_range_key_condition(condition: &Condition, range_key: &Attribute) -> Result<()> {
        let path = match condition {
            Condition::Compare(path, comparator, Operand::Value(_))
                if *comparator != Comparator::NotEqual =>
            {
                path
            }
            Condition::Between(path, _, _) | Condition::BeginsWith(path, _) => path,
            _ => {
                return Err(Error::Validation(
                    "range key condition must be a comparison, between or begins_with".to_string(),
                ));
            }
        };
        if !path.is_top_level() || path.root() != range_key.name() {
            return Err(Error::Validation(format!(
                "range key condition must apply to {}, not {path}",
                range_key.name()
            )));
        }
        Ok(())
    }

    pub(crate) fn compile(&self, registry: &Registry) -> Result<QueryInput> {
        let (hash_key, range_key) = self.key_attributes()?;
        let mut placeholders = Placeholders::default();
        let hash_key_name = placeholders.name(hash_key.name());
        let hash_key_value = placeholders.value(serialize_key(hash_key, &self.hash_key)?);
        let mut key_condition_expression = format!("{hash_key_name} = {hash_key_value}");
        if let Some(condition) = &self.range_key_condition {
            let range_key = range_key.ok_or_else(|| {
                Error::Validation(format!(
                    "cannot use a range key condition: {} has no range key",
                    self.multiple_read_args
                        .index_name
                        .as_deref()
                        .unwrap_or(self.schema.table_name())
                ))
            })?;
            Self::check_range_key_condition(condition, range_key)?;
            let range_key_expression = condition.compile(Some(&self.schema), &mut placeholders)?;
            key_condition_expression.push_str(" AND ");
            key_condition_expression.push_str(&range_key_expression);
        }
        let multiple_read_operation = read::common::MultipleReadInput::compile(
            &self.schema,
            registry,
            &self.multiple_read_args,
            &mut placeholders,
        )?;
        let operation = QueryInput {
            key_condition_expression,
            multiple_read_operation,
            scan_index_forward: self.scan_index_forward,
        };
        Ok(operation)
    }

    /// Compile the query and open a cursor over its results.
    ///
    /// Compilation errors are raised here; no request is sent until the cursor is polled.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.query", skip_all, fields(schema = %self.schema.name()), err)
    )]
    pub fn cursor<'t>(
        self,
        transport: &'t dyn Transport,
        registry: &'t Registry,
    ) -> Result<Cursor<'t>> {
        let query = self.compile(registry)?;
        Ok(Cursor::query(
            transport,
            registry,
            self.schema,
            query,
            self.multiple_read_args.limit,
        ))
    }
}

use crate::{
    Item,
    common::{Placeholders, key::Keys, selection::Selection},
    error::{Error, Result},
    read,
    record::Record,
    schema::{Schema, registry::Registry},
    transport::{Request, Response, Transport},
};

use aws_sdk_dynamodb::types;
use std::{collections, sync};

/// Largest number of items DynamoDB accepts in a single TransactGetItems call.
pub const MAX_TRANSACT_ITEMS: usize = 100;

/// Processed get of one item of a read transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactGetItemInput {
    /// Primary key of the item.
    pub keys: Item,
    /// Placeholder to attribute name, for the projection.
    pub expression_attribute_names: Option<collections::HashMap<String, String>>,
    /// Compiled projection expression.
    pub projection_expression: Option<String>,
    /// Table to read from.
    pub table_name: String,
}

/// Processed read transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactGetItemsInput {
    /// Items, in enqueue order.
    pub items: Vec<TransactGetItemInput>,
    /// Whether to return the consumed capacity information.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
}

type Slot = sync::Arc<sync::OnceLock<Option<Record>>>;

/// Result of a get enqueued in a read transaction, available once the transaction committed.
#[derive(Clone, Debug)]
pub struct DeferredResult {
    table_name: String,
    slot: Slot,
}

impl DeferredResult {
    /// Whether the transaction committed.
    pub fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }

    /// The record read by the transaction.
    ///
    /// Fails with [`Error::InvalidState`] before the commit and with [`Error::DoesNotExist`]
    /// when the item was missing.
    pub fn get(&self) -> Result<&Record> {
        match self.slot.get() {
            None => Err(Error::InvalidState(
                "the transaction has not been committed".to_string(),
            )),
            Some(None) => Err(Error::DoesNotExist {
                table: self.table_name.clone(),
            }),
            Some(Some(record)) => Ok(record),
        }
    }
}

#[derive(Debug)]
struct PendingGet {
    schema: sync::Arc<Schema>,
    slot: Slot,
}

/// Read transaction.
///
/// Gets are enqueued synchronously and read together, from a single snapshot, by
/// [`TransactGet::commit`]. Each get hands back a [`DeferredResult`].
///
/// ```rust,no_run
/// use dynamodb_mapper::{
///     common::key::Keys,
///     read::transact_get::TransactGet,
///     schema::{Schema, registry::Registry},
///     transport::Transport,
/// };
/// use std::sync::Arc;
///
/// # async fn example(
/// #     transport: &dyn Transport,
/// #     registry: &Registry,
/// #     users: Arc<Schema>,
/// # ) -> dynamodb_mapper::error::Result<()> {
/// let mut transaction = TransactGet::new();
/// let alice = transaction.get(&users, &Keys::new("alice"))?;
/// let bob = transaction.get(&users, &Keys::new("bob"))?;
/// transaction.commit(transport, registry).await?;
/// println!("{:?} {:?}", alice.get()?.values(), bob.get().ok());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct TransactGet {
    items: Vec<TransactGetItemInput>,
    pending: Vec<PendingGet>,
    return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
}

impl TransactGet {
    /// Empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report consumed capacity.
    pub fn return_consumed_capacity(
        &mut self,
        return_consumed_capacity: types::ReturnConsumedCapacity,
    ) -> &mut Self {
        self.return_consumed_capacity = Some(return_consumed_capacity);
        self
    }

    /// Number of enqueued gets.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was enqueued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Enqueue a get of the whole item.
    pub fn get(&mut self, schema: &sync::Arc<Schema>, keys: &Keys) -> Result<DeferredResult> {
        self.get_selected(schema, keys, None)
    }

    /// Enqueue a get of some attributes of the item.
    pub fn get_selected(
        &mut self,
        schema: &sync::Arc<Schema>,
        keys: &Keys,
        selection: Option<&Selection>,
    ) -> Result<DeferredResult> {
        if self.items.len() == MAX_TRANSACT_ITEMS {
            return Err(Error::Validation(format!(
                "a transaction holds at most {MAX_TRANSACT_ITEMS} items"
            )));
        }
        let keys = keys.to_item(schema)?;
        let (expression_attribute_names, projection_expression) = match selection {
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
        self.items.push(TransactGetItemInput {
            keys,
            expression_attribute_names,
            projection_expression,
            table_name: schema.table_name().to_string(),
        });
        let slot = Slot::default();
        self.pending.push(PendingGet {
            schema: sync::Arc::clone(schema),
            slot: sync::Arc::clone(&slot),
        });
        Ok(DeferredResult {
            table_name: schema.table_name().to_string(),
            slot,
        })
    }

    fn input(&self) -> TransactGetItemsInput {
        TransactGetItemsInput {
            items: self.items.clone(),
            return_consumed_capacity: self.return_consumed_capacity.clone(),
        }
    }

    /// Read every enqueued item in one atomic request and resolve the deferred results.
    ///
    /// Nothing is resolved when the request fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.transact_get", skip_all, fields(items = self.items.len()), err)
    )]
    pub async fn commit(self, transport: &dyn Transport, registry: &Registry) -> Result<()> {
        if self.items.is_empty() {
            return Ok(());
        }
        let items = match transport
            .request(Request::TransactGetItems(self.input()))
            .await
        {
            Ok(Response::TransactGetItems { items }) => items,
            Ok(_) => {
                return Err(Error::UnexpectedResponse {
                    action: "TransactGetItems",
                });
            }
            Err(cause) => return Err(Error::TransactGet(cause)),
        };
        if items.len() != self.pending.len() {
            return Err(Error::UnexpectedResponse {
                action: "TransactGetItems",
            });
        }
        let mut records = Vec::with_capacity(items.len());
        for (pending, item) in self.pending.iter().zip(&items) {
            let record = item
                .as_ref()
                .map(|item| read::common::decode(registry, &pending.schema, item))
                .transpose()?;
            records.push(record);
        }
        for (pending, record) in self.pending.into_iter().zip(records) {
            // each slot is filled exactly once, by the only commit of its transaction
            let _ = pending.slot.set(record);
        }
        Ok(())
    }
}

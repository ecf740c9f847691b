use crate::{
    Item,
    common::{Placeholders, condition::Condition, key::Keys},
    error::{Error, Result},
    record::{Record, RecordState},
    schema::Schema,
    transport::{Request, Response, Transport},
    write::{self, delete_item, put_item, update_item},
};

use aws_sdk_dynamodb::types;

/// Largest number of items DynamoDB accepts in a single TransactWriteItems call.
pub const MAX_TRANSACT_ITEMS: usize = 100;

/// Processed condition check.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionCheckInput {
    /// Primary key of the checked item.
    pub keys: Item,
    /// Condition expression and placeholder tables. The condition is always set.
    pub write_operation: write::common::WriteInput,
}

/// One item of a write transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum TransactWriteItemInput {
    /// Replace an item.
    Put(put_item::PutItemInput),
    /// Update an item in place.
    Update(update_item::UpdateItemInput),
    /// Delete an item.
    Delete(delete_item::DeleteItemInput),
    /// Check a condition on an item without writing it.
    ConditionCheck(ConditionCheckInput),
}

/// Processed write transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactWriteItemsInput {
    /// Items, in enqueue order.
    pub items: Vec<TransactWriteItemInput>,
    /// Idempotency token.
    pub client_request_token: String,
    /// Whether to return the consumed capacity information.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// Whether to return item collection metrics.
    pub return_item_collection_metrics: Option<types::ReturnItemCollectionMetrics>,
}

#[derive(Debug)]
struct Effect<'a> {
    record: &'a mut Record,
    version: Option<i64>,
    state: RecordState,
}

/// Write transaction.
///
/// Operations are compiled when enqueued and sent together by [`TransactWrite::commit`].
/// Records stay borrowed until the commit, which applies their new versions and states only
/// if the whole transaction succeeds. Dropping the builder sends nothing.
///
/// ```rust,no_run
/// use dynamodb_mapper::{
///     common::{key::Keys, path::Path},
///     record::Record,
///     schema::Schema,
///     transport::Transport,
///     write::transact_write::TransactWrite,
/// };
///
/// # async fn example(
/// #     transport: &dyn Transport,
/// #     order: &mut Record,
/// #     account: &Schema,
/// # ) -> dynamodb_mapper::error::Result<()> {
/// let mut transaction = TransactWrite::new();
/// transaction
///     .save(order, Default::default())?
///     .condition_check(account, &Keys::new("a1"), Path::new("active").eq(true))?;
/// transaction.commit(transport).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct TransactWrite<'a> {
    items: Vec<TransactWriteItemInput>,
    effects: Vec<Effect<'a>>,
    client_request_token: Option<String>,
    return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    return_item_collection_metrics: Option<types::ReturnItemCollectionMetrics>,
}

/// Return values are not supported inside transactions; a failed condition returns the
/// stored item unless told otherwise.
fn transactional(mut write_operation: write::common::WriteInput) -> write::common::WriteInput {
    write_operation.return_values = None;
    write_operation.return_consumed_capacity = None;
    write_operation.return_item_collection_metrics = None;
    if write_operation.return_values_on_condition_check_failure.is_none() {
        write_operation.return_values_on_condition_check_failure =
            Some(types::ReturnValuesOnConditionCheckFailure::AllOld);
    }
    write_operation
}

impl<'a> TransactWrite<'a> {
    /// Empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-supplied idempotency token instead of a generated one.
    pub fn client_request_token(&mut self, token: impl Into<String>) -> &mut Self {
        self.client_request_token = Some(token.into());
        self
    }

    /// Report consumed capacity.
    pub fn return_consumed_capacity(
        &mut self,
        return_consumed_capacity: types::ReturnConsumedCapacity,
    ) -> &mut Self {
        self.return_consumed_capacity = Some(return_consumed_capacity);
        self
    }

    /// Report item collection metrics.
    pub fn return_item_collection_metrics(
        &mut self,
        return_item_collection_metrics: types::ReturnItemCollectionMetrics,
    ) -> &mut Self {
        self.return_item_collection_metrics = Some(return_item_collection_metrics);
        self
    }

    /// Number of enqueued operations.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was enqueued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn push(&mut self, item: TransactWriteItemInput) -> Result<()> {
        if self.items.len() == MAX_TRANSACT_ITEMS {
            return Err(Error::Validation(format!(
                "a transaction holds at most {MAX_TRANSACT_ITEMS} items"
            )));
        }
        self.items.push(item);
        Ok(())
    }

    /// Enqueue a put of the whole record.
    pub fn save(
        &mut self,
        record: &'a mut Record,
        write_args: write::common::WriteArgs,
    ) -> Result<&mut Self> {
        let put_item = put_item::PutItem { record, write_args };
        let mut input: put_item::PutItemInput = (&put_item).try_into()?;
        input.write_operation = transactional(input.write_operation);
        let version = write::common::VersionCheck::of(put_item.record).map(|version| version.next());
        self.push(TransactWriteItemInput::Put(input))?;
        self.effects.push(Effect {
            record: put_item.record,
            version,
            state: RecordState::Saved,
        });
        Ok(self)
    }

    /// Enqueue an update of the record.
    pub fn update(
        &mut self,
        record: &'a mut Record,
        actions: Vec<update_item::UpdateAction>,
        write_args: write::common::WriteArgs,
    ) -> Result<&mut Self> {
        let update_item = update_item::UpdateItem {
            record,
            actions,
            write_args,
        };
        let mut input: update_item::UpdateItemInput = (&update_item).try_into()?;
        input.write_operation = transactional(input.write_operation);
        let version =
            write::common::VersionCheck::of(update_item.record).map(|version| version.next());
        self.push(TransactWriteItemInput::Update(input))?;
        self.effects.push(Effect {
            record: update_item.record,
            version,
            state: RecordState::Saved,
        });
        Ok(self)
    }

    /// Enqueue a delete of the record.
    pub fn delete(
        &mut self,
        record: &'a mut Record,
        write_args: write::common::WriteArgs,
    ) -> Result<&mut Self> {
        let delete_item = delete_item::DeleteItem { record, write_args };
        let mut input: delete_item::DeleteItemInput = (&delete_item).try_into()?;
        input.write_operation = transactional(input.write_operation);
        self.push(TransactWriteItemInput::Delete(input))?;
        self.effects.push(Effect {
            record: delete_item.record,
            version: None,
            state: RecordState::Deleted,
        });
        Ok(self)
    }

    /// Enqueue a condition on an item that is not otherwise written.
    pub fn condition_check(
        &mut self,
        schema: &Schema,
        keys: &Keys,
        condition: Condition,
    ) -> Result<&mut Self> {
        let keys = keys.to_item(schema)?;
        let mut placeholders = Placeholders::default();
        let condition_expression = condition.compile(Some(schema), &mut placeholders)?;
        let write_operation = write::common::WriteInput::new(
            schema,
            &write::common::WriteArgs::default(),
            Some(condition_expression),
            &placeholders,
        );
        self.push(TransactWriteItemInput::ConditionCheck(ConditionCheckInput {
            keys,
            write_operation: transactional(write_operation),
        }))?;
        Ok(self)
    }

    fn input(&self) -> TransactWriteItemsInput {
        let client_request_token = self
            .client_request_token
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        TransactWriteItemsInput {
            items: self.items.clone(),
            client_request_token,
            return_consumed_capacity: self.return_consumed_capacity.clone(),
            return_item_collection_metrics: self.return_item_collection_metrics.clone(),
        }
    }

    /// Send every enqueued operation as a single atomic request.
    ///
    /// On failure no local record is touched and the error carries one cancellation reason
    /// per enqueued operation when the service cancelled the transaction.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.transact_write", skip_all, fields(items = self.items.len()), err)
    )]
    pub async fn commit(self, transport: &dyn Transport) -> Result<()> {
        if self.items.is_empty() {
            return Ok(());
        }
        let input = self.input();
        match transport.request(Request::TransactWriteItems(input)).await {
            Ok(Response::TransactWriteItems) => {}
            Ok(_) => {
                return Err(Error::UnexpectedResponse {
                    action: "TransactWriteItems",
                });
            }
            Err(cause) => return Err(Error::TransactWrite(cause)),
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(items = self.items.len(), "transaction committed");
        for effect in self.effects {
            if let Some(version) = effect.version {
                effect.record.set_version(version);
            }
            effect.record.mark(effect.state);
        }
        Ok(())
    }
}

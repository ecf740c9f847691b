use crate::{
    Item,
    error::{Error, Result},
    record::Record,
    transport::{Request, Response, Transport},
};

use aws_sdk_dynamodb::types;

/// Largest number of requests DynamoDB accepts in a single BatchWriteItem call.
pub const MAX_BATCH_WRITE_SIZE: usize = 25;

/// A single request within a batch write operation.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteRequest {
    /// Creates or replaces an item.
    Put(Item),
    /// Removes an item by its primary key.
    Delete(Item),
}

/// Processed batch write item request, one chunk of a batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchWriteItemInput {
    /// Target table.
    pub table_name: String,
    /// Requests of the chunk.
    pub requests: Vec<WriteRequest>,
    /// Whether to return the consumed capacity information.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// Whether to return item collection metrics.
    pub return_item_collection_metrics: Option<types::ReturnItemCollectionMetrics>,
}

/// Batch write item operation.
///
/// Writes are unconditional: version attributes are neither checked nor bumped.
/// Requests are sent in chunks; unprocessed requests are resubmitted a bounded number of times.
///
/// ```rust,no_run
/// use dynamodb_mapper::{record::Record, transport::Transport, write};
///
/// # async fn example(transport: &dyn Transport, a: &Record, b: &Record) -> dynamodb_mapper::error::Result<()> {
/// let batch_write = write::batch_write_item::BatchWriteItem::new("users")
///     .put(a)?
///     .delete(b)?;
/// batch_write.send(transport).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BatchWriteItem {
    /// Target table.
    pub table_name: String,
    /// Requests, in submission order.
    pub requests: Vec<WriteRequest>,
    /// Requests per call, at most [`MAX_BATCH_WRITE_SIZE`].
    pub chunk_size: usize,
    /// How many times unprocessed requests are resubmitted.
    pub max_unprocessed_rounds: usize,
    /// Whether to return the consumed capacity information.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// Whether to return item collection metrics.
    pub return_item_collection_metrics: Option<types::ReturnItemCollectionMetrics>,
}

impl BatchWriteItem {
    /// Empty batch for a table.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            requests: Vec::new(),
            chunk_size: MAX_BATCH_WRITE_SIZE,
            max_unprocessed_rounds: 5,
            return_consumed_capacity: None,
            return_item_collection_metrics: None,
        }
    }

    fn check_table(&self, record: &Record) -> Result<()> {
        if record.schema().table_name() != self.table_name {
            return Err(Error::Validation(format!(
                "record of {} belongs to table {}, not {}",
                record.schema().name(),
                record.schema().table_name(),
                self.table_name
            )));
        }
        Ok(())
    }

    /// Queue a put of the whole record.
    pub fn put(mut self, record: &Record) -> Result<Self> {
        self.check_table(record)?;
        self.requests.push(WriteRequest::Put(record.serialize()?));
        Ok(self)
    }

    /// Queue a delete of the record's key.
    pub fn delete(mut self, record: &Record) -> Result<Self> {
        self.check_table(record)?;
        self.requests.push(WriteRequest::Delete(record.keys()?));
        Ok(self)
    }

    fn input(&self, requests: Vec<WriteRequest>) -> BatchWriteItemInput {
        BatchWriteItemInput {
            table_name: self.table_name.clone(),
            requests,
            return_consumed_capacity: self.return_consumed_capacity.clone(),
            return_item_collection_metrics: self.return_item_collection_metrics.clone(),
        }
    }

    /// Split the requests into chunks of at most `chunk_size`.
    pub(crate) fn chunks(&self) -> Vec<BatchWriteItemInput> {
        let chunk_size = self.chunk_size.clamp(1, MAX_BATCH_WRITE_SIZE);
        self.requests
            .chunks(chunk_size)
            .map(|requests| self.input(requests.to_vec()))
            .collect()
    }

    /// Execute the batch write item operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.batch_write_item", skip_all, fields(table = %self.table_name), err)
    )]
    pub async fn send(self, transport: &dyn Transport) -> Result<()> {
        for chunk in self.chunks() {
            let mut pending = chunk;
            let mut round = 0;
            loop {
                let unprocessed = match transport.request(Request::BatchWriteItem(pending)).await {
                    Ok(Response::BatchWriteItem { unprocessed }) => unprocessed,
                    Ok(_) => return Err(Error::UnexpectedResponse { action: "BatchWriteItem" }),
                    Err(cause) => return Err(Error::BatchWrite(cause)),
                };
                if unprocessed.is_empty() {
                    break;
                }
                if round == self.max_unprocessed_rounds {
                    return Err(Error::Unprocessed {
                        table: self.table_name.clone(),
                        count: unprocessed.len(),
                    });
                }
                round += 1;
                #[cfg(feature = "tracing")]
                tracing::debug!(count = unprocessed.len(), round, "resubmitting unprocessed writes");
                pending = self.input(unprocessed);
            }
        }
        Ok(())
    }
}

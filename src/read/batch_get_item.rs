use crate::{
    Item,
    common::key::Keys,
    error::{Error, Result},
    read,
    record::Record,
    schema::{Schema, registry::Registry},
    transport::{Request, Response, Transport},
};

use std::sync;

/// Largest number of keys DynamoDB accepts in a single BatchGetItem call.
pub const MAX_BATCH_GET_SIZE: usize = 100;

/// Processed batch get item request, one chunk of a batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchGetItemInput {
    /// Primary keys of the chunk.
    pub keys: Vec<Item>,
    /// Table, projection and consistency.
    pub single_read_operation: read::common::SingleReadInput,
}

/// Batch get item operation on the records of one schema.
///
/// Keys are sent in chunks; unprocessed keys are resubmitted a bounded number of times.
/// Missing items are simply absent from the result, which is in no particular order.
///
/// ```rust,no_run
/// use dynamodb_mapper::{
///     common::key::Keys, read, schema::{Schema, registry::Registry}, transport::Transport,
/// };
/// use std::sync::Arc;
///
/// # async fn example(
/// #     transport: &dyn Transport,
/// #     registry: &Registry,
/// #     schema: Arc<Schema>,
/// # ) -> dynamodb_mapper::error::Result<()> {
/// let batch_get = read::batch_get_item::BatchGetItem::new(
///     schema,
///     vec![Keys::new("user1"), Keys::new("user2")],
/// );
/// let records = batch_get.send(transport, registry).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct BatchGetItem {
    /// Schema of the requested records.
    pub schema: sync::Arc<Schema>,
    /// Primary keys to retrieve.
    pub keys: Vec<Keys>,
    /// Additional read operation arguments (consistent read, selection).
    pub single_read_args: read::common::SingleReadArgs,
    /// Keys per call, at most [`MAX_BATCH_GET_SIZE`].
    pub chunk_size: usize,
    /// How many times unprocessed keys are resubmitted.
    pub max_unprocessed_rounds: usize,
}

impl BatchGetItem {
    /// Batch get with default chunking.
    pub fn new(schema: sync::Arc<Schema>, keys: Vec<Keys>) -> Self {
        Self {
            schema,
            keys,
            single_read_args: Default::default(),
            chunk_size: MAX_BATCH_GET_SIZE,
            max_unprocessed_rounds: 5,
        }
    }

    /// Marshal the keys and split them into chunks of at most `chunk_size`.
    pub(crate) fn chunks(&self) -> Result<Vec<BatchGetItemInput>> {
        let single_read_operation =
            read::common::SingleReadInput::new(&self.schema, &self.single_read_args);
        let keys = self
            .keys
            .iter()
            .map(|keys| keys.to_item(&self.schema))
            .collect::<Result<Vec<_>>>()?;
        let chunk_size = self.chunk_size.clamp(1, MAX_BATCH_GET_SIZE);
        let chunks = keys
            .chunks(chunk_size)
            .map(|keys| BatchGetItemInput {
                keys: keys.to_vec(),
                single_read_operation: single_read_operation.clone(),
            })
            .collect();
        Ok(chunks)
    }

    /// Execute the batch get item operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.batch_get_item", skip_all, fields(schema = %self.schema.name()), err)
    )]
    pub async fn send(self, transport: &dyn Transport, registry: &Registry) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(self.keys.len());
        for chunk in self.chunks()? {
            let mut pending = chunk;
            let mut round = 0;
            loop {
                let single_read_operation = pending.single_read_operation.clone();
                let (items, unprocessed_keys) =
                    match transport.request(Request::BatchGetItem(pending)).await {
                        Ok(Response::BatchGetItem {
                            items,
                            unprocessed_keys,
                        }) => (items, unprocessed_keys),
                        Ok(_) => return Err(Error::UnexpectedResponse { action: "BatchGetItem" }),
                        Err(cause) => return Err(Error::BatchGet(cause)),
                    };
                for item in &items {
                    records.push(read::common::decode(registry, &self.schema, item)?);
                }
                if unprocessed_keys.is_empty() {
                    break;
                }
                if round == self.max_unprocessed_rounds {
                    return Err(Error::Unprocessed {
                        table: self.schema.table_name().to_string(),
                        count: unprocessed_keys.len(),
                    });
                }
                round += 1;
                #[cfg(feature = "tracing")]
                tracing::debug!(count = unprocessed_keys.len(), round, "resubmitting unprocessed keys");
                pending = BatchGetItemInput {
                    keys: unprocessed_keys,
                    single_read_operation,
                };
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::attribute::Attribute;

    use aws_sdk_dynamodb::types;
    use rstest::rstest;

    fn schema() -> sync::Arc<Schema> {
        sync::Arc::new(
            Schema::builder("User", "users")
                .attribute(Attribute::number("id").hash_key())
                .build()
                .unwrap(),
        )
    }

    #[rstest]
    #[case::empty(0, 100, vec![])]
    #[case::single_chunk(40, 100, vec![40])]
    #[case::remainder(250, 100, vec![100, 100, 50])]
    #[case::small_chunks(5, 2, vec![2, 2, 1])]
    #[case::capped(150, 500, vec![100, 50])]
    fn test_chunks(#[case] keys: usize, #[case] chunk_size: usize, #[case] expected: Vec<usize>) {
        let mut batch = BatchGetItem::new(schema(), (0..keys).map(Keys::new).collect());
        batch.chunk_size = chunk_size;
        let sizes: Vec<_> = batch
            .chunks()
            .unwrap()
            .iter()
            .map(|chunk| chunk.keys.len())
            .collect();
        assert_eq!(sizes, expected);
    }

    #[test]
    fn test_chunk_input() {
        let batch = BatchGetItem::new(schema(), vec![Keys::new(7)]);
        assert_eq!(
            batch.chunks().unwrap(),
            vec![
                BatchGetItemInput {
                    keys: vec![
                        Item::from(
                            [
                                ("id".to_string(), types::AttributeValue::N("7".to_string())),
                            ]
                        ),
                    ],
                    single_read_operation: read::common::SingleReadInput {
                        table_name: "users".to_string(),
                        ..Default::default()
                    },
                },
            ]
        );
    }

    #[test]
    fn test_invalid_key() {
        let batch = BatchGetItem::new(schema(), vec![Keys::new("seven")]);
        assert!(batch.chunks().is_err());
    }
}

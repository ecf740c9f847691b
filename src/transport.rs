//! The seam between the mapper and the DynamoDB service.
//!
//! Every network call goes through [`Transport::request`]. Signing, retries, timeouts and
//! endpoint resolution are the transport's business. The crate ships an implementation for
//! the AWS SDK [`Client`]; tests plug in scripted transports.

use crate::{
    Item,
    error::{CancellationReason, TransportError, codes},
    read::{
        batch_get_item::BatchGetItemInput, get_item::GetItemInput, query::QueryInput,
        scan::ScanInput, transact_get::TransactGetItemsInput,
    },
    write::{
        batch_write_item::{BatchWriteItemInput, WriteRequest},
        delete_item::DeleteItemInput,
        put_item::PutItemInput,
        transact_write::{TransactWriteItemInput, TransactWriteItemsInput},
        update_item::UpdateItemInput,
    },
};

use async_trait::async_trait;
use aws_sdk_dynamodb::{
    Client,
    error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::{
        transact_get_items::TransactGetItemsError, transact_write_items::TransactWriteItemsError,
    },
    types,
};
use std::fmt;

/// A request for one DynamoDB action.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    /// `GetItem`
    GetItem(GetItemInput),
    /// `PutItem`
    PutItem(PutItemInput),
    /// `UpdateItem`
    UpdateItem(UpdateItemInput),
    /// `DeleteItem`
    DeleteItem(DeleteItemInput),
    /// `Query`, one page.
    Query(QueryInput),
    /// `Scan`, one page.
    Scan(ScanInput),
    /// `BatchGetItem` on a single table.
    BatchGetItem(BatchGetItemInput),
    /// `BatchWriteItem` on a single table.
    BatchWriteItem(BatchWriteItemInput),
    /// `TransactGetItems`
    TransactGetItems(TransactGetItemsInput),
    /// `TransactWriteItems`
    TransactWriteItems(TransactWriteItemsInput),
}

impl Request {
    /// Name of the DynamoDB action.
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetItem(_) => "GetItem",
            Self::PutItem(_) => "PutItem",
            Self::UpdateItem(_) => "UpdateItem",
            Self::DeleteItem(_) => "DeleteItem",
            Self::Query(_) => "Query",
            Self::Scan(_) => "Scan",
            Self::BatchGetItem(_) => "BatchGetItem",
            Self::BatchWriteItem(_) => "BatchWriteItem",
            Self::TransactGetItems(_) => "TransactGetItems",
            Self::TransactWriteItems(_) => "TransactWriteItems",
        }
    }
}

/// One page of a query or scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    /// Items matching the filter.
    pub items: Vec<Item>,
    /// Where the next page starts, `None` on the last page.
    pub last_evaluated_key: Option<Item>,
    /// Number of items returned.
    pub count: usize,
    /// Number of items evaluated before filtering.
    pub scanned_count: usize,
}

/// The answer to a [`Request`], variant for variant.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    /// `GetItem`; `None` when the item does not exist.
    GetItem {
        /// The stored item.
        item: Option<Item>,
    },
    /// `PutItem`
    PutItem {
        /// Attributes requested through the return values.
        attributes: Option<Item>,
    },
    /// `UpdateItem`
    UpdateItem {
        /// Attributes requested through the return values.
        attributes: Option<Item>,
    },
    /// `DeleteItem`
    DeleteItem {
        /// Attributes requested through the return values.
        attributes: Option<Item>,
    },
    /// `Query`
    Query(Page),
    /// `Scan`
    Scan(Page),
    /// `BatchGetItem`
    BatchGetItem {
        /// Items found, in no particular order.
        items: Vec<Item>,
        /// Keys the service did not process.
        unprocessed_keys: Vec<Item>,
    },
    /// `BatchWriteItem`
    BatchWriteItem {
        /// Requests the service did not process.
        unprocessed: Vec<WriteRequest>,
    },
    /// `TransactGetItems`
    TransactGetItems {
        /// One entry per requested item, in request order; `None` for missing items.
        items: Vec<Option<Item>>,
    },
    /// `TransactWriteItems`
    TransactWriteItems,
}

/// Sends requests to DynamoDB.
///
/// Implementations report failures with the service error code, e.g.
/// `TransactionCanceledException` with one cancellation reason per transaction item.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a single round trip.
    async fn request(&self, request: Request) -> Result<Response, TransportError>;
}

/// apply common write operation settings to a builder
macro_rules! apply_write_operation {
    ($builder:expr, $write_operation:expr) => {
        $builder
            .set_condition_expression($write_operation.condition_expression)
            .set_expression_attribute_names($write_operation.expression_attribute_names)
            .set_expression_attribute_values($write_operation.expression_attribute_values)
            .set_return_consumed_capacity($write_operation.return_consumed_capacity)
            .set_return_item_collection_metrics($write_operation.return_item_collection_metrics)
            .set_return_values($write_operation.return_values)
            .set_return_values_on_condition_check_failure(
                $write_operation.return_values_on_condition_check_failure,
            )
            .table_name($write_operation.table_name)
    };
}

/// apply write operation settings to a transaction item builder
macro_rules! apply_transact_write_operation {
    ($builder:expr, $write_operation:expr) => {
        $builder
            .set_condition_expression($write_operation.condition_expression)
            .set_expression_attribute_names($write_operation.expression_attribute_names)
            .set_expression_attribute_values($write_operation.expression_attribute_values)
            .set_return_values_on_condition_check_failure(
                $write_operation.return_values_on_condition_check_failure,
            )
            .table_name($write_operation.table_name)
    };
}

/// apply common single read operation settings to a builder
macro_rules! apply_single_read_operation {
    ($builder:expr, $single_read_operation:expr) => {
        $builder
            .set_consistent_read($single_read_operation.consistent_read)
            .set_expression_attribute_names($single_read_operation.expression_attribute_names)
            .set_projection_expression($single_read_operation.projection_expression)
    };
}

/// apply common multiple read operation settings to a builder
macro_rules! apply_multiple_read_operation {
    ($builder:expr, $multiple_read_operation:expr) => {
        $builder
            .set_consistent_read($multiple_read_operation.consistent_read)
            .set_exclusive_start_key($multiple_read_operation.exclusive_start_key)
            .set_expression_attribute_names($multiple_read_operation.expression_attribute_names)
            .set_expression_attribute_values($multiple_read_operation.expression_attribute_values)
            .set_filter_expression($multiple_read_operation.filter_expression)
            .set_index_name($multiple_read_operation.index_name)
            .set_limit($multiple_read_operation.limit)
            .set_projection_expression($multiple_read_operation.projection_expression)
            .set_return_consumed_capacity($multiple_read_operation.return_consumed_capacity)
            .set_select($multiple_read_operation.select)
            .table_name($multiple_read_operation.table_name)
    };
}

fn transport_error<E, R>(error: SdkError<E, R>) -> TransportError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    let code = error.code().unwrap_or(codes::UNKNOWN).to_string();
    let message = match error.message() {
        Some(message) => message.to_string(),
        None => DisplayErrorContext(&error).to_string(),
    };
    TransportError::new(code, message)
}

fn build_error(error: BuildError) -> TransportError {
    TransportError::new(codes::VALIDATION, error.to_string())
}

fn cancellation_reason(reason: &types::CancellationReason) -> Option<CancellationReason> {
    let code = reason.code().filter(|code| *code != codes::NO_REASON)?;
    Some(CancellationReason {
        code: code.to_string(),
        message: reason.message().map(str::to_string),
        item: reason.item().cloned(),
    })
}

fn transact_write_error<R: fmt::Debug>(
    error: SdkError<TransactWriteItemsError, R>,
) -> TransportError {
    let reasons = match &error {
        SdkError::ServiceError(service) => match service.err() {
            TransactWriteItemsError::TransactionCanceledException(cancelled) => cancelled
                .cancellation_reasons()
                .iter()
                .map(cancellation_reason)
                .collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    transport_error(error).with_cancellation_reasons(reasons)
}

fn transact_get_error<R: fmt::Debug>(error: SdkError<TransactGetItemsError, R>) -> TransportError {
    let reasons = match &error {
        SdkError::ServiceError(service) => match service.err() {
            TransactGetItemsError::TransactionCanceledException(cancelled) => cancelled
                .cancellation_reasons()
                .iter()
                .map(cancellation_reason)
                .collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    transport_error(error).with_cancellation_reasons(reasons)
}

fn count(count: i32) -> usize {
    usize::try_from(count).unwrap_or_default()
}

fn write_request(request: WriteRequest) -> Result<types::WriteRequest, TransportError> {
    let builder = types::WriteRequest::builder();
    let builder = match request {
        WriteRequest::Put(item) => builder.put_request(
            types::PutRequest::builder()
                .set_item(Some(item))
                .build()
                .map_err(build_error)?,
        ),
        WriteRequest::Delete(keys) => builder.delete_request(
            types::DeleteRequest::builder()
                .set_key(Some(keys))
                .build()
                .map_err(build_error)?,
        ),
    };
    Ok(builder.build())
}

fn unprocessed_request(request: &types::WriteRequest) -> Option<WriteRequest> {
    if let Some(put_request) = request.put_request() {
        return Some(WriteRequest::Put(put_request.item().clone()));
    }
    request
        .delete_request()
        .map(|delete_request| WriteRequest::Delete(delete_request.key().clone()))
}

fn transact_write_item(
    item: TransactWriteItemInput,
) -> Result<types::TransactWriteItem, TransportError> {
    let builder = types::TransactWriteItem::builder();
    let builder = match item {
        TransactWriteItemInput::Put(input) => {
            let put = apply_transact_write_operation!(
                types::Put::builder().set_item(Some(input.item)),
                input.write_operation
            )
            .build()
            .map_err(build_error)?;
            builder.put(put)
        }
        TransactWriteItemInput::Update(input) => {
            let update = apply_transact_write_operation!(
                types::Update::builder()
                    .set_key(Some(input.keys))
                    .update_expression(input.update_expression),
                input.write_operation
            )
            .build()
            .map_err(build_error)?;
            builder.update(update)
        }
        TransactWriteItemInput::Delete(input) => {
            let delete = apply_transact_write_operation!(
                types::Delete::builder().set_key(Some(input.keys)),
                input.write_operation
            )
            .build()
            .map_err(build_error)?;
            builder.delete(delete)
        }
        TransactWriteItemInput::ConditionCheck(input) => {
            let condition_check = apply_transact_write_operation!(
                types::ConditionCheck::builder().set_key(Some(input.keys)),
                input.write_operation
            )
            .build()
            .map_err(build_error)?;
            builder.condition_check(condition_check)
        }
    };
    Ok(builder.build())
}

#[async_trait]
impl Transport for Client {
    async fn request(&self, request: Request) -> Result<Response, TransportError> {
        #[cfg(feature = "tracing")]
        tracing::debug!(action = request.action(), "sending request");
        match request {
            Request::GetItem(input) => {
                let builder = self
                    .get_item()
                    .set_key(Some(input.keys))
                    .set_return_consumed_capacity(
                        input.single_read_operation.return_consumed_capacity,
                    )
                    .table_name(input.single_read_operation.table_name);
                let output = apply_single_read_operation!(builder, input.single_read_operation)
                    .send()
                    .await
                    .map_err(transport_error)?;
                Ok(Response::GetItem { item: output.item })
            }
            Request::PutItem(input) => {
                let builder = self.put_item().set_item(Some(input.item));
                let output = apply_write_operation!(builder, input.write_operation)
                    .send()
                    .await
                    .map_err(transport_error)?;
                Ok(Response::PutItem {
                    attributes: output.attributes,
                })
            }
            Request::UpdateItem(input) => {
                let builder = self
                    .update_item()
                    .set_key(Some(input.keys))
                    .update_expression(input.update_expression);
                let output = apply_write_operation!(builder, input.write_operation)
                    .send()
                    .await
                    .map_err(transport_error)?;
                Ok(Response::UpdateItem {
                    attributes: output.attributes,
                })
            }
            Request::DeleteItem(input) => {
                let builder = self.delete_item().set_key(Some(input.keys));
                let output = apply_write_operation!(builder, input.write_operation)
                    .send()
                    .await
                    .map_err(transport_error)?;
                Ok(Response::DeleteItem {
                    attributes: output.attributes,
                })
            }
            Request::Query(input) => {
                let builder = self
                    .query()
                    .key_condition_expression(input.key_condition_expression)
                    .set_scan_index_forward(input.scan_index_forward);
                let output = apply_multiple_read_operation!(builder, input.multiple_read_operation)
                    .send()
                    .await
                    .map_err(transport_error)?;
                Ok(Response::Query(Page {
                    items: output.items.unwrap_or_default(),
                    last_evaluated_key: output.last_evaluated_key,
                    count: count(output.count),
                    scanned_count: count(output.scanned_count),
                }))
            }
            Request::Scan(input) => {
                let builder = self
                    .scan()
                    .set_segment(input.segment)
                    .set_total_segments(input.total_segments);
                let output = apply_multiple_read_operation!(builder, input.multiple_read_operation)
                    .send()
                    .await
                    .map_err(transport_error)?;
                Ok(Response::Scan(Page {
                    items: output.items.unwrap_or_default(),
                    last_evaluated_key: output.last_evaluated_key,
                    count: count(output.count),
                    scanned_count: count(output.scanned_count),
                }))
            }
            Request::BatchGetItem(input) => {
                let table_name = input.single_read_operation.table_name.clone();
                let keys_and_attributes = apply_single_read_operation!(
                    types::KeysAndAttributes::builder().set_keys(Some(input.keys)),
                    input.single_read_operation
                )
                .build()
                .map_err(build_error)?;
                let output = self
                    .batch_get_item()
                    .request_items(table_name.clone(), keys_and_attributes)
                    .set_return_consumed_capacity(
                        input.single_read_operation.return_consumed_capacity,
                    )
                    .send()
                    .await
                    .map_err(transport_error)?;
                let items = output
                    .responses
                    .and_then(|mut responses| responses.remove(&table_name))
                    .unwrap_or_default();
                let unprocessed_keys = output
                    .unprocessed_keys
                    .and_then(|mut unprocessed_keys| unprocessed_keys.remove(&table_name))
                    .map(|keys_and_attributes| keys_and_attributes.keys().to_vec())
                    .unwrap_or_default();
                Ok(Response::BatchGetItem {
                    items,
                    unprocessed_keys,
                })
            }
            Request::BatchWriteItem(input) => {
                let requests = input
                    .requests
                    .into_iter()
                    .map(write_request)
                    .collect::<Result<Vec<_>, _>>()?;
                let output = self
                    .batch_write_item()
                    .request_items(input.table_name.clone(), requests)
                    .set_return_consumed_capacity(input.return_consumed_capacity)
                    .set_return_item_collection_metrics(input.return_item_collection_metrics)
                    .send()
                    .await
                    .map_err(transport_error)?;
                let unprocessed = output
                    .unprocessed_items
                    .and_then(|mut unprocessed_items| unprocessed_items.remove(&input.table_name))
                    .unwrap_or_default()
                    .iter()
                    .filter_map(unprocessed_request)
                    .collect();
                Ok(Response::BatchWriteItem { unprocessed })
            }
            Request::TransactGetItems(input) => {
                let mut builder = self
                    .transact_get_items()
                    .set_return_consumed_capacity(input.return_consumed_capacity);
                for item in input.items {
                    let get = types::Get::builder()
                        .set_key(Some(item.keys))
                        .set_expression_attribute_names(item.expression_attribute_names)
                        .set_projection_expression(item.projection_expression)
                        .table_name(item.table_name)
                        .build()
                        .map_err(build_error)?;
                    builder =
                        builder.transact_items(types::TransactGetItem::builder().get(get).build());
                }
                let output = builder.send().await.map_err(transact_get_error)?;
                let items = output
                    .responses
                    .unwrap_or_default()
                    .into_iter()
                    .map(|response| response.item.filter(|item| !item.is_empty()))
                    .collect();
                Ok(Response::TransactGetItems { items })
            }
            Request::TransactWriteItems(input) => {
                let mut builder = self
                    .transact_write_items()
                    .client_request_token(input.client_request_token)
                    .set_return_consumed_capacity(input.return_consumed_capacity)
                    .set_return_item_collection_metrics(input.return_item_collection_metrics);
                for item in input.items {
                    builder = builder.transact_items(transact_write_item(item)?);
                }
                builder.send().await.map_err(transact_write_error)?;
                Ok(Response::TransactWriteItems)
            }
        }
    }
}

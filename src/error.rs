//! Errors raised while building, sending and decoding requests.

use aws_sdk_dynamodb::types;
use std::collections;
use thiserror::Error;

/// Result type used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error codes reported by DynamoDB that the mapper reacts to.
pub mod codes {
    /// A single-item condition expression evaluated to false.
    pub const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailedException";
    /// Cancellation reason code of a transaction item whose condition failed.
    pub const CONDITIONAL_CHECK_FAILED_REASON: &str = "ConditionalCheckFailed";
    /// A client request token was reused with a different payload.
    pub const IDEMPOTENT_PARAMETER_MISMATCH: &str = "IdempotentParameterMismatchException";
    /// Cancellation reason code of a transaction item that was not at fault.
    pub const NO_REASON: &str = "None";
    /// The table or index does not exist.
    pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
    /// The request exceeded the provisioned throughput.
    pub const THROUGHPUT_EXCEEDED: &str = "ProvisionedThroughputExceededException";
    /// A transaction was cancelled; see the cancellation reasons.
    pub const TRANSACTION_CANCELLED: &str = "TransactionCanceledException";
    /// Another transaction with the same token is still in progress.
    pub const TRANSACTION_IN_PROGRESS: &str = "TransactionInProgressException";
    /// Used when the transport could not classify the failure.
    pub const UNKNOWN: &str = "Unknown";
    /// The request was rejected as malformed.
    pub const VALIDATION: &str = "ValidationException";
}

/// Why a single item of a cancelled transaction failed.
#[derive(Clone, Debug, PartialEq)]
pub struct CancellationReason {
    /// Machine-readable reason, e.g. `ConditionalCheckFailed`.
    pub code: String,
    /// Human-readable explanation.
    pub message: Option<String>,
    /// The item as stored, when `ALL_OLD` was requested on condition check failure.
    pub item: Option<collections::HashMap<String, types::AttributeValue>>,
}

/// Failure reported by the transport collaborator.
///
/// For cancelled transactions `cancellation_reasons` has one entry per submitted item, in
/// submission order. `None` marks an item that did not cause the cancellation.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{code}: {message}")]
pub struct TransportError {
    /// Machine-readable error code (see [`codes`]).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Position-aligned cancellation reasons of a cancelled transaction.
    pub cancellation_reasons: Vec<Option<CancellationReason>>,
}

impl TransportError {
    /// Build an error from a code and a message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            cancellation_reasons: Vec::new(),
        }
    }

    /// Attach cancellation reasons.
    pub fn with_cancellation_reasons(mut self, reasons: Vec<Option<CancellationReason>>) -> Self {
        self.cancellation_reasons = reasons;
        self
    }

    /// Whether the error carries the given code.
    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

/// Error raised by the mapper.
#[derive(Debug, Error)]
pub enum Error {
    /// A value does not match the declared attribute type.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Conflicting schema declarations.
    #[error("schema error: {0}")]
    Schema(String),
    /// The merged table definition is inconsistent.
    #[error("table error: {0}")]
    Table(String),
    /// A malformed expression or request.
    #[error("validation error: {0}")]
    Validation(String),
    /// The requested item is missing.
    #[error("item does not exist in table {table}")]
    DoesNotExist {
        /// Table that was read.
        table: String,
    },
    /// A single-item conditional write was rejected.
    #[error("conditional check failed: {0}")]
    ConditionCheckFailed(#[source] TransportError),
    /// GetItem failed.
    #[error("failed to get item: {0}")]
    Get(#[source] TransportError),
    /// PutItem failed.
    #[error("failed to put item: {0}")]
    Put(#[source] TransportError),
    /// UpdateItem failed.
    #[error("failed to update item: {0}")]
    Update(#[source] TransportError),
    /// DeleteItem failed.
    #[error("failed to delete item: {0}")]
    Delete(#[source] TransportError),
    /// A query page could not be fetched.
    #[error("failed to query items: {0}")]
    Query(#[source] TransportError),
    /// A scan page could not be fetched.
    #[error("failed to scan items: {0}")]
    Scan(#[source] TransportError),
    /// BatchGetItem failed.
    #[error("failed to batch get items: {0}")]
    BatchGet(#[source] TransportError),
    /// BatchWriteItem failed.
    #[error("failed to batch write items: {0}")]
    BatchWrite(#[source] TransportError),
    /// A batch still had unprocessed entries after the last resubmission round.
    #[error("{count} entries of table {table} were left unprocessed")]
    Unprocessed {
        /// Table of the batch.
        table: String,
        /// Keys or write requests left over.
        count: usize,
    },
    /// TransactGetItems failed.
    #[error("failed to get items transactionally: {0}")]
    TransactGet(#[source] TransportError),
    /// TransactWriteItems failed.
    #[error("failed to write items transactionally: {0}")]
    TransactWrite(#[source] TransportError),
    /// A deferred result was read before its transaction committed.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The transport answered with a response for another action.
    #[error("unexpected response to {action}")]
    UnexpectedResponse {
        /// Action that was requested.
        action: &'static str,
    },
}

impl Error {
    /// The transport failure behind this error, if any.
    pub fn cause(&self) -> Option<&TransportError> {
        match self {
            Self::ConditionCheckFailed(cause)
            | Self::Get(cause)
            | Self::Put(cause)
            | Self::Update(cause)
            | Self::Delete(cause)
            | Self::Query(cause)
            | Self::Scan(cause)
            | Self::BatchGet(cause)
            | Self::BatchWrite(cause)
            | Self::TransactGet(cause)
            | Self::TransactWrite(cause) => Some(cause),
            _ => None,
        }
    }

    /// Machine-readable code of the transport failure.
    pub fn cause_code(&self) -> Option<&str> {
        self.cause().map(|cause| cause.code.as_str())
    }

    /// Human-readable message of the transport failure.
    pub fn cause_message(&self) -> Option<&str> {
        self.cause().map(|cause| cause.message.as_str())
    }

    /// Position-aligned reasons of a cancelled transaction, empty otherwise.
    pub fn cancellation_reasons(&self) -> &[Option<CancellationReason>] {
        self.cause()
            .map(|cause| cause.cancellation_reasons.as_slice())
            .unwrap_or_default()
    }
}

impl From<serde_dynamo::Error> for Error {
    fn from(error: serde_dynamo::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::transact_write(
        Error::TransactWrite(
            TransportError::new(
                codes::TRANSACTION_CANCELLED,
                "Transaction cancelled",
            )
            .with_cancellation_reasons(
                vec![
                    None,
                    Some(
                        CancellationReason {
                            code: codes::CONDITIONAL_CHECK_FAILED_REASON.to_string(),
                            message: Some("The conditional request failed".to_string()),
                            item: None,
                        }
                    ),
                ]
            )
        ),
        Some(codes::TRANSACTION_CANCELLED),
        2
    )]
    #[case::condition_check_failed(
        Error::ConditionCheckFailed(
            TransportError::new(
                codes::CONDITIONAL_CHECK_FAILED,
                "The conditional request failed",
            )
        ),
        Some(codes::CONDITIONAL_CHECK_FAILED),
        0
    )]
    #[case::local(
        Error::Validation("empty IN list".to_string()),
        None,
        0
    )]
    fn test_error_cause(
        #[case] error: Error,
        #[case] expected_code: Option<&str>,
        #[case] expected_reasons: usize,
    ) {
        assert_eq!(error.cause_code(), expected_code);
        assert_eq!(error.cancellation_reasons().len(), expected_reasons);
    }

    #[test]
    fn test_transport_error_display() {
        let error = TransportError::new(codes::VALIDATION, "bad request");
        assert_eq!(error.to_string(), "ValidationException: bad request");
        assert!(error.is(codes::VALIDATION));
    }
}

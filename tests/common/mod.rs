//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use dynamodb_mapper::{
    Item,
    attribute::Attribute,
    error::{TransportError, codes},
    schema::{Schema, registry::Registry},
    transport::{Request, Response, Transport},
    write::transact_write::TransactWriteItemsInput,
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

/// Transport answering from a script and recording every request.
///
/// Transaction tokens are remembered the way the service does: a token replayed with the same
/// payload succeeds without consuming the script, with another payload it fails with
/// `IdempotentParameterMismatchException`.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Response, TransportError>>>,
    requests: Mutex<Vec<Request>>,
    tokens: Mutex<HashMap<String, TransactWriteItemsInput>>,
}

impl MockTransport {
    /// Transport answering with the given responses, in order.
    pub fn new(responses: impl IntoIterator<Item = Result<Response, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Queue one more response.
    pub fn push(&self, response: Result<Response, TransportError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of scripted responses not consumed yet.
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: Request) -> Result<Response, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Request::TransactWriteItems(input) = &request
            && let Some(previous) = self
                .tokens
                .lock()
                .unwrap()
                .get(&input.client_request_token)
        {
            return if previous.items == input.items {
                Ok(Response::TransactWriteItems)
            } else {
                Err(TransportError::new(
                    codes::IDEMPOTENT_PARAMETER_MISMATCH,
                    "the request uses the same client token as a previous, but non-identical request",
                ))
            };
        }
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted {} request", request.action()));
        if let (Request::TransactWriteItems(input), Ok(_)) = (&request, &response) {
            self.tokens
                .lock()
                .unwrap()
                .insert(input.client_request_token.clone(), input.clone());
        }
        response
    }
}

/// Wire string.
pub fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

/// Wire number.
pub fn n(value: i64) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

/// Item from name and wire value pairs.
pub fn item<const N: usize>(pairs: [(&str, AttributeValue); N]) -> Item {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Failure of a single conditional write.
pub fn condition_failed() -> TransportError {
    TransportError::new(
        codes::CONDITIONAL_CHECK_FAILED,
        "The conditional request failed",
    )
}

/// Registry holding a versioned `Account` schema on table `accounts`.
pub fn accounts() -> (Registry, Arc<Schema>) {
    let mut registry = Registry::new();
    let schema = registry
        .register(
            Schema::builder("Account", "accounts")
                .attribute(Attribute::string("id").hash_key())
                .attribute(Attribute::number("balance").default_value(0))
                .attribute(Attribute::version("version"))
                .build()
                .unwrap(),
        )
        .unwrap();
    (registry, schema)
}

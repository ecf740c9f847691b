#![deny(missing_docs)]
#![deny(warnings)]

//! # DynamoDB Mapper
//!
//! A typed object mapper for Amazon DynamoDB.
//!
//! ## Overview
//!
//! Record shapes are declared as [`schema::Schema`]s made of typed [`attribute::Attribute`]s.
//! The mapper takes care of:
//! - marshalling values to and from the DynamoDB wire format, including legacy binary payloads
//! - compiling conditions, update actions, key conditions and projections into expressions
//!   with `#name` / `:value` placeholders
//! - optimistic locking through a version attribute
//! - polymorphic records sharing a table, told apart by a discriminator attribute
//! - lazy paginated queries and scans
//! - atomic read and write transactions with idempotency tokens
//!
//! Every request goes through the [`transport::Transport`] trait, implemented for the AWS SDK
//! client. Retries, signing and timeouts are left to the transport.
//!
//! ## Quick Example
//!
//! ```no_run
//! use aws_sdk_dynamodb::Client;
//! use std::collections::BTreeSet;
//! use dynamodb_mapper::{
//!     attribute::Attribute,
//!     common::path::Path,
//!     mapper::Mapper,
//!     record::Record,
//!     schema::{Schema, registry::Registry},
//!     write,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = Client::from_conf(aws_sdk_dynamodb::config::Config::builder().build());
//! let mut registry = Registry::new();
//! let accounts = registry.register(
//!     Schema::builder("Account", "accounts")
//!         .attribute(Attribute::string("id").hash_key())
//!         .attribute(Attribute::number("balance").default_value(0))
//!         .attribute(Attribute::string_set("tags").nullable())
//!         .attribute(Attribute::version("version"))
//!         .build()?,
//! )?;
//! let mapper = Mapper::new(client, registry);
//!
//! let mut account = Record::new(&accounts).with("id", "a1")?;
//! mapper.save(&mut account, Default::default()).await?;
//!
//! // one UpdateItem call, conditional on the version written by the save
//! mapper
//!     .update(
//!         &mut account,
//!         vec![
//!             Path::new("balance").increment(10),
//!             Path::new("tags").add_value(BTreeSet::from(["gold".to_string()])),
//!         ],
//!         write::common::WriteArgs::default(),
//!     )
//!     .await?;
//! assert_eq!(account.version(), Some(2));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@attribute`] - Attribute descriptors and dynamic values
//! - [`mod@schema`] - Schemas, indexes and the discriminator registry
//! - [`mod@record`] - Schema instances
//! - [`mod@common`] - Paths, keys, conditions, selections and placeholders
//! - [`mod@read`] - Read operations (GetItem, Query, Scan, BatchGetItem, TransactGetItems)
//! - [`mod@write`] - Write operations (PutItem, UpdateItem, DeleteItem, BatchWriteItem,
//!   TransactWriteItems)
//! - [`mod@transport`] - The seam to the DynamoDB service
//! - [`mod@mapper`] - Façade over a transport and a registry

use aws_sdk_dynamodb::types;
use std::collections;

/// Attribute descriptors, numbers and dynamic values.
pub mod attribute;

/// Common utilities for paths, keys, conditions, and attribute selection.
pub mod common;

/// Errors and error codes.
pub mod error;

/// Façade over a transport and a registry.
pub mod mapper;

/// Read operations for retrieving data from DynamoDB tables.
///
/// This module provides operations for:
/// - Getting individual items by key
/// - Querying items with key conditions
/// - Scanning entire tables
/// - Batch retrieving multiple items
/// - Reading items atomically in a transaction
pub mod read;

/// Schema instances.
pub mod record;

/// Record schemas, indexes and the discriminator registry.
pub mod schema;

/// The seam between the mapper and the DynamoDB service.
pub mod transport;

/// Write operations for modifying data in DynamoDB tables.
///
/// This module provides operations for:
/// - Putting new items or replacing existing ones
/// - Updating items with various operations (set, add, remove, delete)
/// - Deleting items by key
/// - Batch writing multiple items
/// - Writing items atomically in a transaction
pub mod write;

/// A DynamoDB item: attribute name to wire value.
pub type Item = collections::HashMap<String, types::AttributeValue>;

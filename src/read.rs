//! Read operations for retrieving data from DynamoDB tables.
//!
//! Single reads return a decoded [`crate::record::Record`]; queries and scans return a lazy
//! [`cursor::Cursor`]. Items of a table shared by several schemas are decoded into the
//! schema named by their discriminator.

/// Batch get item operation for retrieving multiple items efficiently.
pub mod batch_get_item;

/// Common utilities and types for read operations.
pub mod common;

/// Lazy, paginated sequence of records.
pub mod cursor;

/// Get item operation for retrieving a single item by primary key.
pub mod get_item;

/// Query operation for retrieving items with key conditions.
pub mod query;

/// Scan operation for retrieving all items from a table.
pub mod scan;

/// Read transactions with deferred results.
pub mod transact_get;

//! Write operations for modifying data in DynamoDB tables.
//!
//! Puts, updates and deletes of versioned records are guarded by the version last seen and
//! advance it on success. Batch writes are neither conditional nor versioned.

/// Batch write item operation for efficiently writing multiple items.
pub mod batch_write_item;

/// Common utilities and types for write operations.
pub mod common;

/// Delete item operation for removing items from tables.
pub mod delete_item;

/// Put item operation for creating or replacing items.
pub mod put_item;

/// Write transactions.
pub mod transact_write;

/// Update item operation for modifying existing items.
pub mod update_item;

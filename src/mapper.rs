//! Entry point tying a [`Transport`] to a [`Registry`].
//!
//! The operations in [`crate::read`] and [`crate::write`] can be used on their own; the
//! [`Mapper`] saves passing the transport and the registry around and applies the defaults of
//! its [`Settings`].

use crate::{
    attribute::value::Value,
    common::key::Keys,
    error::{Error, Result},
    read::{
        self, batch_get_item::BatchGetItem, cursor::Cursor, get_item::GetItem, query::Query,
        scan::Scan, transact_get::TransactGet,
    },
    record::{Record, RecordState},
    schema::{
        Schema,
        registry::{Registry, TableDefinition},
    },
    transport::{Request, Response, Transport},
    write::{
        self, batch_write_item::BatchWriteItem, delete_item::DeleteItem, put_item::PutItem,
        transact_write::TransactWrite,
        update_item::{UpdateAction, UpdateItem},
    },
};

use aws_sdk_dynamodb::types;
use std::sync;

/// Defaults applied by the [`Mapper`] to the operations it sends.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Consistent read flag used when an operation leaves it unset.
    pub consistent_read: Option<bool>,
    /// Keys per BatchGetItem call.
    pub batch_get_chunk_size: usize,
    /// Requests per BatchWriteItem call.
    pub batch_write_chunk_size: usize,
    /// How many times unprocessed batch entries are resubmitted before giving up.
    pub max_unprocessed_rounds: usize,
    /// Consumed capacity reporting used when an operation leaves it unset.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            consistent_read: None,
            batch_get_chunk_size: read::batch_get_item::MAX_BATCH_GET_SIZE,
            batch_write_chunk_size: write::batch_write_item::MAX_BATCH_WRITE_SIZE,
            max_unprocessed_rounds: 5,
            return_consumed_capacity: None,
        }
    }
}

/// Object mapper over a transport.
///
/// ```rust,no_run
/// use dynamodb_mapper::{
///     attribute::Attribute, common::key::Keys, mapper::Mapper, record::Record,
///     schema::{Schema, registry::Registry},
/// };
///
/// # async fn example(client: aws_sdk_dynamodb::Client) -> dynamodb_mapper::error::Result<()> {
/// let mut registry = Registry::new();
/// let users = registry.register(
///     Schema::builder("User", "users")
///         .attribute(Attribute::string("id").hash_key())
///         .attribute(Attribute::version("version"))
///         .build()?,
/// )?;
/// let mapper = Mapper::new(client, registry);
///
/// let mut user = Record::new(&users).with("id", "alice")?;
/// mapper.save(&mut user, Default::default()).await?;
/// assert_eq!(user.version(), Some(1));
///
/// let stored = mapper.get(&users, Keys::new("alice")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Mapper<T> {
    transport: T,
    registry: Registry,
    settings: Settings,
}

impl<T: Transport> Mapper<T> {
    /// Mapper with default settings.
    pub fn new(transport: T, registry: Registry) -> Self {
        Self::with_settings(transport, registry, Settings::default())
    }

    /// Mapper with explicit settings.
    pub fn with_settings(transport: T, registry: Registry, settings: Settings) -> Self {
        Self {
            transport,
            registry,
            settings,
        }
    }

    /// The transport requests go through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The schemas known to the mapper.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Defaults applied to operations.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn single_read_args(&self) -> read::common::SingleReadArgs {
        read::common::SingleReadArgs {
            consistent_read: self.settings.consistent_read,
            return_consumed_capacity: self.settings.return_consumed_capacity.clone(),
            ..Default::default()
        }
    }

    fn multiple_read_args(
        &self,
        mut args: read::common::MultipleReadArgs,
    ) -> read::common::MultipleReadArgs {
        if args.consistent_read.is_none() {
            args.consistent_read = self.settings.consistent_read;
        }
        if args.return_consumed_capacity.is_none() {
            args.return_consumed_capacity = self.settings.return_consumed_capacity.clone();
        }
        args
    }

    /// Read one record by primary key.
    pub async fn get(&self, schema: &sync::Arc<Schema>, keys: Keys) -> Result<Record> {
        let get_item = GetItem {
            schema: sync::Arc::clone(schema),
            keys,
            single_read_args: self.single_read_args(),
        };
        get_item.send(&self.transport, &self.registry).await
    }

    /// Reload every attribute of a record from its stored item, with a consistent read.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.refresh", skip_all, fields(schema = %record.schema().name()), err)
    )]
    pub async fn refresh(&self, record: &mut Record) -> Result<()> {
        let single_read_args = read::common::SingleReadArgs {
            consistent_read: Some(true),
            ..self.single_read_args()
        };
        let get_item = read::get_item::GetItemInput {
            keys: record.keys()?,
            single_read_operation: read::common::SingleReadInput::new(
                record.schema(),
                &single_read_args,
            ),
        };
        match self.transport.request(Request::GetItem(get_item)).await {
            Ok(Response::GetItem { item: Some(item) }) => {
                record.load(&item)?;
                record.mark(RecordState::Loaded);
                Ok(())
            }
            Ok(Response::GetItem { item: None }) => Err(Error::DoesNotExist {
                table: record.schema().table_name().to_string(),
            }),
            Ok(_) => Err(Error::UnexpectedResponse { action: "GetItem" }),
            Err(cause) => Err(Error::Get(cause)),
        }
    }

    /// Put the whole record, advancing its version.
    pub async fn save(
        &self,
        record: &mut Record,
        write_args: write::common::WriteArgs,
    ) -> Result<()> {
        PutItem { record, write_args }.send(&self.transport).await?;
        Ok(())
    }

    /// Apply update actions to the stored item and refresh the record from the result.
    pub async fn update(
        &self,
        record: &mut Record,
        actions: Vec<UpdateAction>,
        write_args: write::common::WriteArgs,
    ) -> Result<()> {
        let update_item = UpdateItem {
            record,
            actions,
            write_args,
        };
        update_item.send(&self.transport).await
    }

    /// Delete the stored item.
    pub async fn delete(
        &self,
        record: &mut Record,
        write_args: write::common::WriteArgs,
    ) -> Result<()> {
        DeleteItem { record, write_args }.send(&self.transport).await?;
        Ok(())
    }

    /// Open a cursor over the items of a partition.
    pub fn query(&self, mut query: Query) -> Result<Cursor<'_>> {
        query.multiple_read_args = self.multiple_read_args(query.multiple_read_args);
        query.cursor(&self.transport, &self.registry)
    }

    /// Query a partition of the table with default arguments.
    pub fn query_partition(
        &self,
        schema: &sync::Arc<Schema>,
        hash_key: impl Into<Value>,
    ) -> Result<Cursor<'_>> {
        self.query(Query::new(sync::Arc::clone(schema), hash_key))
    }

    /// Open a cursor over the whole table.
    pub fn scan(&self, mut scan: Scan) -> Result<Cursor<'_>> {
        scan.multiple_read_args = self.multiple_read_args(scan.multiple_read_args);
        scan.cursor(&self.transport, &self.registry)
    }

    /// Read many records of one schema.
    pub async fn batch_get(
        &self,
        schema: &sync::Arc<Schema>,
        keys: Vec<Keys>,
    ) -> Result<Vec<Record>> {
        let batch_get = BatchGetItem {
            single_read_args: self.single_read_args(),
            chunk_size: self.settings.batch_get_chunk_size,
            max_unprocessed_rounds: self.settings.max_unprocessed_rounds,
            ..BatchGetItem::new(sync::Arc::clone(schema), keys)
        };
        batch_get.send(&self.transport, &self.registry).await
    }

    /// Empty batch write for a table, chunked according to the settings.
    pub fn batch_write(&self, table_name: impl Into<String>) -> BatchWriteItem {
        BatchWriteItem {
            chunk_size: self.settings.batch_write_chunk_size,
            max_unprocessed_rounds: self.settings.max_unprocessed_rounds,
            return_consumed_capacity: self.settings.return_consumed_capacity.clone(),
            ..BatchWriteItem::new(table_name)
        }
    }

    /// Send a batch write.
    pub async fn send_batch_write(&self, batch_write: BatchWriteItem) -> Result<()> {
        batch_write.send(&self.transport).await
    }

    /// Commit a read transaction, resolving its deferred results.
    pub async fn transact_get(&self, transaction: TransactGet) -> Result<()> {
        transaction.commit(&self.transport, &self.registry).await
    }

    /// Commit a write transaction, advancing the versions of its records on success.
    pub async fn transact_write(&self, transaction: TransactWrite<'_>) -> Result<()> {
        transaction.commit(&self.transport).await
    }

    /// Attribute, key and index definitions of a table, merged across its schema tree.
    pub fn table_definition(&self, table_name: &str) -> Result<TableDefinition> {
        self.registry.table_definition(table_name)
    }
}

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

/// Processed get item request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetItemInput {
    /// Primary key of the item.
    pub keys: Item,
    /// Table, projection and consistency.
    pub single_read_operation: read::common::SingleReadInput,
}

/// Get item operation.
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
/// let get_item = read::get_item::GetItem {
///     schema,
///     keys: Keys::new("user1"),
///     single_read_args: Default::default(),
/// };
/// let record = get_item.send(transport, registry).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct GetItem {
    /// Schema of the requested record.
    pub schema: sync::Arc<Schema>,
    /// The primary key of the item to retrieve.
    pub keys: Keys,
    /// Additional read operation arguments (consistent read, selection).
    pub single_read_args: read::common::SingleReadArgs,
}

impl TryFrom<&GetItem> for GetItemInput {
    type Error = Error;

    fn try_from(get_item: &GetItem) -> Result<Self> {
        let keys = get_item.keys.to_item(&get_item.schema)?;
        let single_read_operation =
            read::common::SingleReadInput::new(&get_item.schema, &get_item.single_read_args);
        let operation = Self {
            keys,
            single_read_operation,
        };
        Ok(operation)
    }
}

impl GetItem {
    /// Execute the get item operation.
    ///
    /// A missing item fails with [`Error::DoesNotExist`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.get_item", skip_all, fields(schema = %self.schema.name()), err)
    )]
    pub async fn send(self, transport: &dyn Transport, registry: &Registry) -> Result<Record> {
        let get_item: GetItemInput = (&self).try_into()?;
        match transport.request(Request::GetItem(get_item)).await {
            Ok(Response::GetItem { item: Some(item) }) => {
                read::common::decode(registry, &self.schema, &item)
            }
            Ok(Response::GetItem { item: None }) => Err(Error::DoesNotExist {
                table: self.schema.table_name().to_string(),
            }),
            Ok(_) => Err(Error::UnexpectedResponse { action: "GetItem" }),
            Err(cause) => Err(Error::Get(cause)),
        }
    }
}

use crate::{
    common::Placeholders,
    error::{Error, Result},
    read::{self, cursor::Cursor},
    schema::{Schema, registry::Registry},
    transport::Transport,
};

use std::sync;

/// Processed scan request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanInput {
    /// Table or index, filter, projection and paging.
    pub multiple_read_operation: read::common::MultipleReadInput,
    /// The segment number for parallel scans (0-indexed).
    pub segment: Option<i32>,
    /// The total number of segments for parallel scans.
    pub total_segments: Option<i32>,
}

/// Scan operation.
///
/// ```rust,no_run
/// use dynamodb_mapper::{read, schema::{Schema, registry::Registry}, transport::Transport};
/// use std::sync::Arc;
///
/// # async fn example(
/// #     transport: &dyn Transport,
/// #     registry: &Registry,
/// #     schema: Arc<Schema>,
/// # ) -> dynamodb_mapper::error::Result<()> {
/// let scan = read::scan::Scan::new(schema);
/// let records = scan.cursor(transport, registry)?.try_collect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Scan {
    /// Schema of the scanned records.
    pub schema: sync::Arc<Schema>,
    /// The segment number for parallel scans (0-indexed).
    pub segment: Option<i32>,
    /// The total number of segments for parallel scans.
    pub total_segments: Option<i32>,
    /// Additional read operation arguments (index, filter, selection, limit, etc.).
    pub multiple_read_args: read::common::MultipleReadArgs,
}

impl Scan {
    /// Scan the whole table.
    pub fn new(schema: sync::Arc<Schema>) -> Self {
        Self {
            schema,
            segment: None,
            total_segments: None,
            multiple_read_args: Default::default(),
        }
    }

    pub(crate) fn compile(&self, registry: &Registry) -> Result<ScanInput> {
        match (self.segment, self.total_segments) {
            (None, None) => {}
            (Some(segment), Some(total_segments)) if (0..total_segments).contains(&segment) => {}
            _ => {
                return Err(Error::Validation(
                    "segment and total_segments must be set together, with 0 <= segment < total_segments"
                        .to_string(),
                ));
            }
        }
        let mut placeholders = Placeholders::default();
        let multiple_read_operation = read::common::MultipleReadInput::compile(
            &self.schema,
            registry,
            &self.multiple_read_args,
            &mut placeholders,
        )?;
        let operation = ScanInput {
            multiple_read_operation,
            segment: self.segment,
            total_segments: self.total_segments,
        };
        Ok(operation)
    }

    /// Compile the scan and open a cursor over its results.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.scan", skip_all, fields(schema = %self.schema.name()), err)
    )]
    pub fn cursor<'t>(
        self,
        transport: &'t dyn Transport,
        registry: &'t Registry,
    ) -> Result<Cursor<'t>> {
        let scan = self.compile(registry)?;
        Ok(Cursor::scan(
            transport,
            registry,
            self.schema,
            scan,
            self.multiple_read_args.limit,
        ))
    }
}

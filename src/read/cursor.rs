use crate::{
    Item,
    error::{Error, Result},
    read::{self, query::QueryInput, scan::ScanInput},
    record::Record,
    schema::{Schema, registry::Registry},
    transport::{Page, Request, Response, Transport},
};

use std::{collections, sync};

#[derive(Clone, Debug, PartialEq)]
enum PageRequest {
    Query(QueryInput),
    Scan(ScanInput),
}

impl PageRequest {
    fn start_key(&self) -> Option<&Item> {
        match self {
            Self::Query(query) => query.multiple_read_operation.exclusive_start_key.as_ref(),
            Self::Scan(scan) => scan.multiple_read_operation.exclusive_start_key.as_ref(),
        }
    }

    fn index_name(&self) -> Option<&str> {
        match self {
            Self::Query(query) => query.multiple_read_operation.index_name.as_deref(),
            Self::Scan(scan) => scan.multiple_read_operation.index_name.as_deref(),
        }
    }

    fn page(&self, exclusive_start_key: Option<Item>) -> Request {
        match self {
            Self::Query(query) => {
                let mut query = query.clone();
                query.multiple_read_operation.exclusive_start_key = exclusive_start_key;
                Request::Query(query)
            }
            Self::Scan(scan) => {
                let mut scan = scan.clone();
                scan.multiple_read_operation.exclusive_start_key = exclusive_start_key;
                Request::Scan(scan)
            }
        }
    }

    fn unwrap_page(&self, response: Result<Response, crate::error::TransportError>) -> Result<Page> {
        match (self, response) {
            (Self::Query(_), Ok(Response::Query(page))) | (Self::Scan(_), Ok(Response::Scan(page))) => {
                Ok(page)
            }
            (Self::Query(_), Ok(_)) => Err(Error::UnexpectedResponse { action: "Query" }),
            (Self::Scan(_), Ok(_)) => Err(Error::UnexpectedResponse { action: "Scan" }),
            (Self::Query(_), Err(cause)) => Err(Error::Query(cause)),
            (Self::Scan(_), Err(cause)) => Err(Error::Scan(cause)),
        }
    }
}

/// Lazy, forward-only sequence of the records of a query or scan.
///
/// One request is sent per page, only when the records already fetched are used up. A failed
/// page ends the iteration with the error; nothing is retried. [`Cursor::rewind`] starts over
/// from the first page.
///
/// ```rust,no_run
/// use dynamodb_mapper::read::cursor::Cursor;
///
/// # async fn example(mut cursor: Cursor<'_>) -> dynamodb_mapper::error::Result<()> {
/// while let Some(record) = cursor.next().await {
///     println!("{:?}", record?.values());
/// }
/// let resume_from = cursor.last_evaluated_key();
/// # Ok(())
/// # }
/// ```
pub struct Cursor<'t> {
    transport: &'t dyn Transport,
    registry: &'t Registry,
    schema: sync::Arc<Schema>,
    request: PageRequest,
    key_names: Vec<String>,
    limit: Option<usize>,
    buffer: collections::VecDeque<Item>,
    next_key: Option<Item>,
    page_last_evaluated_key: Option<Item>,
    last_item: Option<Item>,
    started: bool,
    done: bool,
    yielded: usize,
    pages: usize,
    count: usize,
    scanned_count: usize,
}

impl<'t> Cursor<'t> {
    fn new(
        transport: &'t dyn Transport,
        registry: &'t Registry,
        schema: sync::Arc<Schema>,
        request: PageRequest,
        limit: Option<usize>,
    ) -> Self {
        let mut key_names: Vec<String> = std::iter::once(schema.hash_key())
            .chain(schema.range_key())
            .map(|attribute| attribute.name().to_string())
            .collect();
        if let Some(index) = request.index_name().and_then(|name| schema.index(name)) {
            for attribute in std::iter::once(index.hash_key()).chain(index.sort_key()) {
                if !key_names.iter().any(|name| name == attribute.name()) {
                    key_names.push(attribute.name().to_string());
                }
            }
        }
        let next_key = request.start_key().cloned();
        Self {
            transport,
            registry,
            schema,
            request,
            key_names,
            limit,
            buffer: collections::VecDeque::new(),
            next_key,
            page_last_evaluated_key: None,
            last_item: None,
            started: false,
            done: false,
            yielded: 0,
            pages: 0,
            count: 0,
            scanned_count: 0,
        }
    }

    pub(crate) fn query(
        transport: &'t dyn Transport,
        registry: &'t Registry,
        schema: sync::Arc<Schema>,
        query: QueryInput,
        limit: Option<usize>,
    ) -> Self {
        Self::new(transport, registry, schema, PageRequest::Query(query), limit)
    }

    pub(crate) fn scan(
        transport: &'t dyn Transport,
        registry: &'t Registry,
        schema: sync::Arc<Schema>,
        scan: ScanInput,
        limit: Option<usize>,
    ) -> Self {
        Self::new(transport, registry, schema, PageRequest::Scan(scan), limit)
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.yielded >= limit)
    }

    async fn fetch(&mut self) -> Result<()> {
        let request = self.request.page(self.next_key.take());
        let response = self.transport.request(request).await;
        let page = match self.request.unwrap_page(response) {
            Ok(page) => page,
            Err(error) => {
                self.done = true;
                return Err(error);
            }
        };
        self.started = true;
        self.pages += 1;
        self.count += page.count;
        self.scanned_count += page.scanned_count;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            schema = %self.schema.name(),
            page = self.pages,
            items = page.items.len(),
            "page fetched"
        );
        self.done = page.last_evaluated_key.is_none();
        self.next_key = page.last_evaluated_key.clone();
        self.page_last_evaluated_key = page.last_evaluated_key;
        self.buffer.extend(page.items);
        Ok(())
    }

    /// Next record, fetching the next page when needed. `None` once the results or the
    /// limit are exhausted.
    pub async fn next(&mut self) -> Option<Result<Record>> {
        loop {
            if self.limit_reached() {
                return None;
            }
            if let Some(item) = self.buffer.pop_front() {
                self.yielded += 1;
                let record = read::common::decode(self.registry, &self.schema, &item);
                self.last_item = Some(item);
                return Some(record);
            }
            if self.done {
                return None;
            }
            if let Err(error) = self.fetch().await {
                return Some(Err(error));
            }
        }
    }

    /// Collect every remaining record, stopping at the first error.
    pub async fn try_collect(mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await {
            records.push(record?);
        }
        Ok(records)
    }

    /// Start over from the first page. The next call to [`Cursor::next`] sends a request.
    pub fn rewind(&mut self) {
        self.buffer.clear();
        self.next_key = self.request.start_key().cloned();
        self.page_last_evaluated_key = None;
        self.last_item = None;
        self.started = false;
        self.done = false;
        self.yielded = 0;
        self.pages = 0;
        self.count = 0;
        self.scanned_count = 0;
    }

    /// Key to resume from with `exclusive_start_key`.
    ///
    /// In the middle of a page this is the key of the last record returned; at a page
    /// boundary it is the key reported by the service, `None` after the last page.
    pub fn last_evaluated_key(&self) -> Option<Item> {
        if !self.started {
            return self.request.start_key().cloned();
        }
        match &self.last_item {
            Some(item) if !self.buffer.is_empty() => Some(
                self.key_names
                    .iter()
                    .filter_map(|name| {
                        item.get(name)
                            .map(|value| (name.clone(), value.clone()))
                    })
                    .collect(),
            ),
            _ => self.page_last_evaluated_key.clone(),
        }
    }

    /// Number of records returned so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Number of pages fetched so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Items matched by the service across the fetched pages.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Items evaluated by the service across the fetched pages, before filtering.
    pub fn scanned_count(&self) -> usize {
        self.scanned_count
    }
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("schema", &self.schema.name())
            .field("request", &self.request)
            .field("limit", &self.limit)
            .field("buffered", &self.buffer.len())
            .field("yielded", &self.yielded)
            .field("pages", &self.pages)
            .field("done", &self.done)
            .finish()
    }
}

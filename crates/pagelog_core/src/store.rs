//! Page and value stores.
//!
//! Both stores sit on top of [`Collection`] trait objects so the same logic
//! runs against memory or journals. [`PageStore::add_page_line`] enforces
//! referential integrity: the page must exist and every reference in the
//! line must resolve to a saved value.

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::{LineType, Page, PageLine, ValueRecord};
use crate::value::{collect_reference_ids, Value};
use futures_util::future::try_join;
use pagelog_storage::{
    Collection, DirLock, Filter, FindOptions, InsertOneResult, JournalCollection, JournalOptions,
    MemoryCollection, ObjectId, Sort,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Collection name for value records.
pub const VALUES: &str = "values";
/// Collection name for pages.
pub const PAGES: &str = "pages";
/// Collection name for page lines.
pub const PAGE_LINES: &str = "pageLines";

/// A window of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    /// Total matching documents, independent of the window.
    pub count: u64,
    /// Documents in the requested window.
    pub items: Vec<T>,
}

fn acknowledged(result: InsertOneResult, collection: &str) -> CoreResult<ObjectId> {
    if result.acknowledged {
        Ok(result.inserted_id)
    } else {
        Err(CoreError::DatabaseFailure {
            collection: collection.to_string(),
        })
    }
}

/// Stores value records.
#[derive(Clone)]
pub struct ValueStore {
    values: Arc<dyn Collection<ValueRecord>>,
}

impl ValueStore {
    /// Creates a value store over the given collection.
    pub fn new(values: Arc<dyn Collection<ValueRecord>>) -> Self {
        Self { values }
    }

    /// Saves a value. No referential check is made.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::DatabaseFailure`] if the write is not
    /// acknowledged.
    pub async fn save_value(&self, value: Value) -> CoreResult<ObjectId> {
        let result = self.values.insert_one(ValueRecord::new(value)).await?;
        acknowledged(result, self.values.name())
    }

    /// Fetches the records for a set of ids. Unknown ids are skipped.
    pub async fn find_values(&self, ids: &BTreeSet<ObjectId>) -> CoreResult<Vec<ValueRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::IdIn(ids.iter().copied().collect());
        Ok(self.values.find(&filter, FindOptions::default()).await?)
    }
}

/// Stores pages and page lines.
#[derive(Clone)]
pub struct PageStore {
    pages: Arc<dyn Collection<Page>>,
    lines: Arc<dyn Collection<PageLine>>,
    values: ValueStore,
}

impl PageStore {
    /// Creates a page store. `values` resolves line references.
    pub fn new(
        pages: Arc<dyn Collection<Page>>,
        lines: Arc<dyn Collection<PageLine>>,
        values: ValueStore,
    ) -> Self {
        Self {
            pages,
            lines,
            values,
        }
    }

    /// Creates a page and returns its id.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::DatabaseFailure`] if the write is not
    /// acknowledged.
    pub async fn create_page(&self, title: impl Into<String>) -> CoreResult<ObjectId> {
        let result = self.pages.insert_one(Page::new(title)).await?;
        acknowledged(result, self.pages.name())
    }

    /// Looks up a page by id.
    pub async fn get_page(&self, page_id: ObjectId) -> CoreResult<Option<Page>> {
        let filter = Filter::Id(page_id);
        let mut found = self
            .pages
            .find(&filter, FindOptions::default().with_limit(1))
            .await?;
        Ok(found.pop())
    }

    /// Returns the first page with exactly this title, in insertion order.
    pub async fn find_page_by_title(&self, title: &str) -> CoreResult<Option<Page>> {
        let all = Filter::All;
        let pages = self.pages.find(&all, FindOptions::default()).await?;
        Ok(pages.into_iter().find(|page| page.title == title))
    }

    /// Appends a line to a page.
    ///
    /// The page lookup and the batch fetch of referenced values run
    /// concurrently. The line is inserted only if the page exists and every
    /// distinct reference resolves.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ResourceNotFound`] naming the page, or the unresolved
    ///   value ids
    /// - [`CoreError::DatabaseFailure`] if the insert is not acknowledged
    pub async fn add_page_line(
        &self,
        page_id: ObjectId,
        line_type: LineType,
        line: Vec<Value>,
    ) -> CoreResult<ObjectId> {
        let wanted = collect_reference_ids(&line);
        let (page, found) = try_join(self.get_page(page_id), self.values.find_values(&wanted)).await?;

        if page.is_none() {
            tracing::error!(page_id = %page_id, "page was not found");
            return Err(CoreError::ResourceNotFound {
                resource: "page",
                ids: vec![page_id],
            });
        }

        let resolved: BTreeSet<ObjectId> = found.iter().map(|record| record.id).collect();
        if resolved.len() != wanted.len() {
            let missing: Vec<ObjectId> = wanted.difference(&resolved).copied().collect();
            tracing::error!(
                page_id = %page_id,
                expected = wanted.len(),
                resolved = resolved.len(),
                missing = ?missing,
                "unresolved value references"
            );
            return Err(CoreError::ResourceNotFound {
                resource: "value",
                ids: missing,
            });
        }

        let result = self
            .lines
            .insert_one(PageLine::new(page_id, line_type, line))
            .await?;
        acknowledged(result, self.lines.name())
    }

    /// Lists pages newest first.
    ///
    /// `count` is the total number of pages regardless of the window.
    pub async fn get_pages(&self, offset: u64, limit: u64) -> CoreResult<Listing<Page>> {
        let options = FindOptions::default()
            .with_sort(Sort::NewestFirst)
            .with_skip(offset)
            .with_limit(limit);
        let all = Filter::All;
        let (items, count) = try_join(
            self.pages.find(&all, options),
            self.pages.count_documents(&all),
        )
        .await?;
        Ok(Listing { count, items })
    }

    /// Lists the lines of one page in insertion order.
    pub async fn get_page_lines(
        &self,
        page_id: ObjectId,
        offset: u64,
        limit: u64,
    ) -> CoreResult<Listing<PageLine>> {
        let filter = Filter::FieldEq {
            field: PageLine::PAGE_ID_FIELD,
            value: page_id,
        };
        let options = FindOptions::default().with_skip(offset).with_limit(limit);
        let (items, count) = try_join(
            self.lines.find(&filter, options),
            self.lines.count_documents(&filter),
        )
        .await?;
        Ok(Listing { count, items })
    }

    /// The value store backing reference checks.
    #[must_use]
    pub fn values(&self) -> &ValueStore {
        &self.values
    }
}

/// The value and page stores opened from one [`StoreConfig`].
#[derive(Clone)]
pub struct Stores {
    /// Value records.
    pub values: ValueStore,
    /// Pages and lines.
    pub pages: PageStore,
    /// Held while journals are open for writing.
    _lock: Option<Arc<DirLock>>,
}

impl Stores {
    /// Opens the three collections: journals under `data_dir` when set,
    /// memory otherwise.
    ///
    /// A writable open locks the directory for as long as any clone of the
    /// returned stores is alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is locked by another writer, or
    /// if a journal cannot be opened or replayed.
    pub fn open(config: &StoreConfig) -> CoreResult<Self> {
        let Some(dir) = &config.data_dir else {
            return Ok(Self::in_memory());
        };

        let lock = if config.read_only {
            None
        } else {
            Some(Arc::new(DirLock::acquire(dir)?))
        };
        let options = JournalOptions {
            sync_on_insert: config.sync_on_insert,
            read_only: config.read_only,
        };
        tracing::info!(
            data_dir = %dir.display(),
            read_only = config.read_only,
            "opening journals"
        );

        let mut stores = Self::from_collections(
            Arc::new(JournalCollection::open(dir, VALUES, options)?),
            Arc::new(JournalCollection::open(dir, PAGES, options)?),
            Arc::new(JournalCollection::open(dir, PAGE_LINES, options)?),
        );
        stores._lock = lock;
        Ok(stores)
    }

    /// Creates empty in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_collections(
            Arc::new(MemoryCollection::new(VALUES)),
            Arc::new(MemoryCollection::new(PAGES)),
            Arc::new(MemoryCollection::new(PAGE_LINES)),
        )
    }

    /// Wires stores over arbitrary collections.
    pub fn from_collections(
        values: Arc<dyn Collection<ValueRecord>>,
        pages: Arc<dyn Collection<Page>>,
        lines: Arc<dyn Collection<PageLine>>,
    ) -> Self {
        let values = ValueStore::new(values);
        let pages = PageStore::new(pages, lines, values.clone());
        Self {
            values,
            pages,
            _lock: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use pagelog_storage::{Document, StorageError, StorageResult};
    use tempfile::tempdir;

    #[tokio::test]
    async fn add_line_with_resolved_references() {
        let stores = Stores::in_memory();
        let page = stores.pages.create_page("boot").await.unwrap();
        let v1 = stores.values.save_value(Value::from("blob")).await.unwrap();
        let v2 = stores.values.save_value(Value::Number(2.0)).await.unwrap();

        let line = vec![
            Value::from("loaded"),
            Value::Reference(v1),
            Value::Object(vec![(Value::Reference(v2), Value::Reference(v1))]),
        ];
        let line_id = stores
            .pages
            .add_page_line(page, LineType::Log, line.clone())
            .await
            .unwrap();

        let lines = stores.pages.get_page_lines(page, 0, 10).await.unwrap();
        assert_eq!(lines.count, 1);
        assert_eq!(lines.items[0].id, line_id);
        assert_eq!(lines.items[0].line, line);
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let stores = Stores::in_memory();
        let ghost = ObjectId::new();
        let err = stores
            .pages
            .add_page_line(ghost, LineType::Log, vec![Value::Null])
            .await
            .unwrap_err();
        match err {
            CoreError::ResourceNotFound { resource, ids } => {
                assert_eq!(resource, "page");
                assert_eq!(ids, vec![ghost]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unresolved_reference_is_not_found() {
        let stores = Stores::in_memory();
        let page = stores.pages.create_page("p").await.unwrap();
        let saved = stores.values.save_value(Value::Null).await.unwrap();
        let ghost = ObjectId::new();

        let err = stores
            .pages
            .add_page_line(
                page,
                LineType::Error,
                vec![Value::Reference(saved), Value::Array(vec![Value::Reference(ghost)])],
            )
            .await
            .unwrap_err();
        match err {
            CoreError::ResourceNotFound { resource, ids } => {
                assert_eq!(resource, "value");
                assert_eq!(ids, vec![ghost]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(stores.pages.get_page_lines(page, 0, 10).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn repeated_reference_counts_once() {
        let stores = Stores::in_memory();
        let page = stores.pages.create_page("p").await.unwrap();
        let v = stores.values.save_value(Value::Null).await.unwrap();

        let line = vec![Value::Reference(v), Value::Reference(v), Value::Reference(v)];
        assert!(stores
            .pages
            .add_page_line(page, LineType::Log, line)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn pages_newest_first_with_total_count() {
        let stores = Stores::in_memory();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(stores.pages.create_page(format!("page {i}")).await.unwrap());
        }

        let listing = stores.pages.get_pages(1, 2).await.unwrap();
        assert_eq!(listing.count, 5);
        let got: Vec<_> = listing.items.iter().map(|p| p.id).collect();
        assert_eq!(got, vec![ids[3], ids[2]]);

        let tail = stores.pages.get_pages(4, 10).await.unwrap();
        assert_eq!(tail.items.len(), 1);
        assert_eq!(tail.items[0].id, ids[0]);

        let beyond = stores.pages.get_pages(9, 10).await.unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.count, 5);
    }

    #[tokio::test]
    async fn page_lines_are_scoped_to_page() {
        let stores = Stores::in_memory();
        let a = stores.pages.create_page("a").await.unwrap();
        let b = stores.pages.create_page("b").await.unwrap();
        for i in 0..3 {
            stores
                .pages
                .add_page_line(a, LineType::Log, vec![Value::Number(f64::from(i))])
                .await
                .unwrap();
        }
        stores
            .pages
            .add_page_line(b, LineType::Log, vec![])
            .await
            .unwrap();

        let listing = stores.pages.get_page_lines(a, 1, 1).await.unwrap();
        assert_eq!(listing.count, 3);
        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.items[0].line, vec![Value::Number(1.0)]);
    }

    #[tokio::test]
    async fn find_page_by_title_returns_first() {
        let stores = Stores::in_memory();
        let first = stores.pages.create_page("dup").await.unwrap();
        stores.pages.create_page("dup").await.unwrap();

        let page = stores.pages.find_page_by_title("dup").await.unwrap().unwrap();
        assert_eq!(page.id, first);
        assert!(stores
            .pages
            .find_page_by_title("missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn journals_survive_reopen() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::new().data_dir(dir.path());

        let (page, value) = {
            let stores = Stores::open(&config).unwrap();
            let page = stores.pages.create_page("persisted").await.unwrap();
            let value = stores.values.save_value(Value::from("v")).await.unwrap();
            stores
                .pages
                .add_page_line(page, LineType::Log, vec![Value::Reference(value)])
                .await
                .unwrap();
            (page, value)
        };

        let stores = Stores::open(&config).unwrap();
        let pages = stores.pages.get_pages(0, 10).await.unwrap();
        assert_eq!(pages.items[0].id, page);
        let lines = stores.pages.get_page_lines(page, 0, 10).await.unwrap();
        assert_eq!(lines.items[0].line, vec![Value::Reference(value)]);
    }

    #[tokio::test]
    async fn second_writer_is_refused() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::new().data_dir(dir.path());
        let writer = Stores::open(&config).unwrap();

        assert!(matches!(
            Stores::open(&config),
            Err(CoreError::Storage(StorageError::Locked(_)))
        ));

        drop(writer);
        assert!(Stores::open(&config).is_ok());
    }

    #[tokio::test]
    async fn reader_opens_alongside_writer() {
        let dir = tempdir().unwrap();
        let writer = Stores::open(&StoreConfig::new().data_dir(dir.path())).unwrap();
        let page = writer.pages.create_page("live").await.unwrap();

        let reader = Stores::open(&StoreConfig::new().data_dir(dir.path()).read_only(true)).unwrap();
        let pages = reader.pages.get_pages(0, 10).await.unwrap();
        assert_eq!(pages.items[0].id, page);
        assert!(matches!(
            reader.pages.create_page("refused").await,
            Err(CoreError::Storage(StorageError::NotWritable(_)))
        ));

        // The writer still appends after the reader has come and gone.
        drop(reader);
        writer.pages.create_page("after").await.unwrap();
        assert_eq!(writer.pages.get_pages(0, 10).await.unwrap().count, 2);
    }

    /// Collection whose writes are never acknowledged.
    struct Unacknowledged;

    impl Collection<Page> for Unacknowledged {
        fn name(&self) -> &str {
            "pages"
        }

        fn find<'a>(
            &'a self,
            _filter: &'a Filter,
            _options: FindOptions,
        ) -> BoxFuture<'a, StorageResult<Vec<Page>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn count_documents<'a>(&'a self, _filter: &'a Filter) -> BoxFuture<'a, StorageResult<u64>> {
            Box::pin(async { Ok(0) })
        }

        fn insert_one(&self, document: Page) -> BoxFuture<'_, StorageResult<InsertOneResult>> {
            Box::pin(async move {
                Ok(InsertOneResult {
                    acknowledged: false,
                    inserted_id: document.id(),
                })
            })
        }
    }

    #[tokio::test]
    async fn unacknowledged_write_is_database_failure() {
        let stores = Stores::from_collections(
            Arc::new(MemoryCollection::new(VALUES)),
            Arc::new(Unacknowledged),
            Arc::new(MemoryCollection::new(PAGE_LINES)),
        );
        let err = stores.pages.create_page("x").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::DatabaseFailure { ref collection } if collection == "pages"
        ));
    }
}

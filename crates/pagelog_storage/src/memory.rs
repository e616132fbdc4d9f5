//! In-memory collection for tests and ephemeral servers.

use crate::collection::{Collection, DocumentSet, Filter, FindOptions, InsertOneResult};
use crate::document::Document;
use crate::error::StorageResult;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;

/// An in-memory collection.
///
/// Nothing survives the process. Inserts are always acknowledged.
///
/// # Example
///
/// ```rust,ignore
/// let pages: MemoryCollection<Page> = MemoryCollection::new("pages");
/// let result = pages.insert_one(page).await?;
/// assert!(result.acknowledged);
/// ```
#[derive(Debug)]
pub struct MemoryCollection<D> {
    name: String,
    documents: RwLock<DocumentSet<D>>,
}

impl<D: Document> MemoryCollection<D> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(DocumentSet::new()),
        }
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns true if nothing has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<D: Document> Collection<D> for MemoryCollection<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn find<'a>(
        &'a self,
        filter: &'a Filter,
        options: FindOptions,
    ) -> BoxFuture<'a, StorageResult<Vec<D>>> {
        Box::pin(async move { Ok(self.documents.read().find(filter, options)) })
    }

    fn count_documents<'a>(&'a self, filter: &'a Filter) -> BoxFuture<'a, StorageResult<u64>> {
        Box::pin(async move { Ok(self.documents.read().count(filter)) })
    }

    fn insert_one(&self, document: D) -> BoxFuture<'_, StorageResult<InsertOneResult>> {
        Box::pin(async move {
            let inserted_id = document.id();
            let mut documents = self.documents.write();
            documents.ensure_absent(&inserted_id)?;
            documents.push(document);
            Ok(InsertOneResult {
                acknowledged: true,
                inserted_id,
            })
        })
    }
}

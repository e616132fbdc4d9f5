//! The collection trait and query types.

use crate::document::Document;
use crate::error::{StorageError, StorageResult};
use crate::id::ObjectId;
use futures_util::future::BoxFuture;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// Selects documents in a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every document.
    All,
    /// The document with this id.
    Id(ObjectId),
    /// Documents whose id is in the set.
    IdIn(Vec<ObjectId>),
    /// Documents whose id-valued field equals `value`.
    FieldEq {
        /// Field name, as understood by [`Document::field`].
        field: &'static str,
        /// Expected id.
        value: ObjectId,
    },
}

impl Filter {
    /// Returns true if the document is selected by this filter.
    pub fn matches<D: Document>(&self, document: &D) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(id) => document.id() == *id,
            Filter::IdIn(ids) => ids.contains(&document.id()),
            Filter::FieldEq { field, value } => document.field(field) == Some(*value),
        }
    }
}

/// Result ordering for [`Collection::find`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sort {
    /// Insertion order.
    #[default]
    Natural,
    /// `created_at` descending, ties broken by id descending.
    NewestFirst,
    /// `created_at` ascending, ties broken by id ascending.
    OldestFirst,
}

/// Options for [`Collection::find`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Result ordering.
    pub sort: Sort,
    /// Number of matching documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return. `None` means unbounded.
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Sets the ordering.
    #[must_use]
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Sets the number of documents to skip.
    #[must_use]
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the maximum number of documents to return.
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Outcome of [`Collection::insert_one`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOneResult {
    /// Whether the write was confirmed by the backend.
    pub acknowledged: bool,
    /// Id of the inserted document.
    pub inserted_id: ObjectId,
}

/// An asynchronous typed document collection.
///
/// The trait is object-safe so stores can hold `Arc<dyn Collection<D>>`
/// and swap the in-memory and journaled implementations.
pub trait Collection<D: Document>: Send + Sync {
    /// Collection name, used in logs and journal file names.
    fn name(&self) -> &str;

    /// Returns matching documents, ordered and windowed by `options`.
    fn find<'a>(
        &'a self,
        filter: &'a Filter,
        options: FindOptions,
    ) -> BoxFuture<'a, StorageResult<Vec<D>>>;

    /// Counts matching documents, ignoring any window.
    fn count_documents<'a>(&'a self, filter: &'a Filter) -> BoxFuture<'a, StorageResult<u64>>;

    /// Inserts one document.
    fn insert_one(&self, document: D) -> BoxFuture<'_, StorageResult<InsertOneResult>>;
}

/// Documents held in insertion order with an id index.
///
/// Shared by the in-memory and journaled collections.
#[derive(Debug)]
pub(crate) struct DocumentSet<D> {
    documents: Vec<D>,
    by_id: HashMap<ObjectId, usize>,
}

impl<D: Document> DocumentSet<D> {
    pub(crate) fn new() -> Self {
        Self {
            documents: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.documents.len()
    }

    pub(crate) fn contains(&self, id: &ObjectId) -> bool {
        self.by_id.contains_key(id)
    }

    pub(crate) fn ensure_absent(&self, id: &ObjectId) -> StorageResult<()> {
        if self.contains(id) {
            return Err(StorageError::invalid_document(format!("duplicate id {id}")));
        }
        Ok(())
    }

    pub(crate) fn push(&mut self, document: D) {
        self.by_id.insert(document.id(), self.documents.len());
        self.documents.push(document);
    }

    fn matching<'s>(&'s self, filter: &Filter) -> Vec<&'s D> {
        match filter {
            Filter::Id(id) => self
                .by_id
                .get(id)
                .map(|&i| &self.documents[i])
                .into_iter()
                .collect(),
            Filter::IdIn(ids) => {
                let mut seen = HashSet::new();
                let mut positions: Vec<usize> = ids
                    .iter()
                    .filter(|id| seen.insert(**id))
                    .filter_map(|id| self.by_id.get(id).copied())
                    .collect();
                positions.sort_unstable();
                positions.into_iter().map(|i| &self.documents[i]).collect()
            }
            _ => self
                .documents
                .iter()
                .filter(|d| filter.matches(*d))
                .collect(),
        }
    }

    pub(crate) fn find(&self, filter: &Filter, options: FindOptions) -> Vec<D> {
        let mut selected = self.matching(filter);
        match options.sort {
            Sort::Natural => {}
            Sort::NewestFirst => selected.sort_by_key(|d| Reverse((d.created_at(), d.id()))),
            Sort::OldestFirst => selected.sort_by_key(|d| (d.created_at(), d.id())),
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        selected
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect()
    }

    pub(crate) fn count(&self, filter: &Filter) -> u64 {
        match filter {
            Filter::All => self.documents.len() as u64,
            _ => self.matching(filter).len() as u64,
        }
    }
}

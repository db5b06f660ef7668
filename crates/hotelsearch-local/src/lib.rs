//! hotelsearch-local
//!
//! In-process search service. Keeps every index in memory, uses tantivy for
//! full-text matching and scoring, and evaluates filters, ordering, facets
//! and projection over the stored JSON documents.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

mod filter;
mod index;
mod query;
mod text;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use hotelsearch_core::types::{Document, IndexHandle, IndexSchema, SearchPage, SearchRequest, UploadResult};
use hotelsearch_core::{Error, Result, SearchService};

use index::LocalIndex;

#[derive(Default)]
pub struct LocalSearchService {
    indexes: Mutex<HashMap<String, LocalIndex>>,
}

impl LocalSearchService {
    pub fn new() -> Self { Self::default() }

    pub fn index_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, LocalIndex>>> {
        self.indexes.lock().map_err(|_| Error::Service { status: 500, message: "index registry lock poisoned".to_string() })
    }

    fn with_index<T>(&self, name: &str, f: impl FnOnce(&mut LocalIndex) -> Result<T>) -> Result<T> {
        let mut indexes = self.lock()?;
        let index = indexes.get_mut(name).ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
        f(index)
    }
}

impl SearchService for LocalSearchService {
    async fn delete_index(&self, name: &str) -> Result<()> {
        match self.lock()?.remove(name) {
            Some(_) => {
                tracing::debug!(index = name, "deleted local index");
                Ok(())
            }
            None => Err(Error::IndexNotFound(name.to_string())),
        }
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<IndexHandle> {
        let mut indexes = self.lock()?;
        if indexes.contains_key(&schema.name) { return Err(Error::IndexAlreadyExists(schema.name.clone())); }
        let index = LocalIndex::create(schema)?;
        indexes.insert(schema.name.clone(), index);
        tracing::debug!(index = %schema.name, fields = schema.fields.len(), "created local index");
        Ok(IndexHandle::new(schema.name.clone()))
    }

    async fn merge_or_upload(&self, index: &IndexHandle, documents: &[Document]) -> Result<UploadResult> {
        self.with_index(index.name(), |i| i.merge_or_upload(documents))
    }

    async fn document_count(&self, index: &IndexHandle) -> Result<u64> { self.with_index(index.name(), |i| Ok(i.len())) }

    async fn search_page(&self, index: &IndexHandle, request: &SearchRequest) -> Result<SearchPage> {
        self.with_index(index.name(), |i| i.search(request))
    }

    async fn get_document(&self, index: &IndexHandle, key: &str, select: &[String]) -> Result<Document> {
        self.with_index(index.name(), |i| i.get(key, select))
    }
}

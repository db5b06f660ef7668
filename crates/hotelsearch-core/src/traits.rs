use std::future::Future;

use crate::error::Result;
use crate::types::{Document, IndexHandle, IndexSchema, SearchPage, SearchRequest, UploadResult};

/// Request/response surface of a search service.
///
/// Implemented by the REST client for the hosted service and by the
/// in-process service used for offline runs and tests.
pub trait SearchService: Send + Sync {
    /// Fails with `Error::IndexNotFound` when no index has that name.
    fn delete_index(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    fn create_index(&self, schema: &IndexSchema) -> impl Future<Output = Result<IndexHandle>> + Send;

    /// Merge-or-insert every document; the result carries one entry per key.
    fn merge_or_upload(&self, index: &IndexHandle, documents: &[Document]) -> impl Future<Output = Result<UploadResult>> + Send;

    fn document_count(&self, index: &IndexHandle) -> impl Future<Output = Result<u64>> + Send;

    fn search_page(&self, index: &IndexHandle, request: &SearchRequest) -> impl Future<Output = Result<SearchPage>> + Send;

    /// Fails with `Error::DocumentNotFound` when the key is absent.
    fn get_document(&self, index: &IndexHandle, key: &str, select: &[String]) -> impl Future<Output = Result<Document>> + Send;
}

use hotelsearch_core::types::{IndexHandle, IndexSchema};
use hotelsearch_core::{Error, Result, SearchService};

/// Delete `name` if it exists. A missing index is not an error.
pub async fn reset_index<S: SearchService>(service: &S, name: &str) -> Result<()> {
    match service.delete_index(name).await {
        Ok(()) => {
            tracing::info!(index = name, "deleted existing index");
            Ok(())
        }
        Err(Error::IndexNotFound(_)) => {
            tracing::info!(index = name, "index does not exist yet, nothing to delete");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub async fn create_index<S: SearchService>(service: &S, schema: &IndexSchema) -> Result<IndexHandle> {
    let handle = service.create_index(schema).await?;
    tracing::info!(index = handle.name(), fields = schema.fields.len(), "created index");
    Ok(handle)
}

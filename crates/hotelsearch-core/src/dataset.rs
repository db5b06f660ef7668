use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Document, Hotel, IndexSchema};

/// Records files come either as a bare array or wrapped in `{ "value": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsFile {
    Bare(Vec<Hotel>),
    Wrapped { value: Vec<Hotel> },
}

pub fn load_schema(path: &Path) -> Result<IndexSchema> {
    let raw = fs::read_to_string(path).map_err(|e| with_path(e, path))?;
    let schema: IndexSchema = serde_json::from_str(&raw)?;
    if schema.name.trim().is_empty() { return Err(Error::InvalidSchema(format!("{} declares no index name", path.display()))); }
    tracing::debug!(path = %path.display(), index = %schema.name, fields = schema.fields.len(), "loaded index schema");
    Ok(schema)
}

pub fn load_records(path: &Path) -> Result<Vec<Hotel>> {
    let raw = fs::read_to_string(path).map_err(|e| with_path(e, path))?;
    let records = match serde_json::from_str::<RecordsFile>(&raw) {
        Ok(RecordsFile::Bare(v)) | Ok(RecordsFile::Wrapped { value: v }) => v,
        // Re-parse as a bare array so the caller sees serde's positioned message
        // instead of the untagged enum's generic one.
        Err(_) => serde_json::from_str::<Vec<Hotel>>(&raw)?,
    };
    let unique = unique_keys(&records);
    if unique != records.len() {
        tracing::warn!(path = %path.display(), records = records.len(), unique, "records file repeats keys; later entries merge into earlier ones");
    }
    tracing::debug!(path = %path.display(), records = records.len(), "loaded records");
    Ok(records)
}

pub fn unique_keys(records: &[Hotel]) -> usize { records.iter().map(|r| r.hotel_id.as_str()).collect::<HashSet<_>>().len() }

pub fn to_documents(records: &[Hotel]) -> Result<Vec<Document>> { records.iter().map(Hotel::to_document).collect() }

fn with_path(e: std::io::Error, path: &Path) -> Error {
    Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
}

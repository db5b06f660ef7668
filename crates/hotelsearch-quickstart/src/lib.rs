//! hotelsearch-quickstart
//!
//! The linear quickstart flow over any `SearchService`: reset and create the
//! index, upload the hotel records, wait for the count to settle, then run
//! the query demonstrations.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod lifecycle;
pub mod loader;
pub mod queries;

use std::io::Write;

use hotelsearch_core::config::{ConsistencySettings, Settings, UploadSettings};
use hotelsearch_core::dataset::{to_documents, unique_keys};
use hotelsearch_core::types::{Document, Hotel, IndexHandle, IndexSchema, UploadResult};
use hotelsearch_core::{Result, SearchService};

pub use queries::QueryOutcome;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub index: IndexHandle,
    pub upload: UploadResult,
    pub expected_count: u64,
    pub document_count: u64,
    pub queries: Vec<QueryOutcome>,
    pub lookup: Document,
}

pub struct Quickstart<S: SearchService> {
    service: S,
    upload: UploadSettings,
    consistency: ConsistencySettings,
}

impl<S: SearchService> Quickstart<S> {
    pub fn new(service: S, settings: &Settings) -> Self {
        Self { service, upload: settings.upload.clone(), consistency: settings.consistency.clone() }
    }

    pub fn service(&self) -> &S { &self.service }

    pub async fn run<W: Write>(&self, schema: &IndexSchema, records: &[Hotel], out: &mut W) -> Result<RunSummary> {
        lifecycle::reset_index(&self.service, &schema.name).await?;
        let index = lifecycle::create_index(&self.service, schema).await?;
        writeln!(out, "Created index '{}'", index.name())?;

        let documents = to_documents(records)?;
        let upload = loader::upload(&self.service, &index, &documents, self.upload.batch_size).await?;
        writeln!(out, "Uploaded {} documents ({} failed)", upload.succeeded_count(), upload.failed().count())?;

        let expected_count = unique_keys(records) as u64;
        let document_count = loader::wait_for_count(&self.service, &index, expected_count, &self.consistency).await?;
        writeln!(out, "Index '{}' reports {} documents", index.name(), document_count)?;

        let mut outcomes = Vec::new();
        for demo in queries::demos() {
            outcomes.push(queries::run_demo(&self.service, &index, &demo, out).await?);
        }
        let lookup = queries::lookup(&self.service, &index, queries::LOOKUP_KEY, out).await?;

        tracing::info!(index = index.name(), documents = document_count, "quickstart completed");
        Ok(RunSummary { index, upload, expected_count, document_count, queries: outcomes, lookup })
    }
}

use indicatif::{ProgressBar, ProgressStyle};

use hotelsearch_core::config::ConsistencySettings;
use hotelsearch_core::types::{Document, IndexHandle, UploadResult};
use hotelsearch_core::{Result, SearchService};

/// Merge-or-upload `documents` in batches of at most `batch_size`.
///
/// Per-document failures are logged and returned in the result; only a
/// request-level failure aborts the upload.
pub async fn upload<S: SearchService>(service: &S, index: &IndexHandle, documents: &[Document], batch_size: usize) -> Result<UploadResult> {
    let mut result = UploadResult::default();
    if documents.is_empty() {
        tracing::info!(index = index.name(), "no documents to upload");
        return Ok(result);
    }
    let batch_size = batch_size.max(1);
    tracing::info!(index = index.name(), documents = documents.len(), batch_size, "uploading documents");

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    for (i, batch) in documents.chunks(batch_size).enumerate() {
        pb.set_message(format!("batch {}", i + 1));
        let outcome = match service.merge_or_upload(index, batch).await {
            Ok(outcome) => outcome,
            Err(e) => {
                pb.abandon_with_message("upload failed");
                return Err(e);
            }
        };
        for failed in outcome.failed() {
            tracing::warn!(key = %failed.key, status = failed.status_code, error = ?failed.error_message, "document was not indexed");
        }
        result.extend(outcome);
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("upload completed");
    tracing::info!(succeeded = result.succeeded_count(), failed = result.failed().count(), "upload finished");
    Ok(result)
}

/// Poll the document count until it reaches `expected` or the poll budget
/// runs out. Returns the last observed count either way.
pub async fn wait_for_count<S: SearchService>(service: &S, index: &IndexHandle, expected: u64, consistency: &ConsistencySettings) -> Result<u64> {
    let interval = consistency.poll_interval();
    let mut observed = 0;
    for attempt in 1..=consistency.max_polls.max(1) {
        if !interval.is_zero() { tokio::time::sleep(interval).await; }
        observed = service.document_count(index).await?;
        tracing::debug!(index = index.name(), attempt, observed, expected, "polled document count");
        if observed >= expected { return Ok(observed); }
    }
    tracing::warn!(index = index.name(), observed, expected, polls = consistency.max_polls, "document count did not converge");
    Ok(observed)
}

//! Request and response bodies of the service's REST surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use hotelsearch_core::types::{Document, FacetValue, IndexingResult, SearchHit, SearchOptions, SearchPage, SearchRequest, UploadResult};

pub const MERGE_OR_UPLOAD: &str = "mergeOrUpload";

/// Body of `POST /indexes/{name}/docs/search`; also the shape of
/// `@search.nextPageParameters`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub search: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,
    #[serde(rename = "searchFields", default, skip_serializing_if = "Option::is_none")]
    pub search_fields: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub count: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
}

fn join(items: &[String]) -> Option<String> { (!items.is_empty()).then(|| items.join(",")) }

fn split(joined: Option<String>) -> Vec<String> {
    joined.map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()).unwrap_or_default()
}

impl From<&SearchRequest> for SearchBody {
    fn from(request: &SearchRequest) -> Self {
        let o = &request.options;
        Self {
            search: request.search_text.clone(),
            select: join(&o.select),
            filter: o.filter.clone(),
            orderby: join(&o.order_by),
            search_fields: join(&o.search_fields),
            facets: o.facets.clone(),
            count: o.include_total_count,
            top: o.top,
            skip: o.skip,
        }
    }
}

impl From<SearchBody> for SearchRequest {
    fn from(body: SearchBody) -> Self {
        let options = SearchOptions {
            select: split(body.select),
            filter: body.filter,
            order_by: split(body.orderby),
            search_fields: split(body.search_fields),
            facets: body.facets,
            include_total_count: body.count,
            top: body.top,
            skip: body.skip,
        };
        SearchRequest::new(body.search, options)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "@odata.count", default)]
    pub count: Option<u64>,
    #[serde(rename = "@search.facets", default)]
    pub facets: BTreeMap<String, Vec<FacetBucket>>,
    #[serde(default)]
    pub value: Vec<Document>,
    #[serde(rename = "@search.nextPageParameters", default)]
    pub next_page_parameters: Option<SearchBody>,
}

#[derive(Debug, Deserialize)]
pub struct FacetBucket {
    #[serde(default)]
    pub value: Value,
    pub count: u64,
}

impl SearchResponse {
    pub fn into_page(self) -> SearchPage {
        let hits = self
            .value
            .into_iter()
            .map(|mut document| {
                let score = document.remove("@search.score").and_then(|v| v.as_f64()).unwrap_or_default();
                document.retain(|name, _| !name.starts_with("@search."));
                SearchHit { score, document }
            })
            .collect();
        let facets = self
            .facets
            .into_iter()
            .map(|(field, buckets)| (field, buckets.into_iter().map(|b| FacetValue { value: b.value, count: b.count }).collect()))
            .collect();
        SearchPage { hits, total_count: self.count, facets, next_page: self.next_page_parameters.map(SearchRequest::from) }
    }
}

#[derive(Debug, Serialize)]
pub struct IndexBatch<'a> {
    pub value: Vec<IndexAction<'a>>,
}

#[derive(Debug, Serialize)]
pub struct IndexAction<'a> {
    #[serde(rename = "@search.action")]
    pub action: &'static str,
    #[serde(flatten)]
    pub document: &'a Document,
}

impl<'a> IndexBatch<'a> {
    pub fn merge_or_upload(documents: &'a [Document]) -> Self {
        Self { value: documents.iter().map(|document| IndexAction { action: MERGE_OR_UPLOAD, document }).collect() }
    }
}

#[derive(Debug, Deserialize)]
pub struct IndexBatchResponse {
    #[serde(default)]
    pub value: Vec<IndexingResultBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingResultBody {
    pub key: String,
    pub status: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    pub status_code: u16,
}

impl From<IndexBatchResponse> for UploadResult {
    fn from(body: IndexBatchResponse) -> Self {
        let results = body
            .value
            .into_iter()
            .map(|r| IndexingResult { key: r.key, succeeded: r.status, status_code: r.status_code, error_message: r.error_message })
            .collect();
        UploadResult { results }
    }
}

#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Best-effort extraction of the service's error message from a response body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error: ErrorDetail { code: Some(code), message } }) => format!("{}: {}", code, message),
        Ok(ErrorEnvelope { error: ErrorDetail { code: None, message } }) => message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// `$count` answers with a plain-text integer, sometimes prefixed by a BOM.
pub fn parse_count(body: &str) -> Option<u64> { body.trim_start_matches('\u{feff}').trim().parse().ok() }

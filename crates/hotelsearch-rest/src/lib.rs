//! hotelsearch-rest
//!
//! `SearchService` over the hosted service's REST API. Every request carries
//! the admin key in the `api-key` header and the configured `api-version`
//! query parameter.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod wire;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use hotelsearch_core::config::{Credentials, SearchSettings};
use hotelsearch_core::types::{Document, IndexHandle, IndexSchema, SearchPage, SearchRequest, UploadResult};
use hotelsearch_core::{Error, Result, SearchService};

use wire::{IndexBatch, IndexBatchResponse, SearchBody, SearchResponse};

pub struct RestSearchService {
    client: Client,
    endpoint: Url,
    api_version: String,
}

fn transport(e: reqwest::Error) -> Error { Error::Transport(e.to_string()) }

impl RestSearchService {
    pub fn new(credentials: &Credentials, settings: &SearchSettings) -> Result<Self> {
        let endpoint = Url::parse(&credentials.endpoint)
            .map_err(|e| Error::Config(format!("invalid service endpoint '{}': {}", credentials.endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(Error::Config(format!("service endpoint '{}' cannot carry a path", credentials.endpoint)));
        }
        let mut key = HeaderValue::from_str(&credentials.key).map_err(|_| Error::Config("SEARCH_API_KEY is not a valid header value".to_string()))?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert("api-key", key);

        let client = Client::builder().default_headers(headers).timeout(settings.timeout()).build().map_err(transport)?;
        Ok(Self { client, endpoint, api_version: settings.api_version.clone() })
    }

    pub fn endpoint(&self) -> &Url { &self.endpoint }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("service endpoint '{}' cannot carry a path", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", &self.api_version);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!(%method, path = url.path(), "search service request");
        self.client.request(method, url)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> { builder.send().await.map_err(transport) }
}

/// Turn a non-success response into `Error::Service`, keeping the service's message.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() { return Ok(response); }
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(status = status.as_u16(), error = %e, "could not read error response body");
            String::new()
        }
    };
    let message = wire::error_message(&body);
    tracing::debug!(status = status.as_u16(), %message, "search service error");
    Err(Error::Service { status: status.as_u16(), message })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = check(response).await?.bytes().await.map_err(transport)?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl SearchService for RestSearchService {
    async fn delete_index(&self, name: &str) -> Result<()> {
        let response = self.send(self.request(Method::DELETE, self.url(&["indexes", name])?)).await?;
        if response.status() == StatusCode::NOT_FOUND { return Err(Error::IndexNotFound(name.to_string())); }
        check(response).await?;
        Ok(())
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<IndexHandle> {
        let builder = self.request(Method::POST, self.url(&["indexes"])?).json(schema);
        let response = self.send(builder).await?;
        if response.status() == StatusCode::CONFLICT { return Err(Error::IndexAlreadyExists(schema.name.clone())); }
        let created: IndexSchema = read_json(response).await?;
        Ok(IndexHandle::new(created.name))
    }

    async fn merge_or_upload(&self, index: &IndexHandle, documents: &[Document]) -> Result<UploadResult> {
        let url = self.url(&["indexes", index.name(), "docs", "index"])?;
        let builder = self.request(Method::POST, url).json(&IndexBatch::merge_or_upload(documents));
        let response = self.send(builder).await?;
        if response.status() == StatusCode::NOT_FOUND { return Err(Error::IndexNotFound(index.name().to_string())); }
        // 207 means some documents failed; the per-key results say which.
        let body: IndexBatchResponse = read_json(response).await?;
        Ok(body.into())
    }

    async fn document_count(&self, index: &IndexHandle) -> Result<u64> {
        let url = self.url(&["indexes", index.name(), "docs", "$count"])?;
        let response = self.send(self.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND { return Err(Error::IndexNotFound(index.name().to_string())); }
        let response = check(response).await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;
        wire::parse_count(&body).ok_or_else(|| Error::Service { status, message: format!("unexpected document count '{}'", body.trim()) })
    }

    async fn search_page(&self, index: &IndexHandle, request: &SearchRequest) -> Result<SearchPage> {
        let url = self.url(&["indexes", index.name(), "docs", "search"])?;
        let builder = self.request(Method::POST, url).header(CONTENT_TYPE, "application/json").json(&SearchBody::from(request));
        let response = self.send(builder).await?;
        if response.status() == StatusCode::NOT_FOUND { return Err(Error::IndexNotFound(index.name().to_string())); }
        let body: SearchResponse = read_json(response).await?;
        Ok(body.into_page())
    }

    async fn get_document(&self, index: &IndexHandle, key: &str, select: &[String]) -> Result<Document> {
        let mut url = self.url(&["indexes", index.name(), "docs", key])?;
        if !select.is_empty() { url.query_pairs_mut().append_pair("$select", &select.join(",")); }
        let response = self.send(self.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND { return Err(Error::DocumentNotFound(key.to_string())); }
        read_json(response).await
    }
}

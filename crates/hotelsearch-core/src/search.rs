//! Lazy, page-following search results.
//!
//! `run_query` fetches the first page eagerly (it carries the total count and
//! facets) and hands back a stream that yields hits in arrival order, fetching
//! further pages only when the consumer reaches the end of the current one.

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::error::{Error, Result};
use crate::traits::SearchService;
use crate::types::{Facets, IndexHandle, SearchHit, SearchOptions, SearchRequest};

pub struct SearchResults<'a> {
    pub total_count: Option<u64>,
    pub facets: Facets,
    hits: BoxStream<'a, Result<SearchHit>>,
}

impl<'a> SearchResults<'a> {
    pub async fn next_hit(&mut self) -> Result<Option<SearchHit>> { self.hits.try_next().await }

    pub fn into_hits(self) -> BoxStream<'a, Result<SearchHit>> { self.hits }
}

pub async fn run_query<'a, S: SearchService>(
    service: &'a S,
    index: &'a IndexHandle,
    search_text: &str,
    options: SearchOptions,
) -> Result<SearchResults<'a>> {
    let request = SearchRequest::new(search_text, options);
    let first = service.search_page(index, &request).await?;
    let total_count = first.total_count;
    let facets = first.facets;

    let hits = stream::try_unfold((first.hits.into_iter(), first.next_page), move |(mut buffered, mut next)| async move {
        loop {
            if let Some(hit) = buffered.next() { return Ok::<_, Error>(Some((hit, (buffered, next)))); }
            let Some(request) = next.take() else { return Ok(None) };
            tracing::debug!(index = index.name(), skip = ?request.options.skip, "fetching next result page");
            let page = service.search_page(index, &request).await?;
            if page.hits.is_empty() { return Ok(None); }
            buffered = page.hits.into_iter();
            next = page.next_page;
        }
    })
    .boxed();

    Ok(SearchResults { total_count, facets, hits })
}

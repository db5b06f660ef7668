//! The fixed query demonstrations run against a populated hotels index.

use serde_json::Value;
use std::io::Write;

use hotelsearch_core::types::{Document, Facets, IndexHandle, SearchHit, SearchOptions};
use hotelsearch_core::{run_query, Result, SearchService};

pub const LOOKUP_KEY: &str = "3";

#[derive(Debug, Clone)]
pub struct Demo {
    pub title: &'static str,
    pub search_text: &'static str,
    pub options: SearchOptions,
}

/// What a demonstration printed, kept for the run summary.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub title: &'static str,
    pub total_count: Option<u64>,
    pub facets: Facets,
    pub hits: Vec<SearchHit>,
}

pub fn demos() -> Vec<Demo> {
    vec![
        Demo {
            title: "Query #1: Search on empty term '*' to return all documents, showing a subset of fields",
            search_text: "*",
            options: SearchOptions::new().select(["HotelId", "HotelName", "Rating"]).include_total_count(true),
        },
        Demo {
            title: "Query #2: Filter on Florida hotels, sorted by rating",
            search_text: "*",
            options: SearchOptions::new()
                .filter("Address/StateProvince eq 'FL'")
                .order_by(["Rating desc"])
                .select(["HotelId", "HotelName", "Rating"]),
        },
        Demo {
            title: "Query #3: Limit search to specific fields (Sublime Palace in HotelName)",
            search_text: "Sublime Palace",
            options: SearchOptions::new().search_fields(["HotelName"]).select(["HotelId", "HotelName", "Rating"]),
        },
        Demo {
            title: "Query #4: Search pool in Tags, faceted on Category",
            search_text: "Pool",
            options: SearchOptions::new()
                .search_fields(["Tags"])
                .facets(["Category"])
                .select(["HotelId", "HotelName", "Category", "Tags"]),
        },
    ]
}

/// Run one demonstration, printing each hit as the stream yields it.
pub async fn run_demo<S, W>(service: &S, index: &IndexHandle, demo: &Demo, out: &mut W) -> Result<QueryOutcome>
where
    S: SearchService,
    W: Write,
{
    writeln!(out, "\n{}", demo.title)?;
    tracing::debug!(index = index.name(), search = demo.search_text, options = ?demo.options, "running query");
    let mut results = run_query(service, index, demo.search_text, demo.options.clone()).await?;
    if let Some(total) = results.total_count { writeln!(out, "Total results: {}", total)?; }

    let mut hits = Vec::new();
    while let Some(hit) = results.next_hit().await? {
        writeln!(out, "{}", format_hit(&hit))?;
        hits.push(hit);
    }
    if hits.is_empty() { writeln!(out, "No results")?; }

    for (field, buckets) in &results.facets {
        writeln!(out, "Facets for {}:", field)?;
        for bucket in buckets { writeln!(out, "   {}: {}", render(&bucket.value), bucket.count)?; }
    }
    Ok(QueryOutcome { title: demo.title, total_count: results.total_count, facets: results.facets, hits })
}

/// Fetch and print a single document by key.
pub async fn lookup<S, W>(service: &S, index: &IndexHandle, key: &str, out: &mut W) -> Result<Document>
where
    S: SearchService,
    W: Write,
{
    writeln!(out, "\nQuery #5: Look up a specific document by key '{}'", key)?;
    let document = service.get_document(index, key, &[]).await?;
    writeln!(out, "{}", format_document(&document))?;
    Ok(document)
}

pub fn format_hit(hit: &SearchHit) -> String { format!("Score: {:.4} | {}", hit.score, format_document(&hit.document)) }

pub fn format_document(document: &Document) -> String {
    document.iter().map(|(name, value)| format!("{}: {}", name, render(value))).collect::<Vec<_>>().join(" | ")
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => format!("[{}]", items.iter().map(render).collect::<Vec<_>>().join(", ")),
        other => other.to_string(),
    }
}

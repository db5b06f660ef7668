//! Domain types shared by the search services and the quickstart flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// A document as it travels to and from a search service: a JSON object
/// keyed by field name.
pub type Document = Map<String, Value>;

/// Facet buckets keyed by facet field name.
pub type Facets = BTreeMap<String, Vec<FacetValue>>;

/// Index schema document. Properties this crate does not model are kept in
/// `extra` and sent back to the service untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexSchema {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggesters: Vec<Suggester>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filterable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facetable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrievable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDefinition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggester {
    pub name: String,
    #[serde(rename = "searchMode")]
    pub search_mode: String,
    #[serde(rename = "sourceFields")]
    pub source_fields: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldDefinition {
    pub fn is_collection(&self) -> bool { self.field_type.starts_with("Collection(") }

    pub fn is_complex(&self) -> bool { self.element_type() == "Edm.ComplexType" }

    /// `Collection(Edm.String)` -> `Edm.String`; scalar types unchanged.
    pub fn element_type(&self) -> &str {
        self.field_type
            .strip_prefix("Collection(")
            .and_then(|t| t.strip_suffix(')'))
            .unwrap_or(&self.field_type)
    }

    pub fn is_string(&self) -> bool { self.element_type() == "Edm.String" }

    pub fn is_key(&self) -> bool { self.key.unwrap_or(false) }

    // Attribute defaults mirror the service: strings are searchable unless
    // told otherwise, simple fields are filterable/facetable, and only
    // non-collection simple fields are sortable.
    pub fn is_searchable(&self) -> bool { self.is_string() && self.searchable.unwrap_or(true) }

    pub fn is_filterable(&self) -> bool { !self.is_complex() && self.filterable.unwrap_or(true) }

    pub fn is_sortable(&self) -> bool { !self.is_complex() && !self.is_collection() && self.sortable.unwrap_or(true) }

    pub fn is_facetable(&self) -> bool { !self.is_complex() && self.facetable.unwrap_or(true) }

    pub fn is_retrievable(&self) -> bool { self.retrievable.unwrap_or(true) }
}

impl IndexSchema {
    pub fn key_field(&self) -> Option<&FieldDefinition> { self.fields.iter().find(|f| f.is_key()) }

    /// Resolve a `/`-separated field path such as `Address/StateProvince`.
    pub fn field_at(&self, path: &str) -> Option<&FieldDefinition> {
        let mut fields = &self.fields;
        let mut found = None;
        for segment in path.split('/') {
            let field = fields.iter().find(|f| f.name == segment)?;
            fields = &field.fields;
            found = Some(field);
        }
        found
    }

    /// Paths of every searchable string leaf, nested ones included.
    pub fn searchable_paths(&self) -> Vec<String> {
        fn walk(prefix: &str, fields: &[FieldDefinition], out: &mut Vec<String>) {
            for f in fields {
                let path = if prefix.is_empty() { f.name.clone() } else { format!("{}/{}", prefix, f.name) };
                if f.is_complex() { walk(&path, &f.fields, out); } else if f.is_searchable() { out.push(path); }
            }
        }
        let mut out = Vec::new();
        walk("", &self.fields, &mut out);
        out
    }

    /// Rename the index while keeping every other property.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Look up a `/`-separated path inside a document.
pub fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('/');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments { current = current.as_object()?.get(segment)?; }
    Some(current)
}

/// One catalog record of the bundled data set.
///
/// Everything but the key is optional so that projected search results
/// (`select`) deserialize into the same type. `None` fields are never
/// serialized, which keeps merge-or-upload from blanking stored values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Hotel {
    pub hotel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Description_fr", default, skip_serializing_if = "Option::is_none")]
    pub description_fr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parking_included: Option<Flag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_renovation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Data sets in the wild carry flags both as JSON booleans and as strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Flag::Bool(b) => Some(*b),
            Flag::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Flag::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            Flag::Text(_) => None,
        }
    }
}

impl Hotel {
    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::InvalidRequest(format!("record did not serialize to an object: {}", other))),
        }
    }

    pub fn from_document(doc: &Document) -> Result<Self> { Ok(serde_json::from_value(Value::Object(doc.clone()))?) }
}

/// Per-query options. Empty lists mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub select: Vec<String>,
    pub filter: Option<String>,
    pub order_by: Vec<String>,
    pub search_fields: Vec<String>,
    pub facets: Vec<String>,
    pub include_total_count: bool,
    pub top: Option<usize>,
    pub skip: Option<usize>,
}

fn owned<I, S>(items: I) -> Vec<String> where I: IntoIterator<Item = S>, S: Into<String> { items.into_iter().map(Into::into).collect() }

impl SearchOptions {
    pub fn new() -> Self { Self::default() }
    pub fn select<I, S>(mut self, fields: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> { self.select = owned(fields); self }
    pub fn filter(mut self, expr: impl Into<String>) -> Self { self.filter = Some(expr.into()); self }
    pub fn order_by<I, S>(mut self, clauses: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> { self.order_by = owned(clauses); self }
    pub fn search_fields<I, S>(mut self, fields: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> { self.search_fields = owned(fields); self }
    pub fn facets<I, S>(mut self, facets: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> { self.facets = owned(facets); self }
    pub fn include_total_count(mut self, yes: bool) -> Self { self.include_total_count = yes; self }
    pub fn top(mut self, n: usize) -> Self { self.top = Some(n); self }
    pub fn skip(mut self, n: usize) -> Self { self.skip = Some(n); self }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub search_text: String,
    pub options: SearchOptions,
}

impl SearchRequest {
    pub fn new(search_text: impl Into<String>, options: SearchOptions) -> Self {
        Self { search_text: search_text.into(), options }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub score: f64,
    pub document: Document,
}

impl SearchHit {
    pub fn get(&self, path: &str) -> Option<&Value> { lookup_path(&self.document, path) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetValue {
    pub value: Value,
    pub count: u64,
}

/// One page of search results. `next_page` is set when the service holds
/// more results than it returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    pub total_count: Option<u64>,
    pub facets: Facets,
    pub next_page: Option<SearchRequest>,
}

/// Reference to an index that exists on the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexHandle {
    name: String,
}

impl IndexHandle {
    pub fn new(name: impl Into<String>) -> Self { Self { name: name.into() } }
    pub fn name(&self) -> &str { &self.name }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingResult {
    pub key: String,
    pub succeeded: bool,
    pub status_code: u16,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadResult {
    pub results: Vec<IndexingResult>,
}

impl UploadResult {
    pub fn succeeded_count(&self) -> usize { self.results.iter().filter(|r| r.succeeded).count() }

    pub fn failed(&self) -> impl Iterator<Item = &IndexingResult> { self.results.iter().filter(|r| !r.succeeded) }

    pub fn extend(&mut self, other: UploadResult) { self.results.extend(other.results); }
}

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use hotelsearch_core::types::{Document, IndexSchema, IndexingResult, SearchHit, SearchPage, SearchRequest, UploadResult};
use hotelsearch_core::{Error, Result};

use crate::filter::Filter;
use crate::query::{compute_facet, parse_facet, parse_order_by, project, sort_candidates, validate_select, Candidate};
use crate::text::TextIndex;

pub(crate) const DEFAULT_TOP: usize = 50;
pub(crate) const MAX_TOP: usize = 1000;

struct StoredDocument {
    seq: u64,
    body: Document,
}

pub(crate) struct LocalIndex {
    schema: IndexSchema,
    key_field: String,
    documents: HashMap<String, StoredDocument>,
    next_seq: u64,
    text: TextIndex,
}

impl LocalIndex {
    pub(crate) fn create(schema: &IndexSchema) -> Result<Self> {
        validate_schema(schema)?;
        let key_field = schema.key_field().map(|f| f.name.clone()).ok_or_else(|| Error::InvalidSchema("no key field".to_string()))?;
        Ok(Self { schema: schema.clone(), key_field, documents: HashMap::new(), next_seq: 0, text: TextIndex::new(schema)? })
    }

    pub(crate) fn len(&self) -> u64 { self.documents.len() as u64 }

    /// Merge-or-insert a batch. Complex fields merge sub-field by sub-field;
    /// every other provided field (collections included) replaces the stored
    /// value. Changes are staged and only applied once the text index commits.
    pub(crate) fn merge_or_upload(&mut self, batch: &[Document]) -> Result<UploadResult> {
        let mut results = Vec::with_capacity(batch.len());
        let mut staged: Vec<(String, Document)> = Vec::new();
        let mut staged_at: HashMap<String, usize> = HashMap::new();
        for incoming in batch {
            let key = match incoming.get(&self.key_field) {
                Some(Value::String(k)) if !k.is_empty() => k.clone(),
                _ => {
                    results.push(IndexingResult {
                        key: String::new(),
                        succeeded: false,
                        status_code: 400,
                        error_message: Some(format!("document is missing string key '{}'", self.key_field)),
                    });
                    continue;
                }
            };
            if let Some(unknown) = unknown_field(&self.schema, incoming, "") {
                results.push(IndexingResult { key, succeeded: false, status_code: 400, error_message: Some(format!("unknown field '{}'", unknown)) });
                continue;
            }
            let status_code = if let Some(&i) = staged_at.get(&key) {
                merge_into(&mut staged[i].1, incoming);
                200
            } else if let Some(existing) = self.documents.get(&key) {
                let mut body = existing.body.clone();
                merge_into(&mut body, incoming);
                staged_at.insert(key.clone(), staged.len());
                staged.push((key.clone(), body));
                200
            } else {
                staged_at.insert(key.clone(), staged.len());
                staged.push((key.clone(), incoming.clone()));
                201
            };
            results.push(IndexingResult { key, succeeded: true, status_code, error_message: None });
        }

        self.text.upsert(staged.iter().map(|(key, body)| (key.as_str(), body)))?;
        for (key, body) in staged {
            match self.documents.get_mut(&key) {
                Some(existing) => existing.body = body,
                None => {
                    self.documents.insert(key, StoredDocument { seq: self.next_seq, body });
                    self.next_seq += 1;
                }
            }
        }
        Ok(UploadResult { results })
    }

    pub(crate) fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let options = &request.options;
        let filter = options.filter.as_deref().filter(|f| !f.trim().is_empty()).map(|f| Filter::parse(f, &self.schema)).transpose()?;
        let sort_keys = parse_order_by(&options.order_by, &self.schema)?;
        validate_select(&options.select, &self.schema)?;
        let facets = options.facets.iter().map(|f| parse_facet(f, &self.schema)).collect::<Result<Vec<_>>>()?;
        for field in &options.search_fields {
            match self.schema.field_at(field) {
                Some(f) if f.is_searchable() => {}
                _ => return Err(Error::InvalidRequest(format!("'{}' is not a searchable field", field))),
            }
        }
        let top = options.top.unwrap_or(DEFAULT_TOP);
        if top > MAX_TOP { return Err(Error::InvalidRequest(format!("top must be at most {}", MAX_TOP))); }
        let skip = options.skip.unwrap_or(0);

        let text = request.search_text.trim();
        let scores = if text.is_empty() || text == "*" { None } else { Some(self.text.matches(text, &options.search_fields)?) };

        let mut candidates: Vec<Candidate<'_>> = self
            .documents
            .iter()
            .filter_map(|(key, stored)| {
                let score = match &scores {
                    None => 1.0,
                    Some(scores) => f64::from(*scores.get(key)?),
                };
                Some(Candidate { seq: stored.seq, score, doc: &stored.body })
            })
            .filter(|c| filter.as_ref().map_or(true, |f| f.matches(c.doc)))
            .collect();
        sort_candidates(&mut candidates, &sort_keys);

        let total = candidates.len();
        let facets = facets.iter().map(|spec| (spec.field.clone(), compute_facet(spec, candidates.iter().map(|c| c.doc)))).collect();
        let hits: Vec<SearchHit> = candidates
            .iter()
            .skip(skip)
            .take(top)
            .map(|c| SearchHit { score: c.score, document: project(c.doc, &options.select, &self.schema) })
            .collect();

        let returned = skip + hits.len();
        let next_page = (options.top.is_none() && returned < total && !hits.is_empty()).then(|| {
            let mut next = request.clone();
            next.options.skip = Some(returned);
            next
        });

        Ok(SearchPage { hits, total_count: options.include_total_count.then_some(total as u64), facets, next_page })
    }

    pub(crate) fn get(&self, key: &str, select: &[String]) -> Result<Document> {
        validate_select(select, &self.schema)?;
        let stored = self.documents.get(key).ok_or_else(|| Error::DocumentNotFound(key.to_string()))?;
        Ok(project(&stored.body, select, &self.schema))
    }
}

/// Overlay `incoming` onto `stored`, recursing into nested objects.
fn merge_into(stored: &mut Document, incoming: &Document) {
    for (name, value) in incoming {
        if let (Some(Value::Object(current)), Value::Object(update)) = (stored.get_mut(name), value) {
            merge_into(current, update);
            continue;
        }
        stored.insert(name.clone(), value.clone());
    }
}

/// First field path in `doc` (nested objects and complex collections
/// included) that the schema does not declare.
fn unknown_field(schema: &IndexSchema, doc: &Document, prefix: &str) -> Option<String> {
    for (name, value) in doc {
        let path = if prefix.is_empty() { name.clone() } else { format!("{}/{}", prefix, name) };
        let Some(field) = schema.field_at(&path) else { return Some(path) };
        if !field.is_complex() { continue; }
        let nested: Vec<&Document> = match value {
            Value::Object(obj) => vec![obj],
            Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
            _ => Vec::new(),
        };
        if let Some(found) = nested.into_iter().find_map(|obj| unknown_field(schema, obj, &path)) { return Some(found); }
    }
    None
}

/// Index names are lowercase letters, digits and dashes, at most 128 chars,
/// starting and ending with a letter or digit.
fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= 128
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');
    if ok { Ok(()) } else { Err(Error::InvalidSchema(format!("invalid index name '{}'", name))) }
}

fn validate_schema(schema: &IndexSchema) -> Result<()> {
    validate_name(&schema.name)?;
    let keys: Vec<_> = schema.fields.iter().filter(|f| f.is_key()).collect();
    match keys.as_slice() {
        [key] if key.field_type == "Edm.String" => {}
        [key] => return Err(Error::InvalidSchema(format!("key field '{}' must be Edm.String", key.name))),
        [] => return Err(Error::InvalidSchema("index needs exactly one key field".to_string())),
        _ => return Err(Error::InvalidSchema("index declares more than one key field".to_string())),
    }
    fn check_level(fields: &[hotelsearch_core::types::FieldDefinition], parent: &str) -> Result<()> {
        let mut names = HashSet::new();
        for f in fields {
            if f.name.trim().is_empty() { return Err(Error::InvalidSchema(format!("empty field name under '{}'", parent))); }
            if !names.insert(f.name.as_str()) { return Err(Error::InvalidSchema(format!("duplicate field '{}' under '{}'", f.name, parent))); }
            if f.is_complex() {
                if f.fields.is_empty() { return Err(Error::InvalidSchema(format!("complex field '{}' has no sub-fields", f.name))); }
                check_level(&f.fields, &f.name)?;
            } else if !f.fields.is_empty() {
                return Err(Error::InvalidSchema(format!("only complex fields may declare sub-fields ('{}')", f.name)));
            }
        }
        Ok(())
    }
    check_level(&schema.fields, &schema.name)
}

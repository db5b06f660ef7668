use std::collections::HashMap;

use serde_json::Value as Json;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, STRING};
use tantivy::tokenizer::{Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter, TextAnalyzer};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use hotelsearch_core::types::{Document, IndexSchema};
use hotelsearch_core::{Error, Result};

const KEY_FIELD: &str = "__key";
const WRITER_MEMORY: usize = 20_000_000;

/// Full-text side of a local index: one tantivy text field per searchable
/// path, plus the stored document key.
pub(crate) struct TextIndex {
    index: Index,
    reader: IndexReader,
    writer: IndexWriter,
    key: Field,
    fields: Vec<(String, Field)>,
}

impl TextIndex {
    pub(crate) fn new(schema: &IndexSchema) -> Result<Self> {
        let mut builder = Schema::builder();
        let key = builder.add_text_field(KEY_FIELD, STRING | STORED);
        let fields = schema
            .searchable_paths()
            .into_iter()
            .enumerate()
            .map(|(i, path)| {
                let analyzer = schema.field_at(&path).and_then(|f| f.analyzer.as_deref());
                let indexing = TextFieldIndexing::default()
                    .set_tokenizer(tokenizer_for(analyzer))
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions);
                let field = builder.add_text_field(&format!("text_{}", i), TextOptions::default().set_indexing_options(indexing));
                (path, field)
            })
            .collect();
        let index = Index::create_in_ram(builder.build());
        register_tokenizers(&index);
        let writer = index.writer_with_num_threads(1, WRITER_MEMORY).map_err(engine)?;
        let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(engine)?;
        Ok(Self { index, reader, writer, key, fields })
    }

    /// Replace the indexed text of each document and make it searchable.
    /// On failure the pending operations are rolled back.
    pub(crate) fn upsert<'a, I>(&mut self, docs: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a Document)>,
    {
        if let Err(e) = self.write_and_commit(docs) {
            if let Err(rollback) = self.writer.rollback() {
                tracing::warn!(error = %rollback, "text index rollback failed");
            }
            return Err(e);
        }
        self.reader.reload().map_err(engine)?;
        Ok(())
    }

    fn write_and_commit<'a, I>(&mut self, docs: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a Document)>,
    {
        for (key, body) in docs {
            self.writer.delete_term(Term::from_field_text(self.key, key));
            let mut doc = TantivyDocument::default();
            doc.add_text(self.key, key);
            for (path, field) in &self.fields {
                let segments: Vec<&str> = path.split('/').collect();
                let mut values = Vec::new();
                if let Some(first) = body.get(segments[0]) { collect_strings(first, &segments[1..], &mut values); }
                for v in values { doc.add_text(*field, v); }
            }
            self.writer.add_document(doc).map_err(engine)?;
        }
        self.writer.commit().map_err(engine)?;
        Ok(())
    }

    /// Score every document matching `text`, restricted to `search_fields`
    /// when non-empty. Returns key -> score.
    pub(crate) fn matches(&self, text: &str, search_fields: &[String]) -> Result<HashMap<String, f32>> {
        let fields: Vec<Field> = self
            .fields
            .iter()
            .filter(|(path, _)| search_fields.is_empty() || search_fields.iter().any(|f| f == path))
            .map(|(_, field)| *field)
            .collect();
        if fields.is_empty() { return Ok(HashMap::new()); }

        let parser = QueryParser::for_index(&self.index, fields);
        let (query, errors) = parser.parse_query_lenient(text);
        if !errors.is_empty() { tracing::debug!(query = text, errors = errors.len(), "query text parsed leniently"); }

        let searcher = self.reader.searcher();
        let limit = (searcher.num_docs() as usize).max(1);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit)).map_err(engine)?;
        let mut scores = HashMap::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr).map_err(engine)?;
            if let Some(key) = doc.get_first(self.key).and_then(|v| v.as_str()) { scores.insert(key.to_string(), score); }
        }
        Ok(scores)
    }
}

/// Collect string leaves under `segments`, flattening arrays at any depth.
fn collect_strings<'a>(value: &'a Json, segments: &[&str], out: &mut Vec<&'a str>) {
    match value {
        Json::Array(items) => {
            for item in items { collect_strings(item, segments, out); }
        }
        Json::Object(map) => {
            if let Some((first, rest)) = segments.split_first() {
                if let Some(child) = map.get(*first) { collect_strings(child, rest, out); }
            }
        }
        Json::String(s) if segments.is_empty() => out.push(s),
        _ => {}
    }
}

/// Map a schema analyzer name (`en.lucene`, `fr.microsoft`, ...) to a registered tokenizer.
fn tokenizer_for(analyzer: Option<&str>) -> &'static str {
    match analyzer {
        Some(a) if a.starts_with("en.") => "en",
        Some(a) if a.starts_with("fr.") => "fr",
        _ => "standard",
    }
}

fn register_tokenizers(index: &Index) {
    let stop_words = vec![
        "a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
    ];
    let standard = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(255))
        .filter(LowerCaser)
        .build();
    let english = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(255))
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
        .filter(Stemmer::new(Language::English))
        .build();
    let french = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(255))
        .filter(LowerCaser)
        .filter(Stemmer::new(Language::French))
        .build();
    index.tokenizers().register("standard", standard);
    index.tokenizers().register("en", english);
    index.tokenizers().register("fr", french);
}

fn engine(e: impl std::fmt::Display) -> Error { Error::Service { status: 500, message: format!("text index: {}", e) } }

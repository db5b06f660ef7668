use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

use hotelsearch_core::types::{lookup_path, Document, FacetValue, IndexSchema};
use hotelsearch_core::{Error, Result};

const DEFAULT_FACET_COUNT: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum SortTarget {
    Score,
    Field(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub target: SortTarget,
    pub descending: bool,
}

/// A document that survived matching and filtering.
pub struct Candidate<'a> {
    pub seq: u64,
    pub score: f64,
    pub doc: &'a Document,
}

/// Parse `Rating desc, HotelName` style clauses. Entries may themselves be
/// comma-separated, as the service accepts a single `$orderby` string.
pub fn parse_order_by(clauses: &[String], schema: &IndexSchema) -> Result<Vec<SortKey>> {
    let mut keys = Vec::new();
    for clause in clauses.iter().flat_map(|c| c.split(',')).map(str::trim).filter(|c| !c.is_empty()) {
        let mut parts = clause.split_whitespace();
        let target = parts.next().unwrap_or_default();
        let descending = match parts.next() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(other) => return Err(Error::InvalidOrderBy(format!("unknown direction '{}' in '{}'", other, clause))),
        };
        if parts.next().is_some() { return Err(Error::InvalidOrderBy(format!("malformed clause '{}'", clause))); }
        let target = if target == "search.score()" {
            SortTarget::Score
        } else {
            match schema.field_at(target) {
                Some(f) if f.is_sortable() => SortTarget::Field(target.to_string()),
                Some(_) => return Err(Error::InvalidOrderBy(format!("'{}' is not sortable", target))),
                None => return Err(Error::InvalidOrderBy(format!("unknown field '{}'", target))),
            }
        };
        keys.push(SortKey { target, descending });
    }
    Ok(keys)
}

/// Order by the given keys, falling back to score (when no keys were given)
/// and finally to insertion order.
pub fn sort_candidates(candidates: &mut [Candidate<'_>], keys: &[SortKey]) {
    candidates.sort_by(|a, b| {
        let mut ord = Ordering::Equal;
        for key in keys {
            let o = match &key.target {
                SortTarget::Score => a.score.total_cmp(&b.score),
                SortTarget::Field(path) => compare_values(lookup_path(a.doc, path), lookup_path(b.doc, path)),
            };
            ord = if key.descending { o.reverse() } else { o };
            if ord != Ordering::Equal { break; }
        }
        if ord == Ordering::Equal && keys.is_empty() { ord = b.score.total_cmp(&a.score); }
        ord.then(a.seq.cmp(&b.seq))
    });
}

/// Nulls and missing values sort first; mixed types compare equal.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Reject selected paths that the schema does not declare or hides.
pub fn validate_select(select: &[String], schema: &IndexSchema) -> Result<()> {
    for path in select.iter().map(|s| s.trim()).filter(|s| !s.is_empty() && *s != "*") {
        match schema.field_at(path) {
            Some(f) if f.is_retrievable() => {}
            Some(_) => return Err(Error::InvalidRequest(format!("'{}' is not retrievable", path))),
            None => return Err(Error::InvalidRequest(format!("unknown field '{}' in select", path))),
        }
    }
    Ok(())
}

/// Project a stored document down to the selected paths. Selected fields
/// without a value come back as `null`.
pub fn project(doc: &Document, select: &[String], schema: &IndexSchema) -> Document {
    let paths: Vec<&str> = select.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    if paths.is_empty() || paths.contains(&"*") {
        return doc
            .iter()
            .filter(|(name, _)| schema.field_at(name).map_or(true, |f| f.is_retrievable()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
    }
    let mut out = Map::new();
    for path in paths {
        let segments: Vec<&str> = path.split('/').collect();
        copy_path(doc, &mut out, &segments);
    }
    out
}

fn copy_path(src: &Map<String, Value>, dst: &mut Map<String, Value>, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else { return };
    match src.get(*first) {
        Some(v) if rest.is_empty() => { dst.insert(first.to_string(), v.clone()); }
        Some(Value::Object(inner)) => {
            let entry = dst.entry(first.to_string()).or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = entry { copy_path(inner, child, rest); }
        }
        Some(Value::Array(items)) => {
            let projected = items
                .iter()
                .map(|item| match item {
                    Value::Object(inner) => {
                        let mut child = Map::new();
                        copy_path(inner, &mut child, rest);
                        Value::Object(child)
                    }
                    other => other.clone(),
                })
                .collect();
            dst.insert(first.to_string(), Value::Array(projected));
        }
        _ => { dst.entry(first.to_string()).or_insert(Value::Null); }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FacetSort { CountDesc, CountAsc, ValueAsc, ValueDesc }

#[derive(Debug, Clone, PartialEq)]
pub struct FacetSpec {
    pub field: String,
    count: usize,
    sort: FacetSort,
}

/// Parse `Category`, `Category,count:5` or `Rating,sort:-value`.
pub fn parse_facet(spec: &str, schema: &IndexSchema) -> Result<FacetSpec> {
    let mut parts = spec.split(',').map(str::trim);
    let field = parts.next().unwrap_or_default().to_string();
    match schema.field_at(&field) {
        Some(f) if f.is_facetable() => {}
        Some(_) => return Err(Error::InvalidRequest(format!("'{}' is not facetable", field))),
        None => return Err(Error::InvalidRequest(format!("unknown facet field '{}'", field))),
    }
    let mut facet = FacetSpec { field, count: DEFAULT_FACET_COUNT, sort: FacetSort::CountDesc };
    for param in parts {
        match param.split_once(':') {
            Some(("count", n)) => {
                facet.count = n.parse().map_err(|_| Error::InvalidRequest(format!("bad facet count '{}'", n)))?;
            }
            Some(("sort", "count")) => facet.sort = FacetSort::CountDesc,
            Some(("sort", "-count")) => facet.sort = FacetSort::CountAsc,
            Some(("sort", "value")) => facet.sort = FacetSort::ValueAsc,
            Some(("sort", "-value")) => facet.sort = FacetSort::ValueDesc,
            _ => return Err(Error::InvalidRequest(format!("unsupported facet parameter '{}'", param))),
        }
    }
    Ok(facet)
}

/// Count distinct values of the facet field; collection fields count each element.
pub fn compute_facet<'a, I>(spec: &FacetSpec, docs: I) -> Vec<FacetValue>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut buckets: HashMap<String, FacetValue> = HashMap::new();
    let mut bump = |v: &Value| {
        if v.is_null() { return; }
        buckets.entry(v.to_string()).or_insert_with(|| FacetValue { value: v.clone(), count: 0 }).count += 1;
    };
    for doc in docs {
        match lookup_path(doc, &spec.field) {
            Some(Value::Array(items)) => items.iter().for_each(&mut bump),
            Some(v) => bump(v),
            None => {}
        }
    }
    let mut out: Vec<FacetValue> = buckets.into_values().collect();
    out.sort_by(|a, b| {
        let by_value = compare_values(Some(&a.value), Some(&b.value));
        match spec.sort {
            FacetSort::CountDesc => b.count.cmp(&a.count).then(by_value),
            FacetSort::CountAsc => a.count.cmp(&b.count).then(by_value),
            FacetSort::ValueAsc => by_value,
            FacetSort::ValueDesc => by_value.reverse(),
        }
    });
    out.truncate(spec.count);
    out
}

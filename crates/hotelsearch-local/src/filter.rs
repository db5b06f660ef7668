//! OData filter subset evaluated against JSON documents.
//!
//! Supported: `eq ne gt ge lt le`, `and or not`, parentheses, string / number /
//! boolean / null / date-time literals, `/`-separated field paths and
//! `Collection/any(x: ...)` / `Collection/all(x: ...)` lambdas.

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::cmp::Ordering;

use hotelsearch_core::types::{lookup_path, Document, IndexSchema};
use hotelsearch_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp { Eq, Ne, Gt, Ge, Lt, Le }

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(DateTime<FixedOffset>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier { Any, All }

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Const(bool),
    Not(Box<Filter>),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Compare { path: String, op: CmpOp, value: Literal },
    Lambda { quantifier: Quantifier, collection: String, var: Option<String>, body: Option<Box<Filter>> },
}

impl Filter {
    /// Parse and check every referenced field against the index schema.
    pub fn parse(text: &str, schema: &IndexSchema) -> Result<Self> {
        let tokens = tokenize(text)?;
        let mut parser = Parser { tokens, pos: 0 };
        let filter = parser.expr()?;
        if let Some(tok) = parser.tokens.get(parser.pos) { return Err(Error::InvalidFilter(format!("unexpected {:?} in '{}'", tok, text))); }
        filter.validate(schema, &[])?;
        Ok(filter)
    }

    pub fn matches(&self, doc: &Document) -> bool { self.eval(doc, &mut Vec::new()) }

    fn eval<'a>(&'a self, doc: &'a Document, scope: &mut Vec<(&'a str, &'a Value)>) -> bool {
        match self {
            Filter::Const(b) => *b,
            Filter::Not(inner) => !inner.eval(doc, scope),
            Filter::And(a, b) => a.eval(doc, scope) && b.eval(doc, scope),
            Filter::Or(a, b) => a.eval(doc, scope) || b.eval(doc, scope),
            Filter::Compare { path, op, value } => compare(resolve(doc, scope, path), *op, value),
            Filter::Lambda { quantifier, collection, var, body } => {
                let items: &[Value] = match resolve(doc, scope, collection) {
                    Some(Value::Array(items)) => items,
                    _ => &[],
                };
                let (Some(var), Some(body)) = (var, body) else {
                    // `any()` asks for a non-empty collection; `all()` is vacuously true.
                    return match quantifier { Quantifier::Any => !items.is_empty(), Quantifier::All => true };
                };
                let mut test = |item: &'a Value| {
                    scope.push((var.as_str(), item));
                    let hit = body.eval(doc, scope);
                    scope.pop();
                    hit
                };
                match quantifier {
                    Quantifier::Any => items.iter().any(&mut test),
                    Quantifier::All => items.iter().all(&mut test),
                }
            }
        }
    }

    fn validate(&self, schema: &IndexSchema, vars: &[(&str, &str)]) -> Result<()> {
        match self {
            Filter::Const(_) => Ok(()),
            Filter::Not(inner) => inner.validate(schema, vars),
            Filter::And(a, b) | Filter::Or(a, b) => { a.validate(schema, vars)?; b.validate(schema, vars) }
            Filter::Compare { path, .. } => {
                let field_path = schema_path(path, vars);
                match schema.field_at(&field_path) {
                    Some(f) if f.is_complex() => Err(Error::InvalidFilter(format!("'{}' is a complex field", path))),
                    Some(f) if !f.is_filterable() => Err(Error::InvalidFilter(format!("'{}' is not filterable", path))),
                    Some(f) if f.is_collection() && !vars.iter().any(|(v, _)| *v == path.as_str()) => {
                        Err(Error::InvalidFilter(format!("'{}' is a collection; use any() or all()", path)))
                    }
                    Some(_) => Ok(()),
                    None => Err(Error::InvalidFilter(format!("unknown field '{}'", path))),
                }
            }
            Filter::Lambda { collection, var, body, .. } => {
                let field_path = schema_path(collection, vars);
                match schema.field_at(&field_path) {
                    Some(f) if f.is_collection() => {}
                    Some(_) => return Err(Error::InvalidFilter(format!("'{}' is not a collection", collection))),
                    None => return Err(Error::InvalidFilter(format!("unknown field '{}'", collection))),
                }
                match (var, body) {
                    (Some(var), Some(body)) => {
                        let mut inner = vars.to_vec();
                        inner.push((var.as_str(), field_path.as_str()));
                        body.validate(schema, &inner)
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}

/// Rewrite a path that starts with a lambda variable into a schema path.
fn schema_path(path: &str, vars: &[(&str, &str)]) -> String {
    let (head, rest) = match path.split_once('/') { Some((h, r)) => (h, Some(r)), None => (path, None) };
    match vars.iter().rev().find(|(v, _)| *v == head) {
        Some(&(_, collection)) => match rest { Some(r) => format!("{}/{}", collection, r), None => collection.to_string() },
        None => path.to_string(),
    }
}

fn resolve<'a>(doc: &'a Document, scope: &[(&'a str, &'a Value)], path: &str) -> Option<&'a Value> {
    let (head, rest) = match path.split_once('/') { Some((h, r)) => (h, Some(r)), None => (path, None) };
    match scope.iter().rev().find(|(v, _)| *v == head) {
        Some(&(_, item)) => match rest {
            None => Some(item),
            Some(r) => item.as_object().and_then(|obj| lookup_path(obj, r)),
        },
        None => lookup_path(doc, path),
    }
}

fn compare(actual: Option<&Value>, op: CmpOp, literal: &Literal) -> bool {
    let actual = actual.filter(|v| !v.is_null());
    let ordering = match (actual, literal) {
        (None, Literal::Null) => Some(Ordering::Equal),
        (None, _) | (Some(_), Literal::Null) => None,
        (Some(Value::Bool(a)), Literal::Bool(b)) => Some(a.cmp(b)),
        (Some(Value::Number(a)), Literal::Number(b)) => a.as_f64().and_then(|a| a.partial_cmp(b)),
        (Some(Value::String(a)), Literal::Text(b)) => Some(a.as_str().cmp(b.as_str())),
        (Some(Value::String(a)), Literal::Date(b)) => DateTime::parse_from_rfc3339(a).ok().map(|a| a.cmp(b)),
        _ => None,
    };
    match op {
        CmpOp::Eq => ordering == Some(Ordering::Equal),
        CmpOp::Ne => ordering != Some(Ordering::Equal),
        CmpOp::Gt => ordering == Some(Ordering::Greater),
        CmpOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        CmpOp::Lt => ordering == Some(Ordering::Less),
        CmpOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Colon,
    Ident(String),
    Literal(Literal),
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            ':' => { tokens.push(Token::Colon); i += 1; }
            '\'' => {
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(Error::InvalidFilter(format!("unterminated string in '{}'", text))),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => { s.push('\''); i += 2; }
                        Some('\'') => { i += 1; break; }
                        Some(ch) => { s.push(*ch); i += 1; }
                    }
                }
                tokens.push(Token::Literal(Literal::Text(s)));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '.' | '-' | '+' | ':')) { i += 1; }
                let raw: String = chars[start..i].iter().collect();
                let literal = if let Ok(n) = raw.parse::<f64>() {
                    Literal::Number(n)
                } else if let Ok(d) = DateTime::parse_from_rfc3339(&raw) {
                    Literal::Date(d)
                } else {
                    return Err(Error::InvalidFilter(format!("bad literal '{}'", raw)));
                };
                tokens.push(Token::Literal(literal));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '/' | '.')) { i += 1; }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "null" => Token::Literal(Literal::Null),
                    "true" => Token::Literal(Literal::Bool(true)),
                    "false" => Token::Literal(Literal::Bool(false)),
                    _ => Token::Ident(word),
                });
            }
            other => return Err(Error::InvalidFilter(format!("unexpected character '{}' in '{}'", other, text))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> { self.tokens.get(self.pos) }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn peek_keyword(&self, kw: &str) -> bool { matches!(self.peek(), Some(Token::Ident(w)) if w == kw) }

    fn expect(&mut self, want: &Token) -> Result<()> {
        match self.next() {
            Some(ref tok) if tok == want => Ok(()),
            other => Err(Error::InvalidFilter(format!("expected {:?}, found {:?}", want, other))),
        }
    }

    fn expr(&mut self) -> Result<Filter> {
        let mut left = self.conjunction()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            left = Filter::Or(Box::new(left), Box::new(self.conjunction()?));
        }
        Ok(left)
    }

    fn conjunction(&mut self) -> Result<Filter> {
        let mut left = self.unary()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            left = Filter::And(Box::new(left), Box::new(self.unary()?));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Filter> {
        if self.peek_keyword("not") {
            self.pos += 1;
            return Ok(Filter::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Filter> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Literal(Literal::Bool(b))) => Ok(Filter::Const(b)),
            Some(Token::Ident(word)) => {
                if self.peek() == Some(&Token::LParen) {
                    return self.lambda(&word);
                }
                let op = match self.next() {
                    Some(Token::Ident(op)) => parse_op(&op)?,
                    other => return Err(Error::InvalidFilter(format!("expected operator after '{}', found {:?}", word, other))),
                };
                let value = match self.next() {
                    Some(Token::Literal(l)) => l,
                    other => return Err(Error::InvalidFilter(format!("expected literal after '{} {:?}', found {:?}", word, op, other))),
                };
                Ok(Filter::Compare { path: word, op, value })
            }
            other => Err(Error::InvalidFilter(format!("unexpected {:?}", other))),
        }
    }

    fn lambda(&mut self, word: &str) -> Result<Filter> {
        let (collection, quantifier) = match word.rsplit_once('/') {
            Some((c, "any")) => (c, Quantifier::Any),
            Some((c, "all")) => (c, Quantifier::All),
            _ => return Err(Error::InvalidFilter(format!("unsupported function '{}'", word))),
        };
        self.expect(&Token::LParen)?;
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            if quantifier == Quantifier::All { return Err(Error::InvalidFilter("all() needs a lambda body".to_string())); }
            return Ok(Filter::Lambda { quantifier, collection: collection.to_string(), var: None, body: None });
        }
        let var = match self.next() {
            Some(Token::Ident(v)) if !v.contains('/') => v,
            other => return Err(Error::InvalidFilter(format!("expected range variable, found {:?}", other))),
        };
        self.expect(&Token::Colon)?;
        let body = self.expr()?;
        self.expect(&Token::RParen)?;
        Ok(Filter::Lambda { quantifier, collection: collection.to_string(), var: Some(var), body: Some(Box::new(body)) })
    }
}

fn parse_op(op: &str) -> Result<CmpOp> {
    Ok(match op {
        "eq" => CmpOp::Eq,
        "ne" => CmpOp::Ne,
        "gt" => CmpOp::Gt,
        "ge" => CmpOp::Ge,
        "lt" => CmpOp::Lt,
        "le" => CmpOp::Le,
        other => return Err(Error::InvalidFilter(format!("unknown operator '{}'", other))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> IndexSchema {
        serde_json::from_value(json!({
            "name": "t",
            "fields": [
                {"name": "Id", "type": "Edm.String", "key": true},
                {"name": "Rating", "type": "Edm.Double"},
                {"name": "Notes", "type": "Edm.String", "filterable": false},
                {"name": "Tags", "type": "Collection(Edm.String)"},
                {"name": "Opened", "type": "Edm.DateTimeOffset"},
                {"name": "Address", "type": "Edm.ComplexType", "fields": [{"name": "StateProvince", "type": "Edm.String"}]}
            ]
        }))
        .unwrap()
    }

    fn doc(v: Value) -> Document { v.as_object().unwrap().clone() }

    #[test]
    fn nested_equality_with_escaped_quote() {
        let f = Filter::parse("Address/StateProvince eq 'O''Hare'", &schema()).unwrap();
        assert!(f.matches(&doc(json!({"Address": {"StateProvince": "O'Hare"}}))));
        assert!(!f.matches(&doc(json!({"Address": {"StateProvince": "FL"}}))));
        assert!(!f.matches(&doc(json!({"Id": "1"}))));
    }

    #[test]
    fn precedence_and_not() {
        let f = Filter::parse("Rating gt 4 or Rating lt 2 and not (Address/StateProvince eq 'FL')", &schema()).unwrap();
        assert!(f.matches(&doc(json!({"Rating": 4.5}))));
        assert!(f.matches(&doc(json!({"Rating": 1.0, "Address": {"StateProvince": "NY"}}))));
        assert!(!f.matches(&doc(json!({"Rating": 1.0, "Address": {"StateProvince": "FL"}}))));
        assert!(!f.matches(&doc(json!({"Rating": 3.0}))));
    }

    #[test]
    fn null_and_dates() {
        let f = Filter::parse("Rating eq null", &schema()).unwrap();
        assert!(f.matches(&doc(json!({"Id": "1"}))));
        assert!(!f.matches(&doc(json!({"Rating": 1}))));

        let f = Filter::parse("Opened ge 2000-01-01T00:00:00Z", &schema()).unwrap();
        assert!(f.matches(&doc(json!({"Opened": "2015-09-20T00:00:00Z"}))));
        assert!(!f.matches(&doc(json!({"Opened": "1970-01-18T00:00:00Z"}))));
    }

    #[test]
    fn collection_lambdas() {
        let any = Filter::parse("Tags/any(t: t eq 'pool')", &schema()).unwrap();
        let all = Filter::parse("Tags/all(t: t ne 'bar')", &schema()).unwrap();
        let non_empty = Filter::parse("Tags/any()", &schema()).unwrap();
        let d = doc(json!({"Tags": ["pool", "view"]}));
        assert!(any.matches(&d) && all.matches(&d) && non_empty.matches(&d));
        let d = doc(json!({"Tags": ["bar"]}));
        assert!(!any.matches(&d) && !all.matches(&d));
        assert!(!non_empty.matches(&doc(json!({"Tags": []}))));
    }

    #[test]
    fn rejects_bad_fields_and_syntax() {
        let s = schema();
        assert!(matches!(Filter::parse("Missing eq 1", &s), Err(Error::InvalidFilter(_))));
        assert!(matches!(Filter::parse("Notes eq 'x'", &s), Err(Error::InvalidFilter(_))));
        assert!(matches!(Filter::parse("Tags eq 'pool'", &s), Err(Error::InvalidFilter(_))));
        assert!(matches!(Filter::parse("Rating eq", &s), Err(Error::InvalidFilter(_))));
        assert!(matches!(Filter::parse("Rating eq 'x", &s), Err(Error::InvalidFilter(_))));
        assert!(matches!(Filter::parse("Rating eq 1)", &s), Err(Error::InvalidFilter(_))));
        assert!(matches!(Filter::parse("Rating like 1", &s), Err(Error::InvalidFilter(_))));
    }
}

use assetquery_core::{Document, QueryError, Result, Value, ID_FIELD};
use regex::Regex;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value; `Null` also matches an absent field.
    Equals(Value),
    /// Unanchored regex over string fields; non-string fields never match.
    Matches(String),
    /// Field is null, the empty string, or absent.
    Blank,
}

/// Conjunction of per-field conditions. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses
            .push((field.into(), Condition::Equals(value.into())));
        self
    }

    pub fn matches(mut self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.clauses
            .push((field.into(), Condition::Matches(pattern.into())));
        self
    }

    pub fn blank(mut self, field: impl Into<String>) -> Self {
        self.clauses.push((field.into(), Condition::Blank));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    /// Compiles regex clauses once so a scan does not recompile per document.
    pub fn compile(&self) -> Result<CompiledFilter<'_>> {
        let mut clauses = Vec::with_capacity(self.clauses.len());
        for (field, cond) in &self.clauses {
            let compiled = match cond {
                Condition::Equals(v) => Compiled::Equals(v),
                Condition::Matches(p) => Compiled::Matches(Regex::new(p).map_err(|e| {
                    QueryError::Validation(format!("bad pattern for `{field}`: {e}"))
                })?),
                Condition::Blank => Compiled::Blank,
            };
            clauses.push((field.as_str(), compiled));
        }
        Ok(CompiledFilter { clauses })
    }
}

enum Compiled<'a> {
    Equals(&'a Value),
    Matches(Regex),
    Blank,
}

pub struct CompiledFilter<'a> {
    clauses: Vec<(&'a str, Compiled<'a>)>,
}

impl CompiledFilter<'_> {
    pub fn accepts(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|(field, cond)| {
            let v = doc.get(*field);
            match cond {
                Compiled::Equals(Value::Null) => v.map_or(true, Value::is_null),
                Compiled::Equals(want) => v.map_or(false, |v| v.loosely_equals(want)),
                Compiled::Matches(re) => v.and_then(Value::as_str).map_or(false, |s| re.is_match(s)),
                Compiled::Blank => v.map_or(true, Value::is_blank),
            }
        })
    }
}

/// Which fields a read returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    fields: Option<Vec<String>>,
    include_id: bool,
}

impl Default for Projection {
    fn default() -> Self {
        Self::all()
    }
}

impl Projection {
    /// Whole documents.
    pub fn all() -> Self {
        Self {
            fields: None,
            include_id: true,
        }
    }

    /// Only the named fields, plus the identity field unless [`Projection::without_id`] is used.
    /// An empty field list selects every field, as an id-only exclusion does in document stores.
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        Self {
            fields: (!fields.is_empty()).then_some(fields),
            include_id: true,
        }
    }

    pub fn without_id(mut self) -> Self {
        self.include_id = false;
        self
    }

    /// Fields keep the document's own order.
    pub fn apply(&self, doc: &Document) -> Document {
        let wanted: Option<HashSet<&str>> = self
            .fields
            .as_ref()
            .map(|f| f.iter().map(String::as_str).collect());
        doc.iter()
            .filter(|(k, _)| {
                if k.as_str() == ID_FIELD {
                    return self.include_id;
                }
                wanted.as_ref().map_or(true, |w| w.contains(k.as_str()))
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// One bucket of a group-and-count aggregation. `key` is `Null` for documents missing the field.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCount {
    pub key: Value,
    pub count: u64,
}

/// Read-only document store capabilities the router relies on.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn find(&self, filter: &Filter, projection: &Projection) -> Result<Vec<Document>>;

    /// Every document, unprojected.
    async fn scan(&self) -> Result<Vec<Document>> {
        self.find(&Filter::new(), &Projection::all()).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64>;

    async fn group_count(&self, field: &str) -> Result<Vec<GroupCount>>;

    fn document_count(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetquery_core::Map;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<Map>()
    }

    #[test]
    fn blank_matches_null_empty_and_absent() {
        let f = Filter::new().blank("Solution");
        let c = f.compile().unwrap();
        assert!(c.accepts(&doc(&[("Solution", Value::Null)])));
        assert!(c.accepts(&doc(&[("Solution", Value::from(""))])));
        assert!(c.accepts(&doc(&[])));
        assert!(!c.accepts(&doc(&[("Solution", Value::from("upgrade"))])));
    }

    #[test]
    fn regex_only_matches_strings() {
        let f = Filter::new().matches("Vuln Publication Date", "2021");
        let c = f.compile().unwrap();
        assert!(c.accepts(&doc(&[("Vuln Publication Date", Value::from("2021/03/04"))])));
        assert!(!c.accepts(&doc(&[("Vuln Publication Date", Value::Int(2021))])));
        assert!(!c.accepts(&doc(&[])));
    }

    #[test]
    fn clauses_are_conjunctive() {
        let f = Filter::new()
            .equals("IP Address", "10.0.0.1")
            .matches("Vuln Publication Date", "2020");
        let c = f.compile().unwrap();
        assert!(c.accepts(&doc(&[
            ("IP Address", Value::from("10.0.0.1")),
            ("Vuln Publication Date", Value::from("2020-01-01")),
        ])));
        assert!(!c.accepts(&doc(&[
            ("IP Address", Value::from("10.0.0.2")),
            ("Vuln Publication Date", Value::from("2020-01-01")),
        ])));
    }

    #[test]
    fn invalid_pattern_is_a_validation_error() {
        let f = Filter::new().matches("x", "(");
        assert_eq!(f.compile().err().unwrap().code(), "validation");
    }

    #[test]
    fn projection_keeps_document_order_and_drops_id() {
        let d = doc(&[
            ("_id", Value::from("01H")),
            ("Severity", Value::from("High")),
            ("Host", Value::from("a")),
            ("MAC Address", Value::from("aa")),
        ]);
        let p = Projection::include(["MAC Address", "Severity"]);
        let keys: Vec<String> = p.apply(&d).keys().cloned().collect();
        assert_eq!(keys, ["_id", "Severity", "MAC Address"]);
        let keys: Vec<String> = p.without_id().apply(&d).keys().cloned().collect();
        assert_eq!(keys, ["Severity", "MAC Address"]);
    }

    #[test]
    fn empty_field_list_keeps_everything_but_id() {
        let d = doc(&[("_id", Value::from("01H")), ("Host", Value::from("a"))]);
        let p = Projection::include(Vec::<String>::new()).without_id();
        assert_eq!(p.apply(&d), doc(&[("Host", Value::from("a"))]));
    }
}

use crate::sanitize::{finite_or_zero, sanitize};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const IP_ADDRESS_FILTER: &str = "ip_address";
pub const YEAR_FILTER: &str = "year";

/// Filters pulled out of a question: filter kind -> single value, in extraction order.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct FilterSet(pub IndexMap<String, String>);

impl FilterSet {
    pub fn get(&self, kind: &str) -> Option<&str> {
        self.0.get(kind).map(String::as_str)
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.get(IP_ADDRESS_FILTER)
    }

    pub fn year(&self) -> Option<&str> {
        self.get(YEAR_FILTER)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One ranked intent: `[label, confidence]` on the wire, confidence in percent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentMatch(pub String, pub f64);

impl IntentMatch {
    pub fn label(&self) -> &str {
        &self.0
    }

    pub fn confidence(&self) -> f64 {
        self.1
    }
}

/// Top intents, best first. The first entry drives dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct IntentPrediction(pub Vec<IntentMatch>);

impl IntentPrediction {
    pub fn selected(&self) -> Option<&IntentMatch> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IntentMatch> {
        self.0.iter()
    }
}

/// A span found by the named-entity recognizer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub label: String,
    pub text: String,
}

impl Entity {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub intent: String,
    pub top_matches: IntentPrediction,
    pub filters: FilterSet,
    pub results: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    /// Final normalization before the result leaves the process.
    pub fn sanitized(mut self) -> Self {
        self.results = self.results.map(sanitize);
        for m in self.top_matches.0.iter_mut() {
            m.1 = finite_or_zero(m.1);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_result_wire_shape() {
        let mut filters = FilterSet::default();
        filters.0.insert("ip_address".into(), "10.0.0.1".into());
        let res = QueryResult {
            intent: "asset_count".into(),
            top_matches: IntentPrediction(vec![
                IntentMatch("asset_count".into(), 91.25),
                IntentMatch("not_patchable".into(), 8.75),
            ]),
            filters,
            results: Some(Value::Int(3)),
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&res).unwrap(),
            json!({
                "intent": "asset_count",
                "top_matches": [["asset_count", 91.25], ["not_patchable", 8.75]],
                "filters": {"ip_address": "10.0.0.1"},
                "results": 3
            })
        );
    }

    #[test]
    fn mapping_miss_keeps_null_results_and_error() {
        let res = QueryResult {
            intent: "open_ports".into(),
            top_matches: IntentPrediction::default(),
            filters: FilterSet::default(),
            results: None,
            error: Some("Intent mapping not found in dataset.".into()),
        };
        let v = serde_json::to_value(&res).unwrap();
        assert_eq!(v["results"], serde_json::Value::Null);
        assert_eq!(v["error"], "Intent mapping not found in dataset.");
    }

    #[test]
    fn sanitized_zeroes_non_finite_confidences() {
        let res = QueryResult {
            intent: "x".into(),
            top_matches: IntentPrediction(vec![IntentMatch("x".into(), f64::NAN)]),
            filters: FilterSet::default(),
            results: Some(Value::Float(f64::INFINITY)),
            error: None,
        }
        .sanitized();
        assert_eq!(res.top_matches.0[0].confidence(), 0.0);
        assert_eq!(res.results, Some(Value::Int(0)));
    }
}

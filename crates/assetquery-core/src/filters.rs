use crate::errors::Result;
use crate::model::{Entity, FilterSet, IP_ADDRESS_FILTER, YEAR_FILTER};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

// Dotted quads are taken as-is; octets are not range-checked.
static IPV4: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19[0-9]{2}|20[0-9]{2})\b").unwrap());

/// Named-entity recognition over raw question text.
pub trait EntityRecognizer: Send + Sync + 'static {
    fn recognize(&self, text: &str) -> Result<Vec<Entity>>;
}

/// Recognizer used when no NER model is configured.
#[derive(Debug, Clone, Default)]
pub struct NoEntities;

impl EntityRecognizer for NoEntities {
    fn recognize(&self, _text: &str) -> Result<Vec<Entity>> {
        Ok(Vec::new())
    }
}

#[derive(Clone)]
pub struct FilterExtractor {
    recognizer: Arc<dyn EntityRecognizer>,
}

impl FilterExtractor {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self { recognizer }
    }

    pub fn extract(&self, text: &str) -> Result<FilterSet> {
        let mut filters = FilterSet::default();
        for ent in self.recognizer.recognize(text)? {
            filters.0.insert(ent.label, ent.text);
        }
        if let Some(ip) = IPV4.find(text) {
            filters
                .0
                .insert(IP_ADDRESS_FILTER.to_string(), ip.as_str().to_string());
        }
        if let Some(year) = YEAR.captures(text).and_then(|c| c.get(1)) {
            filters
                .0
                .insert(YEAR_FILTER.to_string(), year.as_str().to_string());
        }
        tracing::debug!(?filters, "extracted filters");
        Ok(filters)
    }
}

impl Default for FilterExtractor {
    fn default() -> Self {
        Self::new(Arc::new(NoEntities))
    }
}

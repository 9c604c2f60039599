use crate::classifier::IntentClassifier;
use crate::dispatch::dispatch;
use assetquery_core::{
    FilterExtractor, IntentKind, IntentMappingTable, QueryError, QueryResult, Result,
};
use assetquery_storage::DocumentStore;
use std::sync::Arc;

/// Everything a request needs, built once at start-up and shared read-only between handlers.
#[derive(Clone)]
pub struct AppContext {
    pub classifier: IntentClassifier,
    pub extractor: FilterExtractor,
    pub mapping: Arc<IntentMappingTable>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppContext {
    pub fn new(
        classifier: IntentClassifier,
        extractor: FilterExtractor,
        mapping: Arc<IntentMappingTable>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            classifier,
            extractor,
            mapping,
            store,
        }
    }

    /// Classify, extract filters, dispatch, sanitize.
    ///
    /// A predicted intent with no mapping row is not a failure: it is reported through the
    /// result's `error` field with `results` left null.
    pub async fn process_query(&self, text: &str) -> Result<QueryResult> {
        if text.trim().is_empty() {
            return Err(QueryError::Validation("text must not be empty".into()));
        }

        // both models are CPU-bound; keep them off the async workers
        let classifier = self.classifier.clone();
        let extractor = self.extractor.clone();
        let owned = text.to_string();
        let (top_matches, filters) = tokio::task::spawn_blocking(move || {
            let top = classifier.classify(&owned)?;
            let filters = extractor.extract(&owned)?;
            Ok::<_, QueryError>((top, filters))
        })
        .await
        .map_err(|e| QueryError::Classifier(format!("inference task failed: {e}")))??;

        let intent = top_matches
            .selected()
            .map(|m| m.label().to_string())
            .ok_or_else(|| QueryError::Classifier("classifier returned no intents".into()))?;

        let kind = IntentKind::resolve(&intent, &self.mapping);
        tracing::info!(%intent, intent_kind = kind.name(), filters = filters.len(), "query classified");

        let (results, error) = match dispatch(&kind, &filters, self.store.as_ref()).await {
            Ok(v) => (Some(v), None),
            Err(e @ QueryError::MappingMiss { .. }) => (None, Some(e.to_string())),
            Err(e) => return Err(e),
        };

        Ok(QueryResult {
            intent,
            top_matches,
            filters,
            results,
            error,
        }
        .sanitized())
    }
}

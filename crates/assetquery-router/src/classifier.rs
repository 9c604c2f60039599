use crate::metrics::INFERENCE_SECONDS;
use assetquery_core::intent::rank_intents;
use assetquery_core::{IntentPrediction, LabelSpace, Result};
use std::sync::Arc;

/// Black-box sequence classifier: one logit per intent for a single piece of text.
pub trait IntentModel: Send + Sync + 'static {
    fn logits(&self, text: &str) -> Result<Vec<f32>>;

    fn name(&self) -> &str {
        "intent"
    }
}

/// Ranks a model's output against the mapping file's label space.
#[derive(Clone)]
pub struct IntentClassifier {
    model: Arc<dyn IntentModel>,
    labels: LabelSpace,
}

impl IntentClassifier {
    /// Probes the model once so a label space that disagrees with the model's output width is
    /// caught at start-up instead of on the first request.
    pub fn new(model: Arc<dyn IntentModel>, labels: LabelSpace) -> Result<Self> {
        let probe = model.logits("how many assets are there")?;
        labels.validate(probe.len())?;
        tracing::info!(
            model = model.name(),
            intents = labels.len(),
            "intent classifier ready"
        );
        Ok(Self { model, labels })
    }

    pub fn classify(&self, text: &str) -> Result<IntentPrediction> {
        let logits = {
            let _timer = INFERENCE_SECONDS
                .with_label_values(&[self.model.name()])
                .start_timer();
            self.model.logits(text)?
        };
        rank_intents(&logits, &self.labels)
    }

    pub fn labels(&self) -> &LabelSpace {
        &self.labels
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assetquery_core::QueryError;

    /// Returns fixed logits regardless of input.
    pub(crate) struct FixedLogits(pub Vec<f32>);

    impl IntentModel for FixedLogits {
        fn logits(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl IntentModel for Failing {
        fn logits(&self, _text: &str) -> Result<Vec<f32>> {
            Err(QueryError::Classifier("session poisoned".into()))
        }
    }

    fn labels() -> LabelSpace {
        LabelSpace::new(vec!["asset_count".into(), "open_ports".into(), "not_patchable".into()])
    }

    #[test]
    fn start_up_rejects_mismatched_label_space() {
        let err = IntentClassifier::new(Arc::new(FixedLogits(vec![0.0, 1.0])), labels())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            QueryError::LabelSpaceMismatch {
                labels: 3,
                logits: 2
            }
        ));
    }

    #[test]
    fn classifies_with_label_order() {
        let c = IntentClassifier::new(Arc::new(FixedLogits(vec![0.0, 4.0, 1.0])), labels()).unwrap();
        let pred = c.classify("which ports are open on 10.0.0.1").unwrap();
        assert_eq!(pred.selected().unwrap().label(), "open_ports");
        assert_eq!(pred.len(), 3);
    }

    #[test]
    fn model_failures_propagate() {
        assert!(IntentClassifier::new(Arc::new(Failing), labels()).is_err());
    }
}

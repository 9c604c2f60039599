use thiserror::Error;

pub const MAPPING_MISS_MESSAGE: &str = "Intent mapping not found in dataset.";

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("Intent mapping not found in dataset.")]
    MappingMiss { intent: String },
    #[error("label space has {labels} intents but the classifier produced {logits} logits")]
    LabelSpaceMismatch { labels: usize, logits: usize },
    #[error("classifier error: {0}")]
    Classifier(String),
    #[error("entity recognizer error: {0}")]
    Recognizer(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl QueryError {
    /// Stable, machine-readable category used at the HTTP boundary and in metrics.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Validation(_) => "validation",
            QueryError::MappingMiss { .. } => "not_found",
            QueryError::LabelSpaceMismatch { .. }
            | QueryError::Classifier(_)
            | QueryError::Recognizer(_) => "model",
            QueryError::Store(_) | QueryError::Snapshot(_) => "store",
            QueryError::Config(_) | QueryError::Io(_) | QueryError::Csv(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_miss_renders_the_wire_message() {
        let err = QueryError::MappingMiss {
            intent: "open_ports".into(),
        };
        assert_eq!(err.to_string(), MAPPING_MISS_MESSAGE);
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn codes_separate_model_and_store_failures() {
        let mismatch = QueryError::LabelSpaceMismatch {
            labels: 4,
            logits: 3,
        };
        assert_eq!(mismatch.code(), "model");
        assert_eq!(QueryError::Store("down".into()).code(), "store");
        assert_eq!(QueryError::Validation("empty".into()).code(), "validation");
    }
}

pub mod classifier;
pub mod dispatch;
pub mod metrics;
pub mod ner;
pub mod onnx;
pub mod pipeline;

pub use classifier::{IntentClassifier, IntentModel};
pub use dispatch::dispatch;
pub use onnx::{OnnxEntityRecognizer, OnnxSequenceClassifier};
pub use pipeline::AppContext;

use crate::classifier::IntentModel;
use crate::ner::{decode_bio, TokenTag};
use assetquery_core::{Entity, EntityRecognizer, QueryError, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};

fn find_model(model_dir: &Path) -> Result<PathBuf> {
    let candidates = [model_dir.join("model.onnx"), model_dir.join("model_O4.onnx")];
    candidates
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| QueryError::Config(format!("no ONNX model in {}", model_dir.display())))
}

fn load_session(model_path: &Path) -> Result<Session> {
    let model_bytes = std::fs::read(model_path)?;
    Session::builder()
        .map_err(|e| QueryError::Config(format!("session builder: {e:?}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| QueryError::Config(format!("optimization level: {e:?}")))?
        .commit_from_memory(&model_bytes)
        .map_err(|e| QueryError::Config(format!("load {}: {e:?}", model_path.display())))
}

fn load_tokenizer(model_dir: &Path, max_length: usize) -> Result<Tokenizer> {
    let path = model_dir.join("tokenizer.json");
    let mut tokenizer = Tokenizer::from_file(&path)
        .map_err(|e| QueryError::Config(format!("tokenizer {}: {e}", path.display())))?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| QueryError::Config(format!("truncation: {e}")))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

/// Encodes one text into `(input_ids, attention_mask)` tensors of shape `[1, len]`.
fn encode(
    tokenizer: &Tokenizer,
    text: &str,
) -> Result<(tokenizers::Encoding, Tensor<i64>, Tensor<i64>)> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| QueryError::Classifier(format!("tokenization failed: {e}")))?;
    let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
    let mask: Vec<i64> = encoding
        .get_attention_mask()
        .iter()
        .map(|&m| m as i64)
        .collect();
    let shape = vec![1, ids.len()];
    let input_ids = Tensor::from_array((shape.clone(), ids))
        .map_err(|e| QueryError::Classifier(format!("input_ids: {e:?}")))?;
    let attention_mask = Tensor::from_array((shape, mask))
        .map_err(|e| QueryError::Classifier(format!("attention_mask: {e:?}")))?;
    Ok((encoding, input_ids, attention_mask))
}

/// Fine-tuned sequence classifier exported to ONNX (BART-style: ids + mask in, `logits` out).
pub struct OnnxSequenceClassifier {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
}

impl OnnxSequenceClassifier {
    pub fn new(model_dir: &Path, max_length: usize) -> Result<Self> {
        let model_path = find_model(model_dir)?;
        let session = load_session(&model_path)?;
        let tokenizer = load_tokenizer(model_dir, max_length)?;
        tracing::info!(model = %model_path.display(), max_length, "loaded intent model");
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

impl IntentModel for OnnxSequenceClassifier {
    fn logits(&self, text: &str) -> Result<Vec<f32>> {
        let (_encoding, input_ids, attention_mask) = encode(&self.tokenizer, text)?;
        let inputs = ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
        ];
        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| QueryError::Classifier(format!("inference failed: {e:?}")))?;
        let (_shape, data) = outputs["logits"]
            .try_extract_tensor::<f32>()
            .map_err(|e| QueryError::Classifier(format!("logits: {e:?}")))?;
        if data.is_empty() {
            return Err(QueryError::Classifier("empty logits tensor".into()));
        }
        Ok(data.to_vec())
    }

    fn name(&self) -> &str {
        "intent"
    }
}

#[derive(serde::Deserialize)]
struct TokenClassifierConfig {
    id2label: BTreeMap<String, String>,
}

/// Token-classification NER model exported to ONNX, with BIO tags read from `config.json`.
pub struct OnnxEntityRecognizer {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    id2label: Vec<String>,
}

impl OnnxEntityRecognizer {
    pub fn new(model_dir: &Path, max_length: usize) -> Result<Self> {
        let model_path = find_model(model_dir)?;
        let session = load_session(&model_path)?;
        let tokenizer = load_tokenizer(model_dir, max_length)?;
        let raw = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: TokenClassifierConfig = serde_json::from_str(&raw)
            .map_err(|e| QueryError::Config(format!("config.json: {e}")))?;
        let id2label = labels_by_index(config.id2label)?;
        if id2label.is_empty() {
            return Err(QueryError::Config("config.json has an empty id2label".into()));
        }
        tracing::info!(model = %model_path.display(), tags = id2label.len(), "loaded NER model");
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            id2label,
        })
    }
}

fn labels_by_index(id2label: BTreeMap<String, String>) -> Result<Vec<String>> {
    let mut indexed = Vec::with_capacity(id2label.len());
    for (k, v) in id2label {
        let i: usize = k
            .parse()
            .map_err(|_| QueryError::Config(format!("id2label key `{k}` is not an index")))?;
        indexed.push((i, v));
    }
    indexed.sort_by_key(|(i, _)| *i);
    if indexed.iter().enumerate().any(|(pos, (i, _))| pos != *i) {
        return Err(QueryError::Config("id2label indices are not contiguous".into()));
    }
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

impl EntityRecognizer for OnnxEntityRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<Entity>> {
        let (encoding, input_ids, attention_mask) = encode(&self.tokenizer, text)
            .map_err(|e| QueryError::Recognizer(e.to_string()))?;
        let inputs = ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
        ];
        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| QueryError::Recognizer(format!("inference failed: {e:?}")))?;
        let (shape, data) = outputs["logits"]
            .try_extract_tensor::<f32>()
            .map_err(|e| QueryError::Recognizer(format!("logits: {e:?}")))?;
        // [batch, tokens, tags]
        if shape.len() != 3 || shape[2] as usize != self.id2label.len() {
            return Err(QueryError::Recognizer(format!(
                "unexpected logits shape {shape:?} for {} tags",
                self.id2label.len()
            )));
        }
        let width = self.id2label.len();
        let tags: Vec<TokenTag> = data
            .chunks(width)
            .zip(encoding.get_offsets())
            .zip(encoding.get_special_tokens_mask())
            .filter(|(_, special)| **special == 0)
            .map(|((scores, &offsets), _)| TokenTag {
                offsets,
                tag: argmax(scores)
                    .and_then(|i| self.id2label.get(i))
                    .cloned()
                    .unwrap_or_else(|| "O".to_string()),
            })
            .collect();
        Ok(decode_bio(text, &tags))
    }
}

fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}

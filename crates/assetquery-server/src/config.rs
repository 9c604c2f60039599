use anyhow::{bail, Context};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Start-up settings, read once from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub model_dir: PathBuf,
    pub ner_model_dir: Option<PathBuf>,
    pub mapping_path: PathBuf,
    pub data_path: PathBuf,
    pub max_seq_len: usize,
    pub http_addr: SocketAddr,
    pub tls: Option<TlsPaths>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        // a missing .env is fine
        let _ = dotenv::dotenv();

        let data_path = env::var("DATA_PATH").context("DATA_PATH is required but not set")?;
        let max_seq_len = var_or("MAX_SEQ_LEN", "1024")
            .parse()
            .context("invalid MAX_SEQ_LEN")?;
        let http_addr = var_or("HTTP_ADDR", "0.0.0.0:8080")
            .parse()
            .context("invalid HTTP_ADDR")?;
        let tls = match (env::var("TLS_CERT_PATH").ok(), env::var("TLS_KEY_PATH").ok()) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => bail!("TLS_CERT_PATH and TLS_KEY_PATH must be set together"),
        };

        Ok(Self {
            model_dir: var_or("MODEL_DIR", "./final_model").into(),
            ner_model_dir: env::var("NER_MODEL_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            mapping_path: var_or("MAPPING_PATH", "intent_mappings.csv").into(),
            data_path: data_path.into(),
            max_seq_len,
            http_addr,
            tls,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

mod config;
mod error;
mod metrics;

use anyhow::Context;
use assetquery_core::{
    EntityRecognizer, FilterExtractor, IntentMappingTable, NoEntities, QueryError, QueryResult,
};
use assetquery_router::{AppContext, IntentClassifier, OnnxEntityRecognizer, OnnxSequenceClassifier};
use assetquery_storage::{read_snapshot, DocumentStore, InMemoryStore};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use config::ServiceConfig;
use error::ApiError;
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    ctx: Arc<AppContext>,
}

#[derive(Debug, Deserialize)]
struct PredictRequest {
    text: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    let ctx = load_context(&config)?;
    let app = build_router(AppState { ctx: Arc::new(ctx) });

    let addr = config.http_addr;
    match &config.tls {
        Some(tls) => {
            let rustls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .context("load TLS certificate and key")?;
            info!(%addr, "https listening");
            axum_server::bind_rustls(addr, rustls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!(%addr, "http listening");
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await?;
        }
    }
    Ok(())
}

/// Loads the mapping, the snapshot and both models. Any failure here stops the process.
fn load_context(config: &ServiceConfig) -> anyhow::Result<AppContext> {
    let mapping = IntentMappingTable::from_path(&config.mapping_path)
        .with_context(|| format!("load intent mapping {}", config.mapping_path.display()))?;
    let labels = mapping.label_space();
    info!(rows = mapping.rows().len(), intents = labels.len(), "intent mapping loaded");

    let docs = read_snapshot(&config.data_path)
        .with_context(|| format!("load snapshot {}", config.data_path.display()))?;
    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::from_documents(docs));
    info!(documents = store.document_count(), "document store ready");

    let model = OnnxSequenceClassifier::new(&config.model_dir, config.max_seq_len)
        .with_context(|| format!("load intent model from {}", config.model_dir.display()))?;
    let classifier = IntentClassifier::new(Arc::new(model), labels)
        .context("intent model disagrees with the mapping's label space")?;

    let recognizer: Arc<dyn EntityRecognizer> = match &config.ner_model_dir {
        Some(dir) => Arc::new(
            OnnxEntityRecognizer::new(dir, config.max_seq_len)
                .with_context(|| format!("load NER model from {}", dir.display()))?,
        ),
        None => {
            tracing::warn!("NER_MODEL_DIR not set; only IP address and year filters will be extracted");
            Arc::new(NoEntities)
        }
    };

    Ok(AppContext::new(
        classifier,
        FilterExtractor::new(recognizer),
        Arc::new(mapping),
        store,
    ))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn predict(
    State(app): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, ApiError> {
    let Json(req) = payload.map_err(|e| QueryError::Validation(e.body_text()))?;
    let result = app.ctx.process_query(&req.text).await?;
    Ok(Json(result))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    let _ = encoder.encode(&metric_families, &mut buf);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        String::from_utf8(buf).unwrap_or_default(),
    )
}

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};

pub static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "assetquery_requests_total",
        "Dispatched queries by intent kind",
        &["intent_kind"]
    )
    .unwrap()
});

pub static DISPATCH_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "assetquery_dispatch_seconds",
        "Store work per dispatched query",
        &["intent_kind"]
    )
    .unwrap()
});

pub static INFERENCE_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "assetquery_inference_seconds",
        "Model forward pass latency",
        &["model"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .unwrap()
});

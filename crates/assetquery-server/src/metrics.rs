use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec};

pub static ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "assetquery_errors_total",
        "Failed predict requests by error code",
        &["code"]
    )
    .unwrap()
});

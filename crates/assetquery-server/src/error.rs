use crate::metrics::ERRORS_TOTAL;
use assetquery_core::QueryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub struct ApiError(pub QueryError);

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Mapping misses never get here: `process_query` reports them inside a 200 body.
    pub fn status(&self) -> StatusCode {
        match self.0.code() {
            "validation" => StatusCode::BAD_REQUEST,
            "store" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.0.code();
        ERRORS_TOTAL.with_label_values(&[code]).inc();
        if status.is_server_error() {
            tracing::error!(code, error = %self.0, "predict failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string(), "code": code });
        (status, Json(body)).into_response()
    }
}

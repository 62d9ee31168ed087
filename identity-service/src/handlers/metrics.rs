use axum::response::IntoResponse;

pub async fn metrics() -> impl IntoResponse {
    admission_core::observability::render_metrics()
}

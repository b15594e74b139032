//! Health check endpoint

use axum::Json;

use crate::dto::HealthResponse;

/// GET /health - Check API health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::test_support::{app, send};

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = send(&app.router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}

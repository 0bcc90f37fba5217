//! Error conversions
//!
//! Renders [`AppError`] as an HTTP response when the `axum` feature is on.

#[cfg(feature = "axum")]
use super::app_error::AppError;

// ============================================================================
// Axum conversions (feature-gated)
// ============================================================================

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // RFC 7807 Problem Details for HTTP APIs
        let body = serde_json::json!({
            "type": format!("https://httpstatuses.io/{}", self.status_code()),
            "title": self.kind().as_str(),
            "status": self.status_code(),
            "detail": self.message(),
            "action": self.action(),
            "retryable": self.is_retryable(),
        });

        if self.is_retryable() {
            return (status, [(http::header::RETRY_AFTER, "1")], Json(body)).into_response();
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(all(test, feature = "axum"))]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_status_from_kind() {
        let response = AppError::conflict("Duplicate key value").into_response();
        assert_eq!(response.status().as_u16(), 409);
        assert!(response.headers().get(http::header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_retryable_sets_retry_after() {
        let response = AppError::service_unavailable("Lock wait timed out")
            .retryable()
            .into_response();
        assert_eq!(response.status().as_u16(), 503);
        assert_eq!(
            response.headers().get(http::header::RETRY_AFTER).unwrap(),
            "1"
        );
    }
}

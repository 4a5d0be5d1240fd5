//! HTTP rendering of gateway errors.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use bastion_types::GatewayError;

/// Wraps [`GatewayError`] so handlers can return it with `?`.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = self.0.retry_after_secs();

        let body = match self.0 {
            // Downstream rejected the request; its body goes back untouched.
            GatewayError::ClientError { body, .. } => body,
            other => serde_json::json!({
                "success": false,
                "message": other.to_string(),
                "statusCode": status.as_u16(),
            }),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

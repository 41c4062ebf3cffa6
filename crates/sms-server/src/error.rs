use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sms_core::SmsError;

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 401 Unauthorized errors
// ---------------------------------------------------------------------------

/// Private sentinel error type used to carry an explicit HTTP 401 through
/// the `anyhow::Error` chain without touching the `SmsError` enum.
#[derive(Debug)]
struct UnauthorizedError(String);

impl std::fmt::Display for UnauthorizedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UnauthorizedError {}

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 401 Unauthorized error.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(UnauthorizedError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(u) = self.0.downcast_ref::<UnauthorizedError>() {
            let body = serde_json::json!({ "error": u.0.clone() });
            return (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
        }

        let status = if let Some(e) = self.0.downcast_ref::<SmsError>() {
            match e {
                SmsError::IssueNotFound(_)
                | SmsError::FieldNotFound(_)
                | SmsError::GroupNotFound(_)
                | SmsError::JobNotFound(_)
                | SmsError::HandlerNotFound(_)
                | SmsError::PageNotFound(_)
                | SmsError::ConfigNotFound => StatusCode::NOT_FOUND,
                SmsError::UnknownWebhookEvent(_)
                | SmsError::InvalidSchedule { .. }
                | SmsError::InvalidMeasurement(_) => StatusCode::BAD_REQUEST,
                SmsError::UnexpectedStatus { .. } => StatusCode::BAD_GATEWAY,
                SmsError::TokenNotSet(_)
                | SmsError::ConfluenceNotConfigured
                | SmsError::TransitionNotAvailable { .. }
                | SmsError::Http(_)
                | SmsError::Io(_)
                | SmsError::Yaml(_)
                | SmsError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

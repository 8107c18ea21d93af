//! HTTP error responses.
//!
//! Every non-2xx body shares one JSON shape so clients can render it
//! uniformly: `{ "success": false, "error", "message", "upgradeRequired" }`.
//! A gate refusal is mapped here too, even though it is a normal outcome
//! rather than an error, because the wire shape is the same.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::gate::DenyReason;
use crate::TrialgateError;

/// JSON error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    upgrade_required: bool,
}

/// An HTTP-facing failure with a fixed status code and JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    message: String,
    upgrade_required: bool,
}

impl ApiError {
    /// 404 with no entitlement detail: unsupported platform or missing file.
    pub fn not_found(message: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: "File not found".to_string(),
            message: message.to_string(),
            upgrade_required: false,
        }
    }

    /// 401 when the subject header is absent.
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: "Authentication required".to_string(),
            message: "Provide a subject identity to access downloads".to_string(),
            upgrade_required: false,
        }
    }

    /// 403 carrying the gate's refusal reason.
    pub fn denied(reason: DenyReason) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            error: "Download access denied".to_string(),
            message: reason.message().to_string(),
            upgrade_required: reason.upgrade_required(),
        }
    }

    /// 500 for conditions that should not occur in normal operation.
    pub fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Internal error".to_string(),
            message: message.to_string(),
            upgrade_required: false,
        }
    }
}

impl From<TrialgateError> for ApiError {
    fn from(err: TrialgateError) -> Self {
        let (status, error) = match &err {
            TrialgateError::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid submission"),
            TrialgateError::AlreadyPending => {
                (StatusCode::CONFLICT, "Submission already pending")
            }
            TrialgateError::AlreadyVerified => {
                (StatusCode::CONFLICT, "Payment already verified")
            }
            TrialgateError::NoPendingSubmission | TrialgateError::UnknownSubject(_) => {
                (StatusCode::NOT_FOUND, "Nothing to verify")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        };
        Self {
            status,
            error: error.to_string(),
            message: err.to_string(),
            upgrade_required: false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.error,
            message: self.message,
            upgrade_required: self.upgrade_required,
        };
        (self.status, Json(body)).into_response()
    }
}

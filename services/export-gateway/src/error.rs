//! Gateway error type and its HTTP projection

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use onshape_auth::AuthError;
use serde_json::json;
use thiserror::Error;

/// Errors a gateway handler surfaces to the client.
///
/// Every variant renders as `{"success": false, "error": "..."}` with the
/// status carried by the variant. Provider failures keep the provider's
/// status code so callers can tell their own mistakes (403 scope problems,
/// 404 bad ids) apart from gateway faults.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Access denied by user.")]
    AccessDenied,

    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AccessDenied => StatusCode::FORBIDDEN,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed in the response body. Session failures collapse to
    /// two fixed strings so the body never echoes verifier internals.
    fn public_message(&self) -> String {
        match self {
            GatewayError::Auth(AuthError::Missing) => String::from("Not authenticated"),
            GatewayError::Auth(_) => String::from("Invalid token"),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = Json(json!({ "success": false, "error": self.public_message() }));
        (status, body).into_response()
    }
}

impl From<onshape_auth::Error> for GatewayError {
    fn from(err: onshape_auth::Error) -> Self {
        match err {
            onshape_auth::Error::TokenExchange { status, body }
            | onshape_auth::Error::UserInfo { status, body } => GatewayError::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message: body,
            },
            onshape_auth::Error::Http(_) | onshape_auth::Error::InvalidResponse(_) => {
                GatewayError::Upstream {
                    status: StatusCode::BAD_GATEWAY,
                    message: err.to_string(),
                }
            }
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

//! Error types and error handling

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use thiserror::Error;

/// Framework error type
///
/// Workflow *outcomes* (denied, locked, vetoed, cancelled) are values on
/// [`crate::workflow::ActionResponse`], not errors. An `Err` of this type
/// means the machinery itself failed: a collaborator broke, a request could
/// not be parsed, or configuration is invalid.
#[derive(Debug, Error)]
pub enum StewardError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bad request error
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Node error
    #[error("Node error: {0}")]
    Node(#[from] crate::node::NodeError),

    /// Lock backend error
    #[error("Lock error: {0}")]
    Lock(#[from] crate::lock::LockError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] crate::session::SessionError),

    /// Transaction backend error
    #[error("Backend error: {0}")]
    Backend(#[from] crate::workflow::BackendError),

    /// Unknown node name in a routed request
    #[error("Unknown node: {0}")]
    UnknownNode(String),
}

impl IntoResponse for StewardError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnknownNode(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            // Never leak backend detail to the client on 500s
            (status, "Internal server error".to_string()).into_response()
        } else {
            (status, self.to_string()).into_response()
        }
    }
}

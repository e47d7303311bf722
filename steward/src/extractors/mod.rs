//! Request extractors
//!
//! Typed access to per-request state the middleware stack prepared.

use crate::session::{SessionData, SessionId};
use axum::extract::FromRequestParts;
use http::request::Parts;
use http::StatusCode;

/// The request's session, loaded by the session middleware
///
/// Handlers mutate `data` locally and persist it by inserting the final
/// value into the response extensions (see
/// [`crate::middleware::SessionLayer`]).
///
/// # Rejection
///
/// `500 Internal Server Error` when the session middleware is not
/// installed on the route.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    /// Session identifier (lock lease owner)
    pub id: SessionId,
    /// Mutable session snapshot for this request
    pub data: SessionData,
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts.extensions.get::<SessionId>().cloned();
        let data = parts.extensions.get::<SessionData>().cloned();
        match (id, data) {
            (Some(id), Some(data)) => Ok(Self { id, data }),
            _ => {
                tracing::error!("session middleware missing: no session in request extensions");
                Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "session middleware not installed",
                ))
            }
        }
    }
}

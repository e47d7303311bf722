//! Session middleware for automatic session management
//!
//! Handles session cookie extraction, validation, and persistence across
//! requests against the shared [`SessionRegistry`]. Handlers read the
//! session from request extensions; to persist changes they insert the
//! modified [`SessionData`] into the *response* extensions, which this
//! middleware saves back.

use crate::session::{SessionData, SessionId, SessionRegistry};
use crate::state::StewardState;
use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use chrono::Duration;
use http::header::{COOKIE, SET_COOKIE};
use http::HeaderValue;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Session cookie name
pub const SESSION_COOKIE_NAME: &str = "steward_session";

/// Session configuration for middleware
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Cookie name for session ID
    pub cookie_name: String,
    /// Cookie path
    pub cookie_path: String,
    /// HTTP-only cookie (recommended: true)
    pub http_only: bool,
    /// Secure cookie (HTTPS only)
    pub secure: bool,
    /// `SameSite` policy
    pub same_site: SameSite,
    /// Session TTL in seconds
    pub max_age_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: SESSION_COOKIE_NAME.to_string(),
            cookie_path: "/".to_string(),
            http_only: true,
            secure: !cfg!(debug_assertions),
            same_site: SameSite::Lax,
            max_age_secs: 86400, // 24 hours
        }
    }
}

/// `SameSite` cookie policy
#[derive(Clone, Copy, Debug, Default)]
pub enum SameSite {
    /// Strict same-site policy
    Strict,
    /// Lax same-site policy (recommended)
    #[default]
    Lax,
    /// No same-site restriction (requires Secure)
    None,
}

impl SameSite {
    /// Convert to cookie attribute string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Layer for session middleware
#[derive(Clone, Debug)]
pub struct SessionLayer {
    config: SessionConfig,
    registry: SessionRegistry,
}

impl SessionLayer {
    /// Create a session layer wired to the state's registry, honoring
    /// the configured cookie security settings
    #[must_use]
    pub fn new(state: &StewardState) -> Self {
        let security = &state.config().security;
        let config = SessionConfig {
            secure: security.secure_cookies,
            max_age_secs: security.session_max_age_secs,
            ..SessionConfig::default()
        };
        Self {
            config,
            registry: state.sessions().clone(),
        }
    }

    /// Create a session layer with custom configuration
    #[must_use]
    pub fn with_config(state: &StewardState, config: SessionConfig) -> Self {
        Self {
            config,
            registry: state.sessions().clone(),
        }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionMiddleware {
            inner,
            config: Arc::new(self.config.clone()),
            registry: self.registry.clone(),
        }
    }
}

/// Session middleware that handles cookie-based sessions
#[derive(Clone, Debug)]
pub struct SessionMiddleware<S> {
    inner: S,
    config: Arc<SessionConfig>,
    registry: SessionRegistry,
}

impl<S> Service<Request> for SessionMiddleware<S>
where
    S: Service<Request, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let config = self.config.clone();
        let registry = self.registry.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let existing_session_id = extract_session_id(&req, &config.cookie_name);

            // Load or create the session
            let (session_id, mut session_data, is_new) = existing_session_id
                .and_then(|id| registry.load(&id).map(|data| (id, data)))
                .map_or_else(
                    || (SessionId::generate(), SessionData::new(), true),
                    |(id, data)| (id, data, false),
                );

            // chrono durations are bounded to i64 milliseconds
            let extend_secs = i64::try_from(config.max_age_secs)
                .unwrap_or(i64::MAX / 1_000)
                .min(i64::MAX / 1_000);
            session_data.touch(Duration::seconds(extend_secs));

            // Hand the session to handlers through request extensions
            req.extensions_mut().insert(session_id.clone());
            req.extensions_mut().insert(session_data.clone());

            let mut response = inner.call(req).await?;

            // Handlers persist changes by placing the modified session
            // into the response extensions
            let final_session_data = response
                .extensions()
                .get::<SessionData>()
                .cloned()
                .unwrap_or(session_data);
            registry.save(session_id.clone(), final_session_data);

            if is_new {
                set_session_cookie(&mut response, &session_id, &config);
            }

            Ok(response)
        })
    }
}

/// Extract session ID from request cookies
fn extract_session_id(req: &Request, cookie_name: &str) -> Option<SessionId> {
    let cookie_header = req.headers().get(COOKIE)?;
    let cookie_str = cookie_header.to_str().ok()?;

    for cookie in cookie_str.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=') {
            if name.trim() == cookie_name {
                return SessionId::from_str(value.trim()).ok();
            }
        }
    }
    None
}

/// Set session cookie on response
fn set_session_cookie(response: &mut Response<Body>, session_id: &SessionId, config: &SessionConfig) {
    let mut cookie = format!(
        "{}={}; Path={}; Max-Age={}; SameSite={}",
        config.cookie_name,
        session_id,
        config.cookie_path,
        config.max_age_secs,
        config.same_site.as_str()
    );
    if config.http_only {
        cookie.push_str("; HttpOnly");
    }
    if config.secure {
        cookie.push_str("; Secure");
    }

    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_session_id_among_other_cookies() {
        let id = SessionId::generate();
        let req = Request::builder()
            .header(
                COOKIE,
                format!("theme=dark; {SESSION_COOKIE_NAME}={id}; lang=en"),
            )
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_session_id(&req, SESSION_COOKIE_NAME), Some(id));
    }

    #[test]
    fn malformed_cookie_yields_none() {
        let req = Request::builder()
            .header(COOKIE, format!("{SESSION_COOKIE_NAME}=not-a-uuid"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_session_id(&req, SESSION_COOKIE_NAME), None);

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_session_id(&bare, SESSION_COOKIE_NAME), None);
    }

    #[test]
    fn cookie_carries_configured_attributes() {
        let mut response = Response::new(Body::empty());
        let id = SessionId::generate();
        let config = SessionConfig {
            secure: true,
            ..SessionConfig::default()
        };
        set_session_cookie(&mut response, &id, &config);

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with(&format!("{SESSION_COOKIE_NAME}={id}")));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
    }
}

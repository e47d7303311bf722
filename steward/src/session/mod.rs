//! Session types and data structures
//!
//! Per-session state for the admin toolkit: identity, expiry, the screen
//! navigation stack (string variables resolved top-down), and the
//! session-backed scratch row store used when an interaction persists to
//! the session instead of the database.

pub mod csrf;

pub use csrf::CsrfToken;

use crate::record::Record;
use crate::selector::Selector;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Session stack variable naming the persistence target of the current
/// interaction; value [`STORE_SESSION`] selects the scratch row store.
pub const STORE_VAR: &str = "store";

/// [`STORE_VAR`] value selecting the session-backed scratch store
pub const STORE_SESSION: &str = "session";

/// Session errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The session ID string is not a valid UUID
    #[error("invalid session ID format")]
    InvalidSessionId,
}

/// Unique session identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new cryptographically secure session ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from a string (validates format)
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID.
    pub fn try_from_string(s: String) -> Result<Self, SessionError> {
        Uuid::parse_str(&s)
            .map(|_| Self(s))
            .map_err(|_| SessionError::InvalidSessionId)
    }

    /// Get the session ID as a string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from_string(s.to_string())
    }
}

/// One frame of the session navigation stack
///
/// Each admin screen pushes a frame; string variables set on a deeper
/// frame shadow those of the frames beneath it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFrame {
    /// Name of the screen this frame belongs to
    pub screen: String,
    /// Frame-scoped string variables
    pub vars: HashMap<String, String>,
}

impl StackFrame {
    /// Create a frame for a screen with no variables
    #[must_use]
    pub fn new(screen: impl Into<String>) -> Self {
        Self {
            screen: screen.into(),
            vars: HashMap::new(),
        }
    }

    /// Set a variable, returning the frame for chaining
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

/// Session data stored per-session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// When this session was created
    pub created_at: DateTime<Utc>,
    /// When this session was last accessed
    pub last_accessed: DateTime<Utc>,
    /// When this session expires
    pub expires_at: DateTime<Utc>,
    /// Screen navigation stack, innermost frame last
    stack: Vec<StackFrame>,
    /// Scratch rows per node table, for session-backed persistence
    scratch: HashMap<String, Vec<Record>>,
    /// Active CSRF token, if one has been issued
    pub(crate) csrf: Option<csrf::CsrfTokenData>,
}

impl SessionData {
    /// Create new session data with default expiration (24 hours)
    #[must_use]
    pub fn new() -> Self {
        Self::with_expiration(Duration::hours(24))
    }

    /// Create session data with custom expiration duration
    #[must_use]
    pub fn with_expiration(duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            last_accessed: now,
            expires_at: now + duration,
            stack: Vec::new(),
            scratch: HashMap::new(),
            csrf: None,
        }
    }

    /// Check if session is expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Update last accessed time and extend expiration
    pub fn touch(&mut self, extend_by: Duration) {
        self.last_accessed = Utc::now();
        self.expires_at = self.last_accessed + extend_by;
    }

    /// Validate session is not expired and touch it if valid
    ///
    /// Returns `true` (and extends the session) when it is still live,
    /// `false` (leaving it untouched) when it has expired.
    pub fn validate_and_touch(&mut self, extend_by: Duration) -> bool {
        if self.is_expired() {
            false
        } else {
            self.touch(extend_by);
            true
        }
    }

    /// Push a navigation frame
    pub fn push_frame(&mut self, frame: StackFrame) {
        self.stack.push(frame);
    }

    /// Pop the innermost navigation frame
    pub fn pop_frame(&mut self) -> Option<StackFrame> {
        self.stack.pop()
    }

    /// Resolve a stack variable, innermost frame first
    #[must_use]
    pub fn stack_var(&self, name: &str) -> Option<&str> {
        self.stack
            .iter()
            .rev()
            .find_map(|frame| frame.vars.get(name))
            .map(String::as_str)
    }

    /// Whether the active interaction persists to the session scratch
    /// store rather than the database
    #[must_use]
    pub fn uses_session_store(&self) -> bool {
        self.stack_var(STORE_VAR) == Some(STORE_SESSION)
    }

    /// Scratch rows held for a node's table
    #[must_use]
    pub fn scratch_rows(&self, table: &str) -> &[Record] {
        self.scratch.get(table).map_or(&[], Vec::as_slice)
    }

    /// Append a scratch row for a node's table
    pub fn put_scratch_row(&mut self, table: impl Into<String>, record: Record) {
        self.scratch.entry(table.into()).or_default().push(record);
    }

    /// Remove the scratch rows a selector names, matching on `primary_key`
    ///
    /// Returns `true` only when every identifier in the selector matched
    /// at least one row; a miss on any identifier still removes the rows
    /// that did match, mirroring the store's row-at-a-time delete.
    pub fn delete_scratch_rows(
        &mut self,
        table: &str,
        primary_key: &str,
        selector: &Selector,
    ) -> bool {
        let Some(rows) = self.scratch.get_mut(table) else {
            return false;
        };
        let mut all_matched = true;
        for id in selector.ids() {
            let before = rows.len();
            rows.retain(|row| row.display_text(primary_key) != *id);
            if rows.len() == before {
                all_matched = false;
            }
        }
        all_matched
    }
}

impl Default for SessionData {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared in-memory session registry
///
/// Backs the session middleware: sessions are loaded by ID on request and
/// saved back on response. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<SessionId, SessionData>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a session if present and not expired
    ///
    /// Expired sessions are removed on access.
    #[must_use]
    pub fn load(&self, id: &SessionId) -> Option<SessionData> {
        let expired = {
            let sessions = self.inner.read();
            match sessions.get(id) {
                Some(data) if !data.is_expired() => return Some(data.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.inner.write().remove(id);
        }
        None
    }

    /// Save (or replace) a session
    pub fn save(&self, id: SessionId, data: SessionData) {
        self.inner.write().insert(id, data);
    }

    /// Remove a session outright
    pub fn remove(&self, id: &SessionId) {
        self.inner.write().remove(id);
    }

    /// Drop every expired session, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let mut sessions = self.inner.write();
        let before = sessions.len();
        sessions.retain(|_, data| !data.is_expired());
        before - sessions.len()
    }

    /// Number of live sessions currently registered
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the registry holds no sessions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_round_trips_valid_uuid() {
        let id = SessionId::generate();
        let parsed: SessionId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn session_id_rejects_garbage() {
        assert_eq!(
            "not-a-uuid".parse::<SessionId>().unwrap_err(),
            SessionError::InvalidSessionId
        );
    }

    #[test]
    fn stack_var_resolves_innermost_first() {
        let mut session = SessionData::new();
        session.push_frame(StackFrame::new("list").with_var(STORE_VAR, "database"));
        session.push_frame(StackFrame::new("edit").with_var(STORE_VAR, STORE_SESSION));
        assert_eq!(session.stack_var(STORE_VAR), Some(STORE_SESSION));
        assert!(session.uses_session_store());

        session.pop_frame();
        assert_eq!(session.stack_var(STORE_VAR), Some("database"));
        assert!(!session.uses_session_store());
    }

    #[test]
    fn stack_var_missing_is_none() {
        let session = SessionData::new();
        assert_eq!(session.stack_var(STORE_VAR), None);
        assert!(!session.uses_session_store());
    }

    #[test]
    fn scratch_rows_delete_by_selector() {
        let mut session = SessionData::new();
        session.put_scratch_row("members", Record::new().with("id", "1"));
        session.put_scratch_row("members", Record::new().with("id", "2"));
        session.put_scratch_row("members", Record::new().with("id", "3"));

        let selector = Selector::new(["1", "3"]).unwrap();
        assert!(session.delete_scratch_rows("members", "id", &selector));
        assert_eq!(session.scratch_rows("members").len(), 1);
        assert_eq!(session.scratch_rows("members")[0].display_text("id"), "2");

        // Re-delete of a removed row reports failure
        assert!(!session.delete_scratch_rows("members", "id", &Selector::single("1")));
    }

    #[test]
    fn delete_from_unknown_table_fails() {
        let mut session = SessionData::new();
        assert!(!session.delete_scratch_rows("ghosts", "id", &Selector::single("1")));
    }

    #[test]
    fn expired_session_fails_validate_and_touch() {
        let mut expired = SessionData::with_expiration(Duration::seconds(-1));
        assert!(!expired.validate_and_touch(Duration::hours(24)));

        let mut live = SessionData::new();
        assert!(live.validate_and_touch(Duration::hours(24)));
    }

    #[test]
    fn registry_load_save_and_sweep() {
        let registry = SessionRegistry::new();
        let id = SessionId::generate();
        registry.save(id.clone(), SessionData::new());
        assert!(registry.load(&id).is_some());

        let stale = SessionId::generate();
        registry.save(stale.clone(), SessionData::with_expiration(Duration::seconds(-1)));
        assert!(registry.load(&stale).is_none());
        registry.save(stale, SessionData::with_expiration(Duration::seconds(-1)));
        assert_eq!(registry.sweep_expired(), 1);
        assert_eq!(registry.len(), 1);
    }
}

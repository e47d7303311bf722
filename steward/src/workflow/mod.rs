//! Delete workflow
//!
//! A CSRF-protected, multi-step delete over one or more selected records:
//! authorization, confirmation gate, lock acquisition, per-attribute
//! delete-veto checks, persistence (database or session scratch store),
//! cache invalidation, and a redirect carrying the outcome.
//!
//! One workflow instance processes exactly one request to completion; no
//! state survives between requests except the session and the lock table.
//! Failures are terminal values, never retried: the response is either a
//! redirect with an outcome, an access-denied page, a locked-record page,
//! or the confirmation page for a first visit.

use crate::config::{FormSettings, StewardConfig};
use crate::error::StewardError;
use crate::lock::{Lease, LockError, LockManager, LockMode};
use crate::node::{Attribute, Node, PageContent};
use crate::record::Record;
use crate::selector::Selector;
use crate::session::{csrf, SessionData, SessionId};
use async_trait::async_trait;
use axum::response::{IntoResponse, Redirect, Response};
use http::{HeaderName, HeaderValue, StatusCode};
use std::sync::Arc;
use thiserror::Error;

/// Action name carried in delete feedback URLs
pub const ACTION_DELETE: &str = "delete";

/// Response header carrying the CSRF token of a rendered confirmation page
pub const CSRF_TOKEN_HEADER: &str = "x-csrf-token";

/// Outcome of a completed action, surfaced in the feedback URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action completed and persisted
    Success,
    /// The action was blocked or the backend failed; carries a detail
    Failed,
    /// The user backed out; nothing was mutated
    Cancelled,
}

impl ActionOutcome {
    /// Stable string form used in feedback URLs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, parsed form of an incoming action request
///
/// Parsed once from the raw form pairs; handlers and the workflow never
/// touch the mutable form map again, so a prior action's leftovers cannot
/// leak into a re-render.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    /// The records the action targets
    pub selector: Selector,
    /// Confirmation flag: the user approved the pending action
    pub confirm: bool,
    /// Cancellation flag: the user backed out
    pub cancel: bool,
    /// Presented CSRF token, if any
    pub csrf_token: Option<String>,
    /// Stray routing-context filter; logged and dropped, never re-rendered
    pub filter: Option<String>,
}

impl ActionRequest {
    /// Parse an action request from decoded form pairs
    ///
    /// The selector field may repeat for batch selections. Confirm and
    /// cancel are flags: any value counts as present.
    ///
    /// # Errors
    ///
    /// [`StewardError::BadRequest`] when no selector field is present.
    pub fn from_pairs(
        pairs: &[(String, String)],
        forms: &FormSettings,
    ) -> Result<Self, StewardError> {
        let ids: Vec<&str> = pairs
            .iter()
            .filter(|(name, _)| *name == forms.selector_field)
            .map(|(_, value)| value.as_str())
            .collect();
        let selector = Selector::new(ids).map_err(|_| {
            StewardError::BadRequest(format!("missing form field: {}", forms.selector_field))
        })?;

        let field = |name: &str| {
            pairs
                .iter()
                .find(|(candidate, _)| candidate == name)
                .map(|(_, value)| value.clone())
        };

        Ok(Self {
            selector,
            confirm: field(&forms.confirm_field).is_some(),
            cancel: field(&forms.cancel_field).is_some(),
            csrf_token: field(&forms.token_field),
            filter: field(&forms.filter_field),
        })
    }
}

/// Context a confirmation page renders from
///
/// Freshly built per render: only the selection and a newly issued CSRF
/// token, never request leftovers.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// The records awaiting confirmation
    pub selector: Selector,
    /// Token the confirming request must present back
    pub csrf_token: Option<csrf::CsrfToken>,
}

impl RenderContext {
    /// Create a render context
    #[must_use]
    pub const fn new(selector: Selector, csrf_token: Option<csrf::CsrfToken>) -> Self {
        Self {
            selector,
            csrf_token,
        }
    }
}

/// Terminal result of one workflow pass
#[derive(Debug)]
pub enum ActionResponse {
    /// Redirect to a feedback URL carrying the outcome
    Redirect(String),
    /// Authorization or CSRF validation failed
    AccessDenied,
    /// A selected record is locked by another session
    Locked(PageContent),
    /// First visit: ask the user to confirm
    Confirmation {
        /// Page payload
        page: PageContent,
        /// Selection and token for the confirming request
        context: RenderContext,
    },
}

impl IntoResponse for ActionResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Redirect(url) => Redirect::to(&url).into_response(),
            Self::AccessDenied => (StatusCode::FORBIDDEN, "Access denied").into_response(),
            Self::Locked(page) => (
                StatusCode::LOCKED,
                format!("{}\n\n{}", page.title, page.body),
            )
                .into_response(),
            Self::Confirmation { page, context } => {
                let mut response = (
                    StatusCode::OK,
                    format!("{}\n\n{}", page.title, page.body),
                )
                    .into_response();
                if let Some(token) = context.csrf_token {
                    if let Ok(value) = HeaderValue::from_str(token.as_str()) {
                        response
                            .headers_mut()
                            .insert(HeaderName::from_static(CSRF_TOKEN_HEADER), value);
                    }
                }
                response
            }
        }
    }
}

/// Authorization predicate over individual records
#[cfg_attr(test, mockall::automock)]
pub trait Authorizer: Send + Sync {
    /// Whether the current actor may perform `action` on `record`
    fn allowed(&self, action: &str, record: &Record) -> bool;
}

/// Permits everything; the default for trusted internal tooling
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn allowed(&self, _action: &str, _record: &Record) -> bool {
        true
    }
}

/// Transaction backend error, surfaced verbatim as the failure detail
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// Transaction control over the unit of work wrapping persistence
///
/// The workflow assumes a unit of work is already open when it runs and
/// closes it exactly once: commit after a successful delete, rollback
/// after a veto or a backend failure.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Commit the open unit of work
    async fn commit(&self) -> Result<(), BackendError>;

    /// Roll back the open unit of work
    async fn rollback(&self) -> Result<(), BackendError>;
}

/// No-op backend for stores without transaction control
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoCommit;

#[async_trait]
impl Backend for AutoCommit {
    async fn commit(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn rollback(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// The formatted failure detail for an attribute's delete veto
#[must_use]
pub fn veto_detail(attribute: &dyn Attribute, reason: &str) -> String {
    format!(
        "Delete not allowed: {} ({}): {reason}",
        attribute.label(),
        attribute.field_name()
    )
}

/// Orchestrates one CSRF-protected delete request to completion
pub struct DeleteWorkflow {
    node: Arc<dyn Node>,
    authorizer: Arc<dyn Authorizer>,
    locks: Arc<dyn LockManager>,
    backend: Arc<dyn Backend>,
    csrf_enabled: bool,
    locking_enabled: bool,
}

impl DeleteWorkflow {
    /// Create a workflow with CSRF and locking enabled
    #[must_use]
    pub fn new(
        node: Arc<dyn Node>,
        authorizer: Arc<dyn Authorizer>,
        locks: Arc<dyn LockManager>,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            node,
            authorizer,
            locks,
            backend,
            csrf_enabled: true,
            locking_enabled: true,
        }
    }

    /// Apply configuration toggles
    #[must_use]
    pub fn with_config(mut self, config: &StewardConfig) -> Self {
        self.csrf_enabled = config.security.csrf_enabled;
        self.locking_enabled = config.locking.enabled;
        self
    }

    /// Run the workflow for one request
    ///
    /// Returns the terminal [`ActionResponse`]; `Err` means a
    /// collaborator failed, not that the action was denied.
    ///
    /// # Errors
    ///
    /// Propagates node, lock backend, and transaction backend failures.
    pub async fn execute(
        &self,
        session_id: &SessionId,
        session: &mut SessionData,
        request: &ActionRequest,
    ) -> Result<ActionResponse, StewardError> {
        let table = self.node.settings().table.clone();

        // Authorization: all-or-nothing over the candidate set
        let candidates = self.node.select_candidates(&request.selector).await?;
        for record in &candidates {
            if !self.authorizer.allowed(ACTION_DELETE, record) {
                tracing::warn!(node = %table, selector = %request.selector, "delete denied by authorizer");
                return Ok(ActionResponse::AccessDenied);
            }
        }

        // CSRF: every state-changing request must present the session's
        // token; a first visit confirms nothing yet and is exempt
        if self.csrf_enabled && (request.confirm || request.cancel) {
            let valid = request
                .csrf_token
                .as_deref()
                .is_some_and(|token| csrf::validate(session, token));
            if !valid {
                tracing::warn!(node = %table, "invalid or missing CSRF token on delete confirmation");
                return Ok(ActionResponse::AccessDenied);
            }
        }

        // Confirm wins if a malformed client sets both flags
        if request.cancel && !request.confirm {
            tracing::debug!(node = %table, selector = %request.selector, "delete cancelled");
            return Ok(ActionResponse::Redirect(self.node.feedback_url(
                ACTION_DELETE,
                ActionOutcome::Cancelled,
                None,
            )));
        }

        // Lock every selected record, or none of them
        if let Some(mode) = self.lock_mode() {
            if !self.acquire_all(&request.selector, &table, mode, session_id).await? {
                return Ok(ActionResponse::Locked(self.node.locked_page()));
            }
        }

        // Attribute veto: first denial wins, nothing persists
        for attribute in self.node.attributes() {
            if let Err(reason) = attribute.delete_allowed(&request.selector) {
                let detail = veto_detail(attribute.as_ref(), &reason);
                tracing::warn!(node = %table, attribute = attribute.field_name(), %reason, "delete vetoed");
                self.rollback_quietly().await;
                return Ok(ActionResponse::Redirect(self.node.feedback_url(
                    ACTION_DELETE,
                    ActionOutcome::Failed,
                    Some(&detail),
                )));
            }
        }

        if !request.confirm {
            // First visit: render the confirmation page from a fresh
            // context. A stray filter from a prior action is dropped here,
            // never carried into the render.
            if let Some(filter) = &request.filter {
                tracing::debug!(node = %table, %filter, "dropping stale filter before confirmation render");
            }
            let token = self.csrf_enabled.then(|| csrf::issue(session));
            let context = RenderContext::new(request.selector.clone(), token);
            let page = self.node.confirmation_page(&context);
            return Ok(ActionResponse::Confirmation { page, context });
        }

        self.persist(session, request, &table).await
    }

    /// The lock mode in force, when both the node and the global toggle
    /// enable locking
    fn lock_mode(&self) -> Option<LockMode> {
        if self.locking_enabled {
            self.node.settings().locking
        } else {
            None
        }
    }

    /// Acquire a lease per selected record; on any contention, release
    /// the leases already acquired in this pass and report failure
    async fn acquire_all(
        &self,
        selector: &Selector,
        table: &str,
        mode: LockMode,
        owner: &SessionId,
    ) -> Result<bool, StewardError> {
        let mut held: Vec<Lease> = Vec::with_capacity(selector.len());
        for id in selector.ids() {
            match self.locks.acquire(id, table, mode, owner).await {
                Ok(lease) => held.push(lease),
                Err(LockError::Contended { .. }) => {
                    tracing::warn!(node = %table, record = %id, "record locked by another session");
                    for lease in &held {
                        if let Err(error) = self.locks.release(lease).await {
                            tracing::warn!(%error, record = %lease.record_id, "failed to release partial lease");
                        }
                    }
                    return Ok(false);
                }
                Err(error) => return Err(error.into()),
            }
        }
        Ok(true)
    }

    /// Persist the confirmed delete and redirect with the outcome
    async fn persist(
        &self,
        session: &mut SessionData,
        request: &ActionRequest,
        table: &str,
    ) -> Result<ActionResponse, StewardError> {
        let (outcome, detail) = if session.uses_session_store() {
            let primary_key = self.node.settings().primary_key.clone();
            if session.delete_scratch_rows(table, &primary_key, &request.selector) {
                (ActionOutcome::Success, None)
            } else {
                (
                    ActionOutcome::Failed,
                    Some("session store delete failed".to_string()),
                )
            }
        } else {
            match self.node.delete(&request.selector).await {
                Ok(()) => match self.backend.commit().await {
                    Ok(()) => {
                        self.node.invalidate_cache();
                        (ActionOutcome::Success, None)
                    }
                    Err(error) => {
                        tracing::error!(node = %table, %error, "commit failed after delete");
                        (ActionOutcome::Failed, Some(error.to_string()))
                    }
                },
                Err(error) => {
                    tracing::warn!(node = %table, selector = %request.selector, %error, "delete failed");
                    self.rollback_quietly().await;
                    (ActionOutcome::Failed, Some(error.to_string()))
                }
            }
        };

        if outcome == ActionOutcome::Success {
            tracing::info!(node = %table, selector = %request.selector, "records deleted");
        }
        Ok(ActionResponse::Redirect(self.node.feedback_url(
            ACTION_DELETE,
            outcome,
            detail.as_deref(),
        )))
    }

    /// Roll back without masking the failure already in flight
    async fn rollback_quietly(&self) {
        if let Err(error) = self.backend.rollback().await {
            tracing::warn!(%error, "rollback failed");
        }
    }
}

impl std::fmt::Debug for DeleteWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteWorkflow")
            .field("node", &self.node.settings().table)
            .field("csrf_enabled", &self.csrf_enabled)
            .field("locking_enabled", &self.locking_enabled)
            .finish_non_exhaustive()
    }
}

//! Integration tests for the delete workflow
//!
//! Exercises the full state machine against the in-memory node with fake
//! collaborators: all-or-nothing authorization, the CSRF gate, lock
//! acquisition with partial-batch release, attribute vetoes, and both
//! persistence paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use steward::prelude::*;
use steward::session::{csrf, StackFrame, STORE_SESSION, STORE_VAR};
use steward::workflow::{veto_detail, AutoCommit, BackendError};
use url::Url;

/// Denies the delete for records whose `id` is listed
struct DenyIds(Vec<String>);

impl Authorizer for DenyIds {
    fn allowed(&self, _action: &str, record: &Record) -> bool {
        !self.0.contains(&record.display_text("id"))
    }
}

/// Counts commits and rollbacks
#[derive(Default)]
struct RecordingBackend {
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn commit(&self) -> Result<(), BackendError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), BackendError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An attribute that always vetoes deletion
struct VetoAttribute;

#[async_trait]
impl Attribute for VetoAttribute {
    fn field_name(&self) -> &str {
        "invoices"
    }

    fn label(&self) -> String {
        "Open invoices".to_string()
    }

    fn delete_allowed(&self, _selector: &steward::selector::Selector) -> Result<(), String> {
        Err("open invoices must be settled first".to_string())
    }
}

fn seeded_node() -> Arc<MemoryNode> {
    let node = MemoryNode::builder("members")
        .attribute(FieldAttribute::new("name"))
        .locking(LockMode::Exclusive)
        .build();
    for (id, name) in [("1", "Ada"), ("2", "Grace"), ("123", "Edsger")] {
        node.insert(Record::new().with("id", id).with("name", name))
            .unwrap();
    }
    Arc::new(node)
}

fn request(ids: &[&str], confirm: bool, cancel: bool, token: Option<&str>) -> ActionRequest {
    ActionRequest {
        selector: Selector::new(ids.iter().copied()).unwrap(),
        confirm,
        cancel,
        csrf_token: token.map(str::to_string),
        filter: None,
    }
}

fn outcome_of(url: &str) -> (String, Option<String>) {
    let parsed = Url::parse(&format!("http://test{url}")).unwrap();
    let mut outcome = None;
    let mut detail = None;
    for (name, value) in parsed.query_pairs() {
        match name.as_ref() {
            "outcome" => outcome = Some(value.into_owned()),
            "detail" => detail = Some(value.into_owned()),
            _ => {}
        }
    }
    (outcome.unwrap(), detail)
}

struct Fixture {
    node: Arc<MemoryNode>,
    backend: Arc<RecordingBackend>,
    locks: Arc<InMemoryLockManager>,
    workflow: DeleteWorkflow,
    session_id: steward::session::SessionId,
    session: steward::session::SessionData,
}

fn fixture_with(node: Arc<MemoryNode>, authorizer: Arc<dyn Authorizer>) -> Fixture {
    let backend = Arc::new(RecordingBackend::default());
    let locks = Arc::new(InMemoryLockManager::new());
    let workflow = DeleteWorkflow::new(
        node.clone(),
        authorizer,
        locks.clone(),
        backend.clone(),
    );
    Fixture {
        node,
        backend,
        locks,
        workflow,
        session_id: steward::session::SessionId::generate(),
        session: steward::session::SessionData::new(),
    }
}

fn fixture() -> Fixture {
    fixture_with(seeded_node(), Arc::new(steward::workflow::AllowAll))
}

#[tokio::test]
async fn one_unauthorized_record_denies_the_whole_batch() {
    let mut fx = fixture_with(seeded_node(), Arc::new(DenyIds(vec!["2".to_string()])));
    let token = csrf::issue(&mut fx.session);

    let response = fx
        .workflow
        .execute(
            &fx.session_id,
            &mut fx.session,
            &request(&["1", "2"], true, false, Some(token.as_str())),
        )
        .await
        .unwrap();

    assert!(matches!(response, ActionResponse::AccessDenied));
    assert_eq!(fx.node.len(), 3);
    assert_eq!(fx.backend.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn state_changing_requests_without_valid_token_are_denied() {
    let mut fx = fixture();
    let _issued = csrf::issue(&mut fx.session);

    // confirm with no token
    let response = fx
        .workflow
        .execute(
            &fx.session_id,
            &mut fx.session,
            &request(&["1"], true, false, None),
        )
        .await
        .unwrap();
    assert!(matches!(response, ActionResponse::AccessDenied));

    // cancel with a forged token is denied just the same
    let response = fx
        .workflow
        .execute(
            &fx.session_id,
            &mut fx.session,
            &request(&["1"], false, true, Some("forged")),
        )
        .await
        .unwrap();
    assert!(matches!(response, ActionResponse::AccessDenied));

    assert_eq!(fx.node.len(), 3);
    assert_eq!(fx.backend.commits.load(Ordering::SeqCst), 0);
    assert_eq!(fx.backend.rollbacks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancel_mutates_nothing_and_reports_cancelled() {
    let mut fx = fixture();
    let token = csrf::issue(&mut fx.session);

    let response = fx
        .workflow
        .execute(
            &fx.session_id,
            &mut fx.session,
            &request(&["1"], false, true, Some(token.as_str())),
        )
        .await
        .unwrap();

    let ActionResponse::Redirect(url) = response else {
        panic!("expected redirect, got {response:?}");
    };
    let (outcome, detail) = outcome_of(&url);
    assert_eq!(outcome, "cancelled");
    assert_eq!(detail, None);
    assert_eq!(fx.node.len(), 3);
    assert_eq!(fx.backend.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn confirmed_delete_succeeds_and_redelete_fails_gracefully() {
    let mut fx = fixture();
    let token = csrf::issue(&mut fx.session);
    let req = request(&["123"], true, false, Some(token.as_str()));

    let response = fx
        .workflow
        .execute(&fx.session_id, &mut fx.session, &req)
        .await
        .unwrap();
    let ActionResponse::Redirect(url) = response else {
        panic!("expected redirect, got {response:?}");
    };
    assert!(url.starts_with("/members/feedback?action=delete"));
    assert_eq!(outcome_of(&url).0, "success");
    assert_eq!(fx.node.len(), 2);
    assert_eq!(fx.backend.commits.load(Ordering::SeqCst), 1);
    assert_eq!(fx.node.cache_generation(), 1);

    // The record is gone; trying again fails with a redirect, not a crash
    let response = fx
        .workflow
        .execute(&fx.session_id, &mut fx.session, &req)
        .await
        .unwrap();
    let ActionResponse::Redirect(url) = response else {
        panic!("expected redirect, got {response:?}");
    };
    let (outcome, detail) = outcome_of(&url);
    assert_eq!(outcome, "failed");
    assert!(detail.unwrap().contains("123"));
    assert_eq!(fx.backend.rollbacks.load(Ordering::SeqCst), 1);
    assert_eq!(fx.node.len(), 2);
}

#[tokio::test]
async fn attribute_veto_blocks_persistence_with_formatted_detail() {
    let node = Arc::new(
        MemoryNode::builder("members")
            .attribute(FieldAttribute::new("name"))
            .attribute(VetoAttribute)
            .build(),
    );
    node.insert(Record::new().with("id", "1")).unwrap();
    let mut fx = fixture_with(node, Arc::new(steward::workflow::AllowAll));
    let token = csrf::issue(&mut fx.session);

    let response = fx
        .workflow
        .execute(
            &fx.session_id,
            &mut fx.session,
            &request(&["1"], true, false, Some(token.as_str())),
        )
        .await
        .unwrap();

    let ActionResponse::Redirect(url) = response else {
        panic!("expected redirect, got {response:?}");
    };
    let (outcome, detail) = outcome_of(&url);
    assert_eq!(outcome, "failed");
    assert_eq!(
        detail.unwrap(),
        veto_detail(&VetoAttribute, "open invoices must be settled first")
    );

    // Zero persistence calls, transaction rolled back
    assert_eq!(fx.node.len(), 1);
    assert_eq!(fx.backend.commits.load(Ordering::SeqCst), 0);
    assert_eq!(fx.backend.rollbacks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn batch_lock_contention_blocks_and_releases_partial_leases() {
    let mut fx = fixture();
    let token = csrf::issue(&mut fx.session);

    // Another session already holds record "2"
    let other = steward::session::SessionId::generate();
    fx.locks
        .acquire("2", "members", LockMode::Exclusive, &other)
        .await
        .unwrap();

    let response = fx
        .workflow
        .execute(
            &fx.session_id,
            &mut fx.session,
            &request(&["1", "2"], true, false, Some(token.as_str())),
        )
        .await
        .unwrap();

    assert!(matches!(response, ActionResponse::Locked(_)));
    assert_eq!(fx.node.len(), 3);
    assert_eq!(fx.backend.commits.load(Ordering::SeqCst), 0);

    // The lease taken on "1" during the failed pass was released again
    fx.locks
        .acquire("1", "members", LockMode::Exclusive, &other)
        .await
        .expect("lease on record 1 should have been released");
}

#[tokio::test]
async fn first_visit_renders_confirmation_with_fresh_token() {
    let mut fx = fixture();

    let mut req = request(&["1"], false, false, None);
    req.filter = Some("status=active".to_string()); // stale filter from a prior action

    let response = fx
        .workflow
        .execute(&fx.session_id, &mut fx.session, &req)
        .await
        .unwrap();

    let ActionResponse::Confirmation { page, context } = response else {
        panic!("expected confirmation, got {response:?}");
    };
    assert!(page.body.contains('1'));
    assert_eq!(context.selector.ids(), &["1".to_string()]);

    // The issued token is the session's active one and validates
    let token = context.csrf_token.expect("token issued on first visit");
    assert!(csrf::validate(&fx.session, token.as_str()));

    // Nothing was deleted and nothing committed
    assert_eq!(fx.node.len(), 3);
    assert_eq!(fx.backend.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn confirm_then_delete_using_rendered_token_succeeds() {
    let mut fx = fixture();

    let first = fx
        .workflow
        .execute(
            &fx.session_id,
            &mut fx.session,
            &request(&["1"], false, false, None),
        )
        .await
        .unwrap();
    let ActionResponse::Confirmation { context, .. } = first else {
        panic!("expected confirmation");
    };
    let token = context.csrf_token.unwrap();

    let second = fx
        .workflow
        .execute(
            &fx.session_id,
            &mut fx.session,
            &request(&["1"], true, false, Some(token.as_str())),
        )
        .await
        .unwrap();
    let ActionResponse::Redirect(url) = second else {
        panic!("expected redirect");
    };
    assert_eq!(outcome_of(&url).0, "success");
    assert_eq!(fx.node.len(), 2);
}

#[tokio::test]
async fn session_store_path_deletes_scratch_rows_only() {
    let mut fx = fixture();
    fx.session
        .push_frame(StackFrame::new("edit").with_var(STORE_VAR, STORE_SESSION));
    fx.session
        .put_scratch_row("members", Record::new().with("id", "1"));
    let token = csrf::issue(&mut fx.session);

    let response = fx
        .workflow
        .execute(
            &fx.session_id,
            &mut fx.session,
            &request(&["1"], true, false, Some(token.as_str())),
        )
        .await
        .unwrap();

    let ActionResponse::Redirect(url) = response else {
        panic!("expected redirect");
    };
    assert_eq!(outcome_of(&url).0, "success");
    assert!(fx.session.scratch_rows("members").is_empty());
    // The database rows were never touched
    assert_eq!(fx.node.len(), 3);
    assert_eq!(fx.backend.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn session_store_miss_reports_failure() {
    let mut fx = fixture();
    fx.session
        .push_frame(StackFrame::new("edit").with_var(STORE_VAR, STORE_SESSION));
    let token = csrf::issue(&mut fx.session);

    let response = fx
        .workflow
        .execute(
            &fx.session_id,
            &mut fx.session,
            &request(&["99"], true, false, Some(token.as_str())),
        )
        .await
        .unwrap();

    let ActionResponse::Redirect(url) = response else {
        panic!("expected redirect");
    };
    let (outcome, detail) = outcome_of(&url);
    assert_eq!(outcome, "failed");
    assert_eq!(detail.unwrap(), "session store delete failed");
}

#[tokio::test]
async fn csrf_can_be_disabled_by_configuration() {
    let node = seeded_node();
    let backend = Arc::new(AutoCommit);
    let config = StewardConfig {
        security: steward::config::SecuritySettings {
            csrf_enabled: false,
            ..Default::default()
        },
        ..StewardConfig::default()
    };
    let workflow = DeleteWorkflow::new(
        node.clone(),
        Arc::new(steward::workflow::AllowAll),
        Arc::new(InMemoryLockManager::new()),
        backend,
    )
    .with_config(&config);

    let session_id = steward::session::SessionId::generate();
    let mut session = steward::session::SessionData::new();
    let response = workflow
        .execute(&session_id, &mut session, &request(&["1"], true, false, None))
        .await
        .unwrap();

    let ActionResponse::Redirect(url) = response else {
        panic!("expected redirect");
    };
    assert_eq!(outcome_of(&url).0, "success");
    assert_eq!(node.len(), 2);
}

#[tokio::test]
async fn global_lock_toggle_overrides_node_locking() {
    let node = seeded_node();
    let locks = Arc::new(InMemoryLockManager::new());
    let other = steward::session::SessionId::generate();
    locks
        .acquire("1", "members", LockMode::Exclusive, &other)
        .await
        .unwrap();

    let config = StewardConfig {
        locking: steward::config::LockSettings {
            enabled: false,
            ..Default::default()
        },
        ..StewardConfig::default()
    };
    let workflow = DeleteWorkflow::new(
        node.clone(),
        Arc::new(steward::workflow::AllowAll),
        locks,
        Arc::new(AutoCommit),
    )
    .with_config(&config);

    let session_id = steward::session::SessionId::generate();
    let mut session = steward::session::SessionData::new();
    let token = csrf::issue(&mut session);
    let response = workflow
        .execute(
            &session_id,
            &mut session,
            &request(&["1"], true, false, Some(token.as_str())),
        )
        .await
        .unwrap();

    // Locking disabled globally: the foreign lease is never consulted
    let ActionResponse::Redirect(url) = response else {
        panic!("expected redirect");
    };
    assert_eq!(outcome_of(&url).0, "success");
}

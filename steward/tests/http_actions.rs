//! HTTP-level integration tests for the ready-made handlers
//!
//! Drives the mounted router end-to-end: session cookie issuance, the
//! confirm-then-delete round trip, and the CSV export download.

use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use http::{Request, StatusCode};
use steward::prelude::*;
use steward::workflow::CSRF_TOKEN_HEADER;
use tower::ServiceExt;

fn app() -> Router {
    let state = StewardState::new(StewardConfig::default());
    let node = MemoryNode::builder("members")
        .attribute(FieldAttribute::new("name").with_label("Full name"))
        .attribute(ListAttribute::new(
            "status",
            [("a", "Active"), ("i", "Inactive")],
        ))
        .locking(LockMode::Exclusive)
        .build();
    for (id, name, status) in [("1", "Ada", "a"), ("2", "Grace", "i")] {
        node.insert(
            Record::new()
                .with("id", id)
                .with("name", name)
                .with("status", status),
        )
        .unwrap();
    }
    state.register_node(Arc::new(node));
    steward::handlers::router(state)
}

fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn first_visit_then_confirm_deletes_the_record() {
    let app = app();

    // First visit: confirmation page, fresh session cookie, CSRF token
    let response = app
        .clone()
        .oneshot(form_post("/members/delete", "selector=1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .expect("new session sets a cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let token = response
        .headers()
        .get(CSRF_TOKEN_HEADER)
        .expect("confirmation page carries a token")
        .to_str()
        .unwrap()
        .to_string();
    let page = body_text(response).await;
    assert!(page.contains("Confirm delete"));

    // Confirm with the rendered token: redirect with a success outcome
    let response = app
        .clone()
        .oneshot(form_post(
            "/members/delete",
            &format!("selector=1&confirm=1&csrf_token={token}"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers().get(LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("/members/feedback?action=delete"));
    assert!(location.contains("outcome=success"));

    // The record is gone from subsequent exports
    let response = app
        .oneshot(Request::get("/members/export").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let csv = body_text(response).await;
    assert!(!csv.contains("Ada"));
    assert!(csv.contains("Grace"));
}

#[tokio::test]
async fn confirm_with_forged_token_is_forbidden() {
    let app = app();

    let response = app
        .clone()
        .oneshot(form_post("/members/delete", "selector=1", None))
        .await
        .unwrap();
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(form_post(
            "/members/delete",
            "selector=1&confirm=1&csrf_token=forged",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_selector_is_a_bad_request() {
    let app = app();
    let response = app
        .oneshot(form_post("/members/delete", "confirm=1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_node_is_not_found() {
    let app = app();
    let response = app
        .oneshot(form_post("/ghosts/delete", "selector=1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_downloads_decoded_csv() {
    let app = app();
    let response = app
        .oneshot(Request::get("/members/export").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.headers().get(CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"export.csv\""
    );

    let csv = body_text(response).await;
    let mut lines = csv.lines();
    assert_eq!(lines.next().unwrap(), "\"Full name\";\"status\"");
    // List attribute decodes stored keys to display text
    assert!(csv.contains("\"Active\""));
    assert!(csv.contains("\"Inactive\""));
}

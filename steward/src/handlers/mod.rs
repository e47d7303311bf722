//! Ready-made action handlers
//!
//! Axum handlers wiring HTTP requests to the workflow and exporter, plus
//! a [`router`] that mounts them behind the session layer:
//!
//! - `POST /{node}/delete` drives the confirmation/delete flow
//! - `GET /{node}/export` downloads the node's record set as CSV

use crate::error::StewardError;
use crate::export::{CsvExporter, OutputParams};
use crate::extractors::CurrentSession;
use crate::middleware::SessionLayer;
use crate::state::StewardState;
use crate::workflow::ActionRequest;
use axum::extract::{Path, RawForm, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use http::header;

/// Build a router exposing the admin actions for every registered node
#[must_use]
pub fn router(state: StewardState) -> Router {
    Router::new()
        .route("/{node}/delete", post(delete_action))
        .route("/{node}/export", get(export_records))
        .layer(SessionLayer::new(&state))
        .with_state(state)
}

/// Delete action: first visit renders the confirmation, `confirm`/`cancel`
/// complete the flow
///
/// # Errors
///
/// `404` for unknown nodes, `400` for requests without a selector, `500`
/// when a collaborator fails.
pub async fn delete_action(
    State(state): State<StewardState>,
    Path(node_name): Path<String>,
    session: CurrentSession,
    RawForm(body): RawForm,
) -> Result<Response, StewardError> {
    let node = state
        .node(&node_name)
        .ok_or_else(|| StewardError::UnknownNode(node_name.clone()))?;

    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(&body).into_owned().collect();
    let request = ActionRequest::from_pairs(&pairs, &state.config().forms)?;

    let CurrentSession { id, mut data } = session;
    let workflow = state.delete_workflow(node);
    let action_response = workflow.execute(&id, &mut data, &request).await?;

    // Hand the (possibly mutated) session back to the middleware to save
    let mut response = action_response.into_response();
    response.extensions_mut().insert(data);
    Ok(response)
}

/// Export action: the node's record set as a CSV download
///
/// # Errors
///
/// `404` for unknown nodes, `500` when the node's store fails.
pub async fn export_records(
    State(state): State<StewardState>,
    Path(node_name): Path<String>,
) -> Result<Response, StewardError> {
    let node = state
        .node(&node_name)
        .ok_or_else(|| StewardError::UnknownNode(node_name.clone()))?;

    let records = node.select_all().await?;
    let exporter = CsvExporter::from_settings(&state.config().export);
    let output = exporter.render(
        node.as_ref(),
        &records,
        &[],
        &OutputParams::default(),
        true,
        true,
    );

    tracing::debug!(node = %node_name, records = records.len(), "rendered CSV export");
    Ok((
        [
            (header::CONTENT_TYPE, output.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", output.filename),
            ),
        ],
        output.bytes,
    )
        .into_response())
}

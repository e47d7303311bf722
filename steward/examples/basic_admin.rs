//! Basic steward admin server example
//!
//! Demonstrates:
//! - Configuration loading
//! - Node registration with attributes and locking
//! - The ready-made delete and export routes
//!
//! Run with: `cargo run --example basic_admin`
//!
//! Then try:
//! - `curl -d 'selector=1' http://127.0.0.1:3000/members/delete` (confirmation)
//! - `curl http://127.0.0.1:3000/members/export` (CSV download)

use std::sync::Arc;

use steward::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "steward=debug,info".into()),
        )
        .init();

    let config = StewardConfig::load_for_service("basic-admin")?;
    tracing::info!(
        csrf_enabled = config.security.csrf_enabled,
        locking_enabled = config.locking.enabled,
        "Configuration loaded"
    );

    let state = StewardState::new(config);

    // Describe the entity: attributes, a detail relation, a locking policy
    let orders = Arc::new(RelationAttribute::new("orders", DeleteRule::Cascade));
    let node = MemoryNode::builder("members")
        .attribute(FieldAttribute::new("name").with_label("Full name"))
        .attribute(ListAttribute::new(
            "status",
            [("a", "Active"), ("i", "Inactive")],
        ))
        .attribute_arc(orders)
        .locking(LockMode::Exclusive)
        .build();

    for (id, name, status) in [("1", "Ada", "a"), ("2", "Grace", "a"), ("3", "Edsger", "i")] {
        node.insert(
            Record::new()
                .with("id", id)
                .with("name", name)
                .with("status", status),
        )?;
    }
    state.register_node(Arc::new(node));

    let app = steward::handlers::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("Admin server listening on http://127.0.0.1:3000");
    axum::serve(listener, app).await?;

    Ok(())
}

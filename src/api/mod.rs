pub mod error;
pub mod handlers;
pub mod state;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};

use crate::engine::PayoutEngine;
use crate::notify::{LogSink, NotificationSink};
use crate::scheduler::Coordinator;
use crate::store::Store;
use crate::store::sqlite::SqliteStore;

use state::AppState;

pub async fn serve(host: &str, port: u16, data_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let db_path = data_dir.join("payout-flow.db");
    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("opening database at {}", db_path.display()))?,
    );
    let notifier: Arc<dyn NotificationSink> = Arc::new(LogSink);
    let engine = Arc::new(PayoutEngine::new(store.clone(), notifier.clone()));

    // Scheduled daily trigger, running alongside the API. Manual triggers
    // through the API race it harmlessly; postings are per-day idempotent.
    let coordinator = Coordinator::new(store.clone(), engine.clone());
    let last_summary = coordinator.last_summary();
    tokio::spawn(async move {
        if let Err(e) = coordinator.run_forever().await {
            eprintln!("[scheduler] stopped: {:#}", e);
        }
    });

    let app_state = AppState::new(store, engine, notifier, last_summary);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        // Health
        .route("/health", get(|| async { "ok" }))
        // Users
        .route("/api/users", post(handlers::users::register))
        .route("/api/users/{id}", get(handlers::users::get_one))
        .route("/api/users/{id}/team", get(handlers::users::team))
        .route("/api/users/{id}/ledger", get(handlers::users::ledger))
        .route("/api/users/{id}/kyc", put(handlers::users::set_kyc))
        .route("/api/users/{id}/blocked", put(handlers::users::set_blocked))
        // Deposits
        .route(
            "/api/deposits",
            get(handlers::deposits::list_pending).post(handlers::deposits::create),
        )
        .route("/api/deposits/{id}/approve", post(handlers::deposits::approve))
        .route("/api/deposits/{id}/reject", post(handlers::deposits::reject))
        // Withdrawals
        .route(
            "/api/withdrawals",
            get(handlers::withdrawals::list_pending).post(handlers::withdrawals::request),
        )
        .route(
            "/api/withdrawals/{id}/approve",
            post(handlers::withdrawals::approve),
        )
        .route(
            "/api/withdrawals/{id}/reject",
            post(handlers::withdrawals::reject),
        )
        // Runs
        .route("/api/run", post(handlers::runs::trigger))
        .route("/api/run/ranks", post(handlers::runs::trigger_ranks))
        .route("/api/run/summary", get(handlers::runs::last_summary))
        // Config
        .route(
            "/api/config",
            get(handlers::config::get_config).put(handlers::config::put_config),
        )
        .layer(cors)
        .with_state(app_state);

    let addr = format!("{host}:{port}");
    println!("payout-flow API server listening on {addr}");
    println!("  Health:  GET  http://{addr}/health");
    println!("  Run:     POST http://{addr}/api/run");
    println!("  Summary: GET  http://{addr}/api/run/summary");
    println!("  Config:  GET  http://{addr}/api/config");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    axum::serve(listener, app).await.context("running server")?;

    Ok(())
}

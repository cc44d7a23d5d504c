//! Authorization server
//!
//! Public endpoints:
//! - POST /accessrequest  (application/x-www-form-urlencoded, field `request`
//!   carrying the JSON-serialized access request) -> JSON credential on
//!   acceptance, JSON `{"error": …}` with status 400 otherwise
//! - GET  /healthz
//!
//! Requests are verified statelessly and concurrently; nothing is shared
//! between them except the read-only authorizer. Every submission is
//! appended to a JSONL log, best-effort: a failed write is logged and the
//! response is unaffected.
//!
//! Flags (with environment fallbacks):
//!   --addr HOST:PORT   AUTHPROOF_ADDR    default 0.0.0.0:15316
//!   --store DIR        AUTHPROOF_STORE   default .
//!   --root AGENT       AUTHPROOF_ROOT    default #root (acceptance issuer)
//!   --ca AGENT         AUTHPROOF_CA      default #ca (trusted root set)
//!   --log FILE         AUTHPROOF_SUBMISSION_LOG  default submissions.jsonl

#![forbid(unsafe_code)]

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use authproof::logic::Agent;
use authproof::{api, wire, Authorizer, DirStore};
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

#[derive(Clone)]
struct AppState {
    authorizer: Arc<Authorizer>,
    submission_log: Arc<PathBuf>,
}

#[derive(Deserialize)]
struct AccessForm {
    request: String,
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn access_request(
    State(state): State<AppState>,
    Form(form): Form<AccessForm>,
) -> (StatusCode, Json<serde_json::Value>) {
    let req = match wire::request_from_json(&form.request) {
        Ok(req) => req,
        Err(err) => {
            warn!(%err, "malformed access request");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("malformed request: {err}")})),
            );
        }
    };
    let requester = req.signature.signator.0.clone();
    record_submission(&state, &requester, &form.request).await;

    match state.authorizer.verify_request(&req) {
        Ok(cred) => {
            info!(requester = %requester, statement = %cred.statement, "request accepted");
            let body = serde_json::from_str(&wire::credential_to_json(&cred))
                .unwrap_or_else(|_| json!({}));
            (StatusCode::OK, Json(body))
        }
        Err(err) => {
            info!(requester = %requester, %err, "request rejected");
            (StatusCode::BAD_REQUEST, Json(json!({"error": err.to_string()})))
        }
    }
}

/// Append the submission to the JSONL log. At-least-once, best-effort:
/// failures are logged, never surfaced to the requester.
async fn record_submission(state: &AppState, requester: &str, raw: &str) {
    let line = json!({"requester": requester, "request": raw}).to_string();
    let path = Arc::clone(&state.submission_log);
    let outcome = tokio::task::spawn_blocking(move || {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&*path)?;
        writeln!(file, "{line}")
    })
    .await;
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(%err, "failed to record submission"),
        Err(err) => warn!(%err, "submission recorder task failed"),
    }
}

fn agent_arg(name: &str) -> Agent {
    if name.starts_with('#') {
        Agent(name.to_string())
    } else {
        Agent(format!("#{name}"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| "authd=info,tower_http=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let addr: SocketAddr = parse_flag(&args, "--addr")
        .or_else(|| env::var("AUTHPROOF_ADDR").ok())
        .unwrap_or_else(|| "0.0.0.0:15316".into())
        .parse()
        .context("parse listen address")?;
    let store_dir = parse_flag(&args, "--store")
        .or_else(|| env::var("AUTHPROOF_STORE").ok())
        .unwrap_or_else(|| ".".into());
    let root = agent_arg(
        &parse_flag(&args, "--root")
            .or_else(|| env::var("AUTHPROOF_ROOT").ok())
            .unwrap_or_else(|| "#root".into()),
    );
    let ca = agent_arg(
        &parse_flag(&args, "--ca")
            .or_else(|| env::var("AUTHPROOF_CA").ok())
            .unwrap_or_else(|| "#ca".into()),
    );
    let submission_log = PathBuf::from(
        parse_flag(&args, "--log")
            .or_else(|| env::var("AUTHPROOF_SUBMISSION_LOG").ok())
            .unwrap_or_else(|| "submissions.jsonl".into()),
    );

    let store = DirStore::new(&store_dir);
    let authorizer = api::authorizer_from_store(&store, &root, &[ca.clone()])
        .context("load authorizer identity from store")?;
    info!(
        issuer = %root.0,
        trusted_root = %ca.0,
        store = %store_dir,
        "authorizer ready"
    );

    let app = Router::new()
        .route("/accessrequest", post(access_request))
        .route("/healthz", get(healthz))
        .with_state(AppState {
            authorizer: Arc::new(authorizer),
            submission_log: Arc::new(submission_log),
        })
        .layer(TraceLayer::new_for_http());

    info!(%addr, "authd listening");
    let listener = TcpListener::bind(addr).await.context("bind listener")?;
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}

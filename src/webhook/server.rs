// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP(S) server implementing the cert-manager external webhook API.
//!
//! # Routes
//!
//! | Method | Path                                | Purpose                    |
//! |--------|-------------------------------------|----------------------------|
//! | POST   | `/apis/{group}/{version}/{solver}`  | Present / CleanUp          |
//! | GET    | `/apis/{group}/{version}`           | API discovery              |
//! | GET    | `/healthz`, `/readyz`               | Probes                     |
//! | GET    | `/metrics`                          | Prometheus metrics         |
//!
//! Every challenge runs under a child of the process shutdown token and is
//! cancelled when its deadline passes or the process shuts down.

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::ServerConfig;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

use crate::challenge::{ChallengeAction, ChallengePayload, ChallengeResponse};
use crate::constants::{
    CHALLENGE_DEADLINE_SECS, CHALLENGE_PAYLOAD_KIND, HEALTHZ_PATH, METRICS_PATH, READYZ_PATH,
    WEBHOOK_API_VERSION,
};
use crate::metrics;
use crate::solver::ChallengeSolver;

/// Shared state of the webhook router.
#[derive(Clone)]
pub struct WebhookState {
    /// API group cert-manager addresses the webhook under
    group_name: Arc<str>,
    /// Solvers by name
    solvers: Arc<HashMap<&'static str, Arc<dyn ChallengeSolver>>>,
    /// Cancelled on process shutdown
    shutdown: CancellationToken,
    /// Upper bound for one Present/CleanUp call
    challenge_deadline: Duration,
}

impl fmt::Debug for WebhookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut solvers: Vec<&str> = self.solvers.keys().copied().collect();
        solvers.sort_unstable();
        f.debug_struct("WebhookState")
            .field("group_name", &self.group_name)
            .field("solvers", &solvers)
            .field("challenge_deadline", &self.challenge_deadline)
            .finish_non_exhaustive()
    }
}

impl WebhookState {
    #[must_use]
    pub fn new(
        group_name: &str,
        solvers: Vec<Arc<dyn ChallengeSolver>>,
        shutdown: CancellationToken,
    ) -> Self {
        let solvers = solvers
            .into_iter()
            .map(|solver| (solver.name(), solver))
            .collect();

        Self {
            group_name: Arc::from(group_name),
            solvers: Arc::new(solvers),
            shutdown,
            challenge_deadline: Duration::from_secs(CHALLENGE_DEADLINE_SECS),
        }
    }

    /// Override the per-challenge deadline.
    #[must_use]
    pub fn with_challenge_deadline(mut self, deadline: Duration) -> Self {
        self.challenge_deadline = deadline;
        self
    }

    fn solver(&self, name: &str) -> Option<Arc<dyn ChallengeSolver>> {
        self.solvers.get(name).cloned()
    }

    fn sorted_solver_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.solvers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Build the webhook router.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/apis/{group}/{version}/{solver}", post(solve))
        .route("/apis/{group}/{version}", get(discovery))
        .route(HEALTHZ_PATH, get(health))
        .route(READYZ_PATH, get(health))
        .route(METRICS_PATH, get(metrics_handler))
        .with_state(state)
}

/// Kubernetes-style `Status` error body.
fn status_error(code: StatusCode, reason: &str, message: impl Into<String>) -> Response {
    let body = json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message.into(),
        "reason": reason,
        "code": code.as_u16(),
    });
    (code, Json(body)).into_response()
}

async fn solve(
    State(state): State<WebhookState>,
    Path((group, version, solver_name)): Path<(String, String, String)>,
    body: Bytes,
) -> Response {
    if group.as_str() != &*state.group_name || version != WEBHOOK_API_VERSION {
        return status_error(
            StatusCode::NOT_FOUND,
            "NotFound",
            format!("the server could not find the requested resource: {group}/{version}"),
        );
    }

    let Some(solver) = state.solver(&solver_name) else {
        return status_error(
            StatusCode::NOT_FOUND,
            "NotFound",
            format!("no solver named '{solver_name}' is registered"),
        );
    };

    let payload: ChallengePayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(solver = %solver_name, error = %e, "Rejecting undecodable challenge payload");
            return status_error(
                StatusCode::BAD_REQUEST,
                "BadRequest",
                format!("error decoding {CHALLENGE_PAYLOAD_KIND}: {e}"),
            );
        }
    };

    let Some(request) = payload.request else {
        return status_error(
            StatusCode::BAD_REQUEST,
            "BadRequest",
            format!("{CHALLENGE_PAYLOAD_KIND} has no request"),
        );
    };

    debug!(
        uid = %request.uid,
        action = request.action.as_str(),
        fqdn = %request.resolved_fqdn,
        "Received challenge request"
    );

    let cancel = state.shutdown.child_token();
    // Cancels in-flight calls if the client goes away and the handler is dropped.
    let _guard = cancel.clone().drop_guard();

    let operation = async {
        match request.action {
            ChallengeAction::Present => Some(solver.present(&request, &cancel).await),
            ChallengeAction::CleanUp => Some(solver.clean_up(&request, &cancel).await),
            ChallengeAction::Unknown => None,
        }
    };
    tokio::pin!(operation);

    // On deadline the token is cancelled and the solver is still awaited, so
    // it unwinds through its own error path.
    let outcome = tokio::select! {
        outcome = &mut operation => outcome,
        () = tokio::time::sleep(state.challenge_deadline) => {
            warn!(
                uid = %request.uid,
                fqdn = %request.resolved_fqdn,
                deadline_secs = state.challenge_deadline.as_secs(),
                "Challenge deadline exceeded, cancelling"
            );
            cancel.cancel();
            operation.await
        }
    };

    let response = match outcome {
        Some(Ok(())) => ChallengeResponse::succeeded(&request.uid),
        Some(Err(e)) => ChallengeResponse::from_error(&request.uid, &e),
        None => ChallengeResponse::failed(
            &request.uid,
            "unsupported challenge action, expected Present or CleanUp",
            "UnsupportedAction",
            StatusCode::BAD_REQUEST.as_u16(),
        ),
    };

    Json(ChallengePayload::respond(response)).into_response()
}

async fn discovery(
    State(state): State<WebhookState>,
    Path((group, version)): Path<(String, String)>,
) -> Response {
    if group.as_str() != &*state.group_name || version != WEBHOOK_API_VERSION {
        return status_error(
            StatusCode::NOT_FOUND,
            "NotFound",
            format!("the server could not find the requested resource: {group}/{version}"),
        );
    }

    let resources: Vec<serde_json::Value> = state
        .sorted_solver_names()
        .into_iter()
        .map(|name| {
            json!({
                "name": name,
                "singularName": name,
                "namespaced": false,
                "kind": CHALLENGE_PAYLOAD_KIND,
                "verbs": ["create"],
            })
        })
        .collect();

    Json(json!({
        "kind": "APIResourceList",
        "apiVersion": "v1",
        "groupVersion": format!("{group}/{version}"),
        "resources": resources,
    }))
    .into_response()
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Serve `router` on `listen_address` until `shutdown` is cancelled.
///
/// With `tls` set the listener terminates TLS itself; otherwise it speaks
/// plain HTTP. Either way, open connections are drained before this returns.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the plain HTTP server
/// fails.
pub async fn serve(
    listen_address: SocketAddr,
    tls: Option<Arc<ServerConfig>>,
    router: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(listen_address)
        .await
        .with_context(|| format!("Failed to bind webhook listener on {listen_address}"))?;

    match tls {
        Some(config) => {
            info!(address = %listen_address, "Webhook server listening (HTTPS)");
            serve_tls(listener, TlsAcceptor::from(config), router, shutdown).await;
            Ok(())
        }
        None => {
            warn!(
                address = %listen_address,
                "Webhook server listening without TLS; the Kubernetes API server requires HTTPS"
            );
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
                .context("Webhook server failed")
        }
    }
}

async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
    shutdown: CancellationToken,
) {
    let connections = TaskTracker::new();

    loop {
        let (stream, peer) = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let router = router.clone();
        let shutdown = shutdown.clone();

        connections.spawn(async move {
            let handshake = tokio::select! {
                handshake = acceptor.accept(stream) => handshake,
                () = shutdown.cancelled() => return,
            };
            let tls_stream = match handshake {
                Ok(tls_stream) => tls_stream,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "TLS handshake failed");
                    return;
                }
            };

            let service = hyper::service::service_fn(
                move |request: hyper::Request<hyper::body::Incoming>| {
                    router.clone().oneshot(request)
                },
            );

            let builder = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new());
            let connection = builder.serve_connection(TokioIo::new(tls_stream), service);
            tokio::pin!(connection);

            tokio::select! {
                result = connection.as_mut() => {
                    if let Err(e) = result {
                        debug!(peer = %peer, error = %e, "Connection closed with error");
                    }
                }
                () = shutdown.cancelled() => {
                    connection.as_mut().graceful_shutdown();
                    if let Err(e) = connection.await {
                        debug!(peer = %peer, error = %e, "Connection closed with error");
                    }
                }
            }
        });
    }

    connections.close();
    info!(
        open_connections = connections.len(),
        "Webhook server stopped accepting connections, draining"
    );
    connections.wait().await;
    info!("Webhook server drained");
}

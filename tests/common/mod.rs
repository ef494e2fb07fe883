// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use technitium_webhook::secrets::StaticSecretStore;
use technitium_webhook::solver::{ChallengeSolver, TechnitiumSolver};
use technitium_webhook::technitium::{HttpTransport, TransportSettings};
use technitium_webhook::webhook::{router, WebhookState};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const GROUP_NAME: &str = "acme.example.com";
pub const NAMESPACE: &str = "cert-manager";
pub const SECRET_NAME: &str = "technitium-api";
pub const SECRET_KEY: &str = "token";
pub const API_TOKEN: &str = "integration-token";

/// Build the webhook router with the real HTTP transport and an in-memory
/// secret holding [`API_TOKEN`].
pub fn webhook_router() -> Router {
    let transport = Arc::new(
        HttpTransport::new(&TransportSettings::default()).expect("transport should build"),
    );
    let solver = TechnitiumSolver::new(transport);
    solver
        .initialize(Arc::new(StaticSecretStore::new().with_value(
            NAMESPACE,
            SECRET_NAME,
            SECRET_KEY,
            format!("{API_TOKEN}\n"),
        )))
        .expect("solver should initialize");

    let solvers: Vec<Arc<dyn ChallengeSolver>> = vec![Arc::new(solver)];
    router(WebhookState::new(
        GROUP_NAME,
        solvers,
        CancellationToken::new(),
    ))
}

/// Solver config pointing at `server`.
pub fn solver_config(server: &MockServer) -> Value {
    json!({
        "serverUrl": server.uri(),
        "authTokenSecretRef": { "name": SECRET_NAME, "key": SECRET_KEY }
    })
}

/// A cert-manager `ChallengePayload` for `_acme-challenge.<dns_name>.`.
pub fn challenge_payload(action: &str, dns_name: &str, resolved_zone: &str, config: Value) -> Value {
    json!({
        "apiVersion": "webhook.acme.cert-manager.io/v1alpha1",
        "kind": "ChallengePayload",
        "request": {
            "uid": format!("uid-{action}-{dns_name}"),
            "action": action,
            "type": "dns-01",
            "dnsName": dns_name,
            "key": "challenge-key",
            "resourceNamespace": NAMESPACE,
            "resolvedFQDN": format!("_acme-challenge.{dns_name}."),
            "resolvedZone": resolved_zone,
            "allowAmbientCredentials": false,
            "config": config
        }
    })
}

/// POST a payload to the Technitium solver route and return the decoded body.
pub async fn post_challenge(app: Router, payload: &Value) -> Value {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/apis/{GROUP_NAME}/v1alpha1/technitium"))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request should build");

    let response = app.oneshot(request).await.expect("router should answer");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Answer zone lookups for `zone` with an enabled primary zone.
pub async fn mount_zone(server: &MockServer, zone: &str) {
    Mock::given(method("GET"))
        .and(path("/api/zones/records/get"))
        .and(query_param("domain", zone))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "response": {
                "zone": {
                    "name": zone,
                    "type": "Primary",
                    "internal": false,
                    "disabled": false
                },
                "records": []
            }
        })))
        .mount(server)
        .await;
}

/// Answer every other zone lookup with Technitium's "no such zone" error.
pub async fn mount_no_such_zone_fallback(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/zones/records/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "errorMessage": "No such zone was found"
        })))
        .with_priority(10)
        .mount(server)
        .await;
}

pub fn ok_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "status": "ok", "response": {} }))
}

pub fn error_response(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "status": "error", "errorMessage": message }))
}

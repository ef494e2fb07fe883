// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Router tests for the webhook server, driven in-process.

#[cfg(test)]
mod tests {
    use crate::challenge::{ChallengeAction, ChallengePayload, ChallengeRequest};
    use crate::errors::{Result, SolverError};
    use crate::metrics::{CHALLENGE_DURATION_SECONDS, ERRORS_TOTAL};
    use crate::secrets::{SecretStore, StaticSecretStore};
    use crate::solver::{ChallengeSolver, TechnitiumSolver};
    use crate::technitium::mock_transport::{MockReply, MockTransport};
    use crate::webhook::server::{router, serve, WebhookState};
    use crate::webhook::test_certs::{pem_file, CERT_PEM, KEY_PEM};
    use crate::webhook::tls::load_tls_config;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    const GROUP: &str = "acme.example.com";

    /// Records calls and answers with a fixed outcome.
    #[derive(Debug, Default)]
    struct FakeSolver {
        calls: Mutex<Vec<(ChallengeAction, String)>>,
        failure: Option<SolverError>,
        /// Block until cancelled, then take `unwind` before returning
        hang: bool,
        unwind: Duration,
        finished: AtomicBool,
    }

    impl FakeSolver {
        async fn respond(
            &self,
            action: ChallengeAction,
            request: &ChallengeRequest,
            cancel: &CancellationToken,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((action, request.resolved_fqdn.clone()));
            if self.hang {
                cancel.cancelled().await;
                tokio::time::sleep(self.unwind).await;
                self.finished.store(true, Ordering::SeqCst);
                return Err(SolverError::Cancelled);
            }
            match &self.failure {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ChallengeSolver for FakeSolver {
        fn name(&self) -> &'static str {
            "technitium"
        }

        fn initialize(&self, _secrets: Arc<dyn SecretStore>) -> Result<()> {
            Ok(())
        }

        async fn present(
            &self,
            request: &ChallengeRequest,
            cancel: &CancellationToken,
        ) -> Result<()> {
            self.respond(ChallengeAction::Present, request, cancel).await
        }

        async fn clean_up(
            &self,
            request: &ChallengeRequest,
            cancel: &CancellationToken,
        ) -> Result<()> {
            self.respond(ChallengeAction::CleanUp, request, cancel).await
        }
    }

    fn state_with(solver: Arc<FakeSolver>) -> WebhookState {
        WebhookState::new(
            GROUP,
            vec![solver as Arc<dyn ChallengeSolver>],
            CancellationToken::new(),
        )
    }

    fn payload(action: &str) -> serde_json::Value {
        json!({
            "apiVersion": "webhook.acme.cert-manager.io/v1alpha1",
            "kind": "ChallengePayload",
            "request": {
                "uid": "0b7f6c1e-1234",
                "action": action,
                "type": "dns-01",
                "dnsName": "www.example.com",
                "key": "abc123",
                "resourceNamespace": "cert-manager",
                "resolvedFQDN": "_acme-challenge.www.example.com.",
                "resolvedZone": "example.com.",
                "allowAmbientCredentials": false,
                "config": { "serverUrl": "http://dns:5380" }
            }
        })
    }

    fn post(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_present_success() {
        let solver = Arc::new(FakeSolver::default());
        let app = router(state_with(solver.clone()));

        let response = app
            .oneshot(post(
                "/apis/acme.example.com/v1alpha1/technitium",
                &payload("Present"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ChallengePayload = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(body.kind, "ChallengePayload");
        assert_eq!(body.api_version, "webhook.acme.cert-manager.io/v1alpha1");
        let result = body.response.unwrap();
        assert_eq!(result.uid, "0b7f6c1e-1234");
        assert!(result.success);
        assert!(result.status.is_none());

        let calls = solver.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![(
                ChallengeAction::Present,
                "_acme-challenge.www.example.com.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_clean_up_dispatches_to_solver() {
        let solver = Arc::new(FakeSolver::default());
        let app = router(state_with(solver.clone()));

        let response = app
            .oneshot(post(
                "/apis/acme.example.com/v1alpha1/technitium",
                &payload("CleanUp"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(solver.calls.lock().unwrap()[0].0, ChallengeAction::CleanUp);
    }

    #[tokio::test]
    async fn test_solver_error_is_reported_in_response() {
        let solver = Arc::new(FakeSolver {
            failure: Some(SolverError::ZoneNotFound {
                fqdn: "_acme-challenge.www.example.com.".to_string(),
            }),
            ..FakeSolver::default()
        });
        let app = router(state_with(solver));

        let response = app
            .oneshot(post(
                "/apis/acme.example.com/v1alpha1/technitium",
                &payload("Present"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["response"]["success"], json!(false));
        assert_eq!(body["response"]["status"]["status"], json!("Failure"));
        assert_eq!(body["response"]["status"]["reason"], json!("ZoneNotFound"));
        assert_eq!(body["response"]["status"]["code"], json!(404));
        assert_eq!(
            body["response"]["status"]["message"],
            json!("no authoritative zone found for domain _acme-challenge.www.example.com.")
        );
    }

    #[tokio::test]
    async fn test_unknown_action_is_rejected_without_calling_solver() {
        let solver = Arc::new(FakeSolver::default());
        let app = router(state_with(solver.clone()));

        let response = app
            .oneshot(post(
                "/apis/acme.example.com/v1alpha1/technitium",
                &payload("Verify"),
            ))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["response"]["success"], json!(false));
        assert_eq!(body["response"]["status"]["reason"], json!("UnsupportedAction"));
        assert_eq!(body["response"]["status"]["code"], json!(400));
        assert!(solver.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_solver_is_not_found() {
        let app = router(state_with(Arc::new(FakeSolver::default())));

        let response = app
            .oneshot(post(
                "/apis/acme.example.com/v1alpha1/route53",
                &payload("Present"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_group_is_not_found() {
        let app = router(state_with(Arc::new(FakeSolver::default())));

        let response = app
            .oneshot(post(
                "/apis/other.example.com/v1alpha1/technitium",
                &payload("Present"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unsupported_version_is_not_found() {
        let app = router(state_with(Arc::new(FakeSolver::default())));

        let response = app
            .oneshot(post(
                "/apis/acme.example.com/v1beta1/technitium",
                &payload("Present"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_bad_request() {
        let app = router(state_with(Arc::new(FakeSolver::default())));

        let request = Request::builder()
            .method("POST")
            .uri("/apis/acme.example.com/v1alpha1/technitium")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["kind"], json!("Status"));
        assert_eq!(body["reason"], json!("BadRequest"));
    }

    #[tokio::test]
    async fn test_payload_without_request_is_bad_request() {
        let app = router(state_with(Arc::new(FakeSolver::default())));

        let response = app
            .oneshot(post(
                "/apis/acme.example.com/v1alpha1/technitium",
                &json!({ "apiVersion": "webhook.acme.cert-manager.io/v1alpha1", "kind": "ChallengePayload" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_deadline_cancels_challenge() {
        let solver = Arc::new(FakeSolver {
            hang: true,
            ..FakeSolver::default()
        });
        let state = state_with(solver).with_challenge_deadline(Duration::from_millis(50));
        let app = router(state);

        let response = app
            .oneshot(post(
                "/apis/acme.example.com/v1alpha1/technitium",
                &payload("Present"),
            ))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["response"]["success"], json!(false));
        assert_eq!(body["response"]["status"]["reason"], json!("Cancelled"));
    }

    #[tokio::test]
    async fn test_deadline_lets_solver_finish_through_error_path() {
        let transport = Arc::new(MockTransport::new().with_zone_reply(
            "_acme-challenge.deadline.example.com",
            MockReply::Hang,
        ));
        let solver = TechnitiumSolver::new(transport.clone());
        solver
            .initialize(Arc::new(StaticSecretStore::new().with_value(
                "cert-manager",
                "technitium-api",
                "token",
                "api-token",
            )))
            .unwrap();
        let state = WebhookState::new(
            GROUP,
            vec![Arc::new(solver) as Arc<dyn ChallengeSolver>],
            CancellationToken::new(),
        )
        .with_challenge_deadline(Duration::from_millis(50));

        let errors = ERRORS_TOTAL.with_label_values(&["Present", "Cancelled"]);
        let durations = CHALLENGE_DURATION_SECONDS.with_label_values(&["Present"]);
        let errors_before = errors.get();
        let durations_before = durations.get_sample_count();

        let body = json!({
            "apiVersion": "webhook.acme.cert-manager.io/v1alpha1",
            "kind": "ChallengePayload",
            "request": {
                "uid": "deadline-uid",
                "action": "Present",
                "key": "abc123",
                "resourceNamespace": "cert-manager",
                "resolvedFQDN": "_acme-challenge.deadline.example.com.",
                "resolvedZone": "",
                "config": {
                    "serverUrl": "http://dns:5380",
                    "authTokenSecretRef": { "name": "technitium-api", "key": "token" }
                }
            }
        });
        let response = router(state)
            .oneshot(post("/apis/acme.example.com/v1alpha1/technitium", &body))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["response"]["success"], json!(false));
        assert_eq!(body["response"]["status"]["reason"], json!("Cancelled"));
        assert_eq!(body["response"]["status"]["code"], json!(504));
        assert_eq!(
            transport.looked_up_domains(),
            vec!["_acme-challenge.deadline.example.com".to_string()]
        );

        // The solver returned its error instead of being dropped mid-flight.
        assert!(errors.get() - errors_before >= 1.0);
        assert!(durations.get_sample_count() > durations_before);
    }

    #[tokio::test]
    async fn test_tls_server_drains_in_flight_request_on_shutdown() {
        let address = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let cert = pem_file(CERT_PEM);
        let key = pem_file(KEY_PEM);
        let tls = load_tls_config(cert.path(), key.path()).unwrap();

        let solver = Arc::new(FakeSolver {
            hang: true,
            unwind: Duration::from_millis(200),
            ..FakeSolver::default()
        });
        let shutdown = CancellationToken::new();
        let state = WebhookState::new(
            GROUP,
            vec![solver.clone() as Arc<dyn ChallengeSolver>],
            shutdown.clone(),
        );
        let server = tokio::spawn(serve(address, Some(tls), router(state), shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .unwrap();
        let request = client
            .post(format!(
                "https://{address}/apis/acme.example.com/v1alpha1/technitium"
            ))
            .header("content-type", "application/json")
            .body(payload("Present").to_string())
            .send();
        let in_flight = tokio::spawn(async move {
            let response = request.await.unwrap();
            response.json::<serde_json::Value>().await.unwrap()
        });

        for _ in 0..100 {
            if !solver.calls.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(solver.calls.lock().unwrap().len(), 1);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();

        assert!(
            solver.finished.load(Ordering::SeqCst),
            "serve returned before the in-flight request completed"
        );
        let body = in_flight.await.unwrap();
        assert_eq!(body["response"]["status"]["reason"], json!("Cancelled"));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_challenge() {
        let solver = Arc::new(FakeSolver {
            hang: true,
            ..FakeSolver::default()
        });
        let shutdown = CancellationToken::new();
        let app = router(WebhookState::new(
            GROUP,
            vec![solver as Arc<dyn ChallengeSolver>],
            shutdown.clone(),
        ));

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let response = app
            .oneshot(post(
                "/apis/acme.example.com/v1alpha1/technitium",
                &payload("Present"),
            ))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["response"]["status"]["reason"], json!("Cancelled"));
    }

    #[tokio::test]
    async fn test_discovery_lists_solver() {
        let app = router(state_with(Arc::new(FakeSolver::default())));

        let response = app
            .oneshot(get("/apis/acme.example.com/v1alpha1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["kind"], json!("APIResourceList"));
        assert_eq!(body["groupVersion"], json!("acme.example.com/v1alpha1"));
        assert_eq!(body["resources"][0]["name"], json!("technitium"));
        assert_eq!(body["resources"][0]["kind"], json!("ChallengePayload"));
        assert_eq!(body["resources"][0]["verbs"], json!(["create"]));
    }

    #[tokio::test]
    async fn test_discovery_wrong_group() {
        let app = router(state_with(Arc::new(FakeSolver::default())));

        let response = app
            .oneshot(get("/apis/other.example.com/v1alpha1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        for path in ["/healthz", "/readyz"] {
            let app = router(state_with(Arc::new(FakeSolver::default())));
            let response = app.oneshot(get(path)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        crate::metrics::record_zone_lookup("hit");
        let app = router(state_with(Arc::new(FakeSolver::default())));

        let response = app.oneshot(get("/metrics")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("technitium_webhook_zone_lookups_total"));
    }
}

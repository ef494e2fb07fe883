// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Scripted [`DnsApiTransport`] double for unit tests.

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::transport::DnsApiTransport;
use crate::errors::TransportError;

/// What the double answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this body
    Body(String),
    /// Fail with this transport error
    Fail(TransportError),
    /// Block until the request is cancelled
    Hang,
}

/// One request seen by the double.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    /// Query pairs for GET, form pairs for POST
    pub params: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Zone lookups are answered per `domain`; POSTs per path, in order.
#[derive(Debug, Default)]
pub struct MockTransport {
    zone_replies: Mutex<HashMap<String, MockReply>>,
    post_replies: Mutex<HashMap<String, VecDeque<MockReply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer zone lookups for `domain` with `reply`.
    pub fn with_zone_reply(self, domain: &str, reply: MockReply) -> Self {
        self.zone_replies
            .lock()
            .unwrap()
            .insert(domain.to_string(), reply);
        self
    }

    /// Make `zone` an enabled primary zone.
    pub fn with_zone(self, zone: &str) -> Self {
        self.with_zone_reply(zone, MockReply::Body(zone_body(zone, false)))
    }

    /// Make `zone` a disabled zone.
    pub fn with_disabled_zone(self, zone: &str) -> Self {
        self.with_zone_reply(zone, MockReply::Body(zone_body(zone, true)))
    }

    /// Queue a reply for POSTs to `path`. The last queued reply repeats.
    pub fn with_post_reply(self, path: &str, reply: MockReply) -> Self {
        self.post_replies
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// `domain` parameters of every zone lookup, in call order.
    pub fn looked_up_domains(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|call| call.method == "GET")
            .filter_map(|call| call.param("domain").map(str::to_string))
            .collect()
    }

    pub fn posts(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == "POST")
            .collect()
    }

    async fn answer(
        reply: MockReply,
        endpoint: &Url,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled {
                endpoint: endpoint.path().to_string(),
            });
        }
        match reply {
            MockReply::Body(body) => Ok(body.into_bytes()),
            MockReply::Fail(e) => Err(e),
            MockReply::Hang => {
                cancel.cancelled().await;
                Err(TransportError::Cancelled {
                    endpoint: endpoint.path().to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl DnsApiTransport for MockTransport {
    async fn get_json(
        &self,
        endpoint: &Url,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransportError> {
        let params: Vec<(String, String)> = endpoint.query_pairs().into_owned().collect();
        let call = RecordedCall {
            method: "GET",
            path: endpoint.path().to_string(),
            params,
        };
        let domain = call.param("domain").unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(call);

        let reply = self
            .zone_replies
            .lock()
            .unwrap()
            .get(&domain)
            .cloned()
            .unwrap_or_else(|| MockReply::Body(no_such_zone_body(&domain)));

        Self::answer(reply, endpoint, cancel).await
    }

    async fn post_form(
        &self,
        endpoint: &Url,
        fields: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransportError> {
        let path = endpoint.path().to_string();
        self.calls.lock().unwrap().push(RecordedCall {
            method: "POST",
            path: path.clone(),
            params: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        });

        let reply = {
            let mut replies = self.post_replies.lock().unwrap();
            match replies.get_mut(&path) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        }
        .unwrap_or_else(|| MockReply::Body(ok_body()));

        Self::answer(reply, endpoint, cancel).await
    }
}

pub fn zone_body(zone: &str, disabled: bool) -> String {
    json!({
        "status": "ok",
        "response": {
            "zone": {
                "name": zone,
                "type": "Primary",
                "internal": false,
                "dnssecStatus": "Unsigned",
                "disabled": disabled
            },
            "records": []
        }
    })
    .to_string()
}

pub fn no_such_zone_body(domain: &str) -> String {
    json!({
        "status": "error",
        "errorMessage": format!("No such zone was found: {domain}")
    })
    .to_string()
}

pub fn ok_body() -> String {
    json!({ "status": "ok", "response": {} }).to_string()
}

pub fn error_body(message: &str) -> String {
    json!({ "status": "error", "errorMessage": message }).to_string()
}

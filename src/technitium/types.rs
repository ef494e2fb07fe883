// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Types for Technitium DNS API management.

use serde::Deserialize;
use std::fmt;
use url::Url;

/// API endpoint and token for one Technitium server.
///
/// The token is redacted from the `Debug` output and must never be logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Base URL of the Technitium HTTP API, without a trailing slash
    pub server_url: Url,
    /// API token (`token` query/form field)
    auth_token: String,
}

impl Credential {
    /// Create a credential for a server.
    #[must_use]
    pub fn new(server_url: Url, auth_token: impl Into<String>) -> Self {
        Self {
            server_url,
            auth_token: auth_token.into(),
        }
    }

    /// The API token.
    #[must_use]
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Join an API path onto the server URL, keeping any base path prefix.
    ///
    /// `https://dns.example.com/technitium` + `/api/zones/records/get`
    /// gives `https://dns.example.com/technitium/api/zones/records/get`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.server_url.clone();
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url.set_query(None);
        url
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("server_url", &self.server_url.as_str())
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// Zone type as reported by Technitium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum ZoneKind {
    Primary,
    Secondary,
    Stub,
    Forwarder,
    SecondaryForwarder,
    Catalog,
    SecondaryCatalog,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A zone as seen by the Technitium server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneInfo {
    /// Zone name (e.g., "example.com")
    #[serde(default)]
    pub name: String,
    /// Zone type
    #[serde(rename = "type", default)]
    pub kind: ZoneKind,
    /// DNSSEC status string, passed through verbatim
    #[serde(default)]
    pub dnssec_status: String,
    /// Disabled zones are never selected for challenges
    #[serde(default)]
    pub disabled: bool,
}

/// Body of `GET /api/zones/records/get?listZone=false`.
///
/// Only the fields the resolver needs are decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneLookupResponse {
    pub status: String,
    #[serde(default)]
    pub response: ZoneLookupBody,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ZoneLookupBody {
    #[serde(default)]
    pub zone: ZoneInfo,
}

/// Body of record add/delete responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatusResponse {
    /// `"ok"` on success, otherwise `"error"` or `"invalid-token"`
    pub status: String,
    /// Human readable reason for a failed call
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ApiStatusResponse {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == crate::constants::API_STATUS_OK
    }

    /// The error message, or an empty string when the server sent none.
    #[must_use]
    pub fn message(&self) -> &str {
        self.error_message.as_deref().unwrap_or_default()
    }
}

/// A TXT record to publish or remove for one challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtRecordSpec {
    /// Record owner name (e.g., `_acme-challenge.example.com`)
    pub owner_name: String,
    /// Zone holding the record
    pub zone: String,
    /// Challenge token published as the TXT text
    pub value: String,
    /// TTL in seconds, always positive
    pub ttl: u32,
}

/// Strip a single trailing terminator dot from a domain name.
#[must_use]
pub fn trim_trailing_dot(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

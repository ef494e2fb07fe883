// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-challenge solver configuration.
//!
//! cert-manager forwards the `config` block of the issuer's webhook solver
//! verbatim with every challenge:
//!
//! ```yaml
//! solvers:
//!   - dns01:
//!       webhook:
//!         groupName: acme.example.com
//!         solverName: technitium
//!         config:
//!           serverUrl: http://technitium.dns.svc:5380
//!           authTokenSecretRef:
//!             name: technitium-api
//!             key: token
//!           zone: example.com     # optional, skips zone discovery
//!           ttl: 120              # optional, defaults to 60
//! ```
//!
//! [`SolverConfig::from_json`] decodes and validates that block.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::DEFAULT_CHALLENGE_TTL_SECS;
use crate::errors::ConfigError;
use crate::technitium::build_api_url;
use crate::technitium::types::trim_trailing_dot;

/// Largest TTL a DNS record may carry (RFC 2181, section 8).
pub const MAX_TTL_SECS: u32 = 2_147_483_647;

/// Reference to one key of a Kubernetes `Secret` in the challenge namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    /// Secret name
    #[serde(default)]
    pub name: String,
    /// Key inside the secret's `data`
    #[serde(default)]
    pub key: String,
}

/// Wire shape of the config block before validation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSolverConfig {
    #[serde(default)]
    server_url: String,
    #[serde(default)]
    auth_token_secret_ref: Option<SecretKeySelector>,
    #[serde(default)]
    zone: Option<String>,
    #[serde(default)]
    ttl: Option<i64>,
}

/// Validated solver configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolverConfig {
    /// Normalised API base URL
    pub server_url: Url,
    /// Where the API token lives
    pub auth_token_secret_ref: SecretKeySelector,
    /// Explicit zone, bypasses discovery when set
    pub zone: Option<String>,
    /// TTL as configured; see [`SolverConfig::effective_ttl`]
    pub ttl: Option<i64>,
}

impl SolverConfig {
    /// Decode and validate the `config` JSON of a challenge request.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Missing`] when no config (or JSON `null`) was sent
    /// - [`ConfigError::Malformed`] when the JSON does not match the schema
    /// - [`ConfigError::MissingServerUrl`] / [`ConfigError::InvalidServerUrl`]
    /// - [`ConfigError::MissingSecretRef`] when the secret name or key is empty
    pub fn from_json(config: Option<&serde_json::Value>) -> Result<Self, ConfigError> {
        let value = match config {
            None | Some(serde_json::Value::Null) => return Err(ConfigError::Missing),
            Some(value) => value,
        };

        let raw = RawSolverConfig::deserialize(value).map_err(|e| ConfigError::Malformed {
            reason: e.to_string(),
        })?;

        let server_url = parse_server_url(&raw.server_url)?;

        let auth_token_secret_ref = raw
            .auth_token_secret_ref
            .map(|selector| SecretKeySelector {
                name: selector.name.trim().to_string(),
                key: selector.key.trim().to_string(),
            })
            .filter(|selector| !selector.name.is_empty() && !selector.key.is_empty())
            .ok_or(ConfigError::MissingSecretRef)?;

        let zone = raw
            .zone
            .map(|zone| trim_trailing_dot(zone.trim()).to_string())
            .filter(|zone| !zone.is_empty());

        Ok(Self {
            server_url,
            auth_token_secret_ref,
            zone,
            ttl: raw.ttl,
        })
    }

    /// TTL for the challenge record.
    ///
    /// Missing or non-positive values fall back to 60 seconds; values above
    /// [`MAX_TTL_SECS`] are clamped.
    #[must_use]
    pub fn effective_ttl(&self) -> u32 {
        match self.ttl {
            Some(ttl) if ttl > 0 => u32::try_from(ttl).map_or(MAX_TTL_SECS, |t| t.min(MAX_TTL_SECS)),
            _ => DEFAULT_CHALLENGE_TTL_SECS,
        }
    }

    /// Explicit zone override, without trailing dot.
    #[must_use]
    pub fn zone_override(&self) -> Option<&str> {
        self.zone.as_deref()
    }
}

fn parse_server_url(configured: &str) -> Result<Url, ConfigError> {
    if configured.trim().is_empty() {
        return Err(ConfigError::MissingServerUrl);
    }

    let normalised = build_api_url(configured);
    let url = Url::parse(&normalised).map_err(|e| ConfigError::InvalidServerUrl {
        url: configured.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::InvalidServerUrl {
                url: configured.to_string(),
                reason: format!("unsupported scheme '{other}'"),
            })
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidServerUrl {
            url: configured.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(url)
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! cert-manager external webhook wire types.
//!
//! cert-manager POSTs a `ChallengePayload` carrying a [`ChallengeRequest`] and
//! expects the same object back with `response` filled in. Field names follow
//! cert-manager's `webhook.acme.cert-manager.io/v1alpha1` JSON.

use serde::{Deserialize, Serialize};

use crate::constants::{
    API_STATUS_INVALID_TOKEN, CHALLENGE_PAYLOAD_API_VERSION, CHALLENGE_PAYLOAD_KIND,
};
use crate::errors::{ApiError, SecretError, SolverError, TransportError};

/// `status.status` value for failed challenges
pub const STATUS_FAILURE: &str = "Failure";

/// Envelope exchanged with cert-manager.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengePayload {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ChallengeRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ChallengeResponse>,
}

impl ChallengePayload {
    /// Echo the envelope back with `response` set and `request` dropped.
    #[must_use]
    pub fn respond(response: ChallengeResponse) -> Self {
        Self {
            api_version: CHALLENGE_PAYLOAD_API_VERSION.to_string(),
            kind: CHALLENGE_PAYLOAD_KIND.to_string(),
            request: None,
            response: Some(response),
        }
    }
}

/// What cert-manager asks the solver to do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeAction {
    /// Publish the TXT record
    Present,
    /// Remove the TXT record
    CleanUp,
    /// Anything else; rejected by the server
    #[default]
    #[serde(other)]
    Unknown,
}

impl ChallengeAction {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::CleanUp => "CleanUp",
            Self::Unknown => "Unknown",
        }
    }
}

/// A single DNS-01 challenge.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// Echoed back in the response
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub action: ChallengeAction,
    /// Challenge type, always `dns-01` for this solver
    #[serde(rename = "type", default)]
    pub challenge_type: String,
    /// Name on the certificate being validated
    #[serde(default)]
    pub dns_name: String,
    /// Value to publish in the TXT record
    #[serde(default)]
    pub key: String,
    /// Namespace used for secret lookups
    #[serde(default)]
    pub resource_namespace: String,
    /// Record owner name, e.g. `_acme-challenge.example.com.`
    #[serde(rename = "resolvedFQDN", default)]
    pub resolved_fqdn: String,
    /// Zone cert-manager resolved for the FQDN, may be empty
    #[serde(default)]
    pub resolved_zone: String,
    #[serde(default)]
    pub allow_ambient_credentials: bool,
    /// The issuer's solver `config` block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

/// Outcome reported back to cert-manager.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResultStatus>,
}

/// Subset of a Kubernetes `Status` describing a failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultStatus {
    /// Always [`STATUS_FAILURE`]
    pub status: String,
    pub message: String,
    /// Machine readable reason, see [`SolverError::status_reason`]
    pub reason: String,
    /// HTTP-style code
    pub code: u16,
}

impl ChallengeResponse {
    #[must_use]
    pub fn succeeded(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            success: true,
            status: None,
        }
    }

    /// Failure carrying an explicit reason and code.
    #[must_use]
    pub fn failed(uid: &str, message: impl Into<String>, reason: &str, code: u16) -> Self {
        Self {
            uid: uid.to_string(),
            success: false,
            status: Some(ResultStatus {
                status: STATUS_FAILURE.to_string(),
                message: message.into(),
                reason: reason.to_string(),
                code,
            }),
        }
    }

    /// Failure derived from a solver error.
    #[must_use]
    pub fn from_error(uid: &str, err: &SolverError) -> Self {
        Self::failed(uid, err.to_string(), err.status_reason(), status_code(err))
    }
}

/// HTTP-style code reported for a solver error.
#[must_use]
pub fn status_code(err: &SolverError) -> u16 {
    match err {
        SolverError::Config(_) => 400,
        SolverError::Secret(SecretError::NotFound { .. } | SecretError::KeyNotFound { .. })
        | SolverError::ZoneNotFound { .. } => 404,
        SolverError::Secret(SecretError::InvalidValue { .. }) => 422,
        SolverError::Api(ApiError::Status { status, .. }) if status == API_STATUS_INVALID_TOKEN => {
            403
        }
        SolverError::Transport(TransportError::Timeout { .. } | TransportError::Cancelled { .. })
        | SolverError::Cancelled => 504,
        SolverError::Transport(_) | SolverError::Api(_) => 502,
        SolverError::Secret(SecretError::Lookup { .. })
        | SolverError::NotInitialized { .. }
        | SolverError::AlreadyInitialized { .. } => 500,
    }
}

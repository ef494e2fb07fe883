// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the Technitium webhook.
//!
//! This module provides specialized error types for:
//! - Solver configuration decoding and validation
//! - Kubernetes secret lookups for the API token
//! - HTTP transport failures talking to Technitium DNS Server
//! - Technitium API responses whose `status` is not `"ok"`
//!
//! [`SolverError`] is the composite returned by every challenge operation. It
//! carries retry hints and a status reason that is reported back to cert-manager.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, SolverError>;

/// Errors raised while decoding or validating the per-challenge solver config.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The challenge request did not carry any config at all
    #[error("no solver config provided")]
    Missing,

    /// The config JSON could not be decoded
    #[error("error decoding solver config: {reason}")]
    Malformed {
        /// Decoder message
        reason: String,
    },

    /// `serverUrl` was absent or empty
    #[error("serverUrl must be provided")]
    MissingServerUrl,

    /// `serverUrl` was present but not a usable http(s) URL
    #[error("invalid serverUrl '{url}': {reason}")]
    InvalidServerUrl {
        /// The offending URL as configured
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// `authTokenSecretRef` was absent or had an empty name or key
    #[error("authTokenSecretRef must be provided with both name and key")]
    MissingSecretRef,
}

/// Errors raised while reading the API token from the secret store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    /// The referenced secret does not exist
    #[error("secret '{name}' not found in namespace '{namespace}'")]
    NotFound {
        /// Namespace that was searched
        namespace: String,
        /// Secret name
        name: String,
    },

    /// The secret exists but has no such key
    #[error("key '{key}' not found in secret '{namespace}/{name}'")]
    KeyNotFound {
        /// Namespace of the secret
        namespace: String,
        /// Secret name
        name: String,
        /// Missing data key
        key: String,
    },

    /// The value is not UTF-8 or is empty after trimming
    #[error("invalid token in secret '{namespace}/{name}' key '{key}': {reason}")]
    InvalidValue {
        /// Namespace of the secret
        namespace: String,
        /// Secret name
        name: String,
        /// Data key
        key: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The secret store itself failed (API server unreachable, RBAC, ...)
    #[error("error getting secret '{namespace}/{name}': {reason}")]
    Lookup {
        /// Namespace of the secret
        namespace: String,
        /// Secret name
        name: String,
        /// Underlying error message
        reason: String,
    },
}

/// Transport-level failures talking to the Technitium HTTP API.
///
/// The endpoint is always the URL path only. Query strings carry the API token
/// and never appear in these errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {reason}")]
    ClientBuild {
        /// Builder error message
        reason: String,
    },

    /// The request exceeded the configured timeout
    #[error("HTTP request to {endpoint} timed out")]
    Timeout {
        /// Endpoint path
        endpoint: String,
    },

    /// TCP connect or TLS handshake failed
    #[error("HTTP connection to {endpoint} failed: {reason}")]
    Connection {
        /// Endpoint path
        endpoint: String,
        /// Underlying error message
        reason: String,
    },

    /// Any other request or body-read failure
    #[error("HTTP request to {endpoint} failed: {reason}")]
    Request {
        /// Endpoint path
        endpoint: String,
        /// Underlying error message
        reason: String,
    },

    /// The caller cancelled the request before it completed
    #[error("HTTP request to {endpoint} was cancelled")]
    Cancelled {
        /// Endpoint path
        endpoint: String,
    },
}

/// Technitium API responses that did not report success.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The response decoded fine but `status` was not `"ok"`
    #[error("API error during {operation} (status '{status}'): {message}")]
    Status {
        /// Operation name (`add record`, `delete record`)
        operation: &'static str,
        /// Raw `status` value
        status: String,
        /// Server-provided `errorMessage`, empty when absent
        message: String,
    },

    /// The body could not be decoded as a Technitium API response
    #[error("error parsing API response during {operation}: {reason}")]
    MalformedResponse {
        /// Operation name
        operation: &'static str,
        /// Decoder message
        reason: String,
    },
}

/// Composite error returned by the solver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// Invalid or missing solver configuration
    #[error("error loading config: {0}")]
    Config(#[from] ConfigError),

    /// API token could not be obtained
    #[error("error getting auth token: {0}")]
    Secret(#[from] SecretError),

    /// Network level failure talking to Technitium
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Technitium rejected the request
    #[error(transparent)]
    Api(#[from] ApiError),

    /// No enabled zone on the server covers the FQDN
    #[error("no authoritative zone found for domain {fqdn}")]
    ZoneNotFound {
        /// The FQDN exactly as it was passed to the resolver
        fqdn: String,
    },

    /// `present`/`clean_up` was called before `initialize`
    #[error("solver '{solver}' has not been initialized")]
    NotInitialized {
        /// Solver name
        solver: &'static str,
    },

    /// `initialize` was called more than once
    #[error("solver '{solver}' is already initialized")]
    AlreadyInitialized {
        /// Solver name
        solver: &'static str,
    },

    /// The operation was aborted by shutdown or deadline
    #[error("operation cancelled")]
    Cancelled,
}

impl SolverError {
    /// Returns true if this error is transient and the orchestrator may retry.
    ///
    /// Nothing in this crate retries by itself; this is a hint for the caller.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(TransportError::ClientBuild { .. })
            | Self::Config(_)
            | Self::Secret(
                SecretError::NotFound { .. }
                | SecretError::KeyNotFound { .. }
                | SecretError::InvalidValue { .. },
            )
            | Self::Api(ApiError::Status { .. })
            | Self::ZoneNotFound { .. }
            | Self::NotInitialized { .. }
            | Self::AlreadyInitialized { .. } => false,

            Self::Transport(_)
            | Self::Secret(SecretError::Lookup { .. })
            | Self::Api(ApiError::MalformedResponse { .. })
            | Self::Cancelled => true,
        }
    }

    /// Returns true if the error was caused by cancellation of the request.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Transport(TransportError::Cancelled { .. })
        )
    }

    /// Returns the status reason reported to cert-manager for this error.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Config(_) => "InvalidConfig",

            Self::Secret(SecretError::NotFound { .. }) => "SecretNotFound",
            Self::Secret(SecretError::KeyNotFound { .. }) => "SecretKeyNotFound",
            Self::Secret(SecretError::InvalidValue { .. }) => "InvalidSecretValue",
            Self::Secret(SecretError::Lookup { .. }) => "SecretLookupFailed",

            Self::Transport(TransportError::ClientBuild { .. }) => "HttpClientBuildFailed",
            Self::Transport(TransportError::Timeout { .. }) => "HttpRequestTimeout",
            Self::Transport(TransportError::Connection { .. }) => "HttpConnectionFailed",
            Self::Transport(TransportError::Request { .. }) => "HttpRequestFailed",
            Self::Transport(TransportError::Cancelled { .. }) | Self::Cancelled => "Cancelled",

            Self::Api(ApiError::Status { status, .. })
                if status == crate::constants::API_STATUS_INVALID_TOKEN =>
            {
                "DnsApiAuthFailed"
            }
            Self::Api(ApiError::Status { .. }) => "DnsApiError",
            Self::Api(ApiError::MalformedResponse { .. }) => "DnsApiMalformedResponse",

            Self::ZoneNotFound { .. } => "ZoneNotFound",
            Self::NotInitialized { .. } => "SolverNotInitialized",
            Self::AlreadyInitialized { .. } => "SolverAlreadyInitialized",
        }
    }
}

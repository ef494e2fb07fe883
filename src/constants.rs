// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Technitium webhook.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Solver Identity
// ============================================================================

/// Name the solver is registered under; cert-manager routes challenges by it
pub const SOLVER_NAME: &str = "technitium";

/// API version served for every solver resource
pub const WEBHOOK_API_VERSION: &str = "v1alpha1";

/// `apiVersion` of the `ChallengePayload` objects exchanged with cert-manager
pub const CHALLENGE_PAYLOAD_API_VERSION: &str = "webhook.acme.cert-manager.io/v1alpha1";

/// `kind` of the objects exchanged with cert-manager
pub const CHALLENGE_PAYLOAD_KIND: &str = "ChallengePayload";

// ============================================================================
// Technitium DNS API Constants
// ============================================================================

/// Zone lookup endpoint (GET)
pub const ZONE_LOOKUP_PATH: &str = "/api/zones/records/get";

/// Record creation endpoint (POST, form encoded)
pub const RECORD_ADD_PATH: &str = "/api/zones/records/add";

/// Record deletion endpoint (POST, form encoded)
pub const RECORD_DELETE_PATH: &str = "/api/zones/records/delete";

/// `status` value Technitium returns on success
pub const API_STATUS_OK: &str = "ok";

/// `status` value Technitium returns when the API token is rejected
pub const API_STATUS_INVALID_TOKEN: &str = "invalid-token";

/// Record type managed by the solver
pub const TXT_RECORD_TYPE: &str = "TXT";

// ============================================================================
// DNS Record Constants
// ============================================================================

/// Default TTL for challenge TXT records (1 minute)
pub const DEFAULT_CHALLENGE_TTL_SECS: u32 = 60;

// ============================================================================
// HTTP Transport Constants
// ============================================================================

/// Overall timeout for a single DNS API request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for establishing a connection, TLS handshake included
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// How long an idle pooled connection is kept around
pub const DEFAULT_POOL_IDLE_TIMEOUT_SECS: u64 = 30;

/// Maximum number of idle pooled connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Upper bound on a whole Present/CleanUp call, zone walk included
pub const CHALLENGE_DEADLINE_SECS: u64 = 120;

// ============================================================================
// Webhook Server Constants
// ============================================================================

/// Default listen address for the webhook HTTPS server
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8443";

/// Liveness endpoint path
pub const HEALTHZ_PATH: &str = "/healthz";

/// Readiness endpoint path
pub const READYZ_PATH: &str = "/readyz";

/// Path for Prometheus metrics endpoint
pub const METRICS_PATH: &str = "/metrics";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Authoritative zone discovery.
//!
//! The resolver walks the FQDN from the most specific name towards the TLD,
//! asking Technitium about each candidate, and stops at the first enabled zone.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::transport::DnsApiTransport;
use super::types::{trim_trailing_dot, Credential, ZoneLookupResponse};
use crate::constants::ZONE_LOOKUP_PATH;
use crate::errors::{Result, SolverError, TransportError};
use crate::metrics;

/// Outcome of checking a single candidate name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// The server knows an enabled zone for this candidate
    Found(String),
    /// The server answered but the zone is disabled
    Disabled,
    /// The server answered with a non-ok status
    Miss,
    /// The query failed (transport error, bad body); try the next candidate
    Failed(String),
}

/// Candidate zone names for an FQDN, most specific first.
///
/// `_acme-challenge.foo.example.com.` yields
/// `_acme-challenge.foo.example.com`, `foo.example.com`, `example.com`, `com`.
/// Empty labels are ignored.
#[must_use]
pub fn candidate_zones(fqdn: &str) -> Vec<String> {
    let labels: Vec<&str> = trim_trailing_dot(fqdn)
        .split('.')
        .filter(|label| !label.is_empty())
        .collect();

    (0..labels.len()).map(|i| labels[i..].join(".")).collect()
}

/// Find the most specific enabled zone on the server that covers `fqdn`.
///
/// The zone name returned is the one the server reports for the matching
/// candidate when that name is the candidate itself or a label-suffix of it
/// (see [`select_zone_name`]); otherwise it is the candidate.
///
/// Per-candidate failures are logged and skipped; only cancellation aborts the
/// walk early.
///
/// # Errors
///
/// - [`SolverError::ZoneNotFound`] naming `fqdn` exactly as given when no
///   candidate resolves to an enabled zone
/// - [`SolverError::Cancelled`] when `cancel` fires during the walk
pub async fn find_authoritative_zone(
    transport: &dyn DnsApiTransport,
    credential: &Credential,
    fqdn: &str,
    cancel: &CancellationToken,
) -> Result<String> {
    for candidate in candidate_zones(fqdn) {
        if cancel.is_cancelled() {
            return Err(SolverError::Cancelled);
        }

        debug!(candidate = %candidate, "Checking if candidate is an authoritative zone");

        match check_candidate(transport, credential, &candidate, cancel).await? {
            CandidateOutcome::Found(zone) => {
                metrics::record_zone_lookup("hit");
                info!(fqdn = %fqdn, zone = %zone, "Found authoritative zone");
                return Ok(zone);
            }
            CandidateOutcome::Disabled => {
                metrics::record_zone_lookup("disabled");
                debug!(candidate = %candidate, "Zone is disabled, trying parent");
            }
            CandidateOutcome::Miss => {
                metrics::record_zone_lookup("miss");
            }
            CandidateOutcome::Failed(reason) => {
                metrics::record_zone_lookup("error");
                debug!(candidate = %candidate, error = %reason, "Zone lookup failed, trying parent");
            }
        }
    }

    Err(SolverError::ZoneNotFound {
        fqdn: fqdn.to_string(),
    })
}

/// Query one candidate.
///
/// The response body is read and dropped inside this call, so nothing from
/// one candidate outlives its iteration of the walk.
///
/// # Errors
///
/// Only cancellation is returned as an error; every other failure becomes
/// [`CandidateOutcome::Failed`].
pub async fn check_candidate(
    transport: &dyn DnsApiTransport,
    credential: &Credential,
    candidate: &str,
    cancel: &CancellationToken,
) -> Result<CandidateOutcome> {
    let mut endpoint = credential.endpoint(ZONE_LOOKUP_PATH);
    endpoint
        .query_pairs_mut()
        .append_pair("token", credential.auth_token())
        .append_pair("domain", candidate)
        .append_pair("listZone", "false");

    let body = match transport.get_json(&endpoint, cancel).await {
        Ok(body) => body,
        Err(TransportError::Cancelled { .. }) => return Err(SolverError::Cancelled),
        Err(e) => return Ok(CandidateOutcome::Failed(e.to_string())),
    };

    let response: ZoneLookupResponse = match serde_json::from_slice(&body) {
        Ok(response) => response,
        Err(e) => {
            return Ok(CandidateOutcome::Failed(format!(
                "error parsing response: {e}"
            )))
        }
    };

    debug!(candidate = %candidate, status = %response.status, "Zone check status");

    if response.status != crate::constants::API_STATUS_OK {
        return Ok(CandidateOutcome::Miss);
    }

    let zone = response.response.zone;
    if zone.disabled {
        return Ok(CandidateOutcome::Disabled);
    }

    debug!(
        candidate = %candidate,
        zone = %zone.name,
        kind = ?zone.kind,
        dnssec_status = %zone.dnssec_status,
        "Zone lookup succeeded"
    );

    Ok(CandidateOutcome::Found(select_zone_name(candidate, &zone.name)))
}

/// Pick the zone name to report for a successful lookup.
///
/// Technitium reports the zone that actually holds `candidate`. That name is
/// preferred when it is `candidate` itself or one of its parents; otherwise the
/// candidate is used.
#[must_use]
pub fn select_zone_name(candidate: &str, reported: &str) -> String {
    let reported = trim_trailing_dot(reported);
    if reported.is_empty() {
        return candidate.to_string();
    }

    let candidate_lower = candidate.to_ascii_lowercase();
    let reported_lower = reported.to_ascii_lowercase();
    if candidate_lower == reported_lower
        || candidate_lower.ends_with(&format!(".{reported_lower}"))
    {
        reported.to_string()
    } else {
        candidate.to_string()
    }
}

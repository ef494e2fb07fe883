// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TXT record management.
//!
//! Technitium has no dedicated status for "record already gone" or "record
//! already present"; both only show up in the free-text `errorMessage`. The
//! phrase matching lives in [`is_record_absent_message`] and
//! [`is_record_exists_message`] so it can be adjusted in one place.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::transport::DnsApiTransport;
use super::types::{trim_trailing_dot, ApiStatusResponse, Credential, TxtRecordSpec};
use crate::constants::{RECORD_ADD_PATH, RECORD_DELETE_PATH, TXT_RECORD_TYPE};
use crate::errors::{ApiError, Result, SolverError, TransportError};
use crate::metrics;

/// Phrases (lowercase) Technitium uses when the record or zone to delete does
/// not exist.
///
/// FRAGILE: matched as substrings of `errorMessage`. Revisit if the API ever
/// exposes structured error codes.
pub const RECORD_ABSENT_PHRASES: &[&str] = &["not found", "does not exist", "no such record"];

/// Phrases (lowercase) meaning the record being added is already present.
///
/// FRAGILE: same caveat as [`RECORD_ABSENT_PHRASES`].
pub const RECORD_EXISTS_PHRASES: &[&str] = &["already exists"];

/// True if a failed delete's message says the record is already absent.
#[must_use]
pub fn is_record_absent_message(message: &str) -> bool {
    contains_any(message, RECORD_ABSENT_PHRASES)
}

/// True if a failed add's message says the record is already present.
#[must_use]
pub fn is_record_exists_message(message: &str) -> bool {
    contains_any(message, RECORD_EXISTS_PHRASES)
}

fn contains_any(message: &str, phrases: &[&str]) -> bool {
    let message = message.to_lowercase();
    phrases.iter().any(|phrase| message.contains(phrase))
}

/// Publish the challenge TXT record.
///
/// The text is sent unsplit (`splitText=false`). A non-ok status is a hard
/// failure unless the message says the record already exists.
///
/// # Errors
///
/// - [`SolverError::Transport`] on network failure (no retry here)
/// - [`SolverError::Api`] when Technitium rejects the request or the body
///   cannot be decoded
pub async fn create_txt_record(
    transport: &dyn DnsApiTransport,
    credential: &Credential,
    record: &TxtRecordSpec,
    cancel: &CancellationToken,
) -> Result<()> {
    const OPERATION: &str = "add record";

    let domain = trim_trailing_dot(&record.owner_name);
    let zone = trim_trailing_dot(&record.zone);
    let ttl = record.ttl.to_string();

    info!(
        domain = %domain,
        zone = %zone,
        ttl = record.ttl,
        "Creating TXT record"
    );

    let fields = [
        ("token", credential.auth_token()),
        ("domain", domain),
        ("zone", zone),
        ("type", TXT_RECORD_TYPE),
        ("ttl", ttl.as_str()),
        ("text", record.value.as_str()),
        ("splitText", "false"),
    ];

    let response = send(transport, credential, RECORD_ADD_PATH, &fields, OPERATION, cancel).await?;

    if response.is_ok() {
        metrics::record_api_call("add", "success");
        info!(domain = %domain, zone = %zone, "Successfully created TXT record");
        return Ok(());
    }

    if is_record_exists_message(response.message()) {
        metrics::record_api_call("add", "already_exists");
        warn!(
            domain = %domain,
            zone = %zone,
            status = %response.status,
            error = %response.message(),
            "TXT record already exists, treating as created"
        );
        return Ok(());
    }

    metrics::record_api_call("add", "error");
    error!(
        domain = %domain,
        zone = %zone,
        status = %response.status,
        error = %response.message(),
        "API error creating TXT record"
    );
    Err(ApiError::Status {
        operation: OPERATION,
        status: response.status.clone(),
        message: response.message().to_string(),
    }
    .into())
}

/// Remove the challenge TXT record.
///
/// Deleting a record that is already gone is not an error.
///
/// # Errors
///
/// - [`SolverError::Transport`] on network failure
/// - [`SolverError::Api`] for any non-ok status that does not match
///   [`is_record_absent_message`], or an undecodable body
pub async fn delete_txt_record(
    transport: &dyn DnsApiTransport,
    credential: &Credential,
    record: &TxtRecordSpec,
    cancel: &CancellationToken,
) -> Result<()> {
    const OPERATION: &str = "delete record";

    let domain = trim_trailing_dot(&record.owner_name);
    let zone = trim_trailing_dot(&record.zone);

    info!(domain = %domain, zone = %zone, "Deleting TXT record");

    let fields = [
        ("token", credential.auth_token()),
        ("domain", domain),
        ("zone", zone),
        ("type", TXT_RECORD_TYPE),
        ("text", record.value.as_str()),
        ("splitText", "false"),
    ];

    let response = send(
        transport,
        credential,
        RECORD_DELETE_PATH,
        &fields,
        OPERATION,
        cancel,
    )
    .await?;

    if response.is_ok() {
        metrics::record_api_call("delete", "success");
        info!(domain = %domain, zone = %zone, "Successfully deleted TXT record");
        return Ok(());
    }

    warn!(
        domain = %domain,
        status = %response.status,
        error = %response.message(),
        "API returned non-ok status for delete"
    );

    if is_record_absent_message(response.message()) {
        metrics::record_api_call("delete", "already_absent");
        info!(domain = %domain, zone = %zone, "Record might already be deleted, continuing");
        return Ok(());
    }

    metrics::record_api_call("delete", "error");
    Err(ApiError::Status {
        operation: OPERATION,
        status: response.status.clone(),
        message: response.message().to_string(),
    }
    .into())
}

/// POST the form and decode the status envelope.
async fn send(
    transport: &dyn DnsApiTransport,
    credential: &Credential,
    path: &str,
    fields: &[(&str, &str)],
    operation: &'static str,
    cancel: &CancellationToken,
) -> Result<ApiStatusResponse> {
    let endpoint = credential.endpoint(path);

    let body = transport
        .post_form(&endpoint, fields, cancel)
        .await
        .map_err(|e| match e {
            TransportError::Cancelled { .. } => SolverError::Cancelled,
            other => {
                error!(operation = operation, error = %other, "HTTP request failed");
                SolverError::Transport(other)
            }
        })?;

    serde_json::from_slice(&body).map_err(|e| {
        error!(operation = operation, error = %e, "Failed to parse API response");
        SolverError::from(ApiError::MalformedResponse {
            operation,
            reason: e.to_string(),
        })
    })
}

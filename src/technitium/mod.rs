// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Technitium DNS Server management via its HTTP API.
//!
//! This module provides the pieces the solver needs to publish ACME DNS-01
//! challenge records on a Technitium server:
//!
//! - Discovering the authoritative zone for an FQDN ([`zones`])
//! - Creating and deleting TXT records ([`records`])
//! - The shared HTTP transport and its test seam ([`transport`])
//!
//! # Architecture
//!
//! [`TechnitiumClient`] binds one shared [`DnsApiTransport`] to one
//! [`Credential`] (server URL plus API token). Clients are cheap: the solver
//! builds a fresh one for every challenge and drops it afterwards, while the
//! transport and its connection pool live for the whole process.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use technitium_webhook::technitium::{
//!     Credential, HttpTransport, TechnitiumClient, TransportSettings,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let transport = Arc::new(HttpTransport::new(&TransportSettings::default())?);
//! let credential = Credential::new("http://dns.example.com:5380".parse()?, "secret-token");
//! let client = TechnitiumClient::new(transport, credential);
//!
//! let cancel = CancellationToken::new();
//! let zone = client
//!     .find_authoritative_zone("_acme-challenge.www.example.com.", &cancel)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod records;
pub mod transport;
pub mod types;
pub mod zones;

pub use transport::{DnsApiTransport, HttpTransport, TransportSettings};
pub use types::{Credential, TxtRecordSpec, ZoneInfo, ZoneKind};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::errors::Result;

/// Zone resolver and record manager bound to one server and token.
#[derive(Debug, Clone)]
pub struct TechnitiumClient {
    /// Shared HTTP transport
    transport: Arc<dyn DnsApiTransport>,
    /// Server URL and API token
    credential: Credential,
}

impl TechnitiumClient {
    /// Bind a transport to a credential.
    #[must_use]
    pub fn new(transport: Arc<dyn DnsApiTransport>, credential: Credential) -> Self {
        Self {
            transport,
            credential,
        }
    }

    /// The credential this client is bound to.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Find the most specific enabled zone covering `fqdn`.
    ///
    /// # Errors
    ///
    /// Returns `ZoneNotFound` (naming `fqdn` as given) when no candidate
    /// matches, or `Cancelled` if `cancel` fires first.
    pub async fn find_authoritative_zone(
        &self,
        fqdn: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        zones::find_authoritative_zone(self.transport.as_ref(), &self.credential, fqdn, cancel)
            .await
    }

    /// Create a TXT record.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-ok API status.
    pub async fn create_txt_record(
        &self,
        record: &TxtRecordSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        records::create_txt_record(self.transport.as_ref(), &self.credential, record, cancel).await
    }

    /// Delete a TXT record; an already absent record counts as success.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-ok API status that does
    /// not indicate the record is gone.
    pub async fn delete_txt_record(
        &self,
        record: &TxtRecordSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        records::delete_txt_record(self.transport.as_ref(), &self.credential, record, cancel).await
    }
}

/// Normalise a configured server address into an API base URL string.
///
/// Adds `http://` when no scheme is given and trims trailing slashes, so
/// `"dns.example.com:5380/"` becomes `"http://dns.example.com:5380"`. An
/// explicit scheme is kept as written.
#[must_use]
pub fn build_api_url(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    if server.contains("://") {
        server.to_string()
    } else {
        format!("http://{server}")
    }
}

#[cfg(test)]
pub(crate) mod mock_transport;

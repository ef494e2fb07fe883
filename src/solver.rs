// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS-01 challenge solvers.
//!
//! A [`ChallengeSolver`] turns cert-manager `Present`/`CleanUp` calls into
//! DNS changes. [`TechnitiumSolver`] is the implementation for Technitium DNS
//! Server:
//!
//! 1. Decode the solver config from the request
//! 2. Read the API token from the secret store
//! 3. Pick the zone: config `zone`, then the request's `resolvedZone`, then
//!    discovery against the server
//! 4. Create (Present) or delete (CleanUp) the TXT record
//!
//! Each call is single-shot. Nothing is retried here and nothing waits for
//! DNS propagation; cert-manager re-invokes the webhook when it needs to.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use technitium_webhook::secrets::StaticSecretStore;
//! use technitium_webhook::solver::{ChallengeSolver, TechnitiumSolver};
//! use technitium_webhook::technitium::{HttpTransport, TransportSettings};
//!
//! # fn example() -> anyhow::Result<()> {
//! let transport = Arc::new(HttpTransport::new(&TransportSettings::default())?);
//! let solver = TechnitiumSolver::new(transport);
//! solver.initialize(Arc::new(StaticSecretStore::new()))?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::challenge::{ChallengeAction, ChallengeRequest};
use crate::config::SolverConfig;
use crate::constants::SOLVER_NAME;
use crate::errors::{Result, SolverError};
use crate::metrics;
use crate::secrets::{token_from_bytes, SecretStore};
use crate::technitium::types::trim_trailing_dot;
use crate::technitium::{Credential, DnsApiTransport, TechnitiumClient, TxtRecordSpec};

/// A cert-manager DNS-01 solver.
///
/// Implementations are shared between concurrent requests.
#[async_trait]
pub trait ChallengeSolver: Send + Sync + Debug {
    /// Name cert-manager routes requests by (`solverName` in the issuer).
    fn name(&self) -> &'static str;

    /// Wire in the secret store. Must be called exactly once, before any
    /// challenge is served.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::AlreadyInitialized`] on a second call.
    fn initialize(&self, secrets: Arc<dyn SecretStore>) -> Result<()>;

    /// Publish the challenge record.
    ///
    /// # Errors
    ///
    /// Returns an error if config, credentials, zone discovery or the DNS
    /// API call fails, or if `cancel` fires first.
    async fn present(&self, request: &ChallengeRequest, cancel: &CancellationToken) -> Result<()>;

    /// Remove the challenge record. Removing an absent record succeeds.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ChallengeSolver::present`].
    async fn clean_up(&self, request: &ChallengeRequest, cancel: &CancellationToken)
        -> Result<()>;
}

/// Solver publishing challenge records on Technitium DNS Server.
#[derive(Debug)]
pub struct TechnitiumSolver {
    /// Shared HTTP transport, built once at startup
    transport: Arc<dyn DnsApiTransport>,
    /// Set by `initialize`
    secrets: OnceLock<Arc<dyn SecretStore>>,
}

/// Record change a challenge action maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordChange {
    Create,
    Delete,
}

/// Everything needed to act on one challenge.
#[derive(Debug)]
struct PreparedChallenge {
    client: TechnitiumClient,
    record: TxtRecordSpec,
}

impl TechnitiumSolver {
    #[must_use]
    pub fn new(transport: Arc<dyn DnsApiTransport>) -> Self {
        Self {
            transport,
            secrets: OnceLock::new(),
        }
    }

    /// Resolve config, token, TTL and zone for a request.
    async fn prepare(
        &self,
        request: &ChallengeRequest,
        cancel: &CancellationToken,
    ) -> Result<PreparedChallenge> {
        let secrets = self.secrets.get().ok_or(SolverError::NotInitialized {
            solver: SOLVER_NAME,
        })?;

        let config = SolverConfig::from_json(request.config.as_ref())?;
        let token =
            Self::read_token(secrets.as_ref(), &config, &request.resource_namespace, cancel)
                .await?;

        let client = TechnitiumClient::new(
            Arc::clone(&self.transport),
            Credential::new(config.server_url.clone(), token),
        );

        let zone = if let Some(zone) = config.zone_override() {
            info!(fqdn = %request.resolved_fqdn, zone = %zone, "Using zone from solver config");
            zone.to_string()
        } else if !trim_trailing_dot(request.resolved_zone.trim()).is_empty() {
            trim_trailing_dot(request.resolved_zone.trim()).to_string()
        } else {
            info!(
                fqdn = %request.resolved_fqdn,
                "Zone not specified, attempting to find authoritative zone"
            );
            client
                .find_authoritative_zone(&request.resolved_fqdn, cancel)
                .await?
        };

        let record = TxtRecordSpec {
            owner_name: request.resolved_fqdn.clone(),
            zone,
            value: request.key.clone(),
            ttl: config.effective_ttl(),
        };

        Ok(PreparedChallenge { client, record })
    }

    async fn read_token(
        secrets: &dyn SecretStore,
        config: &SolverConfig,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let selector = &config.auth_token_secret_ref;

        let lookup = secrets.get_secret_value(namespace, &selector.name, &selector.key);
        let bytes = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SolverError::Cancelled),
            result = lookup => result?,
        };

        Ok(token_from_bytes(
            namespace,
            &selector.name,
            &selector.key,
            &bytes,
        )?)
    }

    /// Run one action with logging and metrics around it.
    async fn run(
        &self,
        change: RecordChange,
        request: &ChallengeRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let label = match change {
            RecordChange::Create => ChallengeAction::Present.as_str(),
            RecordChange::Delete => ChallengeAction::CleanUp.as_str(),
        };
        let start = Instant::now();
        let _in_flight = metrics::record_challenge_started(label);

        let result = async {
            let prepared = self.prepare(request, cancel).await?;
            match change {
                RecordChange::Create => {
                    prepared
                        .client
                        .create_txt_record(&prepared.record, cancel)
                        .await
                }
                RecordChange::Delete => {
                    prepared
                        .client
                        .delete_txt_record(&prepared.record, cancel)
                        .await
                }
            }
        }
        .await;

        match &result {
            Ok(()) => metrics::record_challenge_success(label, start.elapsed()),
            Err(e) => {
                error!(
                    action = label,
                    uid = %request.uid,
                    fqdn = %request.resolved_fqdn,
                    reason = e.status_reason(),
                    transient = e.is_transient(),
                    error = %e,
                    "Challenge operation failed"
                );
                metrics::record_challenge_error(label, e.status_reason(), start.elapsed());
            }
        }

        result
    }
}

#[async_trait]
impl ChallengeSolver for TechnitiumSolver {
    fn name(&self) -> &'static str {
        SOLVER_NAME
    }

    fn initialize(&self, secrets: Arc<dyn SecretStore>) -> Result<()> {
        info!(solver = SOLVER_NAME, "Initializing Technitium DNS solver");
        self.secrets
            .set(secrets)
            .map_err(|_| SolverError::AlreadyInitialized {
                solver: SOLVER_NAME,
            })
    }

    async fn present(&self, request: &ChallengeRequest, cancel: &CancellationToken) -> Result<()> {
        info!(fqdn = %request.resolved_fqdn, uid = %request.uid, "Presenting challenge");
        self.run(RecordChange::Create, request, cancel).await?;
        info!(fqdn = %request.resolved_fqdn, "Successfully presented challenge");
        Ok(())
    }

    async fn clean_up(
        &self,
        request: &ChallengeRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!(fqdn = %request.resolved_fqdn, uid = %request.uid, "Cleaning up challenge");
        self.run(RecordChange::Delete, request, cancel).await?;
        info!(fqdn = %request.resolved_fqdn, "Successfully cleaned up challenge");
        Ok(())
    }
}

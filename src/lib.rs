// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # technitium-webhook - cert-manager DNS-01 solver for Technitium DNS Server
//!
//! This crate implements a cert-manager external webhook that answers ACME
//! DNS-01 challenges by creating and deleting `_acme-challenge` TXT records
//! through the Technitium DNS Server HTTP API.
//!
//! ## Overview
//!
//! For each challenge the webhook:
//!
//! - decodes the per-issuer solver config (`serverUrl`, `authTokenSecretRef`,
//!   optional `zone` and `ttl`)
//! - reads the Technitium API token from a Kubernetes secret
//! - finds the zone that is authoritative for the challenge FQDN, walking up
//!   the labels unless the zone is already known
//! - adds or removes the TXT record carrying the challenge key
//!
//! ## Modules
//!
//! - [`webhook`] - axum router and HTTP(S) server for the cert-manager API
//! - [`solver`] - the [`solver::ChallengeSolver`] trait and its Technitium implementation
//! - [`technitium`] - Technitium API client: transport, zone search, record calls
//! - [`config`] - per-challenge solver config decoding and validation
//! - [`secrets`] - API token lookup from Kubernetes secrets
//! - [`challenge`] - cert-manager `ChallengePayload` wire types
//! - [`errors`] - typed errors with retry hints and status reasons
//! - [`metrics`] - Prometheus metrics
//! - [`cli`] - process settings
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use technitium_webhook::secrets::StaticSecretStore;
//! use technitium_webhook::solver::{ChallengeSolver, TechnitiumSolver};
//! use technitium_webhook::technitium::{HttpTransport, TransportSettings};
//!
//! # fn main() -> anyhow::Result<()> {
//! let transport = Arc::new(HttpTransport::new(&TransportSettings::default())?);
//! let solver = TechnitiumSolver::new(transport);
//! solver.initialize(Arc::new(
//!     StaticSecretStore::new().with_value("cert-manager", "technitium", "token", "secret"),
//! ))?;
//! # Ok(())
//! # }
//! ```

pub mod challenge;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod metrics;
pub mod secrets;
pub mod solver;
pub mod technitium;
pub mod webhook;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process settings for the webhook binary.
//!
//! Every flag can also be supplied through its environment variable, which is
//! how the Helm chart wires them into the pod.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_LISTEN_ADDRESS, DEFAULT_POOL_IDLE_TIMEOUT_SECS,
    DEFAULT_POOL_MAX_IDLE_PER_HOST, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::errors::ConfigError;
use crate::technitium::TransportSettings;

/// cert-manager ACME DNS-01 webhook for Technitium DNS Server
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct WebhookSettings {
    /// API group the webhook is registered under (matches the Issuer's `groupName`)
    #[arg(long, env = "GROUP_NAME")]
    pub group_name: String,

    /// Address the webhook server listens on
    #[arg(long, env = "WEBHOOK_LISTEN_ADDRESS", default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen_address: SocketAddr,

    /// PEM certificate chain for HTTPS
    #[arg(long, env = "WEBHOOK_TLS_CERT_FILE", requires = "tls_private_key_file")]
    pub tls_cert_file: Option<PathBuf>,

    /// PEM private key for HTTPS
    #[arg(long, env = "WEBHOOK_TLS_PRIVATE_KEY_FILE", requires = "tls_cert_file")]
    pub tls_private_key_file: Option<PathBuf>,

    /// Overall timeout for one Technitium API request
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// TCP connect and TLS handshake timeout
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,

    /// How long idle pooled connections are kept
    #[arg(long, default_value_t = DEFAULT_POOL_IDLE_TIMEOUT_SECS)]
    pub pool_idle_timeout_secs: u64,

    /// Idle connections kept per Technitium host
    #[arg(long, default_value_t = DEFAULT_POOL_MAX_IDLE_PER_HOST)]
    pub pool_max_idle: usize,
}

impl WebhookSettings {
    /// Check the settings clap cannot check by itself.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Malformed`] when the group name is blank or a
    /// timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_name.trim().is_empty() {
            return Err(ConfigError::Malformed {
                reason: "group name must not be empty".to_string(),
            });
        }

        for (flag, value) in [
            ("request-timeout-secs", self.request_timeout_secs),
            ("connect-timeout-secs", self.connect_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Malformed {
                    reason: format!("--{flag} must be greater than zero"),
                });
            }
        }

        Ok(())
    }

    /// The TLS certificate and key paths, when both are configured.
    #[must_use]
    pub fn tls_files(&self) -> Option<(&PathBuf, &PathBuf)> {
        self.tls_cert_file.as_ref().zip(self.tls_private_key_file.as_ref())
    }

    /// HTTP transport settings for the Technitium client.
    #[must_use]
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            pool_idle_timeout: Duration::from_secs(self.pool_idle_timeout_secs),
            pool_max_idle_per_host: self.pool_max_idle,
        }
    }
}

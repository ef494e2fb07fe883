// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TLS configuration for the webhook server.
//!
//! The Kubernetes API server reaches the webhook through an aggregated
//! `APIService`, so the server normally terminates TLS itself with a
//! certificate issued for its `Service`.

use anyhow::{bail, Context, Result};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Build a rustls server config from a PEM certificate chain and key.
///
/// ALPN offers HTTP/2 and HTTP/1.1.
///
/// # Errors
///
/// Returns an error if either file cannot be read, holds no usable PEM
/// object, or the key does not match the certificate.
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>> {
    let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_file_iter(cert_path)
        .with_context(|| format!("Failed to open certificate file {}", cert_path.display()))?
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Failed to parse certificates in {}", cert_path.display()))?;

    if certs.is_empty() {
        bail!("No certificates found in {}", cert_path.display());
    }

    let key = PrivateKeyDer::from_pem_file(key_path)
        .with_context(|| format!("Failed to load private key from {}", key_path.display()))?;

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .context("Failed to select TLS protocol versions")?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .context("Certificate and private key do not match")?;

    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    info!(
        cert_file = %cert_path.display(),
        key_file = %key_path.display(),
        "Loaded webhook TLS certificate"
    );

    Ok(Arc::new(config))
}

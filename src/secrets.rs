// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! API token lookup.
//!
//! The solver reads the Technitium API token from a Kubernetes `Secret` in the
//! challenge's namespace. [`SecretStore`] is the seam; [`KubeSecretStore`] is
//! the in-cluster implementation and [`StaticSecretStore`] an in-memory one
//! for tests and local runs.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::debug;

use crate::errors::SecretError;

/// Read access to secret data.
#[async_trait]
pub trait SecretStore: Send + Sync + Debug {
    /// Raw bytes of `key` in secret `namespace/name`.
    ///
    /// # Errors
    ///
    /// [`SecretError::NotFound`] or [`SecretError::KeyNotFound`] when the
    /// secret or key is absent, [`SecretError::Lookup`] when the store fails.
    async fn get_secret_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Vec<u8>, SecretError>;
}

/// [`SecretStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get_secret_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Vec<u8>, SecretError> {
        debug!(namespace = %namespace, secret = %name, "Getting auth token from secret");

        let secret_api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secret_api
            .get_opt(name)
            .await
            .map_err(|e| SecretError::Lookup {
                namespace: namespace.to_string(),
                name: name.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| SecretError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;

        secret
            .data
            .as_ref()
            .and_then(|data| data.get(key))
            .map(|value| value.0.clone())
            .ok_or_else(|| SecretError::KeyNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
                key: key.to_string(),
            })
    }
}

/// In-memory [`SecretStore`] keyed by `(namespace, name)`.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<(String, String), HashMap<String, Vec<u8>>>,
}

impl StaticSecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or overwrite) one key of a secret.
    #[must_use]
    pub fn with_value(
        mut self,
        namespace: &str,
        name: &str,
        key: &str,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.secrets
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Vec<u8>, SecretError> {
        let data = self
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| SecretError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;

        data.get(key).cloned().ok_or_else(|| SecretError::KeyNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
            key: key.to_string(),
        })
    }
}

/// Turn raw secret bytes into an API token.
///
/// Surrounding whitespace is trimmed (secrets created with `--from-file`
/// usually end in a newline).
///
/// # Errors
///
/// [`SecretError::InvalidValue`] if the bytes are not UTF-8 or the token is
/// empty after trimming.
pub fn token_from_bytes(
    namespace: &str,
    name: &str,
    key: &str,
    bytes: &[u8],
) -> Result<String, SecretError> {
    let invalid = |reason: &str| SecretError::InvalidValue {
        namespace: namespace.to_string(),
        name: name.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let token = std::str::from_utf8(bytes)
        .map_err(|_| invalid("value is not valid UTF-8"))?
        .trim();

    if token.is_empty() {
        return Err(invalid("value is empty"));
    }

    Ok(token.to_string())
}

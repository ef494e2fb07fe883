// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! cert-manager webhook HTTP surface.

pub mod server;
pub mod tls;

pub use server::{router, serve, WebhookState};
pub use tls::load_tls_config;

#[cfg(test)]
mod server_tests;
#[cfg(test)]
pub(crate) mod test_certs;

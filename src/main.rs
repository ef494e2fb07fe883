// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::Parser;
use kube::Client;
use std::sync::Arc;
use technitium_webhook::{
    cli::WebhookSettings,
    constants::TOKIO_WORKER_THREADS,
    secrets::KubeSecretStore,
    solver::{ChallengeSolver, TechnitiumSolver},
    technitium::HttpTransport,
    webhook::{load_tls_config, router, serve, WebhookState},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("technitium-webhook")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT=json|text
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    let settings = WebhookSettings::parse();
    settings.validate()?;

    info!(
        group_name = %settings.group_name,
        listen_address = %settings.listen_address,
        version = env!("CARGO_PKG_VERSION"),
        "Starting Technitium cert-manager webhook"
    );

    let transport = Arc::new(
        HttpTransport::new(&settings.transport_settings())
            .context("Failed to build Technitium HTTP transport")?,
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default()
        .await
        .context("Failed to initialize Kubernetes client")?;
    debug!("Kubernetes client initialized successfully");

    let solver = Arc::new(TechnitiumSolver::new(transport));
    solver.initialize(Arc::new(KubeSecretStore::new(client)))?;
    info!(solver = solver.name(), "Solver initialized");

    let tls = match settings.tls_files() {
        Some((cert, key)) => Some(load_tls_config(cert, key)?),
        None => None,
    };

    let shutdown = CancellationToken::new();
    let solvers: Vec<Arc<dyn ChallengeSolver>> = vec![solver];
    let state = WebhookState::new(&settings.group_name, solvers, shutdown.clone());

    let mut server = tokio::spawn(serve(
        settings.listen_address,
        tls,
        router(state),
        shutdown.clone(),
    ));

    tokio::select! {
        result = shutdown_signal() => {
            match result {
                Ok(signal) => info!(signal, "Received shutdown signal, stopping webhook"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signals, stopping webhook"),
            }
            shutdown.cancel();
        }
        joined = &mut server => {
            error!("CRITICAL: webhook server exited unexpectedly: {:?}", joined);
            joined.context("Webhook server task failed")??;
            anyhow::bail!("Webhook server exited unexpectedly without error")
        }
    }

    server.await.context("Webhook server task failed")??;

    info!("Webhook stopped");
    Ok(())
}

/// Wait for SIGINT, or SIGTERM on Unix. Returns the signal name.
async fn shutdown_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                Ok("SIGINT")
            }
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("SIGINT")
    }
}

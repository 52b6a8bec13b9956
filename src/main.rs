// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use relational_registry::{
    api::router,
    auth::AuthConfig,
    config::{LogFormat, RegistryConfig, DEFAULT_LOG_FILTER},
    registry::{ContractHost, Registry, TokenLedger},
    state::AppState,
    storage::RegistryDatabase,
};

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() {
    let config = match RegistryConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(config.log_format);

    // Restore persisted state, or start empty.
    // Reference host with no deployed targets: forwarded calls are plain
    // value transfers from the registry address.
    let dispatcher = ContractHost::new(config.registry_address);
    let mut database = None;
    let registry = match config.database_path() {
        Some(path) => {
            let db = RegistryDatabase::open(&path).expect("Failed to open registry database");
            let snapshot = db.load().expect("Failed to load registry state");
            tracing::info!(path = %path.display(), "Using registry database");
            database = Some(db);
            snapshot.into_registry(config.relayer, dispatcher)
        }
        None => {
            tracing::warn!("DATA_DIR not set, registry state will not be persisted");
            Registry::new(config.relayer, TokenLedger::new(), dispatcher)
        }
    };

    let mut state = AppState::new(registry, AuthConfig::from_secret(&config.jwt_secret))
        .with_execute_gas_limit(config.execute_gas_limit);
    if let Some(db) = database {
        state = state.with_database(Arc::new(db));
    }
    let app = router(state);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
            }
            shutdown.cancel();
        });
    }

    let addr = config.bind_addr;
    tracing::info!(
        %addr,
        relayer = %config.relayer,
        registry = %config.registry_address,
        "Relational Registry starting (docs at /docs)"
    );

    match config.tls {
        Some(tls) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");

            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .expect("Failed to load TLS certificate and key");

            let handle = axum_server::Handle::new();
            {
                let handle = handle.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    shutdown.cancelled().await;
                    handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
                });
            }

            tracing::info!(%addr, "Serving HTTPS");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("Failed to bind address");

            tracing::info!(%addr, "Serving HTTP");
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .expect("HTTP server failed");
        }
    }

    tracing::info!("Relational Registry stopped");
}

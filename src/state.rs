// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use tokio::sync::RwLock;

use crate::auth::AuthConfig;
use crate::config::DEFAULT_EXECUTE_GAS_LIMIT;
use crate::error::ApiError;
use crate::registry::Registry;
use crate::storage::{RegistryDbError, StateStore, StoredState};

#[derive(Clone)]
pub struct AppState {
    /// Write lock held for the whole of every mutation; reads share.
    pub registry: Arc<RwLock<Registry>>,
    pub auth_config: Arc<AuthConfig>,
    pub database: Option<Arc<dyn StateStore>>,
    pub execute_gas_limit: u64,
    /// Set while the in-memory registry is ahead of the database.
    unsaved: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(registry: Registry, auth_config: AuthConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            auth_config: Arc::new(auth_config),
            database: None,
            execute_gas_limit: DEFAULT_EXECUTE_GAS_LIMIT,
            unsaved: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_database(mut self, database: Arc<dyn StateStore>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_execute_gas_limit(mut self, gas_limit: u64) -> Self {
        self.execute_gas_limit = gas_limit;
        self
    }

    /// Whether the last save failed and has not been retried successfully.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved.load(Ordering::Acquire)
    }

    /// Gate for mutations: while a previous change is unsaved, retry the
    /// save and refuse the mutation if it still fails.
    ///
    /// Nothing is applied on top of state the database does not hold.
    pub async fn ensure_writable(&self, registry: &Registry) -> Result<(), ApiError> {
        if !self.has_unsaved_changes() {
            return Ok(());
        }
        self.save(registry).await.map_err(|_| {
            ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Registry state cannot be persisted; mutations are suspended",
            )
            .with_code("persistence_unavailable")
        })
    }

    /// Write the registry to the database, if one is configured.
    ///
    /// Called with the write lock still held so snapshots land in mutation
    /// order. The caller must not acknowledge the mutation unless this
    /// succeeds.
    pub async fn persist(&self, registry: &Registry) -> Result<(), ApiError> {
        self.save(registry).await.map_err(|_| {
            ApiError::internal("Operation applied but registry state could not be persisted")
                .with_code("persistence_failed")
        })
    }

    async fn save(&self, registry: &Registry) -> Result<(), RegistryDbError> {
        let Some(database) = self.database.clone() else {
            return Ok(());
        };

        let result = match StoredState::capture(registry) {
            Ok(stored) => tokio::task::spawn_blocking(move || database.write_state(&stored))
                .await
                .unwrap_or_else(|e| Err(RegistryDbError::Task(e.to_string()))),
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => self.unsaved.store(false, Ordering::Release),
            Err(e) => {
                self.unsaved.store(true, Ordering::Release);
                tracing::error!(error = %e, "Failed to persist registry state");
            }
        }
        result
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded registry database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `services`: service name → JSON `{owner, token_ids}`
//! - `nonces`: lowercase address → decimal nonce
//! - `token_owners`: token id (0x hex) → lowercase owner address
//!
//! The token → services reverse index is not stored; it is rebuilt from
//! `services` on load.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::registry::ownership::OwnedResource;
use crate::registry::{
    CallDispatcher, NonceLedger, OwnershipLedger, Registry, RelationshipStore, ServiceName,
    TokenId, TokenLedger,
};

// =============================================================================
// Table Definitions
// =============================================================================

/// Service name → serialized [`StoredService`] (JSON bytes).
const SERVICES: TableDefinition<&str, &[u8]> = TableDefinition::new("services");

/// Lowercase address → nonce as a decimal string.
const NONCES: TableDefinition<&str, &str> = TableDefinition::new("nonces");

/// Token id hex → lowercase owner address.
const TOKEN_OWNERS: TableDefinition<&str, &str> = TableDefinition::new("token_owners");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryDbError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("corrupt record in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    #[error("storage task failed: {0}")]
    Task(String),
}

pub type RegistryDbResult<T> = Result<T, RegistryDbError>;

fn corrupt(table: &'static str, detail: impl ToString) -> RegistryDbError {
    RegistryDbError::Corrupt {
        table,
        detail: detail.to_string(),
    }
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StoredService {
    owner: String,
    token_ids: Vec<String>,
}

/// Everything needed to rebuild a [`Registry`], minus its collaborators.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub nonces: NonceLedger,
    pub relations: RelationshipStore,
    pub ledger: TokenLedger,
}

impl Snapshot {
    pub fn into_registry<D: CallDispatcher>(
        self,
        relayer: Address,
        dispatcher: D,
    ) -> Registry<TokenLedger, D> {
        Registry::from_parts(relayer, self.nonces, self.relations, self.ledger, dispatcher)
    }
}

fn address_key(address: &Address) -> String {
    address.to_string().to_lowercase()
}

/// Registry state encoded as table rows, detached from the live registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredState {
    services: Vec<(String, Vec<u8>)>,
    nonces: Vec<(String, String)>,
    token_owners: Vec<(String, String)>,
}

impl StoredState {
    /// Encode the registry's current state.
    pub fn capture<D>(registry: &Registry<TokenLedger, D>) -> RegistryDbResult<Self>
    where
        D: CallDispatcher,
    {
        let services = registry
            .relations()
            .services()
            .map(|(name, service)| {
                let record = StoredService {
                    owner: address_key(&service.owner()),
                    token_ids: service.token_ids().iter().map(|t| t.to_string()).collect(),
                };
                Ok((name.as_str().to_string(), serde_json::to_vec(&record)?))
            })
            .collect::<RegistryDbResult<Vec<_>>>()?;

        let nonces = registry
            .nonces()
            .iter()
            .map(|(identity, nonce)| (address_key(identity), nonce.to_string()))
            .collect();

        let token_owners = registry
            .ledger()
            .iter()
            .map(|(id, owner)| {
                (
                    TokenId::from(B256::from(*id)).to_string(),
                    address_key(owner),
                )
            })
            .collect();

        Ok(Self {
            services,
            nonces,
            token_owners,
        })
    }
}

/// Durable sink for registry state.
pub trait StateStore: Send + Sync {
    /// Replace everything stored with `state`.
    fn write_state(&self, state: &StoredState) -> RegistryDbResult<()>;

    /// Whether the store can currently be reached.
    fn is_available(&self) -> bool;
}

// =============================================================================
// RegistryDatabase
// =============================================================================

pub struct RegistryDatabase {
    db: Database,
}

impl RegistryDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> RegistryDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SERVICES)?;
            let _ = write_txn.open_table(NONCES)?;
            let _ = write_txn.open_table(TOKEN_OWNERS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Read the stored state back.
    pub fn load(&self) -> RegistryDbResult<Snapshot> {
        let read_txn = self.db.begin_read()?;

        let mut nonces = NonceLedger::new();
        let table = read_txn.open_table(NONCES)?;
        for entry in table.iter()? {
            let (key, value) = entry?;
            let identity = Address::from_str(key.value()).map_err(|e| corrupt("nonces", e))?;
            let nonce = U256::from_str(value.value()).map_err(|e| corrupt("nonces", e))?;
            nonces.restore(identity, nonce);
        }

        let mut ledger = TokenLedger::new();
        let table = read_txn.open_table(TOKEN_OWNERS)?;
        for entry in table.iter()? {
            let (key, value) = entry?;
            let token_id =
                TokenId::from_str(key.value()).map_err(|e| corrupt("token_owners", e))?;
            let owner =
                Address::from_str(value.value()).map_err(|e| corrupt("token_owners", e))?;
            ledger
                .mint(owner, token_id.as_u256())
                .map_err(|e| corrupt("token_owners", e))?;
        }

        let mut services = Vec::new();
        let table = read_txn.open_table(SERVICES)?;
        for entry in table.iter()? {
            let (key, value) = entry?;
            let name = ServiceName::parse(key.value()).map_err(|e| corrupt("services", e))?;
            let record: StoredService = serde_json::from_slice(value.value())?;
            let owner = Address::from_str(&record.owner).map_err(|e| corrupt("services", e))?;
            let token_ids = record
                .token_ids
                .iter()
                .map(|t| TokenId::from_str(t))
                .collect::<Result<BTreeSet<_>, _>>()
                .map_err(|e| corrupt("services", e))?;
            services.push((name, owner, token_ids));
        }
        let relations = RelationshipStore::from_services(services);

        if let Err(detail) = relations.check_consistency() {
            return Err(corrupt("services", detail));
        }

        tracing::info!(
            services = relations.services().count(),
            identities = nonces.iter().count(),
            tokens = ledger.iter().count(),
            "Registry state loaded"
        );

        Ok(Snapshot {
            nonces,
            relations,
            ledger,
        })
    }
}

impl StateStore for RegistryDatabase {
    /// Runs in a single write transaction: readers see either the old or the
    /// new state.
    fn write_state(&self, state: &StoredState) -> RegistryDbResult<()> {
        let write_txn = self.db.begin_write()?;
        write_txn.delete_table(SERVICES)?;
        write_txn.delete_table(NONCES)?;
        write_txn.delete_table(TOKEN_OWNERS)?;
        {
            let mut services = write_txn.open_table(SERVICES)?;
            for (name, json) in &state.services {
                services.insert(name.as_str(), json.as_slice())?;
            }

            let mut nonces = write_txn.open_table(NONCES)?;
            for (identity, nonce) in &state.nonces {
                nonces.insert(identity.as_str(), nonce.as_str())?;
            }

            let mut owners = write_txn.open_table(TOKEN_OWNERS)?;
            for (id, owner) in &state.token_owners {
                owners.insert(id.as_str(), owner.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.db.begin_read().is_ok()
    }
}

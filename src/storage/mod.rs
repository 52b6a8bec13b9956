// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Registry Storage
//!
//! Durable copy of the registry state in an embedded redb database under
//! `DATA_DIR`. The database is written after every mutation, before the
//! request is acknowledged, and read once at startup.
//!
//! ```text
//! $DATA_DIR/
//!   registry.redb
//! ```

pub mod database;

pub use database::{
    RegistryDatabase, RegistryDbError, RegistryDbResult, Snapshot, StateStore, StoredState,
};

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token ownership ledger.
//!
//! The registry never does asset bookkeeping itself; it calls into an
//! [`OwnershipLedger`]. [`TokenLedger`] is the in-process implementation used
//! by the server and the tests.

use std::collections::HashMap;

use alloy::primitives::{Address, U256};

/// Errors reported by an ownership ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("token {0:#x} does not exist")]
    NonexistentToken(U256),

    #[error("token {0:#x} already minted")]
    AlreadyMinted(U256),

    #[error("cannot mint to the zero address")]
    MintToZeroAddress,
}

/// Non-fungible ownership bookkeeping, addressed by numeric token id.
pub trait OwnershipLedger {
    fn mint(&mut self, to: Address, id: U256) -> Result<(), LedgerError>;

    fn burn(&mut self, id: U256) -> Result<(), LedgerError>;

    fn owner_of(&self, id: U256) -> Result<Address, LedgerError>;

    fn exists(&self, id: U256) -> bool;
}

/// In-memory ledger: token id → owner.
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    owners: HashMap<U256, Address>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&U256, &Address)> {
        self.owners.iter()
    }
}

impl OwnershipLedger for TokenLedger {
    fn mint(&mut self, to: Address, id: U256) -> Result<(), LedgerError> {
        if to == Address::ZERO {
            return Err(LedgerError::MintToZeroAddress);
        }
        if self.owners.contains_key(&id) {
            return Err(LedgerError::AlreadyMinted(id));
        }
        self.owners.insert(id, to);
        Ok(())
    }

    fn burn(&mut self, id: U256) -> Result<(), LedgerError> {
        self.owners
            .remove(&id)
            .map(|_| ())
            .ok_or(LedgerError::NonexistentToken(id))
    }

    fn owner_of(&self, id: U256) -> Result<Address, LedgerError> {
        self.owners
            .get(&id)
            .copied()
            .ok_or(LedgerError::NonexistentToken(id))
    }

    fn exists(&self, id: U256) -> bool {
        self.owners.contains_key(&id)
    }
}

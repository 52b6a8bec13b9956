// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-identity replay counters.

use std::collections::HashMap;

use alloy::primitives::{Address, U256};

/// One monotonically increasing counter per authorizing identity.
///
/// Counters start at zero and only move through [`NonceLedger::advance`],
/// which the signature verifier calls after a successful check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NonceLedger {
    nonces: HashMap<Address, U256>,
}

impl NonceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nonce of `identity` (zero if never used).
    pub fn current(&self, identity: &Address) -> U256 {
        self.nonces.get(identity).copied().unwrap_or(U256::ZERO)
    }

    /// Increment the nonce of `identity` by exactly one.
    pub(crate) fn advance(&mut self, identity: Address) -> U256 {
        let entry = self.nonces.entry(identity).or_insert(U256::ZERO);
        // A 256-bit counter cannot be exhausted by one-per-operation use.
        *entry = entry.saturating_add(U256::from(1u64));
        *entry
    }

    /// Iterate all identities with a non-zero nonce.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &U256)> {
        self.nonces.iter()
    }

    /// Restore a persisted counter.
    pub(crate) fn restore(&mut self, identity: Address, nonce: U256) {
        if !nonce.is_zero() {
            self.nonces.insert(identity, nonce);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_identity_starts_at_zero() {
        let ledger = NonceLedger::new();
        assert_eq!(ledger.current(&Address::repeat_byte(0x11)), U256::ZERO);
    }

    #[test]
    fn advance_increments_by_one_per_identity() {
        let mut ledger = NonceLedger::new();
        let a = Address::repeat_byte(0x11);
        let b = Address::repeat_byte(0x22);

        assert_eq!(ledger.advance(a), U256::from(1u64));
        assert_eq!(ledger.advance(a), U256::from(2u64));
        assert_eq!(ledger.advance(b), U256::from(1u64));

        assert_eq!(ledger.current(&a), U256::from(2u64));
        assert_eq!(ledger.current(&b), U256::from(1u64));
    }

    #[test]
    fn restore_skips_zero() {
        let mut ledger = NonceLedger::new();
        ledger.restore(Address::repeat_byte(0x11), U256::ZERO);
        ledger.restore(Address::repeat_byte(0x22), U256::from(7u64));
        assert_eq!(ledger.iter().count(), 1);
        assert_eq!(ledger.current(&Address::repeat_byte(0x22)), U256::from(7u64));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for registry resources.
//!
//! Every mutation that touches a service or a token checks the recovered
//! signer against the stored owner through these traits.

use alloy::primitives::Address;

use super::error::PermissionError;

/// Trait for resources that have an owning identity.
pub trait OwnedResource {
    fn owner(&self) -> Address;
}

/// Trait for enforcing ownership before a mutation.
pub trait OwnershipEnforcer {
    /// Verify that `signer` owns this resource.
    ///
    /// # Errors
    /// Returns `PermissionError::Unauthorized` otherwise. The zero address
    /// never owns anything.
    fn verify_ownership(&self, signer: Address) -> Result<(), PermissionError>;
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(&self, signer: Address) -> Result<(), PermissionError> {
        let owner = self.owner();
        if owner != Address::ZERO && owner == signer {
            Ok(())
        } else {
            Err(PermissionError::Unauthorized { signer })
        }
    }
}

/// A bare owner field, for resources looked up outside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerRecord {
    pub owner: Address,
}

impl OwnedResource for OwnerRecord {
    fn owner(&self) -> Address {
        self.owner
    }
}

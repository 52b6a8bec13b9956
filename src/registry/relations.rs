// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service ↔ token relationship store.
//!
//! Two set-valued indices are kept in lockstep:
//!
//! - `services`: service name → [`Service`] (owner + token ids)
//! - `uses`: token id → names of the services using it
//!
//! Invariant: `name ∈ uses[t] ⟺ t ∈ services[name].token_ids`. The only
//! writers of both sides are [`RelationshipStore::link`],
//! [`RelationshipStore::unlink`] and the two cascades, and each of them checks
//! everything it needs before writing anything.

use std::collections::{BTreeMap, BTreeSet};

use alloy::primitives::Address;

use super::error::{ConflictError, NotFoundError, RegistryError};
use super::ownership::OwnedResource;
use super::types::{ServiceName, TokenId};

/// A named service and the tokens it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    owner: Address,
    token_ids: BTreeSet<TokenId>,
}

impl Service {
    pub fn token_ids(&self) -> &BTreeSet<TokenId> {
        &self.token_ids
    }

    pub fn uses(&self, token_id: &TokenId) -> bool {
        self.token_ids.contains(token_id)
    }
}

impl OwnedResource for Service {
    fn owner(&self) -> Address {
        self.owner
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipStore {
    services: BTreeMap<ServiceName, Service>,
    uses: BTreeMap<TokenId, BTreeSet<ServiceName>>,
}

impl RelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(&self, name: &ServiceName) -> Option<&Service> {
        self.services.get(name)
    }

    /// Look up a service or fail with `ServiceNotFound`.
    pub fn require_service(&self, name: &ServiceName) -> Result<&Service, NotFoundError> {
        self.services
            .get(name)
            .ok_or_else(|| NotFoundError::ServiceNotFound(name.clone()))
    }

    /// Owner of `name`, or the zero address if it does not exist.
    pub fn owner_of(&self, name: &ServiceName) -> Address {
        self.services
            .get(name)
            .map(|service| service.owner)
            .unwrap_or(Address::ZERO)
    }

    pub fn services(&self) -> impl Iterator<Item = (&ServiceName, &Service)> {
        self.services.iter()
    }

    /// Names of the services currently using `token_id`.
    pub fn services_using(&self, token_id: &TokenId) -> BTreeSet<ServiceName> {
        self.uses.get(token_id).cloned().unwrap_or_default()
    }

    pub fn is_used(&self, token_id: &TokenId, name: &ServiceName) -> bool {
        self.uses
            .get(token_id)
            .is_some_and(|names| names.contains(name))
    }

    // =========================================================================
    // Service lifecycle
    // =========================================================================

    /// Create an empty service owned by `owner`.
    pub(crate) fn create_service(
        &mut self,
        name: ServiceName,
        owner: Address,
    ) -> Result<(), ConflictError> {
        if self.services.contains_key(&name) {
            return Err(ConflictError::AlreadyExists(name));
        }
        self.services.insert(
            name,
            Service {
                owner,
                token_ids: BTreeSet::new(),
            },
        );
        Ok(())
    }

    /// Delete a service and drop its name from every token's reverse set.
    pub(crate) fn remove_service(&mut self, name: &ServiceName) -> Option<Service> {
        let service = self.services.remove(name)?;
        for token_id in &service.token_ids {
            self.drop_reverse(token_id, name);
        }
        Some(service)
    }

    // =========================================================================
    // Paired index updates
    // =========================================================================

    /// Pre-flight for [`link`](Self::link).
    pub fn check_link(&self, token_id: &TokenId, name: &ServiceName) -> Result<(), RegistryError> {
        let service = self.require_service(name)?;
        if service.uses(token_id) {
            return Err(ConflictError::AlreadyUsed {
                token_id: *token_id,
                service: name.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Pre-flight for [`unlink`](Self::unlink).
    pub fn check_unlink(
        &self,
        token_id: &TokenId,
        name: &ServiceName,
    ) -> Result<(), RegistryError> {
        let service = self.require_service(name)?;
        if !service.uses(token_id) {
            return Err(ConflictError::NotUsed {
                token_id: *token_id,
                service: name.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Record that service `name` uses `token_id`, on both sides.
    pub(crate) fn link(
        &mut self,
        token_id: TokenId,
        name: &ServiceName,
    ) -> Result<(), RegistryError> {
        self.check_link(&token_id, name)?;
        if let Some(service) = self.services.get_mut(name) {
            service.token_ids.insert(token_id);
        }
        self.uses.entry(token_id).or_default().insert(name.clone());
        Ok(())
    }

    /// Remove the relation between `token_id` and `name`, on both sides.
    pub(crate) fn unlink(
        &mut self,
        token_id: TokenId,
        name: &ServiceName,
    ) -> Result<(), RegistryError> {
        self.check_unlink(&token_id, name)?;
        if let Some(service) = self.services.get_mut(name) {
            service.token_ids.remove(&token_id);
        }
        self.drop_reverse(&token_id, name);
        Ok(())
    }

    /// Remove `token_id` from every service using it and clear its reverse set.
    ///
    /// Returns the names the token was detached from.
    pub(crate) fn purge_token(&mut self, token_id: &TokenId) -> BTreeSet<ServiceName> {
        let names = self.uses.remove(token_id).unwrap_or_default();
        for name in &names {
            if let Some(service) = self.services.get_mut(name) {
                service.token_ids.remove(token_id);
            }
        }
        names
    }

    fn drop_reverse(&mut self, token_id: &TokenId, name: &ServiceName) {
        if let Some(names) = self.uses.get_mut(token_id) {
            names.remove(name);
            if names.is_empty() {
                self.uses.remove(token_id);
            }
        }
    }

    // =========================================================================
    // Restore / consistency
    // =========================================================================

    /// Rebuild a store from persisted services; the reverse index is derived.
    pub(crate) fn from_services(
        services: impl IntoIterator<Item = (ServiceName, Address, BTreeSet<TokenId>)>,
    ) -> Self {
        let mut store = Self::new();
        for (name, owner, token_ids) in services {
            for token_id in &token_ids {
                store.uses.entry(*token_id).or_default().insert(name.clone());
            }
            store.services.insert(name, Service { owner, token_ids });
        }
        store
    }

    /// Check the bidirectional invariant and service existence rules.
    pub fn check_consistency(&self) -> Result<(), String> {
        for (name, service) in &self.services {
            if service.owner == Address::ZERO {
                return Err(format!("service {name} has no owner"));
            }
            for token_id in &service.token_ids {
                if !self.is_used(token_id, name) {
                    return Err(format!(
                        "service {name} lists token {token_id} but the reverse index does not"
                    ));
                }
            }
        }
        for (token_id, names) in &self.uses {
            if names.is_empty() {
                return Err(format!("token {token_id} has an empty reverse set"));
            }
            for name in names {
                let listed = self
                    .services
                    .get(name)
                    .is_some_and(|service| service.uses(token_id));
                if !listed {
                    return Err(format!(
                        "reverse index maps token {token_id} to {name} but the service does not"
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::error::NotFoundError;

    fn name(s: &str) -> ServiceName {
        ServiceName::parse(s).unwrap()
    }

    fn token(byte: u8) -> TokenId {
        TokenId::from([byte; 32])
    }

    fn owner() -> Address {
        Address::repeat_byte(0x11)
    }

    #[test]
    fn create_service_rejects_duplicates() {
        let mut store = RelationshipStore::new();
        store.create_service(name("svc"), owner()).unwrap();

        let err = store.create_service(name("svc"), owner()).unwrap_err();
        assert_eq!(err, ConflictError::AlreadyExists(name("svc")));
        assert_eq!(store.owner_of(&name("svc")), owner());
        assert_eq!(store.owner_of(&name("other")), Address::ZERO);
    }

    #[test]
    fn link_updates_both_sides() {
        let mut store = RelationshipStore::new();
        store.create_service(name("svc"), owner()).unwrap();
        store.link(token(0xaa), &name("svc")).unwrap();

        assert!(store.service(&name("svc")).unwrap().uses(&token(0xaa)));
        assert_eq!(
            store.services_using(&token(0xaa)),
            BTreeSet::from([name("svc")])
        );
        store.check_consistency().unwrap();
    }

    #[test]
    fn link_twice_fails_with_already_used() {
        let mut store = RelationshipStore::new();
        store.create_service(name("svc"), owner()).unwrap();
        store.link(token(0xaa), &name("svc")).unwrap();

        let err = store.link(token(0xaa), &name("svc")).unwrap_err();
        assert_eq!(err.error_code(), "already_used");
        store.check_consistency().unwrap();
    }

    #[test]
    fn link_to_missing_service_writes_nothing() {
        let mut store = RelationshipStore::new();
        let err = store.link(token(0xaa), &name("ghost")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::NotFound(NotFoundError::ServiceNotFound(name("ghost")))
        );
        assert!(store.services_using(&token(0xaa)).is_empty());
    }

    #[test]
    fn unlink_missing_relation_fails_with_not_used() {
        let mut store = RelationshipStore::new();
        store.create_service(name("svc"), owner()).unwrap();

        let err = store.unlink(token(0xaa), &name("svc")).unwrap_err();
        assert_eq!(err.error_code(), "not_used");
    }

    #[test]
    fn unlink_clears_both_sides() {
        let mut store = RelationshipStore::new();
        store.create_service(name("a"), owner()).unwrap();
        store.create_service(name("b"), owner()).unwrap();
        store.link(token(0xaa), &name("a")).unwrap();
        store.link(token(0xaa), &name("b")).unwrap();

        store.unlink(token(0xaa), &name("a")).unwrap();
        assert_eq!(
            store.services_using(&token(0xaa)),
            BTreeSet::from([name("b")])
        );
        assert!(!store.service(&name("a")).unwrap().uses(&token(0xaa)));
        store.check_consistency().unwrap();
    }

    #[test]
    fn remove_service_cascades_to_reverse_index() {
        let mut store = RelationshipStore::new();
        store.create_service(name("svc"), owner()).unwrap();
        store.create_service(name("keep"), owner()).unwrap();
        for byte in 1..=5 {
            store.link(token(byte), &name("svc")).unwrap();
        }
        store.link(token(1), &name("keep")).unwrap();

        let removed = store.remove_service(&name("svc")).unwrap();
        assert_eq!(removed.token_ids().len(), 5);
        assert!(store.service(&name("svc")).is_none());

        for byte in 1..=5 {
            assert!(!store.is_used(&token(byte), &name("svc")));
        }
        assert_eq!(store.services_using(&token(1)), BTreeSet::from([name("keep")]));
        store.check_consistency().unwrap();
    }

    #[test]
    fn purge_token_cascades_to_services() {
        let mut store = RelationshipStore::new();
        for svc in ["a", "b", "c"] {
            store.create_service(name(svc), owner()).unwrap();
            store.link(token(0xaa), &name(svc)).unwrap();
        }
        store.link(token(0xbb), &name("a")).unwrap();

        let detached = store.purge_token(&token(0xaa));
        assert_eq!(detached.len(), 3);
        for svc in ["a", "b", "c"] {
            assert!(!store.service(&name(svc)).unwrap().uses(&token(0xaa)));
        }
        assert!(store.service(&name("a")).unwrap().uses(&token(0xbb)));
        store.check_consistency().unwrap();
    }

    #[test]
    fn from_services_rebuilds_reverse_index() {
        let store = RelationshipStore::from_services([
            (name("a"), owner(), BTreeSet::from([token(1), token(2)])),
            (name("b"), owner(), BTreeSet::from([token(2)])),
        ]);
        assert_eq!(
            store.services_using(&token(2)),
            BTreeSet::from([name("a"), name("b")])
        );
        store.check_consistency().unwrap();
    }
}

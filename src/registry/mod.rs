// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Registry Engine
//!
//! Binds content-addressed tokens to named services. Every mutation is
//! submitted by the relayer on behalf of an authorizing identity, which proves
//! itself with a detached signature over the operation's canonical message.
//!
//! ## Call Pipeline
//!
//! 1. caller must be the relayer (`NotRelayer`)
//! 2. cheap boundary checks: name length, operation code, recipient
//! 3. signature authorization at the signer's current nonce
//! 4. existence / ownership / relation checks
//! 5. effect (index update, ledger mint/burn, forwarded call)
//! 6. nonce consumption and event emission
//!
//! Nothing is written before step 5, so a failure anywhere leaves the
//! registry exactly as it was, nonce included.
//!
//! ## Modules
//!
//! - `message` - canonical message construction
//! - `signature` - signer recovery and nonce consumption
//! - `nonce` - per-identity replay counters
//! - `relations` - service ↔ token indices
//! - `ledger` - token ownership ledger interface
//! - `dispatch` - external call forwarding
//! - `events` - watcher-facing events

pub mod dispatch;
pub mod error;
pub mod events;
pub mod ledger;
pub mod message;
pub mod nonce;
pub mod ownership;
pub mod relations;
pub mod signature;
pub mod types;

use std::collections::BTreeSet;

use alloy::primitives::{Address, Bytes, B256, U256};

pub use dispatch::{CallDispatcher, ContractHost, EXECUTE_GAS_RESERVE};
pub use error::{
    AuthError, ConflictError, NotFoundError, PermissionError, RegistryError, RegistryResult,
    ValidationError,
};
pub use events::{EventLog, EventRecord, RegistryEvent};
pub use ledger::{LedgerError, OwnershipLedger, TokenLedger};
pub use nonce::NonceLedger;
pub use relations::{RelationshipStore, Service};
pub use types::{Operation, ServiceName, TokenId};

use dispatch::CalleeFailure;
use ownership::{OwnerRecord, OwnershipEnforcer};
use signature::authorize;

/// Detached signature and the identity it claims to come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signed {
    pub signer: Address,
    pub signature: Bytes,
}

impl Signed {
    pub fn new(signer: Address, signature: impl Into<Bytes>) -> Self {
        Self {
            signer,
            signature: signature.into(),
        }
    }
}

/// Arguments of `execute`, all covered by the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteCall {
    pub operation: U256,
    pub target: Address,
    pub value: U256,
    pub data: Bytes,
    pub service_name: String,
}

impl From<LedgerError> for RegistryError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NonexistentToken(id) => {
                NotFoundError::TokenNotFound(token_from_ledger_id(id)).into()
            }
            LedgerError::AlreadyMinted(id) => {
                ConflictError::TokenAlreadyExists(token_from_ledger_id(id)).into()
            }
            LedgerError::MintToZeroAddress => ValidationError::ZeroAddress.into(),
        }
    }
}

fn token_from_ledger_id(id: U256) -> TokenId {
    TokenId(B256::from(id.to_be_bytes::<32>()))
}

/// The registry: nonces, relationship indices, and the injected collaborators.
pub struct Registry<L = TokenLedger, D = ContractHost> {
    relayer: Address,
    nonces: NonceLedger,
    relations: RelationshipStore,
    ledger: L,
    dispatcher: D,
    events: EventLog,
}

impl<L, D> Registry<L, D>
where
    L: OwnershipLedger,
    D: CallDispatcher,
{
    /// Create an empty registry that accepts operations from `relayer` only.
    pub fn new(relayer: Address, ledger: L, dispatcher: D) -> Self {
        Self::from_parts(
            relayer,
            NonceLedger::new(),
            RelationshipStore::new(),
            ledger,
            dispatcher,
        )
    }

    /// Assemble a registry from previously persisted state.
    pub fn from_parts(
        relayer: Address,
        nonces: NonceLedger,
        relations: RelationshipStore,
        ledger: L,
        dispatcher: D,
    ) -> Self {
        Self {
            relayer,
            nonces,
            relations,
            ledger,
            dispatcher,
            events: EventLog::default(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn relayer(&self) -> Address {
        self.relayer
    }

    /// Current nonce of `identity`; the next signature must be built on it.
    pub fn nonce(&self, identity: &Address) -> U256 {
        self.nonces.current(identity)
    }

    pub fn nonces(&self) -> &NonceLedger {
        &self.nonces
    }

    pub fn service(&self, name: &ServiceName) -> Option<&Service> {
        self.relations.service(name)
    }

    pub fn services_using(&self, token_id: &TokenId) -> BTreeSet<ServiceName> {
        self.relations.services_using(token_id)
    }

    pub fn relations(&self) -> &RelationshipStore {
        &self.relations
    }

    /// Current owner of `token_id` according to the ledger.
    pub fn token_owner(&self, token_id: &TokenId) -> Option<Address> {
        self.ledger.owner_of(token_id.as_u256()).ok()
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// Create service `name` owned by the signer.
    pub fn register_service(
        &mut self,
        caller: Address,
        name: &str,
        signed: &Signed,
    ) -> RegistryResult<()> {
        self.ensure_relayer(caller)?;
        let name = ServiceName::parse(name)?;
        let auth = authorize(
            &self.nonces,
            &message::register_service(&name),
            &signed.signature,
            signed.signer,
        )?;

        let owner = auth.signer();
        self.relations.create_service(name.clone(), owner)?;
        self.nonces.consume(auth);

        tracing::info!(service = %name, %owner, "service registered");
        self.events
            .emit(RegistryEvent::ServiceRegistered { name, owner });
        Ok(())
    }

    /// Delete service `name` and detach it from every token it uses.
    pub fn unregister_service(
        &mut self,
        caller: Address,
        name: &str,
        signed: &Signed,
    ) -> RegistryResult<()> {
        self.ensure_relayer(caller)?;
        let name = ServiceName::parse(name)?;
        let auth = authorize(
            &self.nonces,
            &message::unregister_service(&name),
            &signed.signature,
            signed.signer,
        )?;

        self.relations
            .require_service(&name)?
            .verify_ownership(auth.signer())?;

        let owner = auth.signer();
        let removed = self.relations.remove_service(&name);
        self.nonces.consume(auth);

        let detached = removed.map(|s| s.token_ids().clone()).unwrap_or_default();
        tracing::info!(service = %name, %owner, detached = detached.len(), "service unregistered");
        for token_id in detached {
            self.events.emit(RegistryEvent::TokenUnused {
                token_id,
                service_name: name.clone(),
            });
        }
        self.events
            .emit(RegistryEvent::ServiceUnregistered { name, owner });
        Ok(())
    }

    // =========================================================================
    // Token lifecycle
    // =========================================================================

    /// Mint `token_id` to `to`.
    pub fn register_token(
        &mut self,
        caller: Address,
        to: Address,
        token_id: TokenId,
        signed: &Signed,
    ) -> RegistryResult<()> {
        self.ensure_relayer(caller)?;
        ensure_recipient(to)?;
        let auth = authorize(
            &self.nonces,
            &message::register_token(to, token_id),
            &signed.signature,
            signed.signer,
        )?;

        self.ensure_unminted(&token_id)?;
        self.ledger.mint(to, token_id.as_u256())?;
        self.nonces.consume(auth);

        tracing::info!(%token_id, %to, "token registered");
        self.events.emit(RegistryEvent::TokenMinted { token_id, to });
        Ok(())
    }

    /// Mint `token_id` to `to` and mark it used by `service_name`.
    ///
    /// The signer need not be `to`; neither needs to own the service. The
    /// link is part of the mint the signer authorized, not a later
    /// `use_token` by the token owner.
    pub fn register_token_with_service(
        &mut self,
        caller: Address,
        to: Address,
        token_id: TokenId,
        service_name: &str,
        signed: &Signed,
    ) -> RegistryResult<()> {
        self.ensure_relayer(caller)?;
        let service_name = ServiceName::parse(service_name)?;
        ensure_recipient(to)?;
        let auth = authorize(
            &self.nonces,
            &message::register_token_with_service(to, token_id, &service_name),
            &signed.signature,
            signed.signer,
        )?;

        self.relations.require_service(&service_name)?;
        self.ensure_unminted(&token_id)?;
        self.relations.check_link(&token_id, &service_name)?;

        self.ledger.mint(to, token_id.as_u256())?;
        self.relations.link(token_id, &service_name)?;
        self.nonces.consume(auth);

        tracing::info!(%token_id, %to, service = %service_name, "token registered with service");
        self.events.emit(RegistryEvent::TokenMinted { token_id, to });
        self.events.emit(RegistryEvent::TokenUsed {
            token_id,
            service_name,
        });
        Ok(())
    }

    /// Burn `token_id` and detach it from every service using it.
    pub fn unregister_token(
        &mut self,
        caller: Address,
        token_id: TokenId,
        signed: &Signed,
    ) -> RegistryResult<()> {
        self.ensure_relayer(caller)?;
        let auth = authorize(
            &self.nonces,
            &message::unregister_token(token_id),
            &signed.signature,
            signed.signer,
        )?;

        let owner = self.ledger.owner_of(token_id.as_u256())?;
        OwnerRecord { owner }.verify_ownership(auth.signer())?;

        self.ledger.burn(token_id.as_u256())?;
        let detached = self.relations.purge_token(&token_id);
        self.nonces.consume(auth);

        tracing::info!(%token_id, %owner, detached = detached.len(), "token unregistered");
        for service_name in detached {
            self.events.emit(RegistryEvent::TokenUnused {
                token_id,
                service_name,
            });
        }
        self.events
            .emit(RegistryEvent::TokenBurned { token_id, owner });
        Ok(())
    }

    // =========================================================================
    // Token ↔ service relation
    // =========================================================================

    /// Mark `token_id` as used by `service_name`. The signer must own the token.
    pub fn use_token(
        &mut self,
        caller: Address,
        token_id: TokenId,
        service_name: &str,
        signed: &Signed,
    ) -> RegistryResult<()> {
        self.ensure_relayer(caller)?;
        let service_name = ServiceName::parse(service_name)?;
        let auth = authorize(
            &self.nonces,
            &message::use_token(token_id, &service_name),
            &signed.signature,
            signed.signer,
        )?;

        self.ensure_token_access(&token_id, &service_name, auth.signer())?;
        self.relations.link(token_id, &service_name)?;
        self.nonces.consume(auth);

        tracing::info!(%token_id, service = %service_name, "token used");
        self.events.emit(RegistryEvent::TokenUsed {
            token_id,
            service_name,
        });
        Ok(())
    }

    /// Remove the relation between `token_id` and `service_name`.
    pub fn unuse_token(
        &mut self,
        caller: Address,
        token_id: TokenId,
        service_name: &str,
        signed: &Signed,
    ) -> RegistryResult<()> {
        self.ensure_relayer(caller)?;
        let service_name = ServiceName::parse(service_name)?;
        let auth = authorize(
            &self.nonces,
            &message::unuse_token(token_id, &service_name),
            &signed.signature,
            signed.signer,
        )?;

        self.ensure_token_access(&token_id, &service_name, auth.signer())?;
        self.relations.unlink(token_id, &service_name)?;
        self.nonces.consume(auth);

        tracing::info!(%token_id, service = %service_name, "token unused");
        self.events.emit(RegistryEvent::TokenUnused {
            token_id,
            service_name,
        });
        Ok(())
    }

    // =========================================================================
    // Dispatcher
    // =========================================================================

    /// Forward a plain call on behalf of the owner of `call.service_name`.
    ///
    /// `gas_limit` is the budget of the whole request; the callee gets it
    /// minus [`EXECUTE_GAS_RESERVE`]. The callee's output is returned as is,
    /// and its failure payload surfaces as [`RegistryError::CalleeFailure`].
    pub fn execute(
        &mut self,
        caller: Address,
        call: &ExecuteCall,
        gas_limit: u64,
        signed: &Signed,
    ) -> RegistryResult<Bytes> {
        self.ensure_relayer(caller)?;
        let service_name = ServiceName::parse(call.service_name.as_str())?;
        if Operation::from_code(call.operation) != Some(Operation::Call) {
            return Err(ValidationError::UnsupportedOperation(call.operation.to_string()).into());
        }

        let auth = authorize(
            &self.nonces,
            &message::execute(
                call.operation,
                call.target,
                call.value,
                &call.data,
                &service_name,
            ),
            &signed.signature,
            signed.signer,
        )?;

        // A missing service has the zero owner and fails here too.
        OwnerRecord {
            owner: self.relations.owner_of(&service_name),
        }
        .verify_ownership(auth.signer())?;

        let budget = gas_limit.saturating_sub(EXECUTE_GAS_RESERVE);
        let output = self
            .dispatcher
            .dispatch(call.target, call.value, &call.data, budget)
            .map_err(|CalleeFailure(payload)| {
                tracing::warn!(
                    service = %service_name,
                    target = %call.target,
                    payload_len = payload.len(),
                    "forwarded call failed"
                );
                RegistryError::CalleeFailure(payload)
            })?;
        self.nonces.consume(auth);

        tracing::info!(service = %service_name, target = %call.target, value = %call.value, "call executed");
        self.events.emit(RegistryEvent::Executed {
            service_name,
            target: call.target,
            value: call.value,
        });
        Ok(output)
    }

    // =========================================================================
    // Guards
    // =========================================================================

    fn ensure_relayer(&self, caller: Address) -> Result<(), PermissionError> {
        if caller == self.relayer {
            Ok(())
        } else {
            tracing::warn!(%caller, "rejected call from non-relayer");
            Err(PermissionError::NotRelayer(caller))
        }
    }

    fn ensure_unminted(&self, token_id: &TokenId) -> Result<(), ConflictError> {
        if self.ledger.exists(token_id.as_u256()) {
            Err(ConflictError::TokenAlreadyExists(*token_id))
        } else {
            Ok(())
        }
    }

    /// Service exists, token exists, and `signer` owns the token.
    fn ensure_token_access(
        &self,
        token_id: &TokenId,
        service_name: &ServiceName,
        signer: Address,
    ) -> RegistryResult<()> {
        self.relations.require_service(service_name)?;
        if !self.ledger.exists(token_id.as_u256()) {
            return Err(NotFoundError::TokenNotFound(*token_id).into());
        }
        let owner = self.ledger.owner_of(token_id.as_u256())?;
        OwnerRecord { owner }.verify_ownership(signer)?;
        Ok(())
    }
}

fn ensure_recipient(to: Address) -> Result<(), ValidationError> {
    if to == Address::ZERO {
        Err(ValidationError::ZeroAddress)
    } else {
        Ok(())
    }
}

impl<L, D> std::fmt::Debug for Registry<L, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("relayer", &self.relayer)
            .field("services", &self.relations.services().count())
            .field("events", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloy::signers::local::PrivateKeySigner;

    use super::dispatch::{CallContext, CallOutcome, GasMeter};
    use super::signature::test_support::{sign, signer, to_high_s};
    use super::*;

    struct Harness {
        registry: Registry,
        relayer: Address,
        alice: PrivateKeySigner,
        bob: PrivateKeySigner,
    }

    impl Harness {
        fn new() -> Self {
            let relayer = Address::repeat_byte(0xee);
            Self {
                registry: Registry::new(relayer, TokenLedger::new(), ContractHost::new(relayer)),
                relayer,
                alice: signer(0x11),
                bob: signer(0x22),
            }
        }

        fn signed(&self, who: &PrivateKeySigner, payload: &message::MessageBuilder) -> Signed {
            let nonce = self.registry.nonce(&who.address());
            Signed::new(who.address(), sign(who, nonce, payload))
        }

        fn register_service(&mut self, who: &PrivateKeySigner, name: &str) -> RegistryResult<()> {
            let signed = self.signed(who, &message::register_service(&svc(name)));
            self.registry.register_service(self.relayer, name, &signed)
        }

        fn unregister_service(&mut self, who: &PrivateKeySigner, name: &str) -> RegistryResult<()> {
            let signed = self.signed(who, &message::unregister_service(&svc(name)));
            self.registry.unregister_service(self.relayer, name, &signed)
        }

        fn register_token(&mut self, who: &PrivateKeySigner, to: Address, id: TokenId) -> RegistryResult<()> {
            let signed = self.signed(who, &message::register_token(to, id));
            self.registry.register_token(self.relayer, to, id, &signed)
        }

        fn register_token_with_service(
            &mut self,
            who: &PrivateKeySigner,
            to: Address,
            id: TokenId,
            name: &str,
        ) -> RegistryResult<()> {
            let signed = self.signed(
                who,
                &message::register_token_with_service(to, id, &svc(name)),
            );
            self.registry
                .register_token_with_service(self.relayer, to, id, name, &signed)
        }

        fn unregister_token(&mut self, who: &PrivateKeySigner, id: TokenId) -> RegistryResult<()> {
            let signed = self.signed(who, &message::unregister_token(id));
            self.registry.unregister_token(self.relayer, id, &signed)
        }

        fn use_token(&mut self, who: &PrivateKeySigner, id: TokenId, name: &str) -> RegistryResult<()> {
            let signed = self.signed(who, &message::use_token(id, &svc(name)));
            self.registry.use_token(self.relayer, id, name, &signed)
        }

        fn unuse_token(&mut self, who: &PrivateKeySigner, id: TokenId, name: &str) -> RegistryResult<()> {
            let signed = self.signed(who, &message::unuse_token(id, &svc(name)));
            self.registry.unuse_token(self.relayer, id, name, &signed)
        }

        fn execute(&mut self, who: &PrivateKeySigner, call: &ExecuteCall) -> RegistryResult<Bytes> {
            let payload = message::execute(
                call.operation,
                call.target,
                call.value,
                &call.data,
                &svc(&call.service_name),
            );
            let signed = self.signed(who, &payload);
            self.registry
                .execute(self.relayer, call, 1_000_000, &signed)
        }

        fn assert_consistent(&self) {
            self.registry.relations().check_consistency().unwrap();
        }
    }

    fn svc(name: &str) -> ServiceName {
        ServiceName::parse(name).unwrap()
    }

    fn token(byte: u8) -> TokenId {
        TokenId::from([byte; 32])
    }

    fn call(service_name: &str, target: Address) -> ExecuteCall {
        ExecuteCall {
            operation: U256::ZERO,
            target,
            value: U256::from(1u64),
            data: Bytes::from_static(b"ping"),
            service_name: service_name.to_string(),
        }
    }

    #[test]
    fn register_service_then_token_bundled_then_unregister_service() {
        let mut h = Harness::new();
        let alice = h.alice.clone();

        h.register_service(&alice, "svc1").unwrap();
        h.register_token_with_service(&alice, alice.address(), token(0xaa), "svc1")
            .unwrap();

        assert_eq!(
            h.registry.services_using(&token(0xaa)),
            BTreeSet::from([svc("svc1")])
        );
        assert_eq!(
            h.registry.service(&svc("svc1")).unwrap().token_ids(),
            &BTreeSet::from([token(0xaa)])
        );
        assert_eq!(h.registry.token_owner(&token(0xaa)), Some(alice.address()));

        h.unregister_service(&alice, "svc1").unwrap();
        assert!(h.registry.services_using(&token(0xaa)).is_empty());
        assert!(h.registry.service(&svc("svc1")).is_none());
        // The token itself survives the service.
        assert_eq!(h.registry.token_owner(&token(0xaa)), Some(alice.address()));
        h.assert_consistent();
    }

    #[test]
    fn each_success_advances_nonce_by_one() {
        let mut h = Harness::new();
        let alice = h.alice.clone();

        h.register_service(&alice, "svc").unwrap();
        h.register_token(&alice, alice.address(), token(1)).unwrap();
        h.use_token(&alice, token(1), "svc").unwrap();

        assert_eq!(h.registry.nonce(&alice.address()), U256::from(3u64));
        assert_eq!(h.registry.nonce(&h.bob.address()), U256::ZERO);
    }

    #[test]
    fn replayed_signature_is_rejected() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        let signed = h.signed(&alice, &message::register_service(&svc("svc")));

        h.registry
            .register_service(h.relayer, "svc", &signed)
            .unwrap();
        h.unregister_service(&alice, "svc").unwrap();

        let err = h
            .registry
            .register_service(h.relayer, "svc", &signed)
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_signer");
        assert!(h.registry.service(&svc("svc")).is_none());
    }

    #[test]
    fn high_s_signature_authorizes_like_low_s() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        let low = h.signed(&alice, &message::register_service(&svc("svc")));
        let high = Signed::new(alice.address(), to_high_s(&low.signature));

        h.registry
            .register_service(h.relayer, "svc", &high)
            .unwrap();
        assert_eq!(
            h.registry.service(&svc("svc")).map(|s| s.token_ids().len()),
            Some(0)
        );
        // Same message, other encoding: already spent.
        assert!(h
            .registry
            .register_service(h.relayer, "other", &low)
            .is_err());
    }

    #[test]
    fn signature_is_bound_to_its_arguments() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        let signed = h.signed(&alice, &message::register_service(&svc("svc1")));

        let err = h
            .registry
            .register_service(h.relayer, "svc2", &signed)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Auth(AuthError::InvalidSigner { .. })));
        assert_eq!(h.registry.nonce(&alice.address()), U256::ZERO);
    }

    #[test]
    fn non_relayer_is_rejected_before_signature_check() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        let signed = h.signed(&alice, &message::register_service(&svc("svc")));

        let err = h
            .registry
            .register_service(alice.address(), "svc", &signed)
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::Permission(PermissionError::NotRelayer(alice.address()))
        );
        assert_eq!(h.registry.nonce(&alice.address()), U256::ZERO);
    }

    #[test]
    fn long_name_is_rejected_before_signature_check() {
        let mut h = Harness::new();
        let garbage = Signed::new(h.alice.address(), vec![0u8; 3]);
        let name = "x".repeat(33);

        let err = h
            .registry
            .register_service(h.relayer, &name, &garbage)
            .unwrap_err();
        assert_eq!(err.error_code(), "name_too_long");

        let err = h
            .registry
            .use_token(h.relayer, token(1), &name, &garbage)
            .unwrap_err();
        assert_eq!(err.error_code(), "name_too_long");
    }

    #[test]
    fn invalid_signature_length_is_reported() {
        let mut h = Harness::new();
        let garbage = Signed::new(h.alice.address(), vec![0u8; 64]);
        let err = h
            .registry
            .register_service(h.relayer, "svc", &garbage)
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::Auth(AuthError::InvalidSignatureLength(64))
        );
    }

    #[test]
    fn duplicate_service_fails_without_consuming_nonce() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        let bob = h.bob.clone();
        h.register_service(&alice, "svc").unwrap();

        let err = h.register_service(&bob, "svc").unwrap_err();
        assert_eq!(err.error_code(), "already_exists");
        assert_eq!(h.registry.nonce(&bob.address()), U256::ZERO);
    }

    #[test]
    fn only_owner_can_unregister_service() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        let bob = h.bob.clone();
        h.register_service(&alice, "svc").unwrap();

        let err = h.unregister_service(&bob, "svc").unwrap_err();
        assert_eq!(err.error_code(), "unauthorized");
        assert!(h.registry.service(&svc("svc")).is_some());

        let err = h.unregister_service(&alice, "missing").unwrap_err();
        assert_eq!(err.error_code(), "service_not_found");
    }

    #[test]
    fn use_token_checks_in_order() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        let bob = h.bob.clone();

        let err = h.use_token(&alice, token(1), "svc").unwrap_err();
        assert_eq!(err.error_code(), "service_not_found");

        h.register_service(&bob, "svc").unwrap();
        let err = h.use_token(&alice, token(1), "svc").unwrap_err();
        assert_eq!(err.error_code(), "token_not_found");

        h.register_token(&alice, alice.address(), token(1)).unwrap();
        let err = h.use_token(&bob, token(1), "svc").unwrap_err();
        assert_eq!(err.error_code(), "unauthorized");

        // Token owner may attach to someone else's service.
        h.use_token(&alice, token(1), "svc").unwrap();
        let err = h.use_token(&alice, token(1), "svc").unwrap_err();
        assert_eq!(err.error_code(), "already_used");
        h.assert_consistent();
    }

    #[test]
    fn failure_after_authorization_keeps_nonce() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        h.register_service(&alice, "svc").unwrap();
        h.register_token(&alice, alice.address(), token(1)).unwrap();
        h.use_token(&alice, token(1), "svc").unwrap();
        let before = h.registry.nonce(&alice.address());

        assert!(h.use_token(&alice, token(1), "svc").is_err());
        assert_eq!(h.registry.nonce(&alice.address()), before);
    }

    #[test]
    fn unuse_token_requires_existing_relation() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        h.register_service(&alice, "svc").unwrap();
        h.register_token(&alice, alice.address(), token(1)).unwrap();

        let err = h.unuse_token(&alice, token(1), "svc").unwrap_err();
        assert_eq!(err.error_code(), "not_used");

        h.use_token(&alice, token(1), "svc").unwrap();
        h.unuse_token(&alice, token(1), "svc").unwrap();
        assert!(h.registry.services_using(&token(1)).is_empty());
        assert!(!h.registry.service(&svc("svc")).unwrap().uses(&token(1)));
        h.assert_consistent();
    }

    #[test]
    fn register_token_rejects_duplicates_and_zero_recipient() {
        let mut h = Harness::new();
        let alice = h.alice.clone();

        h.register_token(&alice, alice.address(), token(1)).unwrap();
        let err = h.register_token(&alice, alice.address(), token(1)).unwrap_err();
        assert_eq!(err.error_code(), "token_already_exists");

        let err = h.register_token(&alice, Address::ZERO, token(2)).unwrap_err();
        assert_eq!(err.error_code(), "zero_address");
        assert_eq!(h.registry.nonce(&alice.address()), U256::from(1u64));
    }

    #[test]
    fn bundled_register_requires_service_and_mints_nothing_otherwise() {
        let mut h = Harness::new();
        let alice = h.alice.clone();

        let err = h
            .register_token_with_service(&alice, alice.address(), token(1), "ghost")
            .unwrap_err();
        assert_eq!(err.error_code(), "service_not_found");
        assert_eq!(h.registry.token_owner(&token(1)), None);
        assert_eq!(h.registry.nonce(&alice.address()), U256::ZERO);
    }

    #[test]
    fn bundled_register_can_mint_to_another_identity() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        let bob = h.bob.clone();
        h.register_service(&alice, "svc").unwrap();

        h.register_token_with_service(&alice, bob.address(), token(7), "svc")
            .unwrap();
        assert_eq!(h.registry.token_owner(&token(7)), Some(bob.address()));
        assert!(h.registry.service(&svc("svc")).unwrap().uses(&token(7)));

        // Only the token owner may burn it.
        let err = h.unregister_token(&alice, token(7)).unwrap_err();
        assert_eq!(err.error_code(), "unauthorized");
        h.unregister_token(&bob, token(7)).unwrap();
    }

    #[test]
    fn unregister_token_cascades_to_every_service() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        for name in ["a", "b", "c"] {
            h.register_service(&alice, name).unwrap();
        }
        h.register_token(&alice, alice.address(), token(9)).unwrap();
        for name in ["a", "b", "c"] {
            h.use_token(&alice, token(9), name).unwrap();
        }

        h.unregister_token(&alice, token(9)).unwrap();

        for name in ["a", "b", "c"] {
            assert!(!h.registry.service(&svc(name)).unwrap().uses(&token(9)));
        }
        assert!(h.registry.services_using(&token(9)).is_empty());
        assert_eq!(h.registry.token_owner(&token(9)), None);

        let err = h.unregister_token(&alice, token(9)).unwrap_err();
        assert_eq!(err.error_code(), "token_not_found");
        h.assert_consistent();
    }

    #[test]
    fn unregister_service_cascades_to_every_token() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        h.register_service(&alice, "svc").unwrap();
        h.register_service(&alice, "other").unwrap();
        for byte in 1..=4 {
            h.register_token_with_service(&alice, alice.address(), token(byte), "svc")
                .unwrap();
        }
        h.use_token(&alice, token(1), "other").unwrap();

        h.unregister_service(&alice, "svc").unwrap();

        for byte in 1..=4 {
            assert!(!h.registry.services_using(&token(byte)).contains(&svc("svc")));
        }
        assert_eq!(
            h.registry.services_using(&token(1)),
            BTreeSet::from([svc("other")])
        );
        h.assert_consistent();
    }

    #[test]
    fn index_stays_consistent_across_mixed_operations() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        let bob = h.bob.clone();

        h.register_service(&alice, "a").unwrap();
        h.register_service(&bob, "b").unwrap();
        h.register_token(&alice, alice.address(), token(1)).unwrap();
        h.register_token_with_service(&bob, bob.address(), token(2), "a")
            .unwrap();
        h.use_token(&alice, token(1), "a").unwrap();
        h.use_token(&alice, token(1), "b").unwrap();
        h.use_token(&bob, token(2), "b").unwrap();
        h.assert_consistent();

        h.unuse_token(&alice, token(1), "a").unwrap();
        h.assert_consistent();
        h.unregister_service(&bob, "b").unwrap();
        h.assert_consistent();
        h.unregister_token(&bob, token(2)).unwrap();
        h.assert_consistent();

        assert!(h.registry.service(&svc("a")).unwrap().token_ids().is_empty());
        assert!(h.registry.services_using(&token(1)).is_empty());
    }

    #[test]
    fn events_follow_successful_operations() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        h.register_service(&alice, "svc").unwrap();
        let _ = h.register_service(&alice, "svc");
        h.register_token_with_service(&alice, alice.address(), token(1), "svc")
            .unwrap();

        let kinds: Vec<_> = h.registry.events().events().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["service_registered", "token_minted", "token_used"]);
    }

    #[test]
    fn execute_rejects_unsupported_operation_regardless_of_signer() {
        let mut h = Harness::new();
        let mut delegate = call("svc", Address::repeat_byte(0xcc));
        delegate.operation = U256::from(Operation::DelegateCall.code());
        let garbage = Signed::new(Address::repeat_byte(0x99), vec![1u8; 65]);

        let err = h
            .registry
            .execute(h.relayer, &delegate, 1_000_000, &garbage)
            .unwrap_err();
        assert_eq!(err.error_code(), "unsupported_operation");

        let alice = h.alice.clone();
        h.register_service(&alice, "svc").unwrap();
        for code in [1u64, 2, 3, 4, 250] {
            let mut op = call("svc", Address::repeat_byte(0xcc));
            op.operation = U256::from(code);
            let err = h.execute(&alice, &op).unwrap_err();
            assert_eq!(err.error_code(), "unsupported_operation");
        }
        assert_eq!(h.registry.nonce(&alice.address()), U256::from(1u64));
    }

    #[test]
    fn execute_passes_callee_failure_through_verbatim() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        let target = Address::repeat_byte(0xcc);
        h.registry
            .dispatcher_mut()
            .deploy(target, |_: &CallContext, _: &[u8], _: &mut GasMeter| {
                CallOutcome::Failure(Bytes::from_static(b"boom"))
            });
        h.register_service(&alice, "svc").unwrap();
        let before = h.registry.nonce(&alice.address());

        let err = h.execute(&alice, &call("svc", target)).unwrap_err();
        assert_eq!(err, RegistryError::CalleeFailure(Bytes::from_static(b"boom")));
        assert_eq!(h.registry.nonce(&alice.address()), before);
    }

    #[test]
    fn execute_returns_callee_output_for_service_owner() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        let target = Address::repeat_byte(0xcc);
        h.registry
            .dispatcher_mut()
            .deploy(target, |_: &CallContext, data: &[u8], gas: &mut GasMeter| {
                if gas.charge(100).is_err() {
                    return CallOutcome::Failure(Bytes::new());
                }
                CallOutcome::Success(Bytes::copy_from_slice(data))
            });
        h.register_service(&alice, "svc").unwrap();

        let out = h.execute(&alice, &call("svc", target)).unwrap();
        assert_eq!(out.as_ref(), b"ping");
        assert_eq!(h.registry.nonce(&alice.address()), U256::from(2u64));
        assert_eq!(h.registry.dispatcher().received(&target), U256::from(1u64));
    }

    #[test]
    fn execute_requires_service_ownership() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        let bob = h.bob.clone();
        h.register_service(&alice, "svc").unwrap();

        let err = h
            .execute(&bob, &call("svc", Address::repeat_byte(0xcc)))
            .unwrap_err();
        assert_eq!(err.error_code(), "unauthorized");

        let err = h
            .execute(&alice, &call("missing", Address::repeat_byte(0xcc)))
            .unwrap_err();
        assert_eq!(err.error_code(), "unauthorized");
    }

    #[test]
    fn execute_signature_covers_value() {
        let mut h = Harness::new();
        let alice = h.alice.clone();
        h.register_service(&alice, "svc").unwrap();

        let signed_call = call("svc", Address::repeat_byte(0xcc));
        let payload = message::execute(
            signed_call.operation,
            signed_call.target,
            signed_call.value,
            &signed_call.data,
            &svc("svc"),
        );
        let signed = h.signed(&alice, &payload);

        let mut tampered = signed_call.clone();
        tampered.value = U256::from(1_000u64);
        let err = h
            .registry
            .execute(h.relayer, &tampered, 1_000_000, &signed)
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_signer");
    }
}

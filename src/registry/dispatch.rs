// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Guarded external-call dispatch.
//!
//! The registry forwards an already-authorized call through a
//! [`CallDispatcher`] and never interprets what comes back: the callee's
//! output on success and its failure payload on failure are both passed
//! through byte for byte.
//!
//! [`ContractHost`] is the in-process dispatcher. Targets are [`Contract`]
//! trait objects; every call runs under a [`GasMeter`] capped at the budget
//! the registry hands over.

use std::collections::HashMap;

use alloy::primitives::{Address, Bytes, U256};

/// Gas charged by the host before the callee runs.
pub const CALL_BASE_COST: u64 = 700;

/// Gas the registry keeps back for its own bookkeeping after the call.
pub const EXECUTE_GAS_RESERVE: u64 = 5_000;

/// Raised when a charge would exceed the meter's limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("out of gas")]
pub struct OutOfGas;

/// Bounded computation budget for one forwarded call.
#[derive(Debug, Clone)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Consume `amount`, or fail without consuming anything.
    pub fn charge(&mut self, amount: u64) -> Result<(), OutOfGas> {
        let used = self.used.checked_add(amount).ok_or(OutOfGas)?;
        if used > self.limit {
            return Err(OutOfGas);
        }
        self.used = used;
        Ok(())
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }
}

/// Raw result of a forwarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success(Bytes),
    Failure(Bytes),
}

/// The callee's failure payload, unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalleeFailure(pub Bytes);

/// What the callee sees about the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Identity the call is made from (the registry).
    pub caller: Address,
    /// Native value transferred with the call.
    pub value: U256,
}

/// A call target hosted by [`ContractHost`].
///
/// The host only rolls back what it tracks itself (value received). A
/// contract that returns [`CallOutcome::Failure`] must leave its own state as
/// it found it.
pub trait Contract: Send + Sync {
    fn call(&mut self, ctx: &CallContext, data: &[u8], gas: &mut GasMeter) -> CallOutcome;
}

impl<F> Contract for F
where
    F: FnMut(&CallContext, &[u8], &mut GasMeter) -> CallOutcome + Send + Sync,
{
    fn call(&mut self, ctx: &CallContext, data: &[u8], gas: &mut GasMeter) -> CallOutcome {
        self(ctx, data, gas)
    }
}

/// Boundary through which `execute` reaches third parties.
pub trait CallDispatcher {
    /// Forward `data` and `value` to `target` under `budget` gas.
    fn dispatch(
        &mut self,
        target: Address,
        value: U256,
        data: &[u8],
        budget: u64,
    ) -> Result<Bytes, CalleeFailure>;
}

/// In-process call targets keyed by address.
#[derive(Default)]
pub struct ContractHost {
    caller: Address,
    contracts: HashMap<Address, Box<dyn Contract>>,
    received: HashMap<Address, U256>,
}

impl ContractHost {
    /// Create a host whose calls originate from `caller`.
    pub fn new(caller: Address) -> Self {
        Self {
            caller,
            contracts: HashMap::new(),
            received: HashMap::new(),
        }
    }

    /// Install `contract` at `address`, replacing any previous one.
    pub fn deploy(&mut self, address: Address, contract: impl Contract + 'static) {
        self.contracts.insert(address, Box::new(contract));
    }

    /// Total value delivered to `address` by successful calls.
    pub fn received(&self, address: &Address) -> U256 {
        self.received.get(address).copied().unwrap_or(U256::ZERO)
    }
}

impl std::fmt::Debug for ContractHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractHost")
            .field("caller", &self.caller)
            .field("contracts", &self.contracts.len())
            .field("received", &self.received)
            .finish()
    }
}

impl CallDispatcher for ContractHost {
    fn dispatch(
        &mut self,
        target: Address,
        value: U256,
        data: &[u8],
        budget: u64,
    ) -> Result<Bytes, CalleeFailure> {
        let mut gas = GasMeter::new(budget);
        if gas.charge(CALL_BASE_COST).is_err() {
            return Err(CalleeFailure(Bytes::new()));
        }

        let ctx = CallContext {
            caller: self.caller,
            value,
        };

        // No code at the target: a plain value transfer that always succeeds.
        let outcome = match self.contracts.get_mut(&target) {
            Some(contract) => contract.call(&ctx, data, &mut gas),
            None => CallOutcome::Success(Bytes::new()),
        };

        match outcome {
            CallOutcome::Success(output) => {
                let balance = self.received.entry(target).or_insert(U256::ZERO);
                *balance = balance.saturating_add(value);
                tracing::debug!(%target, gas_used = gas.used(), "call succeeded");
                Ok(output)
            }
            CallOutcome::Failure(payload) => {
                tracing::debug!(%target, gas_used = gas.used(), "call failed");
                Err(CalleeFailure(payload))
            }
        }
    }
}

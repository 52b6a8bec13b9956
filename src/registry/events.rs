// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Events observable by external watchers.
//!
//! Events are informational: the registry records them after a successful
//! operation and never reads them back.

use std::collections::VecDeque;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{ServiceName, TokenId};

/// Default number of events retained in memory.
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    ServiceRegistered {
        name: ServiceName,
        owner: Address,
    },
    ServiceUnregistered {
        name: ServiceName,
        owner: Address,
    },
    TokenUsed {
        token_id: TokenId,
        service_name: ServiceName,
    },
    TokenUnused {
        token_id: TokenId,
        service_name: ServiceName,
    },
    /// Ownership ledger creation notification.
    TokenMinted {
        token_id: TokenId,
        to: Address,
    },
    /// Ownership ledger destruction notification.
    TokenBurned {
        token_id: TokenId,
        owner: Address,
    },
    Executed {
        service_name: ServiceName,
        target: Address,
        value: U256,
    },
}

impl RegistryEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryEvent::ServiceRegistered { .. } => "service_registered",
            RegistryEvent::ServiceUnregistered { .. } => "service_unregistered",
            RegistryEvent::TokenUsed { .. } => "token_used",
            RegistryEvent::TokenUnused { .. } => "token_unused",
            RegistryEvent::TokenMinted { .. } => "token_minted",
            RegistryEvent::TokenBurned { .. } => "token_burned",
            RegistryEvent::Executed { .. } => "executed",
        }
    }
}

/// An emitted event with its envelope.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event_id: Uuid,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event: RegistryEvent,
}

/// Bounded in-memory event log (oldest entries are dropped first).
#[derive(Debug, Clone)]
pub struct EventLog {
    records: VecDeque<EventRecord>,
    capacity: usize,
    next_sequence: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: capacity.max(1),
            next_sequence: 0,
        }
    }

    pub fn emit(&mut self, event: RegistryEvent) {
        tracing::info!(kind = event.kind(), sequence = self.next_sequence, ?event, "registry event");

        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(EventRecord {
            event_id: Uuid::new_v4(),
            sequence: self.next_sequence,
            timestamp: Utc::now(),
            event,
        });
        self.next_sequence += 1;
    }

    /// The most recent `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<EventRecord> {
        let skip = self.records.len().saturating_sub(limit);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Events without their envelopes, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &RegistryEvent> {
        self.records.iter().map(|record| &record.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(name: &str) -> RegistryEvent {
        RegistryEvent::ServiceRegistered {
            name: ServiceName::parse(name).unwrap(),
            owner: Address::repeat_byte(0x11),
        }
    }

    #[test]
    fn emit_assigns_increasing_sequence_numbers() {
        let mut log = EventLog::default();
        log.emit(registered("a"));
        log.emit(registered("b"));

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].sequence, 0);
        assert_eq!(recent[1].sequence, 1);
        assert_eq!(recent[1].event, registered("b"));
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut log = EventLog::with_capacity(2);
        log.emit(registered("a"));
        log.emit(registered("b"));
        log.emit(registered("c"));

        let events: Vec<_> = log.events().cloned().collect();
        assert_eq!(events, vec![registered("b"), registered("c")]);
        assert_eq!(log.recent(1)[0].sequence, 2);
    }
}

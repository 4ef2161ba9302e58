// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Persisted escrow transactions.
//!
//! `executed` flips from `false` to `true` exactly once. The flip is a
//! compare-and-set inside the store, so concurrent executes of the same
//! escrow see exactly one [`ExecuteOutcome::Executed`].

use crate::base::{EscrowId, WalletAddress};
use crate::config::EscrowConfig;
use crate::error::EscrowError;
use crate::instruction::Instruction;
use crate::ledger_client::LedgerClient;
use crate::wallet::Wallet;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowTransaction {
    pub id: EscrowId,
    pub sender: WalletAddress,
    pub recipient: WalletAddress,
    pub amount: Decimal,
    pub condition: String,
    pub creation_time: DateTime<Utc>,
    pub executed: bool,
}

/// Fields supplied when recording a new escrow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEscrow {
    pub sender: WalletAddress,
    pub recipient: WalletAddress,
    pub amount: Decimal,
    pub condition: String,
    pub creation_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteOutcome {
    Executed,
    AlreadyExecuted,
}

pub trait EscrowStore: Send + Sync {
    fn insert(&self, escrow: NewEscrow) -> EscrowTransaction;

    fn get(&self, id: EscrowId) -> Option<EscrowTransaction>;

    /// Atomically sets `executed` if it is still `false`.
    ///
    /// # Errors
    ///
    /// [`EscrowError::NotFound`] if no record has this id.
    fn mark_executed(&self, id: EscrowId) -> Result<ExecuteOutcome, EscrowError>;
}

#[derive(Debug)]
pub struct MemoryEscrowStore {
    records: DashMap<EscrowId, EscrowTransaction>,
    next_id: AtomicU64,
}

impl MemoryEscrowStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryEscrowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EscrowStore for MemoryEscrowStore {
    fn insert(&self, escrow: NewEscrow) -> EscrowTransaction {
        let id = EscrowId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = EscrowTransaction {
            id,
            sender: escrow.sender,
            recipient: escrow.recipient,
            amount: escrow.amount,
            condition: escrow.condition,
            creation_time: escrow.creation_time,
            executed: false,
        };
        self.records.insert(id, record.clone());
        record
    }

    fn get(&self, id: EscrowId) -> Option<EscrowTransaction> {
        self.records.get(&id).map(|record| record.clone())
    }

    fn mark_executed(&self, id: EscrowId) -> Result<ExecuteOutcome, EscrowError> {
        // The write guard holds the shard lock across the check and the set.
        let mut record = self.records.get_mut(&id).ok_or(EscrowError::NotFound(id))?;
        if record.executed {
            return Ok(ExecuteOutcome::AlreadyExecuted);
        }
        record.executed = true;
        Ok(ExecuteOutcome::Executed)
    }
}

/// Opens escrows on the ledger and tracks them in a store.
pub struct EscrowRegistry<S, L> {
    store: S,
    ledger: L,
    config: EscrowConfig,
}

impl<S: EscrowStore, L: LedgerClient> EscrowRegistry<S, L> {
    pub fn new(store: S, ledger: L, config: EscrowConfig) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Submits an escrow-create from `sender` and records it.
    ///
    /// The record is written only after the ledger accepts the instruction.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::InvalidAmount`] - `amount` is zero or negative.
    /// - [`EscrowError::InvalidExpiry`] - the expiration timestamp overflows.
    /// - [`EscrowError::Reservation`] - the ledger refused the instruction.
    pub fn open(
        &self,
        sender: &Wallet,
        recipient: WalletAddress,
        amount: Decimal,
        condition: String,
        now: DateTime<Utc>,
    ) -> Result<EscrowTransaction, EscrowError> {
        if amount <= Decimal::ZERO {
            return Err(EscrowError::InvalidAmount);
        }

        let expiration = self
            .config
            .expiration_from(now)
            .ok_or(EscrowError::InvalidExpiry(self.config.expiry_days))?;
        let create = sender.sign(Instruction::EscrowCreate {
            account: sender.address().clone(),
            destination: recipient.clone(),
            amount,
            condition: condition.clone(),
            destination_tag: 0,
            source_tag: 0,
            expiration: expiration.timestamp(),
            sequence: sender.next_sequence(),
        });
        let response = self
            .ledger
            .submit(&create)
            .map_err(EscrowError::Reservation)?;

        let record = self.store.insert(NewEscrow {
            sender: sender.address().clone(),
            recipient,
            amount,
            condition,
            creation_time: now,
        });
        info!(escrow = %record.id, hash = %response.hash, %amount, "escrow opened");
        Ok(record)
    }

    pub fn get(&self, id: EscrowId) -> Option<EscrowTransaction> {
        self.store.get(id)
    }

    /// Marks the escrow executed.
    ///
    /// # Errors
    ///
    /// [`EscrowError::NotFound`] for an unknown id.
    pub fn execute(&self, id: EscrowId) -> Result<ExecuteOutcome, EscrowError> {
        let outcome = self.store.mark_executed(id)?;
        info!(escrow = %id, ?outcome, "escrow execute");
        Ok(outcome)
    }
}

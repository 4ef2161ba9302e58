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

//! Ledger submission boundary.

use crate::base::WalletAddress;
use crate::error::LedgerError;
use crate::instruction::SignedInstruction;
use crossbeam::queue::SegQueue;
use dashmap::{DashMap, DashSet};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What the ledger reports back for an accepted instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub hash: String,
    /// Settled amount.
    pub amount: Decimal,
}

pub trait LedgerClient: Send + Sync {
    fn submit(&self, instruction: &SignedInstruction) -> Result<SubmitResponse, LedgerError>;
}

impl<T: LedgerClient + ?Sized> LedgerClient for Arc<T> {
    fn submit(&self, instruction: &SignedInstruction) -> Result<SubmitResponse, LedgerError> {
        (**self).submit(instruction)
    }
}

/// In-process ledger that settles every valid instruction in full.
///
/// Rejects bad signatures, resubmissions of the same instruction, and
/// anything sent to a destination registered with [`reject_destination`].
///
/// [`reject_destination`]: MemoryLedger::reject_destination
#[derive(Debug, Default)]
pub struct MemoryLedger {
    /// Accepted instructions by hash, until drained.
    accepted: DashMap<String, Arc<SignedInstruction>>,
    /// Hashes in acceptance order.
    order: SegQueue<String>,
    /// Every hash ever accepted, kept across [`MemoryLedger::drain`].
    seen: DashSet<String>,
    rejected_destinations: DashSet<WalletAddress>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_destination(&self, destination: WalletAddress) {
        self.rejected_destinations.insert(destination);
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Removes and returns accepted instructions in FIFO order.
    pub fn drain(&self) -> Vec<Arc<SignedInstruction>> {
        let mut drained = Vec::with_capacity(self.order.len());
        while let Some(hash) = self.order.pop() {
            if let Some((_, instruction)) = self.accepted.remove(&hash) {
                drained.push(instruction);
            }
        }
        drained
    }
}

impl LedgerClient for MemoryLedger {
    fn submit(&self, instruction: &SignedInstruction) -> Result<SubmitResponse, LedgerError> {
        if !instruction.verify() {
            return Err(LedgerError::InvalidSignature);
        }
        let destination = instruction.instruction.destination();
        if self.rejected_destinations.contains(destination) {
            return Err(LedgerError::Rejected(format!("destination {destination} refused")));
        }

        let hash = instruction.hash();
        // insert is the atomic check-and-set under concurrent submits.
        if !self.seen.insert(hash.clone()) {
            return Err(LedgerError::Duplicate(hash));
        }
        self.accepted.insert(hash.clone(), Arc::new(instruction.clone()));
        self.order.push(hash.clone());
        Ok(SubmitResponse {
            hash,
            amount: instruction.instruction.amount(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;
    use crate::wallet::Wallet;
    use rust_decimal_macros::dec;

    fn payment(wallet: &Wallet, destination: &str, amount: Decimal) -> SignedInstruction {
        wallet.sign(Instruction::Payment {
            account: wallet.address().clone(),
            destination: WalletAddress::new(destination),
            amount,
            sequence: wallet.next_sequence(),
        })
    }

    #[test]
    fn accepts_and_echoes_amount() {
        let ledger = MemoryLedger::new();
        let wallet = Wallet::from_seed(&[1u8; 32]);
        let signed = payment(&wallet, "rFan", dec!(1.875));

        let response = ledger.submit(&signed).unwrap();
        assert_eq!(response.amount, dec!(1.875));
        assert_eq!(response.hash, signed.hash());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn resubmission_is_duplicate() {
        let ledger = MemoryLedger::new();
        let wallet = Wallet::from_seed(&[1u8; 32]);
        let signed = payment(&wallet, "rFan", dec!(1));

        ledger.submit(&signed).unwrap();
        assert!(matches!(ledger.submit(&signed), Err(LedgerError::Duplicate(_))));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let ledger = MemoryLedger::new();
        let wallet = Wallet::from_seed(&[1u8; 32]);
        let mut signed = payment(&wallet, "rFan", dec!(1));
        signed.signature = "00".repeat(64);

        assert_eq!(ledger.submit(&signed), Err(LedgerError::InvalidSignature));
        assert!(ledger.is_empty());
    }

    #[test]
    fn refused_destination_is_rejected() {
        let ledger = MemoryLedger::new();
        ledger.reject_destination(WalletAddress::new("rClosed"));
        let wallet = Wallet::from_seed(&[1u8; 32]);

        let result = ledger.submit(&payment(&wallet, "rClosed", dec!(1)));
        assert!(matches!(result, Err(LedgerError::Rejected(_))));
    }

    #[test]
    fn drain_preserves_submission_order() {
        let ledger = MemoryLedger::new();
        let wallet = Wallet::from_seed(&[1u8; 32]);
        for destination in ["rA", "rB", "rC"] {
            ledger.submit(&payment(&wallet, destination, dec!(1))).unwrap();
        }

        let destinations: Vec<String> = ledger
            .drain()
            .iter()
            .map(|s| s.instruction.destination().to_string())
            .collect();
        assert_eq!(destinations, vec!["rA", "rB", "rC"]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn drained_instruction_is_still_a_duplicate() {
        let ledger = MemoryLedger::new();
        let wallet = Wallet::from_seed(&[1u8; 32]);
        let signed = payment(&wallet, "rFan", dec!(1));

        ledger.submit(&signed).unwrap();
        assert_eq!(ledger.drain().len(), 1);
        assert!(matches!(ledger.submit(&signed), Err(LedgerError::Duplicate(_))));
        assert!(ledger.is_empty());
    }
}

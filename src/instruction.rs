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

//! Ledger instructions and their signed envelopes.

use crate::base::WalletAddress;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transaction_type")]
pub enum Instruction {
    /// Reserve `amount` for `destination` until released or expired.
    EscrowCreate {
        account: WalletAddress,
        destination: WalletAddress,
        amount: Decimal,
        condition: String,
        destination_tag: u32,
        source_tag: u32,
        /// Unix seconds after which the ledger cancels the reservation.
        expiration: i64,
        sequence: u64,
    },
    Payment {
        account: WalletAddress,
        destination: WalletAddress,
        amount: Decimal,
        sequence: u64,
    },
}

impl Instruction {
    /// Sending account.
    pub fn account(&self) -> &WalletAddress {
        match self {
            Self::EscrowCreate { account, .. } => account,
            Self::Payment { account, .. } => account,
        }
    }

    pub fn destination(&self) -> &WalletAddress {
        match self {
            Self::EscrowCreate { destination, .. } => destination,
            Self::Payment { destination, .. } => destination,
        }
    }

    pub fn amount(&self) -> Decimal {
        match self {
            Self::EscrowCreate { amount, .. } => *amount,
            Self::Payment { amount, .. } => *amount,
        }
    }

    /// Per-account sequence number. Distinguishes otherwise identical
    /// instructions.
    pub fn sequence(&self) -> u64 {
        match self {
            Self::EscrowCreate { sequence, .. } => *sequence,
            Self::Payment { sequence, .. } => *sequence,
        }
    }

    /// Bytes covered by the signature.
    ///
    /// The `serde_json` encoding of the instruction with its amount
    /// normalized, so `1.50` and `1.5` sign identically. JSON string
    /// escaping keeps field boundaries unambiguous whatever the addresses
    /// contain.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut canonical = self.clone();
        match &mut canonical {
            Self::EscrowCreate { amount, .. } | Self::Payment { amount, .. } => {
                *amount = amount.normalize();
            }
        }
        serde_json::json!(canonical).to_string().into_bytes()
    }
}

/// An instruction with the sender's ed25519 signature, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInstruction {
    pub instruction: Instruction,
    pub public_key: String,
    pub signature: String,
}

impl SignedInstruction {
    /// Checks the signature against the embedded public key.
    pub fn verify(&self) -> bool {
        let Ok(public_key) = hex::decode(&self.public_key) else {
            return false;
        };
        let Ok(public_key) = <[u8; 32]>::try_from(public_key.as_slice()) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key) else {
            return false;
        };
        let Ok(signature) = hex::decode(&self.signature) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&signature) else {
            return false;
        };
        verifying_key
            .verify(&self.instruction.signing_bytes(), &signature)
            .is_ok()
    }

    /// SHA-256 over the signing bytes and signature, hex encoded.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.instruction.signing_bytes());
        hasher.update(self.signature.as_bytes());
        hex::encode(hasher.finalize())
    }
}

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

//! Signing wallets.

use crate::base::WalletAddress;
use crate::instruction::{Instruction, SignedInstruction};
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// An ed25519 key with its derived ledger address and a sequence counter.
pub struct Wallet {
    address: WalletAddress,
    signing_key: SigningKey,
    next_sequence: AtomicU64,
}

impl Wallet {
    /// Deterministic wallet from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let digest = Sha256::digest(signing_key.verifying_key().as_bytes());
        let address = WalletAddress(format!("r{}", hex::encode(&digest[..20])));

        Self {
            address,
            signing_key,
            next_sequence: AtomicU64::new(1),
        }
    }

    pub fn generate() -> Self {
        Self::from_seed(&rand::random::<[u8; 32]>())
    }

    pub fn address(&self) -> &WalletAddress {
        &self.address
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().as_bytes())
    }

    /// Reserves the next sequence number for an instruction from this wallet.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    pub fn sign(&self, instruction: Instruction) -> SignedInstruction {
        let signature = self.signing_key.sign(&instruction.signing_bytes());
        SignedInstruction {
            instruction,
            public_key: self.public_key_hex(),
            signature: hex::encode(signature.to_bytes()),
        }
    }
}

impl fmt::Debug for Wallet {
    // Never print the signing key.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_deterministic_per_seed() {
        let a = Wallet::from_seed(&[1u8; 32]);
        let b = Wallet::from_seed(&[1u8; 32]);
        let c = Wallet::from_seed(&[2u8; 32]);
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
    }

    #[test]
    fn address_format() {
        let wallet = Wallet::from_seed(&[1u8; 32]);
        let address = wallet.address().as_str();
        assert!(address.starts_with('r'));
        assert_eq!(address.len(), 41);
    }

    #[test]
    fn sequence_increments() {
        let wallet = Wallet::generate();
        assert_eq!(wallet.next_sequence(), 1);
        assert_eq!(wallet.next_sequence(), 2);
    }

    #[test]
    fn debug_hides_key() {
        let wallet = Wallet::from_seed(&[3u8; 32]);
        let printed = format!("{wallet:?}");
        assert!(printed.contains("address"));
        assert!(!printed.contains("signing_key"));
    }
}

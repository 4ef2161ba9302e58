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

//! # Digitvl Rewards
//!
//! Coin rewards and sponsorship escrow payouts for a music-sharing platform.
//!
//! ## Core Components
//!
//! - [`CoinLedger`]: Per-user coin counters in a key-value cache
//! - [`EscrowAllocator`]: Splits a sponsorship fee between artist, listeners and platform
//! - [`EscrowRegistry`]: Opens escrows and executes them exactly once
//! - [`LedgerClient`]: Submission boundary to the payment ledger
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use digitvl_rewards::{
//!     EscrowAllocator, EscrowConfig, ListenHistory, MemoryLedger, SponsorshipId,
//!     StaticSponsorship, Wallet, WalletAddress,
//! };
//! use rust_decimal_macros::dec;
//!
//! let sponsor = Wallet::from_seed(&[1u8; 32]);
//! let artist = Wallet::from_seed(&[2u8; 32]);
//! let source = StaticSponsorship {
//!     id: SponsorshipId("spring-drop".into()),
//!     artist_wallet: artist.address().clone(),
//!     platform_wallet: WalletAddress::new("rPlatform"),
//!     fan_split_percentage: dec!(0.3),
//!     sponsorship_fee: dec!(100),
//!     listener_wallets: vec![WalletAddress::new("rFan")],
//! };
//! let now = Utc::now();
//! let history: ListenHistory = [(WalletAddress::new("rFan"), now)].into_iter().collect();
//!
//! let allocator = EscrowAllocator::new(MemoryLedger::new(), sponsor, artist, EscrowConfig::default());
//! let report = allocator.allocate(&source.id, &source, &history, now).unwrap();
//!
//! assert_eq!(report.allocation.artist_allocation, dec!(70));
//! assert_eq!(report.listener_allocation, dec!(7.5));
//! assert!(report.is_complete());
//! ```
//!
//! ## Thread Safety
//!
//! Stores and the in-memory ledger are safe to share across threads. Coin
//! increments and escrow execution are atomic per key.

mod allocation;
mod base;
pub mod coin_store;
mod coins;
pub mod config;
pub mod error;
mod escrow;
pub mod escrow_store;
mod instruction;
pub mod ledger_client;
mod participation;
mod sponsorship;
mod wallet;

pub use allocation::{Allocation, FanSplitFormula};
pub use base::{EscrowId, SponsorshipId, UserId, WalletAddress};
pub use coin_store::{CoinStore, MemoryCoinStore, RedisCoinStore};
pub use coins::{CoinLedger, RewardAction};
pub use config::{CacheConfig, Config, EscrowConfig, RewardConfig};
pub use error::{CoinError, ConfigError, EscrowError, LedgerError, ParticipationError};
pub use escrow::{AllocationReport, AllocationStage, EscrowAllocator, PaymentOutcome};
pub use escrow_store::{
    EscrowRegistry, EscrowStore, EscrowTransaction, ExecuteOutcome, MemoryEscrowStore, NewEscrow,
};
pub use instruction::{Instruction, SignedInstruction};
pub use ledger_client::{LedgerClient, MemoryLedger, SubmitResponse};
pub use participation::{ListenHistory, ParticipationCheck, eligible_listeners};
pub use sponsorship::{SponsorshipSource, StaticSponsorship};
pub use wallet::Wallet;

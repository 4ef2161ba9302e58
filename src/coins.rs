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

//! Per-user coin balances.
//!
//! Balances only grow: there is no decrement or redemption path here. A
//! coin increment is not atomic with the action that earned it.
//!
//! # Example
//!
//! ```
//! use digitvl_rewards::{CoinLedger, MemoryCoinStore, RewardAction, UserId};
//!
//! let ledger = CoinLedger::new(MemoryCoinStore::new());
//! assert_eq!(ledger.read(UserId(7)), 0);
//!
//! ledger.reward(UserId(7), RewardAction::InAppAction);
//! assert_eq!(ledger.read(UserId(7)), 5);
//! ```

use crate::base::UserId;
use crate::coin_store::{CoinStore, coin_key};
use crate::config::RewardConfig;
use crate::error::CoinError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Actions that earn coins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardAction {
    /// Generic in-app action such as posting a song.
    InAppAction,
    /// A referred user verified their email.
    Referral,
}

pub struct CoinLedger<S> {
    store: S,
    rewards: RewardConfig,
}

impl<S: CoinStore> CoinLedger<S> {
    pub fn new(store: S) -> Self {
        Self::with_rewards(store, RewardConfig::default())
    }

    pub fn with_rewards(store: S, rewards: RewardConfig) -> Self {
        Self { store, rewards }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Coins granted for `action`.
    pub fn reward_amount(&self, action: RewardAction) -> u32 {
        match action {
            RewardAction::InAppAction => self.rewards.in_app_action,
            RewardAction::Referral => self.rewards.referral,
        }
    }

    /// Adds `amount` coins and returns the new balance.
    ///
    /// # Errors
    ///
    /// - [`CoinError::InvalidAmount`] - `amount` is zero.
    /// - [`CoinError::Overflow`] - balance would pass `i64::MAX`.
    /// - [`CoinError::Unavailable`] - the store could not be reached.
    /// - [`CoinError::Corrupt`] - the stored counter is negative.
    pub fn increment(&self, user_id: UserId, amount: u32) -> Result<u64, CoinError> {
        if amount == 0 {
            return Err(CoinError::InvalidAmount);
        }
        let (key, field) = coin_key(user_id);
        let total = self.store.increment_by(&key, &field, i64::from(amount))?;
        debug!(user = %user_id, amount, total, "coins added");
        to_balance(total)
    }

    /// Current balance. A user that never earned coins has zero.
    pub fn balance(&self, user_id: UserId) -> Result<u64, CoinError> {
        let (key, field) = coin_key(user_id);
        match self.store.get(&key, &field)? {
            Some(value) => to_balance(value),
            None => Ok(0),
        }
    }

    /// Best-effort balance: store failures read as zero.
    pub fn read(&self, user_id: UserId) -> u64 {
        self.balance(user_id).unwrap_or_else(|e| {
            warn!(user = %user_id, error = %e, "coin balance unreadable, reporting zero");
            0
        })
    }

    /// Grants the coins for `action`, returning the new balance.
    ///
    /// Failures are logged and swallowed: the increment is lost and `None`
    /// is returned. The triggering action has already happened and is not
    /// rolled back.
    pub fn reward(&self, user_id: UserId, action: RewardAction) -> Option<u64> {
        match self.increment(user_id, self.reward_amount(action)) {
            Ok(total) => Some(total),
            Err(e) => {
                warn!(user = %user_id, ?action, error = %e, "coin reward lost");
                None
            }
        }
    }
}

fn to_balance(value: i64) -> Result<u64, CoinError> {
    // Only positive deltas are ever applied, so a negative field means the
    // key was written by something else.
    u64::try_from(value).map_err(|_| CoinError::Corrupt(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin_store::MemoryCoinStore;

    struct DownStore;

    impl CoinStore for DownStore {
        fn increment_by(&self, _: &str, _: &str, _: i64) -> Result<i64, CoinError> {
            Err(CoinError::Unavailable("connection refused".into()))
        }

        fn get(&self, _: &str, _: &str) -> Result<Option<i64>, CoinError> {
            Err(CoinError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn unknown_user_reads_zero() {
        let ledger = CoinLedger::new(MemoryCoinStore::new());
        assert_eq!(ledger.balance(UserId(1)), Ok(0));
        assert_eq!(ledger.read(UserId(1)), 0);
    }

    #[test]
    fn increments_accumulate() {
        let ledger = CoinLedger::new(MemoryCoinStore::new());
        assert_eq!(ledger.increment(UserId(1), 5), Ok(5));
        assert_eq!(ledger.increment(UserId(1), 5), Ok(10));
        assert_eq!(ledger.increment(UserId(1), 25), Ok(35));
        assert_eq!(ledger.read(UserId(1)), 35);
    }

    #[test]
    fn zero_increment_is_rejected() {
        let ledger = CoinLedger::new(MemoryCoinStore::new());
        assert_eq!(ledger.increment(UserId(1), 0), Err(CoinError::InvalidAmount));
        assert!(ledger.store().is_empty());
    }

    #[test]
    fn rewards_use_configured_amounts() {
        let ledger = CoinLedger::with_rewards(
            MemoryCoinStore::new(),
            RewardConfig {
                in_app_action: 3,
                referral: 40,
            },
        );
        assert_eq!(ledger.reward(UserId(2), RewardAction::InAppAction), Some(3));
        assert_eq!(ledger.reward(UserId(2), RewardAction::Referral), Some(43));
    }

    #[test]
    fn default_rewards_match_platform_amounts() {
        let ledger = CoinLedger::new(MemoryCoinStore::new());
        assert_eq!(ledger.reward_amount(RewardAction::InAppAction), 5);
        assert_eq!(ledger.reward_amount(RewardAction::Referral), 25);
    }

    #[test]
    fn unavailable_store_is_swallowed_by_best_effort_paths() {
        let ledger = CoinLedger::new(DownStore);
        assert_eq!(ledger.reward(UserId(1), RewardAction::InAppAction), None);
        assert_eq!(ledger.read(UserId(1)), 0);
    }

    #[test]
    fn unavailable_store_surfaces_on_strict_paths() {
        let ledger = CoinLedger::new(DownStore);
        assert!(matches!(ledger.increment(UserId(1), 5), Err(CoinError::Unavailable(_))));
        assert!(matches!(ledger.balance(UserId(1)), Err(CoinError::Unavailable(_))));
    }

    #[test]
    fn negative_counter_is_reported_as_corrupt() {
        let store = MemoryCoinStore::new();
        store.increment_by("users:3:coins", "3", -4).unwrap();
        let ledger = CoinLedger::new(store);
        assert_eq!(ledger.balance(UserId(3)), Err(CoinError::Corrupt(-4)));
        assert_eq!(ledger.read(UserId(3)), 0);
    }
}

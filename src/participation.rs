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

//! Listener participation checks.

use crate::base::WalletAddress;
use crate::error::ParticipationError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::warn;

/// Decides whether a listener interacted before the escrow expired.
pub trait ParticipationCheck: Send + Sync {
    fn participated(
        &self,
        wallet: &WalletAddress,
        expiration: DateTime<Utc>,
    ) -> Result<bool, ParticipationError>;
}

impl<F> ParticipationCheck for F
where
    F: Fn(&WalletAddress, DateTime<Utc>) -> Result<bool, ParticipationError> + Send + Sync,
{
    fn participated(
        &self,
        wallet: &WalletAddress,
        expiration: DateTime<Utc>,
    ) -> Result<bool, ParticipationError> {
        self(wallet, expiration)
    }
}

/// Last interaction time per wallet.
#[derive(Debug, Clone, Default)]
pub struct ListenHistory {
    last_listened: HashMap<WalletAddress, DateTime<Utc>>,
}

impl ListenHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an interaction, keeping the latest timestamp per wallet.
    pub fn record(&mut self, wallet: WalletAddress, at: DateTime<Utc>) {
        self.last_listened
            .entry(wallet)
            .and_modify(|last| *last = (*last).max(at))
            .or_insert(at);
    }

    pub fn last_listened(&self, wallet: &WalletAddress) -> Option<DateTime<Utc>> {
        self.last_listened.get(wallet).copied()
    }
}

impl FromIterator<(WalletAddress, DateTime<Utc>)> for ListenHistory {
    fn from_iter<I: IntoIterator<Item = (WalletAddress, DateTime<Utc>)>>(iter: I) -> Self {
        let mut history = Self::new();
        for (wallet, at) in iter {
            history.record(wallet, at);
        }
        history
    }
}

impl ParticipationCheck for ListenHistory {
    /// Wallets without any recorded interaction did not participate.
    fn participated(
        &self,
        wallet: &WalletAddress,
        expiration: DateTime<Utc>,
    ) -> Result<bool, ParticipationError> {
        Ok(self
            .last_listened(wallet)
            .is_some_and(|at| at < expiration))
    }
}

/// Keeps the candidates that participated, in order.
///
/// A failed check excludes that occurrence. Duplicates are kept unless
/// `dedupe` is set, in which case only the first occurrence that passed the
/// check survives.
pub fn eligible_listeners<P: ParticipationCheck + ?Sized>(
    candidates: &[WalletAddress],
    check: &P,
    expiration: DateTime<Utc>,
    dedupe: bool,
) -> Vec<WalletAddress> {
    let mut seen = std::collections::HashSet::new();
    candidates
        .iter()
        .filter(|wallet| match check.participated(wallet, expiration) {
            Ok(participated) => participated,
            Err(e) => {
                warn!(wallet = %wallet, error = %e, "participation check failed, excluding listener");
                false
            }
        })
        .filter(|wallet| !dedupe || seen.insert((*wallet).clone()))
        .cloned()
        .collect()
}

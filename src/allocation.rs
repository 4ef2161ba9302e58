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

//! Sponsorship fee split arithmetic.
//!
//! ```text
//! artist   = fee * (1 - fan_split)
//! platform = fee * platform_rate
//! pool     = (escrowed - artist - platform) * fan_split   (AsDeployed)
//!          =  escrowed - artist - platform               (Remainder)
//! share    = pool / eligible_listeners
//! ```
//!
//! The platform cut is taken from the fee, not from what is left after the
//! artist. Under `AsDeployed` the fan split is applied a second time to the
//! remainder, which is what the production payout script has always done.

use crate::error::EscrowError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the listener pool is derived from the escrowed amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanSplitFormula {
    /// `(escrowed - artist - platform) * fan_split`.
    #[default]
    AsDeployed,
    /// `escrowed - artist - platform`.
    Remainder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub sponsorship_fee: Decimal,
    pub fan_split_percentage: Decimal,
    pub artist_allocation: Decimal,
    pub platform_allocation: Decimal,
}

impl Allocation {
    /// Splits `sponsorship_fee` between the artist and the platform.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::InvalidFee`] - fee is zero or negative.
    /// - [`EscrowError::InvalidFanSplit`] - fan split outside `[0, 1]`.
    pub fn compute(
        sponsorship_fee: Decimal,
        fan_split_percentage: Decimal,
        platform_rate: Decimal,
    ) -> Result<Self, EscrowError> {
        if sponsorship_fee <= Decimal::ZERO {
            return Err(EscrowError::InvalidFee(sponsorship_fee));
        }
        if fan_split_percentage < Decimal::ZERO || fan_split_percentage > Decimal::ONE {
            return Err(EscrowError::InvalidFanSplit(fan_split_percentage));
        }

        Ok(Self {
            sponsorship_fee,
            fan_split_percentage,
            artist_allocation: sponsorship_fee * (Decimal::ONE - fan_split_percentage),
            platform_allocation: sponsorship_fee * platform_rate,
        })
    }

    /// Amount shared by all eligible listeners. Never negative.
    pub fn listener_pool(&self, escrowed_amount: Decimal, formula: FanSplitFormula) -> Decimal {
        let remainder = escrowed_amount - self.artist_allocation - self.platform_allocation;
        let pool = match formula {
            FanSplitFormula::AsDeployed => remainder * self.fan_split_percentage,
            FanSplitFormula::Remainder => remainder,
        };
        pool.max(Decimal::ZERO)
    }

    /// Per-listener payment; zero when nobody is eligible.
    pub fn listener_share(pool: Decimal, eligible_listeners: usize) -> Decimal {
        if eligible_listeners == 0 {
            return Decimal::ZERO;
        }
        pool / Decimal::from(eligible_listeners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn artist_and_platform_from_fee() {
        let allocation = Allocation::compute(dec!(100), dec!(0.3), dec!(0.05)).unwrap();
        assert_eq!(allocation.artist_allocation, dec!(70));
        assert_eq!(allocation.platform_allocation, dec!(5));
    }

    #[test]
    fn platform_cut_ignores_fan_split() {
        let low = Allocation::compute(dec!(100), dec!(0), dec!(0.05)).unwrap();
        let high = Allocation::compute(dec!(100), dec!(1), dec!(0.05)).unwrap();
        assert_eq!(low.platform_allocation, high.platform_allocation);
        assert_eq!(low.artist_allocation, dec!(100));
        assert_eq!(high.artist_allocation, dec!(0));
    }

    #[test]
    fn as_deployed_pool_reapplies_fan_split() {
        let allocation = Allocation::compute(dec!(100), dec!(0.3), dec!(0.05)).unwrap();
        let pool = allocation.listener_pool(dec!(100), FanSplitFormula::AsDeployed);
        assert_eq!(pool, dec!(7.5));
        assert_eq!(Allocation::listener_share(pool, 4), dec!(1.875));
    }

    #[test]
    fn remainder_pool_applies_fan_split_once() {
        let allocation = Allocation::compute(dec!(100), dec!(0.3), dec!(0.05)).unwrap();
        let pool = allocation.listener_pool(dec!(100), FanSplitFormula::Remainder);
        assert_eq!(pool, dec!(25));
        assert_eq!(Allocation::listener_share(pool, 4), dec!(6.25));
    }

    #[test]
    fn short_escrow_clamps_pool_to_zero() {
        let allocation = Allocation::compute(dec!(100), dec!(0.3), dec!(0.05)).unwrap();
        assert_eq!(
            allocation.listener_pool(dec!(70), FanSplitFormula::AsDeployed),
            Decimal::ZERO
        );
    }

    #[test]
    fn no_listeners_means_no_share() {
        assert_eq!(Allocation::listener_share(dec!(7.5), 0), Decimal::ZERO);
    }

    #[test]
    fn rejects_non_positive_fee() {
        assert_eq!(
            Allocation::compute(dec!(0), dec!(0.3), dec!(0.05)),
            Err(EscrowError::InvalidFee(dec!(0)))
        );
        assert_eq!(
            Allocation::compute(dec!(-1), dec!(0.3), dec!(0.05)),
            Err(EscrowError::InvalidFee(dec!(-1)))
        );
    }

    #[test]
    fn rejects_fan_split_out_of_range() {
        assert_eq!(
            Allocation::compute(dec!(100), dec!(1.01), dec!(0.05)),
            Err(EscrowError::InvalidFanSplit(dec!(1.01)))
        );
        assert_eq!(
            Allocation::compute(dec!(100), dec!(-0.1), dec!(0.05)),
            Err(EscrowError::InvalidFanSplit(dec!(-0.1)))
        );
    }
}

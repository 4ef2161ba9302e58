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

//! Service configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.
//!
//! ```toml
//! [cache]
//! redis_url = "redis://127.0.0.1:6379/0"
//!
//! [rewards]
//! in_app_action = 5
//! referral = 25
//!
//! [escrow]
//! expiry_days = 7
//! platform_rate = "0.05"
//! fan_split_formula = "as_deployed"
//! dedupe_listeners = false
//! ```

use crate::allocation::FanSplitFormula;
use crate::error::ConfigError;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest reservation window accepted from a config file.
pub const MAX_EXPIRY_DAYS: u32 = 3650;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub rewards: RewardConfig,
    pub escrow: EscrowConfig,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the allocation run cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.escrow.expiry_days == 0 || self.escrow.expiry_days > MAX_EXPIRY_DAYS {
            return Err(ConfigError::Invalid(format!(
                "escrow.expiry_days {} must be within [1, {MAX_EXPIRY_DAYS}]",
                self.escrow.expiry_days
            )));
        }
        if self.escrow.platform_rate < Decimal::ZERO || self.escrow.platform_rate > Decimal::ONE {
            return Err(ConfigError::Invalid(format!(
                "escrow.platform_rate {} must be within [0, 1]",
                self.escrow.platform_rate
            )));
        }
        if self.rewards.in_app_action == 0 || self.rewards.referral == 0 {
            return Err(ConfigError::Invalid("reward amounts must be positive".into()));
        }
        Ok(())
    }
}

/// Key-value cache holding coin counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub redis_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
        }
    }
}

/// Coins granted per rewarded action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub in_app_action: u32,
    pub referral: u32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            in_app_action: 5,
            referral: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Days until the ledger expires a reservation.
    pub expiry_days: u32,
    /// Share of the sponsorship fee paid to the platform.
    pub platform_rate: Decimal,
    pub fan_split_formula: FanSplitFormula,
    /// Pay each listener wallet at most once per run.
    pub dedupe_listeners: bool,
    /// Release condition attached to escrow-create instructions.
    pub condition: String,
}

impl EscrowConfig {
    pub fn expiry(&self) -> Duration {
        Duration::days(i64::from(self.expiry_days))
    }

    /// `now + expiry`, or `None` when that overflows the timestamp range.
    pub fn expiration_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_add_signed(self.expiry())
    }
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            expiry_days: 7,
            platform_rate: dec!(0.05),
            fan_split_formula: FanSplitFormula::AsDeployed,
            dedupe_listeners: false,
            condition: String::new(),
        }
    }
}

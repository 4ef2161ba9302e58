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

//! Inputs of an allocation run.

use crate::base::{SponsorshipId, WalletAddress};
use crate::error::{ConfigError, EscrowError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Backend lookups feeding an allocation run.
///
/// Each call may hit the network. A failure in the wallet, split or fee
/// lookups aborts the run before anything is submitted. Listener wallets
/// are fetched after the reservation, so a failure there surfaces as
/// [`EscrowError::AfterReservation`].
pub trait SponsorshipSource {
    fn artist_wallet(&self) -> Result<WalletAddress, EscrowError>;
    fn platform_wallet(&self) -> Result<WalletAddress, EscrowError>;
    fn fan_split_percentage(&self) -> Result<Decimal, EscrowError>;
    fn sponsorship_fee(&self) -> Result<Decimal, EscrowError>;
    /// Candidate listeners in payout order, duplicates included.
    fn listener_wallets(&self) -> Result<Vec<WalletAddress>, EscrowError>;
}

/// Fixed inputs, typically loaded from a TOML file.
///
/// ```toml
/// id = "spring-drop"
/// artist_wallet = "rArtist"
/// platform_wallet = "rPlatform"
/// fan_split_percentage = "0.3"
/// sponsorship_fee = "100"
/// listener_wallets = ["rFan1", "rFan2"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticSponsorship {
    pub id: SponsorshipId,
    pub artist_wallet: WalletAddress,
    pub platform_wallet: WalletAddress,
    pub fan_split_percentage: Decimal,
    pub sponsorship_fee: Decimal,
    #[serde(default)]
    pub listener_wallets: Vec<WalletAddress>,
}

impl StaticSponsorship {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

impl SponsorshipSource for StaticSponsorship {
    fn artist_wallet(&self) -> Result<WalletAddress, EscrowError> {
        Ok(self.artist_wallet.clone())
    }

    fn platform_wallet(&self) -> Result<WalletAddress, EscrowError> {
        Ok(self.platform_wallet.clone())
    }

    fn fan_split_percentage(&self) -> Result<Decimal, EscrowError> {
        Ok(self.fan_split_percentage)
    }

    fn sponsorship_fee(&self) -> Result<Decimal, EscrowError> {
        Ok(self.sponsorship_fee)
    }

    fn listener_wallets(&self) -> Result<Vec<WalletAddress>, EscrowError> {
        Ok(self.listener_wallets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_toml() {
        let sponsorship = StaticSponsorship::from_toml_str(
            r#"
            id = "spring-drop"
            artist_wallet = "rArtist"
            platform_wallet = "rPlatform"
            fan_split_percentage = "0.3"
            sponsorship_fee = "100"
            listener_wallets = ["rFan1", "rFan2", "rFan1"]
            "#,
        )
        .unwrap();

        assert_eq!(sponsorship.id, SponsorshipId("spring-drop".into()));
        assert_eq!(sponsorship.sponsorship_fee().unwrap(), dec!(100));
        assert_eq!(sponsorship.fan_split_percentage().unwrap(), dec!(0.3));
        assert_eq!(sponsorship.listener_wallets().unwrap().len(), 3);
    }

    #[test]
    fn listeners_default_to_empty() {
        let sponsorship = StaticSponsorship::from_toml_str(
            r#"
            id = "s"
            artist_wallet = "rArtist"
            platform_wallet = "rPlatform"
            fan_split_percentage = "0.5"
            sponsorship_fee = "10"
            "#,
        )
        .unwrap();
        assert!(sponsorship.listener_wallets.is_empty());
    }

    #[test]
    fn missing_fee_is_a_parse_error() {
        let result = StaticSponsorship::from_toml_str(
            "id = \"s\"\nartist_wallet = \"a\"\nplatform_wallet = \"p\"\nfan_split_percentage = \"0.5\"\n",
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}

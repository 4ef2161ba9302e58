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

//! Error types for coin accounting, ledger submission and escrow handling.

use crate::base::{EscrowId, SponsorshipId};
use crate::ledger_client::SubmitResponse;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Coin ledger errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinError {
    /// Increment amount is zero
    #[error("invalid coin amount (must be positive)")]
    InvalidAmount,

    /// Counter would exceed the store's signed 64-bit ceiling
    #[error("coin balance overflow")]
    Overflow,

    /// Cache store could not be reached or answered with an error
    #[error("coin store unavailable: {0}")]
    Unavailable(String),

    /// Stored counter is negative, so it was not written by this ledger
    #[error("corrupt coin counter {0}")]
    Corrupt(i64),
}

/// Ledger client errors.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum LedgerError {
    /// Signature does not match the instruction and public key
    #[error("invalid instruction signature")]
    InvalidSignature,

    /// An instruction with the same hash was already submitted
    #[error("duplicate submission {0}")]
    Duplicate(String),

    /// Ledger refused the instruction
    #[error("instruction rejected: {0}")]
    Rejected(String),

    /// Network or RPC failure
    #[error("ledger transport error: {0}")]
    Transport(String),
}

/// Participation lookup errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("participation lookup failed: {0}")]
pub struct ParticipationError(pub String);

/// Escrow allocation and escrow record errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// Sponsorship fee is zero or negative
    #[error("invalid sponsorship fee {0} (must be positive)")]
    InvalidFee(Decimal),

    /// Fan split percentage outside [0, 1]
    #[error("invalid fan split percentage {0} (must be within [0, 1])")]
    InvalidFanSplit(Decimal),

    /// Escrow amount is zero or negative
    #[error("invalid escrow amount (must be positive)")]
    InvalidAmount,

    /// `now + expiry_days` is not a representable timestamp
    #[error("escrow expiry of {0} days is out of range")]
    InvalidExpiry(u32),

    /// Fetching one of the allocation inputs failed
    #[error("failed to resolve {input}: {message}")]
    InputResolution { input: &'static str, message: String },

    /// The escrow-create instruction was not accepted
    #[error("escrow reservation failed: {0}")]
    Reservation(#[source] LedgerError),

    /// The run stopped after the ledger accepted the reservation, which
    /// stays in place until it expires
    #[error("allocation aborted after reservation {}: {source}", reservation.hash)]
    AfterReservation {
        reservation: SubmitResponse,
        #[source]
        source: Box<EscrowError>,
    },

    /// Another allocation for the same sponsorship is still running
    #[error("allocation already in flight for sponsorship {0}")]
    AllocationInFlight(SponsorshipId),

    /// Referenced escrow record does not exist
    #[error("escrow {0} not found")]
    NotFound(EscrowId),
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

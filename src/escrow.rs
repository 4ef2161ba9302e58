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

//! Sponsorship escrow allocation.
//!
//! One run reserves the whole sponsorship fee for the artist, then pays the
//! participating listeners and finally the platform out of the artist's
//! wallet. The reservation covers the fee rather than the artist's share so
//! that the listener pool `escrowed - artist - platform` is funded.
//!
//! Implemented State Machine
//!
//  Pending ──reserve──► Reserved ──filter──► Paying ──platform──► PlatformPaid ──► Done
//     │                    │
//     │                    └──listener lookup failure──► Err(AfterReservation)
//     └──input or reservation failure──► Err (nothing submitted)
//
//! A failed listener payment does not stop the run; every payment outcome
//! is collected in the [`AllocationReport`]. Payments already accepted by
//! the ledger are never rolled back. An error after the reservation carries
//! the reservation's [`SubmitResponse`] so the caller can see what stands.

use crate::allocation::Allocation;
use crate::base::{SponsorshipId, WalletAddress};
use crate::config::EscrowConfig;
use crate::error::{EscrowError, LedgerError};
use crate::instruction::Instruction;
use crate::ledger_client::{LedgerClient, SubmitResponse};
use crate::participation::{ParticipationCheck, eligible_listeners};
use crate::sponsorship::SponsorshipSource;
use crate::wallet::Wallet;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStage {
    Pending,
    Reserved,
    Paying,
    PlatformPaid,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentOutcome {
    pub destination: WalletAddress,
    pub amount: Decimal,
    pub result: Result<SubmitResponse, LedgerError>,
}

impl PaymentOutcome {
    pub fn is_settled(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationReport {
    pub sponsorship_id: SponsorshipId,
    /// Furthest stage reached. `Paying` means the platform was not paid.
    pub stage: AllocationStage,
    pub allocation: Allocation,
    pub expiration: DateTime<Utc>,
    pub reservation: SubmitResponse,
    pub escrowed_amount: Decimal,
    pub fan_split_allocation: Decimal,
    pub listener_allocation: Decimal,
    pub listener_payments: Vec<PaymentOutcome>,
    /// `None` when the platform amount is zero.
    pub platform_payment: Option<PaymentOutcome>,
}

impl AllocationReport {
    pub fn failed_payments(&self) -> usize {
        self.listener_payments
            .iter()
            .chain(self.platform_payment.iter())
            .filter(|p| !p.is_settled())
            .count()
    }

    /// Sum of the payments the ledger accepted.
    pub fn settled_total(&self) -> Decimal {
        self.listener_payments
            .iter()
            .chain(self.platform_payment.iter())
            .filter_map(|p| p.result.as_ref().ok())
            .map(|r| r.amount)
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        self.stage == AllocationStage::Done && self.failed_payments() == 0
    }
}

/// Runs allocations against one ledger with the sponsor and artist keys.
pub struct EscrowAllocator<L> {
    ledger: L,
    sponsor: Wallet,
    artist: Wallet,
    config: EscrowConfig,
    /// Sponsorships with a run in progress.
    in_flight: DashSet<SponsorshipId>,
}

impl<L: LedgerClient> EscrowAllocator<L> {
    pub fn new(ledger: L, sponsor: Wallet, artist: Wallet, config: EscrowConfig) -> Self {
        Self {
            ledger,
            sponsor,
            artist,
            config,
            in_flight: DashSet::new(),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    /// Runs one allocation for `sponsorship_id`.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::AllocationInFlight`] - another run for the same sponsorship is active.
    /// - [`EscrowError::InputResolution`] - an input lookup failed, or the
    ///   artist wallet does not belong to the artist key.
    /// - [`EscrowError::InvalidFee`] / [`EscrowError::InvalidFanSplit`] - inputs out of range.
    /// - [`EscrowError::InvalidExpiry`] - the expiration timestamp overflows.
    /// - [`EscrowError::Reservation`] - the ledger refused the escrow-create.
    /// - [`EscrowError::AfterReservation`] - listener lookup failed once the
    ///   reservation was accepted; nothing else was submitted.
    ///
    /// Payment failures are not errors; see [`AllocationReport::failed_payments`].
    pub fn allocate<S, P>(
        &self,
        sponsorship_id: &SponsorshipId,
        source: &S,
        participation: &P,
        now: DateTime<Utc>,
    ) -> Result<AllocationReport, EscrowError>
    where
        S: SponsorshipSource + ?Sized,
        P: ParticipationCheck + ?Sized,
    {
        let _guard = InFlightGuard::acquire(&self.in_flight, sponsorship_id)?;
        let mut stage = AllocationStage::Pending;

        // Input resolution
        let artist_wallet = source.artist_wallet()?;
        let platform_wallet = source.platform_wallet()?;
        let fan_split_percentage = source.fan_split_percentage()?;
        let sponsorship_fee = source.sponsorship_fee()?;
        if &artist_wallet != self.artist.address() {
            return Err(EscrowError::InputResolution {
                input: "artist wallet",
                message: format!("no signing key for {artist_wallet}"),
            });
        }

        let allocation = Allocation::compute(
            sponsorship_fee,
            fan_split_percentage,
            self.config.platform_rate,
        )?;

        // Reservation
        let expiration = self
            .config
            .expiration_from(now)
            .ok_or(EscrowError::InvalidExpiry(self.config.expiry_days))?;
        let reserve = self.sponsor.sign(Instruction::EscrowCreate {
            account: self.sponsor.address().clone(),
            destination: artist_wallet.clone(),
            amount: sponsorship_fee,
            condition: self.config.condition.clone(),
            destination_tag: 0,
            source_tag: 0,
            expiration: expiration.timestamp(),
            sequence: self.sponsor.next_sequence(),
        });
        let reservation = self
            .ledger
            .submit(&reserve)
            .map_err(EscrowError::Reservation)?;
        let escrowed_amount = reservation.amount;
        stage = advance(sponsorship_id, stage, AllocationStage::Reserved);

        // Participant filtering
        let candidates = source
            .listener_wallets()
            .map_err(|e| {
                warn!(sponsorship = %sponsorship_id, hash = %reservation.hash, error = %e, "listener lookup failed after reservation");
                EscrowError::AfterReservation {
                    reservation: reservation.clone(),
                    source: Box::new(e),
                }
            })?;
        let listeners = eligible_listeners(
            &candidates,
            participation,
            expiration,
            self.config.dedupe_listeners,
        );
        let fan_split_allocation =
            allocation.listener_pool(escrowed_amount, self.config.fan_split_formula);
        let listener_allocation = Allocation::listener_share(fan_split_allocation, listeners.len());
        info!(
            sponsorship = %sponsorship_id,
            candidates = candidates.len(),
            eligible = listeners.len(),
            %fan_split_allocation,
            %listener_allocation,
            "listeners resolved"
        );
        stage = advance(sponsorship_id, stage, AllocationStage::Paying);

        // Listener payments
        let listener_payments = if listener_allocation > Decimal::ZERO {
            listeners
                .iter()
                .map(|listener| self.pay(listener, listener_allocation))
                .collect()
        } else {
            if !listeners.is_empty() {
                warn!(sponsorship = %sponsorship_id, "listener pool is empty, skipping listener payments");
            }
            Vec::new()
        };

        // Platform payment
        let platform_payment = (allocation.platform_allocation > Decimal::ZERO)
            .then(|| self.pay(&platform_wallet, allocation.platform_allocation));
        if platform_payment.as_ref().is_none_or(PaymentOutcome::is_settled) {
            stage = advance(sponsorship_id, stage, AllocationStage::PlatformPaid);
            stage = advance(sponsorship_id, stage, AllocationStage::Done);
        }

        let report = AllocationReport {
            sponsorship_id: sponsorship_id.clone(),
            stage,
            allocation,
            expiration,
            reservation,
            escrowed_amount,
            fan_split_allocation,
            listener_allocation,
            listener_payments,
            platform_payment,
        };
        if report.failed_payments() > 0 {
            warn!(
                sponsorship = %sponsorship_id,
                failed = report.failed_payments(),
                "allocation finished with failed payments"
            );
        }
        Ok(report)
    }

    /// Signs and submits one payment from the artist wallet.
    fn pay(&self, destination: &WalletAddress, amount: Decimal) -> PaymentOutcome {
        let payment = self.artist.sign(Instruction::Payment {
            account: self.artist.address().clone(),
            destination: destination.clone(),
            amount,
            sequence: self.artist.next_sequence(),
        });
        let result = self.ledger.submit(&payment);
        match &result {
            Ok(response) => debug!(%destination, %amount, hash = %response.hash, "payment settled"),
            Err(e) => warn!(%destination, %amount, error = %e, "payment failed"),
        }
        PaymentOutcome {
            destination: destination.clone(),
            amount,
            result,
        }
    }
}

fn advance(
    sponsorship_id: &SponsorshipId,
    from: AllocationStage,
    to: AllocationStage,
) -> AllocationStage {
    debug_assert!(from < to, "allocation stage moved backwards: {from:?} -> {to:?}");
    info!(sponsorship = %sponsorship_id, stage = ?to, "allocation stage");
    to
}

/// Marks a sponsorship as in flight until dropped.
struct InFlightGuard<'a> {
    in_flight: &'a DashSet<SponsorshipId>,
    id: SponsorshipId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a DashSet<SponsorshipId>, id: &SponsorshipId) -> Result<Self, EscrowError> {
        if !in_flight.insert(id.clone()) {
            return Err(EscrowError::AllocationInFlight(id.clone()));
        }
        Ok(Self {
            in_flight,
            id: id.clone(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

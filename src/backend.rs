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

//! In-memory reference implementation of the portal's booking services.
//!
//! [`InMemoryBackend`] plays the persistence, balance, voucher and
//! duplicate-check collaborators. It backs the CLI, the demo server and the
//! integration tests.
//!
//! # Finalize
//!
//! - Replayed idempotency keys return the original booking id.
//! - Training fund, program tickets and vouchers are checked and deducted
//!   under the organization's lock, together with the insert.
//! - A card balance must come with a payment intent id.
//!
//! # Thread Safety
//!
//! Organizations live in a [`DashMap`]; bookings for different
//! organizations proceed in parallel.

use crate::allocation::RemainingMethod;
use crate::base::{OrganizationId, is_settled};
use crate::booking::{BookingRequest, OrganizationBalances, Voucher};
use crate::booking_log::{BookingLog, Recorded};
use crate::collaborators::{
    BalanceProvider, BookingPersistence, BookingResponse, DuplicateCheckEndpoint,
    DuplicateCheckRequest, DuplicateCheckResponse, VoucherProvider,
};
use crate::error::{BookingError, LedgerError};
use crate::organization::OrganizationAccount;
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, info};

pub struct InMemoryBackend {
    organizations: DashMap<OrganizationId, OrganizationAccount>,
    bookings: BookingLog,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        InMemoryBackend {
            organizations: DashMap::new(),
            bookings: BookingLog::new(),
        }
    }

    /// Returns the organization's account, creating an empty one if needed.
    pub fn organization(
        &self,
        organization_id: &OrganizationId,
    ) -> dashmap::mapref::one::Ref<'_, OrganizationId, OrganizationAccount> {
        self.organizations
            .entry(organization_id.clone())
            .or_insert_with(|| OrganizationAccount::new(organization_id.clone()))
            .downgrade()
    }

    pub fn bookings(&self) -> &BookingLog {
        &self.bookings
    }

    /// Records a booking, applying its deductions exactly once.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::OrganizationNotFound`] if the booking draws on funds
    ///   of an unknown organization, or a guest books a program event.
    /// - Any deduction failure from [`OrganizationAccount::apply_booking`].
    pub fn finalize(&self, request: &BookingRequest) -> Result<Recorded, LedgerError> {
        if request.remaining_method == RemainingMethod::Card
            && !is_settled(request.remaining_balance)
            && request.payment_intent_id.is_none()
        {
            return Err(LedgerError::PaymentMissing);
        }

        let draws_on_funds = request.training_fund_applied > Decimal::ZERO
            || !request.voucher_ids.is_empty()
            || request.program_tag.is_some();

        self.bookings.record(request, || {
            if !draws_on_funds {
                return Ok(());
            }
            let organization_id = request
                .booker
                .organization_id()
                .ok_or(LedgerError::OrganizationNotFound)?;
            let account = self
                .organizations
                .get(organization_id)
                .ok_or(LedgerError::OrganizationNotFound)?;
            account.apply_booking(request)
        })
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BalanceProvider for InMemoryBackend {
    async fn organization_balances(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<OrganizationBalances, BookingError> {
        Ok(self
            .organizations
            .get(organization_id)
            .map(|account| account.balances())
            .unwrap_or_default())
    }
}

#[async_trait]
impl VoucherProvider for InMemoryBackend {
    async fn active_vouchers(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<Voucher>, BookingError> {
        Ok(self
            .organizations
            .get(organization_id)
            .map(|account| account.active_vouchers())
            .unwrap_or_default())
    }
}

#[async_trait]
impl DuplicateCheckEndpoint for InMemoryBackend {
    async fn check_duplicates(
        &self,
        request: &DuplicateCheckRequest,
    ) -> Result<DuplicateCheckResponse, BookingError> {
        let duplicates = self
            .bookings
            .registered_attendees(&request.event_id, &request.attendee_emails);
        debug!(event_id = %request.event_id, found = duplicates.len(), "checked for duplicate attendees");
        Ok(DuplicateCheckResponse {
            success: true,
            has_duplicates: !duplicates.is_empty(),
            duplicates,
            error: None,
        })
    }
}

#[async_trait]
impl BookingPersistence for InMemoryBackend {
    async fn create_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingResponse, BookingError> {
        match self.finalize(request) {
            Ok(recorded) => {
                if let Recorded::Replayed(booking_id) = &recorded {
                    info!(%booking_id, key = %request.idempotency_key, "replayed booking request");
                }
                Ok(BookingResponse {
                    success: true,
                    booking_id: Some(recorded.booking_id().clone()),
                    error: None,
                })
            }
            Err(err) => Ok(BookingResponse {
                success: false,
                booking_id: None,
                error: Some(err.to_string()),
            }),
        }
    }
}

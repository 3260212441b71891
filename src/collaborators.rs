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

//! Boundary contracts with the rest of the portal.
//!
//! The engine never owns balances, vouchers or bookings. It reads through
//! these traits and hands the finalize payload to [`BookingPersistence`],
//! which is responsible for decrementing balances and consuming vouchers
//! atomically with the insert.
//!
//! Wire types use camelCase field names and send money as strings.

use crate::base::{BookingId, EventId, IntentId, Money, OrganizationId};
use crate::booking::{BookingRequest, OrganizationBalances, Voucher};
use crate::duplicate_guard::DuplicateAttendee;
use crate::error::BookingError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reads organization balances.
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    /// # Errors
    ///
    /// [`BookingError::Infrastructure`] if the balances cannot be fetched.
    async fn organization_balances(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<OrganizationBalances, BookingError>;
}

/// Lists an organization's vouchers.
#[async_trait]
pub trait VoucherProvider: Send + Sync {
    /// # Errors
    ///
    /// [`BookingError::Infrastructure`] if the vouchers cannot be fetched.
    async fn active_vouchers(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<Voucher>, BookingError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCheckRequest {
    pub event_id: EventId,
    pub attendee_emails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCheckResponse {
    pub success: bool,
    #[serde(default)]
    pub has_duplicates: bool,
    #[serde(default)]
    pub duplicates: Vec<DuplicateAttendee>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST {eventId, attendeeEmails[]}`.
#[async_trait]
pub trait DuplicateCheckEndpoint: Send + Sync {
    /// # Errors
    ///
    /// [`BookingError::Infrastructure`] on transport failure.
    async fn check_duplicates(
        &self,
        request: &DuplicateCheckRequest,
    ) -> Result<DuplicateCheckResponse, BookingError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub amount: Money,
    pub currency: String,
    pub payer_email: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub success: bool,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub intent_id: Option<IntentId>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST {amount, currency, payerEmail, metadata}`.
#[async_trait]
pub trait PaymentIntentEndpoint: Send + Sync {
    /// # Errors
    ///
    /// [`BookingError::Infrastructure`] on transport failure.
    async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntentResponse, BookingError>;
}

/// Result of the hosted SDK's client-side confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Succeeded,
    Failed(String),
}

/// Client-side card confirmation supplied by the hosted payment SDK.
#[async_trait]
pub trait CardGateway: Send + Sync {
    async fn confirm(&self, client_secret: &str) -> ConfirmOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub success: bool,
    #[serde(default)]
    pub booking_id: Option<BookingId>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST BookingRequest`. Must decrement balances, consume vouchers and
/// insert the booking atomically, and treat a repeated idempotency key as
/// the same booking.
#[async_trait]
pub trait BookingPersistence: Send + Sync {
    /// # Errors
    ///
    /// [`BookingError::Infrastructure`] on transport failure.
    async fn create_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingResponse, BookingError>;
}

/// Per-key scratch store for form drafts, no transactions.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// # Errors
    ///
    /// [`BookingError::Infrastructure`] if the store is unreachable.
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, BookingError>;

    /// # Errors
    ///
    /// [`BookingError::Infrastructure`] if the store is unreachable.
    async fn save(&self, key: &str, value: serde_json::Value) -> Result<(), BookingError>;

    /// # Errors
    ///
    /// [`BookingError::Infrastructure`] if the store is unreachable.
    async fn clear(&self, key: &str) -> Result<(), BookingError>;
}

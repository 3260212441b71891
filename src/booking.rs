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

//! Booking inputs and the finalize payload.
//!
//! [`BookingForm`] is what the booker edits (and what the draft store keeps).
//! [`BookingRequest`] is assembled once from a form right before submission
//! and handed whole to the persistence collaborator.

use crate::allocation::{AccountReference, AllocationResult, PaymentChoice, RemainingMethod};
use crate::base::{
    EventId, IntentId, MemberId, Money, OrganizationId, ProgramTag, RoleId, TicketClassId,
    VoucherId, normalize_email,
};
use crate::error::ValidationError;
use crate::pricing::CostBreakdown;
use crate::ticket::TicketClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Event being booked, as far as pricing is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    pub id: EventId,
    pub title: String,
    /// Program events draw on prepaid program tickets.
    #[serde(default)]
    pub program_tag: Option<ProgramTag>,
    #[serde(default)]
    pub ticket_classes: Vec<TicketClass>,
}

/// Where an attendee row came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttendeeSource {
    /// The logged-in member booking a place for themselves.
    SubmittingMember,
    /// Picked from the member directory, names are already verified.
    Directory { member_id: MemberId },
    /// Typed in by the booker.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub source: AttendeeSource,
}

impl Attendee {
    pub fn manual(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            source: AttendeeSource::Manual,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_owned()
    }

    /// An untouched manual row; ignored rather than rejected.
    fn is_blank(&self) -> bool {
        self.source == AttendeeSource::Manual
            && self.first_name.trim().is_empty()
            && self.last_name.trim().is_empty()
            && self.email.trim().is_empty()
    }

    fn has_full_name(&self) -> bool {
        !self.first_name.trim().is_empty() && !self.last_name.trim().is_empty()
    }
}

/// How places are requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RegistrationMode {
    /// Named attendees.
    Attendees { attendees: Vec<Attendee> },
    /// Registration links sent out later; attendees fill in their own details.
    Links { count: u32 },
}

impl Default for RegistrationMode {
    fn default() -> Self {
        Self::Attendees {
            attendees: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCheckout {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberCheckout {
    pub member_id: MemberId,
    pub organization_id: OrganizationId,
    pub email: String,
    #[serde(default)]
    pub roles: HashSet<RoleId>,
}

/// Who is booking. Guests are card-only and have no organization funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Checkout {
    Guest(GuestCheckout),
    Member(MemberCheckout),
}

impl Checkout {
    pub fn allows_account_payment(&self) -> bool {
        matches!(self, Self::Member(_))
    }

    pub fn organization_id(&self) -> Option<&OrganizationId> {
        match self {
            Self::Guest(_) => None,
            Self::Member(member) => Some(&member.organization_id),
        }
    }

    pub fn roles(&self) -> HashSet<RoleId> {
        match self {
            Self::Guest(_) => HashSet::new(),
            Self::Member(member) => member.roles.clone(),
        }
    }

    pub fn payer_email(&self) -> &str {
        match self {
            Self::Guest(guest) => guest.email.trim(),
            Self::Member(member) => member.email.trim(),
        }
    }
}

/// Current state of the booking form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingForm {
    pub checkout: Checkout,
    /// Ignored for guests, who always book a single place for themselves.
    #[serde(default)]
    pub registration: RegistrationMode,
    #[serde(default)]
    pub ticket_class_id: Option<TicketClassId>,
    #[serde(default)]
    pub selected_voucher_ids: Vec<VoucherId>,
    #[serde(default)]
    pub voucher_requested: Option<Money>,
    #[serde(default)]
    pub training_fund_requested: Option<Money>,
    #[serde(default)]
    pub payment: PaymentChoice,
}

impl BookingForm {
    pub fn new(checkout: Checkout) -> Self {
        Self {
            checkout,
            registration: RegistrationMode::default(),
            ticket_class_id: None,
            selected_voucher_ids: Vec::new(),
            voucher_requested: None,
            training_fund_requested: None,
            payment: PaymentChoice::default(),
        }
    }

    /// Attendee rows that count towards the booking, blank rows dropped.
    pub fn attendees(&self) -> Vec<Attendee> {
        match (&self.checkout, &self.registration) {
            (Checkout::Guest(guest), _) => vec![Attendee {
                first_name: guest.first_name.clone(),
                last_name: guest.last_name.clone(),
                email: guest.email.clone(),
                source: AttendeeSource::Manual,
            }],
            (Checkout::Member(_), RegistrationMode::Attendees { attendees }) => attendees
                .iter()
                .filter(|attendee| !attendee.is_blank())
                .cloned()
                .collect(),
            (Checkout::Member(_), RegistrationMode::Links { .. }) => Vec::new(),
        }
    }

    /// Checks that every manually entered attendee has a full name.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingAttendeeName`] with the position of the first
    /// offending attendee.
    pub fn validate_attendees(&self) -> Result<(), ValidationError> {
        for (index, attendee) in self.attendees().iter().enumerate() {
            if attendee.source == AttendeeSource::Manual && !attendee.has_full_name() {
                return Err(ValidationError::MissingAttendeeName { index });
            }
        }
        Ok(())
    }

    pub fn tickets_required(&self) -> u32 {
        match (&self.checkout, &self.registration) {
            (Checkout::Member(_), RegistrationMode::Links { count }) => *count,
            _ => u32::try_from(self.attendees().len()).unwrap_or(u32::MAX),
        }
    }

    pub fn is_link_registration(&self) -> bool {
        matches!(
            (&self.checkout, &self.registration),
            (Checkout::Member(_), RegistrationMode::Links { .. })
        )
    }

    /// Normalized, de-duplicated attendee emails for the duplicate check.
    pub fn attendee_emails(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.attendees()
            .iter()
            .map(|attendee| normalize_email(&attendee.email))
            .filter(|email| !email.is_empty() && seen.insert(email.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherStatus {
    Active,
    Consumed,
}

/// Single-use stored-value credit for an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub id: VoucherId,
    pub organization_id: OrganizationId,
    pub value: Money,
    pub status: VoucherStatus,
}

impl Voucher {
    pub fn is_usable(&self) -> bool {
        self.status == VoucherStatus::Active && self.value > Decimal::ZERO
    }
}

/// Organization balances as reported by the balance provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationBalances {
    pub training_fund_balance: Money,
    #[serde(default)]
    pub program_ticket_balances: HashMap<ProgramTag, u32>,
}

/// Funds visible to the booker when the form was opened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FundingSnapshot {
    pub balances: OrganizationBalances,
    /// Usable vouchers only.
    pub vouchers: Vec<Voucher>,
    /// A provider could not be reached and the snapshot is empty as a result.
    pub degraded: bool,
}

impl FundingSnapshot {
    /// Keeps the first usable entry per voucher id.
    pub fn new(balances: OrganizationBalances, vouchers: Vec<Voucher>) -> Self {
        let mut seen = HashSet::new();
        let vouchers = vouchers
            .into_iter()
            .filter(|voucher| voucher.is_usable() && seen.insert(voucher.id.clone()))
            .collect();
        Self {
            balances,
            vouchers,
            degraded: false,
        }
    }

    /// Selected vouchers that are actually held, unknown ids skipped.
    pub fn selected_vouchers<'a>(&'a self, ids: &'a [VoucherId]) -> impl Iterator<Item = &'a Voucher> {
        self.vouchers
            .iter()
            .filter(move |voucher| ids.contains(&voucher.id))
    }

    pub fn selected_voucher_value(&self, ids: &[VoucherId]) -> Money {
        self.selected_vouchers(ids).map(|voucher| voucher.value).sum()
    }

    pub fn program_tickets(&self, tag: &ProgramTag) -> u32 {
        self.balances
            .program_ticket_balances
            .get(tag)
            .copied()
            .unwrap_or(0)
    }
}

/// Finalize payload, assembled once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    /// Fixed at assembly; replays of the same request must not double-book.
    pub idempotency_key: Uuid,
    pub event_id: EventId,
    pub program_tag: Option<ProgramTag>,
    pub registration: RegistrationMode,
    pub attendees: Vec<Attendee>,
    pub ticket_class_id: Option<TicketClassId>,
    pub tickets_required: u32,
    pub total_cost: Money,
    pub voucher_ids: Vec<VoucherId>,
    pub voucher_applied: Money,
    pub training_fund_applied: Money,
    pub remaining_balance: Money,
    pub remaining_method: RemainingMethod,
    pub account_reference: Option<AccountReference>,
    pub payment_intent_id: Option<IntentId>,
    pub booker: Checkout,
}

impl BookingRequest {
    pub fn assemble(
        event: &EventDetails,
        form: &BookingForm,
        funding: &FundingSnapshot,
        breakdown: &CostBreakdown,
        ticket_class_id: Option<TicketClassId>,
        allocation: &AllocationResult,
    ) -> Self {
        let voucher_ids = if allocation.voucher_applied > Decimal::ZERO {
            funding
                .selected_vouchers(&form.selected_voucher_ids)
                .map(|voucher| voucher.id.clone())
                .collect()
        } else {
            Vec::new()
        };
        let registration = match form.checkout {
            Checkout::Guest(_) => RegistrationMode::Attendees {
                attendees: form.attendees(),
            },
            Checkout::Member(_) => form.registration.clone(),
        };

        Self {
            idempotency_key: Uuid::new_v4(),
            event_id: event.id.clone(),
            program_tag: event.program_tag.clone(),
            registration,
            attendees: form.attendees(),
            ticket_class_id,
            tickets_required: breakdown.tickets_required,
            total_cost: breakdown.total_cost,
            voucher_ids,
            voucher_applied: allocation.voucher_applied,
            training_fund_applied: allocation.training_fund_applied,
            remaining_balance: allocation.remaining_balance,
            remaining_method: allocation.remaining_method,
            account_reference: allocation.account_reference.clone(),
            payment_intent_id: None,
            booker: form.checkout.clone(),
        }
    }

    pub(crate) fn with_payment_intent(mut self, intent_id: IntentId) -> Self {
        self.payment_intent_id = Some(intent_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn member_form(attendees: Vec<Attendee>) -> BookingForm {
        let mut form = BookingForm::new(Checkout::Member(MemberCheckout {
            member_id: MemberId::from("m-1"),
            organization_id: OrganizationId::from("org-1"),
            email: "lead@example.org".into(),
            roles: HashSet::new(),
        }));
        form.registration = RegistrationMode::Attendees { attendees };
        form
    }

    #[test]
    fn blank_rows_do_not_count() {
        let form = member_form(vec![
            Attendee::manual("Ann", "Lee", "ann@example.org"),
            Attendee::manual("", " ", ""),
        ]);
        assert_eq!(form.tickets_required(), 1);
        assert!(form.validate_attendees().is_ok());
    }

    #[test]
    fn manual_attendee_needs_both_names() {
        let form = member_form(vec![
            Attendee::manual("Ann", "Lee", "ann@example.org"),
            Attendee::manual("Bo", "", "bo@example.org"),
        ]);
        assert_eq!(
            form.validate_attendees(),
            Err(ValidationError::MissingAttendeeName { index: 1 })
        );
    }

    #[test]
    fn directory_attendees_skip_name_check() {
        let form = member_form(vec![Attendee {
            first_name: String::new(),
            last_name: String::new(),
            email: "dir@example.org".into(),
            source: AttendeeSource::Directory {
                member_id: MemberId::from("m-9"),
            },
        }]);
        assert!(form.validate_attendees().is_ok());
        assert_eq!(form.tickets_required(), 1);
    }

    #[test]
    fn emails_are_normalized_and_unique() {
        let form = member_form(vec![
            Attendee::manual("Ann", "Lee", " Ann@Example.org"),
            Attendee::manual("Ann", "Lee", "ann@example.org "),
            Attendee::manual("Cy", "No-Mail", ""),
        ]);
        assert_eq!(form.attendee_emails(), vec!["ann@example.org".to_owned()]);
    }

    #[test]
    fn link_registration_counts_links() {
        let mut form = member_form(Vec::new());
        form.registration = RegistrationMode::Links { count: 4 };
        assert_eq!(form.tickets_required(), 4);
        assert!(form.attendee_emails().is_empty());
        assert!(form.is_link_registration());
    }

    #[test]
    fn guest_books_one_place() {
        let form = BookingForm::new(Checkout::Guest(GuestCheckout {
            first_name: "Sam".into(),
            last_name: "Guest".into(),
            email: "Sam@Example.org".into(),
        }));
        assert_eq!(form.tickets_required(), 1);
        assert_eq!(form.attendee_emails(), vec!["sam@example.org".to_owned()]);
        assert!(!form.checkout.allows_account_payment());
    }

    #[test]
    fn funding_snapshot_ignores_unusable_vouchers() {
        let org = OrganizationId::from("org-1");
        let snapshot = FundingSnapshot::new(
            OrganizationBalances::default(),
            vec![
                Voucher {
                    id: VoucherId::from("v1"),
                    organization_id: org.clone(),
                    value: dec!(30),
                    status: VoucherStatus::Active,
                },
                Voucher {
                    id: VoucherId::from("v2"),
                    organization_id: org.clone(),
                    value: dec!(10),
                    status: VoucherStatus::Consumed,
                },
                Voucher {
                    id: VoucherId::from("v3"),
                    organization_id: org,
                    value: dec!(0),
                    status: VoucherStatus::Active,
                },
            ],
        );
        assert_eq!(snapshot.vouchers.len(), 1);
        let ids = vec![VoucherId::from("v1"), VoucherId::from("v2"), VoucherId::from("nope")];
        assert_eq!(snapshot.selected_voucher_value(&ids), dec!(30));
    }

    #[test]
    fn funding_snapshot_counts_a_repeated_voucher_once() {
        let voucher = Voucher {
            id: VoucherId::from("v1"),
            organization_id: OrganizationId::from("org-1"),
            value: dec!(30),
            status: VoucherStatus::Active,
        };
        let snapshot = FundingSnapshot::new(
            OrganizationBalances::default(),
            vec![voucher.clone(), voucher],
        );
        assert_eq!(snapshot.vouchers.len(), 1);
        let ids = vec![VoucherId::from("v1"), VoucherId::from("v1")];
        assert_eq!(snapshot.selected_voucher_value(&ids), dec!(30));
    }

    #[test]
    fn form_round_trips_through_json() {
        let form = member_form(vec![Attendee::manual("Ann", "Lee", "ann@example.org")]);
        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json["checkout"]["type"], "member");
        let back: BookingForm = serde_json::from_value(json).unwrap();
        assert_eq!(back, form);
    }
}

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

//! Integration tests for the in-memory booking backend.

use booking_engine_rs::collaborators::{
    BalanceProvider, BookingPersistence, DuplicateCheckEndpoint, DuplicateCheckRequest,
};
use booking_engine_rs::{
    Attendee, BookingRequest, Checkout, GuestCheckout, InMemoryBackend, IntentId, LedgerError,
    MemberCheckout, OrganizationId, ProgramTag, Recorded, RegistrationMode, RemainingMethod,
    VoucherId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use uuid::Uuid;

fn org_id() -> OrganizationId {
    OrganizationId::from("org-1")
}

fn member() -> Checkout {
    Checkout::Member(MemberCheckout {
        member_id: "m-1".into(),
        organization_id: org_id(),
        email: "lead@example.org".into(),
        roles: HashSet::new(),
    })
}

fn funded_backend() -> InMemoryBackend {
    let backend = InMemoryBackend::new();
    {
        let org = backend.organization(&org_id());
        org.credit_training_fund(dec!(100)).unwrap();
        org.issue_voucher(VoucherId::from("v-1"), dec!(30)).unwrap();
        org.add_program_tickets(ProgramTag::from("leadership"), 5);
    }
    backend
}

/// A booking settled on account with the given training fund draw.
fn request(event: &str, attendees: Vec<Attendee>, training_fund: Decimal) -> BookingRequest {
    let tickets = attendees.len() as u32;
    BookingRequest {
        idempotency_key: Uuid::new_v4(),
        event_id: event.into(),
        program_tag: None,
        registration: RegistrationMode::Attendees {
            attendees: attendees.clone(),
        },
        attendees,
        ticket_class_id: None,
        tickets_required: tickets,
        total_cost: training_fund,
        voucher_ids: Vec::new(),
        voucher_applied: Decimal::ZERO,
        training_fund_applied: training_fund,
        remaining_balance: Decimal::ZERO,
        remaining_method: RemainingMethod::Account,
        account_reference: None,
        payment_intent_id: None,
        booker: member(),
    }
}

fn ada() -> Attendee {
    Attendee::manual("Ada", "Lovelace", "ada@example.com")
}

// === Finalize ===

#[test]
fn finalize_deducts_every_funding_source() {
    let backend = funded_backend();
    let mut req = request("evt-1", vec![ada()], dec!(20));
    req.program_tag = Some(ProgramTag::from("leadership"));
    req.total_cost = dec!(50);
    req.voucher_ids = vec![VoucherId::from("v-1")];
    req.voucher_applied = dec!(30);

    let recorded = backend.finalize(&req).unwrap();

    assert!(matches!(recorded, Recorded::Created(_)));
    let org = backend.organization(&org_id());
    let balances = org.balances();
    assert_eq!(balances.training_fund_balance, dec!(80));
    assert_eq!(
        balances.program_ticket_balances[&ProgramTag::from("leadership")],
        4
    );
    assert!(org.active_vouchers().is_empty());
}

#[test]
fn voucher_listed_twice_is_refused() {
    let backend = funded_backend();
    let mut req = request("evt-1", vec![ada()], dec!(0));
    req.total_cost = dec!(60);
    req.voucher_ids = vec![VoucherId::from("v-1"), VoucherId::from("v-1")];
    req.voucher_applied = dec!(60);

    assert_eq!(backend.finalize(&req), Err(LedgerError::VoucherUnavailable));
    assert!(backend.bookings().is_empty());
    assert_eq!(backend.organization(&org_id()).active_vouchers().len(), 1);
}

#[test]
fn replayed_key_returns_the_original_booking() {
    let backend = funded_backend();
    let req = request("evt-1", vec![ada()], dec!(40));

    let first = backend.finalize(&req).unwrap();
    let second = backend.finalize(&req).unwrap();

    assert!(matches!(second, Recorded::Replayed(_)));
    assert_eq!(first.booking_id(), second.booking_id());
    assert_eq!(backend.bookings().len(), 1);
    assert_eq!(
        backend.organization(&org_id()).balances().training_fund_balance,
        dec!(60)
    );
}

#[test]
fn insufficient_fund_records_nothing() {
    let backend = funded_backend();
    let req = request("evt-1", vec![ada()], dec!(100.01));

    assert_eq!(
        backend.finalize(&req),
        Err(LedgerError::InsufficientTrainingFund)
    );
    assert!(backend.bookings().is_empty());
    assert_eq!(
        backend.organization(&org_id()).balances().training_fund_balance,
        dec!(100)
    );
}

#[test]
fn consumed_voucher_cannot_be_reused() {
    let backend = funded_backend();
    let mut first = request("evt-1", vec![ada()], dec!(0));
    first.voucher_ids = vec![VoucherId::from("v-1")];
    first.voucher_applied = dec!(30);
    backend.finalize(&first).unwrap();

    let mut second = first.clone();
    second.idempotency_key = Uuid::new_v4();

    assert_eq!(
        backend.finalize(&second),
        Err(LedgerError::VoucherUnavailable)
    );
}

#[test]
fn applied_voucher_value_must_be_covered() {
    let backend = funded_backend();
    let mut req = request("evt-1", vec![ada()], dec!(0));
    req.voucher_ids = vec![VoucherId::from("v-1")];
    req.voucher_applied = dec!(35);

    assert_eq!(backend.finalize(&req), Err(LedgerError::VoucherShortfall));
}

#[test]
fn card_balance_needs_a_payment_intent() {
    let backend = funded_backend();
    let mut req = request("evt-1", vec![ada()], dec!(0));
    req.remaining_balance = dec!(25);
    req.remaining_method = RemainingMethod::Card;

    assert_eq!(backend.finalize(&req), Err(LedgerError::PaymentMissing));

    req.payment_intent_id = Some(IntentId::from("pi_1"));
    assert!(backend.finalize(&req).is_ok());
}

#[test]
fn guest_cannot_draw_program_tickets() {
    let backend = funded_backend();
    let mut req = request("evt-1", vec![ada()], dec!(0));
    req.program_tag = Some(ProgramTag::from("leadership"));
    req.booker = Checkout::Guest(GuestCheckout {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: "ada@example.com".into(),
    });

    assert_eq!(
        backend.finalize(&req),
        Err(LedgerError::OrganizationNotFound)
    );
}

#[test]
fn unfunded_booking_needs_no_organization() {
    let backend = InMemoryBackend::new();
    let req = request("evt-1", vec![ada()], dec!(0));

    assert!(backend.finalize(&req).is_ok());
}

#[test]
fn booking_ids_follow_creation_order() {
    let backend = funded_backend();
    let ids: Vec<_> = (0..3)
        .map(|_| {
            backend
                .finalize(&request("evt-1", vec![], dec!(1)))
                .unwrap()
                .booking_id()
                .clone()
        })
        .collect();

    assert_eq!(ids[0].as_str(), "BK-000001");
    assert_eq!(backend.bookings().drain_in_order(), ids);
    assert!(backend.bookings().drain_in_order().is_empty());
    assert_eq!(backend.bookings().len(), 3);
}

// === Collaborator traits ===

#[tokio::test]
async fn create_booking_reports_ledger_errors_in_the_body() {
    let backend = funded_backend();
    let req = request("evt-1", vec![ada()], dec!(500));

    let response = backend.create_booking(&req).await.unwrap();

    assert!(!response.success);
    assert_eq!(response.booking_id, None);
    assert_eq!(
        response.error.as_deref(),
        Some("insufficient training fund balance")
    );
}

#[tokio::test]
async fn duplicate_check_matches_the_same_event_only() {
    let backend = funded_backend();
    backend
        .finalize(&request("evt-1", vec![ada()], dec!(0)))
        .unwrap();
    backend
        .finalize(&request(
            "evt-2",
            vec![Attendee::manual("Alan", "Turing", "alan@example.com")],
            dec!(0),
        ))
        .unwrap();

    let response = backend
        .check_duplicates(&DuplicateCheckRequest {
            event_id: "evt-1".into(),
            attendee_emails: vec!["ada@example.com".into(), "alan@example.com".into()],
        })
        .await
        .unwrap();

    assert!(response.success);
    assert!(response.has_duplicates);
    assert_eq!(response.duplicates.len(), 1);
    assert_eq!(response.duplicates[0].name, "Ada Lovelace");
}

#[tokio::test]
async fn unknown_organization_has_empty_balances() {
    let backend = InMemoryBackend::new();

    let balances = backend
        .organization_balances(&OrganizationId::from("nobody"))
        .await
        .unwrap();

    assert_eq!(balances.training_fund_balance, Decimal::ZERO);
    assert!(balances.program_ticket_balances.is_empty());
}

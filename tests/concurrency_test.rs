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

//! Deadlock and race tests for concurrent finalizes.
//!
//! Uses parking_lot's `deadlock_detection` feature to watch the organization
//! locks while rayon drives finalizes, replays and reads in parallel.

use booking_engine_rs::{
    Attendee, BookingRequest, Checkout, InMemoryBackend, MemberCheckout, OrganizationId,
    RegistrationMode, RemainingMethod,
};
use parking_lot::deadlock;
use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Starts a background thread that periodically checks for deadlocks.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150));
}

fn org(n: usize) -> OrganizationId {
    OrganizationId(format!("org-{n}"))
}

fn booking(org_index: usize, n: usize, training_fund: Decimal) -> BookingRequest {
    let attendees = vec![Attendee::manual(
        "Member",
        format!("{n}"),
        format!("member{n}@org{org_index}.example"),
    )];
    BookingRequest {
        idempotency_key: Uuid::new_v4(),
        event_id: "evt-1".into(),
        program_tag: None,
        registration: RegistrationMode::Attendees {
            attendees: attendees.clone(),
        },
        attendees,
        ticket_class_id: None,
        tickets_required: 1,
        total_cost: training_fund,
        voucher_ids: Vec::new(),
        voucher_applied: Decimal::ZERO,
        training_fund_applied: training_fund,
        remaining_balance: Decimal::ZERO,
        remaining_method: RemainingMethod::Account,
        account_reference: None,
        payment_intent_id: None,
        booker: Checkout::Member(MemberCheckout {
            member_id: format!("m-{n}").as_str().into(),
            organization_id: org(org_index),
            email: "lead@example.org".into(),
            roles: HashSet::new(),
        }),
    }
}

#[test]
fn training_fund_is_never_overdrawn() {
    let detector = start_deadlock_detector();
    let backend = InMemoryBackend::new();
    backend
        .organization(&org(1))
        .credit_training_fund(dec!(500))
        .unwrap();

    let accepted = AtomicUsize::new(0);
    (0..200).into_par_iter().for_each(|n| {
        if backend.finalize(&booking(1, n, dec!(10))).is_ok() {
            accepted.fetch_add(1, Ordering::SeqCst);
        }
        let _ = backend.organization(&org(1)).balances();
    });

    stop_deadlock_detector(detector);

    assert_eq!(accepted.load(Ordering::SeqCst), 50);
    assert_eq!(backend.bookings().len(), 50);
    assert_eq!(
        backend.organization(&org(1)).balances().training_fund_balance,
        Decimal::ZERO
    );
}

#[test]
fn concurrent_replays_book_once() {
    let detector = start_deadlock_detector();
    let backend = InMemoryBackend::new();
    backend
        .organization(&org(1))
        .credit_training_fund(dec!(100))
        .unwrap();
    let request = booking(1, 0, dec!(25));

    let ids: HashSet<String> = (0..64)
        .into_par_iter()
        .map(|_| {
            backend
                .finalize(&request)
                .unwrap()
                .booking_id()
                .as_str()
                .to_owned()
        })
        .collect();

    stop_deadlock_detector(detector);

    assert_eq!(ids.len(), 1);
    assert_eq!(backend.bookings().len(), 1);
    assert_eq!(
        backend.organization(&org(1)).balances().training_fund_balance,
        dec!(75)
    );
}

#[test]
fn organizations_book_in_parallel() {
    const ORGS: usize = 8;
    const BOOKINGS_PER_ORG: usize = 25;

    let detector = start_deadlock_detector();
    let backend = InMemoryBackend::new();
    for n in 0..ORGS {
        backend
            .organization(&org(n))
            .credit_training_fund(dec!(1000))
            .unwrap();
    }

    (0..ORGS * BOOKINGS_PER_ORG).into_par_iter().for_each(|i| {
        let org_index = i % ORGS;
        backend
            .finalize(&booking(org_index, i, dec!(4)))
            .unwrap();
        let emails = vec![format!("member{i}@org{org_index}.example")];
        let duplicates = backend.bookings().registered_attendees(&"evt-1".into(), &emails);
        assert_eq!(duplicates.len(), 1);
    });

    stop_deadlock_detector(detector);

    assert_eq!(backend.bookings().len(), ORGS * BOOKINGS_PER_ORG);
    for n in 0..ORGS {
        assert_eq!(
            backend.organization(&org(n)).balances().training_fund_balance,
            dec!(900)
        );
    }
}

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

//! Thread-safe booking log with idempotent inserts.
//!
//! Bookings are keyed by the request's idempotency key, so replaying a
//! finalize after a lost response returns the original booking instead of
//! creating a second one.

use crate::base::{BookingId, EventId, normalize_email};
use crate::booking::BookingRequest;
use crate::duplicate_guard::DuplicateAttendee;
use crate::error::LedgerError;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// A recorded booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBooking {
    pub booking_id: BookingId,
    pub request: Arc<BookingRequest>,
}

/// Result of [`BookingLog::record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Created(BookingId),
    /// The idempotency key was seen before; nothing was applied again.
    Replayed(BookingId),
}

impl Recorded {
    pub fn booking_id(&self) -> &BookingId {
        match self {
            Self::Created(id) | Self::Replayed(id) => id,
        }
    }
}

/// Combines a [`DashMap`] for O(1) idempotency checks with a [`SegQueue`]
/// preserving insertion order.
#[derive(Debug, Default)]
pub struct BookingLog {
    bookings: DashMap<Uuid, StoredBooking>,
    order: SegQueue<Uuid>,
    sequence: AtomicU64,
}

impl BookingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `request` once, running `apply` only for a new key.
    ///
    /// The key's map entry stays locked while `apply` runs, so two
    /// concurrent finalizes with the same key cannot both apply.
    ///
    /// # Errors
    ///
    /// Whatever `apply` returns; nothing is recorded in that case.
    pub fn record<F>(&self, request: &BookingRequest, apply: F) -> Result<Recorded, LedgerError>
    where
        F: FnOnce() -> Result<(), LedgerError>,
    {
        match self.bookings.entry(request.idempotency_key) {
            Entry::Occupied(entry) => Ok(Recorded::Replayed(entry.get().booking_id.clone())),
            Entry::Vacant(entry) => {
                apply()?;
                let number = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
                let booking_id = BookingId(format!("BK-{number:06}"));
                entry.insert(StoredBooking {
                    booking_id: booking_id.clone(),
                    request: Arc::new(request.clone()),
                });
                self.order.push(request.idempotency_key);
                Ok(Recorded::Created(booking_id))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    /// Bookings for `event_id`, unordered.
    pub fn for_event(&self, event_id: &EventId) -> Vec<StoredBooking> {
        self.bookings
            .iter()
            .filter(|entry| &entry.request.event_id == event_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Attendees of `event_id` whose email is in `emails` (already normalized).
    pub fn registered_attendees(&self, event_id: &EventId, emails: &[String]) -> Vec<DuplicateAttendee> {
        let wanted: HashSet<&str> = emails.iter().map(String::as_str).collect();
        let mut reported = HashSet::new();
        let mut duplicates = Vec::new();
        for booking in self.for_event(event_id) {
            for attendee in &booking.request.attendees {
                let email = normalize_email(&attendee.email);
                if wanted.contains(email.as_str()) && reported.insert(email.clone()) {
                    duplicates.push(DuplicateAttendee {
                        name: attendee.full_name(),
                        email,
                    });
                }
            }
        }
        duplicates.sort_by(|a, b| a.email.cmp(&b.email));
        duplicates
    }

    /// Booking ids in the order they were created. Drains the order queue.
    pub fn drain_in_order(&self) -> Vec<BookingId> {
        let mut ids = Vec::with_capacity(self.order.len());
        while let Some(key) = self.order.pop() {
            if let Some(booking) = self.bookings.get(&key) {
                ids.push(booking.booking_id.clone());
            }
        }
        ids
    }
}

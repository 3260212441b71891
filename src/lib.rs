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

//! # Booking Engine
//!
//! This library prices event tickets and splits the cost of a booking across
//! an organization's vouchers, its training fund and a final card or account
//! payment. It then drives the booking through duplicate detection, card
//! payment and finalization without ever double-charging or double-booking.
//!
//! ## Core Components
//!
//! - [`offer::calculate`] and [`CostBreakdown`]: per-ticket-class offers and the
//!   resulting cost
//! - [`allocation::allocate`]: the voucher, training fund, remainder waterfall
//! - [`DuplicateGuard`]: asks the backend whether attendees are already booked
//! - [`PaymentIntentOrchestrator`]: card payment intent state machine
//! - [`BookingSubmissionController`]: the single-flight submit workflow
//! - [`InMemoryBackend`]: reference persistence and balance store
//!
//! ## Example
//!
//! ```
//! use booking_engine_rs::allocation::{allocate, AllocationInput, RemainingMethod};
//! use booking_engine_rs::{BogoMode, Checkout, CostBreakdown, GuestCheckout, OfferConfig};
//! use rust_decimal_macros::dec;
//!
//! let offer = OfferConfig::Bogo {
//!     buy_quantity: 2,
//!     free_quantity: 1,
//!     mode: BogoMode::EnterTotalPayLess,
//! };
//! let breakdown = CostBreakdown::compute(dec!(30), &offer, 3);
//! assert_eq!(breakdown.total_cost, dec!(60));
//!
//! let guest = Checkout::Guest(GuestCheckout {
//!     first_name: "Ada".into(),
//!     last_name: "Lovelace".into(),
//!     email: "ada@example.com".into(),
//! });
//! let input = AllocationInput {
//!     total_cost: breakdown.total_cost,
//!     ..AllocationInput::default()
//! };
//! let result = allocate(&input, &guest);
//! assert_eq!(result.remaining_balance, dec!(60));
//! assert_eq!(result.remaining_method, RemainingMethod::Card);
//! ```
//!
//! ## Thread Safety
//!
//! The controller and the in-memory backend are `Send + Sync` and may be
//! shared behind an `Arc`. Locks are never held across an `.await`.

pub mod allocation;
pub mod backend;
mod base;
pub mod booking;
mod booking_log;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod draft;
pub mod duplicate_guard;
pub mod error;
pub mod http;
pub mod offer;
pub mod organization;
pub mod payment_intent;
pub mod pricing;
pub mod telemetry;
pub mod ticket;

pub use allocation::{AccountReference, AllocationInput, AllocationResult, PaymentChoice, RemainingMethod};
pub use backend::InMemoryBackend;
pub use base::{
    BookingId, EventId, IntentId, MONEY_TOLERANCE, MemberId, Money, OrganizationId, ProgramTag,
    RoleId, TicketClassId, VoucherId, format_money, is_settled, normalize_email,
};
pub use booking::{
    Attendee, AttendeeSource, BookingForm, BookingRequest, Checkout, EventDetails,
    FundingSnapshot, GuestCheckout, MemberCheckout, OrganizationBalances, RegistrationMode,
    Voucher, VoucherStatus,
};
pub use booking_log::{BookingLog, Recorded, StoredBooking};
pub use config::EngineConfig;
pub use controller::{BookingQuote, BookingServices, BookingSubmissionController, SubmissionOutcome};
pub use draft::InMemoryDraftStore;
pub use duplicate_guard::{DuplicateAttendee, DuplicateGuard, DuplicateReport, FailurePolicy};
pub use error::{BookingError, ErrorCategory, LedgerError, PaymentError, ValidationError};
pub use http::HttpBookingApi;
pub use offer::OfferOutcome;
pub use organization::OrganizationAccount;
pub use payment_intent::{IntentState, PaymentIntentOrchestrator, ReadyIntent};
pub use pricing::CostBreakdown;
pub use ticket::{BogoMode, OfferConfig, TicketClass};

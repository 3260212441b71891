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

//! Error types for pricing, allocation and booking submission.
//!
//! [`BookingError`] follows the portal's error taxonomy: validation and
//! capacity problems are caught before any network call, duplicates are
//! advisory, payment and persistence failures are always surfaced, and
//! infrastructure failures on advisory checks degrade instead of blocking.

use crate::base::TicketClassId;
use crate::duplicate_guard::DuplicateAttendee;
use thiserror::Error;

/// User input problems, resolved locally before any remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A manually entered attendee is missing a first or last name
    #[error("attendee {index} needs both a first and last name")]
    MissingAttendeeName { index: usize },

    /// No attendees or links were requested
    #[error("at least one ticket is required")]
    NoTickets,

    /// The requested ticket class does not exist or is not open to the booker
    #[error("ticket class {0} is not available")]
    TicketClassUnavailable(TicketClassId),

    /// Card payment needs an email for the receipt
    #[error("a payer email is required for card payment")]
    MissingPayerEmail,

    /// Account payment needs a purchase order or the supply-later flag
    #[error("a purchase order reference is required for account payment")]
    MissingPurchaseOrder,
}

/// Card payment failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// The intent endpoint rejected the request or could not be reached
    #[error("could not start card payment: {0}")]
    IntentCreation(String),

    /// The gateway declined or errored while confirming
    #[error("card payment failed: {0}")]
    Declined(String),

    /// The requested action is not legal in the current intent state
    #[error("cannot {action} while payment is {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },

    /// A card payment was requested for a zero balance
    #[error("nothing to pay by card")]
    NothingToPay,
}

/// Broad error category, matching how the UI reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Capacity,
    Duplicate,
    Payment,
    Persistence,
    Infrastructure,
}

/// Booking engine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Not enough prepaid program tickets for the request
    #[error("only {available} tickets available, {required} required")]
    Capacity { available: u32, required: u32 },

    /// Some attendees are already registered for the event
    #[error("{} attendee(s) already registered for this event", .0.len())]
    Duplicate(Vec<DuplicateAttendee>),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// The persistence collaborator rejected the booking
    #[error("booking failed: {0}")]
    Persistence(String),

    /// Transport or decoding failure talking to a collaborator
    #[error("service unavailable: {0}")]
    Infrastructure(String),
}

impl BookingError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Capacity { .. } => ErrorCategory::Capacity,
            Self::Duplicate(_) => ErrorCategory::Duplicate,
            Self::Payment(_) => ErrorCategory::Payment,
            Self::Persistence(_) => ErrorCategory::Persistence,
            Self::Infrastructure(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::MissingAttendeeName { .. }) => "MISSING_ATTENDEE_NAME",
            Self::Validation(ValidationError::NoTickets) => "NO_TICKETS",
            Self::Validation(ValidationError::TicketClassUnavailable(_)) => {
                "TICKET_CLASS_UNAVAILABLE"
            }
            Self::Validation(ValidationError::MissingPayerEmail) => "MISSING_PAYER_EMAIL",
            Self::Validation(ValidationError::MissingPurchaseOrder) => "MISSING_PURCHASE_ORDER",
            Self::Capacity { .. } => "INSUFFICIENT_TICKETS",
            Self::Duplicate(_) => "DUPLICATE_ATTENDEES",
            Self::Payment(PaymentError::IntentCreation(_)) => "PAYMENT_INTENT_FAILED",
            Self::Payment(PaymentError::Declined(_)) => "PAYMENT_DECLINED",
            Self::Payment(PaymentError::InvalidTransition { .. }) => "PAYMENT_STATE_CONFLICT",
            Self::Payment(PaymentError::NothingToPay) => "NOTHING_TO_PAY",
            Self::Persistence(_) => "BOOKING_REJECTED",
            Self::Infrastructure(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Errors the user fixes by editing the form, with no remote state involved.
    pub fn is_recoverable_locally(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Validation | ErrorCategory::Capacity | ErrorCategory::Duplicate
        )
    }
}

/// Errors raised by the in-memory reference backend when finalizing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Training fund balance is lower than the requested deduction
    #[error("insufficient training fund balance")]
    InsufficientTrainingFund,

    /// Program ticket balance is lower than the requested tickets
    #[error("insufficient program tickets")]
    InsufficientProgramTickets,

    /// Voucher is unknown, belongs elsewhere or was already used
    #[error("voucher is not available")]
    VoucherUnavailable,

    /// Voucher total does not cover the applied voucher amount
    #[error("voucher value does not cover the applied amount")]
    VoucherShortfall,

    /// Organization has no account in the ledger
    #[error("organization not found")]
    OrganizationNotFound,

    /// Amount is negative
    #[error("invalid amount (must not be negative)")]
    InvalidAmount,

    /// Card balance submitted without a confirmed payment intent
    #[error("card payment has not been confirmed")]
    PaymentMissing,
}

impl From<LedgerError> for BookingError {
    fn from(err: LedgerError) -> Self {
        BookingError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            BookingError::from(ValidationError::MissingAttendeeName { index: 2 }).to_string(),
            "attendee 2 needs both a first and last name"
        );
        assert_eq!(
            BookingError::from(ValidationError::NoTickets).to_string(),
            "at least one ticket is required"
        );
        assert_eq!(
            BookingError::Capacity {
                available: 1,
                required: 3
            }
            .to_string(),
            "only 1 tickets available, 3 required"
        );
        assert_eq!(
            BookingError::Payment(PaymentError::Declined("card_declined".into())).to_string(),
            "card payment failed: card_declined"
        );
        assert_eq!(
            BookingError::Payment(PaymentError::InvalidTransition {
                state: "idle",
                action: "confirm"
            })
            .to_string(),
            "cannot confirm while payment is idle"
        );
        assert_eq!(
            BookingError::Persistence("event is full".into()).to_string(),
            "booking failed: event is full"
        );
    }

    #[test]
    fn duplicate_message_counts_attendees() {
        let err = BookingError::Duplicate(vec![
            DuplicateAttendee {
                name: "Ann Lee".into(),
                email: "ann@example.org".into(),
            },
            DuplicateAttendee {
                name: "Bo Chan".into(),
                email: "bo@example.org".into(),
            },
        ]);
        assert_eq!(err.to_string(), "2 attendee(s) already registered for this event");
        assert_eq!(err.code(), "DUPLICATE_ATTENDEES");
    }

    #[test]
    fn categories_drive_local_recovery() {
        assert!(BookingError::from(ValidationError::NoTickets).is_recoverable_locally());
        assert!(
            BookingError::Capacity {
                available: 0,
                required: 1
            }
            .is_recoverable_locally()
        );
        assert!(!BookingError::Persistence("x".into()).is_recoverable_locally());
        assert!(!BookingError::Infrastructure("x".into()).is_recoverable_locally());
        assert_eq!(
            BookingError::Payment(PaymentError::NothingToPay).category(),
            ErrorCategory::Payment
        );
    }

    #[test]
    fn ledger_errors_surface_as_persistence() {
        let err: BookingError = LedgerError::InsufficientTrainingFund.into();
        assert_eq!(
            err,
            BookingError::Persistence("insufficient training fund balance".into())
        );
    }
}

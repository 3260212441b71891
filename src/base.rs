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

//! Core identifier types, money and email helpers.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount in the portal's single currency.
pub type Money = Decimal;

/// Rounding slack used when deciding whether a balance is settled.
pub const MONEY_TOLERANCE: Money = dec!(0.01);

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(
    /// Identifier of an event page.
    EventId
);
string_id!(
    /// Identifier of a ticket class within an event.
    TicketClassId
);
string_id!(
    /// Organizational role used to gate ticket classes.
    RoleId
);
string_id!(
    /// Identifier of a member organization.
    OrganizationId
);
string_id!(
    /// Identifier of a stored-value voucher.
    VoucherId
);
string_id!(
    /// Program tag; events carrying one consume prepaid program tickets.
    ProgramTag
);
string_id!(
    /// Identifier assigned by the persistence collaborator to a created booking.
    BookingId
);
string_id!(
    /// Gateway payment-intent identifier.
    IntentId
);
string_id!(
    /// Identifier of a member in the directory.
    MemberId
);

/// Case-folds and trims an email address for comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Returns `true` when `amount` is within [`MONEY_TOLERANCE`] of zero.
pub fn is_settled(amount: Money) -> bool {
    amount.abs() < MONEY_TOLERANCE
}

/// Formats an amount with two decimal places.
pub fn format_money(amount: Money) -> String {
    format!("{:.2}", amount)
}

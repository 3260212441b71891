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

//! Ticket classes and the offers attached to them.
//!
//! A ticket class is immutable per event. Which class a booker sees is
//! decided by role eligibility: a class with no allowed roles is open to
//! everyone, otherwise the booker must hold at least one of its roles.

use crate::base::{Money, RoleId, TicketClassId};
use crate::error::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a buy-X-get-Y-free offer interprets the requested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BogoMode {
    /// The booker enters the total attendee count; complete bundles are discounted.
    EnterTotalPayLess,
    /// Free tickets come on top of the paid ones; a remainder past `buy` is free.
    BuyXGetYFree,
}

/// Discount rule attached to a ticket class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OfferConfig {
    #[default]
    None,
    Bogo {
        buy_quantity: u32,
        free_quantity: u32,
        mode: BogoMode,
    },
    BulkDiscount {
        threshold_quantity: u32,
        percentage: Decimal,
    },
}

impl OfferConfig {
    /// Returns `false` for offers whose quantities or percentage are out of range.
    ///
    /// Misconfigured offers still evaluate safely (see [`crate::offer`]) but
    /// callers loading configuration can use this to flag them.
    pub fn is_well_formed(&self) -> bool {
        match *self {
            Self::None => true,
            Self::Bogo {
                buy_quantity,
                free_quantity,
                ..
            } => buy_quantity > 0 && free_quantity > 0,
            Self::BulkDiscount {
                threshold_quantity,
                percentage,
            } => {
                threshold_quantity > 0
                    && percentage >= Decimal::ZERO
                    && percentage <= Decimal::ONE_HUNDRED
            }
        }
    }
}

/// A named price/offer bundle for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketClass {
    pub id: TicketClassId,
    pub name: String,
    pub base_price: Money,
    /// Empty means every role may book this class.
    #[serde(default)]
    pub allowed_role_ids: HashSet<RoleId>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub offer: OfferConfig,
}

impl TicketClass {
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_price: Money) -> Self {
        Self {
            id: TicketClassId(id.into()),
            name: name.into(),
            base_price,
            allowed_role_ids: HashSet::new(),
            is_default: false,
            offer: OfferConfig::None,
        }
    }

    pub fn with_offer(mut self, offer: OfferConfig) -> Self {
        self.offer = offer;
        self
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleId>,
    {
        self.allowed_role_ids = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn is_open_to(&self, roles: &HashSet<RoleId>) -> bool {
        self.allowed_role_ids.is_empty() || !self.allowed_role_ids.is_disjoint(roles)
    }
}

/// Ticket classes the holder of `roles` may book, in event order.
pub fn eligible<'a>(classes: &'a [TicketClass], roles: &HashSet<RoleId>) -> Vec<&'a TicketClass> {
    classes.iter().filter(|class| class.is_open_to(roles)).collect()
}

/// Picks the ticket class for a booking.
///
/// An explicitly requested class must be eligible. Otherwise the eligible
/// default class wins, then the first eligible class. `Ok(None)` means the
/// event has no ticket classes at all and is free.
///
/// # Errors
///
/// [`ValidationError::TicketClassUnavailable`] if the requested class is not
/// eligible, or if the event has classes but none are open to `roles`.
pub fn select<'a>(
    classes: &'a [TicketClass],
    roles: &HashSet<RoleId>,
    requested: Option<&TicketClassId>,
) -> Result<Option<&'a TicketClass>, ValidationError> {
    if classes.is_empty() {
        return Ok(None);
    }

    let open = eligible(classes, roles);

    if let Some(id) = requested {
        return open
            .into_iter()
            .find(|class| &class.id == id)
            .map(Some)
            .ok_or_else(|| ValidationError::TicketClassUnavailable(id.clone()));
    }

    open.iter()
        .find(|class| class.is_default)
        .or_else(|| open.first())
        .copied()
        .map(Some)
        .ok_or_else(|| ValidationError::TicketClassUnavailable(classes[0].id.clone()))
}

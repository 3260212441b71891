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

//! Cost breakdown for a requested ticket count.
//!
//! The breakdown is recomputed from current inputs every time the booking
//! form changes; nothing here keeps a running total.

use crate::base::Money;
use crate::offer;
use crate::ticket::{OfferConfig, TicketClass};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Priced view of a booking request.
///
/// # Invariants
///
/// - `total_cost == max(0, payable_quantity * base_price - discount_amount)`
/// - `payable_quantity + free_quantity == tickets_required` unless the offer
///   is degenerate, in which case every quantity is zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub base_price: Money,
    pub tickets_required: u32,
    pub payable_quantity: u32,
    pub free_quantity: u32,
    pub discount_amount: Money,
    pub discount_description: String,
    pub total_cost: Money,
}

impl CostBreakdown {
    /// Prices `tickets_required` tickets at `base_price` under `offer`.
    pub fn compute(base_price: Money, offer: &OfferConfig, tickets_required: u32) -> Self {
        let base_price = base_price.max(Decimal::ZERO);
        let outcome = offer::calculate(base_price, offer, tickets_required);
        let gross = Decimal::from(outcome.payable_quantity) * base_price;
        let total_cost = (gross - outcome.discount_amount).max(Decimal::ZERO);

        Self {
            base_price,
            tickets_required,
            payable_quantity: outcome.payable_quantity,
            free_quantity: outcome.free_quantity,
            discount_amount: outcome.discount_amount,
            discount_description: outcome.discount_description,
            total_cost,
        }
    }

    /// Prices tickets of `ticket_class`; `None` is a free event.
    pub fn for_ticket_class(ticket_class: Option<&TicketClass>, tickets_required: u32) -> Self {
        match ticket_class {
            Some(class) => Self::compute(class.base_price, &class.offer, tickets_required),
            None => Self::compute(Decimal::ZERO, &OfferConfig::None, tickets_required),
        }
    }

    pub fn is_free(&self) -> bool {
        self.total_cost.is_zero()
    }
}

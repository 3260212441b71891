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

//! Offer evaluation.
//!
//! Turns a ticket class's [`OfferConfig`] and a requested ticket count into
//! the number of tickets that are paid for, the number that are free and
//! any percentage discount. Pure and deterministic.
//!
//! # Buy-X-get-Y modes
//!
//! Both modes split the request into bundles of `buy + free` tickets:
//!
//! | Mode | Remainder handling |
//! |------|--------------------|
//! | `EnterTotalPayLess` | the partial bundle is paid in full |
//! | `BuyXGetYFree` | at most `buy` of the partial bundle is paid, the rest is free |
//!
//! They only disagree when the remainder lands inside the free portion of a
//! bundle, and existing configurations depend on the difference.

use crate::base::{Money, format_money};
use crate::ticket::{BogoMode, OfferConfig};
use rust_decimal::Decimal;

/// Result of applying an offer to a ticket count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OfferOutcome {
    pub payable_quantity: u32,
    pub free_quantity: u32,
    pub discount_amount: Money,
    pub discount_description: String,
}

impl OfferOutcome {
    fn full_price(tickets_required: u32) -> Self {
        Self {
            payable_quantity: tickets_required,
            ..Self::default()
        }
    }
}

/// Applies `offer` to `tickets_required` tickets priced at `base_price`.
///
/// Degenerate input (no tickets, or an offer with a zero quantity) yields an
/// all-zero outcome.
pub fn calculate(base_price: Money, offer: &OfferConfig, tickets_required: u32) -> OfferOutcome {
    if tickets_required == 0 {
        return OfferOutcome::default();
    }

    match *offer {
        OfferConfig::None => OfferOutcome::full_price(tickets_required),
        OfferConfig::Bogo {
            buy_quantity,
            free_quantity,
            mode,
        } => bogo(buy_quantity, free_quantity, mode, tickets_required),
        OfferConfig::BulkDiscount {
            threshold_quantity,
            percentage,
        } => bulk_discount(base_price, threshold_quantity, percentage, tickets_required),
    }
}

fn bogo(buy: u32, free: u32, mode: BogoMode, tickets_required: u32) -> OfferOutcome {
    if buy == 0 || free == 0 {
        return OfferOutcome::default();
    }

    // u64 so that buy + free cannot overflow for absurd configurations.
    let bundle = u64::from(buy) + u64::from(free);
    let tickets = u64::from(tickets_required);
    let full_bundles = tickets / bundle;
    let remainder = tickets % bundle;

    let paid_remainder = match mode {
        BogoMode::EnterTotalPayLess => remainder,
        BogoMode::BuyXGetYFree => remainder.min(u64::from(buy)),
    };
    let payable = full_bundles * u64::from(buy) + paid_remainder;
    // payable <= tickets, so both fit back into u32.
    let payable_quantity = u32::try_from(payable).unwrap_or(tickets_required);
    let free_quantity = tickets_required - payable_quantity;

    let discount_description = if free_quantity > 0 {
        format!("Buy {buy} get {free} free ({free_quantity} free)")
    } else {
        String::new()
    };

    OfferOutcome {
        payable_quantity,
        free_quantity,
        discount_amount: Decimal::ZERO,
        discount_description,
    }
}

fn bulk_discount(
    base_price: Money,
    threshold: u32,
    percentage: Decimal,
    tickets_required: u32,
) -> OfferOutcome {
    if threshold == 0 {
        return OfferOutcome::default();
    }
    if tickets_required < threshold {
        return OfferOutcome::full_price(tickets_required);
    }

    let percentage = percentage.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    let base_price = base_price.max(Decimal::ZERO);
    let discount_amount =
        base_price * Decimal::from(tickets_required) * percentage / Decimal::ONE_HUNDRED;

    OfferOutcome {
        payable_quantity: tickets_required,
        free_quantity: 0,
        discount_amount,
        discount_description: format!(
            "{}% off {threshold}+ tickets (saves {})",
            percentage.normalize(),
            format_money(discount_amount)
        ),
    }
}

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

//! Allocation of a total cost across funding sources.
//!
//! Precedence is fixed: voucher value first, then the organization's
//! training fund, then the remaining-balance method (account or card).
//! Each tier is capped; a caller may ask for less than the cap but never
//! more. The computation is pure and re-run on every form edit.
//!
//! ```text
//!  total ──► voucher (≤ selected value) ──► training fund (≤ balance) ──► remaining
//!                                                                          │
//!                                                       Account(PO | later) or Card
//! ```

use crate::base::{Money, is_settled};
use crate::booking::Checkout;
use crate::error::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the booker intends to settle a remaining balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainingMethod {
    Account,
    Card,
}

/// Reference supplied with an account (invoice) payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reference", rename_all = "snake_case")]
pub enum AccountReference {
    PurchaseOrder(String),
    /// The purchase order will be supplied after booking.
    SupplyLater,
}

impl AccountReference {
    pub fn is_valid(&self) -> bool {
        match self {
            Self::PurchaseOrder(reference) => !reference.trim().is_empty(),
            Self::SupplyLater => true,
        }
    }
}

/// Remaining-balance method as chosen in the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentChoice {
    #[default]
    Card,
    Account { reference: AccountReference },
}

/// Inputs to one allocation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllocationInput {
    pub total_cost: Money,
    /// Sum of the vouchers the booker ticked.
    pub selected_voucher_value: Money,
    /// Amount of voucher value the booker wants to use; `None` uses the cap.
    pub voucher_requested: Option<Money>,
    pub training_fund_balance: Money,
    /// Amount of training fund the booker wants to use; `None` uses the cap.
    pub training_fund_requested: Option<Money>,
    pub payment: PaymentChoice,
}

/// Outcome of the waterfall.
///
/// # Invariants
///
/// - `voucher_applied <= min(selected_voucher_value, total_cost)`
/// - `training_fund_applied <= min(training_fund_balance, total_cost - voucher_applied)`
/// - `remaining_balance == max(0, total_cost - voucher_applied - training_fund_applied)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResult {
    pub total_cost: Money,
    pub voucher_max: Money,
    pub voucher_applied: Money,
    pub training_fund_max: Money,
    pub training_fund_applied: Money,
    pub remaining_balance: Money,
    pub remaining_method: RemainingMethod,
    pub account_reference: Option<AccountReference>,
}

impl AllocationResult {
    pub fn requires_card_payment(&self) -> bool {
        !is_settled(self.remaining_balance) && self.remaining_method == RemainingMethod::Card
    }

    /// Checks that any remaining balance has a usable settlement method.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingPurchaseOrder`] when account payment is chosen
    /// without a purchase order reference or the supply-later flag.
    pub fn validate_resolution(&self) -> Result<(), ValidationError> {
        if is_settled(self.remaining_balance) {
            return Ok(());
        }
        match (self.remaining_method, &self.account_reference) {
            (RemainingMethod::Card, _) => Ok(()),
            (RemainingMethod::Account, Some(reference)) if reference.is_valid() => Ok(()),
            (RemainingMethod::Account, _) => Err(ValidationError::MissingPurchaseOrder),
        }
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.validate_resolution().is_ok()
    }
}

/// Runs the waterfall for `input`.
///
/// Guests cannot pay on account, so their remaining method is always
/// [`RemainingMethod::Card`] whatever the form says.
pub fn allocate(input: &AllocationInput, checkout: &Checkout) -> AllocationResult {
    let total_cost = input.total_cost.max(Decimal::ZERO);

    let voucher_max = input.selected_voucher_value.max(Decimal::ZERO).min(total_cost);
    let voucher_applied = clamp_request(input.voucher_requested, voucher_max);

    let training_fund_max = input
        .training_fund_balance
        .max(Decimal::ZERO)
        .min(total_cost - voucher_applied);
    let training_fund_applied = clamp_request(input.training_fund_requested, training_fund_max);

    let remaining_balance =
        (total_cost - voucher_applied - training_fund_applied).max(Decimal::ZERO);

    let (remaining_method, account_reference) = match &input.payment {
        PaymentChoice::Account { reference } if checkout.allows_account_payment() => {
            (RemainingMethod::Account, Some(reference.clone()))
        }
        _ => (RemainingMethod::Card, None),
    };

    AllocationResult {
        total_cost,
        voucher_max,
        voucher_applied,
        training_fund_max,
        training_fund_applied,
        remaining_balance,
        remaining_method,
        account_reference,
    }
}

fn clamp_request(requested: Option<Money>, cap: Money) -> Money {
    requested.unwrap_or(cap).clamp(Decimal::ZERO, cap)
}

/// Whether the booking form may be submitted.
pub fn can_proceed(tickets_required: u32, allocation: &AllocationResult) -> bool {
    tickets_required > 0
        && (allocation.total_cost.is_zero() || allocation.is_fully_resolved())
}

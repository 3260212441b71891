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

//! Organization funds held by the reference backend.
//!
//! Each organization's training fund, program tickets and vouchers sit
//! behind one lock, so a booking's deductions are checked and applied as a
//! unit: either every deduction happens or none does.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use booking_engine_rs::{OrganizationAccount, OrganizationId};
//!
//! let account = OrganizationAccount::new(OrganizationId::from("org-1"));
//! account.credit_training_fund(dec!(250)).unwrap();
//! assert_eq!(account.balances().training_fund_balance, dec!(250));
//! ```

use crate::base::{Money, OrganizationId, ProgramTag, VoucherId};
use crate::booking::{BookingRequest, OrganizationBalances, Voucher, VoucherStatus};
use crate::error::LedgerError;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
struct OrganizationData {
    organization_id: OrganizationId,
    training_fund: Money,
    program_tickets: HashMap<ProgramTag, u32>,
    /// Vouchers indexed by id, consumed ones kept for auditing.
    vouchers: HashMap<VoucherId, Voucher>,
}

impl OrganizationData {
    fn new(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            training_fund: Decimal::ZERO,
            program_tickets: HashMap::new(),
            vouchers: HashMap::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.training_fund >= Decimal::ZERO,
            "Invariant violated: training fund went negative: {}",
            self.training_fund
        );
    }

    /// Checks every deduction `request` asks for without applying any.
    fn check_booking(&self, request: &BookingRequest) -> Result<(), LedgerError> {
        if request.training_fund_applied < Decimal::ZERO || request.voucher_applied < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if self.training_fund < request.training_fund_applied {
            return Err(LedgerError::InsufficientTrainingFund);
        }
        if let Some(tag) = &request.program_tag {
            let available = self.program_tickets.get(tag).copied().unwrap_or(0);
            if available < request.tickets_required {
                return Err(LedgerError::InsufficientProgramTickets);
            }
        }

        let mut seen = HashSet::new();
        let mut voucher_value = Decimal::ZERO;
        for id in &request.voucher_ids {
            if !seen.insert(id) {
                return Err(LedgerError::VoucherUnavailable);
            }
            let voucher = self
                .vouchers
                .get(id)
                .filter(|voucher| voucher.status == VoucherStatus::Active)
                .ok_or(LedgerError::VoucherUnavailable)?;
            voucher_value += voucher.value;
        }
        if voucher_value < request.voucher_applied {
            return Err(LedgerError::VoucherShortfall);
        }
        Ok(())
    }

    /// Applies the deductions of an already checked booking.
    fn apply_booking(&mut self, request: &BookingRequest) {
        self.training_fund -= request.training_fund_applied;
        if let Some(tag) = &request.program_tag {
            if let Some(tickets) = self.program_tickets.get_mut(tag) {
                *tickets -= request.tickets_required;
            }
        }
        for id in &request.voucher_ids {
            if let Some(voucher) = self.vouchers.get_mut(id) {
                voucher.status = VoucherStatus::Consumed;
            }
        }
        self.assert_invariants();
    }
}

/// Funds of one member organization.
#[derive(Debug)]
pub struct OrganizationAccount {
    inner: Mutex<OrganizationData>,
}

impl OrganizationAccount {
    pub fn new(organization_id: OrganizationId) -> Self {
        Self {
            inner: Mutex::new(OrganizationData::new(organization_id)),
        }
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.inner.lock().organization_id.clone()
    }

    /// Tops up the training fund.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAmount`] for a negative amount.
    pub fn credit_training_fund(&self, amount: Money) -> Result<(), LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let mut data = self.inner.lock();
        data.training_fund += amount;
        data.assert_invariants();
        Ok(())
    }

    pub fn add_program_tickets(&self, tag: ProgramTag, tickets: u32) {
        let mut data = self.inner.lock();
        let balance = data.program_tickets.entry(tag).or_insert(0);
        *balance = balance.saturating_add(tickets);
    }

    /// Issues a new active voucher.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAmount`] for a negative value.
    pub fn issue_voucher(&self, id: VoucherId, value: Money) -> Result<Voucher, LedgerError> {
        if value < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let mut data = self.inner.lock();
        let voucher = Voucher {
            id: id.clone(),
            organization_id: data.organization_id.clone(),
            value,
            status: VoucherStatus::Active,
        };
        data.vouchers.insert(id, voucher.clone());
        Ok(voucher)
    }

    pub fn balances(&self) -> OrganizationBalances {
        let data = self.inner.lock();
        OrganizationBalances {
            training_fund_balance: data.training_fund,
            program_ticket_balances: data.program_tickets.clone(),
        }
    }

    /// Active vouchers with a positive value, ordered by id.
    pub fn active_vouchers(&self) -> Vec<Voucher> {
        let data = self.inner.lock();
        let mut vouchers: Vec<Voucher> = data
            .vouchers
            .values()
            .filter(|voucher| voucher.is_usable())
            .cloned()
            .collect();
        vouchers.sort_by(|a, b| a.id.cmp(&b.id));
        vouchers
    }

    /// Checks and applies all deductions of `request` under one lock.
    ///
    /// # Errors
    ///
    /// The first failed check; nothing is deducted in that case.
    pub fn apply_booking(&self, request: &BookingRequest) -> Result<(), LedgerError> {
        let mut data = self.inner.lock();
        data.check_booking(request)?;
        data.apply_booking(request);
        Ok(())
    }
}

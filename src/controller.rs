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

//! Booking submission.
//!
//! [`BookingSubmissionController`] owns one event-detail view's booking
//! attempt. Submission runs strictly in order, each step gating the next:
//!
//! 1. attendee names
//! 2. ticket count
//! 3. duplicate check (advisory, fail-open by default)
//! 4. program-ticket capacity (program events only)
//! 5. allocation; a card balance suspends here until the card is confirmed
//!    or the payment is cancelled
//! 6. finalize: one call to the persistence collaborator
//!
//! Only one attempt runs at a time; a second submit while one is pending is
//! ignored. A card payment that succeeded is recorded before finalize, so a
//! failed finalize can be retried without charging again.

use crate::allocation::{self, AllocationInput, AllocationResult};
use crate::base::{BookingId, IntentId, Money, TicketClassId};
use crate::booking::{BookingForm, BookingRequest, Checkout, EventDetails, FundingSnapshot};
use crate::collaborators::{
    BalanceProvider, BookingPersistence, CardGateway, DraftStore, DuplicateCheckEndpoint,
    PaymentIntentEndpoint, VoucherProvider,
};
use crate::config::EngineConfig;
use crate::duplicate_guard::DuplicateGuard;
use crate::error::{BookingError, PaymentError, ValidationError};
use crate::payment_intent::{IntentState, PaymentIntentOrchestrator};
use crate::pricing::CostBreakdown;
use crate::ticket;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Collaborators the controller talks to.
#[derive(Clone)]
pub struct BookingServices {
    pub balances: Arc<dyn BalanceProvider>,
    pub vouchers: Arc<dyn VoucherProvider>,
    pub duplicates: Arc<dyn DuplicateCheckEndpoint>,
    pub payment_intents: Arc<dyn PaymentIntentEndpoint>,
    pub card_gateway: Arc<dyn CardGateway>,
    pub persistence: Arc<dyn BookingPersistence>,
    pub drafts: Arc<dyn DraftStore>,
}

/// Priced and allocated view of the current form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingQuote {
    pub ticket_class_id: Option<TicketClassId>,
    pub breakdown: CostBreakdown,
    pub allocation: AllocationResult,
    pub can_proceed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Booked {
        booking_id: BookingId,
    },
    /// Suspended at the card-entry step.
    AwaitingCardDetails {
        intent_id: IntentId,
        client_secret: String,
        amount: Money,
    },
    /// Another attempt is already running or waiting for card details.
    AlreadyInFlight,
}

/// A charged card payment whose booking has not been recorded yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaidBooking {
    intent_id: IntentId,
    request: BookingRequest,
}

/// Holds the in-flight flag for the lifetime of one async step.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct BookingSubmissionController {
    event: EventDetails,
    services: BookingServices,
    guard: DuplicateGuard,
    payments: PaymentIntentOrchestrator,
    busy: AtomicBool,
    /// Request assembled at step 5, waiting for the card to be confirmed.
    awaiting_card: Mutex<Option<BookingRequest>>,
    /// Confirmed card payment whose finalize has not succeeded.
    unfinalized: Mutex<Option<PaidBooking>>,
}

impl BookingSubmissionController {
    pub fn new(event: EventDetails, services: BookingServices, config: &EngineConfig) -> Self {
        let guard = DuplicateGuard::new(services.duplicates.clone(), config.duplicate_policy);
        let payments = PaymentIntentOrchestrator::new(
            services.payment_intents.clone(),
            services.card_gateway.clone(),
            config.currency.clone(),
        );
        Self {
            event,
            services,
            guard,
            payments,
            busy: AtomicBool::new(false),
            awaiting_card: Mutex::new(None),
            unfinalized: Mutex::new(None),
        }
    }

    pub fn event(&self) -> &EventDetails {
        &self.event
    }

    pub fn payment_state(&self) -> IntentState {
        self.payments.state()
    }

    /// `true` while a step is running or the attempt waits for card details.
    pub fn is_in_flight(&self) -> bool {
        self.busy.load(Ordering::Acquire) || self.awaiting_card.lock().is_some()
    }

    /// `true` when a charged payment still needs its booking recorded.
    pub fn has_unfinalized_payment(&self) -> bool {
        self.unfinalized.lock().is_some()
    }

    fn draft_key(&self) -> String {
        format!("booking-draft/{}", self.event.id)
    }

    fn payment_key(&self) -> String {
        format!("booking-payment/{}", self.event.id)
    }

    /// Reads the booker's balances and vouchers.
    ///
    /// Provider failures degrade to an empty snapshot rather than blocking
    /// the booking; the booker can still pay by account or card.
    pub async fn load_funding(&self, checkout: &Checkout) -> FundingSnapshot {
        let Some(organization_id) = checkout.organization_id() else {
            return FundingSnapshot::default();
        };

        let mut degraded = false;
        let balances = match self.services.balances.organization_balances(organization_id).await {
            Ok(balances) => balances,
            Err(err) => {
                warn!(%organization_id, error = %err, "balance lookup failed, continuing without balances");
                degraded = true;
                Default::default()
            }
        };
        let vouchers = match self.services.vouchers.active_vouchers(organization_id).await {
            Ok(vouchers) => vouchers
                .into_iter()
                .filter(|voucher| &voucher.organization_id == organization_id)
                .collect(),
            Err(err) => {
                warn!(%organization_id, error = %err, "voucher lookup failed, continuing without vouchers");
                degraded = true;
                Vec::new()
            }
        };

        let mut snapshot = FundingSnapshot::new(balances, vouchers);
        snapshot.degraded = degraded;
        snapshot
    }

    /// Prices and allocates the current form. Pure; call on every edit.
    ///
    /// # Errors
    ///
    /// [`ValidationError::TicketClassUnavailable`] if the chosen ticket class
    /// is not open to the booker.
    pub fn quote(
        &self,
        form: &BookingForm,
        funding: &FundingSnapshot,
    ) -> Result<BookingQuote, BookingError> {
        let roles = form.checkout.roles();
        let ticket_class = ticket::select(
            &self.event.ticket_classes,
            &roles,
            form.ticket_class_id.as_ref(),
        )?;
        let tickets_required = form.tickets_required();
        let breakdown = CostBreakdown::for_ticket_class(ticket_class, tickets_required);

        let (selected_voucher_value, training_fund_balance) = match form.checkout {
            Checkout::Guest(_) => (Decimal::ZERO, Decimal::ZERO),
            Checkout::Member(_) => (
                funding.selected_voucher_value(&form.selected_voucher_ids),
                funding.balances.training_fund_balance,
            ),
        };
        let input = AllocationInput {
            total_cost: breakdown.total_cost,
            selected_voucher_value,
            voucher_requested: form.voucher_requested,
            training_fund_balance,
            training_fund_requested: form.training_fund_requested,
            payment: form.payment.clone(),
        };
        let allocation = allocation::allocate(&input, &form.checkout);
        let can_proceed = allocation::can_proceed(tickets_required, &allocation);

        Ok(BookingQuote {
            ticket_class_id: ticket_class.map(|class| class.id.clone()),
            breakdown,
            allocation,
            can_proceed,
        })
    }

    /// Stores the form so the booker can come back to it.
    ///
    /// # Errors
    ///
    /// [`BookingError::Infrastructure`] if the draft store fails.
    pub async fn save_draft(&self, form: &BookingForm) -> Result<(), BookingError> {
        let value = serde_json::to_value(form)
            .map_err(|err| BookingError::Infrastructure(err.to_string()))?;
        self.services.drafts.save(&self.draft_key(), value).await
    }

    /// # Errors
    ///
    /// [`BookingError::Infrastructure`] if the store fails or the draft no
    /// longer decodes.
    pub async fn load_draft(&self) -> Result<Option<BookingForm>, BookingError> {
        match self.services.drafts.load(&self.draft_key()).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| BookingError::Infrastructure(err.to_string())),
            None => Ok(None),
        }
    }

    /// Re-arms finalize for a payment recorded by an earlier session.
    ///
    /// Returns the intent id of the charged payment, if one was found.
    ///
    /// # Errors
    ///
    /// [`BookingError::Infrastructure`] if the store fails or the record no
    /// longer decodes.
    pub async fn resume_pending_payment(&self) -> Result<Option<IntentId>, BookingError> {
        let Some(value) = self.services.drafts.load(&self.payment_key()).await? else {
            return Ok(None);
        };
        let paid: PaidBooking = serde_json::from_value(value)
            .map_err(|err| BookingError::Infrastructure(err.to_string()))?;
        let intent_id = paid.intent_id.clone();
        warn!(event_id = %self.event.id, %intent_id, "found a charged payment without a booking");
        *self.unfinalized.lock() = Some(paid);
        Ok(Some(intent_id))
    }

    /// Submits the booking.
    ///
    /// If a previous card payment was charged but not booked, this retries
    /// that finalize instead of starting a new attempt.
    ///
    /// # Errors
    ///
    /// Any [`BookingError`]; validation, capacity and duplicate errors are
    /// raised before any payment or persistence call. Form state and drafts
    /// are left untouched on error.
    pub async fn submit(
        &self,
        form: &BookingForm,
        funding: &FundingSnapshot,
    ) -> Result<SubmissionOutcome, BookingError> {
        let Some(_in_flight) = InFlight::acquire(&self.busy) else {
            debug!(event_id = %self.event.id, "submit ignored, attempt already running");
            return Ok(SubmissionOutcome::AlreadyInFlight);
        };
        if self.awaiting_card.lock().is_some() {
            debug!(event_id = %self.event.id, "submit ignored, card payment pending");
            return Ok(SubmissionOutcome::AlreadyInFlight);
        }
        if self.has_unfinalized_payment() {
            return self.finalize_paid().await;
        }

        // 1 + 2
        form.validate_attendees()?;
        let tickets_required = form.tickets_required();
        if tickets_required == 0 {
            return Err(ValidationError::NoTickets.into());
        }
        let quote = self.quote(form, funding)?;

        // 3
        let report = self
            .guard
            .check(&self.event.id, form.attendee_emails())
            .await?;
        if report.has_duplicates {
            info!(
                event_id = %self.event.id,
                duplicates = report.duplicates.len(),
                "attendees already registered"
            );
            return Err(BookingError::Duplicate(report.duplicates));
        }

        // 4
        if let Some(tag) = &self.event.program_tag {
            if funding.degraded {
                warn!(event_id = %self.event.id, %tag, "ticket balance unknown, leaving the check to the booking service");
            } else {
                let available = funding.program_tickets(tag);
                if available < tickets_required {
                    return Err(BookingError::Capacity {
                        available,
                        required: tickets_required,
                    });
                }
            }
        }

        // 5
        quote.allocation.validate_resolution()?;
        let request = BookingRequest::assemble(
            &self.event,
            form,
            funding,
            &quote.breakdown,
            quote.ticket_class_id.clone(),
            &quote.allocation,
        );

        if !quote.allocation.requires_card_payment() {
            return self.finalize(&request).await;
        }

        let metadata = BTreeMap::from([
            ("eventId".to_owned(), self.event.id.to_string()),
            ("idempotencyKey".to_owned(), request.idempotency_key.to_string()),
            ("ticketsRequired".to_owned(), tickets_required.to_string()),
        ]);
        let ready = match self
            .payments
            .request_intent(
                quote.allocation.remaining_balance,
                form.checkout.payer_email(),
                metadata,
            )
            .await
        {
            Ok(ready) => ready,
            Err(err) => {
                self.payments.reset();
                return Err(err);
            }
        };

        *self.awaiting_card.lock() = Some(request);
        Ok(SubmissionOutcome::AwaitingCardDetails {
            intent_id: ready.intent_id,
            client_secret: ready.client_secret,
            amount: ready.amount,
        })
    }

    /// Confirms the entered card details and finalizes the booking.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::InvalidTransition`] if no card payment is pending.
    /// - [`PaymentError::Declined`]; the attempt stays at card entry.
    /// - Finalize errors; the charged payment is kept for [`Self::retry_finalize`].
    pub async fn confirm_card_payment(&self) -> Result<SubmissionOutcome, BookingError> {
        let Some(_in_flight) = InFlight::acquire(&self.busy) else {
            return Ok(SubmissionOutcome::AlreadyInFlight);
        };
        let Some(request) = self.awaiting_card.lock().clone() else {
            return Err(PaymentError::InvalidTransition {
                state: self.payments.state().name(),
                action: "confirm payment",
            }
            .into());
        };

        let intent_id = self.payments.confirm().await?;

        let paid = PaidBooking {
            intent_id: intent_id.clone(),
            request: request.with_payment_intent(intent_id),
        };
        self.record_payment(&paid).await;
        *self.unfinalized.lock() = Some(paid);
        *self.awaiting_card.lock() = None;
        self.payments.reset();

        self.finalize_paid().await
    }

    /// Drops the pending card payment. No booking is created.
    ///
    /// # Errors
    ///
    /// [`PaymentError::InvalidTransition`] if no card payment is awaiting details.
    pub fn cancel_payment(&self) -> Result<(), BookingError> {
        if self.awaiting_card.lock().is_none() {
            return Err(PaymentError::InvalidTransition {
                state: self.payments.state().name(),
                action: "cancel payment",
            }
            .into());
        }
        self.payments.cancel()?;
        self.payments.reset();
        *self.awaiting_card.lock() = None;
        info!(event_id = %self.event.id, "booking attempt cancelled at card entry");
        Ok(())
    }

    /// Resubmits the booking for a payment that was charged but not booked.
    ///
    /// # Errors
    ///
    /// [`PaymentError::InvalidTransition`] if there is nothing to retry, or
    /// the finalize error.
    pub async fn retry_finalize(&self) -> Result<SubmissionOutcome, BookingError> {
        let Some(_in_flight) = InFlight::acquire(&self.busy) else {
            return Ok(SubmissionOutcome::AlreadyInFlight);
        };
        self.finalize_paid().await
    }

    async fn record_payment(&self, paid: &PaidBooking) {
        let stored = match serde_json::to_value(paid) {
            Ok(value) => self.services.drafts.save(&self.payment_key(), value).await,
            Err(err) => Err(BookingError::Infrastructure(err.to_string())),
        };
        if let Err(err) = stored {
            warn!(intent_id = %paid.intent_id, error = %err, "could not persist payment record");
        }
    }

    async fn finalize_paid(&self) -> Result<SubmissionOutcome, BookingError> {
        let Some(paid) = self.unfinalized.lock().clone() else {
            return Err(PaymentError::InvalidTransition {
                state: "not awaiting a booking",
                action: "retry booking",
            }
            .into());
        };

        match self.finalize(&paid.request).await {
            Ok(outcome) => {
                *self.unfinalized.lock() = None;
                Ok(outcome)
            }
            Err(err) => {
                error!(
                    event_id = %self.event.id,
                    intent_id = %paid.intent_id,
                    error = %err,
                    "card charged but booking not recorded"
                );
                Err(err)
            }
        }
    }

    async fn finalize(&self, request: &BookingRequest) -> Result<SubmissionOutcome, BookingError> {
        let response = self.services.persistence.create_booking(request).await?;
        let booking_id = match response {
            response if response.success => response.booking_id.ok_or_else(|| {
                BookingError::Persistence("booking service returned no booking id".to_owned())
            })?,
            response => {
                return Err(BookingError::Persistence(
                    response
                        .error
                        .unwrap_or_else(|| "booking was not accepted".to_owned()),
                ));
            }
        };

        info!(
            event_id = %self.event.id,
            %booking_id,
            tickets = request.tickets_required,
            total = %request.total_cost,
            "booking created"
        );

        for key in [self.draft_key(), self.payment_key()] {
            if let Err(err) = self.services.drafts.clear(&key).await {
                warn!(%key, error = %err, "could not clear draft state");
            }
        }

        Ok(SubmissionOutcome::Booked { booking_id })
    }
}

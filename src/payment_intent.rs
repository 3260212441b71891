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

//! Two-phase card payment for one booking attempt.
//!
//! ```text
//!  Idle ──request──► IntentRequested ──ok──► IntentReady ──confirm──► Confirming ──► Succeeded
//!                          │                    │    ▲                    │
//!                          └──error──► Failed   │    └──── Failed ◄──declined
//!                                      (retry ► Idle)     (confirm again, same secret)
//!                                               └──cancel──► Cancelled (reset ► Idle)
//! ```
//!
//! A failed intent request can be retried from scratch. A declined card keeps
//! the intent so the booker can re-enter card details against the same
//! client secret. The orchestrator never creates a booking; it hands the
//! confirmed intent id back to the controller.

use crate::base::{IntentId, Money, is_settled};
use crate::collaborators::{CardGateway, ConfirmOutcome, PaymentIntentEndpoint, PaymentIntentRequest};
use crate::error::{BookingError, PaymentError, ValidationError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Intent created by the gateway and waiting for card details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyIntent {
    pub intent_id: IntentId,
    pub client_secret: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IntentState {
    #[default]
    Idle,
    IntentRequested,
    IntentReady(ReadyIntent),
    Confirming(ReadyIntent),
    Succeeded {
        intent_id: IntentId,
    },
    /// `intent` is kept when the card was declined, so confirmation can be retried.
    Failed {
        reason: String,
        intent: Option<ReadyIntent>,
    },
    Cancelled,
}

impl IntentState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::IntentRequested => "being requested",
            Self::IntentReady(_) => "awaiting card details",
            Self::Confirming(_) => "confirming",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// The intent card details can be entered against, if any.
    pub fn pending_intent(&self) -> Option<&ReadyIntent> {
        match self {
            Self::IntentReady(intent) => Some(intent),
            Self::Failed {
                intent: Some(intent),
                ..
            } => Some(intent),
            _ => None,
        }
    }
}

fn invalid(state: &IntentState, action: &'static str) -> BookingError {
    BookingError::Payment(PaymentError::InvalidTransition {
        state: state.name(),
        action,
    })
}

pub struct PaymentIntentOrchestrator {
    endpoint: Arc<dyn PaymentIntentEndpoint>,
    gateway: Arc<dyn CardGateway>,
    currency: String,
    state: Mutex<IntentState>,
}

impl PaymentIntentOrchestrator {
    pub fn new(
        endpoint: Arc<dyn PaymentIntentEndpoint>,
        gateway: Arc<dyn CardGateway>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            gateway,
            currency: currency.into(),
            state: Mutex::new(IntentState::Idle),
        }
    }

    pub fn state(&self) -> IntentState {
        self.state.lock().clone()
    }

    /// Asks the intent endpoint for a new payment intent.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::NothingToPay`] if `amount` is zero.
    /// - [`ValidationError::MissingPayerEmail`] if `payer_email` is blank.
    /// - [`PaymentError::InvalidTransition`] unless the orchestrator is idle.
    /// - [`PaymentError::IntentCreation`] if the endpoint fails; the state
    ///   becomes `Failed` and [`Self::retry`] returns it to `Idle`.
    pub async fn request_intent(
        &self,
        amount: Money,
        payer_email: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<ReadyIntent, BookingError> {
        if is_settled(amount) || amount.is_sign_negative() {
            return Err(PaymentError::NothingToPay.into());
        }
        let payer_email = payer_email.trim();
        if payer_email.is_empty() {
            return Err(ValidationError::MissingPayerEmail.into());
        }

        {
            let mut state = self.state.lock();
            if *state != IntentState::Idle {
                return Err(invalid(&state, "request a payment intent"));
            }
            *state = IntentState::IntentRequested;
        }

        let request = PaymentIntentRequest {
            amount,
            currency: self.currency.clone(),
            payer_email: payer_email.to_owned(),
            metadata,
        };

        let reason = match self.endpoint.create_intent(&request).await {
            Ok(response) if response.success => match (response.intent_id, response.client_secret) {
                (Some(intent_id), Some(client_secret)) if !client_secret.is_empty() => {
                    let ready = ReadyIntent {
                        intent_id,
                        client_secret,
                        amount,
                    };
                    info!(intent_id = %ready.intent_id, %amount, "payment intent ready");
                    *self.state.lock() = IntentState::IntentReady(ready.clone());
                    return Ok(ready);
                }
                _ => "payment intent response is missing its client secret".to_owned(),
            },
            Ok(response) => response
                .error
                .unwrap_or_else(|| "payment intent was rejected".to_owned()),
            Err(BookingError::Infrastructure(message)) => message,
            Err(err) => err.to_string(),
        };

        warn!(%amount, error = %reason, "payment intent request failed");
        *self.state.lock() = IntentState::Failed {
            reason: reason.clone(),
            intent: None,
        };
        Err(PaymentError::IntentCreation(reason).into())
    }

    /// Confirms the pending intent with the card gateway.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::InvalidTransition`] if there is no intent awaiting card details.
    /// - [`PaymentError::Declined`] if the gateway declines; the intent is kept.
    pub async fn confirm(&self) -> Result<IntentId, BookingError> {
        let intent = {
            let mut state = self.state.lock();
            let Some(intent) = state.pending_intent().cloned() else {
                return Err(invalid(&state, "confirm payment"));
            };
            *state = IntentState::Confirming(intent.clone());
            intent
        };

        match self.gateway.confirm(&intent.client_secret).await {
            ConfirmOutcome::Succeeded => {
                info!(intent_id = %intent.intent_id, amount = %intent.amount, "card payment confirmed");
                *self.state.lock() = IntentState::Succeeded {
                    intent_id: intent.intent_id.clone(),
                };
                Ok(intent.intent_id)
            }
            ConfirmOutcome::Failed(reason) => {
                warn!(intent_id = %intent.intent_id, error = %reason, "card payment declined");
                *self.state.lock() = IntentState::Failed {
                    reason: reason.clone(),
                    intent: Some(intent),
                };
                Err(PaymentError::Declined(reason).into())
            }
        }
    }

    /// Abandons the pending intent. Nothing has been charged.
    ///
    /// # Errors
    ///
    /// [`PaymentError::InvalidTransition`] if no intent is awaiting card details.
    pub fn cancel(&self) -> Result<(), BookingError> {
        let mut state = self.state.lock();
        let Some(intent) = state.pending_intent() else {
            return Err(invalid(&state, "cancel payment"));
        };
        info!(intent_id = %intent.intent_id, "card payment cancelled");
        *state = IntentState::Cancelled;
        Ok(())
    }

    /// Returns a failed intent request to `Idle` so it can be requested again.
    ///
    /// # Errors
    ///
    /// [`PaymentError::InvalidTransition`] unless the last request failed.
    pub fn retry(&self) -> Result<(), BookingError> {
        let mut state = self.state.lock();
        if !matches!(*state, IntentState::Failed { intent: None, .. }) {
            return Err(invalid(&state, "retry the payment request"));
        }
        *state = IntentState::Idle;
        Ok(())
    }

    /// Drops any intent and returns to `Idle` at the end of an attempt.
    pub fn reset(&self) {
        *self.state.lock() = IntentState::Idle;
    }
}

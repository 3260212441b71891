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

//! Mock booking API backed by [`InMemoryBackend`].
//!
//! Serves the routes [`HttpBookingApi`](booking_engine_rs::HttpBookingApi)
//! calls, plus a fake payment provider that issues intents for any amount.
//! Seeds organization `org-1` with a training fund, program tickets and a
//! voucher.
//!
//! ```bash
//! cargo run --example mock_backend
//!
//! # Balances
//! curl http://localhost:3000/api/organizations/org-1/balances
//!
//! # Duplicate check
//! curl -X POST http://localhost:3000/api/bookings/duplicates \
//!   -H "Content-Type: application/json" \
//!   -d '{"eventId": "evt-1", "attendeeEmails": ["ada@example.com"]}'
//!
//! # Payment intent
//! curl -X POST http://localhost:3000/api/payments/intents \
//!   -H "Content-Type: application/json" \
//!   -d '{"amount": "20.00", "currency": "gbp", "payerEmail": "ada@example.com"}'
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use booking_engine_rs::collaborators::{
    BalanceProvider, BookingPersistence, BookingResponse, DuplicateCheckEndpoint,
    DuplicateCheckRequest, DuplicateCheckResponse, PaymentIntentRequest, PaymentIntentResponse,
    VoucherProvider,
};
use booking_engine_rs::{
    BookingError, BookingRequest, EngineConfig, InMemoryBackend, IntentId, OrganizationBalances,
    OrganizationId, ProgramTag, Voucher, VoucherId, is_settled, telemetry,
};
use rust_decimal_macros::dec;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<InMemoryBackend>,
}

/// Wrapper for converting `BookingError` into HTTP responses.
pub struct AppError(BookingError);

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BookingError::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
            BookingError::Persistence(_) | BookingError::Capacity { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            BookingError::Duplicate(_) => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: self.0.code().to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /api/bookings/duplicates
async fn check_duplicates(
    State(state): State<AppState>,
    Json(request): Json<DuplicateCheckRequest>,
) -> Result<Json<DuplicateCheckResponse>, AppError> {
    Ok(Json(state.backend.check_duplicates(&request).await?))
}

/// POST /api/payments/intents
async fn create_intent(Json(request): Json<PaymentIntentRequest>) -> Json<PaymentIntentResponse> {
    if is_settled(request.amount) || request.amount.is_sign_negative() {
        return Json(PaymentIntentResponse {
            success: false,
            error: Some("amount must be positive".to_string()),
            ..PaymentIntentResponse::default()
        });
    }
    let id = uuid::Uuid::new_v4().simple().to_string();
    info!(amount = %request.amount, currency = %request.currency, "issued payment intent");
    Json(PaymentIntentResponse {
        success: true,
        client_secret: Some(format!("pi_{id}_secret")),
        intent_id: Some(IntentId(format!("pi_{id}"))),
        error: None,
    })
}

/// POST /api/bookings
async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    Ok(Json(state.backend.create_booking(&request).await?))
}

/// GET /api/organizations/{id}/balances
async fn get_balances(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrganizationBalances>, AppError> {
    let organization_id = OrganizationId(id);
    Ok(Json(state.backend.organization_balances(&organization_id).await?))
}

/// GET /api/organizations/{id}/vouchers
async fn get_vouchers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Voucher>>, AppError> {
    let organization_id = OrganizationId(id);
    Ok(Json(state.backend.active_vouchers(&organization_id).await?))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/bookings", post(create_booking))
        .route("/api/bookings/duplicates", post(check_duplicates))
        .route("/api/payments/intents", post(create_intent))
        .route("/api/organizations/{id}/balances", get(get_balances))
        .route("/api/organizations/{id}/vouchers", get(get_vouchers))
        .with_state(state)
}

fn seeded_backend() -> Result<InMemoryBackend, BookingError> {
    let backend = InMemoryBackend::new();
    {
        let org = backend.organization(&OrganizationId::from("org-1"));
        org.credit_training_fund(dec!(250))?;
        org.add_program_tickets(ProgramTag::from("leadership"), 10);
        org.issue_voucher(VoucherId::from("v-1"), dec!(30))?;
    }
    Ok(backend)
}

// === Main ===

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    telemetry::init(&config.log_filter);

    let state = AppState {
        backend: Arc::new(seeded_backend()?),
    };
    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    info!("mock booking API running on http://127.0.0.1:3000");
    println!("Endpoints:");
    println!("  POST /api/bookings                        - Finalize a booking");
    println!("  POST /api/bookings/duplicates             - Check for booked attendees");
    println!("  POST /api/payments/intents                - Create a payment intent");
    println!("  GET  /api/organizations/:id/balances      - Organization balances");
    println!("  GET  /api/organizations/:id/vouchers      - Active vouchers");

    axum::serve(listener, app).await?;
    Ok(())
}

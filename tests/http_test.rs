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

//! Integration tests for the HTTP adapters against a live axum server.
//!
//! The server mirrors the mock backend demo: the in-memory backend behind
//! the booking API routes, plus a payment provider that approves everything.

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use booking_engine_rs::collaborators::{
    BalanceProvider, BookingPersistence, BookingResponse, CardGateway, ConfirmOutcome,
    DuplicateCheckEndpoint, DuplicateCheckRequest, DuplicateCheckResponse, PaymentIntentEndpoint,
    PaymentIntentRequest, PaymentIntentResponse, VoucherProvider,
};
use booking_engine_rs::{
    Attendee, BookingError, BookingForm, BookingRequest, BookingServices,
    BookingSubmissionController, Checkout, EngineConfig, EventDetails, HttpBookingApi,
    InMemoryBackend, InMemoryDraftStore, IntentId, MemberCheckout, OrganizationBalances,
    OrganizationId, RegistrationMode, SubmissionOutcome, TicketClass, Voucher, VoucherId,
};
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

// === Server Setup ===

#[derive(Clone)]
struct AppState {
    backend: Arc<InMemoryBackend>,
    intents: Arc<AtomicU32>,
}

async fn check_duplicates(
    State(state): State<AppState>,
    Json(request): Json<DuplicateCheckRequest>,
) -> Result<Json<DuplicateCheckResponse>, StatusCode> {
    state
        .backend
        .check_duplicates(&request)
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn create_intent(
    State(state): State<AppState>,
    Json(request): Json<PaymentIntentRequest>,
) -> Json<PaymentIntentResponse> {
    let n = state.intents.fetch_add(1, Ordering::SeqCst) + 1;
    assert_eq!(request.currency, "gbp");
    Json(PaymentIntentResponse {
        success: true,
        client_secret: Some(format!("pi_{n}_secret")),
        intent_id: Some(IntentId(format!("pi_{n}"))),
        error: None,
    })
}

async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<BookingResponse>, StatusCode> {
    state
        .backend
        .create_booking(&request)
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn get_balances(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrganizationBalances>, StatusCode> {
    state
        .backend
        .organization_balances(&OrganizationId(id))
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn get_vouchers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Voucher>>, StatusCode> {
    state
        .backend
        .active_vouchers(&OrganizationId(id))
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn broken() -> &'static str {
    "<html>gateway error</html>"
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/bookings", post(create_booking))
        .route("/api/bookings/duplicates", post(check_duplicates))
        .route("/api/payments/intents", post(create_intent))
        .route("/api/organizations/{id}/balances", get(get_balances))
        .route("/api/organizations/{id}/vouchers", get(get_vouchers))
        .route("/broken/api/bookings/duplicates", post(broken))
        .with_state(state)
}

/// Test server that binds to an ephemeral port.
struct TestServer {
    base_url: String,
    backend: Arc<InMemoryBackend>,
    intents: Arc<AtomicU32>,
}

impl TestServer {
    async fn new() -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        {
            let org = backend.organization(&OrganizationId::from("org-1"));
            org.credit_training_fund(dec!(15)).unwrap();
            org.issue_voucher(VoucherId::from("v-1"), dec!(10)).unwrap();
        }
        let intents = Arc::new(AtomicU32::new(0));
        let app = create_router(AppState {
            backend: backend.clone(),
            intents: intents.clone(),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            backend,
            intents,
        }
    }

    fn config(&self) -> EngineConfig {
        EngineConfig {
            api_base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(5),
            ..EngineConfig::default()
        }
    }

    fn api(&self) -> HttpBookingApi {
        HttpBookingApi::new(&self.config()).unwrap()
    }
}

struct ApprovingGateway;

#[async_trait]
impl CardGateway for ApprovingGateway {
    async fn confirm(&self, _client_secret: &str) -> ConfirmOutcome {
        ConfirmOutcome::Succeeded
    }
}

fn member() -> Checkout {
    Checkout::Member(MemberCheckout {
        member_id: "m-1".into(),
        organization_id: "org-1".into(),
        email: "lead@example.org".into(),
        roles: HashSet::new(),
    })
}

// === Tests ===

#[tokio::test]
async fn reads_balances_and_vouchers() {
    let server = TestServer::new().await;
    let api = server.api();
    let org = OrganizationId::from("org-1");

    let balances = api.organization_balances(&org).await.unwrap();
    let vouchers = api.active_vouchers(&org).await.unwrap();

    assert_eq!(balances.training_fund_balance, dec!(15));
    assert_eq!(vouchers.len(), 1);
    assert_eq!(vouchers[0].value, dec!(10));
}

#[tokio::test]
async fn payment_intent_round_trip() {
    let server = TestServer::new().await;
    let api = server.api();

    let response = api
        .create_intent(&PaymentIntentRequest {
            amount: dec!(12.50),
            currency: "gbp".into(),
            payer_email: "lead@example.org".into(),
            metadata: BTreeMap::from([("eventId".to_owned(), "evt-1".to_owned())]),
        })
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.intent_id, Some(IntentId::from("pi_1")));
    assert_eq!(response.client_secret.as_deref(), Some("pi_1_secret"));
}

#[tokio::test]
async fn card_booking_end_to_end() {
    let server = TestServer::new().await;
    let api = Arc::new(server.api());
    let services = BookingServices {
        balances: api.clone(),
        vouchers: api.clone(),
        duplicates: api.clone(),
        payment_intents: api.clone(),
        card_gateway: Arc::new(ApprovingGateway),
        persistence: api.clone(),
        drafts: Arc::new(InMemoryDraftStore::new()),
    };
    let event = EventDetails {
        id: "evt-1".into(),
        title: "Annual Conference".into(),
        program_tag: None,
        ticket_classes: vec![TicketClass::new("standard", "Standard", dec!(20))],
    };
    let controller = BookingSubmissionController::new(event, services, &server.config());

    let mut form = BookingForm::new(member());
    form.registration = RegistrationMode::Attendees {
        attendees: vec![
            Attendee::manual("Ada", "Lovelace", "ada@example.com"),
            Attendee::manual("Alan", "Turing", "alan@example.com"),
        ],
    };
    form.selected_voucher_ids = vec![VoucherId::from("v-1")];
    let funding = controller.load_funding(&form.checkout).await;
    assert!(!funding.degraded);

    let outcome = controller.submit(&form, &funding).await.unwrap();
    assert!(matches!(
        outcome,
        SubmissionOutcome::AwaitingCardDetails { amount, .. } if amount == dec!(15)
    ));

    let outcome = controller.confirm_card_payment().await.unwrap();
    assert!(matches!(outcome, SubmissionOutcome::Booked { .. }));
    assert_eq!(server.intents.load(Ordering::SeqCst), 1);

    let stored = server.backend.bookings().for_event(&"evt-1".into());
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].request.voucher_applied, dec!(10));
    assert_eq!(stored[0].request.training_fund_applied, dec!(15));
    assert_eq!(stored[0].request.payment_intent_id, Some(IntentId::from("pi_1")));

    let again = controller.submit(&form, &funding).await.unwrap_err();
    assert!(matches!(again, BookingError::Duplicate(ref d) if d.len() == 2));
}

#[tokio::test]
async fn unreachable_server_is_an_infrastructure_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let api = HttpBookingApi::with_client(reqwest::Client::new(), format!("http://{addr}"));

    let err = api
        .organization_balances(&OrganizationId::from("org-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::Infrastructure(_)));
}

#[tokio::test]
async fn error_status_is_an_infrastructure_error() {
    let server = TestServer::new().await;
    let api = HttpBookingApi::with_client(
        reqwest::Client::new(),
        format!("{}/missing", server.base_url),
    );

    let err = api
        .active_vouchers(&OrganizationId::from("org-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::Infrastructure(_)));
}

#[tokio::test]
async fn undecodable_body_is_an_infrastructure_error() {
    let server = TestServer::new().await;
    let api = HttpBookingApi::with_client(
        reqwest::Client::new(),
        format!("{}/broken", server.base_url),
    );

    let err = api
        .check_duplicates(&DuplicateCheckRequest {
            event_id: "evt-1".into(),
            attendee_emails: vec!["ada@example.com".into()],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::Infrastructure(_)));
}

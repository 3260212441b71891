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

//! HTTP adapters for the portal's booking API.
//!
//! [`HttpBookingApi`] speaks JSON to the endpoints below, relative to
//! [`EngineConfig::api_base_url`]:
//!
//! | Collaborator               | Route                                         |
//! |----------------------------|-----------------------------------------------|
//! | [`DuplicateCheckEndpoint`] | `POST /api/bookings/duplicates`               |
//! | [`PaymentIntentEndpoint`]  | `POST /api/payments/intents`                  |
//! | [`BookingPersistence`]     | `POST /api/bookings`                          |
//! | [`BalanceProvider`]        | `GET /api/organizations/{id}/balances`        |
//! | [`VoucherProvider`]        | `GET /api/organizations/{id}/vouchers`        |
//!
//! Transport failures, timeouts and undecodable bodies surface as
//! [`BookingError::Infrastructure`]. A well-formed `success: false` body is
//! passed through for the caller to interpret.

use crate::base::OrganizationId;
use crate::booking::{BookingRequest, OrganizationBalances, Voucher};
use crate::collaborators::{
    BalanceProvider, BookingPersistence, BookingResponse, DuplicateCheckEndpoint,
    DuplicateCheckRequest, DuplicateCheckResponse, PaymentIntentEndpoint, PaymentIntentRequest,
    PaymentIntentResponse, VoucherProvider,
};
use crate::config::EngineConfig;
use crate::error::BookingError;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpBookingApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBookingApi {
    /// # Errors
    ///
    /// [`BookingError::Infrastructure`] if the HTTP client cannot be built.
    pub fn new(config: &EngineConfig) -> Result<Self, BookingError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(transport)?;
        Ok(Self::with_client(client, config.api_base_url.clone()))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, BookingError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "POST");
        self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)
    }

    async fn get<R>(&self, path: &str) -> Result<R, BookingError>
    where
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        response.json().await.map_err(transport)
    }
}

fn transport(err: reqwest::Error) -> BookingError {
    BookingError::Infrastructure(err.to_string())
}

#[async_trait]
impl DuplicateCheckEndpoint for HttpBookingApi {
    async fn check_duplicates(
        &self,
        request: &DuplicateCheckRequest,
    ) -> Result<DuplicateCheckResponse, BookingError> {
        self.post("/api/bookings/duplicates", request).await
    }
}

#[async_trait]
impl PaymentIntentEndpoint for HttpBookingApi {
    async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntentResponse, BookingError> {
        self.post("/api/payments/intents", request).await
    }
}

#[async_trait]
impl BookingPersistence for HttpBookingApi {
    async fn create_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingResponse, BookingError> {
        self.post("/api/bookings", request).await
    }
}

#[async_trait]
impl BalanceProvider for HttpBookingApi {
    async fn organization_balances(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<OrganizationBalances, BookingError> {
        self.get(&format!("/api/organizations/{organization_id}/balances"))
            .await
    }
}

#[async_trait]
impl VoucherProvider for HttpBookingApi {
    async fn active_vouchers(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<Voucher>, BookingError> {
        self.get(&format!("/api/organizations/{organization_id}/vouchers"))
            .await
    }
}

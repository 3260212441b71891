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

//! Engine configuration.
//!
//! Loaded from environment variables, each with a default suitable for a
//! local development portal.

use crate::duplicate_guard::FailurePolicy;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_CURRENCY: &str = "gbp";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable is set but cannot be used
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Base URL of the portal API (env: BOOKING_API_BASE_URL)
    pub api_base_url: String,
    /// Currency sent with payment intents (env: BOOKING_CURRENCY)
    pub currency: String,
    /// Per-request HTTP timeout (env: BOOKING_REQUEST_TIMEOUT_SECS)
    pub request_timeout: Duration,
    /// Duplicate guard policy (env: BOOKING_DUPLICATE_POLICY)
    pub duplicate_policy: FailurePolicy,
    /// Default tracing filter (env: BOOKING_LOG)
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            currency: DEFAULT_CURRENCY.to_owned(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            duplicate_policy: FailurePolicy::FailOpen,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first unusable variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`; unset and blank values use defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first unusable variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let api_base_url = match get("BOOKING_API_BASE_URL") {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.trim_end_matches('/').to_owned()
            }
            Some(url) => {
                return Err(ConfigError::Invalid {
                    name: "BOOKING_API_BASE_URL",
                    value: url,
                    reason: "must start with http:// or https://".into(),
                });
            }
            None => defaults.api_base_url,
        };

        let currency = match get("BOOKING_CURRENCY") {
            Some(code) if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
                code.to_ascii_lowercase()
            }
            Some(code) => {
                return Err(ConfigError::Invalid {
                    name: "BOOKING_CURRENCY",
                    value: code,
                    reason: "must be a three-letter currency code".into(),
                });
            }
            None => defaults.currency,
        };

        let request_timeout = match get("BOOKING_REQUEST_TIMEOUT_SECS") {
            Some(secs) => match secs.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "BOOKING_REQUEST_TIMEOUT_SECS",
                        value: secs,
                        reason: "must be a positive number of seconds".into(),
                    });
                }
            },
            None => defaults.request_timeout,
        };

        let duplicate_policy = match get("BOOKING_DUPLICATE_POLICY") {
            Some(policy) => policy.parse().map_err(|reason| ConfigError::Invalid {
                name: "BOOKING_DUPLICATE_POLICY",
                value: policy.clone(),
                reason,
            })?,
            None => defaults.duplicate_policy,
        };

        Ok(Self {
            api_base_url,
            currency,
            request_timeout,
            duplicate_policy,
            log_filter: get("BOOKING_LOG").unwrap_or(defaults.log_filter),
        })
    }
}

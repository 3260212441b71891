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

//! Pre-submission check for attendees already registered for an event.
//!
//! The check is advisory. With the default [`FailurePolicy::FailOpen`] a
//! transport failure or error response is logged and treated as "no
//! duplicates", so a flaky check never blocks a legitimate booking. The
//! persistence collaborator still performs a duplicate-safe insert.

use crate::base::{EventId, normalize_email};
use crate::collaborators::{DuplicateCheckEndpoint, DuplicateCheckRequest};
use crate::error::BookingError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// An attendee the portal already holds a registration for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DuplicateAttendee {
    pub name: String,
    pub email: String,
}

/// Outcome of a duplicate check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DuplicateReport {
    pub has_duplicates: bool,
    pub duplicates: Vec<DuplicateAttendee>,
}

impl DuplicateReport {
    fn clear() -> Self {
        Self::default()
    }
}

/// What to do when the remote check cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log and report no duplicates.
    #[default]
    FailOpen,
    /// Surface the failure as [`BookingError::Infrastructure`].
    FailClosed,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail-open" | "open" => Ok(Self::FailOpen),
            "fail-closed" | "closed" => Ok(Self::FailClosed),
            other => Err(format!("unknown duplicate policy '{other}'")),
        }
    }
}

pub struct DuplicateGuard {
    endpoint: Arc<dyn DuplicateCheckEndpoint>,
    policy: FailurePolicy,
}

impl DuplicateGuard {
    pub fn new(endpoint: Arc<dyn DuplicateCheckEndpoint>, policy: FailurePolicy) -> Self {
        Self { endpoint, policy }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Checks `emails` against existing registrations for `event_id`.
    ///
    /// Emails are trimmed, case-folded and de-duplicated. An empty list
    /// returns a clear report without calling the endpoint.
    ///
    /// # Errors
    ///
    /// Only under [`FailurePolicy::FailClosed`]: [`BookingError::Infrastructure`]
    /// when the endpoint fails or reports `success: false`.
    pub async fn check<I, S>(&self, event_id: &EventId, emails: I) -> Result<DuplicateReport, BookingError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let attendee_emails: Vec<String> = emails
            .into_iter()
            .map(|email| normalize_email(email.as_ref()))
            .filter(|email| !email.is_empty() && seen.insert(email.clone()))
            .collect();

        if attendee_emails.is_empty() {
            debug!(%event_id, "no attendee emails, skipping duplicate check");
            return Ok(DuplicateReport::clear());
        }

        let request = DuplicateCheckRequest {
            event_id: event_id.clone(),
            attendee_emails,
        };

        let failure = match self.endpoint.check_duplicates(&request).await {
            Ok(response) if response.success => {
                debug!(
                    %event_id,
                    checked = request.attendee_emails.len(),
                    duplicates = response.duplicates.len(),
                    "duplicate check complete"
                );
                return Ok(DuplicateReport {
                    has_duplicates: response.has_duplicates,
                    duplicates: response.duplicates,
                });
            }
            Ok(response) => response
                .error
                .unwrap_or_else(|| "duplicate check rejected".to_owned()),
            Err(BookingError::Infrastructure(message)) => message,
            Err(err) => err.to_string(),
        };

        match self.policy {
            FailurePolicy::FailOpen => {
                warn!(%event_id, error = %failure, "duplicate check failed, continuing without it");
                Ok(DuplicateReport::clear())
            }
            FailurePolicy::FailClosed => Err(BookingError::Infrastructure(failure)),
        }
    }
}

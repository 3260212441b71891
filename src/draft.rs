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

//! In-memory draft store.

use crate::collaborators::DraftStore;
use crate::error::BookingError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Key to JSON blob map; last write wins.
#[derive(Debug, Default)]
pub struct InMemoryDraftStore {
    entries: DashMap<String, serde_json::Value>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, BookingError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn save(&self, key: &str, value: serde_json::Value) -> Result<(), BookingError> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), BookingError> {
        self.entries.remove(key);
        Ok(())
    }
}

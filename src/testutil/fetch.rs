// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::samples::{FetchError, Fetcher};

/// An in-memory fetcher that counts requests per URI.
#[derive(Default)]
pub struct MockFetcher {
    assets: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockFetcher {
    pub fn new() -> MockFetcher {
        MockFetcher::default()
    }

    /// Serves `bytes` for `uri`, clearing any failure set for it.
    pub fn insert(&self, uri: &str, bytes: Vec<u8>) {
        self.failing.lock().remove(uri);
        self.assets.lock().insert(uri.to_string(), bytes);
    }

    /// Makes every fetch of `uri` fail.
    pub fn fail(&self, uri: &str) {
        self.failing.lock().insert(uri.to_string());
    }

    pub fn calls(&self, uri: &str) -> usize {
        self.calls.lock().get(uri).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        *self.calls.lock().entry(uri.to_string()).or_insert(0) += 1;
        if self.failing.lock().contains(uri) {
            return Err(FetchError::Status {
                uri: uri.to_string(),
                status: 503,
            });
        }
        self.assets
            .lock()
            .get(uri)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(uri.to_string()))
    }
}

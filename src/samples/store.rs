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

//! Lazily decoded sample buffers, keyed by sample name.
//!
//! Default buffers are fetched and decoded on first use and cached. Uploads
//! replace them with overrides until the store is reset.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::{sync::OnceCell, task::JoinSet};
use tracing::{debug, info, warn};

use super::fetch::Fetcher;
use super::matching::match_sample;
use crate::audio::{decode, DecodedBuffer};
use crate::config;
use crate::error::PadError;

/// Where a cached buffer came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Decoded from the sample's configured file.
    Default,
    /// Decoded from an uploaded file.
    Override,
}

struct Slot {
    origin: Origin,
    cell: OnceCell<DecodedBuffer>,
}

impl Slot {
    fn pending() -> Arc<Slot> {
        Arc::new(Slot {
            origin: Origin::Default,
            cell: OnceCell::new(),
        })
    }

    fn overridden(buffer: DecodedBuffer) -> Arc<Slot> {
        Arc::new(Slot {
            origin: Origin::Override,
            cell: OnceCell::new_with(Some(buffer)),
        })
    }
}

/// The outcome of an upload batch.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// (sample name, file name) pairs that now have overrides.
    pub loaded: Vec<(String, String)>,
    /// Files whose names matched no sample.
    pub unmatched: Vec<String>,
    /// Files that matched a sample but could not be decoded.
    pub decode_failed: Vec<String>,
    /// Files that could not be read at all.
    pub unreadable: Vec<String>,
}

impl UploadReport {
    pub fn rejected(&self) -> usize {
        self.unmatched.len() + self.decode_failed.len() + self.unreadable.len()
    }

    /// A one-line summary for the status display.
    pub fn status(&self) -> String {
        format!("{} loaded, {} rejected", self.loaded.len(), self.rejected())
    }
}

/// Holds the decoded buffer for each known sample.
pub struct SampleStore {
    descriptors: Vec<config::Sample>,
    fetcher: Arc<dyn Fetcher>,
    sample_rate: u32,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl SampleStore {
    /// Creates a store for the given samples. Buffers are decoded at `sample_rate`.
    pub fn new(
        descriptors: Vec<config::Sample>,
        fetcher: Arc<dyn Fetcher>,
        sample_rate: u32,
    ) -> SampleStore {
        SampleStore {
            descriptors,
            fetcher,
            sample_rate,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The sample names in configuration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|descriptor| descriptor.name())
    }

    fn descriptor(&self, name: &str) -> Option<&config::Sample> {
        self.descriptors.iter().find(|descriptor| descriptor.name() == name)
    }

    /// Returns the buffer for `name`, fetching and decoding the default file on
    /// first use. Concurrent callers share a single load. Failures are not
    /// cached, so the next call retries.
    pub async fn load(&self, name: &str) -> Result<DecodedBuffer, PadError> {
        let slot = {
            let mut slots = self.slots.lock();
            if !slots.contains_key(name) && self.descriptor(name).is_none() {
                return Err(PadError::UnknownSample(name.to_string()));
            }
            slots.entry(name.to_string()).or_insert_with(Slot::pending).clone()
        };

        let buffer = slot
            .cell
            .get_or_try_init(|| async {
                let descriptor = self
                    .descriptor(name)
                    .ok_or_else(|| PadError::UnknownSample(name.to_string()))?;
                let file = descriptor.file();
                debug!(sample = name, file, "Loading default sample");
                let bytes = self.fetcher.fetch(file).await?;
                let buffer =
                    decode::decode_async(bytes, decode::extension_hint(file), self.sample_rate)
                        .await?;
                info!(
                    sample = name,
                    frames = buffer.frames(),
                    memory_kb = buffer.memory_size() / 1024,
                    "Sample loaded"
                );
                Ok::<DecodedBuffer, PadError>(buffer)
            })
            .await?;
        Ok(buffer.clone())
    }

    /// Like [`SampleStore::load`], but logs the failure and returns nothing.
    pub async fn resolve(&self, name: &str) -> Option<DecodedBuffer> {
        match self.load(name).await {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                warn!(sample = name, err = %e, "Unable to resolve sample");
                None
            }
        }
    }

    /// Replaces the buffer for `name` until the next reset.
    pub fn set_override(&self, name: &str, buffer: DecodedBuffer) {
        info!(sample = name, frames = buffer.frames(), "Sample overridden");
        self.slots
            .lock()
            .insert(name.to_string(), Slot::overridden(buffer));
    }

    /// Decodes `bytes` and installs the result as the override for `name`.
    /// A decode failure leaves the current buffer in place.
    pub async fn set_override_bytes(
        &self,
        name: &str,
        bytes: Vec<u8>,
        hint: Option<String>,
    ) -> Result<(), PadError> {
        if self.descriptor(name).is_none() {
            return Err(PadError::UnknownSample(name.to_string()));
        }
        let buffer = decode::decode_async(bytes, hint, self.sample_rate).await?;
        self.set_override(name, buffer);
        Ok(())
    }

    /// Drops every cached buffer, overrides included. The next resolve of each
    /// sample goes back to its default file.
    pub fn reset(&self) {
        let mut slots = self.slots.lock();
        info!(cached = slots.len(), "Resetting samples to defaults");
        slots.clear();
    }

    /// The origin of the buffer currently cached for `name`, if any.
    pub fn origin(&self, name: &str) -> Option<Origin> {
        self.slots
            .lock()
            .get(name)
            .filter(|slot| slot.cell.initialized())
            .map(|slot| slot.origin)
    }

    /// Loads every sample concurrently and returns how many are now available.
    pub async fn prefetch(self: &Arc<Self>) -> usize {
        let mut tasks = JoinSet::new();
        for name in self.names() {
            let store = self.clone();
            let name = name.to_string();
            tasks.spawn(async move { store.resolve(&name).await.is_some() });
        }

        let mut loaded = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(true) => loaded += 1,
                Ok(false) => {}
                Err(e) => warn!(err = %e, "Prefetch task failed"),
            }
        }
        info!(loaded, total = self.descriptors.len(), "Prefetch complete");
        loaded
    }

    /// Matches each (file name, bytes) pair to a sample and installs the decoded
    /// result as an override.
    pub async fn upload(&self, files: Vec<(String, Vec<u8>)>) -> UploadReport {
        let mut report = UploadReport::default();
        for (file_name, bytes) in files {
            let Some(name) = match_sample(&file_name, self.names()).map(str::to_string) else {
                let err = PadError::UnmatchedUpload(file_name.clone());
                warn!(err = %err, "Rejecting upload");
                report.unmatched.push(file_name);
                continue;
            };

            match self
                .set_override_bytes(&name, bytes, decode::extension_hint(&file_name))
                .await
            {
                Ok(()) => report.loaded.push((name, file_name)),
                Err(e) => {
                    warn!(file = file_name, sample = name, err = %e, "Rejecting upload");
                    report.decode_failed.push(file_name);
                }
            }
        }
        info!(status = report.status(), "Upload processed");
        report
    }
}

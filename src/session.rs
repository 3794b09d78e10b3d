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
use std::{error::Error, path::PathBuf, sync::Arc};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::audio::{self, Mixer};
use crate::background::{BackgroundPlayer, PlaybackState};
use crate::config::Kit;
use crate::error::PadError;
use crate::samples::{AssetFetcher, Fetcher, PlaybackEngine, SampleStore, UploadReport, Voice};

/// Step used by the volume controls.
pub const VOLUME_STEP: f32 = 0.05;

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

/// A running drum kit: the output device, the sample store, the engine that
/// plays pads and the background loop.
pub struct Session {
    device: Arc<dyn audio::Device>,
    mixer: Arc<Mixer>,
    store: Arc<SampleStore>,
    engine: Arc<PlaybackEngine>,
    background: BackgroundPlayer,
    tracks: Vec<String>,
    selected_track: Mutex<usize>,
}

impl Session {
    /// Opens the kit's audio device and builds a session that reads assets
    /// relative to the kit.
    pub fn from_kit(kit: &Kit) -> Result<Session, Box<dyn Error>> {
        let device = audio::get_device(kit.audio())?;
        info!(device = %device, "Audio device opened");
        Ok(Session::new(
            kit,
            device,
            Arc::new(AssetFetcher::new(kit.base_path())),
        ))
    }

    pub fn new(kit: &Kit, device: Arc<dyn audio::Device>, fetcher: Arc<dyn Fetcher>) -> Session {
        let mixer = device.mixer();
        mixer.master().set(clamp_volume(kit.master_volume()));
        mixer
            .background()
            .set(clamp_volume(kit.background().volume()));

        let store = Arc::new(SampleStore::new(
            kit.samples().to_vec(),
            fetcher.clone(),
            mixer.sample_rate(),
        ));
        let engine = Arc::new(PlaybackEngine::new(
            mixer.clone(),
            store.clone(),
            kit.max_voices(),
        ));

        Session {
            device,
            background: BackgroundPlayer::new(mixer.clone(), fetcher),
            mixer,
            store,
            engine,
            tracks: kit.background().tracks().to_vec(),
            selected_track: Mutex::new(0),
        }
    }

    pub fn device(&self) -> &Arc<dyn audio::Device> {
        &self.device
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    /// Fires a pad's sample without waiting for it to start.
    pub fn trigger(&self, sample: &str, velocity: f32) {
        // Dropping the handle detaches the task.
        let _ = self.engine.trigger(sample, velocity);
    }

    /// Plays a sample and returns its voice once it has started.
    pub async fn play(&self, sample: &str, velocity: f32) -> Voice {
        self.engine.play(sample, velocity).await
    }

    pub fn master_volume(&self) -> f32 {
        self.mixer.master().get()
    }

    pub fn set_master_volume(&self, volume: f32) {
        let volume = clamp_volume(volume);
        self.mixer.master().set(volume);
        info!(volume, "Master volume changed");
    }

    pub fn polyphony(&self) -> usize {
        self.engine.max_voices()
    }

    pub fn set_polyphony(&self, max_voices: usize) {
        self.engine.set_max_voices(max_voices);
    }

    pub fn background_volume(&self) -> f32 {
        self.background.volume()
    }

    pub fn set_background_volume(&self, volume: f32) {
        let volume = clamp_volume(volume);
        self.background.set_volume(volume);
        info!(volume, "Background volume changed");
    }

    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }

    /// The selected background track, if the kit has any.
    pub fn selected_track(&self) -> Option<&str> {
        self.tracks
            .get(*self.selected_track.lock())
            .map(String::as_str)
    }

    /// Selects a background track by index. The new track is loaded on the
    /// next play.
    pub fn select_background(&self, index: usize) -> bool {
        if index >= self.tracks.len() {
            warn!(index, tracks = self.tracks.len(), "No such background track");
            return false;
        }
        *self.selected_track.lock() = index;
        info!(track = self.tracks[index], "Background track selected");
        true
    }

    /// Selects the track after the current one, wrapping around.
    pub fn next_background(&self) {
        if self.tracks.is_empty() {
            return;
        }
        let next = (*self.selected_track.lock() + 1) % self.tracks.len();
        self.select_background(next);
    }

    /// Loads the selected track unless it is already the one in memory.
    /// Returns false when no tracks are configured.
    pub async fn load_background(&self) -> Result<bool, PadError> {
        let Some(track) = self.selected_track().map(str::to_string) else {
            return Ok(false);
        };
        if self.background.loaded_uri().as_deref() != Some(track.as_str()) {
            self.background.load(&track).await?;
        }
        Ok(true)
    }

    /// Plays the selected track, loading it first if needed.
    pub async fn play_background(&self) -> Result<(), PadError> {
        if !self.load_background().await? {
            warn!("No background tracks configured");
            return Ok(());
        }
        self.background.play();
        Ok(())
    }

    pub fn stop_background(&self) {
        self.background.stop();
    }

    pub fn background_state(&self) -> PlaybackState {
        self.background.state()
    }

    /// Installs uploaded files as sample overrides.
    pub async fn upload(&self, files: Vec<(String, Vec<u8>)>) -> UploadReport {
        self.store.upload(files).await
    }

    /// Reads files from disk and uploads them under their file names.
    pub async fn upload_paths(&self, paths: &[PathBuf]) -> UploadReport {
        let mut files = Vec::new();
        let mut unreadable = Vec::new();
        for path in paths {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            match tokio::fs::read(path).await {
                Ok(bytes) => files.push((name, bytes)),
                Err(e) => {
                    warn!(path = ?path, err = %e, "Unable to read uploaded file");
                    unreadable.push(name);
                }
            }
        }

        let mut report = self.store.upload(files).await;
        report.unreadable = unreadable;
        report
    }

    /// Drops every cached buffer and reloads the defaults. Returns how many
    /// samples loaded.
    pub async fn reset_samples(&self) -> usize {
        self.store.reset();
        self.store.prefetch().await
    }

    /// Loads every sample ahead of the first trigger.
    pub async fn prefetch(&self) -> usize {
        self.store.prefetch().await
    }

    /// Silences everything.
    pub fn stop_all(&self) {
        self.engine.stop_all();
        self.background.stop();
    }
}

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
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, span, warn, Instrument, Level, Span};

use crate::audio::{decode, Bus, DecodedBuffer, GainControl, Mixer, Signal, SourceHandle};
use crate::error::PadError;
use crate::samples::Fetcher;

/// Whether the background loop is currently sounding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

struct Inner {
    buffer: Option<DecodedBuffer>,
    uri: Option<String>,
    source: Option<SourceHandle>,
    state: PlaybackState,
}

/// Loops a single background track on the background bus. At most one loop
/// plays at a time.
pub struct BackgroundPlayer {
    mixer: Arc<Mixer>,
    fetcher: Arc<dyn Fetcher>,
    inner: Mutex<Inner>,
    span: Span,
}

impl BackgroundPlayer {
    pub fn new(mixer: Arc<Mixer>, fetcher: Arc<dyn Fetcher>) -> BackgroundPlayer {
        BackgroundPlayer {
            mixer,
            fetcher,
            inner: Mutex::new(Inner {
                buffer: None,
                uri: None,
                source: None,
                state: PlaybackState::Stopped,
            }),
            span: span!(Level::INFO, "background"),
        }
    }

    /// Fetches and decodes the track at `uri`, replacing the loaded buffer. A
    /// loop that is already playing keeps going until the next play or stop.
    /// On failure nothing stays loaded.
    pub async fn load(&self, uri: &str) -> Result<(), PadError> {
        let result = self
            .fetch_and_decode(uri)
            .instrument(self.span.clone())
            .await;

        let mut inner = self.inner.lock();
        match result {
            Ok(buffer) => {
                let _enter = self.span.enter();
                info!(uri, duration = ?buffer.duration(), "Background track loaded");
                inner.buffer = Some(buffer);
                inner.uri = Some(uri.to_string());
                Ok(())
            }
            Err(e) => {
                let _enter = self.span.enter();
                warn!(uri, err = %e, "Unable to load background track");
                inner.buffer = None;
                inner.uri = None;
                Err(e)
            }
        }
    }

    async fn fetch_and_decode(&self, uri: &str) -> Result<DecodedBuffer, PadError> {
        let bytes = self.fetcher.fetch(uri).await?;
        let hint = decode::extension_hint(uri);
        Ok(decode::decode_async(bytes, hint, self.mixer.sample_rate()).await?)
    }

    /// Starts looping the loaded buffer from the top, replacing any loop that is
    /// already playing. Does nothing if nothing is loaded.
    pub fn play(&self) {
        let _enter = self.span.enter();
        let mut inner = self.inner.lock();
        let Some(buffer) = inner.buffer.clone() else {
            warn!("No background track loaded");
            return;
        };

        if let Some(source) = inner.source.take() {
            let _ = source.stop();
        }
        inner.source = Some(self.mixer.start(
            Signal::Buffer {
                buffer,
                looping: true,
            },
            GainControl::new(1.0),
            Bus::Background,
        ));
        inner.state = PlaybackState::Playing;
        info!(uri = inner.uri.as_deref(), "Background playing");
    }

    /// Stops the loop. Safe to call when nothing is playing.
    pub fn stop(&self) {
        let _enter = self.span.enter();
        let mut inner = self.inner.lock();
        if let Some(source) = inner.source.take() {
            let _ = source.stop();
            info!("Background stopped");
        }
        inner.state = PlaybackState::Stopped;
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().state
    }

    /// The URI of the loaded track, if any.
    pub fn loaded_uri(&self) -> Option<String> {
        self.inner.lock().uri.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.lock().buffer.is_some()
    }

    /// Sets the background bus gain.
    pub fn set_volume(&self, volume: f32) {
        self.mixer.background().set(volume);
    }

    pub fn volume(&self) -> f32 {
        self.mixer.background().get()
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::testutil::{wav_bytes, MockFetcher};

    fn player() -> (Arc<Mixer>, Arc<MockFetcher>, BackgroundPlayer) {
        let mixer = Arc::new(Mixer::new(2, 8000));
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.insert("loop.wav", wav_bytes(&[vec![0.25; 800]], 8000));
        let player = BackgroundPlayer::new(mixer.clone(), fetcher.clone());
        (mixer, fetcher, player)
    }

    #[tokio::test]
    async fn test_load_play_stop() -> Result<(), Box<dyn Error>> {
        let (mixer, _fetcher, player) = player();
        assert_eq!(player.state(), PlaybackState::Stopped);

        player.load("loop.wav").await?;
        assert_eq!(player.loaded_uri().as_deref(), Some("loop.wav"));
        assert_eq!(player.state(), PlaybackState::Stopped);

        player.play();
        assert_eq!(player.state(), PlaybackState::Playing);

        // The loop keeps going well past its own length.
        mixer.process_frames(4000);
        assert_eq!(mixer.active_count(), 1);

        player.stop();
        assert_eq!(player.state(), PlaybackState::Stopped);
        player.stop();
        assert_eq!(player.state(), PlaybackState::Stopped);

        mixer.process_frames(16);
        assert_eq!(mixer.active_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_play_replaces_running_loop() -> Result<(), Box<dyn Error>> {
        let (mixer, _fetcher, player) = player();
        player.load("loop.wav").await?;

        player.play();
        player.play();
        mixer.process_frames(16);
        assert_eq!(mixer.active_count(), 1);
        assert_eq!(player.state(), PlaybackState::Playing);
        Ok(())
    }

    #[tokio::test]
    async fn test_play_without_buffer() {
        let (mixer, _fetcher, player) = player();
        player.play();
        assert_eq!(player.state(), PlaybackState::Stopped);
        mixer.process_frames(16);
        assert_eq!(mixer.active_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_load_clears_buffer() -> Result<(), Box<dyn Error>> {
        let (_mixer, fetcher, player) = player();
        player.load("loop.wav").await?;
        assert!(player.is_loaded());

        fetcher.fail("other.wav");
        assert!(player.load("other.wav").await.is_err());
        assert!(!player.is_loaded());
        assert_eq!(player.loaded_uri(), None);

        player.play();
        assert_eq!(player.state(), PlaybackState::Stopped);
        Ok(())
    }

    #[test]
    fn test_volume() {
        let mixer = Arc::new(Mixer::new(2, 8000));
        let player = BackgroundPlayer::new(mixer.clone(), Arc::new(MockFetcher::new()));
        player.set_volume(0.5);
        assert_eq!(player.volume(), 0.5);
        assert_eq!(mixer.background().get(), 0.5);
    }
}

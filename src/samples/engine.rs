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

//! Turns pad triggers into voices on the mixer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::SampleStore;
use super::voice::{Voice, VoiceKind, VoicePool};
use crate::audio::{Bus, GainControl, Mixer, Signal, Tone};

/// Quietest accepted velocity.
pub const MIN_VELOCITY: f32 = 0.0001;
/// Loudest accepted velocity.
pub const MAX_VELOCITY: f32 = 1.0;

const SYNTH_GAIN: f32 = 0.2;
const SYNTH_FLOOR: f32 = 0.001;
const SYNTH_DECAY: Duration = Duration::from_millis(150);
const SYNTH_LENGTH: Duration = Duration::from_millis(180);
const SYNTH_MIN_FREQUENCY: f32 = 80.0;
const SYNTH_MAX_FREQUENCY: f32 = 280.0;

/// Clamps a velocity into the accepted range. NaN is treated as full velocity.
pub fn clamp_velocity(velocity: f32) -> f32 {
    if velocity.is_nan() {
        return MAX_VELOCITY;
    }
    velocity.clamp(MIN_VELOCITY, MAX_VELOCITY)
}

/// Plays samples through the mixer, subject to the voice pool's polyphony cap.
pub struct PlaybackEngine {
    mixer: Arc<Mixer>,
    store: Arc<SampleStore>,
    pool: Arc<Mutex<VoicePool>>,
}

impl PlaybackEngine {
    pub fn new(mixer: Arc<Mixer>, store: Arc<SampleStore>, max_voices: usize) -> PlaybackEngine {
        PlaybackEngine {
            mixer,
            store,
            pool: Arc::new(Mutex::new(VoicePool::new(max_voices))),
        }
    }

    /// Plays `name` at `velocity`. If the sample can't be resolved a short
    /// synthesized tone plays instead; that tone does not count against the
    /// polyphony cap.
    pub async fn play(&self, name: &str, velocity: f32) -> Voice {
        let velocity = clamp_velocity(velocity);
        match self.store.resolve(name).await {
            Some(buffer) => self.play_buffer(name, buffer, velocity),
            None => self.play_synth(name, velocity),
        }
    }

    fn play_buffer(&self, name: &str, buffer: crate::audio::DecodedBuffer, velocity: f32) -> Voice {
        let gain = GainControl::new(velocity);

        // Start and admission happen under one lock so concurrent triggers
        // can't push the pool past its cap.
        let voice = {
            let mut pool = self.pool.lock();
            let source = self.mixer.start(
                Signal::Buffer {
                    buffer,
                    looping: false,
                },
                gain.clone(),
                Bus::Master,
            );
            let voice = Voice::new(name, VoiceKind::Sample, source, gain);
            for evicted in pool.admit(voice.clone()) {
                debug!(sample = evicted.sample_name(), voice = evicted.id(), "Voice evicted");
            }
            voice
        };
        debug!(sample = name, voice = voice.id(), velocity, "Voice started");

        let pool = self.pool.clone();
        let source = voice.source().clone();
        let id = voice.id();
        tokio::spawn(async move {
            source.ended().await;
            pool.lock().release(id);
        });
        voice
    }

    fn play_synth(&self, name: &str, velocity: f32) -> Voice {
        let frequency = rand::thread_rng().gen_range(SYNTH_MIN_FREQUENCY..SYNTH_MAX_FREQUENCY);
        let gain = GainControl::new(SYNTH_GAIN * velocity);
        let tone = Tone::new(frequency, SYNTH_FLOOR, SYNTH_DECAY, SYNTH_LENGTH);
        let source = self
            .mixer
            .start(Signal::Tone(tone.clone()), gain.clone(), Bus::Master);
        warn!(sample = name, frequency, "Sample unavailable, playing fallback tone");
        Voice::new(name, VoiceKind::Synth, source, gain).with_tone(tone)
    }

    /// Fire-and-forget trigger for input handlers. Nothing needs to wait on
    /// the returned handle.
    pub fn trigger(self: &Arc<Self>, name: &str, velocity: f32) -> JoinHandle<Voice> {
        let engine = self.clone();
        let name = name.to_string();
        tokio::spawn(async move { engine.play(&name, velocity).await })
    }

    pub fn max_voices(&self) -> usize {
        self.pool.lock().max_voices()
    }

    /// Changes the polyphony cap. Takes effect on the next trigger.
    pub fn set_max_voices(&self, max_voices: usize) {
        let mut pool = self.pool.lock();
        pool.set_max_voices(max_voices);
        info!(max_voices = pool.max_voices(), "Polyphony changed");
    }

    /// Number of live sample voices.
    pub fn active_voices(&self) -> usize {
        self.pool.lock().len()
    }

    /// Sample names of live voices, oldest first.
    pub fn active_samples(&self) -> Vec<String> {
        self.pool
            .lock()
            .sample_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Stops every sample voice.
    pub fn stop_all(&self) {
        self.pool.lock().clear();
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }
}

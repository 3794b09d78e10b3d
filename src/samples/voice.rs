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

//! Voice bookkeeping for polyphonic sample playback.
//!
//! Voices are kept in start order. When the pool is full the oldest voice is
//! stopped to make room.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::audio::{GainControl, SourceHandle, Tone};

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// What a voice is playing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceKind {
    /// A decoded sample buffer.
    Sample,
    /// The synthesized fallback tone.
    Synth,
}

/// A triggered sound and the handles that control it.
#[derive(Clone)]
pub struct Voice {
    id: u64,
    sample_name: String,
    kind: VoiceKind,
    source: SourceHandle,
    gain: GainControl,
    /// The tone a synth voice renders.
    tone: Option<Tone>,
}

impl Voice {
    pub fn new(
        sample_name: &str,
        kind: VoiceKind,
        source: SourceHandle,
        gain: GainControl,
    ) -> Voice {
        Voice {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::Relaxed),
            sample_name: sample_name.to_string(),
            kind,
            source,
            gain,
            tone: None,
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Voice {
        self.tone = Some(tone);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sample_name(&self) -> &str {
        &self.sample_name
    }

    pub fn kind(&self) -> VoiceKind {
        self.kind
    }

    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    pub fn gain(&self) -> &GainControl {
        &self.gain
    }

    pub fn tone(&self) -> Option<&Tone> {
        self.tone.as_ref()
    }
}

impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voice")
            .field("id", &self.id)
            .field("sample", &self.sample_name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Tracks live sample voices, oldest first.
pub struct VoicePool {
    voices: VecDeque<Voice>,
    max_voices: usize,
}

impl VoicePool {
    /// Creates a pool. A capacity below one is raised to one.
    pub fn new(max_voices: usize) -> VoicePool {
        VoicePool {
            voices: VecDeque::new(),
            max_voices: max_voices.max(1),
        }
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices
    }

    /// Changes the capacity. Voices above a lowered capacity keep playing and
    /// are evicted by the next admission.
    pub fn set_max_voices(&mut self, max_voices: usize) {
        self.max_voices = max_voices.max(1);
    }

    /// Stops and removes the oldest voices until one more fits.
    fn make_room(&mut self) -> Vec<Voice> {
        let mut evicted = Vec::new();
        while self.voices.len() >= self.max_voices {
            let Some(voice) = self.voices.pop_front() else {
                break;
            };
            if let Err(e) = voice.source.stop() {
                debug!(voice = voice.id, err = %e, "Evicted voice had already finished");
            }
            debug!(
                voice = voice.id,
                sample = voice.sample_name,
                max_voices = self.max_voices,
                "Voice limit reached, stealing oldest"
            );
            evicted.push(voice);
        }
        evicted
    }

    /// Adds a voice as the newest, first stopping and removing the oldest
    /// voices until it fits. Returns the evicted voices.
    pub fn admit(&mut self, voice: Voice) -> Vec<Voice> {
        let evicted = self.make_room();
        self.voices.push_back(voice);
        evicted
    }

    /// Forgets a voice. Returns false if it was not in the pool.
    pub fn release(&mut self, id: u64) -> bool {
        match self.voices.iter().position(|voice| voice.id == id) {
            Some(index) => {
                self.voices.remove(index);
                true
            }
            None => false,
        }
    }

    /// Stops every voice and empties the pool.
    pub fn clear(&mut self) {
        for voice in self.voices.drain(..) {
            let _ = voice.source.stop();
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// The sample names of live voices, oldest first.
    pub fn sample_names(&self) -> Vec<&str> {
        self.voices.iter().map(Voice::sample_name).collect()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.voices.iter().any(|voice| voice.id == id)
    }
}

impl fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoicePool")
            .field("active_voices", &self.voices.len())
            .field("max_voices", &self.max_voices)
            .finish()
    }
}

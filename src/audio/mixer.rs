// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
// Core audio mixing logic that can be used by both CPAL and test implementations
use std::fmt;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::error;

use super::gain::GainControl;
use super::source::{Bus, Signal, SourceHandle, Voicing};

/// Default master gain.
pub const DEFAULT_MASTER_GAIN: f32 = 0.9;

/// Default background-music gain.
pub const DEFAULT_BACKGROUND_GAIN: f32 = 0.35;

/// Represents an active audio source in the mixer
struct ActiveSource {
    handle: SourceHandle,
    voicing: Voicing,
    gain: GainControl,
    bus: Bus,
}

/// The output graph: every source feeds either the master bus directly or the
/// background bus, which in turn feeds master.
pub struct Mixer {
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
    master: GainControl,
    background: GainControl,
    /// New sources are queued here so starting a voice never waits on the render lock.
    source_tx: Sender<ActiveSource>,
    source_rx: Receiver<ActiveSource>,
    /// Active audio sources currently playing
    active_sources: Mutex<Vec<ActiveSource>>,
}

impl Mixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Mixer {
        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        Mixer {
            num_channels: num_channels.max(1),
            sample_rate,
            master: GainControl::new(DEFAULT_MASTER_GAIN),
            background: GainControl::new(DEFAULT_BACKGROUND_GAIN),
            source_tx,
            source_rx,
            active_sources: Mutex::new(Vec::new()),
        }
    }

    /// The master volume node.
    pub fn master(&self) -> &GainControl {
        &self.master
    }

    /// The background-music volume node.
    pub fn background(&self) -> &GainControl {
        &self.background
    }

    /// Starts a new source routed through `gain` onto `bus`. It begins playing
    /// at the next render block.
    pub fn start(&self, signal: Signal, gain: GainControl, bus: Bus) -> SourceHandle {
        let handle = SourceHandle::new();
        let voicing = Voicing::new(signal, gain.get(), self.sample_rate);
        let source = ActiveSource {
            handle: handle.clone(),
            voicing,
            gain,
            bus,
        };

        if let Err(e) = self.source_tx.send(source) {
            // The receiver lives in this struct, so this only happens mid-teardown.
            error!(error = %e, "Failed to queue source for mixer");
            handle.mark_ended();
        }
        handle
    }

    /// Mixes all active sources into `output` (interleaved). Sources that run
    /// out or were stopped are removed and marked as ended.
    pub fn process_into(&self, output: &mut [f32]) {
        output.fill(0.0);

        let mut sources = self.active_sources.lock();
        while let Ok(source) = self.source_rx.try_recv() {
            sources.push(source);
        }

        let channels = self.num_channels as usize;
        let background_gain = self.background.get();
        let sample_rate = self.sample_rate;

        sources.retain_mut(|source| {
            if source.handle.is_stop_requested() {
                source.handle.mark_ended();
                return false;
            }

            let gain = match source.bus {
                Bus::Master => source.gain.get(),
                Bus::Background => source.gain.get() * background_gain,
            };

            for frame in output.chunks_exact_mut(channels) {
                if !source.voicing.mix_frame(frame, gain, sample_rate) {
                    source.handle.mark_ended();
                    return false;
                }
            }
            true
        });
        drop(sources);

        let master = self.master.get();
        for sample in output.iter_mut() {
            *sample *= master;
        }
    }

    /// Renders `num_frames` frames into a new buffer.
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut output = vec![0.0f32; num_frames * self.num_channels as usize];
        self.process_into(&mut output);
        output
    }

    /// Stops every source and marks it ended.
    pub fn stop_all(&self) {
        let mut sources = self.active_sources.lock();
        while let Ok(source) = self.source_rx.try_recv() {
            sources.push(source);
        }
        for source in sources.drain(..) {
            source.handle.mark_ended();
        }
    }

    /// Number of sources the render thread currently knows about.
    pub fn active_count(&self) -> usize {
        self.active_sources.lock().len() + self.source_rx.len()
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl fmt::Debug for Mixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mixer")
            .field("channels", &self.num_channels)
            .field("sample_rate", &self.sample_rate)
            .field("master", &self.master.get())
            .field("background", &self.background.get())
            .field("active_sources", &self.active_count())
            .finish()
    }
}

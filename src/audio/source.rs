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
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use super::decode::DecodedBuffer;

/// Global atomic counter for generating unique source IDs.
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Errors from controlling a playing source.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source {0} has already ended")]
    AlreadyEnded(u64),

    #[error("source {0} has already been stopped")]
    AlreadyStopped(u64),
}

/// The gain stage a source is routed through before the master bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bus {
    /// Straight into master.
    Master,
    /// Through the background-music gain, then into master.
    Background,
}

struct SourceState {
    stop_requested: AtomicBool,
    ended: AtomicBool,
    notify: Notify,
}

/// A handle to a source in the mixer. Clones refer to the same source.
#[derive(Clone)]
pub struct SourceHandle {
    id: u64,
    state: Arc<SourceState>,
}

impl SourceHandle {
    pub(crate) fn new() -> SourceHandle {
        SourceHandle {
            id: SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            state: Arc::new(SourceState {
                stop_requested: AtomicBool::new(false),
                ended: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Asks the mixer to stop this source at the next render block.
    pub fn stop(&self) -> Result<(), SourceError> {
        if self.has_ended() {
            return Err(SourceError::AlreadyEnded(self.id));
        }
        if self.state.stop_requested.swap(true, Ordering::AcqRel) {
            return Err(SourceError::AlreadyStopped(self.id));
        }
        Ok(())
    }

    pub fn is_stop_requested(&self) -> bool {
        self.state.stop_requested.load(Ordering::Acquire)
    }

    /// True once the mixer has dropped the source, either because it ran out
    /// or because it was stopped.
    pub fn has_ended(&self) -> bool {
        self.state.ended.load(Ordering::Acquire)
    }

    /// Waits until the source has ended.
    pub async fn ended(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.has_ended() {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn mark_ended(&self) {
        if !self.state.ended.swap(true, Ordering::AcqRel) {
            self.state.notify.notify_waiters();
        }
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandle")
            .field("id", &self.id)
            .field("stop_requested", &self.is_stop_requested())
            .field("ended", &self.has_ended())
            .finish()
    }
}

/// A short percussive triangle tone with an exponential decay, used when a
/// pad's sample can't be loaded.
#[derive(Clone, Debug)]
pub struct Tone {
    frequency: f32,
    /// Level the envelope decays to, relative to full scale.
    floor: f32,
    /// Time to reach `floor`.
    decay: Duration,
    /// Hard stop.
    length: Duration,
}

impl Tone {
    pub fn new(frequency: f32, floor: f32, decay: Duration, length: Duration) -> Tone {
        Tone {
            frequency,
            floor,
            decay,
            length,
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn length(&self) -> Duration {
        self.length
    }
}

/// What a source plays.
pub enum Signal {
    Buffer {
        buffer: DecodedBuffer,
        looping: bool,
    },
    Tone(Tone),
}

/// Render state for a signal.
pub(crate) struct Voicing {
    signal: Signal,
    /// Next frame to read (buffers) or frames rendered so far (tones).
    position: usize,
    /// Envelope ratio per frame for tones, derived from the starting gain.
    decay_per_frame: f32,
    envelope: f32,
    decay_frames: usize,
    length_frames: usize,
}

impl Voicing {
    pub(crate) fn new(signal: Signal, start_gain: f32, sample_rate: u32) -> Voicing {
        let mut voicing = Voicing {
            signal,
            position: 0,
            decay_per_frame: 1.0,
            envelope: 1.0,
            decay_frames: 0,
            length_frames: 0,
        };

        if let Signal::Tone(tone) = &voicing.signal {
            let rate = sample_rate as f64;
            voicing.decay_frames = (tone.decay.as_secs_f64() * rate).round().max(1.0) as usize;
            voicing.length_frames = (tone.length.as_secs_f64() * rate).round() as usize;
            // The envelope multiplies the source gain, so it needs to cover the
            // distance from the starting gain down to the absolute floor.
            let target = if start_gain > tone.floor {
                tone.floor / start_gain
            } else {
                1.0
            };
            voicing.decay_per_frame = target.powf(1.0 / voicing.decay_frames as f32);
        }

        voicing
    }

    /// Adds one frame of this signal into `frame`, scaled by `gain`. Returns
    /// false once the signal has nothing left to play.
    pub(crate) fn mix_frame(&mut self, frame: &mut [f32], gain: f32, sample_rate: u32) -> bool {
        match &self.signal {
            Signal::Buffer { buffer, looping } => {
                let frames = buffer.frames();
                if frames == 0 {
                    return false;
                }
                if self.position >= frames {
                    if !*looping {
                        return false;
                    }
                    self.position = 0;
                }

                let channels = buffer.channel_count() as usize;
                let offset = self.position * channels;
                let samples = buffer.samples();
                for (out_channel, out) in frame.iter_mut().enumerate() {
                    // Mono fans out to every output; wider sources wrap.
                    *out += samples[offset + out_channel % channels] * gain;
                }
                self.position += 1;
                true
            }
            Signal::Tone(tone) => {
                if self.position >= self.length_frames {
                    return false;
                }
                let t = self.position as f32 / sample_rate as f32;
                let phase = (t * tone.frequency).fract();
                // Triangle in [-1, 1].
                let value = 1.0 - 4.0 * (phase - 0.5).abs();

                let level = value * self.envelope * gain;
                for out in frame.iter_mut() {
                    *out += level;
                }

                if self.position < self.decay_frames {
                    self.envelope *= self.decay_per_frame;
                }
                self.position += 1;
                true
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn envelope(&self) -> f32 {
        self.envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_twice_reports_error() {
        let handle = SourceHandle::new();
        assert!(handle.stop().is_ok());
        assert_eq!(handle.stop(), Err(SourceError::AlreadyStopped(handle.id())));
    }

    #[test]
    fn test_stop_after_end_reports_error() {
        let handle = SourceHandle::new();
        handle.mark_ended();
        assert_eq!(handle.stop(), Err(SourceError::AlreadyEnded(handle.id())));
    }

    #[tokio::test]
    async fn test_ended_resolves_after_mark() {
        let handle = SourceHandle::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.ended().await })
        };
        tokio::task::yield_now().await;
        handle.mark_ended();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("ended() never resolved")
            .unwrap();
    }

    #[test]
    fn test_buffer_signal_runs_out() {
        let buffer = DecodedBuffer::new(vec![0.5, 0.25], 1, 100);
        let mut voicing = Voicing::new(
            Signal::Buffer {
                buffer,
                looping: false,
            },
            1.0,
            100,
        );
        let mut frame = [0.0f32; 2];

        assert!(voicing.mix_frame(&mut frame, 1.0, 100));
        assert_eq!(frame, [0.5, 0.5]);
        assert!(voicing.mix_frame(&mut frame, 1.0, 100));
        assert_eq!(frame, [0.75, 0.75]);
        assert!(!voicing.mix_frame(&mut frame, 1.0, 100));
    }

    #[test]
    fn test_looping_buffer_wraps() {
        let buffer = DecodedBuffer::new(vec![0.5, 0.25], 1, 100);
        let mut voicing = Voicing::new(
            Signal::Buffer {
                buffer,
                looping: true,
            },
            1.0,
            100,
        );
        for _ in 0..10 {
            let mut frame = [0.0f32; 1];
            assert!(voicing.mix_frame(&mut frame, 1.0, 100));
        }
    }

    #[test]
    fn test_tone_decays_to_floor_and_stops() {
        let sample_rate = 1000;
        let tone = Tone::new(
            100.0,
            0.001,
            Duration::from_millis(150),
            Duration::from_millis(180),
        );
        let mut voicing = Voicing::new(Signal::Tone(tone), 0.2, sample_rate);

        let mut rendered = 0;
        let mut frame = [0.0f32; 1];
        while voicing.mix_frame(&mut frame, 0.2, sample_rate) {
            rendered += 1;
            assert!(rendered <= 180, "tone played past its hard stop");
        }
        assert_eq!(rendered, 180);

        // 0.2 * envelope should have landed on the 0.001 floor.
        let final_level = 0.2 * voicing.envelope();
        assert!((final_level - 0.001).abs() < 1e-4, "level {}", final_level);
    }
}

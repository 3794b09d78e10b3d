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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use tracing::{info, span, Level};

use super::mixer::Mixer;

/// Frames rendered per tick of the mock clock.
const BLOCK_FRAMES: usize = 256;

/// A mock device. Renders the mixer in real time and throws the audio away.
pub struct Device {
    name: String,
    mixer: Arc<Mixer>,
    running: Arc<AtomicBool>,
    rendered_frames: Arc<AtomicU64>,
    render_thread: Option<thread::JoinHandle<()>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, num_channels: u16, sample_rate: u32) -> Device {
        let mixer = Arc::new(Mixer::new(num_channels, sample_rate));
        let running = Arc::new(AtomicBool::new(true));
        let rendered_frames = Arc::new(AtomicU64::new(0));

        let render_thread = {
            let mixer = mixer.clone();
            let running = running.clone();
            let rendered_frames = rendered_frames.clone();
            let name = name.to_string();
            thread::spawn(move || {
                let span = span!(Level::INFO, "render (mock)");
                let _enter = span.enter();
                info!(device = name, sample_rate, "Mock device started.");

                let block = Duration::from_secs_f64(BLOCK_FRAMES as f64 / sample_rate as f64);
                let mut scratch = vec![0.0f32; BLOCK_FRAMES * mixer.num_channels() as usize];
                while running.load(Ordering::Relaxed) {
                    mixer.process_into(&mut scratch);
                    rendered_frames.fetch_add(BLOCK_FRAMES as u64, Ordering::Relaxed);
                    thread::sleep(block);
                }
            })
        };

        Device {
            name: name.to_string(),
            mixer,
            running,
            rendered_frames,
            render_thread: Some(render_thread),
        }
    }

    /// Total frames rendered so far.
    pub fn rendered_frames(&self) -> u64 {
        self.rendered_frames.load(Ordering::Relaxed)
    }
}

impl crate::audio::Device for Device {
    fn mixer(&self) -> Arc<Mixer> {
        self.mixer.clone()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.render_thread.take() {
            let _ = thread.join();
        }
        self.mixer.stop_all();
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Bus, DecodedBuffer, GainControl, Signal};
    use crate::testutil::eventually;

    #[test]
    fn test_mock_device_renders_sources_to_completion() {
        let device = Device::get("mock-test", 2, 8000);
        let handle = device.mixer.start(
            Signal::Buffer {
                buffer: DecodedBuffer::new(vec![0.1; 400], 1, 8000),
                looping: false,
            },
            GainControl::new(1.0),
            Bus::Master,
        );

        eventually(|| handle.has_ended(), "Mock device never finished the source");
        assert!(device.rendered_frames() >= 400);
    }
}

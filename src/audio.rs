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
use std::{error::Error, fmt, sync::Arc};

use crate::config;

pub mod cpal;
pub mod decode;
pub mod gain;
pub mod mixer;
pub mod mock;
pub mod source;

pub use decode::{DecodeError, DecodedBuffer};
pub use gain::GainControl;
pub use mixer::Mixer;
pub use source::{Bus, Signal, SourceError, SourceHandle, Tone};

/// An output device that continuously renders a mixer.
pub trait Device: fmt::Display + Send + Sync {
    /// The mixer feeding this device.
    fn mixer(&self) -> Arc<Mixer>;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Opens the device described by the audio configuration. Device names starting
/// with "mock" render on a timer thread instead of real hardware.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(
            device,
            config.channels().unwrap_or(2),
            config.sample_rate().unwrap_or(44100),
        )));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}

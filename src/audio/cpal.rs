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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::audio::mixer::Mixer;
use crate::config;

/// A listed output device.
pub struct DeviceInfo {
    name: String,
    host_id: cpal::HostId,
    max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// A cpal output stream rendering the pad mixer. The stream is owned by a
/// dedicated thread since cpal streams can't move between threads on every host.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    mixer: Arc<Mixer>,
    running: Arc<AtomicBool>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}, Rate={}) ({})",
            self.name,
            self.mixer.num_channels(),
            self.mixer.sample_rate(),
            self.host_id.name()
        )
    }
}

fn device_name(device: &cpal::Device) -> Option<String> {
    device
        .description()
        .ok()
        .map(|description| description.name().to_string())
}

impl Device {
    /// Lists cpal output devices.
    pub fn list() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<DeviceInfo> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    if let Some(name) = device_name(&device) {
                        devices.push(DeviceInfo {
                            name,
                            host_id,
                            max_channels,
                        });
                    }
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Finds the named device (or the host default for "default") and starts
    /// rendering into it.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let (host_id, device) = find_device(name)?;

        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let mut stream_config: cpal::StreamConfig = supported.into();
        if let Some(channels) = config.channels() {
            stream_config.channels = channels;
        }
        if let Some(sample_rate) = config.sample_rate() {
            stream_config.sample_rate = sample_rate;
        }

        let mixer = Arc::new(Mixer::new(
            stream_config.channels,
            stream_config.sample_rate,
        ));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        let output_thread = {
            let mixer = mixer.clone();
            let running = running.clone();
            thread::spawn(move || {
                let stream =
                    build_output_stream(&device, &stream_config, sample_format, mixer).and_then(
                        |stream| stream.play().map(|_| stream).map_err(|e| e.to_string()),
                    );
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                info!("CPAL output stream started successfully");
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive until the device is dropped.
                while running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(100));
                }
                drop(stream);
            })
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(format!("unable to start output stream: {}", e).into()),
            Err(_) => return Err("output thread exited before starting".into()),
        }

        Ok(Device {
            name: name.to_string(),
            host_id,
            mixer,
            running,
            output_thread: Some(output_thread),
        })
    }
}

fn find_device(name: &str) -> Result<(cpal::HostId, cpal::Device), Box<dyn Error>> {
    if name == "default" {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("no default output device")?;
        return Ok((host.id(), device));
    }

    let _shh_stderr = shh::stderr()?;
    for host_id in cpal::available_hosts() {
        let Ok(devices) = cpal::host_from_id(host_id)?.output_devices() else {
            continue;
        };
        for device in devices {
            if device_name(&device).is_some_and(|n| n.trim() == name) {
                return Ok((host_id, device));
            }
        }
    }
    Err(format!("no device found with name {}", name).into())
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: Arc<Mixer>,
) -> Result<cpal::Stream, String> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, mixer),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, mixer),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, mixer),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, mixer),
        other => Err(format!("unsupported sample format: {:?}", other)),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mixer>,
) -> Result<cpal::Stream, String>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    // Reused between callbacks; only grows if the host changes its period size.
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                mixer.process_into(&mut scratch);
                for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                    *dst = <T as cpal::Sample>::from_sample::<f32>(src);
                }
            },
            |err| error!("CPAL output stream error: {}", err),
            None,
        )
        .map_err(|e| e.to_string())
}

impl crate::audio::Device for Device {
    fn mixer(&self) -> Arc<Mixer> {
        self.mixer.clone()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
        self.mixer.stop_all();
    }
}

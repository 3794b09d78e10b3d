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

//! In-memory audio decoding.
//!
//! Pad samples and backing loops are decoded entirely into memory so triggering
//! never touches the decoder.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Errors produced while turning raw bytes into PCM.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unrecognized audio data: {0}")]
    Probe(#[source] SymphoniaError),

    #[error("no audio track found")]
    NoTrack,

    #[error("audio stream did not specify a sample rate")]
    UnknownSampleRate,

    #[error("decoder error: {0}")]
    Codec(#[source] SymphoniaError),

    #[error("audio stream contained no samples")]
    Empty,

    #[error("decode task did not complete: {0}")]
    Interrupted(String),
}

/// Immutable decoded PCM data. Cloning shares the underlying samples.
#[derive(Clone)]
pub struct DecodedBuffer {
    /// Interleaved f32 samples.
    data: Arc<Vec<f32>>,
    channel_count: u16,
    sample_rate: u32,
}

impl DecodedBuffer {
    /// Creates a buffer from interleaved samples.
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> DecodedBuffer {
        DecodedBuffer {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// The interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Returns true if both buffers share the same sample data.
    pub fn same_data(&self, other: &DecodedBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for DecodedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedBuffer")
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// Returns the extension of a file name or URI, used as a probe hint.
pub fn extension_hint(name: &str) -> Option<String> {
    let name = name.split(['?', '#']).next().unwrap_or(name);
    let file = name.rsplit('/').next().unwrap_or(name);
    file.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Decodes a complete audio file held in memory and resamples it to `target_rate`.
pub fn decode(
    bytes: Vec<u8>,
    hint: Option<&str>,
    target_rate: u32,
) -> Result<DecodedBuffer, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut probe_hint = Hint::new();
    if let Some(extension) = hint {
        probe_hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &probe_hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(DecodeError::Probe)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let source_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(DecodeError::Codec)?;

    let mut samples: Vec<f32> = Vec::new();
    let mut channel_count: u16 = 0;

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Codec(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(error = e, "Skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(DecodeError::Codec(e)),
        };

        let spec = *decoded.spec();
        channel_count = spec.channels.count() as u16;
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() || channel_count == 0 {
        return Err(DecodeError::Empty);
    }

    if source_rate != target_rate && target_rate > 0 {
        debug!(
            source_rate,
            target_rate, "Resampling decoded audio to output rate"
        );
        samples = transcode_samples(&samples, channel_count, source_rate, target_rate);
        return Ok(DecodedBuffer::new(samples, channel_count, target_rate));
    }

    Ok(DecodedBuffer::new(samples, channel_count, source_rate))
}

/// Runs [`decode`] on the blocking pool so the caller's task can keep yielding.
pub async fn decode_async(
    bytes: Vec<u8>,
    hint: Option<String>,
    target_rate: u32,
) -> Result<DecodedBuffer, DecodeError> {
    tokio::task::spawn_blocking(move || decode(bytes, hint.as_deref(), target_rate))
        .await
        .map_err(|e| DecodeError::Interrupted(e.to_string()))?
}

/// Resamples interleaved audio using linear interpolation. Drum hits and loops
/// don't need anything fancier.
fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_decode_wav() {
        let bytes = testutil::wav_bytes(&[vec![0.5f32; 441]], 44100);
        let buffer = decode(bytes, Some("wav"), 44100).unwrap();

        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frames(), 441);
        assert!((buffer.samples()[10] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_stereo_resampled() {
        let bytes = testutil::wav_bytes(&[vec![0.25f32; 4410], vec![-0.25f32; 4410]], 44100);
        let buffer = decode(bytes, None, 48000).unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.sample_rate(), 48000);
        assert_eq!(
            buffer.frames(),
            (4410.0_f64 * 48000.0 / 44100.0).ceil() as usize
        );
        assert!((buffer.samples()[0] - 0.25).abs() < 1e-3);
        assert!((buffer.samples()[1] + 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_decode_garbage() {
        let result = decode(b"definitely not audio".to_vec(), Some("wav"), 44100);
        assert!(result.is_err());
    }

    #[test]
    fn test_extension_hint() {
        assert_eq!(extension_hint("samples/kick.WAV").as_deref(), Some("wav"));
        assert_eq!(
            extension_hint("https://cdn.example.com/loops/a.mp3?v=2").as_deref(),
            Some("mp3")
        );
        assert_eq!(extension_hint("kick"), None);
    }

    #[test]
    fn test_transcode_stereo() {
        let source_samples = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let result = transcode_samples(&source_samples, 2, 44100, 48000);

        assert!(result.len() >= 8);
        assert!((result[0] - 1.0).abs() < 0.1);
        assert!((result[1] - (-1.0)).abs() < 0.1);
    }
}

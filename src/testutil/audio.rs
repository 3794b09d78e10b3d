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
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Renders the per-channel samples as a 32-bit float WAV file held in memory.
pub fn wav_bytes(samples: &[Vec<f32>], sample_rate: u32) -> Vec<u8> {
    let num_channels = samples.len();
    assert!(num_channels > 0 && num_channels <= u16::MAX.into(), "Bad channel count!");

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels: num_channels as u16,
                sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
        )
        .expect("create wav writer");

        // Interleave the channels.
        let frames = samples.iter().map(Vec::len).max().unwrap_or(0);
        for frame in 0..frames {
            for channel in samples {
                writer
                    .write_sample(channel.get(frame).copied().unwrap_or(0.0))
                    .expect("write sample");
            }
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}

/// Writes a WAV file to disk.
pub fn write_wav(
    path: &Path,
    samples: &[Vec<f32>],
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    fs::write(path, wav_bytes(samples, sample_rate))?;
    Ok(())
}

/// Creates a kit directory holding a short mono WAV for each given sample name.
pub fn test_kit_dir(names: &[&str]) -> Result<(tempfile::TempDir, PathBuf), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let samples = dir.path().join("samples");
    fs::create_dir_all(&samples)?;
    for name in names {
        write_wav(&samples.join(format!("{}.wav", name)), &[vec![0.5; 4410]], 44100)?;
    }
    let path = dir.path().to_path_buf();
    Ok((dir, path))
}

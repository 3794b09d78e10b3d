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
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::audio::Audio;
use super::error::ConfigError;

const DEFAULT_MAX_VOICES: usize = 16;
const DEFAULT_MASTER_VOLUME: f32 = 0.9;
const DEFAULT_BACKGROUND_VOLUME: f32 = 0.35;
const DEFAULT_FLASH: Duration = Duration::from_millis(100);

/// A sample entry: a logical name and the file its default buffer comes from.
#[derive(Deserialize, Clone, Debug)]
pub struct Sample {
    name: String,
    file: String,
}

impl Sample {
    pub fn new(name: &str, file: &str) -> Sample {
        Sample {
            name: name.to_string(),
            file: file.to_string(),
        }
    }

    /// The logical name pads refer to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The default asset location. Relative paths resolve against the kit directory.
    pub fn file(&self) -> &str {
        &self.file
    }
}

/// A pad binds a visible key to a sample.
#[derive(Deserialize, Clone, Debug)]
pub struct Pad {
    /// The printable key shown on the pad, e.g. "q" or ",".
    key: String,
    /// The sample the pad triggers.
    sample: String,
    /// An extra physical key code, e.g. "Numpad1".
    code: Option<String>,
    /// Text shown on the pad instead of the sample name.
    label: Option<String>,
}

impl Pad {
    pub fn new(key: &str, sample: &str) -> Pad {
        Pad {
            key: key.to_string(),
            sample: sample.to_string(),
            code: None,
            label: None,
        }
    }

    pub fn with_code(mut self, code: &str) -> Pad {
        self.code = Some(code.to_string());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.sample)
    }
}

/// The background loop configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Background {
    volume: Option<f32>,
    #[serde(default)]
    tracks: Vec<String>,
}

impl Background {
    /// The initial background bus gain.
    pub fn volume(&self) -> f32 {
        self.volume.unwrap_or(DEFAULT_BACKGROUND_VOLUME)
    }

    /// The selectable background tracks, in order.
    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }
}

/// A drum kit: samples, pads, and the settings for the session that plays them.
#[derive(Deserialize, Clone, Debug)]
pub struct Kit {
    #[serde(default)]
    audio: Audio,
    #[serde(default)]
    samples: Vec<Sample>,
    #[serde(default)]
    pads: Vec<Pad>,
    max_voices: Option<usize>,
    master_volume: Option<f32>,
    flash: Option<String>,
    /// A folder watched for dropped sample files.
    drop_folder: Option<String>,
    #[serde(default)]
    background: Background,

    /// The directory relative asset paths resolve against.
    #[serde(skip)]
    base_path: PathBuf,
}

impl Kit {
    /// Parse a kit from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Kit, ConfigError> {
        let mut kit = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Kit>()?;
        kit.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        kit.validate()?;
        Ok(kit)
    }

    /// Builds a kit directly, mostly for tests and embedding.
    pub fn new(samples: Vec<Sample>, pads: Vec<Pad>, base_path: &Path) -> Result<Kit, ConfigError> {
        let kit = Kit {
            audio: Audio::default(),
            samples,
            pads,
            max_voices: None,
            master_volume: None,
            flash: None,
            drop_folder: None,
            background: Background::default(),
            base_path: base_path.to_path_buf(),
        };
        kit.validate()?;
        Ok(kit)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for sample in &self.samples {
            if sample.name.is_empty() {
                return Err(ConfigError::Invalid("sample with an empty name".to_string()));
            }
            if !names.insert(sample.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate sample name '{}'",
                    sample.name
                )));
            }
        }

        for pad in &self.pads {
            if pad.key.chars().count() != 1 {
                return Err(ConfigError::Invalid(format!(
                    "pad key '{}' must be a single character",
                    pad.key
                )));
            }
            if !names.contains(pad.sample.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "pad '{}' refers to unknown sample '{}'",
                    pad.key, pad.sample
                )));
            }
        }

        if self.max_voices == Some(0) {
            return Err(ConfigError::Invalid(
                "max_voices must be at least 1".to_string(),
            ));
        }

        if self.audio.sample_rate() == Some(0) {
            return Err(ConfigError::Invalid(
                "audio sample_rate must be greater than 0".to_string(),
            ));
        }

        self.flash()?;
        Ok(())
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn with_audio(mut self, audio: Audio) -> Kit {
        self.audio = audio;
        self
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn pads(&self) -> &[Pad] {
        &self.pads
    }

    /// The polyphony cap for sample voices.
    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_MAX_VOICES)
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume.unwrap_or(DEFAULT_MASTER_VOLUME)
    }

    /// How long a pad stays lit after a trigger.
    pub fn flash(&self) -> Result<Duration, ConfigError> {
        match &self.flash {
            Some(flash) => Ok(DurationString::from_string(flash.clone())
                .map_err(|e| ConfigError::Invalid(format!("invalid flash '{}': {}", flash, e)))?
                .into()),
            None => Ok(DEFAULT_FLASH),
        }
    }

    /// The drop folder, resolved against the kit directory.
    pub fn drop_folder(&self) -> Option<PathBuf> {
        self.drop_folder
            .as_ref()
            .map(|folder| self.base_path.join(folder))
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs};

    use super::*;

    const KIT: &str = r#"
audio:
  device: mock-device
  sample_rate: 44100
max_voices: 2
flash: 250ms
samples:
  - name: kick
    file: samples/kick.wav
  - name: snare
    file: samples/snare.wav
pads:
  - key: q
    sample: kick
  - key: w
    sample: snare
    code: Numpad2
    label: Snare
background:
  volume: 0.5
  tracks:
    - loops/groove.mp3
"#;

    fn write_kit(contents: &str) -> Result<(tempfile::TempDir, PathBuf), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("kit.yaml");
        fs::write(&path, contents)?;
        Ok((dir, path))
    }

    #[test]
    fn parse_kit() -> Result<(), Box<dyn Error>> {
        let (dir, path) = write_kit(KIT)?;
        let kit = Kit::deserialize(&path)?;

        assert_eq!(kit.audio().device(), "mock-device");
        assert_eq!(kit.audio().sample_rate(), Some(44100));
        assert_eq!(kit.audio().channels(), None);
        assert_eq!(kit.max_voices(), 2);
        assert_eq!(kit.flash()?, Duration::from_millis(250));
        assert_eq!(kit.master_volume(), DEFAULT_MASTER_VOLUME);
        assert_eq!(kit.samples().len(), 2);
        assert_eq!(kit.samples()[1].name(), "snare");
        assert_eq!(kit.pads()[0].label(), "kick");
        assert_eq!(kit.pads()[1].label(), "Snare");
        assert_eq!(kit.pads()[1].code(), Some("Numpad2"));
        assert_eq!(kit.background().volume(), 0.5);
        assert_eq!(kit.background().tracks(), &["loops/groove.mp3".to_string()]);
        assert_eq!(kit.base_path(), dir.path());
        assert_eq!(kit.drop_folder(), None);
        Ok(())
    }

    #[test]
    fn defaults() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = write_kit("samples: []\n")?;
        let kit = Kit::deserialize(&path)?;

        assert_eq!(kit.audio().device(), "default");
        assert_eq!(kit.max_voices(), DEFAULT_MAX_VOICES);
        assert_eq!(kit.flash()?, DEFAULT_FLASH);
        assert_eq!(kit.background().volume(), DEFAULT_BACKGROUND_VOLUME);
        assert!(kit.background().tracks().is_empty());
        Ok(())
    }

    #[test]
    fn rejects_unknown_pad_sample() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = write_kit(
            "samples:\n  - name: kick\n    file: kick.wav\npads:\n  - key: q\n    sample: clap\n",
        )?;
        let err = Kit::deserialize(&path).err().ok_or("expected an error")?;
        assert!(matches!(err, ConfigError::Invalid(_)));
        Ok(())
    }

    #[test]
    fn rejects_duplicate_names_and_zero_voices() {
        let base = Path::new(".");
        assert!(Kit::new(
            vec![Sample::new("kick", "a.wav"), Sample::new("kick", "b.wav")],
            vec![],
            base,
        )
        .is_err());

        let (_dir, path) = write_kit("max_voices: 0\n").expect("write kit");
        assert!(Kit::deserialize(&path).is_err());
    }

    #[test]
    fn rejects_zero_sample_rate() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = write_kit("audio:\n  device: mock-x\n  sample_rate: 0\n")?;
        let err = Kit::deserialize(&path).err().ok_or("expected an error")?;
        assert!(matches!(err, ConfigError::Invalid(_)));
        Ok(())
    }

    #[test]
    fn rejects_bad_flash() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = write_kit("flash: soon\n")?;
        assert!(Kit::deserialize(&path).is_err());
        Ok(())
    }
}

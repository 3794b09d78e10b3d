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
use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use padkit::audio;
use padkit::config::Kit;
use padkit::controller::{dropbox, terminal, Controller, Driver};
use padkit::input::InputRouter;
use padkit::samples::{AssetFetcher, SampleStore};
use padkit::Session;

const DEFAULT_VERIFY_RATE: u32 = 44100;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A keyboard drum pad."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plays a kit from the keyboard.
    Play {
        /// The path to the kit file.
        kit: PathBuf,
        /// Overrides the kit's audio device.
        #[arg[short, long]]
        device: Option<String>,
        /// Where logs go while the terminal is in use.
        #[arg[short, long, default_value = "padkit.log"]]
        log_file: PathBuf,
    },
    /// Loads and decodes every sample and background track in a kit.
    Verify {
        /// The path to the kit file.
        kit: PathBuf,
    },
    /// Lists the available audio output devices.
    Devices {},
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            kit,
            device,
            log_file,
        } => {
            // The terminal belongs to the pads, so logs go to a file.
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_ansi(false)
                .with_writer(Mutex::new(File::create(&log_file)?))
                .init();

            let mut kit = Kit::deserialize(&kit)?;
            if let Some(device) = device {
                let audio = kit.audio().clone().with_device(&device);
                kit = kit.with_audio(audio);
            }

            let session = Arc::new(Session::from_kit(&kit)?);
            let loaded = session.prefetch().await;
            println!(
                "{}: {}/{} samples loaded, logging to {}",
                session.device(),
                loaded,
                kit.samples().len(),
                log_file.display()
            );
            println!(
                "F1/F2 volume, F3/F4 polyphony, F5/F6 background, \
                 F7/F8 background volume, F9 next track, F10 reset, Esc quit."
            );

            let router = InputRouter::new(kit.pads(), kit.flash()?);
            let mut drivers: Vec<Arc<dyn Driver>> = vec![Arc::new(terminal::Driver::new())];
            if let Some(folder) = kit.drop_folder() {
                drivers.push(Arc::new(dropbox::Driver::new(&folder)));
            }

            Controller::new(session, router, drivers, Some(Box::new(std::io::stdout())))
                .join()
                .await?;
            println!();
        }
        Commands::Verify { kit } => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).init();

            let kit = Kit::deserialize(&kit)?;
            let fetcher = Arc::new(AssetFetcher::new(kit.base_path()));
            let rate = kit.audio().sample_rate().unwrap_or(DEFAULT_VERIFY_RATE);
            let store = SampleStore::new(kit.samples().to_vec(), fetcher.clone(), rate);

            let mut failures = 0;
            println!("Samples (count: {}):", kit.samples().len());
            for sample in kit.samples() {
                match store.load(sample.name()).await {
                    Ok(buffer) => println!(
                        "- {} ({}): {} channel(s), {:.3}s",
                        sample.name(),
                        sample.file(),
                        buffer.channel_count(),
                        buffer.duration().as_secs_f64()
                    ),
                    Err(e) => {
                        failures += 1;
                        println!("- {} ({}): {}", sample.name(), sample.file(), e);
                    }
                }
            }

            println!("\nBackground tracks (count: {}):", kit.background().tracks().len());
            let player = padkit::background::BackgroundPlayer::new(
                Arc::new(audio::Mixer::new(2, rate)),
                fetcher.clone(),
            );
            for track in kit.background().tracks() {
                match player.load(track).await {
                    Ok(()) => println!("- {}", track),
                    Err(e) => {
                        failures += 1;
                        println!("- {}: {}", track, e);
                    }
                }
            }

            if failures > 0 {
                return Err(format!("{} asset(s) failed to load", failures).into());
            }
        }
        Commands::Devices {} => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).init();
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
    }

    Ok(())
}

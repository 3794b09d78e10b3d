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
    collections::BTreeSet,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, span, Level};

use super::Event;

/// How long the folder has to be quiet before a batch is uploaded.
const QUIET_PERIOD: Duration = Duration::from_millis(300);

const AUDIO_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// The audio files in a debounced batch, deduplicated and in path order.
fn audio_paths<I: IntoIterator<Item = PathBuf>>(paths: I) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|path| is_audio(path))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Watches a folder and uploads audio files dropped into it.
pub struct Driver {
    folder: PathBuf,
}

impl Driver {
    pub fn new(folder: &Path) -> Driver {
        Driver {
            folder: folder.to_path_buf(),
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let folder = self.folder.clone();
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "drop folder driver");
            let _enter = span.enter();

            std::fs::create_dir_all(&folder)?;
            let (batch_tx, batch_rx) = crossbeam_channel::unbounded();
            let mut debouncer =
                new_debouncer(QUIET_PERIOD, move |res: DebounceEventResult| match res {
                    Ok(events) => {
                        let _ = batch_tx.send(events);
                    }
                    Err(e) => error!(err = %e, "Drop folder watch error"),
                })
                .map_err(io::Error::other)?;
            debouncer
                .watcher()
                .watch(&folder, RecursiveMode::NonRecursive)
                .map_err(io::Error::other)?;
            info!(folder = ?folder, "Drop folder driver started.");

            loop {
                match batch_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(events) => {
                        let paths = audio_paths(events.into_iter().map(|event| event.path));
                        if paths.is_empty() {
                            continue;
                        }
                        debug!(files = paths.len(), "Uploading dropped files");
                        if events_tx.blocking_send(Event::Upload(paths)).is_err() {
                            return Ok(());
                        }
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                        if events_tx.is_closed() {
                            return Ok(());
                        }
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return Ok(()),
                }
            }
        })
    }
}

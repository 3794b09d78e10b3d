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
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    cursor, queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, warn, Instrument, Level};

use crate::background::PlaybackState;
use crate::input::{InputRouter, KeyEvent};
use crate::session::{Session, VOLUME_STEP};

pub mod dropbox;
pub mod terminal;

/// Direction for stepped controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Down,
    Up,
}

impl Step {
    fn sign(self) -> f32 {
        match self {
            Step::Down => -1.0,
            Step::Up => 1.0,
        }
    }
}

/// Controller events that will trigger behavior in the session.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A key went down.
    KeyDown(KeyEvent),
    /// A key came up. Only sent by inputs that report releases.
    KeyUp(KeyEvent),
    /// A pad was hit directly.
    Pointer(usize),
    MasterVolume(Step),
    Polyphony(Step),
    BackgroundVolume(Step),
    /// Plays the selected background track, loading it if needed.
    PlayBackground,
    StopBackground,
    /// Selects the next background track.
    NextTrack,
    /// Drops uploaded overrides and reloads the default samples.
    ResetSamples,
    /// Files to install as sample overrides.
    Upload(Vec<PathBuf>),
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;

    /// True if this driver sends [`Event::KeyUp`].
    fn reports_releases(&self) -> bool {
        false
    }
}

/// Runs a session from a set of drivers.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller. If `display` is given a one-line status is
    /// redrawn on it as things change.
    pub fn new(
        session: Arc<Session>,
        mut router: InputRouter,
        drivers: Vec<Arc<dyn Driver>>,
        display: Option<Box<dyn io::Write + Send>>,
    ) -> Controller {
        router.set_track_releases(drivers.iter().any(|driver| driver.reports_releases()));
        let state = State {
            session,
            router,
            status: Arc::new(Mutex::new(String::from("Ready"))),
            display,
            last_line: String::new(),
        };
        Controller {
            handle: tokio::spawn(
                Controller::trigger_events(state, drivers)
                    .instrument(span!(Level::INFO, "controller")),
            ),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    async fn trigger_events(mut state: State, drivers: Vec<Arc<dyn Driver>>) {
        let (events_tx, mut events_rx) = mpsc::channel(32);
        let join_handles: Vec<_> = drivers
            .iter()
            .map(|driver| driver.monitor_events(events_tx.clone()))
            .collect();
        drop(events_tx);

        info!(pads = state.router.pads().len(), "Controller started.");
        let mut redraw = tokio::time::interval(Duration::from_millis(25));

        loop {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(Event::Quit) => {
                        info!("Quit requested.");
                        break;
                    }
                    Some(event) => state.handle(event),
                    None => {
                        info!("All drivers closed.");
                        break;
                    }
                },
                _ = redraw.tick() => {}
            }
            state.render();
        }

        state.session.stop_all();
        drop(events_rx);
        for join_handle in join_handles {
            match join_handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Event monitor failed: {}", e),
                Err(e) => error!("Error waiting for event monitor to stop: {}", e),
            }
        }
        info!("Controller closing.");
    }
}

struct State {
    session: Arc<Session>,
    router: InputRouter,
    /// The most recent outcome of a background job.
    status: Arc<Mutex<String>>,
    display: Option<Box<dyn io::Write + Send>>,
    last_line: String,
}

impl State {
    fn handle(&mut self, event: Event) {
        let now = Instant::now();
        match event {
            Event::KeyDown(key) => {
                if let Some(hit) = self.router.key_down(&key, now) {
                    self.session.trigger(&hit.sample, hit.velocity);
                }
            }
            Event::KeyUp(key) => self.router.key_up(&key),
            Event::Pointer(pad) => {
                if let Some(hit) = self.router.pointer(pad, now) {
                    self.session.trigger(&hit.sample, hit.velocity);
                }
            }
            Event::MasterVolume(step) => {
                let volume = self.session.master_volume() + step.sign() * VOLUME_STEP;
                self.session.set_master_volume(volume);
            }
            Event::Polyphony(step) => {
                let current = self.session.polyphony();
                let next = match step {
                    Step::Down => current.saturating_sub(1).max(1),
                    Step::Up => current + 1,
                };
                self.session.set_polyphony(next);
            }
            Event::BackgroundVolume(step) => {
                let volume = self.session.background_volume() + step.sign() * VOLUME_STEP;
                self.session.set_background_volume(volume);
            }
            Event::PlayBackground => {
                let session = self.session.clone();
                let status = self.status.clone();
                tokio::spawn(async move {
                    if let Err(e) = session.play_background().await {
                        *status.lock() = format!("Background failed: {}", e);
                    }
                });
            }
            Event::StopBackground => self.session.stop_background(),
            Event::NextTrack => {
                self.session.next_background();
                let session = self.session.clone();
                let status = self.status.clone();
                tokio::spawn(async move {
                    if let Err(e) = session.load_background().await {
                        *status.lock() = format!("Background failed: {}", e);
                    }
                });
            }
            Event::ResetSamples => {
                let session = self.session.clone();
                let status = self.status.clone();
                *status.lock() = String::from("Resetting samples");
                tokio::spawn(async move {
                    let loaded = session.reset_samples().await;
                    *status.lock() = format!("Samples reset, {} loaded", loaded);
                });
            }
            Event::Upload(paths) => {
                let session = self.session.clone();
                let status = self.status.clone();
                tokio::spawn(async move {
                    let report = session.upload_paths(&paths).await;
                    *status.lock() = report.status();
                });
            }
            Event::Quit => {}
        }
    }

    fn render(&mut self) {
        let Some(display) = self.display.as_mut() else {
            return;
        };
        let line = status_line(&self.session, &self.router, Instant::now(), &self.status.lock());
        if line == self.last_line {
            return;
        }

        let queued = queue!(
            display,
            cursor::MoveToColumn(0),
            Print(&line),
            Clear(ClearType::UntilNewLine)
        );
        if let Err(e) = queued.and_then(|_| display.flush()) {
            warn!(err = %e, "Unable to draw status");
        }
        self.last_line = line;
    }
}

/// A one-line summary of the pads and session settings. Lit pads are bracketed.
pub fn status_line(session: &Session, router: &InputRouter, now: Instant, status: &str) -> String {
    let pads: Vec<String> = router
        .pads()
        .iter()
        .enumerate()
        .map(|(index, pad)| {
            let key = pad.key().to_uppercase();
            if router.is_active(index, now) {
                format!("[{} {}]", key, pad.label())
            } else {
                format!(" {} {} ", key, pad.label())
            }
        })
        .collect();

    let background = match (session.selected_track(), session.background_state()) {
        (None, _) => String::from("none"),
        (Some(track), PlaybackState::Playing) => format!("{} playing", track),
        (Some(track), PlaybackState::Stopped) => format!("{} stopped", track),
    };

    format!(
        "{} | vol {:.0}% | voices {}/{} | bg {} {:.0}% | {}",
        pads.join(""),
        session.master_volume() * 100.0,
        session.engine().active_voices(),
        session.polyphony(),
        background,
        session.background_volume() * 100.0,
        status
    )
}

#[cfg(test)]
mod test {
    use std::{error::Error, fmt};

    use super::*;
    use crate::audio::{self, Mixer};
    use crate::config::{Kit, Pad, Sample};
    use crate::samples::Origin;
    use crate::testutil::{eventually_async, test_kit_dir};

    struct TestDevice(Arc<Mixer>);

    impl fmt::Display for TestDevice {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test")
        }
    }

    impl audio::Device for TestDevice {
        fn mixer(&self) -> Arc<Mixer> {
            self.0.clone()
        }
    }

    /// Replays a fixed list of events, then waits for the channel to close.
    struct TestDriver {
        events: Vec<Event>,
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let events = self.events.clone();
            tokio::spawn(async move {
                for event in events {
                    events_tx
                        .send(event)
                        .await
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                }
                Ok(())
            })
        }
    }

    type Fixture = (Arc<Mixer>, Arc<Session>, InputRouter);

    fn session(path: &std::path::Path) -> Result<Fixture, Box<dyn Error>> {
        let kit = Kit::new(
            vec![
                Sample::new("kick", "samples/kick.wav"),
                Sample::new("snare", "samples/snare.wav"),
            ],
            vec![Pad::new("q", "kick"), Pad::new("w", "snare")],
            path,
        )?;
        let mixer = Arc::new(Mixer::new(2, 44100));
        let session = Arc::new(Session::new(
            &kit,
            Arc::new(TestDevice(mixer.clone())),
            Arc::new(crate::samples::AssetFetcher::new(path)),
        ));
        let router = InputRouter::new(kit.pads(), kit.flash()?);
        Ok((mixer, session, router))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = test_kit_dir(&["kick", "snare"])?;
        let (_mixer, session, router) = session(&path)?;
        let master = session.master_volume();

        let driver = Arc::new(TestDriver {
            events: vec![
                Event::MasterVolume(Step::Down),
                Event::Polyphony(Step::Down),
                Event::KeyDown(KeyEvent::char('q')),
                Event::Pointer(1),
                Event::Quit,
            ],
        });
        let mut controller = Controller::new(session.clone(), router, vec![driver], None);
        controller.join().await?;

        assert!((session.master_volume() - (master - VOLUME_STEP)).abs() < 1e-6);
        assert_eq!(session.polyphony(), 15);

        // Both pads were triggered, so both samples were loaded.
        eventually_async(
            || async {
                session.store().origin("kick") == Some(Origin::Default)
                    && session.store().origin("snare") == Some(Origin::Default)
            },
            "Pads were never triggered",
        )
        .await;
        Ok(())
    }

    #[tokio::test]
    async fn test_status_line() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = test_kit_dir(&["kick"])?;
        let (_mixer, session, mut router) = session(&path)?;
        let now = Instant::now();

        let line = status_line(&session, &router, now, "Ready");
        assert!(line.starts_with(" Q kick  W snare "));
        assert!(line.contains("vol 90%"));
        assert!(line.contains("voices 0/16"));
        assert!(line.contains("bg none 35%"));
        assert!(line.ends_with("| Ready"));

        router.pointer(0, now);
        let line = status_line(&session, &router, now, "Ready");
        assert!(line.starts_with("[Q kick] W snare "));
        Ok(())
    }
}

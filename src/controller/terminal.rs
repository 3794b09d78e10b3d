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

use crossterm::{
    event::{
        self, KeyCode, KeyEvent as TermKeyEvent, KeyEventKind, KeyEventState, KeyModifiers,
        KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement},
};
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, info, span, warn, Level};

use super::{Event, Step};
use crate::input::{key_code, KeyEvent, Modifiers};

/// Reads the keyboard from a raw-mode terminal.
///
/// Pads are played with their keys. F1/F2 master volume, F3/F4 polyphony,
/// F5 plays the background, F6 stops it, F7/F8 background volume, F9 next
/// track, F10 resets samples. Esc or Ctrl+C quits.
pub struct Driver {
    enhanced: bool,
}

impl Driver {
    pub fn new() -> Driver {
        let enhanced = supports_keyboard_enhancement().unwrap_or(false);
        Driver { enhanced }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

/// Restores the terminal when the driver stops.
struct RawMode {
    enhanced: bool,
}

impl RawMode {
    fn enable(enhanced: bool) -> Result<RawMode, io::Error> {
        enable_raw_mode()?;
        let enhanced = enhanced
            && execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(
                    KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                        | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                )
            )
            .is_ok();
        Ok(RawMode { enhanced })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        if let Err(e) = disable_raw_mode() {
            warn!(err = %e, "Unable to restore terminal");
        }
    }
}

fn modifiers(key: &TermKeyEvent, c: char) -> Modifiers {
    Modifiers {
        shift: key.modifiers.contains(KeyModifiers::SHIFT) || c.is_uppercase(),
        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
    }
}

fn pad_key(key: &TermKeyEvent, c: char) -> KeyEvent {
    let code = if key.state.contains(KeyEventState::KEYPAD) && c.is_ascii_digit() {
        Some(format!("Numpad{}", c))
    } else {
        key_code(c)
    };
    KeyEvent {
        key: Some(c),
        code,
        modifiers: modifiers(key, c),
        repeat: key.kind == KeyEventKind::Repeat,
    }
}

/// Maps a terminal key event to a controller event.
pub fn map_key(key: TermKeyEvent) -> Option<Event> {
    if key.kind == KeyEventKind::Release {
        return match key.code {
            KeyCode::Char(c) => Some(Event::KeyUp(pad_key(&key, c))),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Esc => Some(Event::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Event::Quit),
        KeyCode::Char(c) => Some(Event::KeyDown(pad_key(&key, c))),
        // Controls don't auto-repeat.
        _ if key.kind == KeyEventKind::Repeat => None,
        KeyCode::F(1) => Some(Event::MasterVolume(Step::Down)),
        KeyCode::F(2) => Some(Event::MasterVolume(Step::Up)),
        KeyCode::F(3) => Some(Event::Polyphony(Step::Down)),
        KeyCode::F(4) => Some(Event::Polyphony(Step::Up)),
        KeyCode::F(5) => Some(Event::PlayBackground),
        KeyCode::F(6) => Some(Event::StopBackground),
        KeyCode::F(7) => Some(Event::BackgroundVolume(Step::Down)),
        KeyCode::F(8) => Some(Event::BackgroundVolume(Step::Up)),
        KeyCode::F(9) => Some(Event::NextTrack),
        KeyCode::F(10) => Some(Event::ResetSamples),
        _ => None,
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let enhanced = self.enhanced;
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "terminal driver");
            let _enter = span.enter();

            let _raw = RawMode::enable(enhanced)?;
            info!(enhanced, "Terminal driver started.");

            loop {
                let event::Event::Key(key) = event::read()? else {
                    continue;
                };
                let Some(event) = map_key(key) else {
                    debug!(key = ?key.code, "Unbound key");
                    continue;
                };
                let quit = event == Event::Quit;
                if events_tx.blocking_send(event).is_err() || quit {
                    return Ok(());
                }
            }
        })
    }

    fn reports_releases(&self) -> bool {
        self.enhanced
    }
}

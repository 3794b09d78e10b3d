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

//! Maps key presses and pointer hits onto pads.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config;

/// Velocity for pointer hits.
pub const POINTER_VELOCITY: f32 = 1.0;
/// Velocity for plain key presses.
pub const KEY_VELOCITY: f32 = 0.9;
/// Velocity with Shift held.
pub const STRONG_VELOCITY: f32 = 1.0;
/// Velocity with Ctrl held.
pub const ALTERNATE_VELOCITY: f32 = 0.7;

/// What part of a key event a binding compares against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyMatch {
    /// The produced character, compared case-insensitively.
    Char(char),
    /// The physical key code, e.g. "KeyQ" or "Numpad1".
    Code(String),
}

/// Binds a key to a pad index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingRule {
    matcher: KeyMatch,
    pad: usize,
}

impl BindingRule {
    fn matches(&self, event: &KeyEvent) -> bool {
        match &self.matcher {
            KeyMatch::Char(c) => event
                .key
                .is_some_and(|key| key.to_lowercase().eq(c.to_lowercase())),
            KeyMatch::Code(code) => event.code.as_deref() == Some(code.as_str()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

/// A key press as seen by the router.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Option<char>,
    pub code: Option<String>,
    pub modifiers: Modifiers,
    /// True for auto-repeat presses.
    pub repeat: bool,
}

impl KeyEvent {
    /// A press of the key producing `key`, with its derived code.
    pub fn char(key: char) -> KeyEvent {
        KeyEvent {
            key: Some(key),
            code: key_code(key),
            ..KeyEvent::default()
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> KeyEvent {
        self.modifiers = modifiers;
        self
    }

    fn identity(&self) -> Option<String> {
        self.code
            .clone()
            .or_else(|| self.key.map(|key| key.to_lowercase().collect()))
    }
}

/// The physical code conventionally produced by the key that types `key`.
pub fn key_code(key: char) -> Option<String> {
    match key {
        'a'..='z' | 'A'..='Z' => Some(format!("Key{}", key.to_ascii_uppercase())),
        '0'..='9' => Some(format!("Digit{}", key)),
        ',' => Some("Comma".to_string()),
        '.' => Some("Period".to_string()),
        ' ' => Some("Space".to_string()),
        ';' => Some("Semicolon".to_string()),
        '/' => Some("Slash".to_string()),
        _ => None,
    }
}

/// Velocity for a key press with the given modifiers. Shift wins over Ctrl.
pub fn key_velocity(modifiers: Modifiers) -> f32 {
    if modifiers.shift {
        STRONG_VELOCITY
    } else if modifiers.ctrl {
        ALTERNATE_VELOCITY
    } else {
        KEY_VELOCITY
    }
}

/// A pad that should sound.
#[derive(Clone, Debug, PartialEq)]
pub struct PadHit {
    pub pad: usize,
    pub sample: String,
    pub velocity: f32,
}

/// A pad and its display state.
#[derive(Clone, Debug)]
pub struct Pad {
    key: char,
    sample: String,
    label: String,
    lit_until: Option<Instant>,
}

impl Pad {
    pub fn key(&self) -> char {
        self.key
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Resolves input events to pads. Rules are checked in order and the first
/// match wins.
pub struct InputRouter {
    pads: Vec<Pad>,
    rules: Vec<BindingRule>,
    /// Keys currently down, only maintained when release events are delivered.
    held: HashSet<String>,
    track_releases: bool,
    flash: Duration,
}

impl InputRouter {
    pub fn new(pads: &[config::Pad], flash: Duration) -> InputRouter {
        let mut rules = Vec::new();
        let mut router_pads = Vec::new();

        for (index, pad) in pads.iter().enumerate() {
            let Some(key) = pad.key().chars().next() else {
                continue;
            };
            rules.push(BindingRule {
                matcher: KeyMatch::Char(key),
                pad: index,
            });
            if let Some(code) = key_code(key) {
                rules.push(BindingRule {
                    matcher: KeyMatch::Code(code),
                    pad: index,
                });
            }
            if let Some(code) = pad.code() {
                rules.push(BindingRule {
                    matcher: KeyMatch::Code(code.to_string()),
                    pad: index,
                });
            }
            router_pads.push(Pad {
                key,
                sample: pad.sample().to_string(),
                label: pad.label().to_string(),
                lit_until: None,
            });
        }

        InputRouter {
            pads: router_pads,
            rules,
            held: HashSet::new(),
            track_releases: false,
            flash,
        }
    }

    /// Enables held-key tracking, for inputs that report releases.
    pub fn set_track_releases(&mut self, track_releases: bool) {
        self.track_releases = track_releases;
        self.held.clear();
    }

    pub fn pads(&self) -> &[Pad] {
        &self.pads
    }

    pub fn rules(&self) -> &[BindingRule] {
        &self.rules
    }

    /// The pad a key event is bound to, if any.
    pub fn resolve(&self, event: &KeyEvent) -> Option<usize> {
        self.rules
            .iter()
            .find(|rule| rule.matches(event))
            .map(|rule| rule.pad)
    }

    /// Handles a key press.
    pub fn key_down(&mut self, event: &KeyEvent, now: Instant) -> Option<PadHit> {
        if event.repeat {
            return None;
        }
        if self.track_releases {
            if let Some(identity) = event.identity() {
                if !self.held.insert(identity) {
                    debug!(key = ?event.key, "Ignoring held key");
                    return None;
                }
            }
        }

        let pad = self.resolve(event)?;
        Some(self.hit(pad, key_velocity(event.modifiers), now))
    }

    /// Handles a key release.
    pub fn key_up(&mut self, event: &KeyEvent) {
        if let Some(identity) = event.identity() {
            self.held.remove(&identity);
        }
    }

    /// Handles a pointer hit on a pad.
    pub fn pointer(&mut self, pad: usize, now: Instant) -> Option<PadHit> {
        if pad >= self.pads.len() {
            return None;
        }
        Some(self.hit(pad, POINTER_VELOCITY, now))
    }

    fn hit(&mut self, pad: usize, velocity: f32, now: Instant) -> PadHit {
        let state = &mut self.pads[pad];
        state.lit_until = Some(now + self.flash);
        PadHit {
            pad,
            sample: state.sample.clone(),
            velocity,
        }
    }

    /// True while the pad's trigger flash is showing.
    pub fn is_active(&self, pad: usize, now: Instant) -> bool {
        self.pads
            .get(pad)
            .and_then(|pad| pad.lit_until)
            .is_some_and(|until| now < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(key: &str, sample: &str) -> config::Pad {
        config::Pad::new(key, sample)
    }

    fn router() -> InputRouter {
        InputRouter::new(
            &[
                pad("q", "kick"),
                pad("w", "snare"),
                pad(",", "hihat"),
                pad("1", "crash"),
            ],
            Duration::from_millis(100),
        )
    }

    #[test]
    fn test_key_codes() {
        assert_eq!(key_code('q').as_deref(), Some("KeyQ"));
        assert_eq!(key_code('Q').as_deref(), Some("KeyQ"));
        assert_eq!(key_code('7').as_deref(), Some("Digit7"));
        assert_eq!(key_code(',').as_deref(), Some("Comma"));
        assert_eq!(key_code('.').as_deref(), Some("Period"));
        assert_eq!(key_code(' ').as_deref(), Some("Space"));
        assert_eq!(key_code(';').as_deref(), Some("Semicolon"));
        assert_eq!(key_code('/').as_deref(), Some("Slash"));
        assert_eq!(key_code('['), None);
    }

    #[test]
    fn test_rules_in_pad_order() {
        let router = router();
        assert_eq!(
            router.rules()[..2],
            [
                BindingRule {
                    matcher: KeyMatch::Char('q'),
                    pad: 0
                },
                BindingRule {
                    matcher: KeyMatch::Code("KeyQ".to_string()),
                    pad: 0
                },
            ]
        );
    }

    #[test]
    fn test_resolve_by_char_and_code() {
        let router = router();
        assert_eq!(router.resolve(&KeyEvent::char('Q')), Some(0));
        assert_eq!(router.resolve(&KeyEvent::char(',')), Some(2));

        // A shifted layout still sends the physical code.
        let shifted = KeyEvent {
            key: Some('!'),
            code: Some("Digit1".to_string()),
            ..KeyEvent::default()
        };
        assert_eq!(router.resolve(&shifted), Some(3));
        assert_eq!(router.resolve(&KeyEvent::char('z')), None);
    }

    #[test]
    fn test_explicit_code() {
        let config = config::Pad::new("w", "snare").with_code("Numpad2");
        let router = InputRouter::new(&[config], Duration::from_millis(100));
        let numpad = KeyEvent {
            key: Some('2'),
            code: Some("Numpad2".to_string()),
            ..KeyEvent::default()
        };
        assert_eq!(router.resolve(&numpad), Some(0));
    }

    #[test]
    fn test_first_match_wins() {
        let router = InputRouter::new(
            &[pad("q", "kick"), pad("Q", "snare")],
            Duration::from_millis(100),
        );
        assert_eq!(router.resolve(&KeyEvent::char('q')), Some(0));
        assert_eq!(router.resolve(&KeyEvent::char('Q')), Some(0));
    }

    #[test]
    fn test_velocity_from_modifiers() {
        let mut router = router();
        let now = Instant::now();

        let hit = router.key_down(&KeyEvent::char('q'), now).unwrap();
        assert_eq!(hit.velocity, KEY_VELOCITY);
        assert_eq!(hit.sample, "kick");

        let strong = KeyEvent::char('q').with_modifiers(Modifiers {
            shift: true,
            ctrl: true,
        });
        assert_eq!(router.key_down(&strong, now).unwrap().velocity, STRONG_VELOCITY);

        let alternate = KeyEvent::char('q').with_modifiers(Modifiers {
            shift: false,
            ctrl: true,
        });
        assert_eq!(
            router.key_down(&alternate, now).unwrap().velocity,
            ALTERNATE_VELOCITY
        );

        assert_eq!(router.pointer(1, now).unwrap().velocity, POINTER_VELOCITY);
        assert_eq!(router.pointer(9, now), None);
    }

    #[test]
    fn test_repeats_suppressed() {
        let mut router = router();
        let now = Instant::now();
        let mut event = KeyEvent::char('w');
        event.repeat = true;
        assert_eq!(router.key_down(&event, now), None);
    }

    #[test]
    fn test_held_keys_when_tracking_releases() {
        let mut router = router();
        let now = Instant::now();
        let event = KeyEvent::char('w');

        // Without release tracking every press counts.
        assert!(router.key_down(&event, now).is_some());
        assert!(router.key_down(&event, now).is_some());

        router.set_track_releases(true);
        assert!(router.key_down(&event, now).is_some());
        assert!(router.key_down(&event, now).is_none());
        router.key_up(&event);
        assert!(router.key_down(&event, now).is_some());
    }

    #[test]
    fn test_flash() {
        let mut router = router();
        let now = Instant::now();
        assert!(!router.is_active(0, now));

        router.key_down(&KeyEvent::char('q'), now);
        assert!(router.is_active(0, now));
        assert!(router.is_active(0, now + Duration::from_millis(99)));
        assert!(!router.is_active(0, now + Duration::from_millis(100)));
        assert!(!router.is_active(1, now));
    }
}

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

//! Pad-triggered sample playback.
//!
//! This module provides:
//! - Asset retrieval from disk or HTTP
//! - Lazy decoding and caching, with uploaded overrides
//! - Voice management with a polyphony cap
//! - The engine that starts voices on the mixer

mod engine;
mod fetch;
mod matching;
mod store;
mod voice;

pub use engine::{clamp_velocity, PlaybackEngine, MAX_VELOCITY, MIN_VELOCITY};
pub use fetch::{AssetFetcher, FetchError, Fetcher};
pub use matching::match_sample;
pub use store::{Origin, SampleStore, UploadReport};
pub use voice::{Voice, VoiceKind, VoicePool};

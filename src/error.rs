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
use crate::audio::DecodeError;
use crate::samples::FetchError;

/// Failures surfaced while preparing sample material. None of these abort a
/// trigger: the engine logs them and falls back to a synthesized hit.
#[derive(Debug, thiserror::Error)]
pub enum PadError {
    #[error("asset unavailable: {0}")]
    AssetUnavailable(#[from] FetchError),

    #[error("decode failure: {0}")]
    DecodeFailure(#[from] DecodeError),

    #[error("unknown sample '{0}'")]
    UnknownSample(String),

    #[error("no sample matches uploaded file '{0}'")]
    UnmatchedUpload(String),
}

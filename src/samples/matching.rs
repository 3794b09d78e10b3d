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

//! Maps uploaded file names onto sample names.

use tracing::warn;

const EXTENSIONS: [&str; 2] = ["wav", "mp3"];

/// Matches an uploaded file name against the known sample names.
///
/// Comparison is case-insensitive on the base name. An exact `name`,
/// `name.wav` or `name.mp3` wins outright. Otherwise the longest sample name
/// that, followed by `-` or `_`, prefixes the file matches. Names that tie
/// for longest are ambiguous and nothing matches.
pub fn match_sample<'a, I>(file_name: &str, names: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .to_lowercase();

    let mut candidates = Vec::new();
    for name in names {
        let lower = name.to_lowercase();
        if base == lower
            || EXTENSIONS
                .iter()
                .any(|ext| base == format!("{}.{}", lower, ext))
        {
            return Some(name);
        }
        if base.starts_with(&format!("{}-", lower)) || base.starts_with(&format!("{}_", lower)) {
            candidates.push(name);
        }
    }

    let longest = candidates.iter().map(|name| name.len()).max().unwrap_or(0);
    candidates.retain(|name| name.len() == longest);

    match candidates.as_slice() {
        [] => None,
        [name] => Some(*name),
        _ => {
            warn!(
                file = file_name,
                candidates = ?candidates,
                "Uploaded file matches several samples, ignoring"
            );
            None
        }
    }
}

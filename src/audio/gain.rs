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
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A shared gain value that can be adjusted from the control side while the
/// render thread reads it. The f32 is stored as raw bits so updates are lock-free.
#[derive(Clone)]
pub struct GainControl {
    bits: Arc<AtomicU32>,
}

impl GainControl {
    /// Creates a new gain control with the given initial value.
    pub fn new(value: f32) -> GainControl {
        GainControl {
            bits: Arc::new(AtomicU32::new(value.to_bits())),
        }
    }

    /// Returns the current gain.
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Sets the gain. Negative and non-finite values are treated as silence.
    pub fn set(&self, value: f32) {
        let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl fmt::Debug for GainControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GainControl").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_shared_between_clones() {
        let gain = GainControl::new(0.5);
        let other = gain.clone();
        other.set(0.25);
        assert_eq!(gain.get(), 0.25);
    }

    #[test]
    fn test_gain_rejects_invalid_values() {
        let gain = GainControl::new(1.0);
        gain.set(-3.0);
        assert_eq!(gain.get(), 0.0);
        gain.set(f32::NAN);
        assert_eq!(gain.get(), 0.0);
    }
}

//! Adaptive per-band thresholding with an exponential moving average

use super::BandEnergies;
use serde::{Deserialize, Serialize};

/// On/off state of the three lights: red follows bass, yellow mid, green treble
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedState {
    pub red: bool,
    pub yellow: bool,
    pub green: bool,
}

impl LedState {
    pub const OFF: LedState = LedState {
        red: false,
        yellow: false,
        green: false,
    };

    pub fn new(red: bool, yellow: bool, green: bool) -> Self {
        Self { red, yellow, green }
    }

    pub fn from_array(active: [bool; 3]) -> Self {
        Self::new(active[0], active[1], active[2])
    }

    pub fn as_array(&self) -> [bool; 3] {
        [self.red, self.yellow, self.green]
    }
}

/// Per-band running average. `alpha` and `multiplier` are fixed for the
/// lifetime of the tracker; a new session builds a new tracker.
#[derive(Debug, Clone)]
pub struct ThresholdTracker {
    avg: [f32; 3],
    alpha: f32,
    multiplier: f32,
}

impl ThresholdTracker {
    pub fn new(alpha: f32, multiplier: f32) -> Self {
        Self {
            avg: [0.0; 3],
            alpha,
            multiplier,
        }
    }

    /// Advance each band's average with this frame, then test the frame against
    /// the advanced average. A steady signal therefore settles to inactive.
    pub fn update(&mut self, energies: &BandEnergies) -> LedState {
        let energies = energies.as_array();
        let mut active = [false; 3];

        for i in 0..3 {
            self.avg[i] = self.alpha * energies[i] + (1.0 - self.alpha) * self.avg[i];
            active[i] = energies[i] > self.avg[i] * self.multiplier;
        }

        LedState::from_array(active)
    }

    pub fn reset(&mut self) {
        self.avg = [0.0; 3];
    }

    pub fn averages(&self) -> [f32; 3] {
        self.avg
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }
}

//! Audio capture and analysis module

mod capture;
mod cpal_backend;
mod sources;
mod spectrum;
mod threshold;

#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};

pub use capture::{CaptureError, CaptureSession};
pub use cpal_backend::{CpalBackend, CpalStream, FrameAssembler};
pub use sources::{
    select_device, AudioBackend, DeviceDescriptor, DeviceInfo, DeviceSelector, FrameHandler,
    StreamHandle, StreamParams,
};
pub use spectrum::{BandEnergies, BandLayout, SpectralAnalyzer, BAND_EDGES_HZ};
pub use threshold::{LedState, ThresholdTracker};

/// Audio processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Samples per analysis frame (also the FFT size)
    pub frame_size: usize,

    /// Channels requested from the device; frames are always downmixed to mono
    pub channels: u16,

    /// EMA smoothing factor, in (0, 1]
    pub alpha: f32,

    /// A band is active when its energy exceeds `avg * multiplier`
    pub multiplier: f32,

    /// Minimum spacing between repeated identical light commands
    pub dispatch_interval_ms: u64,

    /// Name fragments that mark a device as the preferred microphone
    pub device_keywords: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frame_size: 2048,
            channels: 1,
            alpha: 0.3,
            multiplier: 1.5,
            dispatch_interval_ms: 100,
            device_keywords: ["usb", "headset", "microphone", "mic"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl AudioConfig {
    /// Check the tunables before any device is touched.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(CaptureError::InvalidConfig(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if !(self.multiplier > 1.0) {
            return Err(CaptureError::InvalidConfig(format!(
                "multiplier must be greater than 1, got {}",
                self.multiplier
            )));
        }
        if self.frame_size < 2 {
            return Err(CaptureError::InvalidConfig(format!(
                "frame_size must be at least 2, got {}",
                self.frame_size
            )));
        }
        if self.sample_rate == 0 {
            return Err(CaptureError::InvalidConfig(
                "sample_rate must be non-zero".to_string(),
            ));
        }
        if self.channels == 0 {
            return Err(CaptureError::InvalidConfig(
                "channels must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Capture period of one frame at the configured rate.
    pub fn frame_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.frame_size as f64 / self.sample_rate.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_hub_defaults() {
        let config = AudioConfig::default();

        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.frame_size, 2048);
        assert_eq!(config.channels, 1);
        assert_eq!(config.alpha, 0.3);
        assert_eq!(config.multiplier, 1.5);
        assert_eq!(config.dispatch_interval_ms, 100);
        assert_eq!(config.device_keywords, ["usb", "headset", "microphone", "mic"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn frame_period_is_about_46ms_at_defaults() {
        let period = AudioConfig::default().frame_period();
        assert!((period.as_secs_f64() - 0.04644).abs() < 0.0001);
    }

    #[test]
    fn validate_rejects_out_of_range_tunables() {
        let bad_alpha = AudioConfig {
            alpha: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            bad_alpha.validate(),
            Err(CaptureError::InvalidConfig(_))
        ));

        let alpha_one = AudioConfig {
            alpha: 1.0,
            ..Default::default()
        };
        assert!(alpha_one.validate().is_ok());

        let bad_multiplier = AudioConfig {
            multiplier: 1.0,
            ..Default::default()
        };
        assert!(bad_multiplier.validate().is_err());

        let bad_frame = AudioConfig {
            frame_size: 1,
            ..Default::default()
        };
        assert!(bad_frame.validate().is_err());

        let nan_alpha = AudioConfig {
            alpha: f32::NAN,
            ..Default::default()
        };
        assert!(nan_alpha.validate().is_err());
    }
}

//! Audio device enumeration contracts and the input device selection policy

use super::CaptureError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One device as reported by the host, in enumeration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Display name
    pub name: String,

    /// Maximum number of input channels (0 for output-only devices)
    pub input_channels: u16,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>, input_channels: u16) -> Self {
        Self {
            name: name.into(),
            input_channels,
        }
    }

    pub fn is_input(&self) -> bool {
        self.input_channels > 0
    }
}

/// Device chosen for an active session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub index: usize,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Explicit device choice passed to `start()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSelector {
    /// Enumeration index
    Index(usize),

    /// Case-insensitive name fragment
    Name(String),
}

impl DeviceSelector {
    /// Parse a CLI/API argument: a bare number is an index, anything else a name.
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<usize>() {
            Ok(index) => DeviceSelector::Index(index),
            Err(_) => DeviceSelector::Name(value.trim().to_string()),
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Index(index) => write!(f, "#{}", index),
            DeviceSelector::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// Stream parameters requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub channels: u16,
}

/// Per-frame callback. Invoked on the capture subsystem's own thread with
/// exactly `frame_size` mono samples per call. Must not block.
pub type FrameHandler = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Control surface of an opened stream
pub trait StreamHandle: Send {
    /// Begin frame delivery
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop frame delivery. A frame already being handled may still complete.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Release the device
    fn close(self: Box<Self>);
}

/// Host audio capability: device listing and stream opening
pub trait AudioBackend: Send + Sync {
    /// All devices in enumeration order
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError>;

    /// Index of the platform default input device, if any
    fn default_input_index(&self) -> Option<usize>;

    fn open_stream(
        &self,
        device_index: usize,
        params: StreamParams,
        handler: FrameHandler,
    ) -> Result<Box<dyn StreamHandle>, CaptureError>;
}

/// Pick the device to capture from.
///
/// With an explicit selector, the matching input-capable device is used or
/// `DeviceNotFound` is returned. Otherwise the first input device whose name
/// contains one of `keywords` (case-insensitive) wins, then the platform default
/// input, and with no input device at all the result is `DeviceUnavailable`.
pub fn select_device(
    devices: &[DeviceDescriptor],
    default_input: Option<usize>,
    selector: Option<&DeviceSelector>,
    keywords: &[String],
) -> Result<usize, CaptureError> {
    if let Some(selector) = selector {
        let found = match selector {
            DeviceSelector::Index(index) => devices
                .get(*index)
                .filter(|d| d.is_input())
                .map(|_| *index),
            DeviceSelector::Name(fragment) => {
                let fragment = fragment.to_lowercase();
                devices
                    .iter()
                    .position(|d| d.is_input() && d.name.to_lowercase().contains(&fragment))
            }
        };
        return found.ok_or_else(|| CaptureError::DeviceNotFound(selector.to_string()));
    }

    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let preferred = devices.iter().position(|d| {
        let name = d.name.to_lowercase();
        d.is_input() && keywords.iter().any(|k| name.contains(k.as_str()))
    });
    if let Some(index) = preferred {
        return Ok(index);
    }

    match default_input {
        Some(index) if devices.get(index).is_some_and(|d| d.is_input()) => {
            log::warn!(
                "No preferred microphone found, falling back to default input '{}'",
                devices[index].name
            );
            Ok(index)
        }
        _ => Err(CaptureError::DeviceUnavailable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioConfig;

    fn keywords() -> Vec<String> {
        AudioConfig::default().device_keywords
    }

    fn scenario() -> Vec<DeviceDescriptor> {
        vec![
            DeviceDescriptor::new("HDMI output", 0),
            DeviceDescriptor::new("USB Microphone", 1),
            DeviceDescriptor::new("Default", 1),
        ]
    }

    #[test]
    fn prefers_usb_microphone_over_default() {
        let index = select_device(&scenario(), Some(2), None, &keywords()).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn keyword_on_output_only_device_is_ignored() {
        let devices = vec![
            DeviceDescriptor::new("USB Speakers", 0),
            DeviceDescriptor::new("Built-in Input", 2),
        ];

        let index = select_device(&devices, Some(1), None, &keywords()).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn falls_back_to_default_input() {
        let devices = vec![
            DeviceDescriptor::new("HDMI output", 0),
            DeviceDescriptor::new("Line In", 2),
        ];

        assert_eq!(select_device(&devices, Some(1), None, &keywords()).unwrap(), 1);
    }

    #[test]
    fn no_input_device_is_unavailable() {
        let devices = vec![DeviceDescriptor::new("HDMI output", 0)];

        assert!(matches!(
            select_device(&devices, Some(0), None, &keywords()),
            Err(CaptureError::DeviceUnavailable)
        ));
        assert!(matches!(
            select_device(&[], None, None, &keywords()),
            Err(CaptureError::DeviceUnavailable)
        ));
    }

    #[test]
    fn explicit_selector_by_name_and_index() {
        let devices = scenario();

        let by_name = DeviceSelector::Name("default".to_string());
        assert_eq!(select_device(&devices, None, Some(&by_name), &keywords()).unwrap(), 2);

        let by_index = DeviceSelector::Index(2);
        assert_eq!(select_device(&devices, None, Some(&by_index), &keywords()).unwrap(), 2);

        let output_only = DeviceSelector::Index(0);
        assert!(matches!(
            select_device(&devices, None, Some(&output_only), &keywords()),
            Err(CaptureError::DeviceNotFound(_))
        ));

        let missing = DeviceSelector::Name("webcam".to_string());
        assert!(matches!(
            select_device(&devices, Some(2), Some(&missing), &keywords()),
            Err(CaptureError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn selector_parse_distinguishes_index_and_name() {
        assert_eq!(DeviceSelector::parse("3"), DeviceSelector::Index(3));
        assert_eq!(
            DeviceSelector::parse(" USB Mic "),
            DeviceSelector::Name("USB Mic".to_string())
        );
    }
}

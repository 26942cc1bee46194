//! Test doubles: a scripted audio backend and a recording publisher

use super::{
    AudioBackend, CaptureError, DeviceDescriptor, FrameHandler, StreamHandle, StreamParams,
};
use crate::protocol::{LedCommand, PublishError, Publisher};
use parking_lot::Mutex;
use std::sync::Arc;

pub(crate) fn sine(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|i| {
            amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
        })
        .collect()
}

#[derive(Default)]
struct MockShared {
    handler: Option<FrameHandler>,
    delivering: bool,
    fail_start: bool,
    open_count: usize,
    close_count: usize,
    last_params: Option<StreamParams>,
}

/// Backend with a fixed device list. Frames are pushed by the test through
/// `feed`, which calls the registered handler synchronously.
#[derive(Clone)]
pub(crate) struct MockBackend {
    devices: Vec<DeviceDescriptor>,
    default_input: Option<usize>,
    shared: Arc<Mutex<MockShared>>,
}

impl MockBackend {
    pub(crate) fn new(devices: Vec<DeviceDescriptor>, default_input: Option<usize>) -> Self {
        Self {
            devices,
            default_input,
            shared: Arc::new(Mutex::new(MockShared::default())),
        }
    }

    pub(crate) fn scenario() -> Self {
        Self::new(
            vec![
                DeviceDescriptor::new("HDMI output", 0),
                DeviceDescriptor::new("USB Microphone", 1),
                DeviceDescriptor::new("Default", 1),
            ],
            Some(2),
        )
    }

    pub(crate) fn fail_start(&self, fail: bool) {
        self.shared.lock().fail_start = fail;
    }

    pub(crate) fn feed(&self, samples: &[f32]) {
        let mut shared = self.shared.lock();
        if !shared.delivering {
            return;
        }
        if let Some(handler) = shared.handler.as_mut() {
            handler(samples);
        }
    }

    pub(crate) fn is_delivering(&self) -> bool {
        self.shared.lock().delivering
    }

    pub(crate) fn has_handler(&self) -> bool {
        self.shared.lock().handler.is_some()
    }

    pub(crate) fn open_count(&self) -> usize {
        self.shared.lock().open_count
    }

    pub(crate) fn close_count(&self) -> usize {
        self.shared.lock().close_count
    }

    pub(crate) fn last_params(&self) -> Option<StreamParams> {
        self.shared.lock().last_params
    }
}

impl AudioBackend for MockBackend {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        Ok(self.devices.clone())
    }

    fn default_input_index(&self) -> Option<usize> {
        self.default_input
    }

    fn open_stream(
        &self,
        _device_index: usize,
        params: StreamParams,
        handler: FrameHandler,
    ) -> Result<Box<dyn StreamHandle>, CaptureError> {
        let mut shared = self.shared.lock();
        shared.open_count += 1;
        shared.handler = Some(handler);
        shared.last_params = Some(params);
        Ok(Box::new(MockStream {
            shared: self.shared.clone(),
        }))
    }
}

struct MockStream {
    shared: Arc<Mutex<MockShared>>,
}

impl StreamHandle for MockStream {
    fn start(&mut self) -> Result<(), CaptureError> {
        let mut shared = self.shared.lock();
        if shared.fail_start {
            return Err(CaptureError::StreamError("device busy".to_string()));
        }
        shared.delivering = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.shared.lock().delivering = false;
        Ok(())
    }

    fn close(self: Box<Self>) {
        let mut shared = self.shared.lock();
        shared.delivering = false;
        shared.handler = None;
        shared.close_count += 1;
    }
}

/// Publisher that keeps every decoded command it was asked to send
#[derive(Default)]
pub(crate) struct RecordingPublisher {
    sent: Mutex<Vec<(String, LedCommand)>>,
    fail: Mutex<bool>,
}

impl RecordingPublisher {
    pub(crate) fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub(crate) fn commands(&self) -> Vec<LedCommand> {
        self.sent.lock().iter().map(|(_, c)| c.clone()).collect()
    }

    pub(crate) fn topics(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    pub(crate) fn last(&self) -> Option<LedCommand> {
        self.sent.lock().last().map(|(_, c)| c.clone())
    }

    pub(crate) fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Publisher for RecordingPublisher {
    fn send(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        if *self.fail.lock() {
            return Err(PublishError::Disconnected);
        }
        let command: LedCommand =
            serde_json::from_str(payload).map_err(|e| PublishError::Encode(e.to_string()))?;
        self.sent.lock().push((topic.to_string(), command));
        Ok(())
    }
}

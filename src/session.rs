//! Session lifecycle: Idle -> Starting -> Active -> Stopping -> Idle

use crate::audio::{
    AudioBackend, AudioConfig, CaptureError, CaptureSession, DeviceDescriptor, DeviceInfo,
    DeviceSelector,
};
use crate::dispatch::ActuationDispatcher;
use crate::protocol::{LedCommand, Publisher};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Session controller errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Audio listening is already active")]
    AlreadyActive,

    #[error("Session is {0:?}, try again shortly")]
    Busy(LifecycleState),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Idle,
    Starting,
    Active,
    Stopping,
}

/// Result of a `stop()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotActive,
}

/// Status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionStatus {
    pub active: bool,
    pub device: Option<DeviceInfo>,
}

/// One enumerated device, as shown to a device picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceListing {
    pub index: usize,
    pub name: String,
    pub input_channels: u16,
    pub is_default: bool,
}

#[derive(Default)]
struct ControllerState {
    lifecycle: LifecycleState,
    session: Option<CaptureSession>,
}

/// Start/stop/status surface around at most one capture session.
///
/// The state lock is never held while a device is being opened or closed, so
/// `status()` stays responsive during transitions.
pub struct SessionController {
    backend: Arc<dyn AudioBackend>,
    publisher: Arc<dyn Publisher>,
    config: AudioConfig,
    topic: String,
    state: Mutex<ControllerState>,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        publisher: Arc<dyn Publisher>,
        config: AudioConfig,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            publisher,
            config,
            topic: topic.into(),
            state: Mutex::new(ControllerState::default()),
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.state.lock().lifecycle
    }

    /// Open a capture session and start driving the lights.
    pub fn start(&self, selector: Option<&DeviceSelector>) -> Result<DeviceInfo, SessionError> {
        {
            let mut state = self.state.lock();
            match state.lifecycle {
                LifecycleState::Idle => state.lifecycle = LifecycleState::Starting,
                LifecycleState::Active => return Err(SessionError::AlreadyActive),
                other => return Err(SessionError::Busy(other)),
            }
        }
        // Lock dropped

        // Clear whatever pattern the lights were showing.
        self.publish_off();

        let dispatcher = ActuationDispatcher::new(
            self.publisher.clone(),
            self.topic.clone(),
            Duration::from_millis(self.config.dispatch_interval_ms),
        );

        match CaptureSession::open(self.backend.as_ref(), selector, &self.config, dispatcher) {
            Ok(session) => {
                let device = session.device().clone();
                let mut state = self.state.lock();
                state.session = Some(session);
                state.lifecycle = LifecycleState::Active;
                log::info!("Audio-reactive mode started on {}", device.name);
                Ok(device)
            }
            Err(e) => {
                log::error!("Failed to start audio: {}", e);
                self.state.lock().lifecycle = LifecycleState::Idle;
                Err(e.into())
            }
        }
    }

    /// Stop the active session. Blocks until the in-flight frame, if any, is done.
    pub fn stop(&self) -> Result<StopOutcome, SessionError> {
        let session = {
            let mut state = self.state.lock();
            match state.lifecycle {
                LifecycleState::Active => {
                    state.lifecycle = LifecycleState::Stopping;
                    state.session.take()
                }
                LifecycleState::Idle => return Ok(StopOutcome::NotActive),
                other => return Err(SessionError::Busy(other)),
            }
        };

        if let Some(session) = session {
            session.close();
        }

        self.state.lock().lifecycle = LifecycleState::Idle;
        log::info!("Audio-reactive mode stopped");
        Ok(StopOutcome::Stopped)
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.state.lock();
        let active = state.lifecycle == LifecycleState::Active;
        SessionStatus {
            active,
            device: state
                .session
                .as_ref()
                .filter(|_| active)
                .map(|s| s.device().clone()),
        }
    }

    /// Running band averages of the active session
    pub fn band_averages(&self) -> Option<[f32; 3]> {
        self.state.lock().session.as_ref().map(|s| s.band_averages())
    }

    /// Enumerate devices for a picker
    pub fn devices(&self) -> Result<Vec<DeviceListing>, SessionError> {
        let default = self.backend.default_input_index();
        let devices: Vec<DeviceDescriptor> = self.backend.devices()?;

        Ok(devices
            .into_iter()
            .enumerate()
            .map(|(index, d)| DeviceListing {
                index,
                name: d.name,
                input_channels: d.input_channels,
                is_default: default == Some(index),
            })
            .collect())
    }

    fn publish_off(&self) {
        let payload = match LedCommand::off().to_json() {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to encode light command: {}", e);
                return;
            }
        };
        if let Err(e) = self.publisher.send(&self.topic, &payload) {
            log::debug!("Could not clear lights before start: {}", e);
        }
    }
}

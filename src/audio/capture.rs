//! Capture session: owns the opened stream and runs the per-frame pipeline

use super::{
    select_device, AudioBackend, AudioConfig, DeviceInfo, DeviceSelector, SpectralAnalyzer,
    StreamHandle, StreamParams, ThresholdTracker,
};
use crate::dispatch::ActuationDispatcher;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Audio capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No audio input device available")]
    DeviceUnavailable,

    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to enumerate devices: {0}")]
    Enumeration(String),

    #[error("Invalid audio configuration: {0}")]
    InvalidConfig(String),

    #[error("Audio stream error: {0}")]
    StreamError(String),

    #[error("Thread error: {0}")]
    ThreadError(String),
}

/// Analyzer, tracker and dispatcher for one session, driven once per frame.
struct FramePipeline {
    analyzer: SpectralAnalyzer,
    tracker: ThresholdTracker,
    dispatcher: ActuationDispatcher,
    frames: u64,
    closed: bool,
}

impl FramePipeline {
    fn process(&mut self, samples: &[f32], now: Instant) {
        if self.closed {
            return;
        }
        if samples.len() != self.analyzer.frame_size() {
            log::debug!(
                "Dropping frame of {} samples (expected {})",
                samples.len(),
                self.analyzer.frame_size()
            );
            return;
        }

        self.frames += 1;
        let energies = self.analyzer.analyze(samples);
        let state = self.tracker.update(&energies);
        self.dispatcher.maybe_dispatch(state, now);
    }
}

/// An open capture session.
///
/// Dropping the session closes it.
pub struct CaptureSession {
    device: DeviceInfo,
    stream: Option<Box<dyn StreamHandle>>,
    pipeline: Arc<Mutex<FramePipeline>>,
}

impl CaptureSession {
    /// Select a device, open a stream on it and start frame delivery.
    ///
    /// On any failure the partially opened stream is closed before returning.
    pub fn open(
        backend: &dyn AudioBackend,
        selector: Option<&DeviceSelector>,
        config: &AudioConfig,
        mut dispatcher: ActuationDispatcher,
    ) -> Result<Self, CaptureError> {
        config.validate()?;

        let devices = backend.devices()?;
        let index = select_device(
            &devices,
            backend.default_input_index(),
            selector,
            &config.device_keywords,
        )?;

        let device = DeviceInfo {
            name: devices[index].name.clone(),
            index,
            sample_rate: config.sample_rate,
            channels: config.channels,
        };
        log::info!("Using audio device: {} (index {})", device.name, device.index);

        dispatcher.reset();
        let pipeline = Arc::new(Mutex::new(FramePipeline {
            analyzer: SpectralAnalyzer::new(config.sample_rate, config.frame_size),
            tracker: ThresholdTracker::new(config.alpha, config.multiplier),
            dispatcher,
            frames: 0,
            closed: false,
        }));

        let pipeline_clone = pipeline.clone();
        let handler = Box::new(move |samples: &[f32]| {
            pipeline_clone.lock().process(samples, Instant::now());
        });

        let params = StreamParams {
            sample_rate: config.sample_rate,
            frame_size: config.frame_size,
            channels: config.channels,
        };
        let mut stream = backend.open_stream(index, params, handler)?;

        if let Err(e) = stream.start() {
            log::error!("Failed to start audio stream: {}", e);
            stream.close();
            return Err(e);
        }

        log::info!(
            "Audio capture started: {} Hz, {} samples per frame ({:.1} ms)",
            config.sample_rate,
            config.frame_size,
            config.frame_period().as_secs_f64() * 1000.0
        );

        Ok(Self {
            device,
            stream: Some(stream),
            pipeline,
        })
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Current running averages (bass, mid, treble)
    pub fn band_averages(&self) -> [f32; 3] {
        self.pipeline.lock().tracker.averages()
    }

    /// Frames processed so far
    pub fn frames_processed(&self) -> u64 {
        self.pipeline.lock().frames
    }

    /// Stop delivery, wait for an in-flight frame, turn the lights off and
    /// release the device.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };

        if let Err(e) = stream.stop() {
            log::error!("Error stopping audio stream: {}", e);
        }

        // Taking the lock waits for any frame still in the handler.
        {
            let mut pipeline = self.pipeline.lock();
            pipeline.closed = true;
            pipeline.dispatcher.force_off(Instant::now());
        }

        stream.close();
        log::info!("Audio capture stopped ({})", self.device.name);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

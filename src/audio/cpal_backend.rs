//! cpal implementation of the audio backend using a dedicated thread per stream

use super::{
    AudioBackend, CaptureError, DeviceDescriptor, FrameHandler, StreamHandle, StreamParams,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

/// Re-blocks interleaved callback buffers of any length into mono frames of
/// exactly `frame_size` samples.
pub struct FrameAssembler {
    frame_size: usize,
    channels: usize,
    pending: Vec<f32>,
    acc: f32,
    acc_count: usize,
}

impl FrameAssembler {
    pub fn new(frame_size: usize, channels: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            channels: channels.max(1),
            pending: Vec::with_capacity(frame_size),
            acc: 0.0,
            acc_count: 0,
        }
    }

    /// Downmix `data` to mono and call `on_frame` for every completed frame.
    pub fn push<T, C, F>(&mut self, data: &[T], mut convert: C, mut on_frame: F)
    where
        T: Copy,
        C: FnMut(T) -> f32,
        F: FnMut(&[f32]),
    {
        for &sample in data {
            self.acc += convert(sample);
            self.acc_count += 1;
            if self.acc_count < self.channels {
                continue;
            }

            self.pending.push(self.acc / self.channels as f32);
            self.acc = 0.0;
            self.acc_count = 0;

            if self.pending.len() == self.frame_size {
                on_frame(&self.pending);
                self.pending.clear();
            }
        }
    }

    /// Mono samples waiting for the next frame boundary
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Audio backend over the default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

fn max_input_channels(device: &Device) -> u16 {
    device
        .supported_input_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}

impl AudioBackend for CpalBackend {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        let host = cpal::default_host();
        let devices = host
            .devices()
            .map_err(|e| CaptureError::Enumeration(e.to_string()))?;

        Ok(devices
            .map(|device| {
                let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
                DeviceDescriptor::new(name, max_input_channels(&device))
            })
            .collect())
    }

    fn default_input_index(&self) -> Option<usize> {
        let host = cpal::default_host();
        let default_name = host.default_input_device()?.name().ok()?;
        host.devices()
            .ok()?
            .position(|d| d.name().map(|n| n == default_name).unwrap_or(false))
    }

    fn open_stream(
        &self,
        device_index: usize,
        params: StreamParams,
        handler: FrameHandler,
    ) -> Result<Box<dyn StreamHandle>, CaptureError> {
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        // cpal::Stream is not Send on every host, so the stream lives and dies
        // on this thread.
        let thread_handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                run_stream_thread(device_index, params, handler, command_rx, ready_tx)
            })
            .map_err(|e| CaptureError::ThreadError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalStream {
                command_tx,
                thread_handle: Some(thread_handle),
            })),
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread_handle.join();
                Err(CaptureError::ThreadError(
                    "Audio thread exited while opening stream".to_string(),
                ))
            }
        }
    }
}

/// Commands sent to the audio thread
enum StreamCommand {
    Play(mpsc::Sender<Result<(), CaptureError>>),
    Pause(mpsc::Sender<Result<(), CaptureError>>),
    Close,
}

/// Handle to a stream owned by an `audio-capture` thread
pub struct CpalStream {
    command_tx: mpsc::Sender<StreamCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl CpalStream {
    fn request(
        &self,
        make: fn(mpsc::Sender<Result<(), CaptureError>>) -> StreamCommand,
    ) -> Result<(), CaptureError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.command_tx
            .send(make(reply_tx))
            .map_err(|_| CaptureError::ThreadError("Audio thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| CaptureError::ThreadError("Audio thread did not reply".to_string()))?
    }

    fn shutdown(&mut self) {
        let _ = self.command_tx.send(StreamCommand::Close);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl StreamHandle for CpalStream {
    fn start(&mut self) -> Result<(), CaptureError> {
        self.request(StreamCommand::Play)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.request(StreamCommand::Pause)
    }

    fn close(mut self: Box<Self>) {
        self.shutdown();
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Open the stream, report the outcome, then serve commands until closed.
fn run_stream_thread(
    device_index: usize,
    params: StreamParams,
    handler: FrameHandler,
    command_rx: mpsc::Receiver<StreamCommand>,
    ready_tx: mpsc::Sender<Result<(), CaptureError>>,
) {
    let stream = match build_device_stream(device_index, params, handler) {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("Failed to open audio stream: {}", e);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    while let Ok(command) = command_rx.recv() {
        match command {
            StreamCommand::Play(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| CaptureError::StreamError(e.to_string()));
                let _ = reply.send(result);
            }
            StreamCommand::Pause(reply) => {
                let result = stream
                    .pause()
                    .map_err(|e| CaptureError::StreamError(e.to_string()));
                let _ = reply.send(result);
            }
            StreamCommand::Close => break,
        }
    }

    drop(stream);
    log::debug!("Audio stream released");
}

fn build_device_stream(
    device_index: usize,
    params: StreamParams,
    handler: FrameHandler,
) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .devices()
        .map_err(|e| CaptureError::Enumeration(e.to_string()))?
        .nth(device_index)
        .ok_or_else(|| CaptureError::DeviceNotFound(format!("#{}", device_index)))?;

    let sample_format = device
        .default_input_config()
        .map_err(|e| CaptureError::StreamError(format!("Input config: {}", e)))?
        .sample_format();

    let config = StreamConfig {
        channels: params.channels,
        sample_rate: cpal::SampleRate(params.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let assembler = FrameAssembler::new(params.frame_size, params.channels as usize);

    log::info!(
        "Opening input stream: {} Hz, {} channel(s), {:?}",
        params.sample_rate,
        params.channels,
        sample_format
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, assembler, handler),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, assembler, handler),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, assembler, handler),
        other => {
            return Err(CaptureError::StreamError(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(|e| CaptureError::StreamError(e.to_string()))?;

    Ok(stream)
}

/// Build audio stream for given sample type
fn build_stream<T: cpal::Sample + cpal::SizedSample>(
    device: &Device,
    config: &StreamConfig,
    mut assembler: FrameAssembler,
    mut handler: FrameHandler,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    f32: cpal::FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            assembler.push(
                data,
                |s| <f32 as cpal::Sample>::from_sample(s),
                |frame| handler(frame),
            );
        },
        |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )
}

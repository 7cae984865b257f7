//! Hardware microphone backend over cpal.
//!
//! The cpal input stream is not `Send`, so each open capture runs on a
//! dedicated thread that owns the stream and appends converted PCM16 into a
//! shared buffer. Finishing (or dropping) the stream handle stops the
//! thread, which releases the device.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::warn;

use remedia_core::error::{DeviceKind, RemediaError, Result};
use remedia_core::media::AudioClip;

use crate::device::{Microphone, MicrophoneStream};
use crate::wav;

type PcmBuffer = Arc<Mutex<Vec<u8>>>;

/// The system default microphone.
///
/// Platform permission refusals are not reliably distinguishable from a
/// missing device through cpal, so both surface as `DeviceUnavailable`.
#[derive(Debug, Default)]
pub struct CpalMicrophone;

impl CpalMicrophone {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Microphone for CpalMicrophone {
    async fn open(&self) -> Result<Box<dyn MicrophoneStream>> {
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let buffer: PcmBuffer = Arc::new(Mutex::new(Vec::new()));
        let thread_buffer = buffer.clone();

        let thread = std::thread::Builder::new()
            .name("remedia-mic".into())
            .spawn(move || {
                let stream = match build_capture_stream(thread_buffer) {
                    Ok(built) => {
                        let format = (built.sample_rate, built.channels);
                        let _ = ready_tx.send(Ok(format));
                        built.stream
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                // Hold the stream until the handle signals stop or drops
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| {
                RemediaError::device_unavailable(
                    DeviceKind::Microphone,
                    format!("capture thread: {e}"),
                )
            })?;

        let (sample_rate, channels) = ready_rx.await.map_err(|_| {
            RemediaError::device_unavailable(
                DeviceKind::Microphone,
                "capture thread exited during setup",
            )
        })??;

        Ok(Box::new(CpalMicStream {
            buffer,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            sample_rate,
            channels,
        }))
    }
}

struct BuiltStream {
    stream: cpal::Stream,
    sample_rate: u32,
    channels: u16,
}

fn build_capture_stream(buffer: PcmBuffer) -> Result<BuiltStream> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or_else(|| {
        RemediaError::device_unavailable(DeviceKind::Microphone, "no default input device")
    })?;
    let supported = device.default_input_config().map_err(|e| {
        RemediaError::device_unavailable(DeviceKind::Microphone, format!("input config: {e}"))
    })?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;

    let err_fn = |err| warn!(target: "remedia::recorder", error = %err, "capture stream error");

    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            let buffer = buffer.clone();
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut pcm) = buffer.lock() {
                        for sample in data {
                            let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
                            pcm.extend_from_slice(&value.to_le_bytes());
                        }
                    }
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::I16 => {
            let buffer = buffer.clone();
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut pcm) = buffer.lock() {
                        for sample in data {
                            pcm.extend_from_slice(&sample.to_le_bytes());
                        }
                    }
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::U16 => {
            let buffer = buffer.clone();
            device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut pcm) = buffer.lock() {
                        for sample in data {
                            let value = (i32::from(*sample) - 32_768) as i16;
                            pcm.extend_from_slice(&value.to_le_bytes());
                        }
                    }
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(RemediaError::device_unavailable(
                DeviceKind::Microphone,
                format!("unsupported sample format: {other:?}"),
            ));
        }
    }
    .map_err(|e| {
        RemediaError::device_unavailable(DeviceKind::Microphone, format!("build stream: {e}"))
    })?;

    stream.play().map_err(|e| {
        RemediaError::device_unavailable(DeviceKind::Microphone, format!("start stream: {e}"))
    })?;

    Ok(BuiltStream {
        stream,
        sample_rate,
        channels,
    })
}

struct CpalMicStream {
    buffer: PcmBuffer,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
    channels: u16,
}

impl CpalMicStream {
    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CpalMicStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl MicrophoneStream for CpalMicStream {
    fn finish(mut self: Box<Self>) -> Result<AudioClip> {
        self.shutdown();
        let pcm = match self.buffer.lock() {
            Ok(mut pcm) => std::mem::take(&mut *pcm),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        let duration = wav::pcm16_duration(pcm.len(), self.sample_rate, self.channels);
        let bytes = wav::encode_pcm16(&pcm, self.sample_rate, self.channels);
        Ok(AudioClip::new(bytes, "audio/wav").with_duration(duration))
    }

    fn bytes_captured(&self) -> usize {
        self.buffer.lock().map(|pcm| pcm.len()).unwrap_or(0)
    }
}

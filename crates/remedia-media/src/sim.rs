//! Simulated devices.
//!
//! Deterministic stand-ins for microphone, camera, and audio output, with
//! acquire/release accounting so tests can assert that every capture session
//! balances. Demos and headless hosts use them too; the controllers cannot
//! tell them apart from hardware.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use remedia_core::error::{DeviceKind, RemediaError, Result};
use remedia_core::media::{AudioClip, ImageStill};

use crate::device::{AudioSink, Camera, CameraStream, Facing, Microphone, MicrophoneStream};
use crate::wav;

/// Acquire/release accounting shared between a sim device and its streams.
///
/// Cheap to clone; clones observe the same counts.
#[derive(Clone, Default)]
pub struct DeviceCounters {
    inner: Arc<Counts>,
}

#[derive(Default)]
struct Counts {
    acquired: AtomicUsize,
    released: AtomicUsize,
    open: AtomicUsize,
    peak_open: AtomicUsize,
}

impl DeviceCounters {
    fn on_acquire(&self) {
        self.inner.acquired.fetch_add(1, Ordering::SeqCst);
        let now_open = self.inner.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_open.fetch_max(now_open, Ordering::SeqCst);
    }

    fn on_release(&self) {
        self.inner.released.fetch_add(1, Ordering::SeqCst);
        self.inner.open.fetch_sub(1, Ordering::SeqCst);
    }

    /// Total successful acquisitions.
    pub fn acquired(&self) -> usize {
        self.inner.acquired.load(Ordering::SeqCst)
    }

    /// Total releases.
    pub fn released(&self) -> usize {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Streams open right now.
    pub fn open_now(&self) -> usize {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Most streams ever open at once.
    pub fn peak_open(&self) -> usize {
        self.inner.peak_open.load(Ordering::SeqCst)
    }

    /// True when every acquisition has a matching release.
    pub fn balanced(&self) -> bool {
        self.acquired() == self.released() && self.open_now() == 0
    }
}

#[derive(Debug, Clone)]
enum Access {
    Grant,
    DenyPermission,
    Unavailable(String),
}

// ============================================================================
// Microphone
// ============================================================================

/// A microphone that "captures" a fixed PCM payload.
pub struct SimMicrophone {
    counters: DeviceCounters,
    access: Access,
    pcm: Vec<u8>,
    sample_rate: u32,
}

impl SimMicrophone {
    /// A granting microphone capturing half a second of 16 kHz silence.
    pub fn granting() -> Self {
        Self {
            counters: DeviceCounters::default(),
            access: Access::Grant,
            pcm: vec![0u8; 16_000],
            sample_rate: 16_000,
        }
    }

    /// A microphone whose permission prompt is refused.
    pub fn denying() -> Self {
        Self {
            access: Access::DenyPermission,
            ..Self::granting()
        }
    }

    /// A microphone that cannot be acquired at all.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            access: Access::Unavailable(reason.into()),
            ..Self::granting()
        }
    }

    /// Overrides the captured PCM payload.
    pub fn with_pcm(mut self, pcm: Vec<u8>, sample_rate: u32) -> Self {
        self.pcm = pcm;
        self.sample_rate = sample_rate;
        self
    }

    pub fn counters(&self) -> DeviceCounters {
        self.counters.clone()
    }
}

#[async_trait]
impl Microphone for SimMicrophone {
    async fn open(&self) -> Result<Box<dyn MicrophoneStream>> {
        match &self.access {
            Access::DenyPermission => {
                Err(RemediaError::permission_denied(DeviceKind::Microphone))
            }
            Access::Unavailable(reason) => Err(RemediaError::device_unavailable(
                DeviceKind::Microphone,
                reason.clone(),
            )),
            Access::Grant => {
                self.counters.on_acquire();
                Ok(Box::new(SimMicStream {
                    counters: self.counters.clone(),
                    pcm: self.pcm.clone(),
                    sample_rate: self.sample_rate,
                }))
            }
        }
    }
}

struct SimMicStream {
    counters: DeviceCounters,
    pcm: Vec<u8>,
    sample_rate: u32,
}

impl Drop for SimMicStream {
    fn drop(&mut self) {
        self.counters.on_release();
    }
}

impl MicrophoneStream for SimMicStream {
    fn finish(self: Box<Self>) -> Result<AudioClip> {
        let duration = wav::pcm16_duration(self.pcm.len(), self.sample_rate, 1);
        let bytes = wav::encode_pcm16(&self.pcm, self.sample_rate, 1);
        Ok(AudioClip::new(bytes, "audio/wav").with_duration(duration))
        // self drops here, releasing the device
    }

    fn bytes_captured(&self) -> usize {
        self.pcm.len()
    }
}

// ============================================================================
// Camera
// ============================================================================

/// A camera that synthesizes PNG frames.
pub struct SimCamera {
    counters: DeviceCounters,
    access: Access,
    width: u32,
    height: u32,
}

impl SimCamera {
    /// A granting camera producing 16x16 frames.
    pub fn granting() -> Self {
        Self {
            counters: DeviceCounters::default(),
            access: Access::Grant,
            width: 16,
            height: 16,
        }
    }

    /// A camera whose permission prompt is refused.
    pub fn denying() -> Self {
        Self {
            access: Access::DenyPermission,
            ..Self::granting()
        }
    }

    /// A camera that cannot be acquired at all.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            access: Access::Unavailable(reason.into()),
            ..Self::granting()
        }
    }

    pub fn counters(&self) -> DeviceCounters {
        self.counters.clone()
    }
}

#[async_trait]
impl Camera for SimCamera {
    async fn open(&self, facing: Facing) -> Result<Box<dyn CameraStream>> {
        match &self.access {
            Access::DenyPermission => Err(RemediaError::permission_denied(DeviceKind::Camera)),
            Access::Unavailable(reason) => Err(RemediaError::device_unavailable(
                DeviceKind::Camera,
                reason.clone(),
            )),
            Access::Grant => {
                self.counters.on_acquire();
                Ok(Box::new(SimCameraStream {
                    counters: self.counters.clone(),
                    facing,
                    width: self.width,
                    height: self.height,
                    frames_grabbed: 0,
                }))
            }
        }
    }
}

struct SimCameraStream {
    counters: DeviceCounters,
    facing: Facing,
    width: u32,
    height: u32,
    frames_grabbed: u32,
}

impl Drop for SimCameraStream {
    fn drop(&mut self) {
        self.counters.on_release();
    }
}

impl CameraStream for SimCameraStream {
    fn grab_frame(&mut self) -> Result<ImageStill> {
        // Brightness varies per frame so retakes produce distinct bytes.
        let shade = (self.frames_grabbed % 250) as u8;
        let frame = image::RgbaImage::from_pixel(
            self.width,
            self.height,
            image::Rgba([shade, 128, 255 - shade, 255]),
        );
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(frame)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| RemediaError::internal(format!("png encode: {e}")))?;
        self.frames_grabbed += 1;
        Ok(ImageStill::new(bytes, "image/png", self.width, self.height))
    }

    fn facing(&self) -> Facing {
        self.facing
    }
}

// ============================================================================
// Audio sink
// ============================================================================

/// An audio output driven by a virtual clock.
///
/// Clones share state, so a test can keep a handle while the controller owns
/// the boxed sink.
#[derive(Clone)]
pub struct SimSink {
    inner: Arc<Mutex<SinkState>>,
}

struct SinkState {
    playing: bool,
    ended: bool,
    position: Duration,
    duration: Option<Duration>,
    play_rejections: u32,
}

impl SimSink {
    /// A sink whose clip duration is known up front.
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SinkState {
                playing: false,
                ended: false,
                position: Duration::ZERO,
                duration: Some(duration),
                play_rejections: 0,
            })),
        }
    }

    /// A sink whose metadata has not loaded yet.
    pub fn unknown_duration() -> Self {
        let sink = Self::with_duration(Duration::ZERO);
        sink.inner.lock().unwrap().duration = None;
        sink
    }

    /// Refuses the next `n` play attempts (autoplay policy).
    pub fn rejecting_plays(self, n: u32) -> Self {
        self.inner.lock().unwrap().play_rejections = n;
        self
    }

    /// Marks metadata as loaded.
    pub fn set_duration(&self, duration: Duration) {
        self.inner.lock().unwrap().duration = Some(duration);
    }

    /// Advances the virtual clock while playing.
    pub fn advance(&self, by: Duration) {
        let mut state = self.inner.lock().unwrap();
        if !state.playing {
            return;
        }
        state.position += by;
        if let Some(duration) = state.duration {
            if state.position >= duration {
                state.position = duration;
                state.playing = false;
                state.ended = true;
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().playing
    }
}

impl AudioSink for SimSink {
    fn play(&mut self) -> bool {
        let mut state = self.inner.lock().unwrap();
        if state.play_rejections > 0 {
            state.play_rejections -= 1;
            return false;
        }
        if state.ended {
            state.position = Duration::ZERO;
            state.ended = false;
        }
        state.playing = true;
        true
    }

    fn pause(&mut self) {
        self.inner.lock().unwrap().playing = false;
    }

    fn seek(&mut self, position: Duration) {
        let mut state = self.inner.lock().unwrap();
        state.position = match state.duration {
            Some(duration) => position.min(duration),
            None => position,
        };
        state.ended = false;
    }

    fn position(&self) -> Duration {
        self.inner.lock().unwrap().position
    }

    fn duration(&self) -> Option<Duration> {
        self.inner.lock().unwrap().duration
    }

    fn ended(&self) -> bool {
        self.inner.lock().unwrap().ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mic_finish_balances_counters() {
        let mic = SimMicrophone::granting();
        let counters = mic.counters();

        let stream = mic.open().await.unwrap();
        assert_eq!(counters.open_now(), 1);

        let clip = stream.finish().unwrap();
        assert!(counters.balanced());
        assert_eq!(&clip.bytes[0..4], b"RIFF");
        assert_eq!(clip.duration, Some(Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn test_mic_drop_balances_counters() {
        let mic = SimMicrophone::granting();
        let counters = mic.counters();

        let stream = mic.open().await.unwrap();
        drop(stream);
        assert!(counters.balanced());
    }

    #[tokio::test]
    async fn test_denied_mic_opens_nothing() {
        let mic = SimMicrophone::denying();
        let err = mic.open().await.unwrap_err();
        assert!(err.is_permission_denied());
        assert_eq!(mic.counters().acquired(), 0);
    }

    #[tokio::test]
    async fn test_camera_frames_are_decodable() {
        let camera = SimCamera::granting();
        let mut stream = camera.open(Facing::Rear).await.unwrap();

        let still = stream.grab_frame().unwrap();
        let decoded = image::load_from_memory(&still.bytes).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 16);

        let second = stream.grab_frame().unwrap();
        assert_ne!(still.bytes, second.bytes);
    }

    #[test]
    fn test_sink_ends_at_duration() {
        let mut sink = SimSink::with_duration(Duration::from_secs(2));
        assert!(sink.play());
        sink.advance(Duration::from_secs(3));
        assert!(sink.ended());
        assert!(!sink.is_playing());
    }

    #[test]
    fn test_sink_rejects_configured_plays() {
        let mut sink = SimSink::with_duration(Duration::from_secs(1)).rejecting_plays(1);
        assert!(!sink.play());
        assert!(sink.play());
    }
}

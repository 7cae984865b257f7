//! Device trait seams.
//!
//! Controllers acquire hardware exclusively through these traits so tests
//! and headless hosts can substitute simulated devices. Stream handles own
//! the underlying hardware: dropping a handle releases the device, and the
//! success paths consume the handle, so every exit edge releases exactly
//! once.

use std::time::Duration;

use async_trait::async_trait;

use remedia_core::error::Result;
use remedia_core::media::{AudioClip, ImageStill};

/// Camera lens selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Facing {
    /// User-facing lens.
    Front,
    /// World-facing lens. The default: stills here are mostly of
    /// medication packaging, not the user.
    #[default]
    Rear,
}

impl Facing {
    /// The other lens.
    pub fn flipped(self) -> Self {
        match self {
            Self::Front => Self::Rear,
            Self::Rear => Self::Front,
        }
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Front => write!(f, "front"),
            Self::Rear => write!(f, "rear"),
        }
    }
}

/// An abstract microphone.
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Requests microphone access and starts capturing.
    ///
    /// This is the permission suspension point: the future resolves once the
    /// platform grants or refuses the device.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when the user refuses, `DeviceUnavailable` when no
    /// usable microphone exists.
    async fn open(&self) -> Result<Box<dyn MicrophoneStream>>;
}

/// An open microphone stream accumulating encoded audio.
///
/// Dropping the handle stops capture and discards the accumulated chunks.
pub trait MicrophoneStream: Send {
    /// Stops capture and finalizes the accumulated chunks into one clip.
    ///
    /// Consumes the handle; the hardware is released either way.
    fn finish(self: Box<Self>) -> Result<AudioClip>;

    /// Bytes accumulated so far. Display only.
    fn bytes_captured(&self) -> usize;
}

/// An abstract camera.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Requests a live video stream from the lens facing `facing`.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when the user refuses, `DeviceUnavailable` when no
    /// camera matches.
    async fn open(&self, facing: Facing) -> Result<Box<dyn CameraStream>>;
}

/// An open live-preview stream.
///
/// Dropping the handle stops the stream and releases the camera.
pub trait CameraStream: Send {
    /// Grabs the current video frame as an encoded still.
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` when the stream can no longer produce frames.
    fn grab_frame(&mut self) -> Result<ImageStill>;

    /// Which lens this stream came from.
    fn facing(&self) -> Facing;
}

/// An abstract audio output loaded with a single clip.
///
/// Implementations must be restartable: `seek(0)` after the clip ends
/// re-arms playback from the start.
pub trait AudioSink: Send {
    /// Attempts to start or resume playback.
    ///
    /// Returns false when the platform refuses unprompted playback
    /// (autoplay policy); the caller treats that silently.
    fn play(&mut self) -> bool;

    /// Pauses playback, keeping the current position.
    fn pause(&mut self);

    /// Moves the playhead. Positions beyond the clip clamp to its end.
    fn seek(&mut self, position: Duration);

    /// Last observed playhead position. Eventually consistent.
    fn position(&self) -> Duration;

    /// Total clip duration, once metadata is known.
    fn duration(&self) -> Option<Duration>;

    /// True once the clip has played through to its end.
    fn ended(&self) -> bool;
}

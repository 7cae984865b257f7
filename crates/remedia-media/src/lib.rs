//! Capture and playback controllers for the Remedia interaction pipeline.
//!
//! # Module Structure
//!
//! - `device`: the microphone, camera, and audio sink seams
//! - `recorder`: the push-to-talk voice recording state machine
//! - `camera`: the live-preview / freeze / confirm capture flow
//! - `playback`: per-clip transport control for assistant audio
//! - `sim`: deterministic in-memory devices for tests and headless hosts
//! - `wav`: PCM16 WAV container encoding
//! - `backend`: hardware devices (feature-gated, off by default)

pub mod backend;
pub mod camera;
pub mod device;
pub mod playback;
pub mod recorder;
pub mod sim;
pub mod wav;

pub use camera::{CameraController, CameraState};
pub use device::{AudioSink, Camera, CameraStream, Facing, Microphone, MicrophoneStream};
pub use playback::{PlaybackController, PlaybackState, PlaybackStatus};
pub use recorder::{AudioRecorder, RecorderState};

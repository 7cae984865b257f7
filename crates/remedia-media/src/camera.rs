//! Camera capture controller.
//!
//! Owns the live-preview stream for one camera session: open a lens, freeze
//! a frame, then either confirm it into an artifact or retake. Switching
//! lenses tears the old stream down completely before the new acquisition,
//! so two device handles never coexist.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use remedia_core::error::{DeviceKind, RemediaError, Result};
use remedia_core::event::{EventSender, PipelineEvent};
use remedia_core::media::ImageStill;

use crate::device::{Camera, CameraStream, Facing};

/// Observable camera controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Closed,
    AcquiringDevice,
    LivePreview,
    Frozen,
    Error,
}

impl CameraState {
    /// Compact label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::AcquiringDevice => "acquiring_device",
            Self::LivePreview => "live_preview",
            Self::Frozen => "frozen",
            Self::Error => "error",
        }
    }
}

enum Slot {
    Closed,
    Acquiring { facing: Facing },
    Live { stream: Box<dyn CameraStream> },
    Frozen {
        stream: Box<dyn CameraStream>,
        snapshot: ImageStill,
    },
    Errored(RemediaError),
}

impl Slot {
    fn state(&self) -> CameraState {
        match self {
            Self::Closed => CameraState::Closed,
            Self::Acquiring { .. } => CameraState::AcquiringDevice,
            Self::Live { .. } => CameraState::LivePreview,
            Self::Frozen { .. } => CameraState::Frozen,
            Self::Errored(_) => CameraState::Error,
        }
    }
}

/// Drives one camera session at a time against a [`Camera`].
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct CameraController {
    camera: Arc<dyn Camera>,
    events: Option<EventSender>,
    slot: Arc<RwLock<Slot>>,
}

impl CameraController {
    pub fn new(camera: Arc<dyn Camera>) -> Self {
        Self {
            camera,
            events: None,
            slot: Arc::new(RwLock::new(Slot::Closed)),
        }
    }

    /// Attaches an event sender for capture failure notices.
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit_failure(&self, err: &RemediaError) {
        if let Some(tx) = &self.events {
            let _ = tx.send(PipelineEvent::CaptureFailed {
                device: DeviceKind::Camera,
                summary: err.user_summary(),
            });
        }
    }

    /// Opens the capture surface with the preferred lens.
    ///
    /// Suspends while the platform resolves camera access. On refusal the
    /// controller enters its error display state, where [`close`] is the
    /// only way out.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless closed; otherwise the device error.
    ///
    /// [`close`]: CameraController::close
    pub async fn open(&self, facing: Facing) -> Result<()> {
        {
            let mut slot = self.slot.write().await;
            match &*slot {
                Slot::Closed => *slot = Slot::Acquiring { facing },
                other => {
                    return Err(RemediaError::invalid_transition(
                        other.state().label(),
                        "open",
                    ));
                }
            }
        }
        debug!(target: "remedia::camera", %facing, "acquiring camera");
        self.acquire_into_live(facing).await
    }

    /// Tears the current stream down, then reopens with the other lens.
    ///
    /// The teardown completes before the new acquisition starts; at no point
    /// are two device handles open.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless in live preview; otherwise the device
    /// error from the re-acquisition.
    pub async fn switch_facing(&self) -> Result<Facing> {
        let target = {
            let mut slot = self.slot.write().await;
            match &*slot {
                Slot::Live { stream } => {
                    let target = stream.facing().flipped();
                    // Old stream drops here, before the new open begins
                    *slot = Slot::Acquiring { facing: target };
                    target
                }
                other => {
                    return Err(RemediaError::invalid_transition(
                        other.state().label(),
                        "switch_facing",
                    ));
                }
            }
        };
        debug!(target: "remedia::camera", facing = %target, "switching lens");
        self.acquire_into_live(target).await?;
        Ok(target)
    }

    async fn acquire_into_live(&self, facing: Facing) -> Result<()> {
        match self.camera.open(facing).await {
            Ok(stream) => {
                let mut slot = self.slot.write().await;
                if !matches!(&*slot, Slot::Acquiring { .. }) {
                    // Closed while the prompt was up; drop the stream now.
                    debug!(target: "remedia::camera", "acquisition canceled, releasing stream");
                    return Ok(());
                }
                *slot = Slot::Live { stream };
                debug!(target: "remedia::camera", %facing, "live preview");
                Ok(())
            }
            Err(err) => {
                {
                    let mut slot = self.slot.write().await;
                    if matches!(&*slot, Slot::Acquiring { .. }) {
                        *slot = Slot::Errored(err.clone());
                    }
                }
                warn!(
                    target: "remedia::camera",
                    error = %err,
                    "camera acquisition failed"
                );
                self.emit_failure(&err);
                Err(err)
            }
        }
    }

    /// Freezes the current video frame.
    ///
    /// The stream stays open so a retake can resume the preview.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless in live preview; a frame-grab failure
    /// leaves the preview running.
    pub async fn capture(&self) -> Result<()> {
        let mut slot = self.slot.write().await;
        let snapshot = match &mut *slot {
            Slot::Live { stream } => stream.grab_frame()?,
            other => {
                return Err(RemediaError::invalid_transition(
                    other.state().label(),
                    "capture",
                ));
            }
        };
        if let Slot::Live { stream } = std::mem::replace(&mut *slot, Slot::Closed) {
            *slot = Slot::Frozen { stream, snapshot };
        }
        debug!(target: "remedia::camera", "frame frozen");
        Ok(())
    }

    /// Discards the frozen frame and resumes the live preview.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless frozen.
    pub async fn retake(&self) -> Result<()> {
        let mut slot = self.slot.write().await;
        match std::mem::replace(&mut *slot, Slot::Closed) {
            Slot::Frozen { stream, .. } => {
                *slot = Slot::Live { stream };
                debug!(target: "remedia::camera", "retake");
                Ok(())
            }
            other => {
                let from = other.state().label();
                *slot = other;
                Err(RemediaError::invalid_transition(from, "retake"))
            }
        }
    }

    /// Accepts the frozen frame as the session's artifact.
    ///
    /// Stops the stream, closes the session, and hands the still to the
    /// caller for staging. A successful confirm is also the signal for the
    /// hosting surface to dismiss itself.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless frozen.
    pub async fn confirm(&self) -> Result<ImageStill> {
        let mut slot = self.slot.write().await;
        match std::mem::replace(&mut *slot, Slot::Closed) {
            Slot::Frozen { stream, snapshot } => {
                drop(stream);
                debug!(
                    target: "remedia::camera",
                    bytes = snapshot.bytes.len(),
                    "still confirmed"
                );
                Ok(snapshot)
            }
            other => {
                let from = other.state().label();
                *slot = other;
                Err(RemediaError::invalid_transition(from, "confirm"))
            }
        }
    }

    /// Closes the session unconditionally, from any state.
    ///
    /// Stops any open stream, discards any frozen frame, clears any error.
    /// Idempotent.
    pub async fn close(&self) {
        let mut slot = self.slot.write().await;
        if !matches!(&*slot, Slot::Closed) {
            debug!(target: "remedia::camera", from = slot.state().label(), "closed");
        }
        *slot = Slot::Closed;
    }

    pub async fn state(&self) -> CameraState {
        self.slot.read().await.state()
    }

    /// The lens currently (or about to be) in use.
    pub async fn facing(&self) -> Option<Facing> {
        match &*self.slot.read().await {
            Slot::Acquiring { facing } => Some(*facing),
            Slot::Live { stream } => Some(stream.facing()),
            Slot::Frozen { stream, .. } => Some(stream.facing()),
            _ => None,
        }
    }

    /// The frozen frame awaiting confirm/retake.
    pub async fn frozen_frame(&self) -> Option<ImageStill> {
        match &*self.slot.read().await {
            Slot::Frozen { snapshot, .. } => Some(snapshot.clone()),
            _ => None,
        }
    }
}

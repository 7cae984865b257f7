//! Capture flows: voice and still-image acquisition wired into the draft.
//!
//! The controllers in `remedia-media` know nothing about the composer; this
//! use case adds the cross-cutting rules. A voice recording may not start
//! while an image is staged, and finishing a recording stages the clip and
//! immediately sends it: for voice messages, stopping the recording is the
//! send trigger.

use tracing::debug;

use remedia_core::error::{RemediaError, Result};
use remedia_core::media::BlobId;
use remedia_media::camera::CameraController;
use remedia_media::device::Facing;
use remedia_media::recorder::AudioRecorder;

use crate::orchestrator::{ChatOrchestrator, ExchangeOutcome};

/// Use case for acquiring media and handing it to the draft.
///
/// # Responsibilities
///
/// - Enforcing draft exclusivity before a recording starts
/// - Staging finished artifacts into the composer
/// - Triggering the send when a voice recording completes
///
/// # Thread Safety
///
/// Cheap to clone; clones share the underlying controllers and orchestrator.
#[derive(Clone)]
pub struct CaptureUseCase {
    recorder: AudioRecorder,
    camera: CameraController,
    orchestrator: ChatOrchestrator,
}

impl CaptureUseCase {
    pub fn new(
        recorder: AudioRecorder,
        camera: CameraController,
        orchestrator: ChatOrchestrator,
    ) -> Self {
        Self {
            recorder,
            camera,
            orchestrator,
        }
    }

    /// The audio capture controller, for state and elapsed-time display.
    pub fn recorder(&self) -> &AudioRecorder {
        &self.recorder
    }

    /// The camera controller, for state and preview display.
    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    /// Starts a voice recording.
    ///
    /// # Errors
    ///
    /// Returns [`RemediaError::MediaConflict`] when an image is staged (a
    /// draft carries an image or an audio clip, not both), or a device error
    /// when the microphone cannot be acquired.
    pub async fn begin_voice(&self) -> Result<()> {
        if self.orchestrator.composer().has_image().await {
            return Err(RemediaError::MediaConflict);
        }
        self.recorder.begin().await
    }

    /// Stops the recording, stages the clip, and sends the draft.
    ///
    /// Returns the exchange outcome, or `None` when another exchange is
    /// already in flight; the staged clip then waits in the composer for the
    /// next send.
    ///
    /// # Errors
    ///
    /// Propagates recorder finalization and staging failures; the draft is
    /// untouched in that case.
    pub async fn finish_voice(&self) -> Result<Option<ExchangeOutcome>> {
        let clip = self.recorder.end().await?;
        self.orchestrator.composer().stage_audio(clip).await?;
        debug!(
            target: "remedia::orchestrator",
            "voice recording finished, sending draft"
        );
        Ok(self.orchestrator.send().await)
    }

    /// Abandons an in-progress recording without producing an artifact.
    pub async fn cancel_voice(&self) {
        self.recorder.cancel().await;
    }

    /// Opens the camera for live preview.
    ///
    /// # Errors
    ///
    /// Returns a device error when the camera cannot be acquired, or an
    /// invalid-transition error when a capture surface is already open.
    pub async fn open_camera(&self, facing: Facing) -> Result<()> {
        self.camera.open(facing).await
    }

    /// Switches between front and rear cameras during preview.
    pub async fn switch_facing(&self) -> Result<Facing> {
        self.camera.switch_facing().await
    }

    /// Freezes the current preview frame.
    pub async fn capture_still(&self) -> Result<()> {
        self.camera.capture().await
    }

    /// Discards the frozen frame and resumes preview.
    pub async fn retake_still(&self) -> Result<()> {
        self.camera.retake().await
    }

    /// Confirms the frozen frame, closing the camera and staging the still
    /// into the draft. The image is sent with the next send, so text can
    /// still be added alongside it.
    ///
    /// # Errors
    ///
    /// Propagates camera failures, and [`RemediaError::MediaConflict`] when
    /// an audio clip is already staged (the snapshot is dropped).
    pub async fn confirm_still(&self) -> Result<BlobId> {
        let still = self.camera.confirm().await?;
        let blob = self.orchestrator.composer().stage_image(still).await?;
        debug!(
            target: "remedia::orchestrator",
            "camera still staged into draft"
        );
        Ok(blob)
    }

    /// Closes the camera surface, discarding any frozen frame.
    pub async fn close_camera(&self) {
        self.camera.close().await;
    }
}

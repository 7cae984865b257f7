//! Audio capture controller.
//!
//! Owns the microphone lifecycle for one recording at a time. Stopping a
//! recording finalizes the accumulated chunks into a single clip; callers
//! treat that completion as the send trigger for voice turns. A recording
//! that is canceled instead releases the device and produces nothing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use remedia_core::error::{DeviceKind, RemediaError, Result};
use remedia_core::event::{EventSender, PipelineEvent};
use remedia_core::media::AudioClip;

use crate::device::Microphone;

/// Observable recorder state.
///
/// `Error` is reachable only from `AcquiringDevice`; failures once recording
/// has started surface through [`AudioRecorder::end`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    AcquiringDevice,
    Recording,
    Stopping,
    Error,
}

impl RecorderState {
    /// Compact label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AcquiringDevice => "acquiring_device",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Error => "error",
        }
    }
}

struct Active {
    stream: Box<dyn crate::device::MicrophoneStream>,
    started_at: Instant,
    ticker: CancellationToken,
}

enum Slot {
    Idle,
    Acquiring,
    Recording(Active),
    Stopping,
    Errored(RemediaError),
}

impl Slot {
    fn state(&self) -> RecorderState {
        match self {
            Self::Idle => RecorderState::Idle,
            Self::Acquiring => RecorderState::AcquiringDevice,
            Self::Recording(_) => RecorderState::Recording,
            Self::Stopping => RecorderState::Stopping,
            Self::Errored(_) => RecorderState::Error,
        }
    }
}

/// Drives one audio capture session at a time against a [`Microphone`].
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct AudioRecorder {
    microphone: Arc<dyn Microphone>,
    events: Option<EventSender>,
    slot: Arc<RwLock<Slot>>,
}

impl AudioRecorder {
    pub fn new(microphone: Arc<dyn Microphone>) -> Self {
        Self {
            microphone,
            events: None,
            slot: Arc::new(RwLock::new(Slot::Idle)),
        }
    }

    /// Attaches an event sender for cosmetic recording ticks and capture
    /// failure notices.
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Starts a recording session.
    ///
    /// Suspends while the platform resolves microphone access. On refusal
    /// the recorder enters its error state and stays there until
    /// [`AudioRecorder::acknowledge_error`]. If the session was canceled
    /// while the permission prompt was open, the fresh stream is released
    /// immediately and the recorder stays idle.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless idle; otherwise the device error.
    pub async fn begin(&self) -> Result<()> {
        {
            let mut slot = self.slot.write().await;
            match &*slot {
                Slot::Idle => *slot = Slot::Acquiring,
                other => {
                    return Err(RemediaError::invalid_transition(
                        other.state().label(),
                        "begin",
                    ));
                }
            }
        }
        debug!(target: "remedia::recorder", "acquiring microphone");

        match self.microphone.open().await {
            Ok(stream) => {
                let mut slot = self.slot.write().await;
                if !matches!(&*slot, Slot::Acquiring) {
                    // Canceled while the prompt was up; drop the stream now.
                    debug!(target: "remedia::recorder", "acquisition canceled, releasing stream");
                    return Ok(());
                }
                let ticker = CancellationToken::new();
                if let Some(events) = self.events.clone() {
                    spawn_tick_task(events, ticker.clone());
                }
                *slot = Slot::Recording(Active {
                    stream,
                    started_at: Instant::now(),
                    ticker,
                });
                debug!(target: "remedia::recorder", "recording");
                Ok(())
            }
            Err(err) => {
                {
                    let mut slot = self.slot.write().await;
                    if matches!(&*slot, Slot::Acquiring) {
                        *slot = Slot::Errored(err.clone());
                    }
                }
                warn!(
                    target: "remedia::recorder",
                    error = %err,
                    "microphone acquisition failed"
                );
                self.emit(PipelineEvent::CaptureFailed {
                    device: DeviceKind::Microphone,
                    summary: err.user_summary(),
                });
                Err(err)
            }
        }
    }

    /// Stops the recording and finalizes it into a clip.
    ///
    /// The hardware stream is released on both the success and the failure
    /// path. The returned clip is the voice-send trigger: callers stage it
    /// and dispatch in their completion handling.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless currently recording; otherwise the
    /// finalize error from the device.
    pub async fn end(&self) -> Result<AudioClip> {
        let active = {
            let mut slot = self.slot.write().await;
            match std::mem::replace(&mut *slot, Slot::Stopping) {
                Slot::Recording(active) => active,
                other => {
                    let from = other.state().label();
                    *slot = other;
                    return Err(RemediaError::invalid_transition(from, "end"));
                }
            }
        };
        active.ticker.cancel();
        let elapsed = active.started_at.elapsed();

        let finished = active.stream.finish();
        let mut slot = self.slot.write().await;
        *slot = Slot::Idle;
        drop(slot);

        match finished {
            Ok(mut clip) => {
                if clip.duration.is_none() {
                    clip.duration = Some(elapsed);
                }
                debug!(
                    target: "remedia::recorder",
                    bytes = clip.bytes.len(),
                    secs = elapsed.as_secs(),
                    "recording finalized"
                );
                Ok(clip)
            }
            Err(err) => {
                warn!(target: "remedia::recorder", error = %err, "finalize failed");
                Err(err)
            }
        }
    }

    /// Abandons the in-progress session without producing an artifact.
    ///
    /// Safe to call in any state; an error display state is left for
    /// [`AudioRecorder::acknowledge_error`].
    pub async fn cancel(&self) {
        let mut slot = self.slot.write().await;
        match &*slot {
            Slot::Recording(_) => {
                if let Slot::Recording(active) = std::mem::replace(&mut *slot, Slot::Idle) {
                    active.ticker.cancel();
                    debug!(target: "remedia::recorder", "recording canceled");
                    // active.stream drops here, releasing the device
                }
            }
            Slot::Acquiring => {
                *slot = Slot::Idle;
                debug!(target: "remedia::recorder", "acquisition canceled");
            }
            _ => {}
        }
    }

    /// Clears the error display state, returning the recorder to idle.
    ///
    /// Returns the error that was on display, if any.
    pub async fn acknowledge_error(&self) -> Option<RemediaError> {
        let mut slot = self.slot.write().await;
        if matches!(&*slot, Slot::Errored(_)) {
            if let Slot::Errored(err) = std::mem::replace(&mut *slot, Slot::Idle) {
                return Some(err);
            }
        }
        None
    }

    pub async fn state(&self) -> RecorderState {
        self.slot.read().await.state()
    }

    /// Wall-clock time since recording started. Display only.
    pub async fn elapsed(&self) -> Option<Duration> {
        match &*self.slot.read().await {
            Slot::Recording(active) => Some(active.started_at.elapsed()),
            _ => None,
        }
    }

    /// Bytes accumulated so far. Display only.
    pub async fn bytes_captured(&self) -> usize {
        match &*self.slot.read().await {
            Slot::Recording(active) => active.stream.bytes_captured(),
            _ => 0,
        }
    }
}

/// Emits a once-per-second counter while recording. The tick is cosmetic:
/// it never gates stopping or sending, and it stops on cancel or when the
/// receiver goes away.
fn spawn_tick_task(events: EventSender, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.tick().await; // consume the immediate tick
        let mut seconds = 0u64;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    seconds += 1;
                    if events.send(PipelineEvent::RecordingTick { seconds }).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimMicrophone;
    use remedia_core::event::event_channel;

    #[tokio::test]
    async fn test_begin_end_produces_clip_and_releases() {
        let mic = SimMicrophone::granting();
        let counters = mic.counters();
        let recorder = AudioRecorder::new(Arc::new(mic));

        assert_eq!(recorder.state().await, RecorderState::Idle);
        recorder.begin().await.unwrap();
        assert_eq!(recorder.state().await, RecorderState::Recording);
        assert!(recorder.elapsed().await.is_some());
        assert!(recorder.bytes_captured().await > 0);

        let clip = recorder.end().await.unwrap();
        assert_eq!(recorder.state().await, RecorderState::Idle);
        assert_eq!(clip.mime, "audio/wav");
        assert!(clip.duration.is_some());
        assert!(counters.balanced());
    }

    #[tokio::test]
    async fn test_end_without_begin_is_rejected() {
        let recorder = AudioRecorder::new(Arc::new(SimMicrophone::granting()));
        let err = recorder.end().await.unwrap_err();
        assert!(matches!(err, RemediaError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_begin_while_recording_is_rejected() {
        let recorder = AudioRecorder::new(Arc::new(SimMicrophone::granting()));
        recorder.begin().await.unwrap();
        let err = recorder.begin().await.unwrap_err();
        assert!(matches!(err, RemediaError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_denied_permission_enters_error_state() {
        let mic = SimMicrophone::denying();
        let counters = mic.counters();
        let (tx, mut rx) = event_channel();
        let recorder = AudioRecorder::new(Arc::new(mic)).with_event_sender(tx);

        let err = recorder.begin().await.unwrap_err();
        assert!(err.is_permission_denied());
        assert_eq!(recorder.state().await, RecorderState::Error);
        assert_eq!(counters.acquired(), 0);

        // One inline failure notice, nothing else
        assert!(matches!(
            rx.try_recv().unwrap(),
            PipelineEvent::CaptureFailed {
                device: DeviceKind::Microphone,
                ..
            }
        ));

        let stored = recorder.acknowledge_error().await.unwrap();
        assert!(stored.is_permission_denied());
        assert_eq!(recorder.state().await, RecorderState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_releases_without_artifact() {
        let mic = SimMicrophone::granting();
        let counters = mic.counters();
        let recorder = AudioRecorder::new(Arc::new(mic));

        recorder.begin().await.unwrap();
        recorder.cancel().await;

        assert_eq!(recorder.state().await, RecorderState::Idle);
        assert!(counters.balanced());
        // A canceled session leaves nothing to end
        assert!(recorder.end().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_events_are_emitted_each_second() {
        let (tx, mut rx) = event_channel();
        let recorder =
            AudioRecorder::new(Arc::new(SimMicrophone::granting())).with_event_sender(tx);
        recorder.begin().await.unwrap();

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(
            rx.try_recv().unwrap(),
            PipelineEvent::RecordingTick { seconds: 1 }
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(
            rx.try_recv().unwrap(),
            PipelineEvent::RecordingTick { seconds: 2 }
        );

        recorder.end().await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }
}

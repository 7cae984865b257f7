//! Playback controller.
//!
//! Wraps one loaded clip behind play/pause, pointer-driven seeking, and
//! end-of-clip handling. Every message bubble owns its own controller;
//! instances never coordinate. Position is polled through [`status`] and is
//! eventually consistent with the backend clock.
//!
//! [`status`]: PlaybackController::status

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::device::AudioSink;

/// Observable playback state.
///
/// `Ended` is functionally paused at position zero; it exists so the UI can
/// show a replay affordance instead of a pause bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Paused,
    Playing,
    Ended,
}

/// A point-in-time view of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub position: Duration,
    /// `None` until the backend learns the clip's metadata; displays fall
    /// back to 0:00 rather than erroring.
    pub duration: Option<Duration>,
}

struct Inner {
    sink: Box<dyn AudioSink>,
    state: PlaybackState,
}

impl Inner {
    /// Folds a naturally-finished clip into the `Ended` state, with the
    /// playhead reset to the start for the next run.
    fn sync_ended(&mut self) {
        if self.state == PlaybackState::Playing && self.sink.ended() {
            self.sink.seek(Duration::ZERO);
            self.state = PlaybackState::Ended;
        }
    }
}

/// Drives one clip through a backend [`AudioSink`].
///
/// Cheap to clone; clones share the same clip.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<Mutex<Inner>>,
}

impl PlaybackController {
    /// Wraps a sink, initially paused at position zero.
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sink,
                state: PlaybackState::Paused,
            })),
        }
    }

    /// Wraps a sink and attempts to start playback immediately.
    ///
    /// A backend refusal (platform autoplay policy) is silent: the
    /// controller simply stays paused.
    pub fn autoplay(mut sink: Box<dyn AudioSink>) -> Self {
        let state = if sink.play() {
            PlaybackState::Playing
        } else {
            debug!(target: "remedia::playback", "autoplay rejected, staying paused");
            PlaybackState::Paused
        };
        Self {
            inner: Arc::new(Mutex::new(Inner { sink, state })),
        }
    }

    /// Flips between playing and paused. From `Ended`, restarts at zero.
    pub async fn toggle(&self) {
        let mut inner = self.inner.lock().await;
        inner.sync_ended();
        match inner.state {
            PlaybackState::Playing => {
                inner.sink.pause();
                inner.state = PlaybackState::Paused;
            }
            PlaybackState::Paused => {
                if inner.sink.play() {
                    inner.state = PlaybackState::Playing;
                } else {
                    debug!(target: "remedia::playback", "play rejected, staying paused");
                }
            }
            PlaybackState::Ended => {
                inner.sink.seek(Duration::ZERO);
                if inner.sink.play() {
                    inner.state = PlaybackState::Playing;
                } else {
                    inner.state = PlaybackState::Paused;
                }
            }
        }
    }

    /// Moves the playhead to `ratio` of the clip's duration.
    ///
    /// Out-of-range ratios clamp to [0, 1]. A no-op while the duration is
    /// unknown or zero. Scrubbing out of `Ended` leaves the clip paused at
    /// the new position; scrubbing while playing keeps playing.
    pub async fn seek_ratio(&self, ratio: f64) {
        let mut inner = self.inner.lock().await;
        inner.sync_ended();
        let Some(duration) = inner.sink.duration() else {
            return;
        };
        if duration.is_zero() {
            return;
        }
        let target = duration.mul_f64(ratio.clamp(0.0, 1.0));
        inner.sink.seek(target);
        if inner.state == PlaybackState::Ended {
            inner.state = PlaybackState::Paused;
        }
    }

    /// Polls the current state, position, and duration.
    pub async fn status(&self) -> PlaybackStatus {
        let mut inner = self.inner.lock().await;
        inner.sync_ended();
        let position = match inner.state {
            PlaybackState::Ended => Duration::ZERO,
            _ => inner.sink.position(),
        };
        PlaybackStatus {
            state: inner.state,
            position,
            duration: inner.sink.duration(),
        }
    }

    pub async fn state(&self) -> PlaybackState {
        self.status().await.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimSink;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[tokio::test]
    async fn test_toggle_flips_between_paused_and_playing() {
        let sink = SimSink::with_duration(secs(10));
        let controller = PlaybackController::new(Box::new(sink.clone()));

        assert_eq!(controller.state().await, PlaybackState::Paused);
        controller.toggle().await;
        assert_eq!(controller.state().await, PlaybackState::Playing);
        assert!(sink.is_playing());

        controller.toggle().await;
        assert_eq!(controller.state().await, PlaybackState::Paused);
        assert!(!sink.is_playing());
    }

    #[tokio::test]
    async fn test_seek_clamps_out_of_range_ratios() {
        let sink = SimSink::with_duration(secs(10));
        let controller = PlaybackController::new(Box::new(sink.clone()));

        controller.seek_ratio(1.5).await;
        assert_eq!(controller.status().await.position, secs(10));

        controller.seek_ratio(-0.3).await;
        assert_eq!(controller.status().await.position, Duration::ZERO);

        controller.seek_ratio(0.5).await;
        assert_eq!(controller.status().await.position, secs(5));
    }

    #[tokio::test]
    async fn test_seek_is_noop_without_duration() {
        let sink = SimSink::unknown_duration();
        let controller = PlaybackController::new(Box::new(sink.clone()));

        controller.seek_ratio(0.7).await;
        let status = controller.status().await;
        assert_eq!(status.position, Duration::ZERO);
        assert_eq!(status.duration, None);

        // Metadata arriving later makes seeking effective
        sink.set_duration(secs(4));
        controller.seek_ratio(0.5).await;
        assert_eq!(controller.status().await.position, secs(2));
    }

    #[tokio::test]
    async fn test_natural_end_resets_to_start() {
        let sink = SimSink::with_duration(secs(2));
        let controller = PlaybackController::new(Box::new(sink.clone()));

        controller.toggle().await;
        sink.advance(secs(3));

        let status = controller.status().await;
        assert_eq!(status.state, PlaybackState::Ended);
        assert_eq!(status.position, Duration::ZERO);

        // Toggling out of Ended replays from the start
        controller.toggle().await;
        let status = controller.status().await;
        assert_eq!(status.state, PlaybackState::Playing);
        assert_eq!(status.position, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_autoplay_rejection_is_silent() {
        let sink = SimSink::with_duration(secs(5)).rejecting_plays(1);
        let controller = PlaybackController::autoplay(Box::new(sink.clone()));

        assert_eq!(controller.state().await, PlaybackState::Paused);

        // A later user gesture succeeds
        controller.toggle().await;
        assert_eq!(controller.state().await, PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_instances_are_independent() {
        let sink_a = SimSink::with_duration(secs(5));
        let sink_b = SimSink::with_duration(secs(5));
        let a = PlaybackController::autoplay(Box::new(sink_a.clone()));
        let b = PlaybackController::autoplay(Box::new(sink_b.clone()));

        a.toggle().await;
        assert_eq!(a.state().await, PlaybackState::Paused);
        assert_eq!(b.state().await, PlaybackState::Playing);
        assert!(sink_b.is_playing());
    }
}

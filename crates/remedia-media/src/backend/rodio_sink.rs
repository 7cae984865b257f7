//! Hardware playback backend over rodio.
//!
//! rodio's output stream is not `Send`, so each loaded clip runs on a
//! dedicated thread that owns the stream and sink, takes commands over a
//! channel, and publishes position snapshots. The handle side implements
//! [`AudioSink`] with eventually-consistent reads from those snapshots.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use rodio::{Decoder, OutputStream, Sink, Source};
use tracing::warn;

use remedia_core::error::{DeviceKind, RemediaError, Result};

use crate::device::AudioSink;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Clip bytes shared with the media registry, readable by the decoder.
struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

enum Command {
    Play,
    Pause,
    Seek(Duration),
    Shutdown,
}

#[derive(Default)]
struct Snapshots {
    position: Mutex<Duration>,
    duration: Mutex<Option<Duration>>,
    ended: AtomicBool,
}

/// One clip loaded into the system audio output.
///
/// Construction performs a blocking handshake with the audio thread; in an
/// async host, wrap it in `spawn_blocking`.
pub struct RodioSink {
    tx: Sender<Command>,
    shared: Arc<Snapshots>,
    thread: Option<JoinHandle<()>>,
}

impl RodioSink {
    /// Decodes `bytes` and prepares a paused sink at position zero.
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` when no output device exists, `Decode` when the
    /// clip bytes are not decodable audio.
    pub fn try_new(bytes: Arc<Vec<u8>>) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let shared = Arc::new(Snapshots::default());
        let thread_shared = shared.clone();

        let thread = std::thread::Builder::new()
            .name("remedia-playback".into())
            .spawn(move || run_audio_thread(bytes, rx, ready_tx, thread_shared))
            .map_err(|e| {
                RemediaError::device_unavailable(
                    DeviceKind::Speaker,
                    format!("playback thread: {e}"),
                )
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                tx,
                shared,
                thread: Some(thread),
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(RemediaError::internal("playback thread exited during setup")),
        }
    }
}

fn run_audio_thread(
    bytes: Arc<Vec<u8>>,
    rx: mpsc::Receiver<Command>,
    ready_tx: Sender<Result<()>>,
    shared: Arc<Snapshots>,
) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready_tx.send(Err(RemediaError::device_unavailable(
                DeviceKind::Speaker,
                format!("audio output: {e}"),
            )));
            return;
        }
    };
    let sink = match Sink::try_new(&handle) {
        Ok(sink) => sink,
        Err(e) => {
            let _ = ready_tx.send(Err(RemediaError::device_unavailable(
                DeviceKind::Speaker,
                format!("audio sink: {e}"),
            )));
            return;
        }
    };
    sink.pause();

    let fresh_decoder = |bytes: &Arc<Vec<u8>>| -> Result<Decoder<Cursor<SharedBytes>>> {
        Decoder::new(Cursor::new(SharedBytes(bytes.clone())))
            .map_err(|e| RemediaError::decode("audio clip", e.to_string()))
    };

    match fresh_decoder(&bytes) {
        Ok(decoder) => {
            if let Ok(mut duration) = shared.duration.lock() {
                *duration = decoder.total_duration();
            }
            sink.append(decoder);
            let _ = ready_tx.send(Ok(()));
        }
        Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
        }
    }

    loop {
        // Re-arm with a fresh decoder when a command arrives after the
        // previous source drained.
        let rearm = |sink: &Sink| {
            if sink.empty() {
                match fresh_decoder(&bytes) {
                    Ok(decoder) => sink.append(decoder),
                    Err(err) => {
                        warn!(target: "remedia::playback", error = %err, "re-decode failed")
                    }
                }
            }
        };

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Command::Play) => {
                rearm(&sink);
                sink.play();
            }
            Ok(Command::Pause) => sink.pause(),
            Ok(Command::Seek(position)) => {
                rearm(&sink);
                if let Err(e) = sink.try_seek(position) {
                    warn!(target: "remedia::playback", error = ?e, "seek failed");
                }
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        if let Ok(mut position) = shared.position.lock() {
            *position = sink.get_pos();
        }
        shared.ended.store(sink.empty(), Ordering::SeqCst);
    }
    // sink and _stream drop here, releasing the output device
}

impl AudioSink for RodioSink {
    fn play(&mut self) -> bool {
        // Desktop output has no autoplay policy; refusal cannot happen.
        self.tx.send(Command::Play).is_ok()
    }

    fn pause(&mut self) {
        let _ = self.tx.send(Command::Pause);
    }

    fn seek(&mut self, position: Duration) {
        self.shared.ended.store(false, Ordering::SeqCst);
        let _ = self.tx.send(Command::Seek(position));
    }

    fn position(&self) -> Duration {
        self.shared
            .position
            .lock()
            .map(|position| *position)
            .unwrap_or_default()
    }

    fn duration(&self) -> Option<Duration> {
        self.shared
            .duration
            .lock()
            .map(|duration| *duration)
            .unwrap_or_default()
    }

    fn ended(&self) -> bool {
        self.shared.ended.load(Ordering::SeqCst)
    }
}

impl Drop for RodioSink {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

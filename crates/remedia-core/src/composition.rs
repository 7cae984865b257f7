//! Composition state: the user's unsent draft.
//!
//! A draft carries at most one text string, one image artifact, and one
//! audio artifact, with image and audio mutually exclusive per send. Staged
//! media lives in the [`MediaRegistry`](crate::media::MediaRegistry); the
//! composer releases handles whenever a slot is superseded or the draft is
//! discarded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::error::{RemediaError, Result};
use crate::media::{AudioClip, BlobId, ImageStill, MediaRegistry};
use crate::message::{InputKind, IMAGE_PLACEHOLDER, VOICE_PLACEHOLDER};

/// An image artifact staged for the next send.
#[derive(Debug, Clone)]
pub struct StagedImage {
    pub blob: BlobId,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub filename: String,
}

/// An audio artifact staged for the next send.
#[derive(Debug, Clone)]
pub struct StagedAudio {
    pub blob: BlobId,
    pub mime: String,
    pub duration: Option<Duration>,
    pub filename: String,
}

/// A complete draft yielded by [`Composer::take`], ready to send.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub text: Option<String>,
    pub image: Option<StagedImage>,
    pub audio: Option<StagedAudio>,
}

impl Draft {
    /// The input kind this draft produces.
    pub fn input_kind(&self) -> InputKind {
        InputKind::derive(self.audio.is_some(), self.image.is_some())
    }

    /// Display content for the optimistic user turn: the literal text, or
    /// the fixed placeholder when media has no accompanying text.
    pub fn display_content(&self) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        if self.audio.is_some() {
            VOICE_PLACEHOLDER.to_string()
        } else {
            IMAGE_PLACEHOLDER.to_string()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.image.is_none() && self.audio.is_none()
    }
}

#[derive(Default)]
struct Slots {
    text: String,
    image: Option<StagedImage>,
    audio: Option<StagedAudio>,
}

/// Holds the in-progress message prior to send.
///
/// Cheap to clone; clones share the same draft.
#[derive(Clone)]
pub struct Composer {
    registry: MediaRegistry,
    slots: Arc<RwLock<Slots>>,
}

impl Composer {
    pub fn new(registry: MediaRegistry) -> Self {
        Self {
            registry,
            slots: Arc::new(RwLock::new(Slots::default())),
        }
    }

    /// The registry staged media is held in.
    pub fn registry(&self) -> &MediaRegistry {
        &self.registry
    }

    pub async fn set_text(&self, text: impl Into<String>) {
        self.slots.write().await.text = text.into();
    }

    pub async fn text(&self) -> String {
        self.slots.read().await.text.clone()
    }

    /// Stages a still image for the next send.
    ///
    /// Rejected while an audio clip is staged. A previously staged image is
    /// superseded and its blob released.
    ///
    /// # Errors
    ///
    /// Returns [`RemediaError::MediaConflict`] when audio is staged.
    pub async fn stage_image(&self, still: ImageStill) -> Result<BlobId> {
        {
            let slots = self.slots.read().await;
            if slots.audio.is_some() {
                return Err(RemediaError::MediaConflict);
            }
        }
        let blob = self.registry.register(still.bytes, still.mime.clone()).await;
        let staged = StagedImage {
            blob,
            mime: still.mime,
            width: still.width,
            height: still.height,
            filename: still.filename,
        };
        let old = {
            let mut slots = self.slots.write().await;
            slots.image.replace(staged)
        };
        if let Some(old) = old {
            self.registry.release(old.blob).await;
        }
        Ok(blob)
    }

    /// Stages a recorded clip for the next send.
    ///
    /// Rejected while an image is staged. A previously staged clip is
    /// superseded and its blob released.
    ///
    /// # Errors
    ///
    /// Returns [`RemediaError::MediaConflict`] when an image is staged.
    pub async fn stage_audio(&self, clip: AudioClip) -> Result<BlobId> {
        {
            let slots = self.slots.read().await;
            if slots.image.is_some() {
                return Err(RemediaError::MediaConflict);
            }
        }
        let blob = self.registry.register(clip.bytes, clip.mime.clone()).await;
        let staged = StagedAudio {
            blob,
            mime: clip.mime,
            duration: clip.duration,
            filename: clip.filename,
        };
        let old = {
            let mut slots = self.slots.write().await;
            slots.audio.replace(staged)
        };
        if let Some(old) = old {
            self.registry.release(old.blob).await;
        }
        Ok(blob)
    }

    /// Unstages the image, releasing its blob.
    pub async fn remove_image(&self) {
        let old = self.slots.write().await.image.take();
        if let Some(old) = old {
            self.registry.release(old.blob).await;
        }
    }

    /// Unstages the audio clip, releasing its blob.
    pub async fn remove_audio(&self) {
        let old = self.slots.write().await.audio.take();
        if let Some(old) = old {
            self.registry.release(old.blob).await;
        }
    }

    pub async fn has_image(&self) -> bool {
        self.slots.read().await.image.is_some()
    }

    pub async fn has_audio(&self) -> bool {
        self.slots.read().await.audio.is_some()
    }

    /// True when the draft carries anything sendable.
    pub async fn can_send(&self) -> bool {
        let slots = self.slots.read().await;
        !slots.text.trim().is_empty() || slots.image.is_some() || slots.audio.is_some()
    }

    /// Atomically yields the draft and resets the composer.
    ///
    /// Returns `None` when there is nothing to send. Staged blobs transfer
    /// to the caller, who owns their release from here on.
    pub async fn take(&self) -> Option<Draft> {
        let mut slots = self.slots.write().await;
        let text = slots.text.trim().to_string();
        if text.is_empty() && slots.image.is_none() && slots.audio.is_none() {
            return None;
        }
        slots.text.clear();
        Some(Draft {
            text: (!text.is_empty()).then_some(text),
            image: slots.image.take(),
            audio: slots.audio.take(),
        })
    }

    /// Resets the composer and releases any staged blobs.
    pub async fn discard(&self) {
        let (image, audio) = {
            let mut slots = self.slots.write().await;
            slots.text.clear();
            (slots.image.take(), slots.audio.take())
        };
        if let Some(image) = image {
            self.registry.release(image.blob).await;
        }
        if let Some(audio) = audio {
            self.registry.release(audio.blob).await;
        }
    }
}

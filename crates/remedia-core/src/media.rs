//! Ephemeral media handling.
//!
//! Captured clips and decoded stills live in memory only for as long as
//! something displays them. The [`MediaRegistry`] is an explicit table of
//! those blobs; owners release entries when a draft is discarded, an
//! artifact is superseded, or history is cleared, so the table never grows
//! unbounded across a long session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Wire filename for recorded voice clips.
pub const VOICE_WIRE_FILENAME: &str = "voice-message.wav";

/// Wire filename for confirmed camera stills.
pub const STILL_WIRE_FILENAME: &str = "camera-still.png";

/// Identifier of a blob held by a [`MediaRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobId(Uuid);

impl BlobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to media attached to a message.
///
/// `Remote` points at a fetchable locator (a resolved streaming URL);
/// `Blob` points into the local [`MediaRegistry`] and is only valid while
/// the registry still holds the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaRef {
    Remote { url: String },
    Blob { id: BlobId },
}

impl MediaRef {
    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote { url: url.into() }
    }

    pub fn blob(id: BlobId) -> Self {
        Self::Blob { id }
    }

    /// The blob id, if this reference is registry-backed.
    pub fn blob_id(&self) -> Option<BlobId> {
        match self {
            Self::Blob { id } => Some(*id),
            Self::Remote { .. } => None,
        }
    }
}

/// A registry entry: shared bytes plus their mime type.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Arc<Vec<u8>>,
    pub mime: String,
}

/// Table of in-memory media blobs addressed by [`BlobId`].
///
/// Cheap to clone; clones share the same table. Release is explicit rather
/// than reference-counted so tests can assert the table returns to its
/// baseline after every discard, supersede, and clear.
#[derive(Clone, Default)]
pub struct MediaRegistry {
    blobs: Arc<RwLock<HashMap<BlobId, StoredBlob>>>,
}

impl MediaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores bytes and returns the new handle.
    pub async fn register(&self, bytes: Vec<u8>, mime: impl Into<String>) -> BlobId {
        let id = BlobId::new();
        let blob = StoredBlob {
            bytes: Arc::new(bytes),
            mime: mime.into(),
        };
        self.blobs.write().await.insert(id, blob);
        id
    }

    /// Looks up a blob. The returned bytes are shared, not copied.
    pub async fn get(&self, id: BlobId) -> Option<StoredBlob> {
        self.blobs.read().await.get(&id).cloned()
    }

    /// Drops a blob. Returns false when the handle was already released.
    pub async fn release(&self, id: BlobId) -> bool {
        self.blobs.write().await.remove(&id).is_some()
    }

    /// Releases every registry-backed reference in `refs`. Remote references
    /// are ignored.
    pub async fn release_refs<'a>(&self, refs: impl IntoIterator<Item = &'a MediaRef>) {
        let mut blobs = self.blobs.write().await;
        for media_ref in refs {
            if let Some(id) = media_ref.blob_id() {
                blobs.remove(&id);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

/// A finished audio recording handed from the recorder to the composer.
///
/// Bytes are a complete encoded container, ready to upload as-is.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub duration: Option<Duration>,
    pub filename: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
            duration: None,
            filename: VOICE_WIRE_FILENAME.to_string(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// A confirmed camera still handed from the camera controller to the
/// composer. Bytes are an encoded image (PNG or JPEG).
#[derive(Debug, Clone)]
pub struct ImageStill {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub filename: String,
}

impl ImageStill {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            mime: mime.into(),
            width,
            height,
            filename: STILL_WIRE_FILENAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_get_release() {
        let registry = MediaRegistry::new();
        let id = registry.register(vec![1, 2, 3], "audio/wav").await;

        let blob = registry.get(id).await.unwrap();
        assert_eq!(blob.bytes.as_slice(), &[1, 2, 3]);
        assert_eq!(blob.mime, "audio/wav");

        assert!(registry.release(id).await);
        assert!(registry.get(id).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let registry = MediaRegistry::new();
        let id = registry.register(vec![0], "image/png").await;

        assert!(registry.release(id).await);
        assert!(!registry.release(id).await);
    }

    #[tokio::test]
    async fn test_release_refs_skips_remote() {
        let registry = MediaRegistry::new();
        let id = registry.register(vec![9], "image/png").await;
        let refs = vec![
            MediaRef::remote("http://example.test/a.mp3"),
            MediaRef::blob(id),
        ];

        registry.release_refs(refs.iter()).await;
        assert!(registry.is_empty().await);
    }
}

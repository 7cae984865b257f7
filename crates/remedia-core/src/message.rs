//! Conversation message types.
//!
//! This module contains types for representing turns in a conversation,
//! including roles, input kinds, and media references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::media::MediaRef;

/// Placeholder content for a voice turn until its transcription arrives.
pub const VOICE_PLACEHOLDER: &str = "voice message";

/// Placeholder content for an image turn with no accompanying text.
pub const IMAGE_PLACEHOLDER: &str = "image";

/// Locally-assigned message identifier.
///
/// Ids are generated at creation time, never by the server, so a turn can be
/// referenced (and patched) before its network round-trip resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
}

/// How a turn was produced, derived from its attachments at creation time.
///
/// The wire form (`input_type`) is the lowercase variant name; unknown or
/// missing wire values coerce to `Text` via [`InputKind::from_wire`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InputKind {
    #[default]
    Text,
    Voice,
    Image,
    Multimodal,
}

impl InputKind {
    /// Derives the kind from what the draft actually carried.
    ///
    /// Media wins over accompanying text; audio and image together count as
    /// multimodal even though the composer normally forbids that pairing.
    pub fn derive(has_audio: bool, has_image: bool) -> Self {
        match (has_audio, has_image) {
            (true, true) => Self::Multimodal,
            (true, false) => Self::Voice,
            (false, true) => Self::Image,
            (false, false) => Self::Text,
        }
    }

    /// Parses a wire `input_type`, coercing unknown values to `Text`.
    pub fn from_wire(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

/// A single turn in the conversation history.
///
/// Only `content`, `transcription_text`, and `audio_ref` may change after a
/// message is appended, and only through the store's patch operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Locally-generated identifier, immutable once assigned.
    pub id: MessageId,
    /// The role of the message sender.
    pub role: Role,
    /// Display text; a placeholder for media turns until reconciled.
    pub content: String,
    /// How the turn was produced, fixed at creation.
    pub input_kind: InputKind,
    /// Attached still image, if any.
    pub image_ref: Option<MediaRef>,
    /// Attached audio (recorded clip or synthesized speech), if any.
    pub audio_ref: Option<MediaRef>,
    /// Capability names the assistant invoked for this turn (display only).
    pub tools_invoked: Vec<String>,
    /// Assistant-provided classification of the turn.
    pub intent_label: Option<String>,
    /// Transcription of the turn's audio, populated asynchronously.
    pub transcription_text: Option<String>,
    /// Whether playback of the attached audio starts unprompted.
    pub auto_play: bool,
    /// Creation timestamp; store order follows append order, not this field.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a user turn.
    pub fn user(content: impl Into<String>, input_kind: InputKind) -> Self {
        Self::new(Role::User, content, input_kind)
    }

    /// Creates an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, InputKind::Text)
    }

    fn new(role: Role, content: impl Into<String>, input_kind: InputKind) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            input_kind,
            image_ref: None,
            audio_ref: None,
            tools_invoked: Vec::new(),
            intent_label: None,
            transcription_text: None,
            auto_play: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_image_ref(mut self, image_ref: MediaRef) -> Self {
        self.image_ref = Some(image_ref);
        self
    }

    pub fn with_audio_ref(mut self, audio_ref: MediaRef) -> Self {
        self.audio_ref = Some(audio_ref);
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools_invoked = tools;
        self
    }

    pub fn with_intent(mut self, intent: Option<String>) -> Self {
        self.intent_label = intent;
        self
    }

    pub fn with_transcription(mut self, transcription: Option<String>) -> Self {
        self.transcription_text = transcription;
        self
    }

    pub fn with_auto_play(mut self, auto_play: bool) -> Self {
        self.auto_play = auto_play;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// True when this turn carries any media reference.
    pub fn has_media(&self) -> bool {
        self.image_ref.is_some() || self.audio_ref.is_some()
    }
}

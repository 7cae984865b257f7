//! Wire DTOs for the assistant service and their domain conversions.
//!
//! Conversions degrade instead of erroring: a malformed optional field is
//! logged and dropped so the turn still lands (only the required
//! `agent_response` can fail the exchange, and that failure happens at the
//! transport layer).

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use remedia_core::assistant::{AssistantReply, DecodedImage, HistoryTurn};
use remedia_core::message::{InputKind, Role};

/// Response body of the multimodal chat endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseDto {
    pub agent_response: String,
    pub transcription: Option<String>,
    pub audio_path: Option<String>,
    pub image_encoded: Option<EncodedImageDto>,
    pub tools_used: Option<Vec<String>>,
    pub intent: Option<String>,
    pub auto_play: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EncodedImageDto {
    pub base64: String,
}

/// One entry of the paginated history listing. The service JSON-encodes the
/// tools list into a string field.
#[derive(Debug, Deserialize)]
pub(crate) struct HistoryTurnDto {
    pub role: String,
    pub content: String,
    pub input_type: Option<String>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub tools: Option<String>,
    pub intent: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClearResponseDto {
    pub removed: u64,
}

impl ChatResponseDto {
    /// Reconciles the wire response into domain form against `base_url`.
    pub(crate) fn into_reply(self, base_url: &str) -> AssistantReply {
        AssistantReply {
            text: self.agent_response,
            transcription: self.transcription,
            audio_url: self
                .audio_path
                .as_deref()
                .and_then(|path| resolve_audio_url(base_url, path)),
            image: self.image_encoded.and_then(decode_image),
            tools_used: self.tools_used.unwrap_or_default(),
            intent: self.intent,
            auto_play: self.auto_play,
        }
    }
}

impl HistoryTurnDto {
    pub(crate) fn into_turn(self, base_url: &str) -> HistoryTurn {
        HistoryTurn {
            role: parse_role(&self.role),
            content: self.content,
            input_kind: self
                .input_type
                .as_deref()
                .map(InputKind::from_wire)
                .unwrap_or_default(),
            image_url: self.image_url,
            audio_url: self
                .audio_url
                .as_deref()
                .and_then(|path| resolve_audio_url(base_url, path)),
            tools: parse_tools(self.tools.as_deref()),
            intent: self.intent,
            created_at: self.created_at,
        }
    }
}

fn parse_role(raw: &str) -> Role {
    match raw {
        "user" => Role::User,
        _ => Role::Assistant,
    }
}

/// Converts a server-side audio path into a fetchable streaming URL by
/// stripping directory components and substituting the streaming endpoint.
/// Already-absolute URLs pass through unchanged.
pub(crate) fn resolve_audio_url(base_url: &str, path: &str) -> Option<String> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Some(path.to_string());
    }
    let file = path.rsplit(['/', '\\']).next().filter(|f| !f.is_empty())?;
    Some(format!(
        "{}/api/v1/chat/audio/{}",
        base_url.trim_end_matches('/'),
        file
    ))
}

/// Decodes a base64 image payload, sniffing the format for its mime type.
/// Malformed base64 or non-image bytes drop the field.
fn decode_image(encoded: EncodedImageDto) -> Option<DecodedImage> {
    let bytes = match BASE64_STANDARD.decode(encoded.base64.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(target: "remedia::client", error = %e, "image payload is not valid base64, dropping");
            return None;
        }
    };
    match image::guess_format(&bytes) {
        Ok(format) => Some(DecodedImage {
            bytes,
            mime: format.to_mime_type().to_string(),
        }),
        Err(e) => {
            warn!(target: "remedia::client", error = %e, "image payload is not a known image format, dropping");
            None
        }
    }
}

/// Parses the JSON-encoded tools list; malformed input yields an empty list.
fn parse_tools(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(tools) => tools,
        Err(e) => {
            warn!(target: "remedia::client", error = %e, "tools list is not valid JSON, ignoring");
            Vec::new()
        }
    }
}

//! Assistant gateway trait and exchange types.
//!
//! Defines the interface the orchestrator talks to the remote assistant
//! service through, decoupling exchange logic from the HTTP transport so
//! tests can drive it with in-memory gateways.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AssistantConfig;
use crate::error::Result;
use crate::message::{InputKind, Role};

/// Send-time preferences attached to one outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    /// Whether the service should synthesize speech for its reply.
    pub output_audio: bool,
    /// Speech synthesis provider id.
    pub tts_provider: String,
    /// Capability profile for the assistant.
    pub tool_choice: String,
}

impl SendOptions {
    /// The interactive chat profile from configuration.
    pub fn interactive(config: &AssistantConfig) -> Self {
        Self {
            output_audio: config.output_audio,
            tts_provider: config.tts_provider.clone(),
            tool_choice: config.tool_choice.clone(),
        }
    }

    /// The lightweight text-only profile: no synthesized speech.
    pub fn text_only(config: &AssistantConfig) -> Self {
        Self {
            output_audio: false,
            ..Self::interactive(config)
        }
    }
}

/// A binary part of an outgoing request. Bytes are shared with the media
/// registry, not copied.
#[derive(Debug, Clone)]
pub struct OutboundPart {
    pub bytes: Arc<Vec<u8>>,
    pub mime: String,
    pub filename: String,
}

/// One fully-assembled outgoing request.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub text: Option<String>,
    pub audio: Option<OutboundPart>,
    pub image: Option<OutboundPart>,
    pub options: SendOptions,
}

/// A still image decoded out of a response payload.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// The assistant's reply, already reconciled into domain form: the audio
/// locator is fetchable and the image is decoded bytes. Malformed optional
/// payloads were dropped during decoding, not surfaced as errors.
#[derive(Debug, Clone, Default)]
pub struct AssistantReply {
    pub text: String,
    pub transcription: Option<String>,
    pub audio_url: Option<String>,
    pub image: Option<DecodedImage>,
    pub tools_used: Vec<String>,
    pub intent: Option<String>,
    pub auto_play: Option<bool>,
}

/// One prior turn fetched from the remote history.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
    pub input_kind: InputKind,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub tools: Vec<String>,
    pub intent: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// An abstract gateway to the remote assistant service.
///
/// The HTTP client implements this in the interaction crate; tests use
/// in-memory mocks.
#[async_trait]
pub trait AssistantGateway: Send + Sync {
    /// Sends one multimodal request and returns the reconciled reply.
    ///
    /// # Errors
    ///
    /// Returns a send-path error (`NetworkUnreachable`, `RequestTimeout`,
    /// `Remote`) when the exchange fails; decode problems in optional
    /// response fields degrade inside the reply instead of erroring.
    async fn send(&self, outbound: OutboundMessage) -> Result<AssistantReply>;

    /// Fetches prior turns, oldest first.
    ///
    /// # Arguments
    ///
    /// * `limit` - Maximum number of turns to return
    /// * `offset` - Number of turns to skip from the start
    async fn history(&self, limit: usize, offset: usize) -> Result<Vec<HistoryTurn>>;

    /// Clears the remote history.
    ///
    /// # Returns
    ///
    /// The number of entries the service reports it removed.
    async fn clear_history(&self) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_only_profile_disables_audio() {
        let config = AssistantConfig::default();
        let options = SendOptions::text_only(&config);
        assert!(!options.output_audio);
        assert_eq!(options.tts_provider, config.tts_provider);
        assert_eq!(options.tool_choice, config.tool_choice);
    }
}

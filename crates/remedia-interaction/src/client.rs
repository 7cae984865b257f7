//! AssistantClient - HTTP implementation of the assistant gateway.
//!
//! Speaks the service's multimodal wire contract: one multipart POST per
//! exchange, a paginated history listing, and a destructive history clear.
//! Transport failures map onto the send-path error variants so the
//! orchestrator can turn them into a single chat-facing notice.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use remedia_core::assistant::{
    AssistantGateway, AssistantReply, HistoryTurn, OutboundMessage, OutboundPart,
};
use remedia_core::config::AssistantConfig;
use remedia_core::error::{RemediaError, Result};

use crate::dto::{ChatResponseDto, ClearResponseDto, HistoryTurnDto};

/// HTTP gateway to the assistant service.
#[derive(Clone)]
pub struct AssistantClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl AssistantClient {
    /// Creates a client for the service at `config.base_url`.
    pub fn new(config: &AssistantConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout(),
        }
    }

    /// The base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches synthesized speech bytes from a stream locator previously
    /// returned in a reply.
    ///
    /// # Errors
    ///
    /// Maps transport failures like [`AssistantGateway::send`] does.
    pub async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        debug!(target: "remedia::client", url, len = bytes.len(), "fetched audio stream");
        Ok(bytes.to_vec())
    }

    fn binary_part(part: &OutboundPart) -> Result<Part> {
        Part::bytes(part.bytes.to_vec())
            .file_name(part.filename.clone())
            .mime_str(&part.mime)
            .map_err(|e| RemediaError::internal(format!("invalid part mime {}: {e}", part.mime)))
    }
}

#[async_trait]
impl AssistantGateway for AssistantClient {
    async fn send(&self, outbound: OutboundMessage) -> Result<AssistantReply> {
        let mut form = Form::new();
        if let Some(text) = &outbound.text {
            form = form.text("text", text.clone());
        }
        if let Some(audio) = &outbound.audio {
            form = form.part("audio", Self::binary_part(audio)?);
        }
        if let Some(image) = &outbound.image {
            form = form.part("image", Self::binary_part(image)?);
        }
        form = form
            .text("output_audio", outbound.options.output_audio.to_string())
            .text("tts_provider", outbound.options.tts_provider.clone())
            .text("tool_choice", outbound.options.tool_choice.clone());

        debug!(
            target: "remedia::client",
            has_text = outbound.text.is_some(),
            has_audio = outbound.audio.is_some(),
            has_image = outbound.image.is_some(),
            "posting multimodal exchange"
        );

        let response = self
            .client
            .post(format!("{}/api/v1/chat", self.base_url))
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        let dto = response
            .json::<ChatResponseDto>()
            .await
            .map_err(transport_error)?;
        Ok(dto.into_reply(&self.base_url))
    }

    async fn history(&self, limit: usize, offset: usize) -> Result<Vec<HistoryTurn>> {
        let response = self
            .client
            .get(format!("{}/api/v1/chat/history", self.base_url))
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        let turns = response
            .json::<Vec<HistoryTurnDto>>()
            .await
            .map_err(transport_error)?;
        debug!(target: "remedia::client", count = turns.len(), "fetched history page");
        Ok(turns
            .into_iter()
            .map(|turn| turn.into_turn(&self.base_url))
            .collect())
    }

    async fn clear_history(&self) -> Result<u64> {
        let response = self
            .client
            .delete(format!("{}/api/v1/chat/history", self.base_url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        let cleared = response
            .json::<ClearResponseDto>()
            .await
            .map_err(transport_error)?;
        debug!(target: "remedia::client", removed = cleared.removed, "cleared remote history");
        Ok(cleared.removed)
    }
}

/// Maps a reqwest transport failure onto the send-path error taxonomy.
fn transport_error(err: reqwest::Error) -> RemediaError {
    if err.is_timeout() {
        RemediaError::RequestTimeout
    } else if err.is_decode() {
        RemediaError::decode("response body", err.to_string())
    } else {
        RemediaError::unreachable(err.to_string())
    }
}

/// Reads a non-success response into a `Remote` error, keeping the body as
/// the server's message.
async fn remote_error(response: reqwest::Response) -> RemediaError {
    let status = response.status();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    RemediaError::remote(status.as_u16(), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_base_url_is_normalized() {
        let config = AssistantConfig {
            base_url: "http://localhost:8080///".to_string(),
            ..AssistantConfig::default()
        };
        let client = AssistantClient::new(&config);
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_binary_part_rejects_malformed_mime() {
        let part = OutboundPart {
            bytes: Arc::new(vec![1, 2, 3]),
            mime: "not a mime".to_string(),
            filename: "clip.wav".to_string(),
        };
        assert!(AssistantClient::binary_part(&part).is_err());
    }
}

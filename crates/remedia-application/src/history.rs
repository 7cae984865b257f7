//! History synchronization between the remote service and the local store.

use std::sync::Arc;

use remedia_core::assistant::{AssistantGateway, HistoryTurn};
use remedia_core::error::Result;
use remedia_core::media::{MediaRef, MediaRegistry};
use remedia_core::message::{Message, Role};
use remedia_core::store::ConversationStore;

/// Use case for loading and clearing conversation history.
///
/// The local store mirrors the remote history: a load replaces the store
/// contents wholesale, and a clear empties it only after the remote clear
/// succeeded. Displaced messages get their registry blobs released so a long
/// session does not accumulate dead media.
#[derive(Clone)]
pub struct HistoryUseCase {
    /// Gateway to the remote assistant service
    gateway: Arc<dyn AssistantGateway>,
    /// Conversation log shared with the rendering layer
    store: ConversationStore,
    /// Registry holding blob-backed media references
    registry: MediaRegistry,
}

impl HistoryUseCase {
    pub fn new(
        gateway: Arc<dyn AssistantGateway>,
        store: ConversationStore,
        registry: MediaRegistry,
    ) -> Self {
        Self {
            gateway,
            store,
            registry,
        }
    }

    /// Fetches one page of prior turns and replaces the store with it.
    ///
    /// # Arguments
    ///
    /// * `limit` - Maximum number of turns to fetch
    /// * `offset` - Number of turns to skip from the start
    ///
    /// # Returns
    ///
    /// The number of turns loaded.
    ///
    /// # Errors
    ///
    /// Propagates send-path errors; the local store is untouched on failure.
    pub async fn load(&self, limit: usize, offset: usize) -> Result<usize> {
        let turns = self.gateway.history(limit, offset).await?;
        let messages: Vec<Message> = turns.into_iter().map(turn_to_message).collect();
        let count = messages.len();
        let displaced = self.store.replace_all(messages).await;
        self.release_media(&displaced).await;
        tracing::info!(
            target: "remedia::history",
            count,
            displaced = displaced.len(),
            "history loaded"
        );
        Ok(count)
    }

    /// Clears the remote history, then the local store.
    ///
    /// Clearing an already-empty history is not an error.
    ///
    /// # Returns
    ///
    /// The number of entries the remote service removed.
    ///
    /// # Errors
    ///
    /// Propagates send-path errors; on failure the local store keeps its
    /// contents so the user never sees an emptied view the service still has.
    pub async fn clear(&self) -> Result<u64> {
        let removed = self.gateway.clear_history().await?;
        let displaced = self.store.clear().await;
        self.release_media(&displaced).await;
        tracing::info!(
            target: "remedia::history",
            remote_removed = removed,
            local_removed = displaced.len(),
            "history cleared"
        );
        Ok(removed)
    }

    async fn release_media(&self, messages: &[Message]) {
        let refs = messages
            .iter()
            .flat_map(|m| m.image_ref.iter().chain(m.audio_ref.iter()));
        self.registry.release_refs(refs).await;
    }
}

/// Converts a fetched history turn into a store message. Remote locators
/// stay remote; nothing is downloaded during a history load.
fn turn_to_message(turn: HistoryTurn) -> Message {
    let mut message = match turn.role {
        Role::User => Message::user(turn.content, turn.input_kind),
        Role::Assistant => Message::assistant(turn.content),
    };
    if let Some(url) = turn.image_url {
        message = message.with_image_ref(MediaRef::remote(url));
    }
    if let Some(url) = turn.audio_url {
        message = message.with_audio_ref(MediaRef::remote(url));
    }
    message = message.with_tools(turn.tools).with_intent(turn.intent);
    if let Some(created_at) = turn.created_at {
        message = message.with_created_at(created_at);
    }
    message
}

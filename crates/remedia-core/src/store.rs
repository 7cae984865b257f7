//! The conversation store.
//!
//! An ordered, append-only log of [`Message`]s with two narrow patch
//! operations for reconciling an in-flight exchange: a late transcription
//! (which rewrites the user turn's display content) and a late
//! synthesized-audio reference. Everything else about an appended message is
//! immutable, and the log is never re-sorted.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{RemediaError, Result};
use crate::event::{EventSender, PipelineEvent};
use crate::media::MediaRef;
use crate::message::{Message, MessageId};

/// Sole owner of the message history consumed by rendering.
///
/// Cheap to clone; clones share the same log. Callers must only patch the
/// message belonging to the exchange they are currently reconciling.
#[derive(Clone, Default)]
pub struct ConversationStore {
    messages: Arc<RwLock<Vec<Message>>>,
    events: Option<EventSender>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches an event sender; store mutations are published to it.
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Appends a message and returns its id.
    pub async fn append(&self, message: Message) -> MessageId {
        let id = message.id;
        self.messages.write().await.push(message);
        self.emit(PipelineEvent::MessageAppended { id });
        id
    }

    /// Patches a turn with its transcription.
    ///
    /// The display content becomes the transcription wrapped in double
    /// quotes; the raw transcription lands in `transcription_text`. This is
    /// one of the two permitted post-append mutations.
    pub async fn patch_transcription(&self, id: MessageId, transcription: &str) -> Result<()> {
        let mut messages = self.messages.write().await;
        let message = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| RemediaError::unknown_message(id.to_string()))?;
        message.content = format!("\"{transcription}\"");
        message.transcription_text = Some(transcription.to_string());
        drop(messages);
        self.emit(PipelineEvent::MessagePatched { id });
        Ok(())
    }

    /// Attaches a late audio reference to an already-appended turn.
    pub async fn patch_audio_ref(&self, id: MessageId, audio_ref: MediaRef) -> Result<()> {
        let mut messages = self.messages.write().await;
        let message = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| RemediaError::unknown_message(id.to_string()))?;
        message.audio_ref = Some(audio_ref);
        drop(messages);
        self.emit(PipelineEvent::MessagePatched { id });
        Ok(())
    }

    /// Replaces the entire log (history load). Returns the displaced
    /// messages so the caller can release their media handles.
    pub async fn replace_all(&self, new_messages: Vec<Message>) -> Vec<Message> {
        let count = new_messages.len();
        let displaced = {
            let mut messages = self.messages.write().await;
            std::mem::replace(&mut *messages, new_messages)
        };
        self.emit(PipelineEvent::HistoryReplaced { count });
        displaced
    }

    /// Empties the log. Returns the removed messages so the caller can
    /// release their media handles. Clearing an empty store is not an error.
    pub async fn clear(&self) -> Vec<Message> {
        let removed = {
            let mut messages = self.messages.write().await;
            std::mem::take(&mut *messages)
        };
        self.emit(PipelineEvent::HistoryCleared {
            removed: removed.len(),
        });
        removed
    }

    /// A point-in-time copy of the log, oldest first.
    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    pub async fn get(&self, id: MessageId) -> Option<Message> {
        self.messages.read().await.iter().find(|m| m.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

//! Chat orchestrator: turns a composed draft into one remote exchange.
//!
//! This module provides the `ChatOrchestrator`, which coordinates the
//! composer, the conversation store, and the assistant gateway for a single
//! conversation thread. It owns the optimistic-append contract: the user's
//! turn lands in the store synchronously, the composer is cleared before the
//! network call, and the asynchronous reply is reconciled back into the
//! store afterwards. Send-path failures become exactly one assistant-role
//! notice; they never propagate past this layer.

use std::sync::Arc;

use tokio::sync::RwLock;

use remedia_core::assistant::{AssistantGateway, AssistantReply, OutboundMessage, OutboundPart, SendOptions};
use remedia_core::composition::{Composer, Draft};
use remedia_core::error::{RemediaError, Result};
use remedia_core::event::{EventSender, ExchangePhase, PipelineEvent};
use remedia_core::media::MediaRef;
use remedia_core::message::{Message, MessageId};
use remedia_core::store::ConversationStore;

/// What one completed send produced.
///
/// Both outcomes append exactly one assistant message: the reconciled reply
/// on success, a user-legible failure notice otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeOutcome {
    /// The optimistically-appended user turn.
    pub user_message: MessageId,
    /// The assistant turn appended at exchange end.
    pub assistant_message: MessageId,
    /// `Reconciled` or `Failed`.
    pub phase: ExchangePhase,
}

/// Use case for driving one conversation thread end to end.
///
/// # Responsibilities
///
/// - Deriving the input kind of a draft from its attachments
/// - Appending the user turn before any network activity
/// - Clearing the composer atomically at send time
/// - Reconciling the reply (transcription patch + assistant append)
/// - Converting send-path failures into a single chat-facing notice
///
/// # Thread Safety
///
/// Cheap to clone; clones share state. Sends are serialized by the exchange
/// phase flag: while one is in flight, further sends are no-ops.
#[derive(Clone)]
pub struct ChatOrchestrator {
    /// Gateway to the remote assistant service
    gateway: Arc<dyn AssistantGateway>,
    /// Sole owner of the rendered message history
    store: ConversationStore,
    /// The unsent draft being composed
    composer: Composer,
    /// Per-send wire preferences (speech synthesis, capability profile)
    options: SendOptions,
    /// Current exchange phase; `Sending` gates concurrent sends
    phase: Arc<RwLock<ExchangePhase>>,
    /// Optional channel toward the rendering layer
    events: Option<EventSender>,
}

impl ChatOrchestrator {
    /// Creates a new `ChatOrchestrator`.
    ///
    /// # Arguments
    ///
    /// * `gateway` - Transport to the assistant service
    /// * `store` - Conversation log shared with the rendering layer
    /// * `composer` - Draft state shared with the input surface
    /// * `options` - Wire preferences applied to every send
    pub fn new(
        gateway: Arc<dyn AssistantGateway>,
        store: ConversationStore,
        composer: Composer,
        options: SendOptions,
    ) -> Self {
        Self {
            gateway,
            store,
            composer,
            options,
            phase: Arc::new(RwLock::new(ExchangePhase::Composing)),
            events: None,
        }
    }

    /// Attaches an event sender; phase changes are published to it.
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// The current exchange phase.
    pub async fn phase(&self) -> ExchangePhase {
        *self.phase.read().await
    }

    /// The store this orchestrator reconciles into.
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// The composer this orchestrator drains.
    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Sends the current draft as one exchange.
    ///
    /// Returns `None` without side effects when there is nothing to send or
    /// an exchange is already in flight. Otherwise the user turn is appended
    /// synchronously, the composer is cleared, and the call resolves once
    /// the reply (or its failure notice) has been reconciled into the store.
    ///
    /// Never returns an error: send-path failures are absorbed into the
    /// `Failed` outcome.
    pub async fn send(&self) -> Option<ExchangeOutcome> {
        if self.phase().await == ExchangePhase::Sending {
            tracing::debug!(
                target: "remedia::orchestrator",
                "send ignored, exchange already in flight"
            );
            return None;
        }
        // take() is atomic, so a racing send observes an empty composer and
        // backs off here.
        let draft = self.composer.take().await?;
        self.set_phase(ExchangePhase::Sending).await;

        let request_had_audio = draft.audio.is_some();
        let user_message = self.user_turn(&draft);
        let user_id = self.store.append(user_message).await;
        tracing::info!(
            target: "remedia::orchestrator",
            id = %user_id,
            kind = %draft.input_kind(),
            "user turn appended, issuing exchange"
        );

        let result = match self.assemble(&draft).await {
            Ok(outbound) => self.gateway.send(outbound).await,
            Err(err) => Err(err),
        };

        let (assistant_id, phase) = match result {
            Ok(reply) => {
                let id = self.reconcile(user_id, request_had_audio, reply).await;
                (id, ExchangePhase::Reconciled)
            }
            Err(err) => {
                tracing::warn!(
                    target: "remedia::orchestrator",
                    error = %err,
                    "exchange failed, appending notice"
                );
                let id = self.store.append(Message::assistant(err.user_summary())).await;
                (id, ExchangePhase::Failed)
            }
        };

        self.set_phase(phase).await;
        self.set_phase(ExchangePhase::Composing).await;
        Some(ExchangeOutcome {
            user_message: user_id,
            assistant_message: assistant_id,
            phase,
        })
    }

    /// Builds the optimistic user turn from the draft, referencing staged
    /// blobs so the turn stays renderable after the composer resets.
    fn user_turn(&self, draft: &Draft) -> Message {
        let mut message = Message::user(draft.display_content(), draft.input_kind());
        if let Some(image) = &draft.image {
            message = message.with_image_ref(MediaRef::blob(image.blob));
        }
        if let Some(audio) = &draft.audio {
            message = message.with_audio_ref(MediaRef::blob(audio.blob));
        }
        message
    }

    /// Assembles the outgoing request, resolving staged blobs to bytes.
    async fn assemble(&self, draft: &Draft) -> Result<OutboundMessage> {
        let registry = self.composer.registry();
        let audio = match &draft.audio {
            Some(staged) => {
                let blob = registry.get(staged.blob).await.ok_or_else(|| {
                    RemediaError::internal("staged audio blob missing from registry")
                })?;
                Some(OutboundPart {
                    bytes: blob.bytes,
                    mime: staged.mime.clone(),
                    filename: staged.filename.clone(),
                })
            }
            None => None,
        };
        let image = match &draft.image {
            Some(staged) => {
                let blob = registry.get(staged.blob).await.ok_or_else(|| {
                    RemediaError::internal("staged image blob missing from registry")
                })?;
                Some(OutboundPart {
                    bytes: blob.bytes,
                    mime: staged.mime.clone(),
                    filename: staged.filename.clone(),
                })
            }
            None => None,
        };
        Ok(OutboundMessage {
            text: draft.text.clone(),
            audio,
            image,
            options: self.options.clone(),
        })
    }

    /// Merges a successful reply into the store and returns the appended
    /// assistant turn's id.
    async fn reconcile(
        &self,
        user_id: MessageId,
        request_had_audio: bool,
        reply: AssistantReply,
    ) -> MessageId {
        if request_had_audio && let Some(transcription) = &reply.transcription {
            if let Err(err) = self.store.patch_transcription(user_id, transcription).await {
                tracing::warn!(
                    target: "remedia::orchestrator",
                    error = %err,
                    "transcription patch failed"
                );
            }
        }

        let mut message = Message::assistant(reply.text);
        let has_audio = reply.audio_url.is_some();
        if let Some(url) = reply.audio_url {
            message = message.with_audio_ref(MediaRef::remote(url));
        }
        if let Some(image) = reply.image {
            let blob = self
                .composer
                .registry()
                .register(image.bytes, image.mime)
                .await;
            message = message.with_image_ref(MediaRef::blob(blob));
        }
        let auto_play = reply.auto_play.unwrap_or(self.options.output_audio);
        message = message
            .with_tools(reply.tools_used)
            .with_intent(reply.intent)
            .with_auto_play(auto_play && has_audio);
        self.store.append(message).await
    }

    async fn set_phase(&self, phase: ExchangePhase) {
        *self.phase.write().await = phase;
        if let Some(tx) = &self.events {
            let _ = tx.send(PipelineEvent::ExchangePhaseChanged { phase });
        }
    }
}

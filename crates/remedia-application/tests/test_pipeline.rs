//! Full-pipeline scenarios: capture, compose, send, reconcile.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use remedia_application::{CaptureUseCase, ChatOrchestrator, HistoryUseCase};
use remedia_core::assistant::{
    AssistantGateway, AssistantReply, DecodedImage, HistoryTurn, OutboundMessage, SendOptions,
};
use remedia_core::composition::Composer;
use remedia_core::config::AssistantConfig;
use remedia_core::error::{RemediaError, Result};
use remedia_core::event::ExchangePhase;
use remedia_core::media::{
    ImageStill, MediaRef, MediaRegistry, STILL_WIRE_FILENAME, VOICE_WIRE_FILENAME,
};
use remedia_core::message::{InputKind, Message, Role};
use remedia_core::store::ConversationStore;
use remedia_media::camera::CameraController;
use remedia_media::device::Facing;
use remedia_media::recorder::AudioRecorder;
use remedia_media::sim::{SimCamera, SimMicrophone};

/// Scripted gateway that records what the orchestrator did before and
/// during each call.
struct ScriptedGateway {
    store: ConversationStore,
    reply: AssistantReply,
    fail: Option<RemediaError>,
    delay: Option<Duration>,
    history_turns: Vec<HistoryTurn>,
    clear_removed: u64,
    calls: AtomicUsize,
    store_len_at_send: Mutex<Vec<usize>>,
    outbound_seen: Mutex<Vec<OutboundMessage>>,
}

impl ScriptedGateway {
    fn replying(store: ConversationStore, reply: AssistantReply) -> Self {
        Self {
            store,
            reply,
            fail: None,
            delay: None,
            history_turns: Vec::new(),
            clear_removed: 0,
            calls: AtomicUsize::new(0),
            store_len_at_send: Mutex::new(Vec::new()),
            outbound_seen: Mutex::new(Vec::new()),
        }
    }

    fn failing(store: ConversationStore, error: RemediaError) -> Self {
        let mut gateway = Self::replying(store, AssistantReply::default());
        gateway.fail = Some(error);
        gateway
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn with_history(mut self, turns: Vec<HistoryTurn>) -> Self {
        self.history_turns = turns;
        self
    }

    fn with_clear_removed(mut self, removed: u64) -> Self {
        self.clear_removed = removed;
        self
    }
}

#[async_trait]
impl AssistantGateway for ScriptedGateway {
    async fn send(&self, outbound: OutboundMessage) -> Result<AssistantReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.store_len_at_send.lock().await.push(self.store.len().await);
        self.outbound_seen.lock().await.push(outbound);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail {
            Some(err) => Err(err.clone()),
            None => Ok(self.reply.clone()),
        }
    }

    async fn history(&self, limit: usize, offset: usize) -> Result<Vec<HistoryTurn>> {
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        Ok(self
            .history_turns
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn clear_history(&self) -> Result<u64> {
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        Ok(self.clear_removed)
    }
}

fn fixture() -> (MediaRegistry, ConversationStore, Composer) {
    let registry = MediaRegistry::new();
    let store = ConversationStore::new();
    let composer = Composer::new(registry.clone());
    (registry, store, composer)
}

fn orchestrate(
    gateway: Arc<ScriptedGateway>,
    store: &ConversationStore,
    composer: &Composer,
) -> ChatOrchestrator {
    ChatOrchestrator::new(
        gateway,
        store.clone(),
        composer.clone(),
        SendOptions::interactive(&AssistantConfig::default()),
    )
}

fn text_reply(text: &str) -> AssistantReply {
    AssistantReply {
        text: text.to_string(),
        ..AssistantReply::default()
    }
}

#[tokio::test]
async fn test_text_only_send_appends_user_then_assistant() {
    let (_registry, store, composer) = fixture();
    let gateway = Arc::new(ScriptedGateway::replying(store.clone(), text_reply("hi")));
    let orchestrator = orchestrate(gateway.clone(), &store, &composer);

    composer.set_text("hello").await;
    let outcome = orchestrator.send().await.expect("draft should send");
    assert_eq!(outcome.phase, ExchangePhase::Reconciled);

    let log = store.snapshot().await;
    assert_eq!(log.len(), 2, "one user turn, one assistant turn");
    assert_eq!(log[0].role, Role::User);
    assert_eq!(log[0].content, "hello");
    assert_eq!(log[0].input_kind, InputKind::Text);
    assert!(log[0].image_ref.is_none() && log[0].audio_ref.is_none());
    assert_eq!(log[0].id, outcome.user_message);
    assert_eq!(log[1].role, Role::Assistant);
    assert_eq!(log[1].content, "hi");
    assert_eq!(log[1].id, outcome.assistant_message);

    // The user turn was in the store before the gateway ran
    assert_eq!(gateway.store_len_at_send.lock().await[0], 1);

    // Wire shape: text part only
    let outbound = gateway.outbound_seen.lock().await;
    assert_eq!(outbound[0].text.as_deref(), Some("hello"));
    assert!(outbound[0].audio.is_none());
    assert!(outbound[0].image.is_none());

    // Composer was cleared at send time, phase is back to composing
    assert!(!composer.can_send().await);
    assert_eq!(orchestrator.phase().await, ExchangePhase::Composing);
}

#[tokio::test]
async fn test_voice_send_patches_transcription_into_user_turn() {
    let (_registry, store, composer) = fixture();
    let reply = AssistantReply {
        text: "ok".to_string(),
        transcription: Some("hello there".to_string()),
        ..AssistantReply::default()
    };
    let gateway = Arc::new(ScriptedGateway::replying(store.clone(), reply));
    let orchestrator = orchestrate(gateway.clone(), &store, &composer);

    // Record through the sim microphone, stage the finalized clip
    let recorder = AudioRecorder::new(Arc::new(SimMicrophone::granting()));
    recorder.begin().await.expect("mic should open");
    let clip = recorder.end().await.expect("clip should finalize");
    composer.stage_audio(clip).await.expect("clip should stage");

    let outcome = orchestrator.send().await.expect("voice draft should send");
    assert_eq!(outcome.phase, ExchangePhase::Reconciled);

    let log = store.snapshot().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].input_kind, InputKind::Voice);
    assert_eq!(log[0].content, "\"hello there\"");
    assert_eq!(log[0].transcription_text.as_deref(), Some("hello there"));
    assert!(log[0].audio_ref.is_some(), "sent clip stays replayable");
    assert_eq!(log[1].content, "ok");

    let outbound = gateway.outbound_seen.lock().await;
    assert!(outbound[0].text.is_none());
    let audio = outbound[0].audio.as_ref().expect("clip part present");
    assert_eq!(audio.filename, VOICE_WIRE_FILENAME);
    assert_eq!(audio.mime, "audio/wav");
}

#[tokio::test]
async fn test_failure_appends_single_notice_without_rollback() {
    let (_registry, store, composer) = fixture();
    let gateway = Arc::new(ScriptedGateway::failing(
        store.clone(),
        RemediaError::unreachable("connection refused"),
    ));
    let orchestrator = orchestrate(gateway.clone(), &store, &composer);

    composer.set_text("when should I take my medication?").await;
    let outcome = orchestrator.send().await.expect("draft should send");
    assert_eq!(outcome.phase, ExchangePhase::Failed);

    let log = store.snapshot().await;
    assert_eq!(log.len(), 2, "failed user turn plus one notice");
    assert_eq!(log[0].content, "when should I take my medication?");
    assert_eq!(log[1].role, Role::Assistant);
    assert_eq!(
        log[1].content,
        RemediaError::unreachable("connection refused").user_summary()
    );

    // Ready for the next attempt; the failed turn is not retried
    assert_eq!(orchestrator.phase().await, ExchangePhase::Composing);
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_send_is_single_flight() {
    let (_registry, store, composer) = fixture();
    let gateway = Arc::new(
        ScriptedGateway::replying(store.clone(), text_reply("done"))
            .with_delay(Duration::from_millis(200)),
    );
    let orchestrator = orchestrate(gateway.clone(), &store, &composer);

    composer.set_text("first").await;
    let in_flight = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.send().await }
    });
    tokio::task::yield_now().await;
    assert_eq!(orchestrator.phase().await, ExchangePhase::Sending);

    // A second send while in flight is inert; the new draft stays composed
    composer.set_text("second").await;
    assert!(orchestrator.send().await.is_none());
    assert!(composer.can_send().await);

    let outcome = in_flight
        .await
        .expect("send task should not panic")
        .expect("first send should complete");
    assert_eq!(outcome.phase, ExchangePhase::Reconciled);
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_begin_voice_rejected_while_image_staged() {
    let (_registry, store, composer) = fixture();
    let gateway = Arc::new(ScriptedGateway::replying(store.clone(), text_reply("hi")));
    let orchestrator = orchestrate(gateway.clone(), &store, &composer);

    composer
        .stage_image(ImageStill::new(vec![1, 2, 3], "image/png", 16, 16))
        .await
        .expect("image should stage");

    let mic = Arc::new(SimMicrophone::granting());
    let counters = mic.counters();
    let capture = CaptureUseCase::new(
        AudioRecorder::new(mic),
        CameraController::new(Arc::new(SimCamera::granting())),
        orchestrator,
    );

    let err = capture.begin_voice().await.expect_err("image is staged");
    assert!(matches!(err, RemediaError::MediaConflict));
    assert_eq!(counters.acquired(), 0, "microphone was never touched");
    assert!(composer.has_image().await, "staged image survives");
}

#[tokio::test]
async fn test_voice_completion_triggers_send() {
    let (_registry, store, composer) = fixture();
    let reply = AssistantReply {
        text: "got it".to_string(),
        transcription: Some("two pills daily".to_string()),
        ..AssistantReply::default()
    };
    let gateway = Arc::new(ScriptedGateway::replying(store.clone(), reply));
    let orchestrator = orchestrate(gateway.clone(), &store, &composer);
    let capture = CaptureUseCase::new(
        AudioRecorder::new(Arc::new(SimMicrophone::granting())),
        CameraController::new(Arc::new(SimCamera::granting())),
        orchestrator,
    );

    capture.begin_voice().await.expect("mic should open");
    let outcome = capture
        .finish_voice()
        .await
        .expect("clip should stage")
        .expect("send should run");
    assert_eq!(outcome.phase, ExchangePhase::Reconciled);

    let log = store.snapshot().await;
    assert_eq!(log.len(), 2, "stopping the recording sent the draft");
    assert_eq!(log[0].input_kind, InputKind::Voice);
    assert_eq!(log[0].content, "\"two pills daily\"");
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    assert!(!composer.can_send().await, "draft was consumed by the send");
}

#[tokio::test]
async fn test_camera_confirm_stages_image_for_send() {
    let (registry, store, composer) = fixture();
    let gateway = Arc::new(ScriptedGateway::replying(
        store.clone(),
        text_reply("looks fine"),
    ));
    let orchestrator = orchestrate(gateway.clone(), &store, &composer);
    let cam = Arc::new(SimCamera::granting());
    let counters = cam.counters();
    let capture = CaptureUseCase::new(
        AudioRecorder::new(Arc::new(SimMicrophone::granting())),
        CameraController::new(cam),
        orchestrator.clone(),
    );

    capture
        .open_camera(Facing::Rear)
        .await
        .expect("camera should open");
    capture.capture_still().await.expect("frame should freeze");
    let blob = capture.confirm_still().await.expect("still should stage");
    assert!(counters.balanced(), "confirm closed the stream");
    assert!(registry.get(blob).await.is_some());

    composer.set_text("is this rash serious?").await;
    let outcome = orchestrator.send().await.expect("draft should send");
    assert_eq!(outcome.phase, ExchangePhase::Reconciled);

    let log = store.snapshot().await;
    assert_eq!(log[0].input_kind, InputKind::Image);
    assert_eq!(log[0].content, "is this rash serious?");
    assert!(log[0].image_ref.is_some());

    let outbound = gateway.outbound_seen.lock().await;
    assert_eq!(outbound[0].text.as_deref(), Some("is this rash serious?"));
    let image = outbound[0].image.as_ref().expect("image part present");
    assert_eq!(image.mime, "image/png");
    assert_eq!(image.filename, STILL_WIRE_FILENAME);
}

#[tokio::test]
async fn test_denied_microphone_leaves_pipeline_untouched() {
    let (registry, store, composer) = fixture();
    let gateway = Arc::new(ScriptedGateway::replying(store.clone(), text_reply("hi")));
    let orchestrator = orchestrate(gateway.clone(), &store, &composer);

    let recorder = AudioRecorder::new(Arc::new(SimMicrophone::denying()));
    let err = recorder.begin().await.expect_err("permission is denied");
    assert!(err.is_permission_denied());

    assert!(store.is_empty().await);
    assert!(registry.is_empty().await);
    assert!(!composer.can_send().await);
    assert!(orchestrator.send().await.is_none(), "nothing to send");
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reply_media_lands_on_assistant_turn() {
    let (registry, store, composer) = fixture();
    let reply = AssistantReply {
        text: "here is your chart".to_string(),
        audio_url: Some("http://localhost:8080/api/v1/chat/audio/tts-1.mp3".to_string()),
        image: Some(DecodedImage {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime: "image/png".to_string(),
        }),
        tools_used: vec!["glucose_lookup".to_string()],
        intent: Some("report".to_string()),
        auto_play: None,
        ..AssistantReply::default()
    };
    let gateway = Arc::new(ScriptedGateway::replying(store.clone(), reply));
    let orchestrator = orchestrate(gateway, &store, &composer);

    composer.set_text("show my readings").await;
    orchestrator.send().await.expect("draft should send");

    let log = store.snapshot().await;
    let assistant = &log[1];
    assert_eq!(
        assistant.audio_ref,
        Some(MediaRef::remote(
            "http://localhost:8080/api/v1/chat/audio/tts-1.mp3"
        ))
    );
    let image_blob = assistant
        .image_ref
        .as_ref()
        .and_then(|r| r.blob_id())
        .expect("decoded image becomes a registry blob");
    let stored = registry.get(image_blob).await.expect("blob is registered");
    assert_eq!(stored.mime, "image/png");
    assert_eq!(assistant.tools_invoked, vec!["glucose_lookup"]);
    assert_eq!(assistant.intent_label.as_deref(), Some("report"));
    // No response override: the request asked for speech, so playback starts
    assert!(assistant.auto_play);
}

#[tokio::test]
async fn test_auto_play_requires_audio() {
    let (_registry, store, composer) = fixture();
    let reply = AssistantReply {
        text: "noted".to_string(),
        auto_play: Some(true),
        ..AssistantReply::default()
    };
    let gateway = Arc::new(ScriptedGateway::replying(store.clone(), reply));
    let orchestrator = orchestrate(gateway, &store, &composer);

    composer.set_text("thanks").await;
    orchestrator.send().await.expect("draft should send");

    let log = store.snapshot().await;
    assert!(log[1].audio_ref.is_none());
    assert!(!log[1].auto_play, "no audio reference, nothing to play");
}

#[tokio::test]
async fn test_history_load_replaces_store_and_releases_blobs() {
    let (registry, store, _composer) = fixture();

    // A blob-backed message that the load must displace and release
    let blob = registry.register(vec![1, 2, 3], "image/png").await;
    store
        .append(Message::user("old", InputKind::Image).with_image_ref(MediaRef::blob(blob)))
        .await;

    let turns = vec![
        HistoryTurn {
            role: Role::User,
            content: "\"I feel dizzy\"".to_string(),
            input_kind: InputKind::Voice,
            image_url: None,
            audio_url: Some("http://localhost:8080/api/v1/chat/audio/u-1.wav".to_string()),
            tools: Vec::new(),
            intent: None,
            created_at: None,
        },
        HistoryTurn {
            role: Role::Assistant,
            content: "How long has this lasted?".to_string(),
            input_kind: InputKind::Text,
            image_url: None,
            audio_url: None,
            tools: vec!["symptom_checker".to_string()],
            intent: Some("triage".to_string()),
            created_at: None,
        },
    ];
    let gateway = Arc::new(
        ScriptedGateway::replying(store.clone(), AssistantReply::default()).with_history(turns),
    );
    let usecase = HistoryUseCase::new(gateway, store.clone(), registry.clone());

    let count = usecase.load(50, 0).await.expect("load should succeed");
    assert_eq!(count, 2);
    assert!(registry.is_empty().await, "displaced blob was released");

    let log = store.snapshot().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, Role::User);
    assert_eq!(log[0].input_kind, InputKind::Voice);
    assert_eq!(
        log[0].audio_ref,
        Some(MediaRef::remote(
            "http://localhost:8080/api/v1/chat/audio/u-1.wav"
        ))
    );
    assert_eq!(log[1].tools_invoked, vec!["symptom_checker"]);
    assert_eq!(log[1].intent_label.as_deref(), Some("triage"));
}

#[tokio::test]
async fn test_clear_empties_local_store_only_after_remote_success() {
    let (registry, store, _composer) = fixture();
    store
        .append(Message::user("hello", InputKind::Text))
        .await;

    // Remote clear fails: local history must survive
    let failing = Arc::new(ScriptedGateway::failing(
        store.clone(),
        RemediaError::RequestTimeout,
    ));
    let usecase = HistoryUseCase::new(failing, store.clone(), registry.clone());
    assert!(usecase.clear().await.is_err());
    assert_eq!(store.len().await, 1);

    // Remote clear succeeds: count comes back, local history empties
    let succeeding = Arc::new(
        ScriptedGateway::replying(store.clone(), AssistantReply::default()).with_clear_removed(7),
    );
    let usecase = HistoryUseCase::new(succeeding, store.clone(), registry.clone());
    assert_eq!(usecase.clear().await.expect("clear should succeed"), 7);
    assert!(store.is_empty().await);

    // Clearing an already-empty history is not an error
    assert!(usecase.clear().await.is_ok());
    assert!(store.is_empty().await);
}

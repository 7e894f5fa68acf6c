// tests/coordinator_test.rs — Integration test: session coordinator with a recording provider

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

use avatar_studio::infra::errors::AvatarError;
use avatar_studio::provider::{
    AvatarConnection, AvatarProvider, EventHandler, EventHub, MediaStream, ProviderEvent,
    Subscription,
};
use avatar_studio::session::coordinator::CoordinatorOptions;
use avatar_studio::session::progress::CONNECT_FAILED;
use avatar_studio::session::{
    ChatMode, CredentialSource, SessionConfig, SessionCoordinator, SessionCredential,
    SessionState, SessionView,
};

type Calls = Arc<Mutex<Vec<String>>>;

/// How a recording connection misbehaves.
#[derive(Clone, Copy, Default)]
struct Faults {
    /// `start` fails after recording the call.
    fail_start: bool,
    /// The remote side drops while the voice channel is negotiating.
    disconnect_during_voice: bool,
}

/// Connection that records every call and announces the stream on start.
struct RecordingConnection {
    hub: EventHub,
    calls: Calls,
    voice_delay: Duration,
    faults: Faults,
}

impl RecordingConnection {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl AvatarConnection for RecordingConnection {
    fn subscribe(&self, handler: EventHandler) -> Subscription {
        self.hub.subscribe(handler)
    }

    async fn start(&self, config: &SessionConfig) -> Result<(), AvatarError> {
        self.record(format!("start:{}", config.knowledge_text()));
        if self.faults.fail_start {
            return Err(AvatarError::provider("streaming.new", "HTTP 500"));
        }
        self.hub.emit(ProviderEvent::StreamReady(MediaStream {
            session_id: "sess-1".into(),
            url: "wss://room.test".into(),
            access_token: "room".into(),
        }));
        Ok(())
    }

    async fn speak(&self, text: &str) -> Result<(), AvatarError> {
        self.record(format!("speak:{text}"));
        self.hub.emit(ProviderEvent::AvatarStartTalking);
        self.hub.emit(ProviderEvent::AvatarStopTalking);
        Ok(())
    }

    async fn interrupt(&self) -> Result<(), AvatarError> {
        self.record("interrupt");
        Ok(())
    }

    async fn start_voice_chat(&self) -> Result<(), AvatarError> {
        self.record("voice:open:begin");
        if self.faults.disconnect_during_voice {
            self.hub.emit(ProviderEvent::StreamDisconnected);
        }
        tokio::time::sleep(self.voice_delay).await;
        self.record("voice:open:end");
        Ok(())
    }

    async fn close_voice_chat(&self) -> Result<(), AvatarError> {
        self.record("voice:close:begin");
        tokio::time::sleep(self.voice_delay).await;
        self.record("voice:close:end");
        Ok(())
    }

    async fn start_listening(&self) -> Result<(), AvatarError> {
        self.record("listen:start");
        Ok(())
    }

    async fn stop_listening(&self) -> Result<(), AvatarError> {
        self.record("listen:stop");
        Ok(())
    }

    async fn stop(&self) -> Result<(), AvatarError> {
        self.record("stop");
        Ok(())
    }
}

struct RecordingProvider {
    calls: Calls,
    voice_delay: Duration,
    faults: Faults,
    last: Mutex<Option<Arc<RecordingConnection>>>,
}

impl RecordingProvider {
    fn new(voice_delay: Duration) -> Self {
        Self::with_faults(voice_delay, Faults::default())
    }

    fn with_faults(voice_delay: Duration, faults: Faults) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            voice_delay,
            faults,
            last: Mutex::new(None),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn emit(&self, event: ProviderEvent) {
        let conn = self.last.lock().unwrap().clone().expect("no connection opened");
        conn.hub.emit(event);
    }
}

impl AvatarProvider for RecordingProvider {
    fn id(&self) -> &str {
        "recording"
    }

    fn open(&self, _credential: &SessionCredential) -> Result<Arc<dyn AvatarConnection>, AvatarError> {
        let conn = Arc::new(RecordingConnection {
            hub: EventHub::new(),
            calls: self.calls.clone(),
            voice_delay: self.voice_delay,
            faults: self.faults,
        });
        *self.last.lock().unwrap() = Some(conn.clone());
        Ok(conn)
    }
}

struct FixedCredential;

#[async_trait]
impl CredentialSource for FixedCredential {
    async fn fetch(&self) -> Result<SessionCredential, AvatarError> {
        SessionCredential::new("session-token")
    }
}

/// Credential source that waits until released.
struct GatedCredential(Arc<Notify>);

#[async_trait]
impl CredentialSource for GatedCredential {
    async fn fetch(&self) -> Result<SessionCredential, AvatarError> {
        self.0.notified().await;
        SessionCredential::new("late-token")
    }
}

fn coordinator(
    credentials: Arc<dyn CredentialSource>,
    provider: Arc<RecordingProvider>,
) -> SessionCoordinator {
    SessionCoordinator::new(credentials, provider, CoordinatorOptions::default())
}

async fn wait_for(
    coordinator: &SessionCoordinator,
    predicate: impl FnMut(&SessionView) -> bool,
) -> SessionView {
    let mut rx = coordinator.subscribe_view();
    let view = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for view")
        .expect("view channel closed")
        .clone();
    view
}

async fn streaming_session(provider: Arc<RecordingProvider>) -> SessionCoordinator {
    let c = coordinator(Arc::new(FixedCredential), provider);
    assert_ok!(c.start_session(SessionConfig::new("  Hello   World  ").unwrap()).await);
    wait_for(&c, |v| v.is_streaming()).await;
    c
}

#[tokio::test]
async fn test_start_reaches_streaming_in_voice_mode() {
    let provider = Arc::new(RecordingProvider::new(Duration::ZERO));
    let c = streaming_session(provider.clone()).await;

    let view = c.view();
    assert_eq!(view.state, SessionState::Streaming);
    assert_eq!(view.chat_mode, ChatMode::Voice);
    assert_eq!(view.stream.as_ref().unwrap().session_id, "sess-1");
    assert_eq!(view.loading_message, None);
    assert_eq!(view.error, None);

    let calls = provider.calls();
    assert_eq!(calls[0], "start:Hello World");
    assert!(calls.contains(&"voice:open:end".to_string()));
}

#[tokio::test]
async fn test_listening_follows_input_edges() {
    let provider = Arc::new(RecordingProvider::new(Duration::ZERO));
    let c = streaming_session(provider.clone()).await;
    provider.clear();

    c.set_input_text("").await;
    c.set_input_text("a").await;
    c.set_input_text("ab").await;
    c.set_input_text("").await;

    assert_eq!(provider.calls(), vec!["listen:start", "listen:stop"]);
}

#[tokio::test]
async fn test_speak_and_interrupt() {
    let provider = Arc::new(RecordingProvider::new(Duration::ZERO));
    let c = streaming_session(provider.clone()).await;
    provider.clear();

    c.speak("hi there").await.unwrap();
    c.speak("   ").await.unwrap();
    c.interrupt().await;

    assert_eq!(provider.calls(), vec!["speak:hi there", "interrupt"]);
    let view = wait_for(&c, |v| !v.avatar_talking).await;
    assert!(!view.speaking);
}

#[tokio::test]
async fn test_same_chat_mode_is_noop() {
    let provider = Arc::new(RecordingProvider::new(Duration::ZERO));
    let c = streaming_session(provider.clone()).await;
    provider.clear();

    c.set_chat_mode(ChatMode::Voice).await.unwrap();
    assert!(provider.calls().is_empty());

    c.set_chat_mode(ChatMode::Text).await.unwrap();
    assert_eq!(provider.calls(), vec!["voice:close:begin", "voice:close:end"]);
    assert_eq!(c.chat_mode(), ChatMode::Text);
}

#[tokio::test]
async fn test_mode_switches_do_not_interleave() {
    let provider = Arc::new(RecordingProvider::new(Duration::from_millis(30)));
    let c = streaming_session(provider.clone()).await;
    provider.clear();

    let (a, b) = tokio::join!(
        c.set_chat_mode(ChatMode::Text),
        c.set_chat_mode(ChatMode::Voice)
    );
    assert_ok!(a);
    assert_ok!(b);

    assert_eq!(
        provider.calls(),
        vec![
            "voice:close:begin",
            "voice:close:end",
            "voice:open:begin",
            "voice:open:end"
        ]
    );
    assert_eq!(c.chat_mode(), ChatMode::Voice);
}

#[tokio::test]
async fn test_end_session_is_idempotent() {
    let provider = Arc::new(RecordingProvider::new(Duration::ZERO));
    let c = streaming_session(provider.clone()).await;
    provider.clear();

    c.end_session().await;
    c.end_session().await;

    assert_eq!(provider.calls(), vec!["stop"]);
    let view = c.view();
    assert_eq!(view.state, SessionState::Ended);
    assert_eq!(view.chat_mode, ChatMode::Text);
    assert!(view.stream.is_none());

    // Ended accepts a fresh start.
    c.start_session(SessionConfig::new("again").unwrap())
        .await
        .unwrap();
    wait_for(&c, |v| v.is_streaming()).await;
}

#[tokio::test]
async fn test_provider_disconnect_ends_session() {
    let provider = Arc::new(RecordingProvider::new(Duration::ZERO));
    let c = streaming_session(provider.clone()).await;

    provider.emit(ProviderEvent::StreamDisconnected);
    wait_for(&c, |v| v.state == SessionState::Ended).await;

    // Events from the torn-down connection no longer reach the view.
    provider.emit(ProviderEvent::UserStart);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!c.view().user_talking);
    assert!(matches!(c.speak("late").await, Err(AvatarError::NotStreaming)));
}

#[tokio::test]
async fn test_user_talking_locks_voice_toggle() {
    let provider = Arc::new(RecordingProvider::new(Duration::ZERO));
    let c = streaming_session(provider.clone()).await;

    provider.emit(ProviderEvent::UserStart);
    let view = wait_for(&c, |v| v.user_talking).await;
    assert!(!view.voice_toggle_enabled());

    provider.emit(ProviderEvent::UserStop);
    let view = wait_for(&c, |v| !v.user_talking).await;
    assert!(view.voice_toggle_enabled());
}

#[tokio::test]
async fn test_end_during_start_discards_late_connection() {
    let gate = Arc::new(Notify::new());
    let provider = Arc::new(RecordingProvider::new(Duration::ZERO));
    let c = coordinator(Arc::new(GatedCredential(gate.clone())), provider.clone());

    let starter = {
        let c = c.clone();
        tokio::spawn(async move { c.start_session(SessionConfig::new("kb").unwrap()).await })
    };
    wait_for(&c, |v| v.state == SessionState::Starting).await;

    c.end_session().await;
    assert_eq!(c.state(), SessionState::Ended);

    gate.notify_one();
    let err = assert_err!(starter.await.unwrap());
    assert!(matches!(err, AvatarError::NotStreaming));
    assert_eq!(c.state(), SessionState::Ended);
    // The credential arrived after the end, so nothing was ever connected.
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_disconnect_during_voice_negotiation_fails_start() {
    let provider = Arc::new(RecordingProvider::with_faults(
        Duration::from_millis(50),
        Faults {
            disconnect_during_voice: true,
            ..Faults::default()
        },
    ));
    let c = coordinator(Arc::new(FixedCredential), provider.clone());

    let result = c.start_session(SessionConfig::new("kb").unwrap()).await;
    assert!(matches!(result, Err(AvatarError::NotStreaming)));
    let view = c.view();
    assert_eq!(view.state, SessionState::Ended);
    assert_eq!(view.chat_mode, ChatMode::Text);
    assert!(view.stream.is_none());
    assert!(provider.calls().contains(&"stop".to_string()));
}

#[tokio::test]
async fn test_connect_failure_returns_to_idle_and_stops_connection() {
    let provider = Arc::new(RecordingProvider::with_faults(
        Duration::ZERO,
        Faults {
            fail_start: true,
            ..Faults::default()
        },
    ));
    let c = coordinator(Arc::new(FixedCredential), provider.clone());

    let err = assert_err!(c.start_session(SessionConfig::new("kb").unwrap()).await);
    assert!(matches!(err, AvatarError::Provider { .. }));

    let view = c.view();
    assert_eq!(view.state, SessionState::Idle);
    assert_eq!(view.error.as_deref(), Some(CONNECT_FAILED));
    assert_eq!(view.loading_message, None);
    assert_eq!(provider.calls(), vec!["start:kb", "stop"]);

    // Nothing is left registered: interaction is refused and a retry starts clean.
    assert!(matches!(c.speak("hi").await, Err(AvatarError::NotStreaming)));
}

#[tokio::test]
async fn test_input_left_over_from_ended_session_is_forgotten() {
    let provider = Arc::new(RecordingProvider::new(Duration::ZERO));
    let c = streaming_session(provider.clone()).await;

    c.set_input_text("half typed").await;
    c.end_session().await;

    c.start_session(SessionConfig::new("again").unwrap())
        .await
        .unwrap();
    wait_for(&c, |v| v.is_streaming()).await;
    provider.clear();

    c.set_input_text("n").await;
    c.set_input_text("").await;
    assert_eq!(provider.calls(), vec!["listen:start", "listen:stop"]);
}

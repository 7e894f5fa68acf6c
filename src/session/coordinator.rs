// src/session/coordinator.rs — Lifecycle of one streaming avatar session
//
// State lives in a `watch` channel so any number of UI surfaces can observe
// it. Provider events are funnelled through one handler into an mpsc queue
// and applied by a dispatcher task; each session carries a generation number
// so events from a torn-down connection are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::credential::CredentialSource;
use super::progress::{self, ProgressTicker};
use super::{ChatMode, SessionConfig, SessionState, SessionView};
use crate::infra::config::SessionDefaults;
use crate::infra::errors::AvatarError;
use crate::provider::{AvatarConnection, AvatarProvider, ProviderEvent, Subscription};

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub credential_timeout: Duration,
    pub progress_interval: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::from_defaults(&SessionDefaults::default())
    }
}

impl CoordinatorOptions {
    pub fn from_defaults(defaults: &SessionDefaults) -> Self {
        Self {
            credential_timeout: defaults.credential_timeout(),
            progress_interval: defaults.progress_interval(),
        }
    }
}

struct ActiveSession {
    generation: u64,
    connection: Arc<dyn AvatarConnection>,
    subscription: Subscription,
    _dispatcher: JoinHandle<()>,
}

struct Inner {
    credentials: Arc<dyn CredentialSource>,
    provider: Arc<dyn AvatarProvider>,
    options: CoordinatorOptions,
    view: Arc<watch::Sender<SessionView>>,
    active: Mutex<Option<ActiveSession>>,
    generation: AtomicU64,
    /// Serializes voice-channel open/close round-trips.
    mode_lock: tokio::sync::Mutex<()>,
    /// Last value of the bound text input, for edge detection.
    input: Mutex<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenEdge {
    Start,
    Stop,
}

/// Drives one avatar session at a time. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

impl SessionCoordinator {
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        provider: Arc<dyn AvatarProvider>,
        options: CoordinatorOptions,
    ) -> Self {
        let (view, _) = watch::channel(SessionView::default());
        Self {
            inner: Arc::new(Inner {
                credentials,
                provider,
                options,
                view: Arc::new(view),
                active: Mutex::new(None),
                generation: AtomicU64::new(0),
                mode_lock: tokio::sync::Mutex::new(()),
                input: Mutex::new(String::new()),
            }),
        }
    }

    // ─── Observation ────────────────────────────────────────────────────

    pub fn view(&self) -> SessionView {
        self.inner.view.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<SessionView> {
        self.inner.view.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.inner.view.borrow().state
    }

    pub fn chat_mode(&self) -> ChatMode {
        self.inner.view.borrow().chat_mode
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────

    /// Acquire a credential, connect, and bring the session up.
    ///
    /// Failures are also written to the view (`error`) and leave the
    /// coordinator `Idle`. The session becomes `Streaming` when the provider
    /// reports the stream ready, which may be after this returns.
    pub async fn start_session(&self, config: SessionConfig) -> Result<(), AvatarError> {
        let mut accepted = false;
        self.inner.view.send_if_modified(|v| {
            if !v.state.accepts_start() {
                return false;
            }
            *v = SessionView {
                state: SessionState::Starting,
                loading_message: Some(progress::INITIALIZING.into()),
                ..SessionView::default()
            };
            accepted = true;
            true
        });
        if !accepted {
            return Err(AvatarError::SessionActive);
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _ticker = ProgressTicker::start(
            Arc::clone(&self.inner.view),
            self.inner.options.progress_interval,
        );
        tracing::info!(
            "Starting avatar session (avatar: '{}', language: {}, knowledge: {} chars)",
            config.avatar_identifier(),
            config.spoken_language(),
            config.knowledge_text().len()
        );

        let credential = match self.fetch_credential().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Session start aborted: {}", e);
                self.fail_start(generation, progress::CREDENTIAL_FAILED);
                return Err(e);
            }
        };
        if !self.is_current(generation) {
            return Err(AvatarError::NotStreaming);
        }
        self.set_loading(generation, progress::ALMOST_READY);

        let connection = match self.inner.provider.open(&credential) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Failed to open {} connection: {}", self.inner.provider.id(), e);
                self.fail_start(generation, progress::CONNECT_FAILED);
                return Err(e);
            }
        };
        drop(credential);

        // Listeners go on before the connect call so a fast stream-ready
        // event cannot be missed.
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = connection.subscribe(Arc::new(move |event| {
            let _ = tx.send(event);
        }));
        let dispatcher = tokio::spawn(dispatch_events(
            Arc::downgrade(&self.inner),
            generation,
            rx,
        ));
        if let Ok(mut slot) = self.inner.active.lock() {
            *slot = Some(ActiveSession {
                generation,
                connection: Arc::clone(&connection),
                subscription,
                _dispatcher: dispatcher,
            });
        }

        if let Err(e) = connection.start(&config).await {
            tracing::warn!("Error starting avatar session: {}", e);
            self.discard_session(generation).await;
            self.fail_start(generation, progress::CONNECT_FAILED);
            return Err(e);
        }

        if !self.is_current(generation) {
            // Ended while the connect call was in flight. The remote session
            // may have come up after end_session ran, so stop it again.
            self.discard_session(generation).await;
            if let Err(e) = connection.stop().await {
                tracing::debug!("Stopping superseded session: {}", e);
            }
            return Err(AvatarError::NotStreaming);
        }

        // Voice is the default mode once connected.
        {
            let _guard = self.inner.mode_lock.lock().await;
            let voice = connection.start_voice_chat().await;
            if !self.is_current(generation) {
                // Disconnected or ended during negotiation; end_session has
                // already reset the view.
                return Err(AvatarError::NotStreaming);
            }
            match voice {
                Ok(()) => self.inner.view.send_modify(|v| v.chat_mode = ChatMode::Voice),
                Err(e) => tracing::warn!("Voice chat unavailable, staying in text mode: {}", e),
            }
        }

        self.inner.view.send_if_modified(|v| v.loading_message.take().is_some());
        Ok(())
    }

    /// Tear down the current session. Safe to call any number of times.
    pub async fn end_session(&self) {
        let active = self.take_active();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let had_session = active.is_some();
        // The next session starts listening on its first keystroke.
        self.inner
            .input
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();

        if let Some(active) = active {
            drop(active.subscription);
            if let Err(e) = active.connection.stop().await {
                tracing::warn!("Error stopping avatar session: {}", e);
            }
            tracing::info!("Avatar session ended");
        }

        self.inner.view.send_modify(|v| {
            if had_session || v.state != SessionState::Idle {
                v.state = SessionState::Ended;
            }
            v.chat_mode = ChatMode::Text;
            v.stream = None;
            v.avatar_talking = false;
            v.user_talking = false;
            v.speaking = false;
            v.loading_message = None;
        });
    }

    /// Alias of [`end_session`](Self::end_session) for owners going away.
    pub async fn shutdown(&self) {
        self.end_session().await;
    }

    // ─── Interaction ────────────────────────────────────────────────────

    /// Have the avatar say `text`. Overlapping calls are rejected with
    /// [`AvatarError::Busy`]; provider failures are swallowed.
    pub async fn speak(&self, text: &str) -> Result<(), AvatarError> {
        let connection = self.streaming_connection()?;
        if text.trim().is_empty() {
            return Ok(());
        }

        let mut acquired = false;
        self.inner.view.send_if_modified(|v| {
            if v.speaking {
                return false;
            }
            v.speaking = true;
            acquired = true;
            true
        });
        if !acquired {
            return Err(AvatarError::Busy);
        }

        if let Err(e) = connection.speak(text).await {
            tracing::debug!("Speak task failed (ignored): {}", e);
        }
        self.inner.view.send_modify(|v| v.speaking = false);
        Ok(())
    }

    /// Best-effort cancel of the current talk task.
    pub async fn interrupt(&self) {
        let Ok(connection) = self.streaming_connection() else {
            return;
        };
        if let Err(e) = connection.interrupt().await {
            tracing::debug!("Interrupt failed (ignored): {}", e);
        }
    }

    /// Switch between text and voice chat. Calls are serialized; switching to
    /// the current mode is a no-op.
    pub async fn set_chat_mode(&self, mode: ChatMode) -> Result<(), AvatarError> {
        let _guard = self.inner.mode_lock.lock().await;
        if self.chat_mode() == mode {
            return Ok(());
        }

        if let Some(connection) = self.active_connection() {
            let result = match mode {
                ChatMode::Text => connection.close_voice_chat().await,
                ChatMode::Voice => connection.start_voice_chat().await,
            };
            if let Err(e) = result {
                tracing::warn!("Chat mode switch to {} failed: {}", mode, e);
                return Err(e);
            }
        }

        self.inner.view.send_modify(|v| v.chat_mode = mode);
        tracing::debug!("Chat mode: {}", mode);
        Ok(())
    }

    /// Feed the current value of the text input. Crossing from empty to
    /// non-empty starts listening, the reverse stops it; other changes do
    /// nothing.
    pub async fn set_input_text(&self, text: &str) {
        let edge = {
            let mut previous = self.inner.input.lock().unwrap_or_else(|e| e.into_inner());
            let edge = match (previous.is_empty(), text.is_empty()) {
                (true, false) => Some(ListenEdge::Start),
                (false, true) => Some(ListenEdge::Stop),
                _ => None,
            };
            *previous = text.to_string();
            edge
        };

        let Some(edge) = edge else {
            return;
        };
        let Some(connection) = self.active_connection() else {
            return;
        };
        let result = match edge {
            ListenEdge::Start => connection.start_listening().await,
            ListenEdge::Stop => connection.stop_listening().await,
        };
        if let Err(e) = result {
            tracing::debug!("Listen toggle {:?} failed (ignored): {}", edge, e);
        }
    }

    // ─── Internals ──────────────────────────────────────────────────────

    async fn fetch_credential(&self) -> Result<super::SessionCredential, AvatarError> {
        let timeout = self.inner.options.credential_timeout;
        match tokio::time::timeout(timeout, self.inner.credentials.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(AvatarError::Timeout {
                operation: "credential fetch".into(),
                seconds: timeout.as_secs(),
            }),
        }
    }

    async fn apply_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AvatarStartTalking => {
                self.inner.view.send_modify(|v| v.avatar_talking = true);
            }
            ProviderEvent::AvatarStopTalking => {
                self.inner.view.send_modify(|v| v.avatar_talking = false);
            }
            ProviderEvent::StreamReady(stream) => {
                tracing::info!("Stream ready (session {})", stream.session_id);
                self.inner.view.send_modify(|v| {
                    if v.state == SessionState::Starting {
                        v.state = SessionState::Streaming;
                    }
                    v.stream = Some(stream);
                    v.loading_message = None;
                });
            }
            ProviderEvent::StreamDisconnected => {
                tracing::info!("Stream disconnected by provider");
                self.end_session().await;
            }
            ProviderEvent::UserStart => {
                self.inner.view.send_modify(|v| v.user_talking = true);
            }
            ProviderEvent::UserStop => {
                self.inner.view.send_modify(|v| v.user_talking = false);
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    fn set_loading(&self, generation: u64, message: &str) {
        if self.is_current(generation) {
            self.inner
                .view
                .send_modify(|v| v.loading_message = Some(message.to_string()));
        }
    }

    fn fail_start(&self, generation: u64, message: &str) {
        if !self.is_current(generation) {
            return;
        }
        self.inner.view.send_modify(|v| {
            v.state = SessionState::Idle;
            v.stream = None;
            v.loading_message = None;
            v.error = Some(message.to_string());
        });
    }

    /// Drop the session registered for `generation` after a failed start.
    async fn discard_session(&self, generation: u64) {
        let active = {
            let mut slot = self.inner.active.lock().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(a) if a.generation == generation => slot.take(),
                _ => None,
            }
        };
        if let Some(active) = active {
            drop(active.subscription);
            if let Err(e) = active.connection.stop().await {
                tracing::debug!("Cleanup after failed start: {}", e);
            }
        }
    }

    fn take_active(&self) -> Option<ActiveSession> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    fn active_connection(&self) -> Option<Arc<dyn AvatarConnection>> {
        self.inner
            .active
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|a| Arc::clone(&a.connection)))
    }

    fn streaming_connection(&self) -> Result<Arc<dyn AvatarConnection>, AvatarError> {
        if self.state() != SessionState::Streaming {
            return Err(AvatarError::NotStreaming);
        }
        self.active_connection().ok_or(AvatarError::NotStreaming)
    }
}

async fn dispatch_events(
    inner: Weak<Inner>,
    generation: u64,
    mut rx: mpsc::UnboundedReceiver<ProviderEvent>,
) {
    while let Some(event) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let coordinator = SessionCoordinator { inner };
        if !coordinator.is_current(generation) {
            tracing::debug!("Dropping stale provider event: {}", event.name());
            break;
        }
        coordinator.apply_event(event).await;
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let active = self
            .active
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(active) = active else {
            return;
        };
        drop(active.subscription);
        let connection = active.connection;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = connection.stop().await {
                        tracing::warn!("Error stopping orphaned avatar session: {}", e);
                    }
                });
            }
            Err(_) => tracing::warn!("Coordinator dropped outside a runtime with a live session"),
        }
    }
}

// src/provider/heygen.rs — HeyGen streaming avatar adapter
//
// Drives the session control plane (new/start/task/interrupt/listening/stop)
// over HTTPS and the voice channel over the chat socket. Media transport (the
// real-time room carrying video and the microphone track) belongs to the
// client rendering the stream; this adapter hands the room URL and token out
// through `StreamReady`. A keep-alive ping reports a session the provider
// has dropped as `StreamDisconnected`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::chat_socket::{chat_socket_url, ChatSocket};
use super::events::{EventHandler, EventHub, MediaStream, ProviderEvent, Subscription};
use super::{AvatarConnection, AvatarProvider};
use crate::avatars::AvatarListResponse;
use crate::infra::config::ProviderConfig;
use crate::infra::errors::AvatarError;
use crate::session::{SessionConfig, SessionCredential};
use crate::util::log_preview;

/// Consecutive unreachable keep-alive pings before the session counts as lost.
const KEEPALIVE_MAX_FAILURES: u32 = 3;

pub struct HeygenProvider {
    client: reqwest::Client,
    base_url: String,
    quality: String,
    keepalive_interval: Duration,
}

impl HeygenProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            quality: config.quality.clone(),
            keepalive_interval: config.keepalive_interval(),
        }
    }
}

impl AvatarProvider for HeygenProvider {
    fn id(&self) -> &str {
        "heygen"
    }

    fn open(&self, credential: &SessionCredential) -> Result<Arc<dyn AvatarConnection>, AvatarError> {
        Ok(Arc::new(HeygenConnection {
            api: SessionApi {
                client: self.client.clone(),
                base_url: self.base_url.clone(),
                credential: credential.clone(),
            },
            quality: self.quality.clone(),
            keepalive_interval: self.keepalive_interval,
            hub: EventHub::new(),
            session: Mutex::new(None),
            voice: tokio::sync::Mutex::new(None),
        }))
    }
}

/// Account-level calls authenticated with the server-side API key. Only the
/// gateway holds one of these; clients get short-lived session tokens.
pub struct HeygenAccount {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HeygenAccount {
    /// `None` when no API key is configured.
    pub fn from_config(config: &ProviderConfig) -> Option<Self> {
        let api_key = config.resolve_api_key()?;
        Some(Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder, operation: &str) -> Result<Value, AvatarError> {
        let response = request
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| AvatarError::provider(operation, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AvatarError::Http {
                status: status.as_u16(),
                message: format!("{operation} failed: {}", log_preview(&body)),
            });
        }
        response
            .json()
            .await
            .map_err(|e| AvatarError::provider(operation, format!("Failed to parse response: {e}")))
    }

    /// Mint a short-lived session token (`streaming.create_token`).
    pub async fn create_token(&self) -> Result<String, AvatarError> {
        let url = format!("{}/v1/streaming.create_token", self.base_url);
        let body = self
            .send(self.client.post(&url), "streaming.create_token")
            .await?;
        body["data"]["token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AvatarError::provider("streaming.create_token", "response has no token"))
    }

    /// Account avatar list (`GET /v2/avatars`).
    pub async fn list_avatars(&self) -> Result<AvatarListResponse, AvatarError> {
        let url = format!("{}/v2/avatars", self.base_url);
        let body = self.send(self.client.get(&url), "avatars").await?;
        serde_json::from_value(body)
            .map_err(|e| AvatarError::provider("avatars", format!("Failed to parse response: {e}")))
    }
}

/// Session-token authenticated REST calls, shared with the keep-alive task.
#[derive(Clone)]
struct SessionApi {
    client: reqwest::Client,
    base_url: String,
    credential: SessionCredential,
}

impl SessionApi {
    async fn send(&self, operation: &str, body: &Value) -> Result<reqwest::Response, AvatarError> {
        let url = format!("{}/v1/{}", self.base_url, operation);
        self.client
            .post(&url)
            .bearer_auth(self.credential.expose())
            .json(body)
            .send()
            .await
            .map_err(|e| AvatarError::provider(operation, e.to_string()))
    }

    async fn post(&self, operation: &str, body: Value) -> Result<Value, AvatarError> {
        let response = self.send(operation, &body).await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(AvatarError::provider(
                operation,
                format!("HTTP {}: {}", status, log_preview(&error_body)),
            ));
        }

        let text = response.text().await.unwrap_or_default();
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| AvatarError::provider(operation, format!("Failed to parse response: {e}")))
    }
}

/// Ping `session_id` every `interval` until the provider no longer knows
/// it (any 4xx) or stays unreachable, then report the stream as gone.
fn spawn_keepalive(
    api: SessionApi,
    session_id: String,
    hub: EventHub,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let body = json!({ "session_id": session_id });
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        let mut failures = 0;
        loop {
            ticker.tick().await;
            match api.send("streaming.keep_alive", &body).await {
                Ok(resp) if resp.status().is_client_error() => {
                    tracing::info!(
                        "Session {} no longer live (keep-alive HTTP {})",
                        session_id,
                        resp.status().as_u16()
                    );
                    break;
                }
                Ok(resp) if resp.status().is_success() => failures = 0,
                Ok(resp) => {
                    failures += 1;
                    tracing::debug!(
                        "Keep-alive HTTP {} ({}/{})",
                        resp.status(),
                        failures,
                        KEEPALIVE_MAX_FAILURES
                    );
                }
                Err(e) => {
                    failures += 1;
                    tracing::debug!(
                        "Keep-alive failed ({}/{}): {}",
                        failures,
                        KEEPALIVE_MAX_FAILURES,
                        e
                    );
                }
            }
            if failures >= KEEPALIVE_MAX_FAILURES {
                tracing::warn!("Session {} unreachable, treating as disconnected", session_id);
                break;
            }
        }
        hub.emit(ProviderEvent::StreamDisconnected);
    })
}

/// Remote session created by `start`.
struct LiveSession {
    id: String,
    language: String,
    keepalive: Option<JoinHandle<()>>,
}

pub struct HeygenConnection {
    api: SessionApi,
    quality: String,
    keepalive_interval: Duration,
    hub: EventHub,
    session: Mutex<Option<LiveSession>>,
    /// Open while in voice chat.
    voice: tokio::sync::Mutex<Option<ChatSocket>>,
}

/// Request body for `streaming.new`.
pub fn build_new_session_body(config: &SessionConfig, quality: &str) -> Value {
    let voice = config.voice();
    let mut body = json!({
        "version": "v2",
        "quality": quality,
        "knowledge_base": config.knowledge_text(),
        "language": config.spoken_language(),
        "voice": {
            "rate": voice.rate,
            "emotion": voice.emotion,
        },
        "video_encoding": "H264",
        "disable_idle_timeout": true,
    });
    if !config.avatar_identifier().is_empty() {
        body["avatar_name"] = json!(config.avatar_identifier());
    }
    body
}

impl HeygenConnection {
    fn current_session(&self) -> Result<(String, String), AvatarError> {
        self.session
            .lock()
            .ok()
            .and_then(|s| s.as_ref().map(|s| (s.id.clone(), s.language.clone())))
            .ok_or(AvatarError::NotStreaming)
    }

    async fn session_call(&self, operation: &str, extra: Value) -> Result<Value, AvatarError> {
        let (session_id, _) = self.current_session()?;
        let mut body = json!({ "session_id": session_id });
        if let (Value::Object(target), Value::Object(fields)) = (&mut body, extra) {
            target.extend(fields);
        }
        self.api.post(operation, body).await
    }
}

#[async_trait]
impl AvatarConnection for HeygenConnection {
    fn subscribe(&self, handler: EventHandler) -> Subscription {
        self.hub.subscribe(handler)
    }

    async fn start(&self, config: &SessionConfig) -> Result<(), AvatarError> {
        let body = build_new_session_body(config, &self.quality);
        let resp = self.api.post("streaming.new", body).await?;
        let data = &resp["data"];

        let session_id = data["session_id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AvatarError::provider("streaming.new", "response missing session_id"))?
            .to_string();
        let stream = MediaStream {
            session_id: session_id.clone(),
            url: data["url"].as_str().unwrap_or_default().to_string(),
            access_token: data["access_token"].as_str().unwrap_or_default().to_string(),
        };

        // Recorded before streaming.start so stop() can clean up a half-started session.
        if let Ok(mut slot) = self.session.lock() {
            *slot = Some(LiveSession {
                id: session_id.clone(),
                language: config.spoken_language().to_string(),
                keepalive: None,
            });
        }

        self.api
            .post("streaming.start", json!({ "session_id": session_id }))
            .await?;
        tracing::info!("Avatar session {} started", session_id);

        let keepalive = spawn_keepalive(
            self.api.clone(),
            session_id,
            self.hub.clone(),
            self.keepalive_interval,
        );
        match self
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_mut()
        {
            Some(live) => live.keepalive = Some(keepalive),
            // Stopped while streaming.start was in flight.
            None => keepalive.abort(),
        }

        self.hub.emit(ProviderEvent::StreamReady(stream));
        Ok(())
    }

    async fn speak(&self, text: &str) -> Result<(), AvatarError> {
        self.hub.emit(ProviderEvent::AvatarStartTalking);
        let result = self
            .session_call(
                "streaming.task",
                json!({ "text": text, "task_type": "talk", "task_mode": "sync" }),
            )
            .await;
        self.hub.emit(ProviderEvent::AvatarStopTalking);
        result.map(|_| ())
    }

    async fn interrupt(&self) -> Result<(), AvatarError> {
        self.session_call("streaming.interrupt", json!({})).await?;
        Ok(())
    }

    async fn start_voice_chat(&self) -> Result<(), AvatarError> {
        let (session_id, language) = self.current_session()?;
        let mut voice = self.voice.lock().await;
        if voice.is_some() {
            return Ok(());
        }
        let url = chat_socket_url(
            &self.api.base_url,
            &session_id,
            self.api.credential.expose(),
            &language,
        )?;
        *voice = Some(ChatSocket::open(&url, self.hub.clone()).await?);
        tracing::debug!("Voice chat opened for session {}", session_id);
        Ok(())
    }

    async fn close_voice_chat(&self) -> Result<(), AvatarError> {
        let socket = self.voice.lock().await.take();
        if let Some(socket) = socket {
            socket.close().await;
            tracing::debug!("Voice chat closed");
        }
        Ok(())
    }

    async fn start_listening(&self) -> Result<(), AvatarError> {
        self.session_call("streaming.start_listening", json!({}))
            .await?;
        Ok(())
    }

    async fn stop_listening(&self) -> Result<(), AvatarError> {
        self.session_call("streaming.stop_listening", json!({}))
            .await?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), AvatarError> {
        self.close_voice_chat().await?;
        let session = self.session.lock().ok().and_then(|mut s| s.take());
        let Some(session) = session else {
            return Ok(());
        };
        if let Some(keepalive) = session.keepalive {
            keepalive.abort();
        }
        self.api
            .post("streaming.stop", json!({ "session_id": session.id }))
            .await?;
        tracing::info!("Avatar session {} stopped", session.id);
        Ok(())
    }
}

impl Drop for HeygenConnection {
    fn drop(&mut self) {
        let session = self.session.get_mut().ok().and_then(|s| s.take());
        if let Some(keepalive) = session.and_then(|s| s.keepalive) {
            keepalive.abort();
        }
    }
}

// src/provider/mod.rs — Streaming avatar provider layer

pub mod chat_socket;
pub mod events;
pub mod heygen;

use async_trait::async_trait;
use std::sync::Arc;

use crate::infra::errors::AvatarError;
use crate::session::{SessionConfig, SessionCredential};

pub use events::{EventHandler, EventHub, MediaStream, ProviderEvent, Subscription};

/// Factory for provider connections.
pub trait AvatarProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Build a connection bound to `credential`. No network traffic happens
    /// until [`AvatarConnection::start`], so handlers can be attached first.
    fn open(&self, credential: &SessionCredential) -> Result<Arc<dyn AvatarConnection>, AvatarError>;
}

/// One real-time avatar connection.
#[async_trait]
pub trait AvatarConnection: Send + Sync {
    fn subscribe(&self, handler: EventHandler) -> Subscription;

    /// Create and start the remote session. The media stream arrives later as
    /// [`ProviderEvent::StreamReady`].
    async fn start(&self, config: &SessionConfig) -> Result<(), AvatarError>;

    /// Synchronous talk task: resolves once the avatar has finished speaking.
    async fn speak(&self, text: &str) -> Result<(), AvatarError>;

    async fn interrupt(&self) -> Result<(), AvatarError>;

    /// Open the voice channel; resolves after negotiation completes.
    async fn start_voice_chat(&self) -> Result<(), AvatarError>;

    async fn close_voice_chat(&self) -> Result<(), AvatarError>;

    async fn start_listening(&self) -> Result<(), AvatarError>;

    async fn stop_listening(&self) -> Result<(), AvatarError>;

    /// Tear down the remote session. A no-op when nothing is running.
    async fn stop(&self) -> Result<(), AvatarError>;
}

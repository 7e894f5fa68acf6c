// src/session/mod.rs — Avatar session types
//
// One coordinator drives one session through Idle → Starting → Streaming →
// Ended. The types here are what the UI sees and what a start request carries.

pub mod coordinator;
pub mod credential;
pub mod progress;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::infra::config::SessionDefaults;
use crate::infra::errors::AvatarError;
use crate::knowledge::normalize::normalize_knowledge_text;
use crate::provider::events::MediaStream;

pub use coordinator::SessionCoordinator;
pub use credential::{CredentialSource, GatewayCredentialSource, SessionCredential};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Streaming,
    Ended,
}

impl SessionState {
    /// Whether a new session may be started from here.
    pub fn accepts_start(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Ended)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Streaming => "streaming",
            SessionState::Ended => "ended",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Text,
    Voice,
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::Text => f.write_str("text"),
            ChatMode::Voice => f.write_str("voice"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceEmotion {
    #[default]
    Excited,
    Serious,
    Friendly,
    Soothing,
    Broadcaster,
}

impl FromStr for VoiceEmotion {
    type Err = AvatarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "excited" => Ok(VoiceEmotion::Excited),
            "serious" => Ok(VoiceEmotion::Serious),
            "friendly" => Ok(VoiceEmotion::Friendly),
            "soothing" => Ok(VoiceEmotion::Soothing),
            "broadcaster" => Ok(VoiceEmotion::Broadcaster),
            other => Err(AvatarError::Config(format!("unknown voice emotion '{other}'"))),
        }
    }
}

pub const MIN_VOICE_RATE: f32 = 0.5;
pub const MAX_VOICE_RATE: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub rate: f32,
    pub emotion: VoiceEmotion,
}

impl VoiceSettings {
    /// `rate` is clamped into the provider's accepted 0.5–1.5 window.
    pub fn new(rate: f32, emotion: VoiceEmotion) -> Self {
        Self {
            rate: rate.clamp(MIN_VOICE_RATE, MAX_VOICE_RATE),
            emotion,
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self::new(MAX_VOICE_RATE, VoiceEmotion::Excited)
    }
}

pub const DEFAULT_LANGUAGE: &str = "en";

/// Parameters of one start request. Built once, then handed to the
/// coordinator by value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    avatar_identifier: String,
    knowledge_text: String,
    spoken_language: String,
    voice: VoiceSettings,
}

impl SessionConfig {
    /// Knowledge text is whitespace-collapsed and trimmed here; an empty
    /// result is rejected.
    pub fn new(knowledge_text: &str) -> Result<Self, AvatarError> {
        let knowledge_text = normalize_knowledge_text(knowledge_text);
        if knowledge_text.is_empty() {
            return Err(AvatarError::EmptyKnowledge);
        }
        Ok(Self {
            avatar_identifier: String::new(),
            knowledge_text,
            spoken_language: DEFAULT_LANGUAGE.into(),
            voice: VoiceSettings::default(),
        })
    }

    /// Apply language and voice defaults from the `[session]` config section.
    pub fn with_defaults(self, defaults: &SessionDefaults) -> Self {
        let emotion = defaults.voice_emotion.parse().unwrap_or_else(|e| {
            tracing::warn!("{e}, using default emotion");
            VoiceEmotion::default()
        });
        self.with_language(&defaults.language)
            .with_voice(VoiceSettings::new(defaults.voice_rate, emotion))
    }

    pub fn with_avatar(mut self, avatar_identifier: &str) -> Self {
        self.avatar_identifier = avatar_identifier.trim().to_string();
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        let language = language.trim();
        self.spoken_language = if language.is_empty() {
            DEFAULT_LANGUAGE.into()
        } else {
            language.to_string()
        };
        self
    }

    pub fn with_voice(mut self, voice: VoiceSettings) -> Self {
        self.voice = voice;
        self
    }

    pub fn avatar_identifier(&self) -> &str {
        &self.avatar_identifier
    }

    pub fn knowledge_text(&self) -> &str {
        &self.knowledge_text
    }

    pub fn spoken_language(&self) -> &str {
        &self.spoken_language
    }

    pub fn voice(&self) -> VoiceSettings {
        self.voice
    }
}

/// Snapshot of everything the UI renders for a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    pub state: SessionState,
    pub chat_mode: ChatMode,
    pub stream: Option<MediaStream>,
    pub avatar_talking: bool,
    pub user_talking: bool,
    /// A speak task is in flight.
    pub speaking: bool,
    pub loading_message: Option<String>,
    pub error: Option<String>,
}

impl SessionView {
    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// The voice/text toggle is locked while the user is mid-utterance.
    pub fn voice_toggle_enabled(&self) -> bool {
        self.is_streaming() && !self.user_talking
    }

    pub fn can_speak(&self) -> bool {
        self.is_streaming() && !self.speaking
    }
}

// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::infra::errors::AvatarError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub documents: DocumentsConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub session: SessionDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address the gateway binds to.
    pub bind: String,
    /// Base URL clients use to reach the gateway.
    pub public_url: String,
    /// Built front-end assets, served behind the auth middleware.
    #[serde(default)]
    pub static_dir: Option<String>,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".into(),
            public_url: "http://127.0.0.1:3000".into(),
            static_dir: None,
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".into(),
        "http://127.0.0.1:3000".into(),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Server-side API key; falls back to HEYGEN_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    pub quality: String,
    /// How often a live session is pinged with `streaming.keep_alive`.
    #[serde(default = "default_keepalive_seconds")]
    pub keepalive_seconds: u64,
}

fn default_keepalive_seconds() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.heygen.com".into(),
            api_key: None,
            quality: "low".into(),
            keepalive_seconds: default_keepalive_seconds(),
        }
    }
}

impl ProviderConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_seconds.max(1))
    }

    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("HEYGEN_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    pub pdf_endpoint: String,
    pub docx_endpoint: String,
    pub timeout_seconds: u64,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            pdf_endpoint: "https://humanaiapp.com/api/get-pdf-content".into(),
            docx_endpoint: "https://humanaiapp.com/api/get-docx-content".into(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub login_url: String,
    #[serde(default)]
    pub register_url: Option<String>,
    pub token_max_age_days: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_url: "https://api.humanaiapp.com/api/login".into(),
            register_url: None,
            token_max_age_days: 30,
        }
    }
}

impl AuthConfig {
    pub fn token_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.token_max_age_days))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDefaults {
    pub language: String,
    pub voice_rate: f32,
    pub voice_emotion: String,
    pub credential_timeout_seconds: u64,
    pub extraction_timeout_seconds: u64,
    pub progress_interval_seconds: u64,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            language: "en".into(),
            voice_rate: 1.5,
            voice_emotion: "excited".into(),
            credential_timeout_seconds: 15,
            extraction_timeout_seconds: 60,
            progress_interval_seconds: 4,
        }
    }
}

impl SessionDefaults {
    pub fn credential_timeout(&self) -> Duration {
        Duration::from_secs(self.credential_timeout_seconds)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_seconds)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_seconds.max(1))
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Every configured endpoint must be an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), AvatarError> {
        let mut endpoints = vec![
            ("gateway.public_url", self.gateway.public_url.as_str()),
            ("provider.base_url", self.provider.base_url.as_str()),
            ("documents.pdf_endpoint", self.documents.pdf_endpoint.as_str()),
            ("documents.docx_endpoint", self.documents.docx_endpoint.as_str()),
            ("auth.login_url", self.auth.login_url.as_str()),
        ];
        if let Some(ref register) = self.auth.register_url {
            endpoints.push(("auth.register_url", register.as_str()));
        }
        for (key, value) in endpoints {
            let parsed = url::Url::parse(value)
                .map_err(|e| AvatarError::Config(format!("{key}: invalid URL '{value}': {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AvatarError::Config(format!(
                    "{key}: expected http(s) URL, got '{value}'"
                )));
            }
        }
        Ok(())
    }
}

// src/session/credential.rs — Short-lived session credential acquisition

use async_trait::async_trait;
use std::fmt;

use crate::infra::errors::AvatarError;
use crate::util::log_preview;

/// Opaque bearer token that authorizes opening one provider connection.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential(String);

impl SessionCredential {
    pub fn new(token: impl Into<String>) -> Result<Self, AvatarError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(AvatarError::Credential("empty access token".into()));
        }
        Ok(Self(token))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCredential(***)")
    }
}

/// Where the coordinator gets a fresh credential for each start attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch(&self) -> Result<SessionCredential, AvatarError>;
}

/// Fetches credentials from the gateway's `POST /api/get-access-token`,
/// whose body is the raw token text.
pub struct GatewayCredentialSource {
    client: reqwest::Client,
    endpoint: String,
}

impl GatewayCredentialSource {
    pub fn new(gateway_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/get-access-token", gateway_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl CredentialSource for GatewayCredentialSource {
    async fn fetch(&self) -> Result<SessionCredential, AvatarError> {
        let response = self
            .client
            .post(&self.endpoint)
            .send()
            .await
            .map_err(|e| AvatarError::Credential(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AvatarError::Credential(e.to_string()))?;

        if !status.is_success() {
            return Err(AvatarError::Credential(format!(
                "HTTP {}: {}",
                status.as_u16(),
                log_preview(&body)
            )));
        }

        tracing::debug!("Session credential acquired");
        SessionCredential::new(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_credential_rejected() {
        assert!(SessionCredential::new("  ").is_err());
        assert_eq!(SessionCredential::new(" tok \n").unwrap().expose(), "tok");
    }

    #[test]
    fn test_debug_hides_token() {
        let c = SessionCredential::new("super-secret").unwrap();
        assert_eq!(format!("{c:?}"), "SessionCredential(***)");
    }

    #[test]
    fn test_endpoint_join() {
        let src = GatewayCredentialSource::new("http://localhost:3000/");
        assert_eq!(src.endpoint, "http://localhost:3000/api/get-access-token");
    }
}

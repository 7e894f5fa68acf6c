// src/auth/client.rs — Auth Gateway client (login + registration)

use serde::{Deserialize, Serialize};

use crate::auth::LocalStore;
use crate::infra::config::AuthConfig;
use crate::infra::errors::AvatarError;

/// Message the gateway returns on a successful login.
pub const LOGIN_SUCCESSFUL: &str = "Login Successful";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl LoginResponse {
    /// The token, if the gateway reported success. Otherwise the gateway's
    /// message verbatim.
    pub fn into_token(self) -> Result<String, AvatarError> {
        match (self.message.as_deref(), self.token) {
            (Some(LOGIN_SUCCESSFUL), Some(token)) if !token.is_empty() => Ok(token),
            _ => Err(AvatarError::Auth(
                self.message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Login failed".into()),
            )),
        }
    }
}

pub struct AuthClient {
    client: reqwest::Client,
    config: AuthConfig,
}

impl AuthClient {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Exchange credentials for a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AvatarError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp: LoginResponse = self
            .client
            .post(&self.config.login_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!("Login request failed: {}", e);
                AvatarError::Auth("An error occurred during login".into())
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::debug!("Login response unreadable: {}", e);
                AvatarError::Auth("An error occurred during login".into())
            })?;
        resp.into_token()
    }

    /// Log in and persist the token for `token_max_age_days`.
    pub async fn login_and_store(
        &self,
        store: &LocalStore,
        email: &str,
        password: &str,
    ) -> Result<(), AvatarError> {
        let token = self.login(email, password).await?;
        store.set_token(&token, self.config.token_max_age())?;
        tracing::info!("Logged in as {}", email);
        Ok(())
    }

    /// Create an account. Returns the gateway's message on success.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<String, AvatarError> {
        if password != confirm_password {
            return Err(AvatarError::Auth("Passwords do not match".into()));
        }
        let Some(ref url) = self.config.register_url else {
            return Err(AvatarError::Config("auth.register_url is not set".into()));
        };

        let body = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp: RegisterResponse = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!("Register request failed: {}", e);
                AvatarError::Auth("An error occurred during registration".into())
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::debug!("Register response unreadable: {}", e);
                AvatarError::Auth("An error occurred during registration".into())
            })?;

        if resp.status.as_deref() == Some("success") {
            Ok(resp
                .message
                .unwrap_or_else(|| "Registration successful".into()))
        } else {
            Err(AvatarError::Auth(
                resp.message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Registration failed".into()),
            ))
        }
    }
}

// src/auth/mod.rs — Client-side store for the auth token and avatar hand-off
//
// Holds what a browser front-end keeps in cookies and local storage: the
// bearer token issued at login (with a max age) and the avatar picked in the
// catalog. Persisted to ~/.avatar-studio/state.json with explicit load/save.

pub mod client;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::infra::paths;

/// Anything that can hand out the current auth token.
pub trait TokenSource: Send + Sync {
    fn auth_token(&self) -> Option<String>;
}

/// Bearer token plus the window it stays valid for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub max_age_secs: i64,
}

impl StoredToken {
    pub fn new(token: impl Into<String>, max_age: Duration) -> Self {
        Self {
            token: token.into(),
            issued_at: Utc::now(),
            max_age_secs: max_age.num_seconds(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.issued_at + Duration::seconds(self.max_age_secs)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalState {
    #[serde(default)]
    pub auth: Option<StoredToken>,
    /// Avatar chosen in the catalog, consumed by the next session start.
    #[serde(default)]
    pub selected_avatar_id: Option<String>,
}

/// Shared, persisted client state. `path == None` keeps everything in memory.
#[derive(Debug, Default)]
pub struct LocalStore {
    path: Option<PathBuf>,
    state: RwLock<LocalState>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from the default location; an absent file yields an empty store.
    pub fn open_default() -> Result<Self> {
        Self::open(&paths::local_state_path())
    }

    pub fn open(path: &Path) -> Result<Self> {
        let state = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            LocalState::default()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            state: RwLock::new(state),
        })
    }

    /// Save atomically (write to .tmp then rename, chmod 600).
    pub fn save(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = {
            let state = self.read();
            serde_json::to_string_pretty(&*state)?
        };

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn set_token(&self, token: &str, max_age: Duration) -> Result<()> {
        self.write().auth = Some(StoredToken::new(token, max_age));
        self.save()
    }

    pub fn clear_token(&self) -> Result<()> {
        self.write().auth = None;
        self.save()
    }

    /// The stored token, unless it has outlived its max age.
    pub fn token(&self) -> Option<String> {
        self.read()
            .auth
            .as_ref()
            .filter(|t| !t.is_expired())
            .map(|t| t.token.clone())
    }

    pub fn select_avatar(&self, avatar_id: &str) -> Result<()> {
        self.write().selected_avatar_id = Some(avatar_id.to_string());
        self.save()
    }

    /// Remove and return the selected avatar id.
    pub fn take_selected_avatar(&self) -> Result<Option<String>> {
        let taken = self.write().selected_avatar_id.take();
        if taken.is_some() {
            self.save()?;
        }
        Ok(taken)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, LocalState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, LocalState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenSource for LocalStore {
    fn auth_token(&self) -> Option<String> {
        self.token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip_in_memory() {
        let store = LocalStore::in_memory();
        assert!(store.auth_token().is_none());
        store.set_token("tok-1", Duration::days(30)).unwrap();
        assert_eq!(store.auth_token().as_deref(), Some("tok-1"));
        store.clear_token().unwrap();
        assert!(store.auth_token().is_none());
    }

    #[test]
    fn test_expired_token_is_hidden() {
        let store = LocalStore::in_memory();
        store.set_token("old", Duration::seconds(0)).unwrap();
        assert!(store.auth_token().is_none());
    }

    #[test]
    fn test_expiry_boundary() {
        let t = StoredToken::new("x", Duration::days(30));
        assert!(!t.is_expired_at(t.issued_at + Duration::days(29)));
        assert!(t.is_expired_at(t.issued_at + Duration::days(30)));
    }

    #[test]
    fn test_selected_avatar_taken_once() {
        let store = LocalStore::in_memory();
        store.select_avatar("Anna_public").unwrap();
        assert_eq!(
            store.take_selected_avatar().unwrap().as_deref(),
            Some("Anna_public")
        );
        assert!(store.take_selected_avatar().unwrap().is_none());
    }

    #[test]
    fn test_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = LocalStore::open(&path).unwrap();
        store.set_token("persisted", Duration::days(1)).unwrap();
        store.select_avatar("av-1").unwrap();

        let reopened = LocalStore::open(&path).unwrap();
        assert_eq!(reopened.auth_token().as_deref(), Some("persisted"));
        assert_eq!(
            reopened.take_selected_avatar().unwrap().as_deref(),
            Some("av-1")
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = LocalStore::open(&path).unwrap();
        store.set_token("secret", Duration::days(1)).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

// src/infra/paths.rs — Config and state path management
//
// All paths respect the AVATAR_STUDIO_HOME environment variable for isolation.
// When unset, everything lives under ~/.avatar-studio/.

use std::path::PathBuf;

/// Returns the AVATAR_STUDIO_HOME override, if set.
fn studio_home() -> Option<PathBuf> {
    std::env::var_os("AVATAR_STUDIO_HOME").map(PathBuf::from)
}

/// Configuration directory: $AVATAR_STUDIO_HOME/ or ~/.avatar-studio/
pub fn config_dir() -> PathBuf {
    if let Some(home) = studio_home() {
        return home;
    }
    dirs_home().join(".avatar-studio")
}

/// Home directory (falls back to the working directory on exotic platforms)
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Client-side state: auth token and selected avatar
pub fn local_state_path() -> PathBuf {
    config_dir().join("state.json")
}

/// Ensure the config directory exists
pub async fn ensure_dirs() -> anyhow::Result<()> {
    tokio::fs::create_dir_all(config_dir()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_config_dir() {
        let dir = config_dir();
        assert!(config_file_path().starts_with(&dir));
        assert!(local_state_path().starts_with(&dir));
        assert_eq!(local_state_path().file_name().unwrap(), "state.json");
    }
}

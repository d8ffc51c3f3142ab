// src/settings.rs

//! Persisted runtime settings.
//!
//! Holds the process-wide test-mode flag. The file is re-read on every
//! per-post decision so an external toggle (or the `test-mode` subcommand)
//! takes effect mid-run without a restart.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct SettingsData {
    #[serde(default)]
    test_mode: bool,
}

/// Read-through settings store under the data directory.
#[derive(Debug, Clone)]
pub struct Settings {
    dir: PathBuf,
}

impl Settings {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Whether test mode is enabled. Missing or unreadable settings count as
    /// disabled.
    pub async fn test_mode(&self) -> bool {
        self.load().await.test_mode
    }

    /// Persist the test-mode flag.
    pub async fn set_test_mode(&self, enabled: bool) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(AppError::storage_write)?;

        let mut data = self.load().await;
        data.test_mode = enabled;

        let bytes = serde_json::to_vec_pretty(&data).map_err(AppError::storage_write)?;
        let path = self.path();
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(AppError::storage_write)?;
        file.write_all(&bytes)
            .await
            .map_err(AppError::storage_write)?;
        file.flush().await.map_err(AppError::storage_write)?;
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(AppError::storage_write)
    }

    async fn load(&self) -> SettingsData {
        match tokio::fs::read(self.path()).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                log::warn!("Settings file unreadable: {}; using defaults", e);
                SettingsData::default()
            }),
            Err(_) => SettingsData::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_defaults_to_disabled() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::new(tmp.path());
        assert!(!settings.test_mode().await);
    }

    #[tokio::test]
    async fn test_toggle_round_trip() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::new(tmp.path());

        settings.set_test_mode(true).await.unwrap();
        assert!(settings.test_mode().await);

        settings.set_test_mode(false).await.unwrap();
        assert!(!settings.test_mode().await);
    }

    #[tokio::test]
    async fn test_external_edit_is_picked_up() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::new(tmp.path());
        settings.set_test_mode(false).await.unwrap();

        std::fs::write(tmp.path().join(SETTINGS_FILE), br#"{"test_mode": true}"#).unwrap();
        assert!(settings.test_mode().await);
    }

    #[tokio::test]
    async fn test_corrupt_file_counts_as_disabled() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::new(tmp.path());

        std::fs::write(tmp.path().join(SETTINGS_FILE), b"not json").unwrap();
        assert!(!settings.test_mode().await);
    }
}

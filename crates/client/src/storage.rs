//! Persistent key-value storage.
//!
//! Values are stored as JSON files, one per key, in a single directory. The
//! default directory is `qa-playground/` inside the platform config dir:
//!   - Linux: `~/.config/qa-playground/`
//!   - macOS: `~/Library/Application Support/qa-playground/`
//!   - Windows: `%APPDATA%\qa-playground\`

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

const APP_DIR: &str = "qa-playground";

/// Directory-backed JSON store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage in the platform config directory, if one can be determined.
    pub fn platform_default() -> Option<Self> {
        let config_dir = dirs::config_dir()?;
        Some(Self::new(config_dir.join(APP_DIR)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a value.
    ///
    /// Returns `true` if the operation succeeded.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.save_raw(key, &json),
            Err(e) => {
                tracing::warn!("Failed to serialize '{}' for storage: {}", key, e);
                false
            }
        }
    }

    /// Load a value.
    ///
    /// Returns `None` if the key doesn't exist or deserialization fails.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = self.load_raw(key)?;
        serde_json::from_str(&json).ok()
    }

    /// Remove a value.
    pub fn remove(&self, key: &str) {
        let path = self.file_path(key);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }

    /// Check if a key exists.
    pub fn exists(&self, key: &str) -> bool {
        self.file_path(key).is_file()
    }

    fn file_path(&self, key: &str) -> PathBuf {
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.dir.join(format!("{safe_key}.json"))
    }

    fn save_raw(&self, key: &str, value: &str) -> bool {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!("Failed to create {}: {}", self.dir.display(), e);
            return false;
        }
        std::fs::write(self.file_path(key), value).is_ok()
    }

    fn load_raw(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.file_path(key)).ok()
    }
}

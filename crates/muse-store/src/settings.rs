//! Key-value settings, kept as a small JSON file beside the database.

use crate::error::Result;
use muse_core::AppSettings;
use std::fs;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SETTINGS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored settings, or defaults when nothing was saved yet.
    pub fn load(&self) -> Result<AppSettings> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(AppSettings::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Like [`load`](Self::load), but a corrupt file yields defaults.
    pub fn load_or_default(&self) -> AppSettings {
        self.load().unwrap_or_else(|err| {
            log::warn!("settings at {} unreadable, using defaults: {err}", self.path.display());
            AppSettings::default()
        })
    }

    pub fn save(&self, settings: &AppSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

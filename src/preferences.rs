//! Player preferences
//!
//! Theme and last played scenario, loaded once per process and handed to
//! the front end. Changes are published on a `tokio::sync::watch` channel
//! and written back to the preferences file when one is configured.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::EscapeRoomError;

/// Color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Dark background
    #[default]
    Dark,
    /// Light background
    Light,
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dark => f.write_str("dark"),
            Self::Light => f.write_str("light"),
        }
    }
}

/// Persisted preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    /// Color theme
    pub theme: Theme,
    /// Scenario to resume when none is requested
    pub last_scenario: Option<String>,
}

/// Owner of the current [`Preferences`].
#[derive(Debug)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    tx: watch::Sender<Preferences>,
}

impl PreferenceStore {
    /// A store that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_value(None, Preferences::default())
    }

    fn with_value(path: Option<PathBuf>, prefs: Preferences) -> Self {
        let (tx, _rx) = watch::channel(prefs);
        Self { path, tx }
    }

    /// Loads preferences from `path`.
    ///
    /// A missing file yields defaults. An unreadable JSON document is logged
    /// and replaced by defaults on the next write.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Self, EscapeRoomError> {
        let prefs = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring unreadable preferences file");
                Preferences::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), ?prefs, "preferences loaded");
        Ok(Self::with_value(Some(path.to_path_buf()), prefs))
    }

    /// Opens `path` if given, otherwise an in-memory store.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn open(path: Option<&Path>) -> Result<Self, EscapeRoomError> {
        path.map_or_else(|| Ok(Self::in_memory()), Self::load)
    }

    /// Current preferences.
    #[must_use]
    pub fn get(&self) -> Preferences {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.tx.subscribe()
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Sets the theme.
    ///
    /// # Errors
    ///
    /// Returns an error if the preferences file cannot be written.
    pub fn set_theme(&self, theme: Theme) -> Result<(), EscapeRoomError> {
        self.update(|prefs| {
            let changed = prefs.theme != theme;
            prefs.theme = theme;
            changed
        })
    }

    /// Records the scenario being played.
    ///
    /// # Errors
    ///
    /// Returns an error if the preferences file cannot be written.
    pub fn set_last_scenario(&self, scenario_id: &str) -> Result<(), EscapeRoomError> {
        self.update(|prefs| {
            let changed = prefs.last_scenario.as_deref() != Some(scenario_id);
            prefs.last_scenario = Some(scenario_id.to_string());
            changed
        })
    }

    fn update(&self, modify: impl FnOnce(&mut Preferences) -> bool) -> Result<(), EscapeRoomError> {
        if self.tx.send_if_modified(modify) {
            self.save()?;
        }
        Ok(())
    }

    fn save(&self) -> Result<(), EscapeRoomError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&*self.tx.borrow())?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "preferences saved");
        Ok(())
    }
}

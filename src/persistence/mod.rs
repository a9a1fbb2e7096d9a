//! Run persistence
//!
//! Completed runs live in an external store reached only through the
//! operations of [`RunStore`]. Two stores ship with the crate:
//!
//! - [`MemoryStore`]: in-process, used by `play` without `--store-url` and
//!   behind `store serve`
//! - [`HttpStore`]: a remote store speaking the `/api/escape-runs` JSON API
//!
//! [`RunsClient`] sits in front of either and applies the client-side
//! rules (name trimming, degraded listing, idempotent delete).

pub mod client;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

pub use client::{RunsClient, RunsPage};
pub use http::HttpStore;
pub use memory::MemoryStore;

/// Maximum runs returned by one listing.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Maximum display name length, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 60;

// ============================================================================
// Wire types
// ============================================================================

/// Snapshot of one stage's answer at save time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageAnswer {
    /// Stage id
    pub stage_id: String,
    /// Stage title
    pub title: String,
    /// Zero-based stage index
    pub index: usize,
    /// Countdown length of the stage
    pub time_limit_seconds: u32,
    /// Last submitted answer (empty if none)
    #[serde(default)]
    pub answer: String,
}

/// A completed run to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRun {
    /// Scenario id
    pub scenario_id: String,
    /// Scenario name at save time
    pub scenario_name: String,
    /// Optional player-chosen name
    #[serde(default, alias = "runName")]
    pub display_name: Option<String>,
    /// Whether the run was completed
    pub success: bool,
    /// Seconds from run start to save
    pub duration_seconds: u64,
    /// Per-stage answers in stage order
    #[serde(default, alias = "stages")]
    pub stage_answers: Vec<StageAnswer>,
}

/// A run as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRun {
    /// Store-assigned id
    pub id: String,
    /// Scenario id
    pub scenario_id: String,
    /// Scenario name at save time
    pub scenario_name: String,
    /// Optional player-chosen name
    #[serde(default, alias = "runName")]
    pub display_name: Option<String>,
    /// Whether the run was completed
    pub success: bool,
    /// Seconds from run start to save
    pub duration_seconds: u64,
    /// When the store created the record
    pub created_at: DateTime<Utc>,
    /// Per-stage answers in stage order
    #[serde(default, alias = "stages")]
    pub stage_answers: Vec<StageAnswer>,
}

impl SavedRun {
    /// Display name, falling back to the scenario name.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.scenario_name)
    }
}

/// Body of a rename request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    /// New name; `null` clears it
    #[serde(default, alias = "runName")]
    pub display_name: Option<String>,
}

// ============================================================================
// Store trait
// ============================================================================

/// Durable storage for completed runs.
///
/// Implementations must be usable from spawned tasks.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Stores a run and returns it with its id and creation time.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the run could not be stored.
    async fn create(&self, run: NewRun) -> Result<SavedRun, PersistenceError>;

    /// Runs for `scenario_id` (every scenario when `None`), newest first,
    /// at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the store cannot be read.
    async fn list(
        &self,
        scenario_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SavedRun>, PersistenceError>;

    /// A single run by id.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] for an unknown id.
    async fn get(&self, id: &str) -> Result<SavedRun, PersistenceError>;

    /// Sets or clears a run's display name.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] for an unknown id.
    async fn rename(
        &self,
        id: &str,
        display_name: Option<String>,
    ) -> Result<SavedRun, PersistenceError>;

    /// Removes a run.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] for an unknown id.
    async fn delete(&self, id: &str) -> Result<(), PersistenceError>;

    /// Short backend name for logs and events.
    fn backend(&self) -> &'static str;
}

/// Trims a display name; `None` if nothing is left.
///
/// Longer names are cut to [`MAX_DISPLAY_NAME_CHARS`] characters.
#[must_use]
pub fn clean_display_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_DISPLAY_NAME_CHARS).collect::<String>().trim_end().to_string())
}

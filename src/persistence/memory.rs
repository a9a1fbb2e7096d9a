//! In-memory run store.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::observability::metrics;

use super::{DEFAULT_PAGE_SIZE, MAX_DISPLAY_NAME_CHARS, NewRun, RunStore, SavedRun};

#[derive(Debug)]
struct StoredRun {
    seq: u64,
    run: SavedRun,
}

/// Process-local [`RunStore`].
///
/// Runs are lost when the process exits. Ids are random UUIDs; an insertion
/// counter breaks ties between runs created in the same instant.
#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: DashMap<String, StoredRun>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored runs across all scenarios.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether the store holds no runs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

fn validate_name(display_name: Option<String>) -> Result<Option<String>, PersistenceError> {
    let Some(name) = display_name else {
        return Ok(None);
    };
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(PersistenceError::InvalidInput(format!(
            "Display name must be at most {MAX_DISPLAY_NAME_CHARS} characters."
        )));
    }
    Ok(Some(trimmed.to_string()))
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create(&self, run: NewRun) -> Result<SavedRun, PersistenceError> {
        if run.scenario_id.trim().is_empty() {
            return Err(PersistenceError::InvalidInput(
                "scenarioId is required.".to_string(),
            ));
        }

        let saved = SavedRun {
            id: Uuid::new_v4().to_string(),
            scenario_id: run.scenario_id,
            scenario_name: run.scenario_name,
            display_name: validate_name(run.display_name)?,
            success: run.success,
            duration_seconds: run.duration_seconds,
            created_at: Utc::now(),
            stage_answers: run.stage_answers,
        };

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.runs.insert(
            saved.id.clone(),
            StoredRun {
                seq,
                run: saved.clone(),
            },
        );
        metrics::set_stored_runs(self.runs.len());
        debug!(id = %saved.id, scenario = %saved.scenario_id, "run stored");
        Ok(saved)
    }

    async fn list(
        &self,
        scenario_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SavedRun>, PersistenceError> {
        let mut matching: Vec<(u64, SavedRun)> = self
            .runs
            .iter()
            .filter(|entry| scenario_id.is_none_or(|id| entry.run.scenario_id == id))
            .map(|entry| (entry.seq, entry.run.clone()))
            .collect();

        matching.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });

        Ok(matching
            .into_iter()
            .take(limit.min(DEFAULT_PAGE_SIZE))
            .map(|(_, run)| run)
            .collect())
    }

    async fn get(&self, id: &str) -> Result<SavedRun, PersistenceError> {
        self.runs
            .get(id)
            .map(|entry| entry.run.clone())
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    async fn rename(
        &self,
        id: &str,
        display_name: Option<String>,
    ) -> Result<SavedRun, PersistenceError> {
        let display_name = validate_name(display_name)?;
        let mut entry = self
            .runs
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        entry.run.display_name = display_name;
        Ok(entry.run.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.runs
            .remove(id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        metrics::set_stored_runs(self.runs.len());
        debug!(id, "run deleted");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

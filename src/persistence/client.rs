//! Run persistence client.
//!
//! The session's view of the store. Applies the client-side rules the store
//! does not: names are trimmed and capped before sending, listing failures
//! degrade to an empty page with a message, and deleting a run that is
//! already gone counts as success.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::observability::metrics;

use super::{DEFAULT_PAGE_SIZE, NewRun, RunStore, SavedRun, clean_display_name};

/// Message for a rename whose name is blank after trimming.
pub const EMPTY_NAME_MESSAGE: &str = "Name cannot be empty.";

/// One listing of a scenario's saved runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunsPage {
    /// Scenario the listing was requested for
    pub scenario_id: String,
    /// Runs, newest first
    pub runs: Vec<SavedRun>,
    /// Why the listing is empty, if it failed
    pub error: Option<String>,
}

/// Cloneable handle to a [`RunStore`].
#[derive(Clone)]
pub struct RunsClient {
    store: Arc<dyn RunStore>,
    page_size: usize,
}

impl std::fmt::Debug for RunsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunsClient")
            .field("backend", &self.store.backend())
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl RunsClient {
    /// Wraps `store` with the default page size.
    #[must_use]
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Backend name of the wrapped store.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Stores a completed run.
    ///
    /// # Errors
    ///
    /// Passes through the store's [`PersistenceError`].
    pub async fn create(&self, mut run: NewRun) -> Result<SavedRun, PersistenceError> {
        run.display_name = run.display_name.as_deref().and_then(clean_display_name);
        timed("create", self.store.create(run)).await
    }

    /// Lists runs for `scenario_id`.
    ///
    /// Never fails: a store error yields an empty page carrying the message.
    pub async fn list(&self, scenario_id: &str) -> RunsPage {
        match timed("list", self.store.list(Some(scenario_id), self.page_size)).await {
            Ok(runs) => {
                debug!(scenario = scenario_id, count = runs.len(), "runs listed");
                RunsPage {
                    scenario_id: scenario_id.to_string(),
                    runs,
                    error: None,
                }
            }
            Err(e) => {
                warn!(scenario = scenario_id, error = %e, "failed to list runs");
                RunsPage {
                    scenario_id: scenario_id.to_string(),
                    runs: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Renames a run.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidInput`] without calling the store
    /// if `name` is blank; otherwise passes through the store's error.
    pub async fn rename(&self, id: &str, name: &str) -> Result<SavedRun, PersistenceError> {
        let Some(name) = clean_display_name(name) else {
            return Err(PersistenceError::InvalidInput(EMPTY_NAME_MESSAGE.to_string()));
        };
        timed("rename", self.store.rename(id, Some(name))).await
    }

    /// Deletes a run. An id the store no longer knows is treated as deleted.
    ///
    /// # Errors
    ///
    /// Passes through any store error other than `NotFound`.
    pub async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        match timed("delete", self.store.delete(id)).await {
            Err(PersistenceError::NotFound(_)) => {
                debug!(id, "run already gone");
                Ok(())
            }
            other => other,
        }
    }
}

async fn timed<T>(
    operation: &'static str,
    fut: impl Future<Output = Result<T, PersistenceError>>,
) -> Result<T, PersistenceError> {
    let started = Instant::now();
    let result = fut.await;
    metrics::record_store_request(operation, result.is_ok(), started.elapsed());
    result
}

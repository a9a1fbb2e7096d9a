//! Run state representation
//!
//! Everything the engine tracks about the run in progress. Owned
//! exclusively by [`StageEngine`](super::StageEngine); other components only
//! ever see it by shared reference.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::validate::Verdict;

/// Where the current stage stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Nothing judged yet on this stage
    InProgress,
    /// Last verdict on this stage was a success
    StagePassed,
    /// Last verdict on this stage was a failure; retry allowed
    StageFailedRetry,
    /// Timer expired; locked until reset
    RunFailed,
    /// Final stage passed and advanced past
    RunComplete,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::InProgress => "in progress",
            Self::StagePassed => "stage passed",
            Self::StageFailedRetry => "try again",
            Self::RunFailed => "run failed",
            Self::RunComplete => "run complete",
        };
        f.write_str(label)
    }
}

/// Follow-up work requested by the engine.
///
/// The engine never touches the timer or the store itself; the session
/// drains these after every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Configure the countdown for a newly entered stage
    ConfigureTimer {
        /// Countdown length
        seconds: u32,
    },
    /// Stop the countdown (final stage solved)
    StopTimer,
    /// Fetch saved runs for a scenario
    LoadRuns {
        /// Scenario whose runs to list
        scenario_id: String,
    },
}

/// Record of a stage advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageTransition {
    /// Stage index we advanced from
    pub from_stage: usize,
    /// Stage index we are now on (equal to `from_stage` on completion)
    pub to_stage: usize,
    /// Whether this advance completed the run
    pub completed: bool,
}

/// State of one run through a scenario.
#[derive(Debug, Clone)]
pub struct RunState {
    /// Scenario being played
    pub scenario_id: String,
    /// Current stage index
    pub stage_index: usize,
    /// Last submitted answer per stage id
    pub answers: HashMap<String, String>,
    /// Text currently in the answer entry
    pub draft: String,
    /// Icon picked on the current stage, if any
    pub selected_icon: Option<String>,
    /// When this run started
    pub started_at: DateTime<Utc>,
    /// Set by timer expiry; cleared only by reset
    pub failed: bool,
    /// Whether the correct icon was picked on the current stage
    pub icon_unlocked: bool,
    /// Verdict for the current stage, if any
    pub verdict: Option<Verdict>,
    /// Current status
    pub status: RunStatus,
    /// Distinguishes this run from earlier runs in the same session
    pub epoch: u64,
}

impl RunState {
    /// A fresh run at stage 0.
    #[must_use]
    pub fn new(scenario_id: impl Into<String>, epoch: u64) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            stage_index: 0,
            answers: HashMap::new(),
            draft: String::new(),
            selected_icon: None,
            started_at: Utc::now(),
            failed: false,
            icon_unlocked: false,
            verdict: None,
            status: RunStatus::InProgress,
            epoch,
        }
    }

    /// Last submitted answer for `stage_id`.
    #[must_use]
    pub fn answer(&self, stage_id: &str) -> Option<&str> {
        self.answers.get(stage_id).map(String::as_str)
    }

    /// Whether the current verdict is a success.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict.as_ref().is_some_and(|v| v.ok)
    }

    /// Whole seconds since the run started, never negative.
    #[must_use]
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((now - self.started_at).num_seconds()).unwrap_or(0)
    }
}

//! Stage progression engine
//!
//! The `StageEngine` owns the run state and decides every transition:
//! validating answers, gating icon stages, advancing, failing on timer
//! expiry and resetting. It is synchronous and never performs I/O. Work
//! that involves the timer or the store is queued as [`Effect`]s for the
//! session to drain.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::schema::{Scenario, Stage};
use crate::error::EngineError;
use crate::observability::metrics;
use crate::scenarios::Catalog;
use crate::validate::{Verdict, validate};

use super::state::{Effect, RunState, RunStatus, StageTransition};

/// Verdict message when an icon stage is answered before its icon is picked.
pub const ICON_REQUIRED_MESSAGE: &str = "Pick the correct icon first.";

/// Verdict message when the countdown runs out.
pub const TIME_UP_MESSAGE: &str = "Time's up! Reset the run to try again.";

/// Stage progression state machine.
///
/// Invariants:
/// - a stage's validator never runs on an icon stage until its icon is unlocked
/// - once `failed`, nothing validates or advances until a reset
/// - moving from stage N to N+1 requires a success verdict on stage N
#[derive(Debug)]
pub struct StageEngine {
    catalog: Catalog,
    scenario: Arc<Scenario>,
    run: RunState,
    effects: VecDeque<Effect>,
    epoch: u64,
}

impl StageEngine {
    /// Creates an engine on `initial` (or the first catalog scenario).
    ///
    /// The first run's `ConfigureTimer` and `LoadRuns` effects are queued.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyCatalog`] if there is nothing to play, or
    /// [`EngineError::UnknownScenario`] if `initial` is not in the catalog.
    pub fn new(catalog: Catalog, initial: Option<&str>) -> Result<Self, EngineError> {
        let scenario = match initial {
            Some(id) => catalog.resolve(id)?,
            None => Arc::clone(catalog.first().ok_or(EngineError::EmptyCatalog)?),
        };

        let mut engine = Self {
            run: RunState::new(scenario.id.clone(), 0),
            catalog,
            scenario,
            effects: VecDeque::new(),
            epoch: 0,
        };
        engine.begin_run();
        Ok(engine)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Scenarios this engine can switch between.
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Scenario being played.
    #[must_use]
    pub const fn scenario(&self) -> &Arc<Scenario> {
        &self.scenario
    }

    /// The run in progress.
    #[must_use]
    pub const fn run(&self) -> &RunState {
        &self.run
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.run.status
    }

    /// Verdict for the current stage, if any.
    #[must_use]
    pub const fn verdict(&self) -> Option<&Verdict> {
        self.run.verdict.as_ref()
    }

    /// Whether the timer failed this run.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.run.failed
    }

    /// Whether the final stage has been passed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current_index() == self.scenario.last_index() && self.run.passed()
    }

    /// Whether the stage being played is the last one.
    #[must_use]
    pub fn is_last_stage(&self) -> bool {
        self.current_index() == self.scenario.last_index()
    }

    /// Index of the stage being played.
    ///
    /// An index past the end is a configuration defect; it is logged and
    /// clamped to the last stage.
    #[must_use]
    pub fn current_index(&self) -> usize {
        let last = self.scenario.last_index();
        if self.run.stage_index > last {
            error!(
                scenario = %self.scenario.id,
                index = self.run.stage_index,
                last,
                "stage index out of range; clamping to last stage"
            );
            return last;
        }
        self.run.stage_index
    }

    /// Stage being played.
    #[must_use]
    pub fn current_stage(&self) -> &Stage {
        &self.scenario.stages[self.current_index()]
    }

    /// Hint for the stage being played.
    #[must_use]
    pub fn hint(&self) -> &str {
        &self.current_stage().hint
    }

    /// Takes every queued effect, oldest first.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        self.effects.drain(..).collect()
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Starts a new run on scenario `id`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownScenario`] and leaves the current run
    /// untouched if `id` is not in the catalog.
    pub fn select_scenario(&mut self, id: &str) -> Result<(), EngineError> {
        self.scenario = self.catalog.resolve(id)?;
        self.begin_run();
        Ok(())
    }

    /// Starts the current scenario over with a fresh start time.
    pub fn reset(&mut self) {
        info!(scenario = %self.scenario.id, "run reset");
        self.begin_run();
    }

    fn begin_run(&mut self) {
        self.epoch += 1;
        self.run = RunState::new(self.scenario.id.clone(), self.epoch);

        let first = &self.scenario.stages[0];
        self.effects.push_back(Effect::ConfigureTimer {
            seconds: first.time_limit_seconds,
        });
        self.effects.push_back(Effect::LoadRuns {
            scenario_id: self.scenario.id.clone(),
        });

        metrics::record_run_started(&self.scenario.id);
        metrics::set_current_stage(0);
        info!(
            scenario = %self.scenario.id,
            epoch = self.epoch,
            stages = self.scenario.stages.len(),
            "run started"
        );
    }

    /// Updates the answer-entry text without judging it.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.run.draft = text.into();
    }

    /// Judges `text` for the current stage.
    ///
    /// Returns `None` once the run has failed. After completion the answer
    /// is locked and the final verdict is returned unchanged.
    pub fn submit_answer(&mut self, text: &str) -> Option<Verdict> {
        if self.run.failed {
            debug!("answer ignored: run failed");
            return None;
        }
        if self.is_complete() {
            debug!("answer ignored: run complete");
            return self.run.verdict.clone();
        }

        let scenario = Arc::clone(&self.scenario);
        let stage = &scenario.stages[self.current_index()];
        self.run.draft = text.to_string();

        if stage.is_icon_choice() && !self.run.icon_unlocked {
            return Some(self.record_verdict(Verdict::fail(ICON_REQUIRED_MESSAGE)));
        }

        self.run.answers.insert(stage.id.clone(), text.to_string());
        let verdict = validate(&stage.validator, text);
        metrics::record_answer(stage.validator.kind(), verdict.ok);
        debug!(stage = %stage.id, ok = verdict.ok, "answer checked");

        Some(self.record_verdict(verdict))
    }

    /// Picks an icon on an icon stage.
    ///
    /// Unlocks the stage iff `choice_id` is the correct option. A no-op on
    /// other stages. Same failed/complete locks as
    /// [`submit_answer`](Self::submit_answer).
    pub fn select_icon(&mut self, choice_id: &str) -> Option<Verdict> {
        if self.run.failed {
            debug!("icon ignored: run failed");
            return None;
        }
        if self.is_complete() {
            debug!("icon ignored: run complete");
            return self.run.verdict.clone();
        }

        let scenario = Arc::clone(&self.scenario);
        let stage = &scenario.stages[self.current_index()];
        let Some(icon) = stage.icon_choice.as_ref() else {
            warn!(stage = %stage.id, choice = choice_id, "icon picked on a stage without icons");
            return None;
        };

        self.run.answers.insert(stage.id.clone(), choice_id.to_string());
        self.run.selected_icon = Some(choice_id.to_string());

        let ok = choice_id == icon.correct_id;
        self.run.icon_unlocked = ok;
        metrics::record_icon_selection(ok);
        debug!(stage = %stage.id, choice = choice_id, ok, "icon selected");

        let verdict = if ok {
            Verdict::pass(icon.pass.as_str())
        } else {
            Verdict::fail(icon.fail.as_str())
        };
        Some(self.record_verdict(verdict))
    }

    fn record_verdict(&mut self, verdict: Verdict) -> Verdict {
        self.run.status = if verdict.ok {
            RunStatus::StagePassed
        } else {
            RunStatus::StageFailedRetry
        };
        self.run.verdict = Some(verdict.clone());

        if verdict.ok && self.is_last_stage() {
            self.effects.push_back(Effect::StopTimer);
        }
        verdict
    }

    /// Moves past a passed stage.
    ///
    /// On the last stage this completes the run; afterwards it is a no-op.
    pub fn advance(&mut self) -> Option<StageTransition> {
        if self.run.failed || !self.run.passed() || self.run.status == RunStatus::RunComplete {
            return None;
        }

        let from = self.current_index();
        if self.is_last_stage() {
            self.run.status = RunStatus::RunComplete;
            metrics::record_stage_transition(true);
            info!(scenario = %self.scenario.id, "run complete");
            return Some(StageTransition {
                from_stage: from,
                to_stage: from,
                completed: true,
            });
        }

        let to = from + 1;
        self.run.stage_index = to;
        self.run.draft.clear();
        self.run.verdict = None;
        self.run.icon_unlocked = false;
        self.run.selected_icon = None;
        self.run.status = RunStatus::InProgress;

        let seconds = self.scenario.stages[to].time_limit_seconds;
        self.effects.push_back(Effect::ConfigureTimer { seconds });

        metrics::record_stage_transition(false);
        metrics::set_current_stage(to);
        info!(from, to, "stage advanced");

        Some(StageTransition {
            from_stage: from,
            to_stage: to,
            completed: false,
        })
    }

    /// Applies a countdown expiry.
    ///
    /// Returns `false` (nothing changed) if the run already failed or
    /// completed.
    pub fn on_timer_expired(&mut self) -> bool {
        if self.run.failed || self.is_complete() {
            debug!("timer expiry ignored");
            return false;
        }

        self.run.failed = true;
        self.run.status = RunStatus::RunFailed;
        self.run.verdict = Some(Verdict::fail(TIME_UP_MESSAGE));
        metrics::record_timer_expired();
        info!(stage = %self.current_stage().id, "time's up");
        true
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioLoader;

    fn engine_on(id: &str) -> StageEngine {
        let catalog = Catalog::builtin(&ScenarioLoader::with_defaults()).unwrap();
        let mut engine = StageEngine::new(catalog, Some(id)).unwrap();
        engine.drain_effects();
        engine
    }

    fn pass_format_lock_stage(engine: &mut StageEngine) {
        let answer = match engine.current_index() {
            0 => "function add(a,b){return a+b}",
            1 => r#"{"id":42,"name":"Keyboard","price":199.99}"#,
            _ => "for (let i = 0; i <= 1000; i++) { console.log(i); }",
        };
        assert!(engine.submit_answer(answer).unwrap().ok);
    }

    #[test]
    fn new_queues_first_stage_effects() {
        let catalog = Catalog::builtin(&ScenarioLoader::with_defaults()).unwrap();
        let mut engine = StageEngine::new(catalog, None).unwrap();
        assert_eq!(engine.scenario().id, "format-lock");
        assert_eq!(
            engine.drain_effects(),
            vec![
                Effect::ConfigureTimer { seconds: 140 },
                Effect::LoadRuns {
                    scenario_id: "format-lock".to_string()
                },
            ]
        );
        assert!(engine.drain_effects().is_empty());
    }

    #[test]
    fn empty_catalog_is_an_error() {
        let err = StageEngine::new(Catalog::default(), None).unwrap_err();
        assert!(matches!(err, EngineError::EmptyCatalog));
    }

    #[test]
    fn unknown_scenario_leaves_state_untouched() {
        let mut engine = engine_on("format-lock");
        pass_format_lock_stage(&mut engine);
        let epoch = engine.run().epoch;

        let err = engine.select_scenario("debug-cript").unwrap_err();
        assert!(err.to_string().contains("did you mean 'debug-crypt'"));
        assert_eq!(engine.scenario().id, "format-lock");
        assert_eq!(engine.run().epoch, epoch);
        assert_eq!(engine.status(), RunStatus::StagePassed);
        assert!(engine.drain_effects().is_empty());
    }

    #[test]
    fn select_scenario_starts_fresh_run() {
        let mut engine = engine_on("format-lock");
        pass_format_lock_stage(&mut engine);
        engine.advance();
        engine.drain_effects();

        engine.select_scenario("debug-crypt").unwrap();
        assert_eq!(engine.current_index(), 0);
        assert!(engine.verdict().is_none());
        assert!(engine.run().answers.is_empty());
        assert_eq!(
            engine.drain_effects(),
            vec![
                Effect::ConfigureTimer { seconds: 60 },
                Effect::LoadRuns {
                    scenario_id: "debug-crypt".to_string()
                },
            ]
        );
    }

    #[test]
    fn wrong_then_right_answer() {
        let mut engine = engine_on("format-lock");
        let wrong = engine.submit_answer("function add(a,b){return a-b}").unwrap();
        assert!(!wrong.ok);
        assert_eq!(engine.status(), RunStatus::StageFailedRetry);
        assert!(engine.advance().is_none());

        let right = engine.submit_answer("function add(a,b){return a+b}").unwrap();
        assert!(right.ok);
        assert_eq!(engine.status(), RunStatus::StagePassed);
        assert_eq!(
            engine.run().answer("s1"),
            Some("function add(a,b){return a+b}")
        );
    }

    #[test]
    fn resubmitting_same_answer_gives_same_verdict() {
        let mut engine = engine_on("format-lock");
        let first = engine.submit_answer(r#"{"id":"42"}"#);
        let second = engine.submit_answer(r#"{"id":"42"}"#);
        assert_eq!(first, second);
    }

    #[test]
    fn advance_requires_success() {
        let mut engine = engine_on("format-lock");
        assert!(engine.advance().is_none());
        assert_eq!(engine.current_index(), 0);

        pass_format_lock_stage(&mut engine);
        let transition = engine.advance().unwrap();
        assert_eq!(
            transition,
            StageTransition {
                from_stage: 0,
                to_stage: 1,
                completed: false
            }
        );
        assert!(engine.verdict().is_none());
        assert!(engine.run().draft.is_empty());
        assert_eq!(
            engine.drain_effects(),
            vec![Effect::ConfigureTimer { seconds: 180 }]
        );
        assert!(engine.advance().is_none());
    }

    #[test]
    fn full_run_completes_and_locks() {
        let mut engine = engine_on("format-lock");
        for _ in 0..2 {
            pass_format_lock_stage(&mut engine);
            engine.advance().unwrap();
        }
        pass_format_lock_stage(&mut engine);
        assert!(engine.is_complete());
        assert_eq!(engine.drain_effects().last(), Some(&Effect::StopTimer));

        let locked = engine.submit_answer("garbage").unwrap();
        assert!(locked.ok);
        assert_eq!(engine.run().answer("s3").unwrap(), "for (let i = 0; i <= 1000; i++) { console.log(i); }");

        let done = engine.advance().unwrap();
        assert!(done.completed);
        assert_eq!(engine.status(), RunStatus::RunComplete);

        for _ in 0..3 {
            assert!(engine.advance().is_none());
            assert_eq!(engine.current_index(), 2);
        }
    }

    #[test]
    fn icon_stage_gates_validator() {
        let mut engine = engine_on("debug-crypt");

        let wrong = engine.select_icon("git").unwrap();
        assert!(!wrong.ok);
        assert_eq!(wrong.message, "Wrong icon. Try another one.");
        assert!(!engine.run().icon_unlocked);

        let gated = engine.submit_answer("debug").unwrap();
        assert!(!gated.ok);
        assert_eq!(gated.message, ICON_REQUIRED_MESSAGE);
        assert_eq!(engine.run().answer("m1"), Some("git"));

        let right = engine.select_icon("debug").unwrap();
        assert!(right.ok);
        assert!(engine.run().icon_unlocked);
        assert_eq!(engine.run().selected_icon.as_deref(), Some("debug"));

        let again = engine.select_icon("debug").unwrap();
        assert_eq!(again, right);

        let relock = engine.select_icon("code").unwrap();
        assert!(!relock.ok);
        assert!(!engine.run().icon_unlocked);
    }

    #[test]
    fn icon_on_plain_stage_is_noop() {
        let mut engine = engine_on("format-lock");
        assert!(engine.select_icon("debug").is_none());
        assert!(engine.verdict().is_none());
        assert!(engine.run().answers.is_empty());
    }

    #[test]
    fn unlocked_icon_stage_runs_validator() {
        let mut engine = engine_on("debug-crypt");
        engine.select_icon("debug");
        let verdict = engine.submit_answer("  DEBUG ").unwrap();
        assert!(verdict.ok);
        assert_eq!(verdict.message, "Correct. Debugger unlocked.");
        let transition = engine.advance().unwrap();
        assert_eq!(transition.to_stage, 1);
        assert!(!engine.run().icon_unlocked);
    }

    #[test]
    fn expiry_locks_until_reset() {
        let mut engine = engine_on("format-lock");
        pass_format_lock_stage(&mut engine);

        assert!(engine.on_timer_expired());
        assert!(engine.is_failed());
        assert_eq!(engine.status(), RunStatus::RunFailed);
        assert_eq!(engine.verdict().unwrap().message, TIME_UP_MESSAGE);

        assert!(engine.submit_answer("function add(a,b){return a+b}").is_none());
        assert!(engine.select_icon("debug").is_none());
        assert!(engine.advance().is_none());
        assert_eq!(engine.current_index(), 0);
        assert!(!engine.on_timer_expired());

        engine.reset();
        assert!(!engine.is_failed());
        assert_eq!(engine.status(), RunStatus::InProgress);
        assert!(engine.submit_answer("function add(a,b){return a+b}").unwrap().ok);
    }

    #[test]
    fn expiry_after_completion_is_ignored() {
        let mut engine = engine_on("debug-crypt");
        engine.select_icon("debug");
        engine.advance();
        engine.submit_answer(r#"{"a":1}"#);
        engine.advance();
        engine.submit_answer(r#"parseInt("  042  ".trim())"#);
        assert!(engine.is_complete());

        assert!(!engine.on_timer_expired());
        assert!(!engine.is_failed());
        assert!(engine.verdict().unwrap().ok);
    }

    #[test]
    fn reset_bumps_epoch_and_queues_effects() {
        let mut engine = engine_on("debug-crypt");
        let before = engine.run().epoch;
        let started = engine.run().started_at;
        engine.reset();
        assert!(engine.run().epoch > before);
        assert!(engine.run().started_at >= started);
        assert_eq!(engine.drain_effects().len(), 2);
    }

    #[test]
    fn out_of_range_index_is_clamped() {
        let mut engine = engine_on("format-lock");
        engine.run.stage_index = 99;
        assert_eq!(engine.current_index(), 2);
        assert_eq!(engine.current_stage().id, "s3");
    }

    #[test]
    fn hint_follows_stage() {
        let mut engine = engine_on("debug-crypt");
        assert!(engine.hint().contains("debugging"));
        engine.select_icon("debug");
        engine.advance();
        assert!(engine.hint().contains("double quotes"));
    }
}

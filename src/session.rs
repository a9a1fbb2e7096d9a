//! Play session
//!
//! A `Session` is the single owner of the engine, the countdown timer and
//! the runs client. User actions are `&mut self` methods; asynchronous
//! signals (timer expiry, finished store calls) arrive on channels and are
//! applied one at a time by [`Session::next_notice`]. Nothing else mutates
//! the run, so an expiry and an advance are always ordered.
//!
//! A countdown can reach zero while its expiry is still queued. Every run
//! action first applies any such expiry, so an answer given after the clock
//! ran out is judged against a failed run.
//!
//! Stale signals are dropped here:
//! - an expiry from a countdown cycle that has since been reconfigured
//! - a runs listing superseded by a newer request
//! - a save completion for a run that has since been reset or replaced

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{EngineError, PersistenceError};
use crate::observability::{Event, EventEmitter};
use crate::persistence::client::EMPTY_NAME_MESSAGE;
use crate::persistence::{NewRun, RunsClient, RunsPage, SavedRun, StageAnswer};
use crate::progression::{Effect, StageEngine, StageTransition};
use crate::timer::{CountdownTimer, TimerExpired, TimerSnapshot};
use crate::validate::Verdict;

// ============================================================================
// Public types
// ============================================================================

/// Save progress for the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    /// Not saved yet
    Idle,
    /// A create call is in flight
    Saving,
    /// Stored under this id
    Saved {
        /// Store-assigned run id
        id: String,
    },
    /// Last attempt failed; saving again is allowed
    Failed {
        /// Error message
        message: String,
    },
}

/// Outcome of a save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveRequest {
    /// A create call was started
    Started,
    /// The run is not complete
    NotComplete,
    /// A create call is already in flight
    InFlight,
    /// This run is already stored
    AlreadySaved,
}

/// Saved runs shown for the current scenario.
#[derive(Debug, Clone, Default)]
pub struct RunsView {
    /// Scenario the runs belong to
    pub scenario_id: String,
    /// Runs, newest first
    pub runs: Vec<SavedRun>,
    /// Whether a listing is in flight
    pub loading: bool,
    /// Listing error, if the last listing failed
    pub error: Option<String>,
    /// Rename/delete errors keyed by run id
    pub entry_errors: HashMap<String, String>,
}

/// Something the front end should tell the player about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The countdown ran out; the run is failed
    TimeUp {
        /// Stage that was being played
        stage_id: String,
    },
    /// Saved runs for the current scenario arrived
    RunsLoaded {
        /// Number of runs listed
        count: usize,
        /// Listing error, if it failed
        error: Option<String>,
    },
    /// The run was stored
    Saved {
        /// Store-assigned run id
        id: String,
    },
    /// Storing the run failed
    SaveFailed {
        /// Error message
        message: String,
    },
    /// A run was renamed
    Renamed {
        /// Run id
        id: String,
    },
    /// A rename failed
    RenameFailed {
        /// Run id
        id: String,
        /// Error message
        message: String,
    },
    /// A run was deleted
    Deleted {
        /// Run id
        id: String,
    },
    /// A delete failed
    DeleteFailed {
        /// Run id
        id: String,
        /// Error message
        message: String,
    },
}

#[derive(Debug)]
enum SessionEvent {
    RunsLoaded {
        request: u64,
        page: RunsPage,
    },
    SaveFinished {
        epoch: u64,
        result: Result<SavedRun, PersistenceError>,
    },
    RenameFinished {
        id: String,
        result: Result<SavedRun, PersistenceError>,
    },
    DeleteFinished {
        id: String,
        result: Result<(), PersistenceError>,
    },
}

// ============================================================================
// Session
// ============================================================================

/// Single-owner play session.
///
/// Must be created and driven inside a tokio runtime.
#[derive(Debug)]
pub struct Session {
    engine: StageEngine,
    timer: CountdownTimer,
    expiry_rx: mpsc::UnboundedReceiver<TimerExpired>,
    client: RunsClient,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    emitter: Arc<EventEmitter>,
    save: SaveState,
    runs: RunsView,
    runs_request: u64,
    pending: VecDeque<Notice>,
}

impl Session {
    /// Opens a session and carries out the engine's initial effects.
    #[must_use]
    pub fn new(engine: StageEngine, client: RunsClient, emitter: Arc<EventEmitter>) -> Self {
        let (timer, expiry_rx) = CountdownTimer::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut session = Self {
            engine,
            timer,
            expiry_rx,
            client,
            events_tx,
            events_rx,
            emitter,
            save: SaveState::Idle,
            runs: RunsView::default(),
            runs_request: 0,
            pending: VecDeque::new(),
        };

        session.emitter.emit(Event::SessionStarted {
            timestamp: Utc::now(),
            scenario_id: session.engine.scenario().id.clone(),
            store: session.client.backend().to_string(),
        });
        session.on_run_started();
        session
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The stage engine (read-only).
    #[must_use]
    pub const fn engine(&self) -> &StageEngine {
        &self.engine
    }

    /// Current timer state.
    #[must_use]
    pub fn timer(&self) -> TimerSnapshot {
        self.timer.snapshot()
    }

    /// Save progress for the current run.
    #[must_use]
    pub const fn save_state(&self) -> &SaveState {
        &self.save
    }

    /// Saved runs for the current scenario.
    #[must_use]
    pub const fn runs(&self) -> &RunsView {
        &self.runs
    }

    /// Hint for the current stage.
    #[must_use]
    pub fn hint(&self) -> &str {
        self.engine.hint()
    }

    // ------------------------------------------------------------------
    // Run actions
    // ------------------------------------------------------------------

    /// Switches to scenario `id`, starting a new run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownScenario`]; the current run continues.
    pub fn select_scenario(&mut self, id: &str) -> Result<(), EngineError> {
        self.engine.select_scenario(id)?;
        self.on_run_started();
        Ok(())
    }

    /// Restarts the current scenario.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.on_run_started();
    }

    fn on_run_started(&mut self) {
        self.save = SaveState::Idle;
        self.pending.retain(|n| !matches!(n, Notice::TimeUp { .. }));
        let scenario = Arc::clone(self.engine.scenario());
        self.emitter.emit(Event::ScenarioSelected {
            timestamp: Utc::now(),
            scenario_id: scenario.id.clone(),
            scenario_name: scenario.name.clone(),
        });
        self.emit_stage_entered();
        self.apply_effects();
    }

    fn emit_stage_entered(&self) {
        let stage = self.engine.current_stage();
        self.emitter.emit(Event::StageEntered {
            timestamp: Utc::now(),
            stage_id: stage.id.clone(),
            stage_index: self.engine.current_index(),
            time_limit_seconds: stage.time_limit_seconds,
        });
    }

    /// Submits an answer for the current stage.
    pub fn submit_answer(&mut self, text: &str) -> Option<Verdict> {
        self.catch_up_expiry();
        let was_complete = self.engine.is_complete();
        let verdict = self.engine.submit_answer(text)?;
        if !was_complete {
            self.emitter.emit(Event::AnswerChecked {
                timestamp: Utc::now(),
                stage_id: self.engine.current_stage().id.clone(),
                ok: verdict.ok,
            });
            self.after_verdict();
        }
        Some(verdict)
    }

    /// Picks an icon on the current stage.
    pub fn select_icon(&mut self, choice_id: &str) -> Option<Verdict> {
        self.catch_up_expiry();
        let was_complete = self.engine.is_complete();
        let verdict = self.engine.select_icon(choice_id)?;
        if !was_complete {
            self.emitter.emit(Event::IconSelected {
                timestamp: Utc::now(),
                stage_id: self.engine.current_stage().id.clone(),
                choice_id: choice_id.to_string(),
                ok: verdict.ok,
            });
            self.after_verdict();
        }
        Some(verdict)
    }

    fn after_verdict(&mut self) {
        if self.engine.is_complete() {
            let run = self.engine.run();
            self.emitter.emit(Event::RunCompleted {
                timestamp: Utc::now(),
                scenario_id: run.scenario_id.clone(),
                duration_seconds: run.elapsed_seconds(Utc::now()),
            });
        }
        self.apply_effects();
    }

    /// Moves past a passed stage.
    pub fn advance(&mut self) -> Option<StageTransition> {
        self.catch_up_expiry();
        let transition = self.engine.advance()?;
        if !transition.completed {
            self.emit_stage_entered();
        }
        self.apply_effects();
        Some(transition)
    }

    /// Applies an expiry that happened but has not been received yet.
    ///
    /// The resulting notice is queued for [`Session::next_notice`].
    fn catch_up_expiry(&mut self) {
        while let Ok(expired) = self.expiry_rx.try_recv() {
            if let Some(notice) = self.on_expired(expired) {
                self.pending.push_back(notice);
            }
        }
        let snap = self.timer.snapshot();
        if !snap.expired {
            return;
        }
        if let Some(notice) = self.on_expired(TimerExpired { cycle: snap.cycle }) {
            self.pending.push_back(notice);
        }
    }

    fn apply_effects(&mut self) {
        for effect in self.engine.drain_effects() {
            match effect {
                Effect::ConfigureTimer { seconds } => {
                    let snap = self.timer.configure(seconds);
                    self.emitter.emit(Event::TimerSet {
                        timestamp: Utc::now(),
                        seconds: snap.total,
                        cycle: snap.cycle,
                    });
                }
                Effect::StopTimer => {
                    let snap = self.timer.pause();
                    self.emitter.emit(Event::TimerPaused {
                        timestamp: Utc::now(),
                        remaining: snap.remaining,
                    });
                }
                Effect::LoadRuns { scenario_id } => self.load_runs(scenario_id),
            }
        }
    }

    // ------------------------------------------------------------------
    // Timer actions
    // ------------------------------------------------------------------

    /// Starts the countdown. Returns `false` if it was not started.
    pub fn start_timer(&mut self) -> bool {
        let started = self.timer.start();
        if started {
            self.emitter.emit(Event::TimerStarted {
                timestamp: Utc::now(),
                remaining: self.timer.snapshot().remaining,
            });
        }
        started
    }

    /// Pauses the countdown.
    pub fn pause_timer(&mut self) -> TimerSnapshot {
        let snap = self.timer.pause();
        self.emitter.emit(Event::TimerPaused {
            timestamp: Utc::now(),
            remaining: snap.remaining,
        });
        snap
    }

    /// Restores the countdown to its configured total.
    pub fn reset_timer(&mut self) -> TimerSnapshot {
        let snap = self.timer.reset();
        self.emitter.emit(Event::TimerReset {
            timestamp: Utc::now(),
            total: snap.total,
        });
        snap
    }

    /// Sets the countdown from minutes and seconds.
    pub fn apply_timer(&mut self, minutes: u32, seconds: u32) -> TimerSnapshot {
        let snap = self.timer.apply(minutes, seconds);
        self.emitter.emit(Event::TimerSet {
            timestamp: Utc::now(),
            seconds: snap.total,
            cycle: snap.cycle,
        });
        snap
    }

    // ------------------------------------------------------------------
    // Persistence actions
    // ------------------------------------------------------------------

    /// Stores the completed run, at most once.
    pub fn save(&mut self, display_name: Option<&str>) -> SaveRequest {
        self.catch_up_expiry();
        if !self.engine.is_complete() {
            return SaveRequest::NotComplete;
        }
        match self.save {
            SaveState::Saving => return SaveRequest::InFlight,
            SaveState::Saved { .. } => return SaveRequest::AlreadySaved,
            SaveState::Idle | SaveState::Failed { .. } => {}
        }

        let run = self.new_run(display_name);
        let epoch = self.engine.run().epoch;
        self.save = SaveState::Saving;
        info!(scenario = %run.scenario_id, epoch, "saving run");

        let client = self.client.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.create(run).await;
            let _ = tx.send(SessionEvent::SaveFinished { epoch, result });
        });
        SaveRequest::Started
    }

    fn new_run(&self, display_name: Option<&str>) -> NewRun {
        let scenario = self.engine.scenario();
        let run = self.engine.run();
        let current = self.engine.current_index();

        let stage_answers = scenario
            .stages
            .iter()
            .enumerate()
            .map(|(index, stage)| StageAnswer {
                stage_id: stage.id.clone(),
                title: stage.title.clone(),
                index,
                time_limit_seconds: stage.time_limit_seconds,
                answer: run
                    .answer(&stage.id)
                    .map(str::to_string)
                    .or_else(|| (index == current).then(|| run.draft.clone()))
                    .unwrap_or_default(),
            })
            .collect();

        NewRun {
            scenario_id: scenario.id.clone(),
            scenario_name: scenario.name.clone(),
            display_name: display_name.map(str::to_string),
            success: true,
            duration_seconds: run.elapsed_seconds(Utc::now()),
            stage_answers,
        }
    }

    /// Requests a fresh listing for the current scenario.
    pub fn refresh_runs(&mut self) {
        let scenario_id = self.engine.scenario().id.clone();
        self.load_runs(scenario_id);
    }

    fn load_runs(&mut self, scenario_id: String) {
        if self.runs.scenario_id != scenario_id {
            self.runs = RunsView {
                scenario_id: scenario_id.clone(),
                ..RunsView::default()
            };
        }
        self.runs.loading = true;
        self.runs_request += 1;
        let request = self.runs_request;

        let client = self.client.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let page = client.list(&scenario_id).await;
            let _ = tx.send(SessionEvent::RunsLoaded { request, page });
        });
    }

    /// Renames a listed run.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidInput`] immediately for a blank
    /// name; the error is also recorded against the run.
    pub fn rename(&mut self, id: &str, name: &str) -> Result<(), PersistenceError> {
        if name.trim().is_empty() {
            self.runs
                .entry_errors
                .insert(id.to_string(), EMPTY_NAME_MESSAGE.to_string());
            return Err(PersistenceError::InvalidInput(EMPTY_NAME_MESSAGE.to_string()));
        }
        self.runs.entry_errors.remove(id);

        let client = self.client.clone();
        let tx = self.events_tx.clone();
        let (id, name) = (id.to_string(), name.to_string());
        tokio::spawn(async move {
            let result = client.rename(&id, &name).await;
            let _ = tx.send(SessionEvent::RenameFinished { id, result });
        });
        Ok(())
    }

    /// Deletes a listed run.
    pub fn delete(&mut self, id: &str) {
        self.runs.entry_errors.remove(id);

        let client = self.client.clone();
        let tx = self.events_tx.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            let result = client.delete(&id).await;
            let _ = tx.send(SessionEvent::DeleteFinished { id, result });
        });
    }

    // ------------------------------------------------------------------
    // Asynchronous signals
    // ------------------------------------------------------------------

    /// Waits for the next timer expiry or store completion and applies it.
    ///
    /// Stale signals are absorbed without returning. Cancel-safe: dropping
    /// the future loses nothing.
    pub async fn next_notice(&mut self) -> Option<Notice> {
        if let Some(notice) = self.pending.pop_front() {
            return Some(notice);
        }
        loop {
            let notice = tokio::select! {
                Some(expired) = self.expiry_rx.recv() => self.on_expired(expired),
                Some(event) = self.events_rx.recv() => self.on_event(event),
                else => return None,
            };
            if notice.is_some() {
                return notice;
            }
        }
    }

    fn on_expired(&mut self, expired: TimerExpired) -> Option<Notice> {
        if expired.cycle != self.timer.cycle() {
            debug!(cycle = expired.cycle, "stale timer expiry dropped");
            return None;
        }
        if !self.engine.on_timer_expired() {
            return None;
        }
        let stage_id = self.engine.current_stage().id.clone();
        self.emitter.emit(Event::TimerExpired {
            timestamp: Utc::now(),
            stage_id: stage_id.clone(),
        });
        Some(Notice::TimeUp { stage_id })
    }

    fn on_event(&mut self, event: SessionEvent) -> Option<Notice> {
        match event {
            SessionEvent::RunsLoaded { request, page } => self.on_runs_loaded(request, page),
            SessionEvent::SaveFinished { epoch, result } => self.on_save_finished(epoch, result),
            SessionEvent::RenameFinished { id, result } => match result {
                Ok(run) => {
                    if let Some(slot) = self.runs.runs.iter_mut().find(|r| r.id == run.id) {
                        *slot = run;
                    }
                    self.refresh_runs();
                    Some(Notice::Renamed { id })
                }
                Err(e) => Some(self.entry_failed("rename", id, &e)),
            },
            SessionEvent::DeleteFinished { id, result } => match result {
                Ok(()) => {
                    self.runs.runs.retain(|r| r.id != id);
                    if matches!(&self.save, SaveState::Saved { id: saved } if *saved == id) {
                        self.save = SaveState::Idle;
                    }
                    self.refresh_runs();
                    Some(Notice::Deleted { id })
                }
                Err(e) => Some(self.entry_failed("delete", id, &e)),
            },
        }
    }

    fn on_runs_loaded(&mut self, request: u64, page: RunsPage) -> Option<Notice> {
        if request != self.runs_request || page.scenario_id != self.engine.scenario().id {
            debug!(
                request,
                latest = self.runs_request,
                listed = %page.scenario_id,
                current = %self.engine.scenario().id,
                "stale runs listing dropped"
            );
            return None;
        }
        if let Some(message) = &page.error {
            self.persistence_failed("list", message);
        }
        let count = page.runs.len();
        self.runs.runs = page.runs;
        self.runs.error = page.error.clone();
        self.runs.loading = false;
        Some(Notice::RunsLoaded {
            count,
            error: page.error,
        })
    }

    fn on_save_finished(
        &mut self,
        epoch: u64,
        result: Result<SavedRun, PersistenceError>,
    ) -> Option<Notice> {
        if epoch != self.engine.run().epoch {
            debug!(epoch, "save completion for an earlier run dropped");
            return None;
        }
        match result {
            Ok(run) => {
                info!(id = %run.id, "run saved");
                self.emitter.emit(Event::RunSaved {
                    timestamp: Utc::now(),
                    run_id: run.id.clone(),
                    scenario_id: run.scenario_id.clone(),
                });
                self.save = SaveState::Saved { id: run.id.clone() };
                self.refresh_runs();
                Some(Notice::Saved { id: run.id })
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "failed to save run");
                self.persistence_failed("create", &message);
                self.save = SaveState::Failed {
                    message: message.clone(),
                };
                Some(Notice::SaveFailed { message })
            }
        }
    }

    fn entry_failed(&mut self, operation: &str, id: String, error: &PersistenceError) -> Notice {
        let message = error.to_string();
        warn!(operation, id = %id, error = %message, "run update failed");
        self.persistence_failed(operation, &message);
        self.runs.entry_errors.insert(id.clone(), message.clone());
        if operation == "rename" {
            Notice::RenameFailed { id, message }
        } else {
            Notice::DeleteFailed { id, message }
        }
    }

    fn persistence_failed(&self, operation: &str, message: &str) {
        self.emitter.emit(Event::PersistenceFailed {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            message: message.to_string(),
        });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.emitter.emit(Event::SessionEnded {
            timestamp: Utc::now(),
            reason: "session closed".to_string(),
        });
    }
}

//! Structured event stream for `escaperoom`.
//!
//! Discrete, typed gameplay events (timer changes, stage entries, verdicts,
//! saves). Events are serialized as newline-delimited JSON (JSONL) with a
//! monotonically increasing sequence number for ordering.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during play.
///
/// Each variant is tagged with `"type"` when serialized to JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A session was opened.
    SessionStarted {
        /// When the session started.
        timestamp: DateTime<Utc>,
        /// Scenario the session opened on.
        scenario_id: String,
        /// Store backend (`"memory"` or `"http"`).
        store: String,
    },

    /// A session was closed.
    SessionEnded {
        /// When the session ended.
        timestamp: DateTime<Utc>,
        /// Human-readable reason.
        reason: String,
    },

    /// A scenario was selected (or reset), starting a new run.
    ScenarioSelected {
        /// When the run started.
        timestamp: DateTime<Utc>,
        /// Selected scenario id.
        scenario_id: String,
        /// Selected scenario name.
        scenario_name: String,
    },

    /// A stage became current.
    StageEntered {
        /// When the stage was entered.
        timestamp: DateTime<Utc>,
        /// Stage id.
        stage_id: String,
        /// Zero-based stage index.
        stage_index: usize,
        /// Countdown length for the stage.
        time_limit_seconds: u32,
    },

    /// A submitted answer was judged.
    AnswerChecked {
        /// When the verdict was recorded.
        timestamp: DateTime<Utc>,
        /// Stage id.
        stage_id: String,
        /// Whether the answer passed.
        ok: bool,
    },

    /// An icon was picked.
    IconSelected {
        /// When the icon was picked.
        timestamp: DateTime<Utc>,
        /// Stage id.
        stage_id: String,
        /// Picked option id.
        choice_id: String,
        /// Whether it was the correct option.
        ok: bool,
    },

    /// The countdown was configured.
    TimerSet {
        /// When the timer was set.
        timestamp: DateTime<Utc>,
        /// Countdown length.
        seconds: u32,
        /// New countdown cycle.
        cycle: u64,
    },

    /// The countdown started.
    TimerStarted {
        /// When the timer started.
        timestamp: DateTime<Utc>,
        /// Seconds left when started.
        remaining: u32,
    },

    /// The countdown was paused.
    TimerPaused {
        /// When the timer paused.
        timestamp: DateTime<Utc>,
        /// Seconds left when paused.
        remaining: u32,
    },

    /// The countdown was reset to its configured total.
    TimerReset {
        /// When the timer reset.
        timestamp: DateTime<Utc>,
        /// Restored countdown length.
        total: u32,
    },

    /// The countdown ran out and failed the run.
    TimerExpired {
        /// When expiry was applied.
        timestamp: DateTime<Utc>,
        /// Stage that was current.
        stage_id: String,
    },

    /// The final stage was passed.
    RunCompleted {
        /// When the run completed.
        timestamp: DateTime<Utc>,
        /// Scenario id.
        scenario_id: String,
        /// Seconds since the run started.
        duration_seconds: u64,
    },

    /// A completed run was stored.
    RunSaved {
        /// When the store confirmed the save.
        timestamp: DateTime<Utc>,
        /// Store-assigned run id.
        run_id: String,
        /// Scenario id.
        scenario_id: String,
    },

    /// A store operation failed.
    PersistenceFailed {
        /// When the failure was observed.
        timestamp: DateTime<Utc>,
        /// Operation (`create`, `list`, `rename`, `delete`).
        operation: String,
        /// Error message.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each [`emit`](Self::emit) takes the next sequence number, writes one JSON
/// line and flushes. Serialization or I/O failures are dropped: gameplay
/// never stops because the event sink went away.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::noop()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

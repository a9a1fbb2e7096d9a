//! Stage progression engine
//!
//! The state machine behind a run: which scenario and stage the player is
//! on, what they answered, and whether they may move on.
//!
//! # Architecture
//!
//! - [`RunState`]: the run in progress (answers, verdict, failed flag)
//! - [`StageEngine`]: transitions, validator dispatch, effect queue
//! - [`Effect`]: timer and store work for the session to carry out

pub mod engine;
pub mod state;

pub use engine::{ICON_REQUIRED_MESSAGE, StageEngine, TIME_UP_MESSAGE};
pub use state::{Effect, RunState, RunStatus, StageTransition};

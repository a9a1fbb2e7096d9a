//! `escaperoom` - timed escape-room puzzles with a shared run history
//!
//! A scenario is an ordered list of stages. Each stage has a prompt, a hint,
//! a countdown and a data-driven validator. The [`progression::StageEngine`]
//! decides every transition; [`session::Session`] couples it to the
//! [`timer::CountdownTimer`] and the run store behind
//! [`persistence::RunsClient`].

pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
pub mod persistence;
pub mod preferences;
pub mod progression;
pub mod scenarios;
pub mod server;
pub mod session;
pub mod timer;
pub mod validate;

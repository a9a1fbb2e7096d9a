//! Answer validation
//!
//! Pure dispatch from a stage's [`ValidatorSpec`] to a [`Verdict`]. Every
//! strategy is total: malformed input produces `ok = false` with a message,
//! never an error or a panic.
//!
//! # Strategies
//!
//! - `normalized`: trimmed, case-folded, whitespace-collapsed equality
//! - `json_fields`: parse first, then compare typed field values
//! - `code_tokens`: whitespace-free substring forms
//! - `pattern`: regex forms over collapsed text

mod code;
mod json;

use serde::Serialize;

use crate::config::schema::ValidatorSpec;

/// Outcome of checking one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// Whether the answer was accepted
    pub ok: bool,
    /// Message to show the player
    pub message: String,
}

impl Verdict {
    /// An accepting verdict.
    #[must_use]
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    /// A rejecting verdict.
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }

    fn from_check(ok: bool, pass: &str, fail: &str) -> Self {
        if ok { Self::pass(pass) } else { Self::fail(fail) }
    }
}

/// Judges `answer` against `spec`.
#[must_use]
pub fn validate(spec: &ValidatorSpec, answer: &str) -> Verdict {
    match spec {
        ValidatorSpec::Normalized { accept, pass, fail } => {
            let given = normalize(answer);
            let ok = accept.iter().any(|a| normalize(a) == given);
            Verdict::from_check(ok, pass, fail)
        }
        ValidatorSpec::JsonFields {
            fields,
            pass,
            fail,
            invalid,
        } => json::check_fields(fields, answer).map_or_else(
            |()| Verdict::fail(invalid.as_str()),
            |ok| Verdict::from_check(ok, pass, fail),
        ),
        ValidatorSpec::CodeTokens { forms, pass, fail } => {
            Verdict::from_check(code::matches_tokens(forms, answer), pass, fail)
        }
        ValidatorSpec::Pattern { forms, pass, fail } => {
            Verdict::from_check(code::matches_patterns(forms, answer), pass, fail)
        }
    }
}

/// Trims, lower-cases and collapses internal whitespace runs to one space.
#[must_use]
pub fn normalize(s: &str) -> String {
    collapse_whitespace(&s.trim().to_lowercase())
}

/// Collapses every whitespace run to a single space.
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower-cases and removes all whitespace.
#[must_use]
pub fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

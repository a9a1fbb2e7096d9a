//! Scenario configuration schema
//!
//! Serde types for scenario YAML files. Scenarios are immutable once
//! loaded; the engine only ever reads them.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// Scenario
// ============================================================================

/// An ordered sequence of timed puzzle stages.
///
/// Stage order is progression order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Unique identifier (kebab-case, e.g. `"debug-crypt"`)
    pub id: String,

    /// Display name (e.g. `"Debug Crypt (Medium)"`)
    pub name: String,

    /// Background image reference for front ends that draw one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,

    /// Stages in progression order
    pub stages: Vec<Stage>,
}

impl Scenario {
    /// Returns the stage at `index`, if any.
    #[must_use]
    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    /// Index of the final stage. Zero for an (invalid) empty scenario.
    #[must_use]
    pub const fn last_index(&self) -> usize {
        self.stages.len().saturating_sub(1)
    }
}

// ============================================================================
// Stage
// ============================================================================

/// A single timed puzzle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stage {
    /// Identifier, unique within its scenario
    pub id: String,

    /// Title shown above the prompt
    pub title: String,

    /// Puzzle text
    pub prompt: String,

    /// Hint revealed on request
    #[serde(default)]
    pub hint: String,

    /// Countdown length for this stage
    pub time_limit_seconds: u32,

    /// Label for the answer input
    #[serde(default)]
    pub input_label: String,

    /// Placeholder for the answer input
    #[serde(default)]
    pub placeholder: String,

    /// How submitted answers are judged
    pub validator: ValidatorSpec,

    /// Optional icon-picking sub-puzzle that gates the validator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_choice: Option<IconChoice>,
}

impl Stage {
    /// Whether this stage is gated by an icon choice.
    #[must_use]
    pub const fn is_icon_choice(&self) -> bool {
        self.icon_choice.is_some()
    }
}

/// Icon-picking sub-puzzle.
///
/// Exactly one option (`correct_id`) unlocks the stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IconChoice {
    /// Instruction shown above the options
    pub instruction: String,

    /// Id of the single correct option
    pub correct_id: String,

    /// Options the player can pick from
    pub choices: Vec<IconOption>,

    /// Message shown for the correct pick
    #[serde(default = "default_icon_pass")]
    pub pass: String,

    /// Message shown for a wrong pick
    #[serde(default = "default_icon_fail")]
    pub fail: String,
}

/// One pickable icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IconOption {
    /// Choice id submitted when picked
    pub id: String,
    /// Asset reference (e.g. `/icons/Debug.svg`)
    pub asset: String,
    /// Human-readable label
    pub label: String,
}

fn default_icon_pass() -> String {
    "Correct icon. Unlocked.".to_string()
}

fn default_icon_fail() -> String {
    "Wrong icon. Try another one.".to_string()
}

// ============================================================================
// Validator strategies
// ============================================================================

/// Answer validation strategy for a stage.
///
/// Tagged by `kind` in YAML so every validator stays plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidatorSpec {
    /// Normalized answer equals one of `accept` (normalized the same way).
    Normalized {
        /// Accepted answers
        accept: Vec<String>,
        /// Message on success
        pass: String,
        /// Message on failure
        fail: String,
    },

    /// Answer parses as a JSON object whose listed fields equal the
    /// expected values, type included.
    JsonFields {
        /// Expected field values
        fields: IndexMap<String, serde_json::Value>,
        /// Message on success
        pass: String,
        /// Message when the JSON is valid but the fields are wrong
        fail: String,
        /// Message when the answer is not JSON
        #[serde(default = "default_invalid_json")]
        invalid: String,
    },

    /// Whitespace-free, lower-cased answer contains every token of at
    /// least one form.
    CodeTokens {
        /// Alternative accepted forms
        forms: Vec<Vec<Token>>,
        /// Message on success
        pass: String,
        /// Message on failure
        fail: String,
    },

    /// Lower-cased, whitespace-collapsed answer matches every regex of at
    /// least one form.
    Pattern {
        /// Alternative accepted forms, each a list of regexes
        forms: Vec<Vec<RegexPattern>>,
        /// Message on success
        pass: String,
        /// Message on failure
        fail: String,
    },
}

impl ValidatorSpec {
    /// Short name of the strategy, as written in YAML.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Normalized { .. } => "normalized",
            Self::JsonFields { .. } => "json_fields",
            Self::CodeTokens { .. } => "code_tokens",
            Self::Pattern { .. } => "pattern",
        }
    }
}

fn default_invalid_json() -> String {
    "That isn't valid JSON.".to_string()
}

/// A validator regex, compiled on first use and kept with the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegexPattern {
    source: String,
    #[serde(skip)]
    compiled: OnceLock<Result<Regex, regex::Error>>,
}

impl RegexPattern {
    /// Wraps a regex source without compiling it.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            compiled: OnceLock::new(),
        }
    }

    /// The regex as written in YAML.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The compiled regex; compiles on the first call only.
    ///
    /// # Errors
    ///
    /// Returns the compile error for an invalid pattern.
    pub fn regex(&self) -> Result<&Regex, &regex::Error> {
        self.compiled
            .get_or_init(|| Regex::new(&self.source))
            .as_ref()
    }

    /// Whether [`RegexPattern::regex`] has been called.
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl From<&str> for RegexPattern {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

/// A required token: either a literal or a set of interchangeable literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    /// Must appear verbatim
    Literal(String),
    /// Any one of these must appear
    AnyOf(Vec<String>),
}

impl Token {
    /// Iterates the literal alternatives of this token.
    pub fn alternatives(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            Self::Literal(s) => std::slice::from_ref(s),
            Self::AnyOf(v) => v,
        };
        slice.iter().map(String::as_str)
    }
}

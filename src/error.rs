//! Error types for `escaperoom`
//!
//! One error enum per domain (configuration, engine, persistence), plus the
//! aggregate [`EscapeRoomError`] used by the CLI for exit code mapping.
//!
//! Wrong answers and timer expiry are not errors: they are verdicts and
//! state transitions owned by the engine.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `escaperoom` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, scenario validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Persistence error (store unreachable, unknown run id)
    pub const PERSISTENCE_ERROR: i32 = 4;

    /// Engine error (unknown scenario)
    pub const ENGINE_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `escaperoom` operations.
#[derive(Debug, Error)]
pub enum EscapeRoomError {
    /// Scenario loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Stage engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Run store error
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl EscapeRoomError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Engine(_) => ExitCode::ENGINE_ERROR,
            Self::Persistence(_) => ExitCode::PERSISTENCE_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Scenario loading and validation errors.
///
/// A malformed scenario is a configuration defect: it is rejected when the
/// catalog is built, never discovered halfway through a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the scenario file (`<embedded>` for built-ins)
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Scenario validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Scenario file or id that failed
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced scenario file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Two scenarios share the same id
    #[error("duplicate scenario id '{id}'")]
    DuplicateScenario {
        /// The repeated id
        id: String,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single issue found while validating a scenario.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "stages[2].validator.forms")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the scenario from being loaded
    Error,
    /// Suspicious but playable
    Warning,
}

// ============================================================================
// Engine Errors
// ============================================================================

/// Stage engine errors.
///
/// These only cover caller mistakes; everything that happens during play
/// is a verdict or a transition.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Requested scenario is not in the catalog
    #[error("unknown scenario '{id}'{}", did_you_mean(.suggestion.as_deref()))]
    UnknownScenario {
        /// The requested id
        id: String,
        /// Closest known id, if any is close enough
        suggestion: Option<String>,
    },

    /// The catalog contains no scenarios
    #[error("scenario catalog is empty")]
    EmptyCatalog,
}

fn did_you_mean(suggestion: Option<&str>) -> String {
    suggestion.map_or_else(String::new, |s| format!(" (did you mean '{s}'?)"))
}

// ============================================================================
// Persistence Errors
// ============================================================================

/// Run store failures.
///
/// Every variant is recoverable: the session surfaces the message and keeps
/// the in-memory run untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    /// No run with the given id exists
    #[error("run not found: {0}")]
    NotFound(String),

    /// Input rejected before any request was made
    #[error("{0}")]
    InvalidInput(String),

    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),

    /// The store did not answer in time
    #[error("store request timed out")]
    Timeout,

    /// Non-success HTTP status
    #[error("store returned HTTP {status}: {message}")]
    HttpStatus {
        /// Status code returned by the store
        status: u16,
        /// Error message from the response body, if any
        message: String,
    },

    /// Response body could not be decoded
    #[error("invalid store response: {0}")]
    InvalidResponse(String),

    /// Store-side failure not covered above
    #[error("store failure: {0}")]
    Store(String),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `escaperoom` operations.
pub type Result<T> = std::result::Result<T, EscapeRoomError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::PERSISTENCE_ERROR, 4);
        assert_eq!(ExitCode::ENGINE_ERROR, 5);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_engine_error_exit_code() {
        let err: EscapeRoomError = EngineError::EmptyCatalog.into();
        assert_eq!(err.exit_code(), ExitCode::ENGINE_ERROR);
    }

    #[test]
    fn test_persistence_error_exit_code() {
        let err: EscapeRoomError = PersistenceError::Timeout.into();
        assert_eq!(err.exit_code(), ExitCode::PERSISTENCE_ERROR);
    }

    #[test]
    fn test_config_error_exit_code() {
        let err: EscapeRoomError = ConfigError::MissingFile {
            path: PathBuf::from("/test"),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_io_error_exit_code() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: EscapeRoomError = io_err.into();
        assert_eq!(err.exit_code(), ExitCode::IO_ERROR);
    }

    #[test]
    fn test_unknown_scenario_display_with_suggestion() {
        let err = EngineError::UnknownScenario {
            id: "debug-cript".to_string(),
            suggestion: Some("debug-crypt".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "unknown scenario 'debug-cript' (did you mean 'debug-crypt'?)"
        );
    }

    #[test]
    fn test_unknown_scenario_display_without_suggestion() {
        let err = EngineError::UnknownScenario {
            id: "zzz".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "unknown scenario 'zzz'");
    }

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue {
            path: "stages[0].time_limit_seconds".to_string(),
            message: "time limit must be positive".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(
            issue.to_string(),
            "error: time limit must be positive at stages[0].time_limit_seconds"
        );
    }

    #[test]
    fn test_validation_issue_warning_display() {
        let issue = ValidationIssue {
            path: "stages[1].hint".to_string(),
            message: "hint is empty".to_string(),
            severity: Severity::Warning,
        };
        assert_eq!(issue.to_string(), "warning: hint is empty at stages[1].hint");
    }

    #[test]
    fn test_http_status_display() {
        let err = PersistenceError::HttpStatus {
            status: 500,
            message: "Failed to save escape run".to_string(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("Failed to save escape run"));
    }
}

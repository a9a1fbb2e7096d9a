//! Scenario loader
//!
//! Loading pipeline for a scenario file:
//! 1. Size check and read (UTF-8 BOM stripped)
//! 2. YAML parsing into [`Scenario`]
//! 3. Validation against [`ConfigLimits`]
//! 4. Freeze with `Arc`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::Scenario;
use crate::config::validation::Validator;
use crate::error::ConfigError;
use crate::timer::MAX_TIMER_SECONDS;

// ============================================================================
// Public API
// ============================================================================

/// Options for the scenario loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for scenario size.
    pub config_limits: ConfigLimits,
}

/// Limits on scenario size.
///
/// Each limit can be overridden by an `ESCAPEROOM_MAX_*` environment variable.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of stages per scenario.
    pub max_stages: usize,

    /// Maximum stage time limit; the timer cannot display more.
    pub max_time_limit_seconds: u32,

    /// Maximum number of icon options per stage.
    pub max_icon_choices: usize,

    /// Maximum scenario file size in bytes.
    pub max_file_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_stages: env_or("ESCAPEROOM_MAX_STAGES", 50),
            max_time_limit_seconds: env_or("ESCAPEROOM_MAX_TIME_LIMIT", MAX_TIMER_SECONDS)
                .min(MAX_TIMER_SECONDS),
            max_icon_choices: env_or("ESCAPEROOM_MAX_ICON_CHOICES", 12),
            max_file_size: env_or("ESCAPEROOM_MAX_FILE_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a scenario.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated scenario.
    pub scenario: Arc<Scenario>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during scenario loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Scenario loader.
#[derive(Debug, Default)]
pub struct ScenarioLoader {
    options: LoaderOptions,
}

impl ScenarioLoader {
    /// Creates a new loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a new loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads and validates a scenario file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, exceeds the size limit,
    /// fails to parse, or fails validation.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let max = self.options.config_limits.max_file_size;
        let file_size = usize::try_from(metadata.len()).unwrap_or(max.saturating_add(1));
        if file_size > max {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {max} bytes"),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_named(&raw, path)
    }

    /// Loads and validates a scenario from YAML text.
    ///
    /// Used for built-in scenarios embedded at compile time.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn load_from_str(&self, yaml: &str) -> Result<LoadResult, ConfigError> {
        self.load_named(yaml, &PathBuf::from("<embedded>"))
    }

    fn load_named(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        if raw.trim().is_empty() {
            return Err(ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: "Scenario file is empty".to_string(),
            });
        }

        let scenario: Scenario = serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?;

        let mut validator = Validator::new();
        let result = validator.validate(&scenario, &self.options.config_limits);

        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }

        let warnings = result
            .warnings
            .into_iter()
            .map(|issue| LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            })
            .collect();

        Ok(LoadResult {
            scenario: Arc::new(scenario),
            warnings,
        })
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ValidatorSpec;
    use std::io::Write;

    const MINIMAL: &str = r#"
id: mini
name: "Mini"
stages:
  - id: s1
    title: "Only stage"
    prompt: "Type debug"
    hint: "It's debug"
    time_limit_seconds: 30
    validator:
      kind: normalized
      accept: ["debug"]
      pass: "Yes"
      fail: "No"
"#;

    #[test]
    fn test_pattern_regexes_compiled_at_load() {
        let yaml = crate::scenarios::find_builtin("format-lock").unwrap().yaml;
        let result = ScenarioLoader::with_defaults().load_from_str(yaml).unwrap();
        let patterns: Vec<_> = result
            .scenario
            .stages
            .iter()
            .filter_map(|stage| match &stage.validator {
                ValidatorSpec::Pattern { forms, .. } => Some(forms.iter().flatten()),
                _ => None,
            })
            .flatten()
            .collect();
        assert!(!patterns.is_empty());
        assert!(patterns.iter().all(|p| p.is_compiled()));
    }

    #[test]
    fn test_load_from_str() {
        let result = ScenarioLoader::with_defaults().load_from_str(MINIMAL).unwrap();
        assert_eq!(result.scenario.id, "mini");
        assert_eq!(result.scenario.stages.len(), 1);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_load_file_with_bom() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "\u{feff}{MINIMAL}").unwrap();
        let result = ScenarioLoader::with_defaults().load(file.path()).unwrap();
        assert_eq!(result.scenario.name, "Mini");
    }

    #[test]
    fn test_missing_file() {
        let err = ScenarioLoader::with_defaults()
            .load(Path::new("/nonexistent/escaperoom/scenario.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn test_empty_file() {
        let err = ScenarioLoader::with_defaults().load_from_str("  \n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_parse_error_has_line() {
        let err = ScenarioLoader::with_defaults()
            .load_from_str("id: x\nname: [unclosed\n")
            .unwrap_err();
        let ConfigError::ParseError { line, .. } = err else {
            panic!("expected parse error");
        };
        assert!(line.is_some());
    }

    #[test]
    fn test_empty_stage_list_rejected_at_load() {
        let err = ScenarioLoader::with_defaults()
            .load_from_str("id: x\nname: X\nstages: []\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_file_size_limit() {
        let options = LoaderOptions {
            config_limits: ConfigLimits {
                max_file_size: 10,
                ..ConfigLimits::default()
            },
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{MINIMAL}").unwrap();
        let err = ScenarioLoader::new(options).load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_warnings_surface() {
        let yaml = MINIMAL.replace("hint: \"It's debug\"", "hint: \"\"");
        let result = ScenarioLoader::with_defaults().load_from_str(&yaml).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].location.as_deref(), Some("stages[0].hint"));
    }
}

//! Scenario validation
//!
//! Schema and semantic checks run on every scenario before it enters a
//! catalog. The validator collects ALL issues rather than stopping at the
//! first, so authors get the full picture in one pass.

use std::collections::HashSet;


use crate::config::loader::ConfigLimits;
use crate::config::schema::{IconChoice, Scenario, Stage, ValidatorSpec};
use crate::error::{Severity, ValidationIssue};
use crate::validate;

// ============================================================================
// Public API
// ============================================================================

/// Result of scenario validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Scenario validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a scenario and returns every issue found.
    pub fn validate(&mut self, scenario: &Scenario, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_metadata(scenario);
        self.validate_stages(scenario, limits);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Scenario
    // ========================================================================

    fn validate_metadata(&mut self, scenario: &Scenario) {
        if scenario.id.trim().is_empty() {
            self.add_error("id", "Scenario id is required and cannot be empty");
        }
        if scenario.name.trim().is_empty() {
            self.add_error("name", "Scenario name is required and cannot be empty");
        }
    }

    fn validate_stages(&mut self, scenario: &Scenario, limits: &ConfigLimits) {
        if scenario.stages.is_empty() {
            self.add_error("stages", "Scenario must have at least one stage");
            return;
        }

        if scenario.stages.len() > limits.max_stages {
            self.add_error(
                "stages",
                &format!(
                    "Scenario has {} stages (limit: {})",
                    scenario.stages.len(),
                    limits.max_stages
                ),
            );
        }

        let mut seen = HashSet::new();
        for (i, stage) in scenario.stages.iter().enumerate() {
            let path = format!("stages[{i}]");
            if !seen.insert(stage.id.as_str()) {
                self.add_error(
                    &format!("{path}.id"),
                    &format!("Duplicate stage id '{}'", stage.id),
                );
            }
            self.validate_stage(&path, stage, limits);
        }
    }

    // ========================================================================
    // Stage
    // ========================================================================

    fn validate_stage(&mut self, path: &str, stage: &Stage, limits: &ConfigLimits) {
        if stage.id.trim().is_empty() {
            self.add_error(&format!("{path}.id"), "Stage id cannot be empty");
        }
        if stage.title.trim().is_empty() {
            self.add_warning(&format!("{path}.title"), "Stage title is empty");
        }
        if stage.prompt.trim().is_empty() {
            self.add_warning(&format!("{path}.prompt"), "Stage prompt is empty");
        }
        if stage.hint.trim().is_empty() {
            self.add_warning(&format!("{path}.hint"), "Stage has no hint");
        }

        let limit_path = format!("{path}.time_limit_seconds");
        if stage.time_limit_seconds == 0 {
            self.add_error(&limit_path, "Time limit must be greater than zero");
        } else if stage.time_limit_seconds > limits.max_time_limit_seconds {
            self.add_error(
                &limit_path,
                &format!(
                    "Time limit {}s exceeds maximum {}s",
                    stage.time_limit_seconds, limits.max_time_limit_seconds
                ),
            );
        }

        self.validate_validator(&format!("{path}.validator"), &stage.validator);

        if let Some(ref choice) = stage.icon_choice {
            self.validate_icon_choice(&format!("{path}.icon_choice"), choice, stage, limits);
        }
    }

    fn validate_validator(&mut self, path: &str, spec: &ValidatorSpec) {
        match spec {
            ValidatorSpec::Normalized { accept, .. } => {
                if accept.is_empty() {
                    self.add_error(&format!("{path}.accept"), "No accepted answers listed");
                }
            }
            ValidatorSpec::JsonFields { fields, .. } => {
                if fields.is_empty() {
                    self.add_error(&format!("{path}.fields"), "No expected fields listed");
                }
            }
            ValidatorSpec::CodeTokens { forms, .. } => {
                if forms.is_empty() {
                    self.add_error(&format!("{path}.forms"), "No accepted forms listed");
                }
                for (i, form) in forms.iter().enumerate() {
                    if form.is_empty() {
                        self.add_error(&format!("{path}.forms[{i}]"), "Form has no tokens");
                    }
                    for (j, token) in form.iter().enumerate() {
                        if token.alternatives().all(|alt| validate::compact(alt).is_empty()) {
                            self.add_error(
                                &format!("{path}.forms[{i}][{j}]"),
                                "Token is empty after whitespace removal",
                            );
                        }
                    }
                }
            }
            ValidatorSpec::Pattern { forms, .. } => {
                if forms.is_empty() {
                    self.add_error(&format!("{path}.forms"), "No accepted forms listed");
                }
                for (i, form) in forms.iter().enumerate() {
                    if form.is_empty() {
                        self.add_error(&format!("{path}.forms[{i}]"), "Form has no patterns");
                    }
                    for (j, pattern) in form.iter().enumerate() {
                        if let Err(e) = pattern.regex() {
                            self.add_error(
                                &format!("{path}.forms[{i}][{j}]"),
                                &format!("Invalid regex: {e}"),
                            );
                        }
                    }
                }
            }
        }
    }

    fn validate_icon_choice(
        &mut self,
        path: &str,
        choice: &IconChoice,
        stage: &Stage,
        limits: &ConfigLimits,
    ) {
        if choice.choices.is_empty() {
            self.add_error(&format!("{path}.choices"), "Icon choice has no options");
            return;
        }
        if choice.choices.len() > limits.max_icon_choices {
            self.add_error(
                &format!("{path}.choices"),
                &format!(
                    "Icon choice has {} options (limit: {})",
                    choice.choices.len(),
                    limits.max_icon_choices
                ),
            );
        }

        let mut seen = HashSet::new();
        for (i, option) in choice.choices.iter().enumerate() {
            if !seen.insert(option.id.as_str()) {
                self.add_error(
                    &format!("{path}.choices[{i}].id"),
                    &format!("Duplicate choice id '{}'", option.id),
                );
            }
        }

        if !seen.contains(choice.correct_id.as_str()) {
            self.add_error(
                &format!("{path}.correct_id"),
                &format!("Correct id '{}' is not one of the choices", choice.correct_id),
            );
        } else if !validate::validate(&stage.validator, &choice.correct_id).ok {
            self.add_warning(
                &format!("{path}.correct_id"),
                "Stage validator rejects the correct icon id; the stage cannot be re-checked after unlocking",
            );
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{IconOption, Token};

    fn stage(id: &str) -> Stage {
        Stage {
            id: id.to_string(),
            title: "Title".to_string(),
            prompt: "Prompt".to_string(),
            hint: "Hint".to_string(),
            time_limit_seconds: 60,
            input_label: String::new(),
            placeholder: String::new(),
            validator: ValidatorSpec::Normalized {
                accept: vec!["debug".to_string()],
                pass: "ok".to_string(),
                fail: "no".to_string(),
            },
            icon_choice: None,
        }
    }

    fn scenario(stages: Vec<Stage>) -> Scenario {
        Scenario {
            id: "test".to_string(),
            name: "Test".to_string(),
            background: None,
            stages,
        }
    }

    fn run(s: &Scenario) -> ValidationResult {
        Validator::new().validate(s, &ConfigLimits::default())
    }

    #[test]
    fn test_valid_scenario() {
        let result = run(&scenario(vec![stage("s1"), stage("s2")]));
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_stages_rejected() {
        let result = run(&scenario(vec![]));
        assert!(result.has_errors());
        assert_eq!(result.errors[0].path, "stages");
    }

    #[test]
    fn test_duplicate_stage_ids() {
        let result = run(&scenario(vec![stage("s1"), stage("s1")]));
        assert!(result.errors.iter().any(|e| e.path == "stages[1].id"));
    }

    #[test]
    fn test_zero_time_limit() {
        let mut s = stage("s1");
        s.time_limit_seconds = 0;
        let result = run(&scenario(vec![s]));
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.path == "stages[0].time_limit_seconds")
        );
    }

    #[test]
    fn test_time_limit_above_clock_range() {
        let mut s = stage("s1");
        s.time_limit_seconds = 6000;
        let result = run(&scenario(vec![s]));
        assert!(result.has_errors());
    }

    #[test]
    fn test_invalid_regex_reported() {
        let mut s = stage("s1");
        s.validator = ValidatorSpec::Pattern {
            forms: vec![vec!["([".into()]],
            pass: "ok".to_string(),
            fail: "no".to_string(),
        };
        let result = run(&scenario(vec![s]));
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.path == "stages[0].validator.forms[0][0]")
        );
    }

    #[test]
    fn test_blank_token_reported() {
        let mut s = stage("s1");
        s.validator = ValidatorSpec::CodeTokens {
            forms: vec![vec![Token::Literal("  ".to_string())]],
            pass: "ok".to_string(),
            fail: "no".to_string(),
        };
        let result = run(&scenario(vec![s]));
        assert!(result.has_errors());
    }

    #[test]
    fn test_icon_correct_id_must_exist() {
        let mut s = stage("m1");
        s.icon_choice = Some(IconChoice {
            instruction: "Pick".to_string(),
            correct_id: "debug".to_string(),
            choices: vec![IconOption {
                id: "git".to_string(),
                asset: "/icons/Git.svg".to_string(),
                label: "Git".to_string(),
            }],
            pass: "ok".to_string(),
            fail: "no".to_string(),
        });
        let result = run(&scenario(vec![s]));
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.path == "stages[0].icon_choice.correct_id")
        );
    }

    #[test]
    fn test_icon_validator_mismatch_warns() {
        let mut s = stage("m1");
        s.icon_choice = Some(IconChoice {
            instruction: "Pick".to_string(),
            correct_id: "git".to_string(),
            choices: vec![IconOption {
                id: "git".to_string(),
                asset: "/icons/Git.svg".to_string(),
                label: "Git".to_string(),
            }],
            pass: "ok".to_string(),
            fail: "no".to_string(),
        });
        let result = run(&scenario(vec![s]));
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut a = stage("");
        a.time_limit_seconds = 0;
        let mut s = scenario(vec![a]);
        s.name = String::new();
        let result = run(&s);
        assert!(result.errors.len() >= 3);
    }
}

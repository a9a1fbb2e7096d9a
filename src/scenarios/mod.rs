//! Built-in scenarios and the scenario catalog
//!
//! Puzzle scenarios embedded in the binary at compile time, so
//! `escaperoom play` works with no files on disk. Extra scenario files are
//! merged into the same [`Catalog`], which is what the engine plays from.

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;

use crate::config::{LoadWarning, Scenario, ScenarioLoader};
use crate::error::{ConfigError, EngineError, Severity, ValidationIssue};

// ============================================================================
// Registry
// ============================================================================

/// A built-in scenario embedded in the binary.
pub struct BuiltinScenario {
    /// Scenario id (kebab-case, matches the YAML `id`)
    pub id: &'static str,

    /// Short human-readable description
    pub description: &'static str,

    /// Raw YAML content (embedded at compile time)
    pub yaml: &'static str,
}

static BUILTIN_SCENARIOS: LazyLock<Vec<BuiltinScenario>> = LazyLock::new(|| {
    vec![
        BuiltinScenario {
            id: "format-lock",
            description: "Code Vault: format a function, port CSV to JSON, print a range",
            yaml: include_str!("../../scenarios/format-lock.yaml"),
        },
        BuiltinScenario {
            id: "debug-crypt",
            description: "Debug Crypt: pick the debug icon, repair JSON, parse and trim",
            yaml: include_str!("../../scenarios/debug-crypt.yaml"),
        },
    ]
});

/// Look up a built-in scenario by exact id.
#[must_use]
pub fn find_builtin(id: &str) -> Option<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS.iter().find(|s| s.id == id)
}

/// All built-in scenarios in registry order.
#[must_use]
pub fn list_builtin() -> &'static [BuiltinScenario] {
    &BUILTIN_SCENARIOS
}

/// Suggest the candidate closest to `input`.
///
/// Returns the closest match if its Damerau-Levenshtein distance is ≤ 3.
pub fn suggest<'a>(input: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    candidates
        .into_iter()
        .map(|id| (id, strsim::damerau_levenshtein(input, id)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(id, _)| id.to_string())
}

// ============================================================================
// Catalog
// ============================================================================

/// Validated scenarios available to a session, keyed by id in load order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    scenarios: IndexMap<String, Arc<Scenario>>,
}

impl Catalog {
    /// Builds a catalog from already-loaded scenarios.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateScenario`] if two scenarios share an
    /// id, or a validation error for a scenario without stages.
    pub fn from_scenarios(
        scenarios: impl IntoIterator<Item = Arc<Scenario>>,
    ) -> Result<Self, ConfigError> {
        let mut catalog = Self::default();
        for scenario in scenarios {
            catalog.insert(scenario)?;
        }
        Ok(catalog)
    }

    /// Loads every built-in scenario.
    ///
    /// # Errors
    ///
    /// Returns an error if an embedded scenario fails to load.
    pub fn builtin(loader: &ScenarioLoader) -> Result<Self, ConfigError> {
        Self::load(loader, &[]).map(|(catalog, _)| catalog)
    }

    /// Loads the built-ins followed by each scenario file in `paths`.
    ///
    /// # Errors
    ///
    /// Returns the first load failure, or a duplicate id.
    pub fn load(
        loader: &ScenarioLoader,
        paths: &[PathBuf],
    ) -> Result<(Self, Vec<LoadWarning>), ConfigError> {
        let mut catalog = Self::default();
        let mut warnings = Vec::new();

        for builtin in list_builtin() {
            let result = loader.load_from_str(builtin.yaml)?;
            warnings.extend(result.warnings);
            catalog.insert(result.scenario)?;
        }

        for path in paths {
            let result = loader.load(path)?;
            tracing::debug!(
                path = %path.display(),
                scenario = %result.scenario.id,
                "loaded scenario file"
            );
            warnings.extend(result.warnings);
            catalog.insert(result.scenario)?;
        }

        Ok((catalog, warnings))
    }

    fn insert(&mut self, scenario: Arc<Scenario>) -> Result<(), ConfigError> {
        if scenario.stages.is_empty() {
            return Err(ConfigError::ValidationError {
                path: scenario.id.clone(),
                errors: vec![ValidationIssue {
                    path: "stages".to_string(),
                    message: "Scenario must have at least one stage".to_string(),
                    severity: Severity::Error,
                }],
            });
        }
        if self.scenarios.contains_key(&scenario.id) {
            return Err(ConfigError::DuplicateScenario {
                id: scenario.id.clone(),
            });
        }
        self.scenarios.insert(scenario.id.clone(), scenario);
        Ok(())
    }

    /// Returns the scenario with the given id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<Scenario>> {
        self.scenarios.get(id)
    }

    /// Returns the scenario with the given id, or an error with a suggestion.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownScenario`] if no scenario has that id.
    pub fn resolve(&self, id: &str) -> Result<Arc<Scenario>, EngineError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownScenario {
                id: id.to_string(),
                suggestion: suggest(id, self.ids()),
            })
    }

    /// The first scenario in load order.
    #[must_use]
    pub fn first(&self) -> Option<&Arc<Scenario>> {
        self.scenarios.values().next()
    }

    /// Scenario ids in load order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    /// Scenarios in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Scenario>> {
        self.scenarios.values()
    }

    /// Number of scenarios.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorSpec;
    use crate::validate::validate;
    use std::collections::HashSet;
    use std::io::Write;

    fn builtin_catalog() -> Catalog {
        Catalog::builtin(&ScenarioLoader::with_defaults()).unwrap()
    }

    #[test]
    fn all_builtin_scenarios_load_without_warnings() {
        for builtin in list_builtin() {
            let result = ScenarioLoader::with_defaults()
                .load_from_str(builtin.yaml)
                .unwrap_or_else(|e| panic!("built-in '{}' failed: {e:?}", builtin.id));
            assert_eq!(result.scenario.id, builtin.id);
            assert!(
                result.warnings.is_empty(),
                "built-in '{}' has warnings: {:?}",
                builtin.id,
                result.warnings
            );
        }
    }

    #[test]
    fn no_duplicate_builtin_ids() {
        let ids: HashSet<&str> = list_builtin().iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), list_builtin().len());
    }

    #[test]
    fn catalog_keeps_load_order() {
        let catalog = builtin_catalog();
        let ids: Vec<&str> = catalog.ids().collect();
        assert_eq!(ids, vec!["format-lock", "debug-crypt"]);
        assert_eq!(catalog.first().unwrap().name, "Code Vault (Easy)");
    }

    #[test]
    fn resolve_unknown_suggests_closest() {
        let err = builtin_catalog().resolve("debug-cript").unwrap_err();
        let EngineError::UnknownScenario { suggestion, .. } = err else {
            panic!("expected unknown scenario");
        };
        assert_eq!(suggestion.as_deref(), Some("debug-crypt"));
    }

    #[test]
    fn resolve_far_has_no_suggestion() {
        let err = builtin_catalog().resolve("completely-different").unwrap_err();
        assert!(matches!(
            err,
            EngineError::UnknownScenario {
                suggestion: None,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", find_builtin("debug-crypt").unwrap().yaml).unwrap();
        let err = Catalog::load(&ScenarioLoader::with_defaults(), &[file.path().to_path_buf()])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateScenario { ref id } if id == "debug-crypt"));
    }

    #[test]
    fn stageless_scenario_rejected() {
        let empty = Arc::new(Scenario {
            id: "empty".to_string(),
            name: "Empty".to_string(),
            background: None,
            stages: vec![],
        });
        let err = Catalog::from_scenarios([empty]).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn format_lock_stage_answers() {
        let catalog = builtin_catalog();
        let scenario = catalog.get("format-lock").unwrap();

        let s1 = &scenario.stages[0].validator;
        assert!(validate(s1, "function add(a,b){return a+b}").ok);
        assert!(!validate(s1, "function add(a,b){return a-b}").ok);

        let s2 = &scenario.stages[1].validator;
        assert!(validate(s2, r#"{"id":42,"name":"Keyboard","price":199.99}"#).ok);
        assert!(!validate(s2, r#"{"id":"42","name":"Keyboard","price":199.99}"#).ok);

        let s3 = &scenario.stages[2].validator;
        assert!(validate(s3, "for (let i = 0; i <= 1000; i++) console.log(i)").ok);
    }

    #[test]
    fn debug_crypt_stage_answers() {
        let catalog = builtin_catalog();
        let scenario = catalog.get("debug-crypt").unwrap();

        let m1 = &scenario.stages[0];
        let icon = m1.icon_choice.as_ref().unwrap();
        assert_eq!(icon.correct_id, "debug");
        assert_eq!(icon.choices.len(), 4);
        assert!(matches!(m1.validator, ValidatorSpec::Normalized { .. }));

        let m2 = &scenario.stages[1].validator;
        assert!(validate(m2, r#"{"a":1}"#).ok);
        let invalid = validate(m2, "{'a':1,}");
        assert!(!invalid.ok);
        assert_eq!(invalid.message, "That isn't valid JSON.");

        let m3 = &scenario.stages[2].validator;
        assert!(validate(m3, r#"parseInt("  042  ".trim())"#).ok);
        assert!(validate(m3, r#"Number("  042  ".trim())"#).ok);
        assert!(!validate(m3, r#"parseInt("  042  ")"#).ok);
    }
}

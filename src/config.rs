use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Severity;

/// Default cap on fix passes before the convergence loop gives up.
pub const DEFAULT_MAX_PASSES: usize = 10;

/// Engine configuration.
///
/// Resolution of configuration from files or the environment is out of
/// scope; callers hand a fully resolved `LintConfig` to the linter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintConfig {
    /// Upper bound on fix passes in `lint_and_fix`.
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,

    /// Per-rule JSON options, keyed by rule id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rule_options: BTreeMap<String, serde_json::Value>,

    /// Per-rule severity overrides, keyed by rule id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub severities: BTreeMap<String, Severity>,
}

fn default_max_passes() -> usize {
    DEFAULT_MAX_PASSES
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            rule_options: BTreeMap::new(),
            severities: BTreeMap::new(),
        }
    }
}

impl LintConfig {
    pub fn options_for(&self, rule_id: &str) -> serde_json::Value {
        self.rule_options
            .get(rule_id)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }

    pub fn severity_for(&self, rule_id: &str) -> Severity {
        self.severities
            .get(rule_id)
            .copied()
            .unwrap_or(Severity::Warning)
    }
}

use std::sync::Arc;

use tracing::debug;

use super::builtin;
use super::Rule;

/// Holds the rules a linter instance runs, in registration order.
#[derive(Debug, Default, Clone)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with every builtin rule.
    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::new();
        for rule in builtin::all() {
            registry.register(rule);
        }
        registry
    }

    /// Re-registering an id replaces the earlier rule.
    pub fn register(&mut self, rule: Arc<dyn Rule>) {
        let id = rule.meta().id;
        if let Some(existing) = self.rules.iter_mut().find(|r| r.meta().id == id) {
            debug!(rule = id, "replacing registered rule");
            *existing = rule;
        } else {
            self.rules.push(rule);
        }
    }

    pub fn all(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.iter().find(|rule| rule.meta().id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// A registry narrowed to the given ids; unknown ids are ignored.
    pub fn filter_by_ids(&self, ids: &[String]) -> Self {
        Self {
            rules: self
                .rules
                .iter()
                .filter(|rule| ids.iter().any(|id| id == rule.meta().id))
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

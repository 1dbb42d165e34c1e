//! Rule plugin surface.
//!
//! A rule is metadata plus a factory: `create` runs once per pass and
//! returns the listeners that pass will dispatch. Listeners close over
//! `Rc<RefCell<..>>` state when they need to share; nothing is shared
//! across rules or across passes.

mod context;
mod registry;

pub mod builtin;

pub use context::{ReportDescriptor, RuleContext};
pub use registry::RuleRegistry;

use crate::codepath::{PathEvent, PathEventKind};
use crate::traversal::{NodeCallback, PathCallback};
use crate::tree::NodeRef;

#[derive(Debug, Clone)]
pub struct RuleMeta {
    pub id: &'static str,
    pub description: &'static str,
    /// Only fixable rules may attach fixes to reports.
    pub fixable: bool,
    pub has_suggestions: bool,
}

pub trait Rule: Send + Sync + std::fmt::Debug {
    fn meta(&self) -> &RuleMeta;

    /// Builds this rule's listeners for one pass over one file.
    fn create(&self, ctx: &RuleContext) -> ListenerMap;
}

/// Listener registrations returned by [`Rule::create`]. Selector patterns
/// are compiled later, against the pass's grammar; a pattern that fails to
/// compile drops that one registration.
#[derive(Default)]
pub struct ListenerMap {
    pub(crate) nodes: Vec<(String, NodeCallback)>,
    pub(crate) paths: Vec<(PathEventKind, PathCallback)>,
}

impl ListenerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        mut self,
        selector: impl Into<String>,
        callback: impl FnMut(NodeRef<'_>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.nodes.push((selector.into(), Box::new(callback)));
        self
    }

    pub fn on_path(
        mut self,
        kind: PathEventKind,
        callback: impl FnMut(&PathEvent<'_>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.paths.push((kind, Box::new(callback)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.paths.is_empty()
    }
}

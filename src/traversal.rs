use std::collections::HashMap;

use crate::codepath::{CodePathAnalyzer, PathEvent, PathEventKind, PathEventRec};
use crate::error::RuleFault;
use crate::selector::Selector;
use crate::tree::{NodeId, NodeRef, SourceTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Exit,
}

pub type NodeCallback = Box<dyn FnMut(NodeRef<'_>) -> anyhow::Result<()>>;
pub type PathCallback = Box<dyn FnMut(&PathEvent<'_>) -> anyhow::Result<()>>;

struct NodeListener {
    rule_id: String,
    selector: Selector,
    callback: NodeCallback,
}

struct PathListener {
    rule_id: String,
    kind: PathEventKind,
    callback: PathCallback,
}

/// Routes node and path events to listener callbacks.
///
/// Node listeners are bucketed by kind id so dispatch per node touches
/// only candidates that can match. When several listeners match one node,
/// they fire in ascending selector specificity, ties broken by
/// registration order.
#[derive(Default)]
pub struct EventDispatcher {
    node_listeners: Vec<NodeListener>,
    path_listeners: Vec<PathListener>,
    /// kind id -> (listener index, alternative index)
    enter_index: HashMap<u16, Vec<(usize, usize)>>,
    exit_index: HashMap<u16, Vec<(usize, usize)>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node_listener(
        &mut self,
        rule_id: impl Into<String>,
        selector: Selector,
        callback: NodeCallback,
    ) {
        let li = self.node_listeners.len();
        for (ai, alt) in selector.alternatives().iter().enumerate() {
            let index = if alt.on_exit {
                &mut self.exit_index
            } else {
                &mut self.enter_index
            };
            index.entry(alt.kind_id).or_default().push((li, ai));
        }
        self.node_listeners.push(NodeListener {
            rule_id: rule_id.into(),
            selector,
            callback,
        });
    }

    pub fn add_path_listener(
        &mut self,
        rule_id: impl Into<String>,
        kind: PathEventKind,
        callback: PathCallback,
    ) {
        self.path_listeners.push(PathListener {
            rule_id: rule_id.into(),
            kind,
            callback,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.node_listeners.is_empty() && self.path_listeners.is_empty()
    }

    fn dispatch_node(&mut self, node: NodeRef<'_>, phase: Phase) -> Result<(), RuleFault> {
        let index = match phase {
            Phase::Enter => &self.enter_index,
            Phase::Exit => &self.exit_index,
        };
        let Some(candidates) = index.get(&node.kind_id()) else {
            return Ok(());
        };

        // a listener fires at most once per node even when several of its
        // alternatives match; it sorts by its most specific match
        let mut specificity_by_listener: HashMap<usize, usize> = HashMap::new();
        for &(li, ai) in candidates {
            let alt = &self.node_listeners[li].selector.alternatives()[ai];
            if alt.matches(node) {
                let entry = specificity_by_listener.entry(li).or_insert(0);
                *entry = (*entry).max(alt.specificity());
            }
        }
        if specificity_by_listener.is_empty() {
            return Ok(());
        }

        let mut order: Vec<(usize, usize)> = specificity_by_listener
            .into_iter()
            .map(|(li, spec)| (spec, li))
            .collect();
        order.sort_unstable();

        for (_, li) in order {
            let listener = &mut self.node_listeners[li];
            (listener.callback)(node).map_err(|source| RuleFault {
                rule_id: listener.rule_id.clone(),
                span: node.span(),
                source,
            })?;
        }
        Ok(())
    }

    fn dispatch_path(&mut self, event: &PathEvent<'_>) -> Result<(), RuleFault> {
        for listener in &mut self.path_listeners {
            if listener.kind != event.kind {
                continue;
            }
            (listener.callback)(event).map_err(|source| RuleFault {
                rule_id: listener.rule_id.clone(),
                span: event.node.span(),
                source,
            })?;
        }
        Ok(())
    }
}

enum Step {
    Enter(NodeId),
    Exit(NodeId),
}

/// One depth-first walk over the tree's named nodes.
///
/// Per node: path events produced by entering it, then its enter
/// listeners; on the way out, path events produced by leaving it, then
/// its exit listeners. The first listener error aborts the walk.
pub fn run_pass(tree: &SourceTree, dispatcher: &mut EventDispatcher) -> Result<(), RuleFault> {
    let mut analyzer = CodePathAnalyzer::new();
    let mut stack = vec![Step::Enter(tree.root().id())];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(id) => {
                let node = tree.node(id);
                let events = analyzer.enter_node(node);
                forward(&events, &analyzer, tree, dispatcher)?;
                dispatcher.dispatch_node(node, Phase::Enter)?;

                stack.push(Step::Exit(id));
                let children: Vec<NodeId> =
                    node.named_children().map(|child| child.id()).collect();
                for child in children.into_iter().rev() {
                    stack.push(Step::Enter(child));
                }
            }
            Step::Exit(id) => {
                let node = tree.node(id);
                let events = analyzer.leave_node(node);
                forward(&events, &analyzer, tree, dispatcher)?;
                dispatcher.dispatch_node(node, Phase::Exit)?;
            }
        }
    }
    Ok(())
}

fn forward(
    events: &[PathEventRec],
    analyzer: &CodePathAnalyzer,
    tree: &SourceTree,
    dispatcher: &mut EventDispatcher,
) -> Result<(), RuleFault> {
    for rec in events {
        let event = PathEvent {
            kind: rec.kind,
            path: analyzer.path(rec.path),
            segment: rec.segment,
            from: rec.from,
            node: tree.node(rec.node),
        };
        dispatcher.dispatch_path(&event)?;
    }
    Ok(())
}

use crate::tree::{NodeId, NodeRef};

use super::{
    CodePath, EdgeKind, PathEventKind, PathEventRec, PathId, PathOrigin, Segment, SegmentId,
};

/// In-progress branching construct on a path's context stack.
///
/// Every variant remembers the node that opened it, so pops can verify
/// they match and non-local exits can find their enclosing loop or switch.
#[derive(Debug)]
pub(crate) enum FlowContext {
    /// `if`/`else` and ternaries share a shape: the condition's end feeds
    /// both branches, finished branch ends collect until the join.
    Branch {
        node: NodeId,
        cond_end: Vec<SegmentId>,
        branch_ends: Vec<SegmentId>,
    },
    /// Logical `&&`/`||`/`??` and optional chaining: the left operand's
    /// end both enters the right operand and skips past it.
    ShortCircuit {
        node: NodeId,
        left_end: Vec<SegmentId>,
    },
    Loop {
        node: NodeId,
        target: Option<SegmentId>,
        /// Segment ends that exit the loop when the test fails.
        test_end: Vec<SegmentId>,
        break_ends: Vec<SegmentId>,
    },
    Switch {
        node: NodeId,
        /// End of the discriminant evaluation; every case forks from here.
        dispatch_end: Vec<SegmentId>,
        has_default: bool,
        break_ends: Vec<SegmentId>,
        case_seen: bool,
    },
    Try {
        node: NodeId,
        /// Segments feeding the try body; the handler forks from here
        /// since any point of the body may throw.
        entry: Vec<SegmentId>,
        body_end: Vec<SegmentId>,
    },
}

impl FlowContext {
    fn node(&self) -> NodeId {
        match self {
            FlowContext::Branch { node, .. }
            | FlowContext::ShortCircuit { node, .. }
            | FlowContext::Loop { node, .. }
            | FlowContext::Switch { node, .. }
            | FlowContext::Try { node, .. } => *node,
        }
    }
}

fn path_origin(kind: &str) -> Option<PathOrigin> {
    match kind {
        "program" => Some(PathOrigin::Program),
        "function_declaration"
        | "function_expression"
        | "function"
        | "generator_function"
        | "generator_function_declaration"
        | "arrow_function"
        | "method_definition" => Some(PathOrigin::Function),
        "class_static_block" => Some(PathOrigin::ClassStaticBlock),
        _ => None,
    }
}

fn is_logical(parent: NodeRef<'_>) -> bool {
    parent.kind() == "binary_expression"
        && matches!(
            parent.field("operator").map(|op| op.text()),
            Some("&&") | Some("||") | Some("??")
        )
}

fn has_optional_chain(parent: NodeRef<'_>) -> bool {
    parent.children().any(|child| child.kind() == "optional_chain")
}

/// The grammar fills an absent `for` test with an `empty_statement`, so
/// presence of the field alone says nothing.
fn for_has_condition(parent: NodeRef<'_>) -> bool {
    parent
        .field("condition")
        .is_some_and(|cond| cond.kind() != "empty_statement")
}

/// State machine reconstructing control flow while the traversal walks.
///
/// `enter_node`/`leave_node` return the lifecycle events the step
/// produced; the caller resolves them against [`CodePathAnalyzer::path`]
/// and forwards them to listeners. Completed paths stay in the arena so
/// events remain resolvable after `PathEnd`.
#[derive(Debug, Default)]
pub struct CodePathAnalyzer {
    paths: Vec<CodePath>,
    stack: Vec<usize>,
}

impl CodePathAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &[CodePath] {
        &self.paths
    }

    /// Path ids are dense indices into the arena.
    pub fn path(&self, id: PathId) -> &CodePath {
        &self.paths[id.0 as usize]
    }

    pub fn enter_node(&mut self, node: NodeRef<'_>) -> Vec<PathEventRec> {
        let mut out = Vec::new();
        if !self.stack.is_empty() {
            self.on_enter_child(node, &mut out);
            self.on_enter_construct(node);
        }
        if let Some(origin) = path_origin(node.kind()) {
            self.start_path(node.id(), origin, &mut out);
        }
        out
    }

    pub fn leave_node(&mut self, node: NodeRef<'_>) -> Vec<PathEventRec> {
        let mut out = Vec::new();
        if path_origin(node.kind()).is_some() {
            self.end_path(node.id(), &mut out);
            return out;
        }
        if !self.stack.is_empty() {
            self.on_leave(node, &mut out);
        }
        out
    }

    // ==================== path lifecycle ====================

    fn start_path(&mut self, node: NodeId, origin: PathOrigin, out: &mut Vec<PathEventRec>) {
        let id = PathId(self.paths.len() as u32);
        self.paths.push(CodePath {
            id,
            origin,
            root: node,
            segments: Vec::new(),
            current: Vec::new(),
            ctx: Vec::new(),
        });
        let pi = self.paths.len() - 1;
        self.stack.push(pi);
        out.push(PathEventRec {
            kind: PathEventKind::PathStart,
            path: id,
            segment: None,
            from: None,
            node,
        });
        self.open_segment(pi, node, Vec::new(), false, false, out);
    }

    fn end_path(&mut self, node: NodeId, out: &mut Vec<PathEventRec>) {
        let Some(pi) = self.stack.pop() else { return };
        self.close_current(pi, node, out);
        out.push(PathEventRec {
            kind: PathEventKind::PathEnd,
            path: self.paths[pi].id,
            segment: None,
            from: None,
            node,
        });
    }

    // ==================== segment plumbing ====================

    /// Ends every open segment, emitting end events, and returns the ids.
    fn close_current(
        &mut self,
        pi: usize,
        node: NodeId,
        out: &mut Vec<PathEventRec>,
    ) -> Vec<SegmentId> {
        let path = &mut self.paths[pi];
        let ids = std::mem::take(&mut path.current);
        for &id in &ids {
            out.push(PathEventRec {
                kind: if path.segments[id.0 as usize].reachable {
                    PathEventKind::SegmentEnd
                } else {
                    PathEventKind::UnreachableSegmentEnd
                },
                path: path.id,
                segment: Some(id),
                from: None,
                node,
            });
        }
        ids
    }

    /// Opens a fresh segment fed by `preds` and makes it current.
    /// Reachability is decided here and never revisited.
    fn open_segment(
        &mut self,
        pi: usize,
        node: NodeId,
        preds: Vec<SegmentId>,
        forced_unreachable: bool,
        loop_target: bool,
        out: &mut Vec<PathEventRec>,
    ) -> SegmentId {
        let path = &mut self.paths[pi];
        let reachable = if forced_unreachable {
            false
        } else if path.segments.is_empty() {
            true
        } else {
            preds
                .iter()
                .any(|&p| path.segments[p.0 as usize].reachable)
        };
        let id = SegmentId(path.segments.len() as u32);
        path.segments.push(Segment {
            id,
            prev: preds.into_iter().map(|p| (p, EdgeKind::Forward)).collect(),
            reachable,
            is_loop_target: loop_target,
        });
        path.current = vec![id];
        out.push(PathEventRec {
            kind: if reachable {
                PathEventKind::SegmentStart
            } else {
                PathEventKind::UnreachableSegmentStart
            },
            path: path.id,
            segment: Some(id),
            from: None,
            node,
        });
        id
    }

    // ==================== context stack helpers ====================

    fn top_index(&self) -> Option<usize> {
        self.stack.last().copied()
    }

    fn ctx_mut_for(&mut self, pi: usize, node: NodeId) -> Option<&mut FlowContext> {
        self.paths[pi]
            .ctx
            .iter_mut()
            .rev()
            .find(|ctx| ctx.node() == node)
    }

    /// Pops the top context iff it belongs to `node`. Push and pop nest
    /// with the traversal, so a top check suffices.
    fn pop_ctx_for(&mut self, pi: usize, node: NodeId) -> Option<FlowContext> {
        let path = &mut self.paths[pi];
        match path.ctx.last() {
            Some(ctx) if ctx.node() == node => path.ctx.pop(),
            _ => None,
        }
    }

    // ==================== enter transitions ====================

    /// Contexts opened by the construct node itself.
    fn on_enter_construct(&mut self, node: NodeRef<'_>) {
        let Some(pi) = self.top_index() else { return };
        let ctx = match node.kind() {
            "if_statement" | "ternary_expression" => FlowContext::Branch {
                node: node.id(),
                cond_end: Vec::new(),
                branch_ends: Vec::new(),
            },
            "while_statement" | "do_statement" | "for_statement" | "for_in_statement" => {
                FlowContext::Loop {
                    node: node.id(),
                    target: None,
                    test_end: Vec::new(),
                    break_ends: Vec::new(),
                }
            }
            "switch_statement" => FlowContext::Switch {
                node: node.id(),
                dispatch_end: Vec::new(),
                has_default: false,
                break_ends: Vec::new(),
                case_seen: false,
            },
            "try_statement" => FlowContext::Try {
                node: node.id(),
                entry: Vec::new(),
                body_end: Vec::new(),
            },
            _ => return,
        };
        self.paths[pi].ctx.push(ctx);
    }

    /// Forks and joins triggered by stepping into a particular grammar
    /// field of the enclosing construct.
    fn on_enter_child(&mut self, node: NodeRef<'_>, out: &mut Vec<PathEventRec>) {
        let Some(pi) = self.top_index() else { return };
        let Some(parent) = node.parent() else { return };

        // switch arms carry no field name; key on their own kind
        if matches!(node.kind(), "switch_case" | "switch_default")
            && parent.kind() == "switch_body"
        {
            self.enter_switch_arm(pi, node, parent, out);
            return;
        }

        let Some(field) = node.field_name() else { return };
        match (parent.kind(), field) {
            ("if_statement", "consequence") | ("ternary_expression", "consequence") => {
                let ends = self.close_current(pi, node.id(), out);
                if let Some(FlowContext::Branch { cond_end, .. }) =
                    self.ctx_mut_for(pi, parent.id())
                {
                    *cond_end = ends.clone();
                }
                self.open_segment(pi, node.id(), ends, false, false, out);
            }
            ("if_statement", "alternative") | ("ternary_expression", "alternative") => {
                let ends = self.close_current(pi, node.id(), out);
                let mut fork = Vec::new();
                if let Some(FlowContext::Branch {
                    cond_end,
                    branch_ends,
                    ..
                }) = self.ctx_mut_for(pi, parent.id())
                {
                    branch_ends.extend(ends);
                    fork = cond_end.clone();
                }
                self.open_segment(pi, node.id(), fork, false, false, out);
            }
            ("binary_expression", "right") if is_logical(parent) => {
                self.enter_short_circuit(pi, node, parent, out);
            }
            ("member_expression", "property")
            | ("subscript_expression", "index")
            | ("call_expression", "arguments")
                if has_optional_chain(parent) =>
            {
                self.enter_short_circuit(pi, node, parent, out);
            }
            ("while_statement", "condition") => {
                let ends = self.close_current(pi, node.id(), out);
                let seg = self.open_segment(pi, node.id(), ends, false, true, out);
                if let Some(FlowContext::Loop { target, .. }) = self.ctx_mut_for(pi, parent.id())
                {
                    *target = Some(seg);
                }
            }
            ("while_statement", "body") => {
                let ends = self.close_current(pi, node.id(), out);
                if let Some(FlowContext::Loop { test_end, .. }) =
                    self.ctx_mut_for(pi, parent.id())
                {
                    *test_end = ends.clone();
                }
                self.open_segment(pi, node.id(), ends, false, false, out);
            }
            ("do_statement", "body") => {
                let ends = self.close_current(pi, node.id(), out);
                let seg = self.open_segment(pi, node.id(), ends, false, true, out);
                if let Some(FlowContext::Loop { target, .. }) = self.ctx_mut_for(pi, parent.id())
                {
                    *target = Some(seg);
                }
            }
            ("do_statement", "condition") => {
                let ends = self.close_current(pi, node.id(), out);
                self.open_segment(pi, node.id(), ends, false, false, out);
            }
            ("for_statement", "condition") => {
                if node.kind() == "empty_statement" {
                    return;
                }
                // the test is the loop target only when no update follows
                let ends = self.close_current(pi, node.id(), out);
                let is_target = parent.field("increment").is_none();
                let seg = self.open_segment(pi, node.id(), ends, false, is_target, out);
                if is_target {
                    if let Some(FlowContext::Loop { target, .. }) =
                        self.ctx_mut_for(pi, parent.id())
                    {
                        *target = Some(seg);
                    }
                }
            }
            ("for_statement", "increment") => {
                let ends = self.close_current(pi, node.id(), out);
                let has_cond = for_has_condition(parent);
                let seg = self.open_segment(pi, node.id(), ends.clone(), false, true, out);
                if let Some(FlowContext::Loop {
                    target, test_end, ..
                }) = self.ctx_mut_for(pi, parent.id())
                {
                    *target = Some(seg);
                    if has_cond {
                        *test_end = ends;
                    }
                }
            }
            ("for_statement", "body") => {
                let ends = self.close_current(pi, node.id(), out);
                let has_cond = for_has_condition(parent);
                let has_incr = parent.field("increment").is_some();
                if has_incr {
                    self.open_segment(pi, node.id(), ends, false, false, out);
                } else if has_cond {
                    if let Some(FlowContext::Loop { test_end, .. }) =
                        self.ctx_mut_for(pi, parent.id())
                    {
                        *test_end = ends.clone();
                    }
                    self.open_segment(pi, node.id(), ends, false, false, out);
                } else {
                    // for(;;): the body entry is the only loop target and
                    // nothing exits through a failed test
                    let seg = self.open_segment(pi, node.id(), ends, false, true, out);
                    if let Some(FlowContext::Loop { target, .. }) =
                        self.ctx_mut_for(pi, parent.id())
                    {
                        *target = Some(seg);
                    }
                }
            }
            ("for_in_statement", "left") => {
                let ends = self.close_current(pi, node.id(), out);
                let seg = self.open_segment(pi, node.id(), ends, false, true, out);
                if let Some(FlowContext::Loop { target, .. }) = self.ctx_mut_for(pi, parent.id())
                {
                    *target = Some(seg);
                }
            }
            ("for_in_statement", "body") => {
                let ends = self.close_current(pi, node.id(), out);
                if let Some(FlowContext::Loop { test_end, .. }) =
                    self.ctx_mut_for(pi, parent.id())
                {
                    *test_end = ends.clone();
                }
                self.open_segment(pi, node.id(), ends, false, false, out);
            }
            ("try_statement", "body") => {
                let ends = self.close_current(pi, node.id(), out);
                if let Some(FlowContext::Try { entry, .. }) = self.ctx_mut_for(pi, parent.id()) {
                    *entry = ends.clone();
                }
                self.open_segment(pi, node.id(), ends, false, false, out);
            }
            ("try_statement", "handler") => {
                let ends = self.close_current(pi, node.id(), out);
                let mut fork = Vec::new();
                if let Some(FlowContext::Try {
                    entry, body_end, ..
                }) = self.ctx_mut_for(pi, parent.id())
                {
                    *body_end = ends;
                    fork = entry.clone();
                }
                self.open_segment(pi, node.id(), fork, false, false, out);
            }
            ("try_statement", "finalizer") => {
                let mut preds = self.close_current(pi, node.id(), out);
                if let Some(FlowContext::Try { body_end, .. }) =
                    self.ctx_mut_for(pi, parent.id())
                {
                    preds.extend(body_end.iter().copied());
                }
                self.open_segment(pi, node.id(), preds, false, false, out);
            }
            _ => {}
        }
    }

    fn enter_short_circuit(
        &mut self,
        pi: usize,
        node: NodeRef<'_>,
        parent: NodeRef<'_>,
        out: &mut Vec<PathEventRec>,
    ) {
        let ends = self.close_current(pi, node.id(), out);
        self.paths[pi].ctx.push(FlowContext::ShortCircuit {
            node: parent.id(),
            left_end: ends.clone(),
        });
        self.open_segment(pi, node.id(), ends, false, false, out);
    }

    fn enter_switch_arm(
        &mut self,
        pi: usize,
        node: NodeRef<'_>,
        body: NodeRef<'_>,
        out: &mut Vec<PathEventRec>,
    ) {
        let Some(switch) = body.parent() else { return };
        let fall = self.close_current(pi, node.id(), out);
        let is_default = node.kind() == "switch_default";
        let mut preds = Vec::new();
        if let Some(FlowContext::Switch {
            dispatch_end,
            has_default,
            case_seen,
            ..
        }) = self.ctx_mut_for(pi, switch.id())
        {
            if !*case_seen {
                *case_seen = true;
                *dispatch_end = fall.clone();
                preds = fall;
            } else {
                preds = dispatch_end.clone();
                preds.extend(fall);
            }
            if is_default {
                *has_default = true;
            }
        }
        self.open_segment(pi, node.id(), preds, false, false, out);
    }

    // ==================== leave transitions ====================

    fn on_leave(&mut self, node: NodeRef<'_>, out: &mut Vec<PathEventRec>) {
        let Some(pi) = self.top_index() else { return };
        match node.kind() {
            "return_statement" | "throw_statement" => {
                let ends = self.close_current(pi, node.id(), out);
                self.open_segment(pi, node.id(), ends, true, false, out);
            }
            "break_statement" => {
                let ends = self.close_current(pi, node.id(), out);
                let target = self.paths[pi].ctx.iter().rposition(|ctx| {
                    matches!(ctx, FlowContext::Loop { .. } | FlowContext::Switch { .. })
                });
                if let Some(i) = target {
                    match &mut self.paths[pi].ctx[i] {
                        FlowContext::Loop { break_ends, .. }
                        | FlowContext::Switch { break_ends, .. } => {
                            break_ends.extend(ends.iter().copied());
                        }
                        _ => {}
                    }
                }
                self.open_segment(pi, node.id(), ends, true, false, out);
            }
            "continue_statement" => {
                let loop_idx = self.paths[pi]
                    .ctx
                    .iter()
                    .rposition(|ctx| matches!(ctx, FlowContext::Loop { .. }));
                if let Some(i) = loop_idx {
                    let target = match self.paths[pi].ctx[i] {
                        FlowContext::Loop { target, .. } => target,
                        _ => None,
                    };
                    if let Some(t) = target {
                        self.emit_loop_back(pi, t, node.id(), out);
                    }
                }
                let ends = self.close_current(pi, node.id(), out);
                self.open_segment(pi, node.id(), ends, true, false, out);
            }
            "if_statement" | "ternary_expression" => {
                let Some(FlowContext::Branch {
                    cond_end,
                    mut branch_ends,
                    ..
                }) = self.pop_ctx_for(pi, node.id())
                else {
                    return;
                };
                let last = self.close_current(pi, node.id(), out);
                branch_ends.extend(last);
                if node.field("alternative").is_none() {
                    // no else: a false test skips straight past
                    branch_ends.extend(cond_end);
                }
                self.open_segment(pi, node.id(), branch_ends, false, false, out);
            }
            "binary_expression" | "member_expression" | "subscript_expression"
            | "call_expression" => {
                let Some(FlowContext::ShortCircuit { left_end, .. }) =
                    self.pop_ctx_for(pi, node.id())
                else {
                    return;
                };
                let mut joins = self.close_current(pi, node.id(), out);
                joins.extend(left_end);
                self.open_segment(pi, node.id(), joins, false, false, out);
            }
            "while_statement" | "do_statement" | "for_statement" | "for_in_statement" => {
                let Some(FlowContext::Loop {
                    target,
                    test_end,
                    break_ends,
                    ..
                }) = self.pop_ctx_for(pi, node.id())
                else {
                    return;
                };
                if let Some(t) = target {
                    self.emit_loop_back(pi, t, node.id(), out);
                }
                let ends = self.close_current(pi, node.id(), out);
                // a do-while exits through its test's end; every other
                // loop exits through the saved test end and breaks
                let mut exit = if node.kind() == "do_statement" {
                    ends
                } else {
                    test_end
                };
                exit.extend(break_ends);
                self.open_segment(pi, node.id(), exit, false, false, out);
            }
            "switch_statement" => {
                let Some(FlowContext::Switch {
                    dispatch_end,
                    has_default,
                    mut break_ends,
                    ..
                }) = self.pop_ctx_for(pi, node.id())
                else {
                    return;
                };
                let fall = self.close_current(pi, node.id(), out);
                break_ends.extend(fall);
                if !has_default {
                    break_ends.extend(dispatch_end);
                }
                self.open_segment(pi, node.id(), break_ends, false, false, out);
            }
            "try_statement" => {
                let Some(FlowContext::Try { body_end, .. }) = self.pop_ctx_for(pi, node.id())
                else {
                    return;
                };
                let mut joins = self.close_current(pi, node.id(), out);
                if node.field("finalizer").is_none() {
                    joins.extend(body_end);
                }
                self.open_segment(pi, node.id(), joins, false, false, out);
            }
            _ => {}
        }
    }

    /// Records loop-back edges from every reachable open segment and
    /// emits the matching `SegmentLoop` events. Unreachable origins get
    /// neither an event nor an edge.
    fn emit_loop_back(
        &mut self,
        pi: usize,
        target: SegmentId,
        node: NodeId,
        out: &mut Vec<PathEventRec>,
    ) {
        let origins: Vec<SegmentId> = {
            let path = &self.paths[pi];
            path.current
                .iter()
                .copied()
                .filter(|&s| path.segments[s.0 as usize].reachable)
                .collect()
        };
        let path_id = self.paths[pi].id;
        for from in origins {
            out.push(PathEventRec {
                kind: PathEventKind::SegmentLoop,
                path: path_id,
                segment: Some(target),
                from: Some(from),
                node,
            });
            self.paths[pi].segments[target.0 as usize]
                .prev
                .push((from, EdgeKind::LoopBack));
        }
    }
}

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::codepath::{PathEventKind, PathId, SegmentId};
use crate::rules::{ListenerMap, ReportDescriptor, Rule, RuleContext, RuleMeta};
use crate::tree::{NodeId, Span};

static META: RuleMeta = RuleMeta {
    id: "no-unreachable-loop",
    description: "Disallow loops whose body allows only one iteration",
    fixable: false,
    has_suggestions: false,
};

const MESSAGE: &str = "Invalid loop. Its body allows only one iteration.";

const LOOP_SELECTOR: &str =
    "while_statement, do_statement, for_statement, for_in_statement";

fn is_loop_kind(kind: &str) -> bool {
    matches!(
        kind,
        "while_statement" | "do_statement" | "for_statement" | "for_in_statement"
    )
}

#[derive(Default)]
struct State {
    /// Per-path working sets of (segment, reachable), innermost last.
    segment_stack: Vec<Vec<(SegmentId, bool)>>,
    /// Loop-target segment -> the loop node it belongs to. Segment ids
    /// are only unique within a path, hence the composite key.
    loops_by_target: BTreeMap<(PathId, SegmentId), NodeId>,
    /// Candidate loops; a recorded back edge clears its loop. BTreeMap
    /// over preorder node ids keeps report order deterministic.
    to_report: BTreeMap<NodeId, Span>,
}

impl State {
    fn drop_segment(&mut self, segment: Option<SegmentId>) {
        if let (Some(seg), Some(top)) = (segment, self.segment_stack.last_mut()) {
            top.retain(|&(id, _)| id != seg);
        }
    }

    fn any_current_reachable(&self) -> bool {
        self.segment_stack
            .last()
            .is_some_and(|set| set.iter().any(|&(_, reachable)| reachable))
    }

    fn record_start(&mut self, event: &crate::codepath::PathEvent<'_>, reachable: bool) {
        let Some(seg) = event.segment else { return };
        if let Some(top) = self.segment_stack.last_mut() {
            top.push((seg, reachable));
        }
        if event.path.segment(seg).is_loop_target {
            if let Some(parent) = event.node.parent() {
                if is_loop_kind(parent.kind()) {
                    self.loops_by_target
                        .insert((event.path.id(), seg), parent.id());
                }
            }
        }
    }
}

/// Flags loops that can never run their body more than once: every path
/// through the body exits the loop, so no back edge ever reaches the
/// loop's target segment.
#[derive(Debug, Default)]
pub struct NoUnreachableLoop;

impl Rule for NoUnreachableLoop {
    fn meta(&self) -> &RuleMeta {
        &META
    }

    fn create(&self, ctx: &RuleContext) -> ListenerMap {
        let state = Rc::new(RefCell::new(State::default()));
        let ctx = ctx.clone();

        ListenerMap::new()
            .on_path(PathEventKind::PathStart, {
                let state = Rc::clone(&state);
                move |_| {
                    state.borrow_mut().segment_stack.push(Vec::new());
                    Ok(())
                }
            })
            .on_path(PathEventKind::PathEnd, {
                let state = Rc::clone(&state);
                move |_| {
                    state.borrow_mut().segment_stack.pop();
                    Ok(())
                }
            })
            .on_path(PathEventKind::SegmentStart, {
                let state = Rc::clone(&state);
                move |event| {
                    state.borrow_mut().record_start(event, true);
                    Ok(())
                }
            })
            .on_path(PathEventKind::UnreachableSegmentStart, {
                let state = Rc::clone(&state);
                move |event| {
                    state.borrow_mut().record_start(event, false);
                    Ok(())
                }
            })
            .on_path(PathEventKind::SegmentEnd, {
                let state = Rc::clone(&state);
                move |event| {
                    state.borrow_mut().drop_segment(event.segment);
                    Ok(())
                }
            })
            .on_path(PathEventKind::UnreachableSegmentEnd, {
                let state = Rc::clone(&state);
                move |event| {
                    state.borrow_mut().drop_segment(event.segment);
                    Ok(())
                }
            })
            .on_path(PathEventKind::SegmentLoop, {
                let state = Rc::clone(&state);
                move |event| {
                    let mut st = state.borrow_mut();
                    let Some(target) = event.segment else {
                        return Ok(());
                    };
                    let key = (event.path.id(), target);
                    if let Some(&loop_node) = st.loops_by_target.get(&key) {
                        // the back edge belongs to this loop when it comes
                        // from the loop's own end or a continue inside it
                        if event.node.id() == loop_node
                            || event.node.kind() == "continue_statement"
                        {
                            st.to_report.remove(&loop_node);
                        }
                    }
                    Ok(())
                }
            })
            .on(LOOP_SELECTOR, {
                let state = Rc::clone(&state);
                move |node| {
                    let mut st = state.borrow_mut();
                    if st.any_current_reachable() {
                        st.to_report.insert(node.id(), node.span());
                    }
                    Ok(())
                }
            })
            .on("program:exit", move |_| {
                for &span in state.borrow().to_report.values() {
                    ctx.report(ReportDescriptor::new(span, MESSAGE));
                }
                Ok(())
            })
    }
}

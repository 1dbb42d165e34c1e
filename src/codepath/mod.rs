//! Control-flow reconstruction layered on the traversal.
//!
//! Each function-like region (the program itself, function declarations and
//! expressions, arrow functions, methods, class static blocks) gets its own
//! [`CodePath`]: an arena of [`Segment`]s describing maximal straight-line
//! runs, connected by forward and loop-back edges. Reachability is decided
//! eagerly when a segment opens. Lifecycle events stream to interested rules
//! interleaved with node events.

mod analyzer;

pub(crate) use analyzer::FlowContext;
pub use analyzer::CodePathAnalyzer;

use crate::tree::{NodeId, NodeRef};

/// Index of a segment within its owning [`CodePath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u32);

/// Identity of a code path within one pass over one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathId(pub u32);

/// How control reaches a segment from a predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Forward,
    /// Back edge from a loop body end or `continue` to the loop's target
    /// segment. Kept distinct so the graph stays cycle-free for ownership
    /// purposes while still recording iteration.
    LoopBack,
}

/// One maximal straight-line run of code.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: SegmentId,
    /// Incoming edges. Loop-back edges are appended after the fact, when
    /// the loop's end is analyzed.
    pub prev: Vec<(SegmentId, EdgeKind)>,
    /// Decided when the segment opens: true iff any forward predecessor is
    /// reachable (or this is the path's entry segment).
    pub reachable: bool,
    /// True for segments loop-back edges may point at: a `while`/`for`
    /// test, a `for` update, a `do` body entry, a `for-in` iteration
    /// assignment.
    pub is_loop_target: bool,
}

/// What kind of region a path covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOrigin {
    Program,
    Function,
    ClassStaticBlock,
}

/// The control-flow graph of one function-like region.
#[derive(Debug)]
pub struct CodePath {
    pub(crate) id: PathId,
    pub(crate) origin: PathOrigin,
    pub(crate) root: NodeId,
    pub(crate) segments: Vec<Segment>,
    /// Working set of open segments, in flux during analysis.
    pub(crate) current: Vec<SegmentId>,
    /// Stack of in-progress branching constructs.
    pub(crate) ctx: Vec<FlowContext>,
}

impl CodePath {
    pub fn id(&self) -> PathId {
        self.id
    }

    pub fn origin(&self) -> PathOrigin {
        self.origin
    }

    /// The node that opened this path.
    pub fn root_node(&self) -> NodeId {
        self.root
    }

    pub fn segment(&self, id: SegmentId) -> &Segment {
        &self.segments[id.0 as usize]
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn current_segments(&self) -> &[SegmentId] {
        &self.current
    }
}

/// Lifecycle event kinds, in the order a consumer can rely on: a path
/// starts before any of its segments, segments end before the path does,
/// and `SegmentLoop` fires when a back edge is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathEventKind {
    PathStart,
    PathEnd,
    SegmentStart,
    SegmentEnd,
    UnreachableSegmentStart,
    UnreachableSegmentEnd,
    SegmentLoop,
}

/// Internal event record; resolved to a [`PathEvent`] against the
/// analyzer's path arena before dispatch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PathEventRec {
    pub kind: PathEventKind,
    pub path: PathId,
    pub segment: Option<SegmentId>,
    pub from: Option<SegmentId>,
    pub node: NodeId,
}

/// A lifecycle event as rules see it.
#[derive(Debug, Clone, Copy)]
pub struct PathEvent<'a> {
    pub kind: PathEventKind,
    pub path: &'a CodePath,
    /// The segment the event concerns; the loop target for `SegmentLoop`.
    pub segment: Option<SegmentId>,
    /// Origin segment of a `SegmentLoop` back edge.
    pub from: Option<SegmentId>,
    /// The node being entered or left when the event fired.
    pub node: NodeRef<'a>,
}

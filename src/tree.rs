use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Index of a node in a [`SourceTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Half-open byte range into the source text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True when the ranges share at least one byte. Touching ranges
    /// (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub kind: &'static str,
    pub kind_id: u16,
    pub named: bool,
    pub span: Span,
    /// Grammar field name this node occupies in its parent, if any.
    pub field: Option<&'static str>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Immutable arena of syntax nodes built once per pass from a parsed
/// tree-sitter tree.
///
/// Holds every named node plus anonymous children that carry a grammar
/// field name (operator tokens and the like), so attribute predicates can
/// see them. Parent links are plain indices; nothing here owns anything
/// else, so the structure is trivially droppable and shareable.
#[derive(Debug)]
pub struct SourceTree {
    source: Arc<str>,
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl SourceTree {
    pub(crate) fn new(source: Arc<str>, nodes: Vec<NodeData>, root: NodeId) -> Self {
        Self {
            source,
            nodes,
            root,
        }
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            tree: self,
            id: self.root,
        }
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn source_arc(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn text_of(&self, span: Span) -> &str {
        &self.source[span.start..span.end.min(self.source.len())]
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }
}

/// Cheap handle to one node in a [`SourceTree`].
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t SourceTree,
    id: NodeId,
}

impl<'t> NodeRef<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t SourceTree {
        self.tree
    }

    pub fn kind(&self) -> &'static str {
        self.tree.data(self.id).kind
    }

    pub fn kind_id(&self) -> u16 {
        self.tree.data(self.id).kind_id
    }

    pub fn is_named(&self) -> bool {
        self.tree.data(self.id).named
    }

    pub fn span(&self) -> Span {
        self.tree.data(self.id).span
    }

    pub fn text(&self) -> &'t str {
        self.tree.text_of(self.tree.data(self.id).span)
    }

    /// Grammar field this node fills in its parent, if any.
    pub fn field_name(&self) -> Option<&'static str> {
        self.tree.data(self.id).field
    }

    pub fn parent(&self) -> Option<NodeRef<'t>> {
        self.tree.data(self.id).parent.map(|id| self.tree.node(id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'t>> + '_ {
        self.tree
            .data(self.id)
            .children
            .iter()
            .map(move |&id| self.tree.node(id))
    }

    pub fn named_children(&self) -> impl Iterator<Item = NodeRef<'t>> + '_ {
        self.children().filter(|c| c.is_named())
    }

    pub fn child_count(&self) -> usize {
        self.tree.data(self.id).children.len()
    }

    /// First child occupying the given grammar field.
    pub fn field(&self, name: &str) -> Option<NodeRef<'t>> {
        self.children().find(|c| c.field_name() == Some(name))
    }

    /// Walks parent links from the immediate parent up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'t>> + '_ {
        std::iter::successors(self.parent(), |node| node.parent())
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("span", &self.span())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Span ====================

    #[test]
    fn span_overlap_is_strict() {
        let a = Span::new(0, 4);
        let b = Span::new(4, 8);
        let c = Span::new(3, 5);
        assert!(!a.overlaps(&b), "touching spans do not overlap");
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn span_contains_is_half_open() {
        let s = Span::new(2, 5);
        assert!(!s.contains(1));
        assert!(s.contains(2));
        assert!(s.contains(4));
        assert!(!s.contains(5));
    }

    #[test]
    fn empty_span_overlaps_nothing() {
        let empty = Span::new(3, 3);
        assert!(empty.is_empty());
        assert!(!empty.overlaps(&Span::new(0, 10)));
    }

    // ==================== Arena navigation ====================

    fn two_node_tree() -> SourceTree {
        // Hand-built arena: root "program" spanning "x;" with one child.
        let nodes = vec![
            NodeData {
                kind: "program",
                kind_id: 1,
                named: true,
                span: Span::new(0, 2),
                field: None,
                parent: None,
                children: vec![NodeId(1)],
            },
            NodeData {
                kind: "expression_statement",
                kind_id: 2,
                named: true,
                span: Span::new(0, 2),
                field: None,
                parent: Some(NodeId(0)),
                children: vec![],
            },
        ];
        SourceTree::new(Arc::from("x;"), nodes, NodeId(0))
    }

    #[test]
    fn root_and_child_links() {
        let tree = two_node_tree();
        let root = tree.root();
        assert_eq!(root.kind(), "program");
        let child = root.children().next().unwrap();
        assert_eq!(child.kind(), "expression_statement");
        assert_eq!(child.parent().unwrap().id(), root.id());
        assert!(root.parent().is_none());
    }

    #[test]
    fn text_follows_span() {
        let tree = two_node_tree();
        assert_eq!(tree.root().text(), "x;");
        assert_eq!(tree.text_of(Span::new(0, 1)), "x");
    }

    #[test]
    fn ancestors_walk_to_root() {
        let tree = two_node_tree();
        let child = tree.root().children().next().unwrap();
        let ancestors: Vec<_> = child.ancestors().map(|a| a.kind()).collect();
        assert_eq!(ancestors, vec!["program"]);
    }
}

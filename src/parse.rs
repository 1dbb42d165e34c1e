use std::sync::Arc;

use tree_sitter::{Language, Node, Parser};

use crate::error::ParseError;
use crate::tree::{NodeData, NodeId, SourceTree, Span};

const ERROR_SNIPPET_CHARS: usize = 20;

/// The grammar the shipped binding parses with.
pub fn language() -> Language {
    tree_sitter_javascript::LANGUAGE.into()
}

/// Parses source text into an arena tree.
///
/// A grammar-level error anywhere in the tree fails the whole parse; the
/// engine never walks a partially recovered tree.
pub fn parse(source: &str) -> Result<SourceTree, ParseError> {
    let lang = language();
    let mut parser = Parser::new();
    parser
        .set_language(&lang)
        .map_err(|err| ParseError::Parser(err.to_string()))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ParseError::Parser("parser produced no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        let (offset, snippet) = first_error(root, source);
        return Err(ParseError::Syntax { offset, snippet });
    }

    let mut nodes = Vec::new();
    let root_id = build(root, None, None, &mut nodes);
    Ok(SourceTree::new(Arc::from(source), nodes, root_id))
}

/// Copies one tree-sitter node into the arena and recurses into the
/// children worth keeping: named nodes, plus anonymous tokens that occupy
/// a grammar field (operators and similar), which attribute predicates
/// need to see. Anonymous tokens are leaves, so skipping the rest loses
/// no structure.
fn build(
    node: Node<'_>,
    field: Option<&'static str>,
    parent: Option<NodeId>,
    nodes: &mut Vec<NodeData>,
) -> NodeId {
    let id = NodeId(nodes.len() as u32);
    nodes.push(NodeData {
        kind: node.kind(),
        kind_id: node.kind_id(),
        named: node.is_named(),
        span: Span::new(node.start_byte(), node.end_byte()),
        field,
        parent,
        children: Vec::new(),
    });

    let mut cursor = node.walk();
    let kept: Vec<(Node<'_>, Option<&'static str>)> = node
        .children(&mut cursor)
        .enumerate()
        .filter_map(|(i, child)| {
            let child_field = node.field_name_for_child(i as u32);
            if child.is_named() || child_field.is_some() {
                Some((child, child_field))
            } else {
                None
            }
        })
        .collect();
    drop(cursor);

    let mut child_ids = Vec::with_capacity(kept.len());
    for (child, child_field) in kept {
        child_ids.push(build(child, child_field, Some(id), nodes));
    }
    nodes[id.index()].children = child_ids;
    id
}

/// Locates the leftmost error or missing node for the diagnostic.
fn first_error(root: Node<'_>, source: &str) -> (usize, String) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let offset = node.start_byte();
            let snippet: String = source
                .get(offset..)
                .unwrap_or("")
                .chars()
                .take(ERROR_SNIPPET_CHARS)
                .collect();
            return (offset, snippet);
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        drop(cursor);
        for child in children.into_iter().rev() {
            if child.has_error() || child.is_missing() {
                stack.push(child);
            }
        }
    }
    (0, String::new())
}

use tree_sitter::Language;

use crate::error::SelectorError;
use crate::tree::NodeRef;

/// A compiled selector pattern.
///
/// Grammar, mirroring what rule authors write:
///
/// ```text
/// pattern     := alternative ("," alternative)*
/// alternative := kind attribute* [":exit"]
/// attribute   := "[" path ("=" value ("|" value)*)? "]"
/// path        := ident ("." ident)*
/// value       := ident | quoted string
/// ```
///
/// A bare `[path]` tests field existence. Attribute paths resolve through
/// grammar fields on the matched node's own subtree; there are no
/// descendant combinators.
#[derive(Debug, Clone)]
pub struct Selector {
    raw: String,
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone)]
pub(crate) struct Alternative {
    pub kind_id: u16,
    pub attributes: Vec<Attribute>,
    pub on_exit: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Attribute {
    pub path: Vec<String>,
    pub test: AttributeTest,
}

#[derive(Debug, Clone)]
pub(crate) enum AttributeTest {
    /// `[field]` — the field must be present.
    Exists,
    /// `[field=a|b]` — the field's source text must equal one of these.
    AnyOf(Vec<String>),
}

impl Selector {
    /// Compiles a pattern against a grammar. Kinds unknown to the grammar
    /// are rejected here, not silently never-matched.
    pub fn compile(pattern: &str, language: &Language) -> Result<Self, SelectorError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut alternatives = Vec::new();
        for part in split_top_level(trimmed) {
            alternatives.push(parse_alternative(part.trim(), language)?);
        }
        Ok(Self {
            raw: pattern.to_string(),
            alternatives,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub(crate) fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    pub fn has_exit(&self) -> bool {
        self.alternatives.iter().any(|alt| alt.on_exit)
    }
}

impl Alternative {
    /// Attribute count; bare-kind alternatives are least specific.
    pub fn specificity(&self) -> usize {
        self.attributes.len()
    }

    pub fn matches(&self, node: NodeRef<'_>) -> bool {
        if node.kind_id() != self.kind_id {
            return false;
        }
        self.attributes.iter().all(|attr| attr.holds(node))
    }
}

impl Attribute {
    fn holds(&self, node: NodeRef<'_>) -> bool {
        let mut current = node;
        for segment in &self.path {
            match current.field(segment) {
                Some(child) => current = child,
                None => return false,
            }
        }
        match &self.test {
            AttributeTest::Exists => true,
            AttributeTest::AnyOf(values) => {
                let text = current.text();
                values.iter().any(|v| v == text)
            }
        }
    }
}

/// Splits on commas that sit outside brackets and quotes.
fn split_top_level(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in pattern.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&pattern[start..]);
    parts
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn parse_alternative(text: &str, language: &Language) -> Result<Alternative, SelectorError> {
    if text.is_empty() {
        return Err(SelectorError::Empty);
    }

    let kind_end = text
        .char_indices()
        .find(|&(_, ch)| !is_ident_char(ch))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    if kind_end == 0 {
        return Err(SelectorError::Syntax(text.to_string()));
    }
    let kind = &text[..kind_end];

    let kind_id = language.id_for_node_kind(kind, true);
    if kind_id == 0 {
        return Err(SelectorError::UnknownKind(kind.to_string()));
    }

    let mut attributes = Vec::new();
    let mut on_exit = false;
    let mut rest = &text[kind_end..];
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix(':') {
            if let Some(tail) = after.strip_prefix("exit") {
                on_exit = true;
                rest = tail;
                continue;
            }
            return Err(SelectorError::Syntax(rest.to_string()));
        }
        if rest.starts_with('[') {
            let close = find_closing_bracket(rest)
                .ok_or_else(|| SelectorError::BadAttribute(rest.to_string()))?;
            attributes.push(parse_attribute(&rest[1..close])?);
            rest = &rest[close + 1..];
            continue;
        }
        return Err(SelectorError::Syntax(rest.to_string()));
    }

    Ok(Alternative {
        kind_id,
        attributes,
        on_exit,
    })
}

/// Index of the `]` matching the `[` at byte 0, skipping quoted content.
fn find_closing_bracket(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in text.char_indices().skip(1) {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_attribute(content: &str) -> Result<Attribute, SelectorError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(SelectorError::BadAttribute(content.to_string()));
    }

    let (path_text, test) = match find_unquoted(content, '=') {
        Some(eq) => {
            let values = parse_values(&content[eq + 1..])?;
            (&content[..eq], AttributeTest::AnyOf(values))
        }
        None => (content, AttributeTest::Exists),
    };

    let path: Vec<String> = path_text
        .trim()
        .split('.')
        .map(str::to_string)
        .collect();
    if path.iter().any(|seg| seg.is_empty() || !seg.chars().all(is_ident_char)) {
        return Err(SelectorError::BadAttribute(content.to_string()));
    }

    Ok(Attribute { path, test })
}

fn find_unquoted(text: &str, target: char) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, c) if c == target => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_values(text: &str) -> Result<Vec<String>, SelectorError> {
    let mut values = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let bytes: Vec<(usize, char)> = text.char_indices().collect();
    for &(i, ch) in &bytes {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '|') => {
                values.push(unquote(&text[start..i])?);
                start = i + 1;
            }
            _ => {}
        }
    }
    values.push(unquote(&text[start..])?);
    Ok(values)
}

fn unquote(raw: &str) -> Result<String, SelectorError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SelectorError::BadAttribute(raw.to_string()));
    }
    let stripped = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(raw);
    if stripped.is_empty() {
        return Err(SelectorError::BadAttribute(raw.to_string()));
    }
    Ok(stripped.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{language, parse};

    fn compile(pattern: &str) -> Selector {
        Selector::compile(pattern, &language()).unwrap()
    }

    // ==================== Compilation ====================

    #[test]
    fn bare_kind_compiles() {
        let sel = compile("if_statement");
        assert_eq!(sel.alternatives().len(), 1);
        assert_eq!(sel.alternatives()[0].specificity(), 0);
        assert!(!sel.has_exit());
    }

    #[test]
    fn exit_suffix_is_recognized() {
        let sel = compile("program:exit");
        assert!(sel.has_exit());
        assert!(sel.alternatives()[0].on_exit);
    }

    #[test]
    fn comma_alternation_splits() {
        let sel = compile("while_statement, do_statement, for_statement");
        assert_eq!(sel.alternatives().len(), 3);
    }

    #[test]
    fn membership_values_parse() {
        let sel = compile(r#"binary_expression[operator="=="|"!="]"#);
        let alt = &sel.alternatives()[0];
        assert_eq!(alt.specificity(), 1);
        let AttributeTest::AnyOf(values) = &alt.attributes[0].test else {
            panic!("expected value test");
        };
        assert_eq!(values, &["==", "!="]);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = Selector::compile("frob_statement", &language()).unwrap_err();
        assert!(matches!(err, SelectorError::UnknownKind(k) if k == "frob_statement"));
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(matches!(
            Selector::compile("   ", &language()),
            Err(SelectorError::Empty)
        ));
    }

    #[test]
    fn garbage_suffix_is_rejected() {
        assert!(matches!(
            Selector::compile("program > identifier", &language()),
            Err(SelectorError::Syntax(_))
        ));
    }

    #[test]
    fn unclosed_attribute_is_rejected() {
        assert!(matches!(
            Selector::compile("binary_expression[operator", &language()),
            Err(SelectorError::BadAttribute(_))
        ));
    }

    #[test]
    fn empty_attribute_value_is_rejected() {
        assert!(matches!(
            Selector::compile("binary_expression[operator=]", &language()),
            Err(SelectorError::BadAttribute(_))
        ));
    }

    // ==================== Matching ====================

    fn first_match<'t>(
        tree: &'t crate::tree::SourceTree,
        sel: &Selector,
    ) -> Option<crate::tree::NodeRef<'t>> {
        let mut stack = vec![tree.root()];
        while let Some(node) = stack.pop() {
            if sel.alternatives().iter().any(|alt| alt.matches(node)) {
                return Some(node);
            }
            let children: Vec<_> = node.named_children().collect();
            for child in children.into_iter().rev() {
                stack.push(child);
            }
        }
        None
    }

    #[test]
    fn kind_match_hits_the_right_node() {
        let tree = parse("while (a) { b(); }").unwrap();
        let sel = compile("while_statement");
        assert!(first_match(&tree, &sel).is_some());
        let miss = compile("do_statement");
        assert!(first_match(&tree, &miss).is_none());
    }

    #[test]
    fn operator_value_match() {
        let tree = parse("a == b;").unwrap();
        let loose = compile(r#"binary_expression[operator="=="|"!="]"#);
        assert!(first_match(&tree, &loose).is_some());
        let strict = compile(r#"binary_expression[operator="==="]"#);
        assert!(first_match(&tree, &strict).is_none());
    }

    #[test]
    fn existence_attribute() {
        let with_else = parse("if (a) { b(); } else { c(); }").unwrap();
        let without_else = parse("if (a) { b(); }").unwrap();
        let sel = compile("if_statement[alternative]");
        assert!(first_match(&with_else, &sel).is_some());
        assert!(first_match(&without_else, &sel).is_none());
    }

    #[test]
    fn optional_grammar_field_absence() {
        let tree = parse("for (;;) { a(); }").unwrap();
        let sel = compile("for_statement[body]");
        assert!(first_match(&tree, &sel).is_some());
        let incr = compile("for_statement[increment]");
        assert!(first_match(&tree, &incr).is_none());
    }

    #[test]
    fn dotted_path_resolves_through_fields() {
        let tree = parse("console.log(x);").unwrap();
        let sel = compile(r#"call_expression[function.property="log"]"#);
        assert!(first_match(&tree, &sel).is_some());
        let miss = compile(r#"call_expression[function.property="warn"]"#);
        assert!(first_match(&tree, &miss).is_none());
    }

    #[test]
    fn bare_value_without_quotes_parses() {
        let sel = compile("binary_expression[operator===]");
        let AttributeTest::AnyOf(values) = &sel.alternatives()[0].attributes[0].test else {
            panic!("expected value test");
        };
        assert_eq!(values, &["=="]);
    }
}

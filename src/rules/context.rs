use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use tracing::warn;

use crate::diagnostics::{Fix, Problem, Severity, Suggestion};
use crate::error::FixError;
use crate::tree::Span;

/// What a rule hands to [`RuleContext::report`].
#[derive(Debug)]
pub struct ReportDescriptor {
    pub span: Span,
    pub message: String,
    /// Edits making up one logical fix. Merged into a single replacement
    /// before it reaches the fix engine.
    pub fix: Option<Vec<Fix>>,
    pub suggestions: Vec<Suggestion>,
}

impl ReportDescriptor {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            fix: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_fix(mut self, edits: Vec<Fix>) -> Self {
        self.fix = Some(edits);
        self
    }

    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggestions.push(suggestion);
        self
    }
}

struct ContextInner {
    rule_id: String,
    fixable: bool,
    source: Arc<str>,
    options: serde_json::Value,
    severity: Severity,
    sink: Rc<RefCell<Vec<Problem>>>,
}

/// Per-rule, per-pass reporting handle. Cheap to clone into listener
/// closures.
#[derive(Clone)]
pub struct RuleContext {
    inner: Rc<ContextInner>,
}

impl RuleContext {
    pub(crate) fn new(
        rule_id: String,
        fixable: bool,
        source: Arc<str>,
        options: serde_json::Value,
        severity: Severity,
        sink: Rc<RefCell<Vec<Problem>>>,
    ) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                rule_id,
                fixable,
                source,
                options,
                severity,
                sink,
            }),
        }
    }

    pub fn rule_id(&self) -> &str {
        &self.inner.rule_id
    }

    pub fn source(&self) -> &str {
        &self.inner.source
    }

    pub fn options(&self) -> &serde_json::Value {
        &self.inner.options
    }

    /// Records one problem. The rule id and severity are stamped here, so
    /// rules cannot report on each other's behalf. A fix that fails
    /// validation is dropped with a warning; the diagnostic survives.
    pub fn report(&self, descriptor: ReportDescriptor) {
        let fix = match descriptor.fix {
            Some(edits) if !self.inner.fixable => {
                warn!(
                    rule = %self.inner.rule_id,
                    edits = edits.len(),
                    "rule is not declared fixable; dropping fix"
                );
                None
            }
            Some(edits) => match merge_edits(edits, &self.inner.source) {
                Ok(fix) => Some(fix),
                Err(err) => {
                    warn!(rule = %self.inner.rule_id, error = %err, "invalid fix dropped");
                    None
                }
            },
            None => None,
        };

        self.inner.sink.borrow_mut().push(Problem {
            rule_id: self.inner.rule_id.clone(),
            message: descriptor.message,
            severity: self.inner.severity,
            span: descriptor.span,
            fix,
            suggestions: descriptor.suggestions,
            fatal: false,
        });
    }
}

/// Collapses a multi-edit fix into one replacement spanning from the
/// first edit's start to the last edit's end, keeping the untouched text
/// between edits. Overlapping or out-of-bounds edits reject the fix.
fn merge_edits(mut edits: Vec<Fix>, source: &str) -> Result<Fix, FixError> {
    if edits.is_empty() {
        return Err(FixError::Empty);
    }
    for edit in &edits {
        if edit.span.end < edit.span.start || edit.span.end > source.len() {
            return Err(FixError::OutOfBounds {
                span: edit.span,
                len: source.len(),
            });
        }
    }
    edits.sort_by_key(|edit| (edit.span.start, edit.span.end));
    for pair in edits.windows(2) {
        if pair[0].span.end > pair[1].span.start {
            return Err(FixError::OverlappingEdits(pair[0].span, pair[1].span));
        }
    }

    let start = edits[0].span.start;
    let end = edits[edits.len() - 1].span.end;
    let mut text = String::new();
    let mut cursor = start;
    for edit in &edits {
        text.push_str(&source[cursor..edit.span.start]);
        text.push_str(&edit.text);
        cursor = edit.span.end;
    }
    Ok(Fix {
        span: Span::new(start, end),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(fixable: bool) -> (RuleContext, Rc<RefCell<Vec<Problem>>>) {
        let sink = Rc::new(RefCell::new(Vec::new()));
        let ctx = RuleContext::new(
            "test-rule".to_string(),
            fixable,
            Arc::from("let value = a == b;"),
            serde_json::Value::Null,
            Severity::Warning,
            Rc::clone(&sink),
        );
        (ctx, sink)
    }

    // ==================== report ====================

    #[test]
    fn report_stamps_rule_id_and_severity() {
        let (ctx, sink) = context(false);
        ctx.report(ReportDescriptor::new(Span::new(0, 3), "don't"));

        let problems = sink.borrow();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].rule_id, "test-rule");
        assert_eq!(problems[0].severity, Severity::Warning);
        assert!(!problems[0].fatal);
    }

    #[test]
    fn fix_from_unfixable_rule_is_dropped() {
        let (ctx, sink) = context(false);
        ctx.report(
            ReportDescriptor::new(Span::new(14, 16), "use ===")
                .with_fix(vec![Fix::replace(Span::new(14, 16), "===")]),
        );

        let problems = sink.borrow();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].fix.is_none());
    }

    #[test]
    fn valid_fix_is_kept() {
        let (ctx, sink) = context(true);
        ctx.report(
            ReportDescriptor::new(Span::new(14, 16), "use ===")
                .with_fix(vec![Fix::replace(Span::new(14, 16), "===")]),
        );

        let problems = sink.borrow();
        assert_eq!(
            problems[0].fix,
            Some(Fix::replace(Span::new(14, 16), "==="))
        );
    }

    #[test]
    fn overlapping_edits_drop_the_fix_but_keep_the_diagnostic() {
        let (ctx, sink) = context(true);
        ctx.report(ReportDescriptor::new(Span::new(0, 5), "bad").with_fix(vec![
            Fix::replace(Span::new(0, 4), "aa"),
            Fix::replace(Span::new(2, 6), "bb"),
        ]));

        let problems = sink.borrow();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].fix.is_none());
    }

    #[test]
    fn out_of_bounds_edit_drops_the_fix() {
        let (ctx, sink) = context(true);
        ctx.report(
            ReportDescriptor::new(Span::new(0, 5), "bad")
                .with_fix(vec![Fix::replace(Span::new(0, 10_000), "x")]),
        );
        assert!(sink.borrow()[0].fix.is_none());
    }

    // ==================== merge_edits ====================

    #[test]
    fn empty_edit_list_is_rejected() {
        assert!(matches!(
            merge_edits(vec![], "0123456789"),
            Err(FixError::Empty)
        ));
    }

    #[test]
    fn single_edit_passes_through() {
        let fix = merge_edits(vec![Fix::replace(Span::new(2, 4), "yy")], "0123456789").unwrap();
        assert_eq!(fix.span, Span::new(2, 4));
        assert_eq!(fix.text, "yy");
    }

    #[test]
    fn disjoint_edits_merge_and_keep_the_gap() {
        let fix = merge_edits(
            vec![
                Fix::replace(Span::new(6, 8), "YY"),
                Fix::replace(Span::new(0, 2), "XX"),
            ],
            "0123456789",
        )
        .unwrap();
        assert_eq!(fix.span, Span::new(0, 8));
        assert_eq!(fix.text, "XX2345YY");
    }

    #[test]
    fn touching_edits_do_not_overlap() {
        let fix = merge_edits(
            vec![
                Fix::replace(Span::new(0, 2), "a"),
                Fix::replace(Span::new(2, 4), "b"),
            ],
            "0123456789",
        )
        .unwrap();
        assert_eq!(fix.span, Span::new(0, 4));
        assert_eq!(fix.text, "ab");
    }
}

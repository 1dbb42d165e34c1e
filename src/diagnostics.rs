use serde::{Deserialize, Serialize};

use crate::tree::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A single text edit: replace the bytes in `span` with `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    pub span: Span,
    pub text: String,
}

impl Fix {
    pub fn replace(span: Span, text: impl Into<String>) -> Self {
        Self {
            span,
            text: text.into(),
        }
    }

    pub fn insert_before(offset: usize, text: impl Into<String>) -> Self {
        Self {
            span: Span::new(offset, offset),
            text: text.into(),
        }
    }

    pub fn remove(span: Span) -> Self {
        Self {
            span,
            text: String::new(),
        }
    }
}

/// An alternative repair surfaced to interactive callers. Never applied by
/// the convergence loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub description: String,
    pub fix: Fix,
}

/// One finding from one rule, pinned to the text of the pass that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub rule_id: String,
    pub message: String,
    pub severity: Severity,
    pub span: Span,
    pub fix: Option<Fix>,
    pub suggestions: Vec<Suggestion>,
    /// Fatal problems come from the engine (parse fault, rule fault),
    /// not from a rule's report, and are never fixable.
    pub fatal: bool,
}

impl Problem {
    pub fn fatal(rule_id: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
            severity: Severity::Error,
            span,
            fix: None,
            suggestions: Vec::new(),
            fatal: true,
        }
    }
}

/// Caller-facing view of a [`Problem`] with line/column positions
/// resolved. Lines and columns are 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Empty for engine-level fatal problems (parse failures).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rule_id: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fatal: bool,
    pub span: Span,
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<Fix>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
}

impl Diagnostic {
    pub fn from_problem(problem: Problem, index: &LineIndex) -> Self {
        let (start_line, start_col) = index.position(problem.span.start);
        let (end_line, end_col) = index.position(problem.span.end);
        Self {
            rule_id: problem.rule_id,
            message: problem.message,
            severity: problem.severity,
            fatal: problem.fatal,
            span: problem.span,
            start_line,
            start_col,
            end_line,
            end_col,
            fix: problem.fix,
            suggestions: problem.suggestions,
        }
    }
}

/// Byte-offset to line/column mapping for one text snapshot.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// 0-based (line, column) of a byte offset. Offsets past the end clamp
    /// to the last line.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        (line, offset - self.line_starts[line])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== LineIndex ====================

    #[test]
    fn position_on_single_line() {
        let index = LineIndex::new("let x = 1;");
        assert_eq!(index.position(0), (0, 0));
        assert_eq!(index.position(4), (0, 4));
    }

    #[test]
    fn position_across_lines() {
        let index = LineIndex::new("a;\nbb;\nccc;");
        assert_eq!(index.position(0), (0, 0));
        assert_eq!(index.position(3), (1, 0));
        assert_eq!(index.position(5), (1, 2));
        assert_eq!(index.position(7), (2, 0));
    }

    #[test]
    fn position_at_newline_belongs_to_its_line() {
        let index = LineIndex::new("ab\ncd");
        assert_eq!(index.position(2), (0, 2));
    }

    #[test]
    fn position_past_end_clamps() {
        let index = LineIndex::new("ab\ncd");
        assert_eq!(index.position(100), (1, 97));
    }

    // ==================== Serialization ====================

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"warning\"");
        assert_eq!(serde_json::to_string(&Severity::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn diagnostic_omits_empty_optionals() {
        let problem = Problem {
            rule_id: "no-frob".to_string(),
            message: "frob".to_string(),
            severity: Severity::Warning,
            span: Span::new(0, 4),
            fix: None,
            suggestions: Vec::new(),
            fatal: false,
        };
        let diag = Diagnostic::from_problem(problem, &LineIndex::new("frob"));
        let json = serde_json::to_value(&diag).unwrap();
        assert!(json.get("fix").is_none());
        assert!(json.get("suggestions").is_none());
        assert!(json.get("fatal").is_none());
    }

    #[test]
    fn diagnostic_carries_fix_when_present() {
        let problem = Problem {
            rule_id: "eq".to_string(),
            message: "use ===".to_string(),
            severity: Severity::Warning,
            span: Span::new(2, 4),
            fix: Some(Fix::replace(Span::new(2, 4), "===")),
            suggestions: Vec::new(),
            fatal: false,
        };
        let diag = Diagnostic::from_problem(problem, &LineIndex::new("a == b"));
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["fix"]["text"], "===");
    }

    // ==================== Fix constructors ====================

    #[test]
    fn fix_helpers_build_expected_edits() {
        let ins = Fix::insert_before(3, "x");
        assert_eq!(ins.span, Span::new(3, 3));
        let rem = Fix::remove(Span::new(1, 4));
        assert!(rem.text.is_empty());
    }
}

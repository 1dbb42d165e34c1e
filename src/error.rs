use thiserror::Error;

use crate::tree::Span;

/// Top-level error type exposed by the engine.
///
/// Most failures never reach this level: parse faults and rule-runtime
/// faults are converted into fatal diagnostics on the per-file report so
/// that a batch run over many files keeps going.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("parsing error: {0}")]
    Parse(#[from] ParseError),

    #[error("invalid selector `{pattern}`: {source}")]
    Selector {
        pattern: String,
        #[source]
        source: SelectorError,
    },

    #[error("rule {rule_id} failed at bytes {}..{}: {source}", span.start, span.end)]
    RuleRuntime {
        rule_id: String,
        span: Span,
        #[source]
        source: anyhow::Error,
    },

    /// "Catch-all" for unexpected internal failures.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Errors producing a syntax tree from source text.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("syntax error at byte {offset}: unexpected or missing token near `{snippet}`")]
    Syntax { offset: usize, snippet: String },

    #[error("parser failure: {0}")]
    Parser(String),
}

/// Errors compiling a rule-authored selector pattern.
///
/// A bad selector drops that one registration; the rule's other listeners
/// keep running.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unknown node kind `{0}`")]
    UnknownKind(String),

    #[error("malformed attribute predicate `{0}`")]
    BadAttribute(String),

    #[error("unexpected input `{0}`")]
    Syntax(String),
}

/// Errors validating a reported fix.
///
/// An invalid fix is dropped and the report survives as a plain diagnostic.
#[derive(Debug, Error)]
pub enum FixError {
    #[error("fix has no edits")]
    Empty,

    #[error("fix contains overlapping edits ({},{}) and ({},{})", .0.start, .0.end, .1.start, .1.end)]
    OverlappingEdits(Span, Span),

    #[error("fix edit ({},{}) is outside the source text (len {len})", span.start, span.end)]
    OutOfBounds { span: Span, len: usize },
}

/// A listener returned an error mid-traversal.
///
/// This aborts the remainder of the pass for the current file and is
/// surfaced as one fatal diagnostic naming the offending rule.
#[derive(Debug)]
pub struct RuleFault {
    pub rule_id: String,
    pub span: Span,
    pub source: anyhow::Error,
}

impl From<RuleFault> for EngineError {
    fn from(fault: RuleFault) -> Self {
        EngineError::RuleRuntime {
            rule_id: fault.rule_id,
            span: fault.span,
            source: fault.source,
        }
    }
}

//! relint: a pluggable static-analysis engine over tree-sitter syntax
//! trees.
//!
//! One deterministic traversal per pass drives three cooperating layers:
//! selector-routed node listeners, a code-path analyzer streaming
//! control-flow lifecycle events, and a fix engine that applies
//! non-overlapping repairs until the text converges.
//!
//! ```
//! use relint::Linter;
//!
//! let linter = Linter::with_builtin_rules();
//! let report = linter.lint_and_fix("const same = a == b;\n");
//! assert_eq!(report.final_text, "const same = a === b;\n");
//! ```

pub mod batch;
pub mod codepath;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fix;
pub mod linter;
pub mod parse;
pub mod rules;
pub mod selector;
pub mod traversal;
pub mod tree;

pub use batch::{fix_files, lint_files, FileFixReport, FileReport, SourceFile};
pub use config::LintConfig;
pub use diagnostics::{Diagnostic, Fix, Problem, Severity, Suggestion};
pub use error::{EngineError, FixError, ParseError, SelectorError};
pub use linter::{FixReport, Linter};
pub use rules::{ListenerMap, ReportDescriptor, Rule, RuleContext, RuleMeta, RuleRegistry};
pub use selector::Selector;
pub use tree::{NodeId, NodeRef, SourceTree, Span};

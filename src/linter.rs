use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use similar::TextDiff;
use tracing::{debug, warn};

use crate::config::LintConfig;
use crate::diagnostics::{Diagnostic, LineIndex, Problem};
use crate::fix::apply_fixes;
use crate::parse;
use crate::rules::{RuleContext, RuleRegistry};
use crate::selector::Selector;
use crate::traversal::{run_pass, EventDispatcher};
use crate::tree::Span;

/// How one lint pass over one text snapshot ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassStatus {
    Completed,
    /// A rule listener errored; the walk was aborted.
    Faulted,
    ParseFailed,
}

/// Result of [`Linter::lint_and_fix`].
#[derive(Debug)]
pub struct FixReport {
    pub original_text: String,
    pub final_text: String,
    /// Total fixes spliced across all passes.
    pub fixed_count: usize,
    /// Passes that changed the text.
    pub passes: usize,
    /// True when the pass cap was hit while fixes were still being
    /// produced; remaining fixable problems are reported unfixed.
    pub exhausted: bool,
    /// Diagnostics addressing `final_text`.
    pub diagnostics: Vec<Diagnostic>,
}

impl FixReport {
    pub fn changed(&self) -> bool {
        self.fixed_count > 0
    }

    /// Unified diff from the original to the fixed text.
    pub fn unified_diff(&self) -> String {
        TextDiff::from_lines(&self.original_text, &self.final_text)
            .unified_diff()
            .context_radius(3)
            .header("original", "fixed")
            .to_string()
    }
}

/// The engine front door: rules + config, applied to source text.
///
/// A linter is immutable and shareable; every `lint` call is an isolated
/// pure run over its input.
#[derive(Clone)]
pub struct Linter {
    registry: Arc<RuleRegistry>,
    config: LintConfig,
    language: tree_sitter::Language,
}

impl std::fmt::Debug for Linter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linter")
            .field("rules", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Linter {
    pub fn new(registry: RuleRegistry, config: LintConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
            language: parse::language(),
        }
    }

    pub fn with_builtin_rules() -> Self {
        Self::new(RuleRegistry::with_builtin_rules(), LintConfig::default())
    }

    pub fn config(&self) -> &LintConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Lints without applying fixes. Fix data stays attached to the
    /// diagnostics for callers that apply edits themselves.
    pub fn lint(&self, source: &str) -> Vec<Diagnostic> {
        let (problems, _status) = self.run_pass(source);
        finalize(problems, source)
    }

    /// Like [`Linter::lint`], but parse failures and rule faults come
    /// back as errors instead of fatal diagnostics.
    pub fn try_lint(&self, source: &str) -> Result<Vec<Diagnostic>, crate::error::EngineError> {
        let tree = parse::parse(source)?;
        let sink: Rc<RefCell<Vec<Problem>>> = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = self.build_dispatcher(&tree, &sink);
        run_pass(&tree, &mut dispatcher)?;
        Ok(finalize(sink.take(), source))
    }

    /// Lints and applies fixes until the text stops changing or the pass
    /// cap is hit, then reports against the final text.
    pub fn lint_and_fix(&self, source: &str) -> FixReport {
        let mut text = source.to_string();
        let mut fixed_count = 0usize;
        let mut passes = 0usize;
        let mut iterations = 0usize;
        let mut exhausted = false;

        loop {
            if iterations >= self.config.max_passes {
                exhausted = true;
                break;
            }
            iterations += 1;

            let (problems, status) = self.run_pass(&text);
            if status != PassStatus::Completed {
                // unusable pass: report as-is, never splice its fixes
                let diagnostics = finalize(problems, &text);
                return FixReport {
                    original_text: source.to_string(),
                    final_text: text,
                    fixed_count,
                    passes,
                    exhausted: false,
                    diagnostics,
                };
            }

            let pass = apply_fixes(&text, problems);
            if pass.applied == 0 {
                // nothing changed, so the deferred problems already
                // address the current text: this pass doubles as the
                // verification pass
                let diagnostics = finalize(pass.deferred, &text);
                return FixReport {
                    original_text: source.to_string(),
                    final_text: text,
                    fixed_count,
                    passes,
                    exhausted: false,
                    diagnostics,
                };
            }

            debug!(pass = iterations, applied = pass.applied, "fix pass applied");
            fixed_count += pass.applied;
            passes += 1;
            text = pass.output;
        }

        // pass cap hit: one more fix-free pass so spans address the text
        // we actually return
        let (problems, _status) = self.run_pass(&text);
        let diagnostics = finalize(problems, &text);
        FixReport {
            original_text: source.to_string(),
            final_text: text,
            fixed_count,
            passes,
            exhausted,
            diagnostics,
        }
    }

    /// One parse + one traversal, collecting problems from every rule.
    fn run_pass(&self, source: &str) -> (Vec<Problem>, PassStatus) {
        let tree = match parse::parse(source) {
            Ok(tree) => tree,
            Err(err) => {
                let span = match &err {
                    crate::error::ParseError::Syntax { offset, .. } => {
                        Span::new(*offset, *offset)
                    }
                    crate::error::ParseError::Parser(_) => Span::new(0, 0),
                };
                return (
                    vec![Problem::fatal("", format!("Parsing error: {err}"), span)],
                    PassStatus::ParseFailed,
                );
            }
        };

        let sink: Rc<RefCell<Vec<Problem>>> = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = self.build_dispatcher(&tree, &sink);

        let status = match run_pass(&tree, &mut dispatcher) {
            Ok(()) => PassStatus::Completed,
            Err(fault) => {
                warn!(rule = %fault.rule_id, error = %fault.source, "rule failed; pass aborted");
                sink.borrow_mut().push(Problem::fatal(
                    fault.rule_id.clone(),
                    format!("Rule '{}' failed: {:#}", fault.rule_id, fault.source),
                    fault.span,
                ));
                PassStatus::Faulted
            }
        };

        let problems = sink.take();
        (problems, status)
    }

    /// Fresh listeners for every rule, compiled and bucketed for one
    /// pass. A selector that fails to compile drops that registration
    /// alone; the rule's other listeners still run.
    fn build_dispatcher(
        &self,
        tree: &crate::tree::SourceTree,
        sink: &Rc<RefCell<Vec<Problem>>>,
    ) -> EventDispatcher {
        let mut dispatcher = EventDispatcher::new();
        for rule in self.registry.all() {
            let meta = rule.meta();
            let ctx = RuleContext::new(
                meta.id.to_string(),
                meta.fixable,
                tree.source_arc(),
                self.config.options_for(meta.id),
                self.config.severity_for(meta.id),
                Rc::clone(sink),
            );
            let listeners = rule.create(&ctx);
            for (pattern, callback) in listeners.nodes {
                match Selector::compile(&pattern, &self.language) {
                    Ok(selector) => dispatcher.add_node_listener(meta.id, selector, callback),
                    Err(err) => {
                        warn!(rule = meta.id, pattern = %pattern, error = %err,
                            "invalid selector; listener dropped");
                    }
                }
            }
            for (kind, callback) in listeners.paths {
                dispatcher.add_path_listener(meta.id, kind, callback);
            }
        }
        dispatcher
    }
}

/// Orders problems by position and resolves line/column positions.
fn finalize(mut problems: Vec<Problem>, text: &str) -> Vec<Diagnostic> {
    problems.sort_by_key(|problem| (problem.span.start, problem.span.end));
    let index = LineIndex::new(text);
    problems
        .into_iter()
        .map(|problem| Diagnostic::from_problem(problem, &index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    fn linter() -> Linter {
        Linter::with_builtin_rules()
    }

    // ==================== lint ====================

    #[test]
    fn clean_source_yields_no_diagnostics() {
        assert!(linter().lint("const x = 1;\n").is_empty());
    }

    #[test]
    fn diagnostics_are_ordered_by_position() {
        let diags = linter().lint("const a = x == y;\nconst b = p != q;\n");
        assert_eq!(diags.len(), 2);
        assert!(diags[0].span.start < diags[1].span.start);
        assert_eq!(diags[0].start_line, 0);
        assert_eq!(diags[1].start_line, 1);
    }

    #[test]
    fn parse_failure_is_one_fatal_diagnostic() {
        let diags = linter().lint("function (");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].fatal);
        assert_eq!(diags[0].severity, Severity::Error);
        assert!(diags[0].rule_id.is_empty());
        assert!(diags[0].message.starts_with("Parsing error"));
    }

    #[test]
    fn severity_override_reaches_diagnostics() {
        let mut config = LintConfig::default();
        config
            .severities
            .insert("prefer-strict-equality".to_string(), Severity::Error);
        let linter = Linter::new(RuleRegistry::with_builtin_rules(), config);
        let diags = linter.lint("const a = x == y;");
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn lint_is_deterministic() {
        let source = "const a = x == y; // TODO tidy\nconst v = p ? q : r ? s : t;\n";
        let first = linter().lint(source);
        let second = linter().lint(source);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    // ==================== lint_and_fix ====================

    #[test]
    fn fixing_clean_source_changes_nothing() {
        let report = linter().lint_and_fix("const x = 1;\n");
        assert_eq!(report.final_text, "const x = 1;\n");
        assert!(!report.changed());
        assert_eq!(report.passes, 0);
        assert!(!report.exhausted);
    }

    #[test]
    fn fixed_output_relints_clean() {
        let report = linter().lint_and_fix("const eq = a == b;\n");
        assert_eq!(report.final_text, "const eq = a === b;\n");
        assert!(report.diagnostics.is_empty());
        assert!(!report.exhausted);
    }

    #[test]
    fn unfixable_problems_survive_fixing() {
        let report = linter().lint_and_fix("const v = a ? b : c ? d : e;\n");
        assert_eq!(report.fixed_count, 0);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].rule_id, "no-nested-ternary");
    }

    #[test]
    fn parse_failure_stops_fixing_immediately() {
        let report = linter().lint_and_fix("function (");
        assert_eq!(report.final_text, "function (");
        assert_eq!(report.fixed_count, 0);
        assert!(report.diagnostics[0].fatal);
    }

    #[test]
    fn unified_diff_names_both_sides() {
        let report = linter().lint_and_fix("const eq = a == b;\n");
        let diff = report.unified_diff();
        assert!(diff.contains("-const eq = a == b;"));
        assert!(diff.contains("+const eq = a === b;"));
    }

    #[test]
    fn try_lint_surfaces_parse_errors() {
        let err = linter().try_lint("function (").unwrap_err();
        assert!(matches!(err, crate::error::EngineError::Parse(_)));
    }

    #[test]
    fn try_lint_matches_lint_on_clean_input() {
        let diags = linter().try_lint("const a = x == y;").unwrap();
        assert_eq!(diags, linter().lint("const a = x == y;"));
    }

    #[test]
    fn fix_report_spans_address_the_final_text() {
        // the == fix shifts following offsets; the todo diagnostic must
        // land on the fixed text
        let source = "const eq = a == b; // todo shift me\n";
        let report = linter().lint_and_fix(source);
        let diag = report
            .diagnostics
            .iter()
            .find(|d| d.rule_id == "no-warning-comments")
            .unwrap();
        let reported = &report.final_text[diag.span.start..diag.span.end];
        assert!(reported.starts_with("// todo"));
    }
}

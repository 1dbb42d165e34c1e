use crate::diagnostics::Fix;
use crate::rules::{ListenerMap, ReportDescriptor, Rule, RuleContext, RuleMeta};

static META: RuleMeta = RuleMeta {
    id: "prefer-strict-equality",
    description: "Require === and !== instead of == and !=",
    fixable: true,
    has_suggestions: false,
};

/// Rewrites loose equality to strict equality. Comparisons against `null`
/// are left alone: `x == null` deliberately matches both null and
/// undefined, and the strict form changes behavior.
#[derive(Debug, Default)]
pub struct PreferStrictEquality;

impl Rule for PreferStrictEquality {
    fn meta(&self) -> &RuleMeta {
        &META
    }

    fn create(&self, ctx: &RuleContext) -> ListenerMap {
        let ctx = ctx.clone();
        ListenerMap::new().on(r#"binary_expression[operator="=="|"!="]"#, move |node| {
            let compares_null = [node.field("left"), node.field("right")]
                .into_iter()
                .flatten()
                .any(|operand| operand.kind() == "null");
            if compares_null {
                return Ok(());
            }

            let Some(operator) = node.field("operator") else {
                return Ok(());
            };
            let strict = match operator.text() {
                "==" => "===",
                _ => "!==",
            };
            ctx.report(
                ReportDescriptor::new(
                    operator.span(),
                    format!(
                        "Expected '{strict}' and instead saw '{}'.",
                        operator.text()
                    ),
                )
                .with_fix(vec![Fix::replace(operator.span(), strict)]),
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LintConfig;
    use crate::diagnostics::Diagnostic;
    use crate::linter::Linter;
    use crate::rules::RuleRegistry;
    use std::sync::Arc;

    fn linter() -> Linter {
        let mut registry = RuleRegistry::new();
        registry.register(Arc::new(PreferStrictEquality));
        Linter::new(registry, LintConfig::default())
    }

    fn lint(source: &str) -> Vec<Diagnostic> {
        linter().lint(source)
    }

    // ==================== reporting ====================

    #[test]
    fn loose_equality_is_flagged_with_a_fix() {
        let diags = lint("if (a == b) { c(); }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].rule_id, "prefer-strict-equality");
        let fix = diags[0].fix.as_ref().unwrap();
        assert_eq!(fix.text, "===");
    }

    #[test]
    fn loose_inequality_becomes_strict() {
        let diags = lint("const d = a != b;");
        assert_eq!(diags[0].fix.as_ref().unwrap().text, "!==");
    }

    #[test]
    fn strict_comparisons_are_fine() {
        assert!(lint("if (a === b || c !== d) { e(); }").is_empty());
    }

    #[test]
    fn null_comparisons_are_exempt() {
        assert!(lint("if (a == null) { b(); }").is_empty());
        assert!(lint("if (null != a) { b(); }").is_empty());
    }

    // ==================== fixing ====================

    #[test]
    fn fix_rewrites_the_operator_only() {
        let report = linter().lint_and_fix("if (a == b) { c(); }");
        assert_eq!(report.final_text, "if (a === b) { c(); }");
        assert_eq!(report.fixed_count, 1);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn multiple_occurrences_fix_in_one_pass() {
        let report = linter().lint_and_fix("const x = a == b; const y = c != d;");
        assert_eq!(report.final_text, "const x = a === b; const y = c !== d;");
        assert_eq!(report.fixed_count, 2);
        assert_eq!(report.passes, 1);
    }
}

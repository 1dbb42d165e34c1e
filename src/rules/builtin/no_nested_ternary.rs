use crate::rules::{ListenerMap, ReportDescriptor, Rule, RuleContext, RuleMeta};

static META: RuleMeta = RuleMeta {
    id: "no-nested-ternary",
    description: "Disallow nested ternary expressions",
    fixable: false,
    has_suggestions: false,
};

/// Flags ternaries nested inside another ternary's branches or test.
#[derive(Debug, Default)]
pub struct NoNestedTernary;

impl Rule for NoNestedTernary {
    fn meta(&self) -> &RuleMeta {
        &META
    }

    fn create(&self, ctx: &RuleContext) -> ListenerMap {
        let ctx = ctx.clone();
        ListenerMap::new().on("ternary_expression", move |node| {
            let nested = node
                .ancestors()
                .any(|ancestor| ancestor.kind() == "ternary_expression");
            if nested {
                ctx.report(ReportDescriptor::new(
                    node.span(),
                    "Do not nest ternary expressions.",
                ));
            }
            Ok(())
        })
    }
}

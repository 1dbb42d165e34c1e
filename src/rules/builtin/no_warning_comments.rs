use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use tracing::warn;

use crate::rules::{ListenerMap, ReportDescriptor, Rule, RuleContext, RuleMeta};

static META: RuleMeta = RuleMeta {
    id: "no-warning-comments",
    description: "Disallow specified warning terms in comments",
    fixable: false,
    has_suggestions: false,
};

/// Longest comment excerpt quoted in a report.
const CHAR_LIMIT: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Location {
    Start,
    Anywhere,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Options {
    terms: Vec<String>,
    location: Location,
    decoration: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            terms: vec!["todo".to_string(), "fixme".to_string(), "xxx".to_string()],
            location: Location::Start,
            decoration: Vec::new(),
        }
    }
}

/// A term matches as a whole word; a term that starts or ends with a
/// non-word character drops the boundary on that side. With `start`
/// location, leading whitespace and decoration characters are skipped.
fn term_regex(term: &str, location: Location, decoration: &str) -> Option<Regex> {
    let escaped = regex::escape(term);
    let starts_with_word = term.chars().next().is_some_and(|c| c.is_alphanumeric());
    let ends_with_word = term.chars().last().is_some_and(|c| c.is_alphanumeric());

    let prefix = match location {
        Location::Start => format!(r"^[\s{}]*", regex::escape(decoration)),
        Location::Anywhere if starts_with_word => r"\b".to_string(),
        Location::Anywhere => String::new(),
    };
    let suffix = if ends_with_word { r"\b" } else { "" };

    match RegexBuilder::new(&format!("{prefix}{escaped}{suffix}"))
        .case_insensitive(true)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(err) => {
            warn!(term, error = %err, "skipping unmatchable warning term");
            None
        }
    }
}

/// Comment text without its `//` or `/* */` markers.
fn comment_body(text: &str) -> &str {
    if let Some(rest) = text.strip_prefix("//") {
        rest
    } else if let Some(rest) = text.strip_prefix("/*") {
        rest.strip_suffix("*/").unwrap_or(rest)
    } else {
        text
    }
}

/// Word-wise excerpt of the comment, truncated near [`CHAR_LIMIT`].
fn display_excerpt(body: &str) -> String {
    let mut excerpt = String::new();
    let mut truncated = false;
    for word in body.split_whitespace() {
        let candidate_len = if excerpt.is_empty() {
            word.len()
        } else {
            excerpt.len() + 1 + word.len()
        };
        if candidate_len <= CHAR_LIMIT {
            if !excerpt.is_empty() {
                excerpt.push(' ');
            }
            excerpt.push_str(word);
        } else {
            truncated = true;
            break;
        }
    }
    if truncated {
        excerpt.push_str("...");
    }
    excerpt
}

/// Reports comments containing configured warning terms (`todo`, `fixme`
/// and the like).
#[derive(Debug, Default)]
pub struct NoWarningComments;

impl Rule for NoWarningComments {
    fn meta(&self) -> &RuleMeta {
        &META
    }

    fn create(&self, ctx: &RuleContext) -> ListenerMap {
        let options: Options = if ctx.options().is_null() {
            Options::default()
        } else {
            serde_json::from_value(ctx.options().clone()).unwrap_or_else(|err| {
                warn!(rule = META.id, error = %err, "bad options; using defaults");
                Options::default()
            })
        };

        let decoration = options.decoration.concat();
        let matchers: Vec<(String, Regex)> = options
            .terms
            .iter()
            .filter_map(|term| {
                term_regex(term, options.location, &decoration)
                    .map(|regex| (term.clone(), regex))
            })
            .collect();

        let ctx = ctx.clone();
        ListenerMap::new().on("comment", move |node| {
            let body = comment_body(node.text());
            for (term, regex) in &matchers {
                if regex.is_match(body) {
                    ctx.report(ReportDescriptor::new(
                        node.span(),
                        format!(
                            "Unexpected '{term}' comment: '{}'.",
                            display_excerpt(body)
                        ),
                    ));
                }
            }
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

    fn lint_with(source: &str, options: Option<serde_json::Value>) -> Vec<Diagnostic> {
        let mut registry = RuleRegistry::new();
        registry.register(Arc::new(NoWarningComments));
        let mut config = LintConfig::default();
        if let Some(options) = options {
            config
                .rule_options
                .insert("no-warning-comments".to_string(), options);
        }
        Linter::new(registry, config).lint(source)
    }

    fn lint(source: &str) -> Vec<Diagnostic> {
        lint_with(source, None)
    }

    // ==================== default options ====================

    #[test]
    fn todo_at_comment_start_is_flagged() {
        let diags = lint("// TODO wire this up\nlet x = 1;");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("'todo'"));
    }

    #[test]
    fn term_mid_comment_is_ignored_with_start_location() {
        assert!(lint("// this is a todo for later\nlet x = 1;").is_empty());
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(lint("// fixme: leaks\nlet x = 1;").len(), 1);
        assert_eq!(lint("// FIXME: leaks\nlet x = 1;").len(), 1);
    }

    #[test]
    fn partial_words_do_not_match() {
        assert!(lint("// todos are tracked elsewhere\nlet x = 1;").is_empty());
    }

    #[test]
    fn block_comments_are_checked_too() {
        assert_eq!(lint("/* XXX revisit */\nlet x = 1;").len(), 1);
    }

    // ==================== configured options ====================

    #[test]
    fn anywhere_location_matches_mid_comment() {
        let diags = lint_with(
            "// there is a todo in here\nlet x = 1;",
            Some(serde_json::json!({ "location": "anywhere" })),
        );
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn custom_terms_replace_the_defaults() {
        let options = serde_json::json!({ "terms": ["hack"] });
        assert_eq!(
            lint_with("// HACK around the cache\nlet x = 1;", Some(options.clone())).len(),
            1
        );
        assert!(lint_with("// TODO later\nlet x = 1;", Some(options)).is_empty());
    }

    #[test]
    fn long_comments_are_truncated_in_the_message() {
        let source = format!("// todo {}\nlet x = 1;", "word ".repeat(20));
        let diags = lint(&source);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.ends_with("...'."));
    }

    // ==================== helpers ====================

    #[test]
    fn comment_body_strips_markers() {
        assert_eq!(comment_body("// hi"), " hi");
        assert_eq!(comment_body("/* hi */"), " hi ");
    }

    #[test]
    fn excerpt_respects_the_char_limit() {
        let excerpt = display_excerpt(" one two three");
        assert_eq!(excerpt, "one two three");
        let long = display_excerpt(&"word ".repeat(20));
        assert!(long.len() <= CHAR_LIMIT + 3);
        assert!(long.ends_with("..."));
    }
}

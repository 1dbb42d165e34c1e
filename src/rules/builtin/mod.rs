//! Rules shipped with the engine.

pub mod no_nested_ternary;
pub mod no_unreachable_loop;
pub mod no_warning_comments;
pub mod prefer_strict_equality;

use std::sync::Arc;

use super::Rule;

pub fn all() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(no_unreachable_loop::NoUnreachableLoop),
        Arc::new(no_nested_ternary::NoNestedTernary),
        Arc::new(no_warning_comments::NoWarningComments),
        Arc::new(prefer_strict_equality::PreferStrictEquality),
    ]
}

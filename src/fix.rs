use tracing::debug;

use crate::diagnostics::Problem;

/// Outcome of applying one round of fixes to one text snapshot.
#[derive(Debug)]
pub struct FixPass {
    pub output: String,
    /// Fixes spliced into `output`.
    pub applied: usize,
    /// Problems whose fixes were skipped (overlap, bad span) plus every
    /// problem that had no fix. Their spans address the input text, not
    /// `output`.
    pub deferred: Vec<Problem>,
}

/// Applies as many non-conflicting fixes as possible in one round.
///
/// Candidates are ordered by `(start, end)` ascending, so when two fixes
/// start together the shorter one wins. A fix is accepted when it begins
/// at or after the previously accepted fix's end; half-open ranges make
/// touching fixes compatible. Accepted replacements are spliced in a
/// single left-to-right rebuild, everything else is deferred.
pub fn apply_fixes(source: &str, problems: Vec<Problem>) -> FixPass {
    let mut fixable: Vec<Problem> = Vec::new();
    let mut deferred: Vec<Problem> = Vec::new();
    for problem in problems {
        if problem.fix.is_some() && !problem.fatal {
            fixable.push(problem);
        } else {
            deferred.push(problem);
        }
    }

    fixable.sort_by_key(|problem| {
        problem
            .fix
            .as_ref()
            .map(|fix| (fix.span.start, fix.span.end))
            .unwrap_or((usize::MAX, usize::MAX))
    });

    let mut accepted: Vec<Problem> = Vec::new();
    let mut last_end = 0usize;
    for problem in fixable {
        let Some(fix) = problem.fix.as_ref() else {
            deferred.push(problem);
            continue;
        };
        let span = fix.span;
        let valid = span.start <= span.end
            && span.end <= source.len()
            && source.is_char_boundary(span.start)
            && source.is_char_boundary(span.end);
        if !valid {
            debug!(start = span.start, end = span.end, "skipping fix with bad span");
            deferred.push(problem);
            continue;
        }
        if span.start < last_end {
            deferred.push(problem);
            continue;
        }
        last_end = span.end;
        accepted.push(problem);
    }

    if accepted.is_empty() {
        return FixPass {
            output: source.to_string(),
            applied: 0,
            deferred,
        };
    }

    let mut output = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for problem in &accepted {
        if let Some(fix) = &problem.fix {
            output.push_str(&source[cursor..fix.span.start]);
            output.push_str(&fix.text);
            cursor = fix.span.end;
        }
    }
    output.push_str(&source[cursor..]);

    FixPass {
        output,
        applied: accepted.len(),
        deferred,
    }
}

use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;
use crate::linter::{FixReport, Linter};

/// One input to a batch run. The driver never touches the filesystem;
/// callers load content however they like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
pub struct FileFixReport {
    pub path: PathBuf,
    pub report: FixReport,
}

/// Lints files in parallel. Each file is an isolated run; a parse
/// failure or rule fault in one file becomes that file's diagnostics and
/// never disturbs its neighbors. Output order follows input order.
pub fn lint_files(linter: &Linter, files: &[SourceFile]) -> Vec<FileReport> {
    files
        .par_iter()
        .map(|file| FileReport {
            path: file.path.clone(),
            diagnostics: linter.lint(&file.content),
        })
        .collect()
}

/// Parallel counterpart of [`Linter::lint_and_fix`].
pub fn fix_files(linter: &Linter, files: &[SourceFile]) -> Vec<FileFixReport> {
    files
        .par_iter()
        .map(|file| FileFixReport {
            path: file.path.clone(),
            report: linter.lint_and_fix(&file.content),
        })
        .collect()
}

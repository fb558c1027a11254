//! Per-file patches over a baseline source tree.
//!
//! A patch set is a directory of `<path>.patch` files in unified diff form.
//! Applying it reconstructs the working tree from the baseline; rebuilding it
//! captures the difference between the two. Files are independent of one
//! another, so both directions run across files in parallel.

pub mod apply;
pub mod format;
pub mod rebuild;
pub mod set;
pub mod tree;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use apply::{apply_hunks, FileApplication, MatchQuality, PatchMode, DEFAULT_MIN_SCORE};
pub use format::{ChangeKind, FilePatch, Hunk, HunkLine};
pub use rebuild::{
    diff_trees, rebuild_patches, RebuildRequest, RebuildSummary, DEFAULT_CONTEXT_LINES,
    DEFAULT_IGNORED_PREFIXES,
};
pub use set::{PatchSet, PATCH_SUFFIX};
pub use tree::SourceTree;

use crate::error::Error;
use crate::fs::ensure_clean;
use crate::jar::{self, Entries};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PatchOutcome {
    Applied {
        quality: MatchQuality,
    },
    Failed {
        applied_hunks: usize,
        failed_hunks: usize,
        #[serde(skip)]
        reject: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileReport {
    pub path: String,
    pub outcome: PatchOutcome,
}

impl FileReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, PatchOutcome::Failed { .. })
    }
}

/// The aggregate of one apply run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PatchRunSummary {
    pub changed_files: usize,
    pub failed_files: usize,
    pub files: Vec<FileReport>,
    pub rejects: PathBuf,
}

impl PatchRunSummary {
    pub fn is_success(&self) -> bool {
        self.failed_files == 0
    }

    /// Turn a run with failed files into a `PatchFailure` error.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(anyhow::Error::from(Error::PatchFailure {
            failed: self.failed_files,
            total: self.files.len(),
            rejects: self.rejects,
        }))
    }
}

/// In-memory result of applying a set to a tree.
#[derive(Clone, Debug)]
pub struct TreeApplication {
    pub tree: Entries,
    pub reports: Vec<FileReport>,
    /// Reject files keyed by `<path>.patch`.
    pub rejects: Entries,
}

struct FileResult {
    report: FileReport,
    /// `None` removes the file from the output tree.
    content: Option<Vec<u8>>,
}

fn apply_file(baseline: Option<&Vec<u8>>, patch: &FilePatch, mode: PatchMode) -> FileResult {
    let original = match (patch.kind, baseline) {
        (ChangeKind::Add, None) => Some(""),
        (ChangeKind::Add, Some(_)) | (_, None) => None,
        (_, Some(bytes)) => std::str::from_utf8(bytes).ok(),
    };
    let Some(original) = original else {
        debug!(path = %patch.path, kind = ?patch.kind, "patch does not fit the baseline file");
        return FileResult {
            report: FileReport {
                path: patch.path.clone(),
                outcome: PatchOutcome::Failed {
                    applied_hunks: 0,
                    failed_hunks: patch.hunks.len(),
                    reject: patch.render(),
                },
            },
            content: baseline.cloned(),
        };
    };

    let application = apply_hunks(original, &patch.hunks, mode);
    let outcome = if application.failed.is_empty() {
        PatchOutcome::Applied {
            quality: application.quality,
        }
    } else {
        PatchOutcome::Failed {
            applied_hunks: application.applied,
            failed_hunks: application.failed.len(),
            reject: patch.render_hunks(&application.failed),
        }
    };
    let removed = patch.kind == ChangeKind::Delete
        && application.failed.is_empty()
        && application.content.is_empty();
    FileResult {
        report: FileReport {
            path: patch.path.clone(),
            outcome,
        },
        content: (!removed).then(|| application.content.into_bytes()),
    }
}

/// Apply `patches` to `baseline`. Files without a patch pass through untouched.
pub fn apply_to_tree(mut baseline: Entries, patches: &PatchSet, mode: PatchMode) -> TreeApplication {
    let patches: Vec<&FilePatch> = patches.iter().collect();
    let results: Vec<FileResult> = patches
        .par_iter()
        .map(|patch| apply_file(baseline.get(&patch.path), patch, mode))
        .collect();

    let mut reports = Vec::with_capacity(results.len());
    let mut rejects = Entries::new();
    for result in results {
        let path = result.report.path.clone();
        match result.content {
            Some(bytes) => {
                baseline.insert(path.clone(), bytes);
            }
            None => {
                baseline.remove(&path);
            }
        }
        if let PatchOutcome::Failed { reject, .. } = &result.report.outcome {
            rejects.insert(format!("{path}{PATCH_SUFFIX}"), reject.clone().into_bytes());
        }
        reports.push(result.report);
    }
    TreeApplication {
        tree: baseline,
        reports,
        rejects,
    }
}

#[derive(Clone, Debug)]
pub struct ApplyRequest<'a> {
    pub baseline: &'a Path,
    pub patches: &'a Path,
    pub output: &'a Path,
    pub rejects: &'a Path,
    pub mode: PatchMode,
}

/// Apply the patch directory to the baseline and write the output tree and reject archive.
///
/// Failed files do not make this return an error: the output is still written
/// so it can be inspected. Use [`PatchRunSummary::into_result`] to fail the run.
pub fn apply_patches(request: &ApplyRequest<'_>) -> Result<PatchRunSummary> {
    let baseline = SourceTree::at(request.baseline);
    if !baseline.exists() {
        return Err(Error::config(format!(
            "baseline {} does not exist; run setup first",
            request.baseline.display()
        )));
    }
    let output = SourceTree::at(request.output);
    let set = PatchSet::load(request.patches)?;

    if set.is_empty() {
        match (&baseline, &output) {
            (SourceTree::Archive(from), SourceTree::Archive(to)) => {
                ensure_clean(to)?;
                fs::copy(from, to).with_context(|| {
                    format!("failed to copy {} to {}", from.display(), to.display())
                })?;
            }
            _ => output.write(&baseline.read()?)?,
        }
        jar::write_entries(request.rejects, std::iter::empty())?;
        info!("no patches found; baseline copied unchanged");
        return Ok(PatchRunSummary {
            rejects: request.rejects.to_path_buf(),
            ..PatchRunSummary::default()
        });
    }

    let application = apply_to_tree(baseline.read()?, &set, request.mode);
    output.write(&application.tree)?;
    jar::write_entries(
        request.rejects,
        application
            .rejects
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice())),
    )?;

    let mut summary = PatchRunSummary {
        rejects: request.rejects.to_path_buf(),
        ..PatchRunSummary::default()
    };
    for report in &application.reports {
        match &report.outcome {
            PatchOutcome::Applied { quality } => {
                summary.changed_files += 1;
                if !matches!(quality, MatchQuality::Exact { offset: 0 }) {
                    debug!(path = %report.path, ?quality, "patch applied with drift");
                }
            }
            PatchOutcome::Failed {
                applied_hunks,
                failed_hunks,
                ..
            } => {
                summary.failed_files += 1;
                warn!(
                    path = %report.path,
                    applied_hunks,
                    failed_hunks,
                    "patch failed to apply"
                );
            }
        }
    }
    summary.files = application.reports;
    info!(
        applied = summary.changed_files,
        failed = summary.failed_files,
        "applied patches"
    );
    Ok(summary)
}

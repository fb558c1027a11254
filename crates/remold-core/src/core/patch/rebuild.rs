use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use super::format::{ChangeKind, FilePatch};
use super::set::PatchSet;
use super::tree::SourceTree;
use crate::error::Error;
use crate::jar::Entries;

pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Paths the decompiler emits that never belong in a patch set.
pub const DEFAULT_IGNORED_PREFIXES: &[&str] = &[
    ".git",
    "data/",
    "assets/",
    "version.json",
    "flightrecorder-config.jfc",
    "pack.png",
];

#[derive(Clone, Debug)]
pub struct RebuildRequest<'a> {
    pub baseline: &'a Path,
    pub working: &'a Path,
    pub patches: &'a Path,
    pub context: usize,
    pub ignored: &'a [&'a str],
}

impl<'a> RebuildRequest<'a> {
    pub fn new(baseline: &'a Path, working: &'a Path, patches: &'a Path) -> Self {
        Self {
            baseline,
            working,
            patches,
            context: DEFAULT_CONTEXT_LINES,
            ignored: DEFAULT_IGNORED_PREFIXES,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub changed_files: usize,
    pub added_files: usize,
    pub removed_files: usize,
    /// Files that differ but are not UTF-8 text.
    pub skipped: Vec<String>,
}

fn is_ignored(path: &str, ignored: &[&str]) -> bool {
    ignored.iter().any(|prefix| path.starts_with(prefix))
}

/// Diff every non-ignored path present on either side.
pub fn diff_trees(
    baseline: &Entries,
    working: &Entries,
    context: usize,
    ignored: &[&str],
) -> Result<(PatchSet, Vec<String>)> {
    let paths: Vec<&String> = baseline
        .keys()
        .chain(working.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|path| !is_ignored(path, ignored))
        .collect();

    let diffs: Vec<Result<FilePatch, String>> = paths
        .par_iter()
        .filter_map(|path| {
            let old = baseline.get(*path);
            let new = working.get(*path);
            if old == new {
                return None;
            }
            let old_text = old.map(|bytes| std::str::from_utf8(bytes));
            let new_text = new.map(|bytes| std::str::from_utf8(bytes));
            match (old_text.transpose(), new_text.transpose()) {
                (Ok(old), Ok(new)) => FilePatch::between(path, old, new, context).map(Ok),
                _ => Some(Err((*path).clone())),
            }
        })
        .collect();

    let mut set = PatchSet::new();
    let mut skipped = Vec::new();
    for diff in diffs {
        match diff {
            Ok(patch) => set.insert(patch)?,
            Err(path) => {
                warn!(path = %path, "skipping binary file that differs from the baseline");
                skipped.push(path);
            }
        }
    }
    Ok((set, skipped))
}

/// Regenerate the patch directory from the difference between two trees.
pub fn rebuild_patches(request: &RebuildRequest<'_>) -> Result<RebuildSummary> {
    let baseline = SourceTree::at(request.baseline);
    if !baseline.exists() {
        return Err(Error::config(format!(
            "baseline {} does not exist; run setup first",
            request.baseline.display()
        )));
    }
    let working = SourceTree::at(request.working);
    if !working.exists() {
        return Err(Error::config(format!(
            "working tree {} does not exist",
            request.working.display()
        )));
    }

    let (set, skipped) = diff_trees(
        &baseline.read()?,
        &working.read()?,
        request.context,
        request.ignored,
    )?;
    set.write(request.patches)?;

    let mut summary = RebuildSummary {
        changed_files: set.len(),
        skipped,
        ..RebuildSummary::default()
    };
    for patch in set.iter() {
        match patch.kind {
            ChangeKind::Add => summary.added_files += 1,
            ChangeKind::Delete => summary.removed_files += 1,
            ChangeKind::Modify => {}
        }
    }
    info!(
        patches = summary.changed_files,
        dir = %request.patches.display(),
        "rebuilt patches"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn entries(pairs: &[(&str, &str)]) -> Entries {
        pairs
            .iter()
            .map(|(path, text)| ((*path).to_string(), text.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn ignored_prefixes_and_identical_files_are_left_out() -> Result<()> {
        let baseline = entries(&[
            ("net/Foo.java", "a\n"),
            ("net/Same.java", "s\n"),
            ("data/loot.json", "{}"),
            ("version.json", "{}"),
        ]);
        let working = entries(&[
            ("net/Foo.java", "b\n"),
            ("net/Same.java", "s\n"),
            ("data/loot.json", "{\"x\":1}"),
            ("net/New.java", "n\n"),
        ]);
        let (set, skipped) = diff_trees(&baseline, &working, 3, DEFAULT_IGNORED_PREFIXES)?;
        assert!(skipped.is_empty());
        let paths: Vec<&str> = set.iter().map(|patch| patch.path.as_str()).collect();
        assert_eq!(paths, vec!["net/Foo.java", "net/New.java"]);
        assert_eq!(set.get("net/New.java").map(|p| p.kind), Some(ChangeKind::Add));
        Ok(())
    }

    #[test]
    fn binary_differences_are_skipped() -> Result<()> {
        let mut baseline = Entries::new();
        baseline.insert("pack.bin".into(), vec![0xff, 0x00]);
        let mut working = Entries::new();
        working.insert("pack.bin".into(), vec![0xfe, 0x01]);
        let (set, skipped) = diff_trees(&baseline, &working, 3, &[])?;
        assert!(set.is_empty());
        assert_eq!(skipped, vec!["pack.bin"]);
        Ok(())
    }

    #[test]
    fn rebuild_replaces_the_patch_directory() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let baseline = temp.path().join("decompiled.jar");
        SourceTree::Archive(baseline.clone()).write(&entries(&[
            ("net/Foo.java", "class Foo {\n    int x = 1;\n}\n"),
            ("net/Gone.java", "class Gone {}\n"),
        ]))?;
        let working = temp.path().join("src/main/java");
        SourceTree::Dir(working.clone()).write(&entries(&[
            ("net/Foo.java", "class Foo {\n    int x = 2;\n}\n"),
        ]))?;
        let patches = temp.path().join("patches");
        fs::create_dir_all(patches.join("old"))?;
        fs::write(patches.join("old/Stale.java.patch"), "stale")?;

        let summary = rebuild_patches(&RebuildRequest::new(&baseline, &working, &patches))?;
        assert_eq!(summary.changed_files, 2);
        assert_eq!(summary.removed_files, 1);
        assert!(!patches.join("old").exists());
        let foo = fs::read_to_string(patches.join("net/Foo.java.patch"))?;
        assert!(foo.starts_with("--- a/net/Foo.java\n+++ b/net/Foo.java\n"));
        assert!(foo.contains("-    int x = 1;\n+    int x = 2;\n"));
        assert!(fs::read_to_string(patches.join("net/Gone.java.patch"))?.contains("+++ /dev/null"));
        Ok(())
    }

    #[test]
    fn missing_baseline_is_a_config_error() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("nope.jar");
        let err = rebuild_patches(&RebuildRequest::new(&missing, temp.path(), temp.path()))
            .unwrap_err();
        assert_eq!(crate::error::classify(&err).map(Error::code), Some("RM501"));
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use super::format::FilePatch;
use crate::error::Error;
use crate::fs::{ensure_clean, to_slash};

pub const PATCH_SUFFIX: &str = ".patch";

/// Patches keyed by the relative path of the file they change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchSet {
    patches: BTreeMap<String, FilePatch>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `<dir>/<path>.patch` files. A missing directory is an empty set.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut set = Self::new();
        if !dir.exists() {
            return Ok(set);
        }
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = to_slash(entry.path().strip_prefix(dir)?);
            let Some(path) = rel.strip_suffix(PATCH_SUFFIX) else {
                continue;
            };
            let text = fs::read_to_string(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            set.insert(FilePatch::parse(path, &text)?)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, patch: FilePatch) -> Result<()> {
        if self.patches.contains_key(&patch.path) {
            return Err(Error::config(format!(
                "more than one patch targets {}",
                patch.path
            )));
        }
        self.patches.insert(patch.path.clone(), patch);
        Ok(())
    }

    /// Replace the contents of `dir` with this set.
    pub fn write(&self, dir: &Path) -> Result<usize> {
        ensure_clean(dir)?;
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        for patch in self.patches.values() {
            let target = dir.join(format!("{}{PATCH_SUFFIX}", patch.path));
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(&target, patch.render())
                .with_context(|| format!("failed to write {}", target.display()))?;
        }
        Ok(self.patches.len())
    }

    pub fn get(&self, path: &str) -> Option<&FilePatch> {
        self.patches.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilePatch> {
        self.patches.values()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

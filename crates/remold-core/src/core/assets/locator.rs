use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rayon::prelude::*;
use remold_domain::{hash_file, AssetIndex, AssetObject, Hash, HashAlgorithm, VersionManifest};
use tracing::{debug, info};

use super::platform::{EnvLookup, Platform};

/// A local asset directory whose every object verified against its index.
#[derive(Clone, Debug)]
pub struct AssetStoreHandle {
    pub root: PathBuf,
    pub tag: String,
    pub index: AssetIndex,
}

/// Per-object verification against one `objects` directory.
#[derive(Debug, Default)]
pub struct VerifyReport<'a> {
    pub verified: usize,
    pub missing: Vec<&'a AssetObject>,
    pub mismatched: Vec<&'a AssetObject>,
}

impl<'a> VerifyReport<'a> {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }

    /// Objects that must be (re)downloaded.
    pub fn invalid(&self) -> impl Iterator<Item = &'a AssetObject> + '_ {
        self.missing.iter().chain(self.mismatched.iter()).copied()
    }
}

/// Check every distinct object of `index` under `objects_dir`.
pub fn verify_objects<'a>(objects_dir: &Path, index: &'a AssetIndex) -> VerifyReport<'a> {
    enum Check {
        Ok,
        Missing,
        Mismatch,
    }
    let checks: Vec<(&AssetObject, Check)> = index
        .unique_objects()
        .into_par_iter()
        .map(|object| {
            let Some(rel) = object.relative_path() else {
                return (object, Check::Mismatch);
            };
            let path = objects_dir.join(rel);
            if !path.is_file() {
                return (object, Check::Missing);
            }
            match hash_file(HashAlgorithm::Sha1, &path) {
                Ok(actual) if Hash::sha1(&object.hash).matches(&actual) => (object, Check::Ok),
                _ => (object, Check::Mismatch),
            }
        })
        .collect();

    let mut report = VerifyReport::default();
    for (object, check) in checks {
        match check {
            Check::Ok => report.verified += 1,
            Check::Missing => report.missing.push(object),
            Check::Mismatch => report.mismatched.push(object),
        }
    }
    report
}

pub struct AssetLocator {
    candidates: Vec<PathBuf>,
    strict: bool,
}

impl AssetLocator {
    #[must_use]
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self {
            candidates,
            strict: false,
        }
    }

    #[must_use]
    pub fn for_platform(platform: Platform, env: &dyn EnvLookup) -> Self {
        Self::new(platform.candidate_roots(env))
    }

    /// Also require the index file itself to match the manifest's digest.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate whose every object verifies, or `None`.
    pub fn locate(&self, manifest: &VersionManifest) -> Result<Option<AssetStoreHandle>> {
        let Some(tag) = manifest.asset_tag() else {
            return Ok(None);
        };
        let expected_index = Hash::sha1(&manifest.asset_index.sha1);
        for root in &self.candidates {
            if let Some(handle) = self.check_candidate(root, tag, &expected_index) {
                info!(root = %root.display(), tag, "using discovered assets directory");
                return Ok(Some(handle));
            }
        }
        info!("no valid local assets directory found");
        Ok(None)
    }

    /// Candidates are directories this tool does not own, so any problem with
    /// one rejects it and the search moves on.
    fn check_candidate(
        &self,
        root: &Path,
        tag: &str,
        expected_index: &Hash,
    ) -> Option<AssetStoreHandle> {
        let indexes = root.join("indexes");
        let objects = root.join("objects");
        if !indexes.is_dir() || !objects.is_dir() {
            return None;
        }
        let index_path = indexes.join(format!("{tag}.json"));
        if !index_path.is_file() {
            debug!(path = %index_path.display(), "asset index not present");
            return None;
        }
        if self.strict {
            let actual = match hash_file(HashAlgorithm::Sha1, &index_path) {
                Ok(actual) => actual,
                Err(err) => {
                    debug!(
                        path = %index_path.display(),
                        error = %err,
                        "unable to hash asset index"
                    );
                    return None;
                }
            };
            if !expected_index.matches(&actual) {
                debug!(
                    path = %index_path.display(),
                    expected = %expected_index.digest,
                    actual,
                    "asset index hash mismatch"
                );
                return None;
            }
        }
        let raw = match fs::read_to_string(&index_path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %index_path.display(), error = %err, "unable to read asset index");
                return None;
            }
        };
        let Ok(index) = AssetIndex::from_json(&raw) else {
            debug!(path = %index_path.display(), "not a valid asset index");
            return None;
        };
        if index.is_empty() {
            return None;
        }
        let report = verify_objects(&objects, &index);
        if !report.is_complete() {
            debug!(
                root = %root.display(),
                missing = report.missing.len(),
                mismatched = report.mismatched.len(),
                "skipping incomplete assets directory"
            );
            return None;
        }
        Some(AssetStoreHandle {
            root: root.to_path_buf(),
            tag: tag.to_string(),
            index,
        })
    }
}

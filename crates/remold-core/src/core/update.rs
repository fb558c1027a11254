use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use remold_domain::{VersionCatalog, VersionConfig};
use tracing::{debug, info};

use crate::effects::GitClient;
use crate::error::Error;
use crate::migration::{migrate_version, MigrationRecord, VERSIONS_DIR};

/// A `versions/<dir>` directory and the release it tracks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedVersion {
    pub dir: String,
    pub minecraft_version: String,
}

/// Every version directory under `root` that holds a readable config.
pub fn tracked_versions(root: &Path) -> Result<Vec<TrackedVersion>> {
    let versions = root.join(VERSIONS_DIR);
    if !versions.is_dir() {
        return Ok(Vec::new());
    }
    let mut tracked = Vec::new();
    for entry in fs::read_dir(&versions)
        .with_context(|| format!("failed to list {}", versions.display()))?
    {
        let entry = entry?;
        let config_path = VersionConfig::path_in(&entry.path());
        if !config_path.is_file() {
            continue;
        }
        let config = VersionConfig::load(&config_path)?;
        let Some(version) = config.minecraft_version() else {
            continue;
        };
        tracked.push(TrackedVersion {
            dir: entry.file_name().to_string_lossy().into_owned(),
            minecraft_version: version.to_string(),
        });
    }
    tracked.sort_by(|a, b| a.dir.cmp(&b.dir));
    Ok(tracked)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UpdatePolicy<'a> {
    /// Restrict candidates to one catalog type such as `release` or `snapshot`.
    pub kind: Option<&'a str>,
    /// Jump straight to the newest entry instead of the next one.
    pub latest: bool,
}

/// Advance the newest tracked version to the next upstream release.
///
/// Returns `None` when the newest tracked version is already current.
pub fn update_version(
    root: &Path,
    catalog: &VersionCatalog,
    policy: UpdatePolicy<'_>,
    git: &dyn GitClient,
) -> Result<Option<MigrationRecord>> {
    let tracked = tracked_versions(root)?;
    if tracked.is_empty() {
        return Err(Error::config(format!(
            "no version directories found under {}",
            root.join(VERSIONS_DIR).display()
        )));
    }
    let current = catalog
        .newest_of(tracked.iter().map(|v| v.minecraft_version.as_str()))?
        .ok_or_else(|| Error::config("none of the tracked versions appear in the version catalog"))?;
    let target = if policy.latest {
        catalog.latest_of(policy.kind)
    } else {
        catalog.next_after(&current.id, policy.kind)
    };
    let Some(target) = target.filter(|target| target.id != current.id) else {
        info!(version = %current.id, "already up to date");
        return Ok(None);
    };
    if target.released_at()? <= current.released_at()? {
        info!(version = %current.id, "already up to date");
        return Ok(None);
    }

    let from = tracked
        .iter()
        .find(|v| v.minecraft_version == current.id)
        .map(|v| v.dir.as_str())
        .unwrap_or(current.id.as_str());
    debug!(from, to = %target.id, "advancing version");
    migrate_version(root, from, &target.id, git).map(Some)
}

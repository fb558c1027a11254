use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use remold_domain::{AssetIndex, Hash};
use serde::Serialize;
use tracing::info;

use super::locator::verify_objects;
use crate::fetch::{FetchRequest, Fetcher};

/// The append-only asset cache remold owns.
pub struct ManagedStore {
    root: PathBuf,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PopulateSummary {
    pub requested: usize,
    pub reused: usize,
    pub downloaded: usize,
}

impl ManagedStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    #[must_use]
    pub fn index_path(&self, tag: &str) -> PathBuf {
        self.root.join("indexes").join(format!("{tag}.json"))
    }

    /// Install the index and download every object that is missing or fails
    /// verification; valid objects already present are kept.
    pub fn populate(
        &self,
        fetcher: &Fetcher,
        assets_url: &str,
        tag: &str,
        index_json: &str,
    ) -> Result<PopulateSummary> {
        let index = AssetIndex::from_json(index_json)?;
        let index_path = self.index_path(tag);
        if let Some(parent) = index_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&index_path, index_json)
            .with_context(|| format!("failed to write {}", index_path.display()))?;

        let objects_dir = self.objects_dir();
        let report = verify_objects(&objects_dir, &index);
        let requests = report
            .invalid()
            .map(|object| {
                let rel = object
                    .relative_path()
                    .with_context(|| format!("invalid asset hash {:?}", object.hash))?;
                Ok(FetchRequest::new(
                    format!("{}/{rel}", assets_url.trim_end_matches('/')),
                    objects_dir.join(&rel),
                )
                .verified(Hash::sha1(&object.hash)))
            })
            .collect::<Result<Vec<_>>>()?;
        let summary = PopulateSummary {
            requested: report.verified + requests.len(),
            reused: report.verified,
            downloaded: requests.len(),
        };
        info!(
            tag,
            reused = summary.reused,
            downloading = summary.downloaded,
            "populating managed assets"
        );
        fetcher.fetch_all(requests)?;
        Ok(summary)
    }
}

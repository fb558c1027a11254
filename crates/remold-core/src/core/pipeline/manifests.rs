use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use remold_domain::{CatalogEntry, Hash, VersionCatalog, VersionManifest};
use tracing::debug;

use crate::error::Error;
use crate::fetch::{FetchRequest, Fetcher};

const CATALOG_FILE: &str = "catalog.json";
const VERSION_FILE: &str = "version.json";
const ASSET_INDEX_FILE: &str = "asset-index.json";

/// Upstream JSON documents cached under `<cache>/jsons`.
pub struct ManifestCache {
    root: PathBuf,
}

impl ManifestCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn version_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// The catalog carries no digest of its own, so it is refetched every time.
    pub fn catalog(&self, fetcher: &Fetcher, url: &str) -> Result<VersionCatalog> {
        let path = self.root.join(CATALOG_FILE);
        fetcher.fetch(FetchRequest::new(url, &path))?;
        VersionCatalog::from_json(&read(&path)?)
    }

    /// Per-version manifest, reused when the cached copy still matches the catalog digest.
    pub fn version(&self, fetcher: &Fetcher, entry: &CatalogEntry) -> Result<VersionManifest> {
        let path = self.version_dir(&entry.id).join(VERSION_FILE);
        fetcher.ensure(FetchRequest::new(&entry.url, &path).verified(entry.manifest_hash()))?;
        debug!(version = %entry.id, path = %path.display(), "version manifest ready");
        VersionManifest::from_json(&read(&path)?)
    }

    /// Raw asset index JSON for `manifest`.
    pub fn asset_index(&self, fetcher: &Fetcher, id: &str, manifest: &VersionManifest) -> Result<String> {
        let path = self.version_dir(id).join(ASSET_INDEX_FILE);
        let index = &manifest.asset_index;
        fetcher.ensure(FetchRequest::new(&index.url, &path).verified(Hash::sha1(&index.sha1)))?;
        read(&path)
    }
}

/// Find `id` in the catalog or fail with a configuration error.
pub fn catalog_entry<'a>(catalog: &'a VersionCatalog, id: &str) -> Result<&'a CatalogEntry> {
    catalog
        .find(id)
        .ok_or_else(|| Error::config(format!("unknown Minecraft version '{id}'")))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

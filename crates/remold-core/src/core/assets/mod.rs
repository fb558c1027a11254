//! Client asset discovery and the managed fallback store.

mod locator;
mod platform;
mod store;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use remold_domain::{AssetsInfo, VersionManifest};
use tracing::info;

pub use locator::{verify_objects, AssetLocator, AssetStoreHandle, VerifyReport};
pub use platform::{EnvLookup, Platform};
pub use store::{ManagedStore, PopulateSummary};

use crate::error::Error;
use crate::fetch::Fetcher;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AssetsMode {
    /// Reuse a verified launcher directory, downloading only when none qualifies.
    #[default]
    Auto,
    /// Always populate the managed store.
    Downloaded,
    /// Leave assets alone.
    None,
}

impl fmt::Display for AssetsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Downloaded => "downloaded",
            Self::None => "none",
        })
    }
}

impl FromStr for AssetsMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "downloaded" => Ok(Self::Downloaded),
            "none" => Ok(Self::None),
            other => Err(Error::config(format!("unknown assets mode '{other}'"))),
        }
    }
}

pub struct AssetsSetup<'a> {
    pub mode: AssetsMode,
    pub manifest: &'a VersionManifest,
    /// Contents of the asset index named by the manifest.
    pub index_json: &'a str,
    pub locator: &'a AssetLocator,
    pub store: &'a ManagedStore,
    pub assets_url: &'a str,
    pub info_file: &'a Path,
}

/// Resolve client assets according to `mode` and record the result.
pub fn setup_assets(fetcher: &Fetcher, setup: &AssetsSetup<'_>) -> Result<AssetsInfo> {
    let tag = setup
        .manifest
        .asset_tag()
        .ok_or_else(|| Error::config("version manifest does not name an asset index"))?;
    let info = match setup.mode {
        AssetsMode::None => AssetsInfo::default(),
        AssetsMode::Auto => match setup.locator.locate(setup.manifest)? {
            Some(handle) => AssetsInfo {
                assets_found: true,
                assets_dir: Some(handle.root.display().to_string()),
                asset_index: Some(handle.tag),
            },
            None => populate(fetcher, setup, tag)?,
        },
        AssetsMode::Downloaded => populate(fetcher, setup, tag)?,
    };
    if let Some(parent) = setup.info_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let rendered = serde_json::to_string_pretty(&info)?;
    fs::write(setup.info_file, rendered)
        .with_context(|| format!("failed to write {}", setup.info_file.display()))?;
    Ok(info)
}

fn populate(fetcher: &Fetcher, setup: &AssetsSetup<'_>, tag: &str) -> Result<AssetsInfo> {
    let summary = setup
        .store
        .populate(fetcher, setup.assets_url, tag, setup.index_json)?;
    info!(downloaded = summary.downloaded, "managed assets up to date");
    Ok(AssetsInfo {
        assets_found: false,
        assets_dir: Some(setup.store.root().display().to_string()),
        asset_index: Some(tag.to_string()),
    })
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::hash::Hash;
use crate::side::Side;

/// Per-release manifest as served by the upstream catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub release_time: Option<String>,
    pub downloads: Downloads,
    pub java_version: JavaVersion,
    #[serde(default)]
    pub libraries: Vec<Library>,
    pub asset_index: AssetIndexRef,
    /// Release tag naming the asset index file.
    #[serde(default)]
    pub assets: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Downloads {
    pub server: Download,
    pub client: Download,
    #[serde(default)]
    pub server_mappings: Option<Download>,
    #[serde(default)]
    pub client_mappings: Option<Download>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    pub url: String,
    pub size: u64,
    pub sha1: String,
}

impl Download {
    #[must_use]
    pub fn hash(&self) -> Hash {
        Hash::sha1(&self.sha1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersion {
    pub major_version: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<LibraryArtifact>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryArtifact {
    pub path: String,
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIndexRef {
    #[serde(default)]
    pub id: Option<String>,
    pub sha1: String,
    pub url: String,
}

impl VersionManifest {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("failed to parse version manifest")
    }

    #[must_use]
    pub fn jar(&self, side: Side) -> &Download {
        match side {
            Side::Server => &self.downloads.server,
            Side::Client => &self.downloads.client,
        }
    }

    #[must_use]
    pub fn mappings(&self, side: Side) -> Option<&Download> {
        match side {
            Side::Server => self.downloads.server_mappings.as_ref(),
            Side::Client => self.downloads.client_mappings.as_ref(),
        }
    }

    /// Name of the per-release asset index, falling back to the index id.
    #[must_use]
    pub fn asset_tag(&self) -> Option<&str> {
        self.assets
            .as_deref()
            .or(self.asset_index.id.as_deref())
    }

    /// Library artifacts that carry a downloadable jar.
    pub fn library_artifacts(&self) -> impl Iterator<Item = &LibraryArtifact> {
        self.libraries
            .iter()
            .filter_map(|lib| lib.downloads.as_ref()?.artifact.as_ref())
    }
}

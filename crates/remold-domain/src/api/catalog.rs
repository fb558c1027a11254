use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::hash::Hash;

/// Upstream list of every published release, newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCatalog {
    #[serde(default)]
    pub latest: BTreeMap<String, String>,
    pub versions: Vec<CatalogEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub time: String,
    pub release_time: String,
    pub url: String,
    pub sha1: String,
}

impl CatalogEntry {
    #[must_use]
    pub fn manifest_hash(&self) -> Hash {
        Hash::sha1(&self.sha1)
    }

    pub fn released_at(&self) -> Result<OffsetDateTime> {
        OffsetDateTime::parse(&self.release_time, &Rfc3339)
            .with_context(|| format!("invalid releaseTime '{}' for {}", self.release_time, self.id))
    }

    #[must_use]
    pub fn is_release(&self) -> bool {
        self.kind == "release"
    }
}

impl VersionCatalog {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("failed to parse version catalog")
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&CatalogEntry> {
        self.versions.iter().find(|entry| entry.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.versions.iter().position(|entry| entry.id == id)
    }

    /// The closest entry newer than `id`, optionally restricted to one kind.
    #[must_use]
    pub fn next_after(&self, id: &str, kind: Option<&str>) -> Option<&CatalogEntry> {
        let current = self.position(id)?;
        self.versions[..current]
            .iter()
            .rev()
            .find(|entry| kind.map_or(true, |kind| entry.kind == kind))
    }

    /// The newest entry, optionally restricted to one kind.
    #[must_use]
    pub fn latest_of(&self, kind: Option<&str>) -> Option<&CatalogEntry> {
        self.versions
            .iter()
            .find(|entry| kind.map_or(true, |kind| entry.kind == kind))
    }

    /// Pick the most recently released entry among `ids`; unknown ids are skipped.
    pub fn newest_of<'a, I>(&self, ids: I) -> Result<Option<&CatalogEntry>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut newest: Option<(&CatalogEntry, OffsetDateTime)> = None;
        for id in ids {
            let Some(entry) = self.find(id) else {
                continue;
            };
            let released = entry.released_at()?;
            if newest.as_ref().map_or(true, |(_, best)| released > *best) {
                newest = Some((entry, released));
            }
        }
        Ok(newest.map(|(entry, _)| entry))
    }
}

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered mapping of logical asset names to content-addressed objects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIndex {
    pub objects: IndexMap<String, AssetObject>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// A SHA-1 hex digest; anything else cannot name an object file.
    #[must_use]
    pub fn has_valid_hash(&self) -> bool {
        self.hash.len() == 40 && self.hash.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Bucketed location relative to an `objects` directory: `<hh>/<hash>`.
    #[must_use]
    pub fn relative_path(&self) -> Option<String> {
        if !self.has_valid_hash() {
            return None;
        }
        let hash = self.hash.to_ascii_lowercase();
        Some(format!("{}/{hash}", &hash[..2]))
    }
}

impl AssetIndex {
    pub fn from_json(raw: &str) -> Result<Self> {
        let index: Self = serde_json::from_str(raw).context("failed to parse asset index")?;
        if let Some((name, object)) = index
            .objects
            .iter()
            .find(|(_, object)| !object.has_valid_hash())
        {
            bail!("asset index entry {name} has invalid hash {:?}", object.hash);
        }
        Ok(index)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Distinct objects, in first-seen order; several names may share one hash.
    pub fn unique_objects(&self) -> Vec<&AssetObject> {
        let mut seen = std::collections::HashSet::new();
        self.objects
            .values()
            .filter(|object| seen.insert(object.hash.to_ascii_lowercase()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_manifest_order_and_dedups_objects() -> Result<()> {
        let index = AssetIndex::from_json(
            r#"{"objects": {
                "z/last.ogg": {"hash": "bd6d0c2fb7d3a2f2ec3bb5ea4b4c6b9f4e7c0c11", "size": 3},
                "a/first.png": {"hash": "0a1b2c3d4e5f60718293a4b5c6d7e8f901234567", "size": 5},
                "a/copy.png": {"hash": "0A1B2C3D4E5F60718293A4B5C6D7E8F901234567", "size": 5}
            }}"#,
        )?;
        let names: Vec<_> = index.objects.keys().map(String::as_str).collect();
        assert_eq!(names, ["z/last.ogg", "a/first.png", "a/copy.png"]);
        assert_eq!(index.unique_objects().len(), 2);
        assert_eq!(
            index.objects["a/first.png"].relative_path().as_deref(),
            Some("0a/0a1b2c3d4e5f60718293a4b5c6d7e8f901234567")
        );
        Ok(())
    }

    #[test]
    fn hashes_that_are_not_sha1_hex_are_refused() {
        for hash in [
            "..",
            "../../../../etc/passwd",
            "0a/..",
            "",
            "zz1b2c3d4e5f60718293a4b5c6d7e8f901234567",
        ] {
            let object = AssetObject {
                hash: hash.to_string(),
                size: 1,
            };
            assert_eq!(object.relative_path(), None, "{hash}");
            let raw = format!(r#"{{"objects": {{"x": {{"hash": {hash:?}, "size": 1}}}}}}"#);
            let err = AssetIndex::from_json(&raw).unwrap_err();
            assert!(err.to_string().contains("invalid hash"), "{err}");
        }
    }
}

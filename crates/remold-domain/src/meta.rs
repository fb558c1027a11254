use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::side::Side;

/// Name of the metadata document inside a packaged archive.
pub const META_FILE_NAME: &str = "remold.json";

/// Description of the toolchain a patch set was produced with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolchainMeta {
    pub minecraft_version: String,
    #[serde(default)]
    pub side: Side,
    pub toolchain_version: String,
    pub remapper: ToolSpec,
    pub decompiler: ToolSpec,
    #[serde(default)]
    pub repositories: Vec<Repository>,
    #[serde(default)]
    pub remapper_args: Vec<String>,
    #[serde(default)]
    pub decompiler_args: Vec<String>,
}

/// A tool jar: where it comes from and what it must hash to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub coordinate: String,
    pub url: String,
    pub sha256: String,
    /// When set the jar is launched with `-cp` instead of `-jar`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
}

impl ToolSpec {
    /// File name used for the cached jar, derived from the coordinate.
    #[must_use]
    pub fn jar_name(&self) -> String {
        let sanitized: String = self
            .coordinate
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        format!("{sanitized}.jar")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

impl ToolchainMeta {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("failed to parse toolchain metadata")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize toolchain metadata")
    }
}

/// Outcome of client asset discovery, persisted next to the build outputs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetsInfo {
    pub assets_found: bool,
    pub assets_dir: Option<String>,
    pub asset_index: Option<String>,
}

/// Library coordinates derived from a server bundle, keyed by the bundle hash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryList {
    pub sha256: String,
    pub libraries: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_uses_camel_case_keys() -> Result<()> {
        let meta = ToolchainMeta {
            minecraft_version: "1.20.1".into(),
            side: Side::Server,
            toolchain_version: "1.20.1+build.3".into(),
            remapper: ToolSpec {
                coordinate: "net.neoforged:AutoRenamingTool:2.0.3:all".into(),
                url: "https://example.invalid/art.jar".into(),
                sha256: "00".repeat(32),
                main_class: None,
            },
            decompiler: ToolSpec {
                coordinate: "org.vineflower:vineflower:1.10.1".into(),
                url: "https://example.invalid/vf.jar".into(),
                sha256: "11".repeat(32),
                main_class: Some("org.jetbrains.java.decompiler.main.decompiler.ConsoleDecompiler".into()),
            },
            repositories: vec![],
            remapper_args: vec!["--input={input}".into()],
            decompiler_args: vec![],
        };
        let json = meta.to_json()?;
        assert!(json.contains("\"minecraftVersion\": \"1.20.1\""));
        assert!(json.contains("\"mainClass\""));
        assert_eq!(ToolchainMeta::from_json(&json)?, meta);
        assert_eq!(meta.remapper.jar_name(), "net.neoforged_AutoRenamingTool_2.0.3_all.jar");
        Ok(())
    }

    #[test]
    fn assets_info_serializes_nulls() -> Result<()> {
        let info = AssetsInfo::default();
        assert_eq!(
            serde_json::to_string(&info)?,
            r#"{"assetsFound":false,"assetsDir":null,"assetIndex":null}"#
        );
        Ok(())
    }
}

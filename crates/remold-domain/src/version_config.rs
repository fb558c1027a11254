//! The per-version `remold.toml` document.
//!
//! Edits go through `toml_edit` so that rewriting one field leaves every
//! other byte of the file untouched.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use toml_edit::{Array, ArrayOfTables, DocumentMut, Item, Table, Value as TomlValue};

use crate::meta::{Repository, ToolSpec, ToolchainMeta};
use crate::side::Side;

pub const VERSION_CONFIG_FILE: &str = "remold.toml";

const MINECRAFT_VERSION: &str = "minecraftVersion";
const SIDE: &str = "side";
const TOOLCHAIN_VERSION: &str = "toolchainVersion";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolRole {
    Remapper,
    Decompiler,
}

impl ToolRole {
    #[must_use]
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Remapper => "remapper",
            Self::Decompiler => "decompiler",
        }
    }
}

/// A tool section: the jar plus its argument template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolConfig {
    pub spec: ToolSpec,
    pub args: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct VersionConfig {
    doc: DocumentMut,
}

impl VersionConfig {
    pub fn parse(contents: &str) -> Result<Self> {
        let doc: DocumentMut = contents
            .parse()
            .context("failed to parse version configuration")?;
        let config = Self { doc };
        config
            .minecraft_version()
            .ok_or_else(|| anyhow!("`{MINECRAFT_VERSION}` must be set to a string"))?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid {}", path.display()))
    }

    /// Path of the config file inside a version directory.
    #[must_use]
    pub fn path_in(version_dir: &Path) -> PathBuf {
        version_dir.join(VERSION_CONFIG_FILE)
    }

    #[must_use]
    pub fn minecraft_version(&self) -> Option<&str> {
        self.doc.get(MINECRAFT_VERSION).and_then(Item::as_str)
    }

    /// Replace the version identifier, keeping the value's surrounding decor.
    pub fn set_minecraft_version(&mut self, version: &str) -> Result<()> {
        let item = self
            .doc
            .get_mut(MINECRAFT_VERSION)
            .ok_or_else(|| anyhow!("`{MINECRAFT_VERSION}` is missing"))?;
        let decor = item.as_value().map(|value| value.decor().clone());
        let mut replacement = TomlValue::from(version);
        if let Some(decor) = decor {
            *replacement.decor_mut() = decor;
        }
        *item = Item::Value(replacement);
        Ok(())
    }

    pub fn side(&self) -> Result<Side> {
        match self.doc.get(SIDE).and_then(Item::as_str) {
            Some(raw) => raw.parse(),
            None => Ok(Side::default()),
        }
    }

    #[must_use]
    pub fn toolchain_version(&self) -> Option<&str> {
        self.doc.get(TOOLCHAIN_VERSION).and_then(Item::as_str)
    }

    pub fn tool(&self, role: ToolRole) -> Result<ToolConfig> {
        let name = role.table_name();
        let table = self
            .doc
            .get(name)
            .and_then(Item::as_table)
            .ok_or_else(|| anyhow!("[{name}] must be a table"))?;
        let field = |key: &str| -> Result<String> {
            table
                .get(key)
                .and_then(Item::as_str)
                .map(str::to_string)
                .ok_or_else(|| anyhow!("[{name}].{key} must be a string"))
        };
        let spec = ToolSpec {
            coordinate: field("coordinate")?,
            url: field("url")?,
            sha256: field("sha256")?,
            main_class: table
                .get("mainClass")
                .and_then(Item::as_str)
                .map(str::to_string),
        };
        Ok(ToolConfig {
            spec,
            args: string_array(table.get("args")),
        })
    }

    #[must_use]
    pub fn repositories(&self) -> Vec<Repository> {
        let Some(tables) = self
            .doc
            .get("repositories")
            .and_then(Item::as_array_of_tables)
        else {
            return Vec::new();
        };
        tables
            .iter()
            .filter_map(|table| {
                let name = table.get("name").and_then(Item::as_str)?;
                let url = table.get("url").and_then(Item::as_str)?;
                let groups = table.get("groups").map(|item| string_array(Some(item)));
                Some(Repository {
                    name: name.to_string(),
                    url: url.to_string(),
                    groups,
                })
            })
            .collect()
    }

    /// Build a fresh document describing the toolchain in `meta`.
    #[must_use]
    pub fn from_meta(meta: &ToolchainMeta) -> Self {
        let mut doc = DocumentMut::new();
        doc.insert(MINECRAFT_VERSION, toml_edit::value(meta.minecraft_version.as_str()));
        doc.insert(SIDE, toml_edit::value(meta.side.as_str()));
        doc.insert(TOOLCHAIN_VERSION, toml_edit::value(meta.toolchain_version.as_str()));
        doc.insert(
            ToolRole::Remapper.table_name(),
            Item::Table(tool_table(&meta.remapper, &meta.remapper_args)),
        );
        doc.insert(
            ToolRole::Decompiler.table_name(),
            Item::Table(tool_table(&meta.decompiler, &meta.decompiler_args)),
        );
        if !meta.repositories.is_empty() {
            let mut tables = ArrayOfTables::new();
            for repo in &meta.repositories {
                let mut table = Table::new();
                table.insert("name", toml_edit::value(repo.name.as_str()));
                table.insert("url", toml_edit::value(repo.url.as_str()));
                if let Some(groups) = &repo.groups {
                    table.insert("groups", Item::Value(TomlValue::Array(to_array(groups))));
                }
                tables.push(table);
            }
            doc.insert("repositories", Item::ArrayOfTables(tables));
        }
        Self { doc }
    }

    /// Describe this version as archive metadata.
    pub fn to_meta(&self, toolchain_version: &str) -> Result<ToolchainMeta> {
        let remapper = self.tool(ToolRole::Remapper)?;
        let decompiler = self.tool(ToolRole::Decompiler)?;
        Ok(ToolchainMeta {
            minecraft_version: self
                .minecraft_version()
                .ok_or_else(|| anyhow!("`{MINECRAFT_VERSION}` is missing"))?
                .to_string(),
            side: self.side()?,
            toolchain_version: toolchain_version.to_string(),
            remapper: remapper.spec,
            decompiler: decompiler.spec,
            repositories: self.repositories(),
            remapper_args: remapper.args,
            decompiler_args: decompiler.args,
        })
    }

    #[must_use]
    pub fn render(&self) -> String {
        self.doc.to_string()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render()).with_context(|| format!("failed to write {}", path.display()))
    }
}

fn tool_table(spec: &ToolSpec, args: &[String]) -> Table {
    let mut table = Table::new();
    table.insert("coordinate", toml_edit::value(spec.coordinate.as_str()));
    table.insert("url", toml_edit::value(spec.url.as_str()));
    table.insert("sha256", toml_edit::value(spec.sha256.as_str()));
    if let Some(main_class) = &spec.main_class {
        table.insert("mainClass", toml_edit::value(main_class.as_str()));
    }
    table.insert("args", Item::Value(TomlValue::Array(to_array(args))));
    table
}

fn to_array(values: &[String]) -> Array {
    let mut array = Array::new();
    for value in values {
        array.push(value.as_str());
    }
    array
}

fn string_array(item: Option<&Item>) -> Vec<String> {
    item.and_then(Item::as_array)
        .map(|array| {
            array
                .iter()
                .filter_map(|val| val.as_str().map(std::string::ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"# tracked release
minecraftVersion = "1.20"   # bump with `remold migrate`
side = "server"

[remapper]
coordinate = "net.neoforged:AutoRenamingTool:2.0.3:all"
url = "https://example.invalid/art.jar"
sha256 = "aa"
args = ["--input={input}", "--output={output}"]

[decompiler]
coordinate = "org.vineflower:vineflower:1.10.1"
url = "https://example.invalid/vf.jar"
sha256 = "bb"
mainClass = "org.jetbrains.java.decompiler.main.decompiler.ConsoleDecompiler"
args = ["{input}", "{output}"]

[[repositories]]
name = "NeoForged"
url = "https://maven.neoforged.net/releases/"
groups = ["net.neoforged"]
"#;

    #[test]
    fn version_rewrite_preserves_other_bytes() -> Result<()> {
        let mut config = VersionConfig::parse(SAMPLE)?;
        config.set_minecraft_version("1.20.1")?;
        let rendered = config.render();
        assert_eq!(rendered, SAMPLE.replacen("\"1.20\"", "\"1.20.1\"", 1));
        assert_eq!(config.minecraft_version(), Some("1.20.1"));
        Ok(())
    }

    #[test]
    fn reads_tool_sections() -> Result<()> {
        let config = VersionConfig::parse(SAMPLE)?;
        let decompiler = config.tool(ToolRole::Decompiler)?;
        assert_eq!(decompiler.args, ["{input}", "{output}"]);
        assert!(decompiler.spec.main_class.is_some());
        assert!(config.tool(ToolRole::Remapper)?.spec.main_class.is_none());
        assert_eq!(config.repositories()[0].groups.as_deref(), Some(&["net.neoforged".to_string()][..]));
        Ok(())
    }

    #[test]
    fn meta_round_trips_through_document() -> Result<()> {
        let config = VersionConfig::parse(SAMPLE)?;
        let meta = config.to_meta("1.20+build.1")?;
        let regenerated = VersionConfig::from_meta(&meta);
        assert_eq!(regenerated.to_meta("1.20+build.1")?, meta);
        assert_eq!(regenerated.toolchain_version(), Some("1.20+build.1"));
        Ok(())
    }

    #[test]
    fn missing_version_is_rejected() {
        assert!(VersionConfig::parse("side = \"client\"\n").is_err());
        assert!(VersionConfig::parse("minecraftVersion = 12\n").is_err());
    }
}

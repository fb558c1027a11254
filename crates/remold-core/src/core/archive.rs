//! Metadata archives: a zip holding `remold.json` and the `patches/` tree,
//! published next to a `.sha256` sidecar.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use remold_domain::{
    hash_bytes, hash_file, Hash, HashAlgorithm, ToolchainMeta, VersionConfig, META_FILE_NAME,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Error;
use crate::fetch::{FetchRequest, Fetcher};
use crate::fs::{remove_path, to_slash};
use crate::jar;
use crate::migration::{validate_dir_name, version_dir, PATCHES_DIR};

const SHA256_SUFFIX: &str = ".sha256";

/// Where an archive comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArchiveSource {
    Path(PathBuf),
    Url(String),
}

impl ArchiveSource {
    pub fn parse(raw: &str) -> Self {
        let is_url = ["http://", "https://", "file://"]
            .iter()
            .any(|scheme| raw.starts_with(scheme));
        if is_url {
            Self::Url(raw.to_string())
        } else {
            Self::Path(PathBuf::from(raw))
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpenRequest<'a> {
    pub root: &'a Path,
    pub source: ArchiveSource,
    /// Directory name under `versions/`; defaults to the archive's version.
    pub dir_name: Option<&'a str>,
    pub force: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OpenSummary {
    pub dir: PathBuf,
    pub minecraft_version: String,
    pub toolchain_version: String,
    pub patches: usize,
}

fn sidecar_url(url: &str) -> String {
    format!("{url}{SHA256_SUFFIX}")
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(SHA256_SUFFIX);
    PathBuf::from(name)
}

/// Download a URL source next to `scratch`, verified against its `.sha256` sidecar.
fn download(fetcher: &Fetcher, url: &str, scratch: &Path) -> Result<PathBuf> {
    let expected = fetcher.fetch_text(&sidecar_url(url))?;
    let digest = expected.split_whitespace().next().unwrap_or_default();
    let hash = Hash::parse(&format!("{}:{digest}", HashAlgorithm::Sha256))
        .with_context(|| format!("{} does not hold a sha256 digest", sidecar_url(url)))?;
    let destination = scratch.join("archive.zip");
    fetcher.fetch(FetchRequest::new(url, &destination).verified(hash))?;
    Ok(destination)
}

/// A local archive is checked against its sidecar when one sits next to it.
fn check_local(path: &Path) -> Result<()> {
    let sidecar = sidecar_path(path);
    if !sidecar.is_file() {
        return Ok(());
    }
    let expected = fs::read_to_string(&sidecar)
        .with_context(|| format!("failed to read {}", sidecar.display()))?;
    let expected = Hash::sha256(expected.split_whitespace().next().unwrap_or_default());
    let actual = hash_file(HashAlgorithm::Sha256, path)?;
    if !expected.matches(&actual) {
        return Err(anyhow::Error::from(Error::Integrity {
            target: path.display().to_string(),
            expected: expected.digest,
            actual,
        }));
    }
    Ok(())
}

/// Create `versions/<dir>` from a metadata archive.
pub fn open_version(fetcher: &Fetcher, request: &OpenRequest<'_>) -> Result<OpenSummary> {
    let scratch = tempfile::tempdir().context("failed to create a scratch directory")?;
    let archive = match &request.source {
        ArchiveSource::Path(path) => {
            if !path.is_file() {
                return Err(Error::config(format!("{} does not exist", path.display())));
            }
            check_local(path)?;
            path.clone()
        }
        ArchiveSource::Url(url) => download(fetcher, url, scratch.path())?,
    };

    let entries = jar::read_entries(&archive)?;
    let meta_bytes = entries.get(META_FILE_NAME).ok_or_else(|| {
        Error::config(format!(
            "malformed archive {}: missing {META_FILE_NAME}",
            archive.display()
        ))
    })?;
    let meta = ToolchainMeta::from_json(std::str::from_utf8(meta_bytes)?)?;

    let name = request.dir_name.unwrap_or(&meta.minecraft_version);
    validate_dir_name(name)?;
    let dir = version_dir(request.root, name);
    if dir.exists() {
        if !request.force {
            return Err(Error::config(format!(
                "{} already exists; choose another directory name or pass --force",
                dir.display()
            )));
        }
        debug!(dir = %dir.display(), "replacing existing version directory");
        remove_path(&dir)?;
    }

    let prefix = format!("{PATCHES_DIR}/");
    let mut patches = 0;
    for (name, bytes) in &entries {
        let Some(rel) = name.strip_prefix(&prefix) else {
            continue;
        };
        let target = dir.join(PATCHES_DIR).join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&target, bytes).with_context(|| format!("failed to write {}", target.display()))?;
        patches += 1;
    }
    fs::create_dir_all(dir.join(PATCHES_DIR))
        .with_context(|| format!("failed to create {}", dir.display()))?;
    VersionConfig::from_meta(&meta).save(&VersionConfig::path_in(&dir))?;

    info!(
        dir = %dir.display(),
        version = %meta.minecraft_version,
        patches,
        "opened version"
    );
    Ok(OpenSummary {
        dir,
        minecraft_version: meta.minecraft_version,
        toolchain_version: meta.toolchain_version,
        patches,
    })
}

#[derive(Clone, Debug)]
pub struct PackageRequest<'a> {
    pub version_dir: &'a Path,
    /// Defaults to `toolchainVersion` from the version config.
    pub toolchain_version: Option<&'a str>,
    /// Defaults to `<version_dir>/build/remold-<toolchain version>.zip`.
    pub output: Option<&'a Path>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub archive: PathBuf,
    pub sha256: String,
    pub patches: usize,
}

/// Write the version's metadata and patches into an archive plus its sidecar.
pub fn package_version(request: &PackageRequest<'_>) -> Result<PackageSummary> {
    let config_path = VersionConfig::path_in(request.version_dir);
    if !config_path.is_file() {
        return Err(Error::config(format!(
            "{} is not a version directory",
            request.version_dir.display()
        )));
    }
    let config = VersionConfig::load(&config_path)?;
    let toolchain_version = request
        .toolchain_version
        .or(config.toolchain_version())
        .ok_or_else(|| Error::config("no toolchain version given and none recorded in the config"))?
        .to_string();
    let meta = config.to_meta(&toolchain_version)?;
    let meta_json = meta.to_json()?;

    let patches_dir = request.version_dir.join(PATCHES_DIR);
    let mut entries = vec![(META_FILE_NAME.to_string(), meta_json.into_bytes())];
    if patches_dir.is_dir() {
        for entry in walkdir::WalkDir::new(&patches_dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to walk {}", patches_dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = to_slash(entry.path().strip_prefix(&patches_dir)?);
            let bytes = fs::read(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            entries.push((format!("{PATCHES_DIR}/{rel}"), bytes));
        }
    }

    let archive = request.output.map_or_else(
        || {
            request
                .version_dir
                .join("build")
                .join(format!("remold-{toolchain_version}.zip"))
        },
        Path::to_path_buf,
    );
    jar::write_entries(
        &archive,
        entries
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice())),
    )?;
    let sha256 = hash_bytes(
        HashAlgorithm::Sha256,
        &fs::read(&archive).with_context(|| format!("failed to read {}", archive.display()))?,
    );
    let sidecar = sidecar_path(&archive);
    fs::write(&sidecar, &sha256).with_context(|| format!("failed to write {}", sidecar.display()))?;

    info!(archive = %archive.display(), patches = entries.len() - 1, "packaged version");
    Ok(PackageSummary {
        archive,
        sha256,
        patches: entries.len() - 1,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{Config, EnvSnapshot};
    use crate::fetch::file_url;

    pub(crate) const FULL_CONFIG: &str = r#"minecraftVersion = "1.20.1"
side = "server"
toolchainVersion = "1.20.1+build.2"

[remapper]
coordinate = "net.neoforged:AutoRenamingTool:2.0.3:all"
url = "https://example.invalid/art.jar"
sha256 = "aa"
args = ["--input={input}", "--output={output}", "--map={mappingsFile}"]

[decompiler]
coordinate = "org.vineflower:vineflower:1.10.1"
url = "https://example.invalid/vf.jar"
sha256 = "bb"
args = ["{input}", "{output}"]
"#;

    fn fetcher() -> Fetcher {
        let snapshot = EnvSnapshot::testing(&[("REMOLD_CACHE_PATH", "/tmp/remold-test-cache")]);
        let config = Config::from_snapshot(&snapshot).unwrap();
        Fetcher::new(config.network()).unwrap()
    }

    fn packaged(root: &Path) -> Result<PackageSummary> {
        let dir = version_dir(root, "1.20.1");
        fs::create_dir_all(dir.join("patches/net/minecraft"))?;
        fs::write(dir.join("patches/net/minecraft/Foo.java.patch"), "--- a/x\n+++ b/x\n")?;
        fs::write(VersionConfig::path_in(&dir), FULL_CONFIG)?;
        package_version(&PackageRequest {
            version_dir: &dir,
            toolchain_version: None,
            output: Some(&root.join("dist/remold.zip")),
        })
    }

    #[test]
    fn package_writes_meta_patches_and_sidecar() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let summary = packaged(temp.path())?;
        assert_eq!(summary.patches, 1);
        let entries = jar::read_entries(&summary.archive)?;
        assert!(entries.contains_key("patches/net/minecraft/Foo.java.patch"));
        let meta = ToolchainMeta::from_json(std::str::from_utf8(&entries[META_FILE_NAME])?)?;
        assert_eq!(meta.toolchain_version, "1.20.1+build.2");
        assert_eq!(meta.remapper_args.len(), 3);
        assert_eq!(
            fs::read_to_string(sidecar_path(&summary.archive))?,
            hash_file(HashAlgorithm::Sha256, &summary.archive)?
        );
        Ok(())
    }

    #[test]
    fn open_from_url_verifies_and_creates_the_directory() -> Result<()> {
        let source = tempfile::tempdir()?;
        let summary = packaged(source.path())?;
        let target = tempfile::tempdir()?;

        let opened = open_version(
            &fetcher(),
            &OpenRequest {
                root: target.path(),
                source: ArchiveSource::parse(&file_url(&summary.archive)?),
                dir_name: None,
                force: false,
            },
        )?;
        assert_eq!(opened.minecraft_version, "1.20.1");
        assert_eq!(opened.patches, 1);
        let dir = version_dir(target.path(), "1.20.1");
        assert_eq!(
            fs::read_to_string(dir.join("patches/net/minecraft/Foo.java.patch"))?,
            "--- a/x\n+++ b/x\n"
        );
        let config = VersionConfig::load(&VersionConfig::path_in(&dir))?;
        assert_eq!(config.minecraft_version(), Some("1.20.1"));
        assert_eq!(config.toolchain_version(), Some("1.20.1+build.2"));
        Ok(())
    }

    #[test]
    fn open_refuses_to_overwrite_without_force() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let summary = packaged(temp.path())?;
        let request = |force| OpenRequest {
            root: temp.path(),
            source: ArchiveSource::Path(summary.archive.clone()),
            dir_name: None,
            force,
        };
        let err = open_version(&fetcher(), &request(false)).unwrap_err();
        assert_eq!(crate::error::classify(&err).map(Error::code), Some("RM501"));
        fs::write(version_dir(temp.path(), "1.20.1").join("stray.txt"), "x")?;
        open_version(&fetcher(), &request(true))?;
        assert!(!version_dir(temp.path(), "1.20.1").join("stray.txt").exists());
        Ok(())
    }

    #[test]
    fn tampered_archive_fails_integrity() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let summary = packaged(temp.path())?;
        fs::write(sidecar_path(&summary.archive), "00".repeat(32))?;
        let err = open_version(
            &fetcher(),
            &OpenRequest {
                root: &temp.path().join("elsewhere"),
                source: ArchiveSource::Path(summary.archive.clone()),
                dir_name: Some("custom"),
                force: false,
            },
        )
        .unwrap_err();
        assert_eq!(crate::error::classify(&err).map(Error::code), Some("RM201"));
        Ok(())
    }

    #[test]
    fn archive_without_metadata_is_malformed() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let archive = temp.path().join("bad.zip");
        jar::write_entries(&archive, [("patches/a.patch", &b""[..])])?;
        let err = open_version(
            &fetcher(),
            &OpenRequest {
                root: temp.path(),
                source: ArchiveSource::Path(archive),
                dir_name: None,
                force: false,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing remold.json"));
        Ok(())
    }

    #[test]
    fn sources_are_told_apart_by_scheme() {
        assert!(matches!(ArchiveSource::parse("https://repo/x.zip"), ArchiveSource::Url(_)));
        assert!(matches!(ArchiveSource::parse("build/x.zip"), ArchiveSource::Path(_)));
    }
}

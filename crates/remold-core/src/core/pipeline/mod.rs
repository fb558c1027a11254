//! The per-version setup chain: manifests, downloads, remap, decompile and
//! patch application, each stage clearing its output before it runs.

pub mod bundle;
pub mod manifests;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use remold_domain::{
    Download, Hash, LibraryArtifact, Side, ToolConfig, ToolRole, VersionConfig, VersionManifest,
};
use serde::Serialize;
use tracing::info;

pub use bundle::{determine_libraries, extract_embedded_jar, extract_libraries, BundledLibrary};
pub use manifests::{catalog_entry, ManifestCache};

use crate::assets::{setup_assets, AssetLocator, AssetsMode, AssetsSetup, EnvLookup, ManagedStore, Platform};
use crate::config::Config;
use crate::effects::ToolRunner;
use crate::error::Error;
use crate::fetch::{FetchRequest, Fetcher};
use crate::fs::ensure_clean;
use crate::patch::{apply_patches, ApplyRequest, PatchMode, PatchRunSummary};
use crate::tools::{Substitutions, ToolDriver, ToolInvocation};

/// Where setup writes its intermediates inside a version directory.
#[derive(Clone, Debug)]
pub struct BuildLayout {
    root: PathBuf,
}

impl BuildLayout {
    pub fn new(version_dir: &Path) -> Self {
        Self {
            root: version_dir.to_path_buf(),
        }
    }

    fn work(&self) -> PathBuf {
        self.root.join("build").join("remold")
    }

    #[must_use]
    pub fn download(&self, side: Side) -> PathBuf {
        self.work().join("download").join(format!("{}.jar", side.as_str()))
    }

    #[must_use]
    pub fn mappings(&self, side: Side) -> PathBuf {
        self.work()
            .join("download")
            .join(format!("{}-mappings.txt", side.as_str()))
    }

    #[must_use]
    pub fn input_jar(&self, side: Side) -> PathBuf {
        self.work().join(format!("{}.jar", side.as_str()))
    }

    #[must_use]
    pub fn libraries_dir(&self) -> PathBuf {
        self.work().join("libraries")
    }

    #[must_use]
    pub fn libraries_list(&self) -> PathBuf {
        self.work().join("libraries.json")
    }

    #[must_use]
    pub fn remapped(&self) -> PathBuf {
        self.work().join("remapped.jar")
    }

    #[must_use]
    pub fn decompiled(&self) -> PathBuf {
        self.work().join("decompiled.jar")
    }

    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.work().join(".tmp")
    }

    #[must_use]
    pub fn reports_dir(&self) -> PathBuf {
        self.work().join("reports")
    }

    #[must_use]
    pub fn assets_info(&self) -> PathBuf {
        self.work().join("assets.json")
    }

    #[must_use]
    pub fn rejects(&self) -> PathBuf {
        self.work().join("failed_patches.zip")
    }

    #[must_use]
    pub fn patches(&self) -> PathBuf {
        self.root.join(crate::migration::PATCHES_DIR)
    }

    #[must_use]
    pub fn working_tree(&self) -> PathBuf {
        self.root.join("src").join("main").join("java")
    }
}

pub struct SetupRequest<'a> {
    pub version_dir: &'a Path,
    pub config: &'a Config,
    pub env: &'a dyn EnvLookup,
    pub runner: &'a dyn ToolRunner,
    pub mode: PatchMode,
    pub assets: AssetsMode,
    /// Require launcher asset indexes to match the manifest digest.
    pub strict_assets: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SetupSummary {
    pub minecraft_version: String,
    pub side: Side,
    pub java_version: u32,
    pub libraries: Vec<String>,
    pub patches: PatchRunSummary,
}

fn input_downloads<'m>(
    manifest: &'m VersionManifest,
    side: Side,
    version: &str,
) -> Result<(&'m Download, &'m Download)> {
    let mappings = manifest.mappings(side).ok_or_else(|| {
        Error::config(format!("{version} publishes no {} mappings", side.as_str()))
    })?;
    Ok((manifest.jar(side), mappings))
}

fn tool_request(tools_dir: &Path, tool: &ToolConfig) -> FetchRequest {
    FetchRequest::new(&tool.spec.url, tools_dir.join(tool.spec.jar_name()))
        .verified(Hash::sha256(&tool.spec.sha256))
}

fn library_requests(libraries_dir: &Path, artifacts: &[&LibraryArtifact]) -> Vec<FetchRequest> {
    artifacts
        .iter()
        .map(|artifact| {
            FetchRequest::new(&artifact.url, libraries_dir.join(&artifact.path))
                .verified(Hash::sha1(&artifact.sha1))
        })
        .collect()
}

/// Build the working tree of one version directory from upstream artifacts.
pub fn setup_version(fetcher: &Fetcher, request: &SetupRequest<'_>) -> Result<SetupSummary> {
    let config_path = VersionConfig::path_in(request.version_dir);
    if !config_path.is_file() {
        return Err(Error::config(format!(
            "{} is not a version directory",
            request.version_dir.display()
        )));
    }
    let version_config = VersionConfig::load(&config_path)?;
    let version = version_config
        .minecraft_version()
        .unwrap_or_default()
        .to_string();
    let side = version_config.side()?;
    let remapper = version_config.tool(ToolRole::Remapper)?;
    let decompiler = version_config.tool(ToolRole::Decompiler)?;
    let layout = BuildLayout::new(request.version_dir);
    let cache = request.config.cache();

    let manifests = ManifestCache::new(cache.jsons_dir());
    let catalog = manifests.catalog(fetcher, &request.config.network().catalog_url)?;
    let entry = catalog_entry(&catalog, &version)?;
    let manifest = manifests.version(fetcher, entry)?;

    let (jar, mappings) = input_downloads(&manifest, side, &version)?;
    fetcher.fetch_all(vec![
        FetchRequest::new(&jar.url, layout.download(side)).verified(jar.hash()),
        FetchRequest::new(&mappings.url, layout.mappings(side)).verified(mappings.hash()),
    ])?;
    info!(version = %version, side = side.as_str(), "downloaded input jar and mappings");

    let input_jar = layout.input_jar(side);
    let (libraries, classpath) = match side {
        Side::Server => {
            let bundle = layout.download(side);
            extract_embedded_jar(&bundle, &input_jar)?;
            let list = determine_libraries(&bundle, &layout.libraries_list())?;
            ensure_clean(&layout.libraries_dir())?;
            let jars = extract_libraries(&bundle, &layout.libraries_dir())?;
            (list.libraries, jars)
        }
        Side::Client => {
            ensure_clean(&input_jar)?;
            fs::copy(layout.download(side), &input_jar)
                .with_context(|| format!("failed to copy {}", input_jar.display()))?;
            let artifacts: Vec<&LibraryArtifact> = manifest.library_artifacts().collect();
            let fetched = fetcher.ensure_all(library_requests(&cache.libraries_dir(), &artifacts))?;
            let names = manifest.libraries.iter().map(|lib| lib.name.clone()).collect();
            (names, fetched.into_iter().map(|artifact| artifact.local_path).collect())
        }
    };

    let remapper_request = tool_request(&cache.tools_dir(), &remapper);
    let decompiler_request = tool_request(&cache.tools_dir(), &decompiler);
    let remapper_jar = remapper_request.destination.clone();
    let decompiler_jar = decompiler_request.destination.clone();
    fetcher.ensure_all(vec![remapper_request, decompiler_request])?;

    let driver = ToolDriver::new(request.config.java(), request.runner);
    let common = Substitutions::new()
        .classpath("inputClasspath", &classpath)
        .path("tempDir", &layout.temp_dir())
        .path("reportsDir", &layout.reports_dir());
    let remapped = layout.remapped();
    driver.invoke(&ToolInvocation {
        name: "remapper",
        jar: &remapper_jar,
        main_class: remapper.spec.main_class.as_deref(),
        args: &remapper.args,
        values: common
            .clone()
            .path("input", &input_jar)
            .path("output", &remapped)
            .path("mappingsFile", &layout.mappings(side))
            .path("remapperFile", &remapper_jar)
            .optional_path("paramsFile", None),
        output: &remapped,
        cwd: request.version_dir,
    })?;
    let decompiled = layout.decompiled();
    driver.invoke(&ToolInvocation {
        name: "decompiler",
        jar: &decompiler_jar,
        main_class: decompiler.spec.main_class.as_deref(),
        args: &decompiler.args,
        values: common.path("input", &remapped).path("output", &decompiled),
        output: &decompiled,
        cwd: request.version_dir,
    })?;

    if side == Side::Client && request.assets != AssetsMode::None {
        let tag = manifest.asset_tag().unwrap_or(entry.id.as_str());
        let index_json = manifests.asset_index(fetcher, tag, &manifest)?;
        let locator =
            AssetLocator::for_platform(Platform::current(), request.env).strict(request.strict_assets);
        setup_assets(
            fetcher,
            &AssetsSetup {
                mode: request.assets,
                manifest: &manifest,
                index_json: &index_json,
                locator: &locator,
                store: &ManagedStore::new(cache.assets_dir()),
                assets_url: &request.config.network().assets_url,
                info_file: &layout.assets_info(),
            },
        )?;
    }

    let patches = apply_patches(&ApplyRequest {
        baseline: &decompiled,
        patches: &layout.patches(),
        output: &layout.working_tree(),
        rejects: &layout.rejects(),
        mode: request.mode,
    })?;
    info!(
        version = %version,
        changed = patches.changed_files,
        failed = patches.failed_files,
        "setup finished"
    );
    Ok(SetupSummary {
        minecraft_version: version,
        side,
        java_version: manifest.java_version.major_version,
        libraries,
        patches,
    })
}

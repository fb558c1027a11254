//! Command entry points: each resolves paths from the workspace, runs one
//! component, and reports an [`ExecutionOutcome`].

use std::path::PathBuf;

use anyhow::Result;
use serde_json::json;

use crate::archive::{open_version, package_version, ArchiveSource, OpenRequest, PackageRequest};
use crate::assets::AssetsMode;
use crate::config::context::CommandContext;
use crate::fetch::Fetcher;
use crate::migration::{migrate_version, validate_dir_name, version_dir};
use crate::patch::{
    apply_patches, rebuild_patches, ApplyRequest, PatchMode, PatchRunSummary, RebuildRequest,
    DEFAULT_IGNORED_PREFIXES,
};
use crate::pipeline::{setup_version, BuildLayout, ManifestCache, SetupRequest};
use crate::update::{update_version, UpdatePolicy};
use crate::ExecutionOutcome;

/// Fuzz options shared by `apply` and `setup`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FuzzOptions {
    /// Minimum window similarity for fuzzy matching.
    pub min_score: Option<f64>,
    /// Context lines that may be ignored at each end of a hunk.
    pub max_fuzz: Option<usize>,
}

impl FuzzOptions {
    pub fn mode(self) -> Result<PatchMode> {
        match (self.min_score, self.max_fuzz) {
            (Some(_), Some(_)) => Err(crate::error::Error::config(
                "fuzzy scoring and max fuzz cannot be combined",
            )),
            (Some(score), None) => PatchMode::fuzzy(score),
            (None, Some(max_fuzz)) => Ok(PatchMode::MaxFuzz { max_fuzz }),
            (None, None) => Ok(PatchMode::Offset),
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpenVersionRequest {
    pub source: String,
    pub dir_name: Option<String>,
    pub force: bool,
}

#[derive(Clone, Debug)]
pub struct MigrateVersionRequest {
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug)]
pub struct ApplyPatchesRequest {
    pub version: String,
    pub fuzz: FuzzOptions,
}

#[derive(Clone, Debug)]
pub struct RebuildPatchesRequest {
    pub version: String,
    pub context: usize,
}

#[derive(Clone, Debug, Default)]
pub struct UpdateVersionRequest {
    pub kind: Option<String>,
    pub latest: bool,
}

#[derive(Clone, Debug)]
pub struct SetupVersionRequest {
    pub version: String,
    pub fuzz: FuzzOptions,
    pub assets: AssetsMode,
    pub strict_assets: bool,
}

#[derive(Clone, Debug)]
pub struct PackageVersionRequest {
    pub version: String,
    pub toolchain_version: Option<String>,
    pub output: Option<PathBuf>,
}

/// Fold component errors into the outcome so callers only see one shape.
fn finish<T>(result: Result<T>, render: impl FnOnce(T) -> ExecutionOutcome) -> ExecutionOutcome {
    match result {
        Ok(value) => render(value),
        Err(err) => ExecutionOutcome::from_error(&err),
    }
}

fn resolve_version(ctx: &CommandContext, name: &str) -> Result<PathBuf> {
    validate_dir_name(name)?;
    let dir = version_dir(&ctx.workspace_root()?, name);
    if !dir.is_dir() {
        return Err(crate::error::Error::config(format!(
            "version directory {} does not exist",
            dir.display()
        )));
    }
    Ok(dir)
}

fn patch_outcome(summary: PatchRunSummary, verb: &str) -> ExecutionOutcome {
    let details = json!({ "summary": &summary });
    if summary.is_success() {
        ExecutionOutcome::success(
            format!("{verb} {} patched files", summary.changed_files),
            details,
        )
    } else {
        let message = summary
            .into_result()
            .err()
            .map_or_else(String::new, |err| err.to_string());
        ExecutionOutcome::failure(message, details)
    }
}

/// Create a version directory from a metadata archive.
pub fn version_open(ctx: &CommandContext, request: &OpenVersionRequest) -> ExecutionOutcome {
    let result = (|| {
        let root = ctx.workspace_root()?;
        let fetcher = Fetcher::new(ctx.config().network())?;
        open_version(
            &fetcher,
            &OpenRequest {
                root: &root,
                source: ArchiveSource::parse(&request.source),
                dir_name: request.dir_name.as_deref(),
                force: request.force,
            },
        )
    })();
    finish(result, |summary| {
        ExecutionOutcome::success(
            format!(
                "opened {} ({} patches) in {}",
                summary.minecraft_version,
                summary.patches,
                summary.dir.display()
            ),
            json!(summary),
        )
    })
}

pub fn version_migrate(ctx: &CommandContext, request: &MigrateVersionRequest) -> ExecutionOutcome {
    let result = ctx
        .workspace_root()
        .and_then(|root| migrate_version(&root, &request.from, &request.to, ctx.git()));
    finish(result, |record| {
        ExecutionOutcome::success(
            format!("migrated {} to {}", record.from, record.to),
            json!(record),
        )
    })
}

/// Reapply the patch set onto the decompiled baseline.
pub fn patches_apply(ctx: &CommandContext, request: &ApplyPatchesRequest) -> ExecutionOutcome {
    let result = (|| {
        let dir = resolve_version(ctx, &request.version)?;
        let layout = BuildLayout::new(&dir);
        apply_patches(&ApplyRequest {
            baseline: &layout.decompiled(),
            patches: &layout.patches(),
            output: &layout.working_tree(),
            rejects: &layout.rejects(),
            mode: request.fuzz.mode()?,
        })
    })();
    finish(result, |summary| patch_outcome(summary, "applied"))
}

/// Capture working tree edits back into the patch directory.
pub fn patches_rebuild(ctx: &CommandContext, request: &RebuildPatchesRequest) -> ExecutionOutcome {
    let result = (|| {
        let dir = resolve_version(ctx, &request.version)?;
        let layout = BuildLayout::new(&dir);
        rebuild_patches(&RebuildRequest {
            context: request.context,
            ignored: DEFAULT_IGNORED_PREFIXES,
            ..RebuildRequest::new(&layout.decompiled(), &layout.working_tree(), &layout.patches())
        })
    })();
    finish(result, |summary| {
        let mut message = format!("rebuilt {} patches", summary.changed_files);
        if !summary.skipped.is_empty() {
            message.push_str(&format!(" ({} binary files skipped)", summary.skipped.len()));
        }
        ExecutionOutcome::success(message, json!(summary))
    })
}

/// Migrate the newest tracked version to the next upstream release.
pub fn version_update(ctx: &CommandContext, request: &UpdateVersionRequest) -> ExecutionOutcome {
    let result = (|| {
        let root = ctx.workspace_root()?;
        let fetcher = Fetcher::new(ctx.config().network())?;
        let catalog = ManifestCache::new(ctx.config().cache().jsons_dir())
            .catalog(&fetcher, &ctx.config().network().catalog_url)?;
        update_version(
            &root,
            &catalog,
            UpdatePolicy {
                kind: request.kind.as_deref(),
                latest: request.latest,
            },
            ctx.git(),
        )
    })();
    finish(result, |record| match record {
        Some(record) => ExecutionOutcome::success(
            format!("updated {} to {}", record.from, record.to),
            json!(record),
        ),
        None => ExecutionOutcome::success("already up to date", json!(null)),
    })
}

/// Download, remap, decompile and patch one version directory.
pub fn version_setup(ctx: &CommandContext, request: &SetupVersionRequest) -> ExecutionOutcome {
    let result = (|| {
        let dir = resolve_version(ctx, &request.version)?;
        let mode = request.fuzz.mode()?;
        let fetcher = Fetcher::new(ctx.config().network())?;
        setup_version(
            &fetcher,
            &SetupRequest {
                version_dir: &dir,
                config: ctx.config(),
                env: ctx.env(),
                runner: ctx.tools(),
                mode,
                assets: request.assets,
                strict_assets: request.strict_assets,
            },
        )
    })();
    finish(result, |summary| {
        let details = json!({ "setup": &summary });
        if summary.patches.is_success() {
            ExecutionOutcome::success(
                format!(
                    "set up {} ({}; {} patched files)",
                    summary.minecraft_version, summary.side, summary.patches.changed_files
                ),
                details,
            )
        } else {
            let mut outcome = patch_outcome(summary.patches, "applied");
            outcome.details = details;
            outcome
        }
    })
}

pub fn version_package(ctx: &CommandContext, request: &PackageVersionRequest) -> ExecutionOutcome {
    let result = resolve_version(ctx, &request.version).and_then(|dir| {
        package_version(&PackageRequest {
            version_dir: &dir,
            toolchain_version: request.toolchain_version.as_deref(),
            output: request.output.as_deref(),
        })
    });
    finish(result, |summary| {
        ExecutionOutcome::success(
            format!("packaged {}", summary.archive.display()),
            json!(summary),
        )
    })
}

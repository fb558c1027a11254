use std::sync::Arc;

use atty::Stream;
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use remold_core::{
    assets::AssetsMode, patches_apply, patches_rebuild, version_migrate, version_open,
    version_package, version_setup, version_update, ApplyPatchesRequest, CommandContext,
    CommandStatus, ExecutionOutcome, FuzzOptions, GlobalOptions, MigrateVersionRequest,
    OpenVersionRequest, PackageVersionRequest, RebuildPatchesRequest, SetupVersionRequest,
    SystemEffects, UpdateVersionRequest,
};
use serde_json::{json, Value};

mod cli;
mod style;

use cli::{AssetsArg, CommandGroupCli, FuzzArgs, RemoldCli};
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = RemoldCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        json: cli.json,
        root: cli.root.clone(),
    };

    let outcome = match CommandContext::new(&global, Arc::new(SystemEffects::new())) {
        Ok(ctx) => dispatch(&ctx, &cli.command),
        Err(err) => ExecutionOutcome::from_error(&err),
    };
    let code = emit_output(&cli, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("remold={level},remold_core={level},remold_cli={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn dispatch(ctx: &CommandContext, group: &CommandGroupCli) -> ExecutionOutcome {
    match group {
        CommandGroupCli::Open(args) => version_open(
            ctx,
            &OpenVersionRequest {
                source: args.source.clone(),
                dir_name: args.dir_name.clone(),
                force: args.force,
            },
        ),
        CommandGroupCli::Setup(args) => version_setup(
            ctx,
            &SetupVersionRequest {
                version: args.version.clone(),
                fuzz: fuzz_options(args.fuzz),
                assets: assets_mode(args.assets),
                strict_assets: args.strict_assets,
            },
        ),
        CommandGroupCli::Migrate(args) => version_migrate(
            ctx,
            &MigrateVersionRequest {
                from: args.from.clone(),
                to: args.to.clone(),
            },
        ),
        CommandGroupCli::Update(args) => version_update(
            ctx,
            &UpdateVersionRequest {
                kind: args.kind.map(|kind| kind.as_str().to_string()),
                latest: args.latest,
            },
        ),
        CommandGroupCli::Package(args) => version_package(
            ctx,
            &PackageVersionRequest {
                version: args.version.clone(),
                toolchain_version: args.toolchain_version.clone(),
                output: args.output.clone(),
            },
        ),
        CommandGroupCli::Apply(args) => patches_apply(
            ctx,
            &ApplyPatchesRequest {
                version: args.version.clone(),
                fuzz: fuzz_options(args.fuzz),
            },
        ),
        CommandGroupCli::Rebuild(args) => patches_rebuild(
            ctx,
            &RebuildPatchesRequest {
                version: args.version.clone(),
                context: args.context,
            },
        ),
    }
}

fn fuzz_options(args: FuzzArgs) -> FuzzOptions {
    FuzzOptions {
        min_score: args.fuzzy,
        max_fuzz: args.max_fuzz,
    }
}

fn assets_mode(arg: AssetsArg) -> AssetsMode {
    match arg {
        AssetsArg::Auto => AssetsMode::Auto,
        AssetsArg::Downloaded => AssetsMode::Downloaded,
        AssetsArg::None => AssetsMode::None,
    }
}

fn exit_code(status: CommandStatus) -> i32 {
    match status {
        CommandStatus::Ok => 0,
        CommandStatus::UserError => 1,
        CommandStatus::Failure => 2,
    }
}

fn status_label(status: CommandStatus) -> &'static str {
    match status {
        CommandStatus::Ok => "ok",
        CommandStatus::UserError => "user-error",
        CommandStatus::Failure => "failure",
    }
}

fn emit_output(cli: &RemoldCli, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = exit_code(outcome.status);
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = json!({
            "status": status_label(outcome.status),
            "message": outcome.message,
            "details": outcome.details,
        });
        let rendered =
            serde_json::to_string_pretty(&payload).map_err(|err| eyre!("{err}"))?;
        println!("{rendered}");
    } else if !cli.quiet {
        println!("{}", style.status(outcome.status, &outcome.message));
        for line in patch_lines(&style, &outcome.details) {
            println!("{line}");
        }
        if let Some(rejects) = rejects_path(&outcome.details) {
            println!("{}", style.info(&format!("rejects written to {rejects}")));
        }
    }

    Ok(code)
}

/// Apply reports live under `summary`; setup nests them under `setup.patches`.
fn patch_summary(details: &Value) -> Option<&Value> {
    details
        .get("summary")
        .or_else(|| details.get("setup").and_then(|setup| setup.get("patches")))
}

fn patch_lines(style: &Style, details: &Value) -> Vec<String> {
    let Some(files) = patch_summary(details)
        .and_then(|summary| summary.get("files"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    files
        .iter()
        .filter_map(|file| {
            let path = file.get("path")?.as_str()?;
            let outcome = file.get("outcome")?;
            match outcome.get("status")?.as_str()? {
                "failed" => {
                    let failed = outcome.get("failed_hunks").and_then(Value::as_u64).unwrap_or(0);
                    Some(style.patch_line(true, &format!("{path}: {failed} hunks failed")))
                }
                _ => {
                    let quality = outcome.get("quality")?;
                    let note = match quality.get("match")?.as_str()? {
                        "exact" => match quality.get("offset").and_then(Value::as_i64) {
                            Some(0) | None => return None,
                            Some(offset) => format!("offset {offset}"),
                        },
                        "fuzz" => format!("fuzz {}", quality.get("distance")?),
                        other => format!("{other} {}", quality.get("score")?),
                    };
                    Some(style.patch_line(false, &format!("{path}: {note}")))
                }
            }
        })
        .collect()
}

fn rejects_path(details: &Value) -> Option<&str> {
    let summary = patch_summary(details)?;
    if summary.get("failed_files").and_then(Value::as_u64).unwrap_or(0) == 0 {
        return None;
    }
    summary.get("rejects").and_then(Value::as_str)
}

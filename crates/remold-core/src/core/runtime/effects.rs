use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::debug;

use super::process::{run_command, run_logged, LoggedRun};

/// Version-control operations used when version directories move.
pub trait GitClient: Send + Sync {
    fn is_repository(&self, root: &Path) -> bool;
    /// Stop tracking `path` without touching the working tree.
    fn untrack(&self, root: &Path, path: &str) -> Result<()>;
    fn add(&self, root: &Path, paths: &[&str]) -> Result<()>;
}

/// Launches external tools with all output sent to a log file.
pub trait ToolRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String], cwd: &Path, log: &Path) -> Result<LoggedRun>;
}

pub trait Effects: Send + Sync {
    fn git(&self) -> &dyn GitClient;
    fn tools(&self) -> &dyn ToolRunner;
}

pub struct SystemEffects {
    git: Arc<SystemGit>,
    tools: Arc<SystemToolRunner>,
}

impl SystemEffects {
    #[must_use]
    pub fn new() -> Self {
        Self {
            git: Arc::new(SystemGit),
            tools: Arc::new(SystemToolRunner),
        }
    }
}

impl Default for SystemEffects {
    fn default() -> Self {
        Self::new()
    }
}

impl Effects for SystemEffects {
    fn git(&self) -> &dyn GitClient {
        self.git.as_ref()
    }

    fn tools(&self) -> &dyn ToolRunner {
        self.tools.as_ref()
    }
}

struct SystemGit;

impl SystemGit {
    fn git(root: &Path, args: &[&str]) -> Result<()> {
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        debug!(?args, root = %root.display(), "running git");
        let output = run_command("git", &args, root)?;
        if output.code != 0 {
            bail!("git {} failed: {}", args.join(" "), output.stderr.trim());
        }
        Ok(())
    }
}

impl GitClient for SystemGit {
    fn is_repository(&self, root: &Path) -> bool {
        let args = ["rev-parse".to_string(), "--is-inside-work-tree".to_string()];
        matches!(run_command("git", &args, root), Ok(out) if out.code == 0 && out.stdout.trim() == "true")
    }

    fn untrack(&self, root: &Path, path: &str) -> Result<()> {
        Self::git(root, &["rm", "-r", "--cached", "--quiet", "--ignore-unmatch", path])
    }

    fn add(&self, root: &Path, paths: &[&str]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        Self::git(root, &args)
    }
}

struct SystemToolRunner;

impl ToolRunner for SystemToolRunner {
    fn run(&self, program: &str, args: &[String], cwd: &Path, log: &Path) -> Result<LoggedRun> {
        run_logged(program, args, cwd, log)
    }
}

pub type SharedEffects = Arc<dyn Effects>;

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{Config, EnvSnapshot};
use crate::effects::{self, Effects, SharedEffects};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
    /// Workspace root holding `versions/`; defaults to the current directory.
    pub root: Option<PathBuf>,
}

pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    env: EnvSnapshot,
    config: Config,
    effects: SharedEffects,
}

impl<'a> CommandContext<'a> {
    /// Creates a new command context with the provided global options.
    ///
    /// # Errors
    /// Returns an error if the environment snapshot or configuration cannot be prepared.
    pub fn new(global: &'a GlobalOptions, effects: SharedEffects) -> Result<Self> {
        Self::with_env(global, effects, EnvSnapshot::capture())
    }

    pub fn with_env(
        global: &'a GlobalOptions,
        effects: SharedEffects,
        env: EnvSnapshot,
    ) -> Result<Self> {
        let config = Config::from_snapshot(&env)?;
        Ok(Self {
            global,
            env,
            config,
            effects,
        })
    }

    pub fn effects(&self) -> &dyn Effects {
        self.effects.as_ref()
    }

    pub fn git(&self) -> &dyn effects::GitClient {
        self.effects.git()
    }

    pub fn tools(&self) -> &dyn effects::ToolRunner {
        self.effects.tools()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    /// Workspace root holding `versions/`.
    ///
    /// # Errors
    /// Returns an error if the working directory cannot be inspected.
    pub fn workspace_root(&self) -> Result<PathBuf> {
        match &self.global.root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir().context("unable to read the current directory"),
        }
    }
}

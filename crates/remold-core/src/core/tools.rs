//! External tool driver: the remapper and decompiler are opaque JVM programs
//! launched with a templated argument list.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::config::JavaConfig;
use crate::effects::ToolRunner;
use crate::error::Error;
use crate::fs::ensure_clean;

pub const DEFAULT_MAX_HEAP: &str = "2G";

/// Values for `{name}` placeholders in tool argument templates.
#[derive(Clone, Debug, Default)]
pub struct Substitutions {
    values: BTreeMap<String, String>,
}

impl Substitutions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn value(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn path(self, key: &str, path: &Path) -> Self {
        self.value(key, path.display().to_string())
    }

    /// Optional files render as the literal `null` when absent.
    #[must_use]
    pub fn optional_path(self, key: &str, path: Option<&Path>) -> Self {
        match path {
            Some(path) => self.path(key, path),
            None => self.value(key, "null"),
        }
    }

    #[must_use]
    pub fn classpath(self, key: &str, entries: &[PathBuf]) -> Self {
        let joined = entries
            .iter()
            .map(|entry| entry.display().to_string())
            .collect::<Vec<_>>()
            .join(":");
        self.value(key, joined)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Replace every known `{name}` token in `template`; unknown tokens stay as written.
#[must_use]
pub fn substitute(template: &str, values: &Substitutions) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match values.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[must_use]
pub fn substitute_all(templates: &[String], values: &Substitutions) -> Vec<String> {
    templates
        .iter()
        .map(|template| substitute(template, values))
        .collect()
}

/// One launch of a tool jar.
#[derive(Clone, Debug)]
pub struct ToolInvocation<'a> {
    pub name: &'a str,
    pub jar: &'a Path,
    /// Launch with `-cp <jar> <main_class>` rather than `-jar`.
    pub main_class: Option<&'a str>,
    pub args: &'a [String],
    pub values: Substitutions,
    /// Primary output; cleared before launch, and `<output>.log` receives the tool's output.
    pub output: &'a Path,
    pub cwd: &'a Path,
}

#[derive(Clone, Debug)]
pub struct ToolReport {
    pub code: i32,
    pub log: PathBuf,
    pub log_bytes: u64,
}

pub struct ToolDriver<'a> {
    java: &'a str,
    max_heap: &'a str,
    runner: &'a dyn ToolRunner,
}

impl<'a> ToolDriver<'a> {
    pub fn new(java: &'a JavaConfig, runner: &'a dyn ToolRunner) -> Self {
        Self {
            java: &java.java,
            max_heap: DEFAULT_MAX_HEAP,
            runner,
        }
    }

    /// Log file path for a tool output.
    #[must_use]
    pub fn log_path(output: &Path) -> PathBuf {
        let mut name = output
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".log");
        output.with_file_name(name)
    }

    /// Full JVM argument vector for an invocation.
    #[must_use]
    pub fn command_line(&self, invocation: &ToolInvocation<'_>) -> Vec<String> {
        let mut args = vec![format!("-Xmx{}", self.max_heap)];
        match invocation.main_class {
            Some(main_class) => {
                args.push("-cp".to_string());
                args.push(invocation.jar.display().to_string());
                args.push(main_class.to_string());
            }
            None => {
                args.push("-jar".to_string());
                args.push(invocation.jar.display().to_string());
            }
        }
        args.extend(substitute_all(invocation.args, &invocation.values));
        args
    }

    /// Run the tool once; a non-zero exit is fatal and never retried.
    pub fn invoke(&self, invocation: &ToolInvocation<'_>) -> Result<ToolReport> {
        ensure_clean(invocation.output)?;
        let log = Self::log_path(invocation.output);
        let args = self.command_line(invocation);
        info!(tool = invocation.name, log = %log.display(), "running tool");
        let run = self.runner.run(self.java, &args, invocation.cwd, &log)?;
        if run.code != 0 {
            return Err(Error::ToolExecution {
                tool: invocation.name.to_string(),
                code: run.code,
                log,
            }
            .into());
        }
        if !invocation.output.exists() {
            warn!(
                tool = invocation.name,
                output = %invocation.output.display(),
                "tool succeeded without producing its output"
            );
        }
        Ok(ToolReport {
            code: run.code,
            log,
            log_bytes: run.log_bytes,
        })
    }
}

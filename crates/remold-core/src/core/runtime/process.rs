use std::fs::{self, File};
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Result of a process whose output went to a log file.
#[derive(Debug, Clone)]
pub struct LoggedRun {
    pub code: i32,
    pub log_bytes: u64,
}

/// Execute a program and capture stdout/stderr.
///
/// # Errors
///
/// Returns an error when the program cannot be spawned.
pub fn run_command(program: &str, args: &[String], cwd: &Path) -> Result<RunOutput> {
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("failed to start {program}"))?;
    Ok(RunOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Execute a program with stdout and stderr both appended to `log`.
///
/// # Errors
///
/// Returns an error when the log cannot be created or the program cannot be
/// spawned. A non-zero exit is reported through [`LoggedRun::code`].
pub fn run_logged(program: &str, args: &[String], cwd: &Path, log: &Path) -> Result<LoggedRun> {
    if let Some(parent) = log.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let stdout =
        File::create(log).with_context(|| format!("failed to create {}", log.display()))?;
    let stderr = stdout
        .try_clone()
        .with_context(|| format!("failed to share {}", log.display()))?;

    let status = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .status()
        .with_context(|| format!("failed to start {program}"))?;
    let log_bytes = fs::metadata(log).map(|meta| meta.len()).unwrap_or(0);
    Ok(LoggedRun {
        code: status.code().unwrap_or(-1),
        log_bytes,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn logged_run_captures_both_streams() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let log = temp.path().join("out/tool.log");
        let args = vec!["-c".to_string(), "echo out; echo err 1>&2; exit 3".to_string()];
        let run = run_logged("sh", &args, temp.path(), &log)?;
        assert_eq!(run.code, 3);
        let contents = fs::read_to_string(&log)?;
        assert!(contents.contains("out"));
        assert!(contents.contains("err"));
        assert_eq!(run.log_bytes, contents.len() as u64);
        Ok(())
    }

    #[test]
    fn run_command_captures_output() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let output = run_command("sh", &["-c".into(), "printf hi".into()], temp.path())?;
        assert_eq!(output.code, 0);
        assert_eq!(output.stdout, "hi");
        Ok(())
    }
}

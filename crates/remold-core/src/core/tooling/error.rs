use std::path::PathBuf;

/// Failure classes surfaced by every component.
///
/// Components raise these through `anyhow` and callers classify them with
/// `downcast_ref::<Error>()`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("[RM101] failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("[RM201] hash mismatch for {target} (expected {expected}, found {actual})")]
    Integrity {
        target: String,
        expected: String,
        actual: String,
    },
    #[error("[RM301] {tool} exited with status {code}; see {}", log.display())]
    ToolExecution {
        tool: String,
        code: i32,
        log: PathBuf,
    },
    #[error("[RM401] {failed} of {total} patched files failed to apply; rejects in {}", rejects.display())]
    PatchFailure {
        failed: usize,
        total: usize,
        rejects: PathBuf,
    },
    #[error("[RM501] {0}")]
    Config(String),
}

impl Error {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network { .. } => "RM101",
            Self::Integrity { .. } => "RM201",
            Self::ToolExecution { .. } => "RM301",
            Self::PatchFailure { .. } => "RM401",
            Self::Config(_) => "RM501",
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> anyhow::Error {
        anyhow::Error::from(Self::Config(message.into()))
    }

    pub(crate) fn network(url: impl Into<String>, reason: impl ToString) -> anyhow::Error {
        anyhow::Error::from(Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        })
    }
}

/// Find the first typed error in an `anyhow` chain.
pub fn classify(err: &anyhow::Error) -> Option<&Error> {
    err.chain().find_map(|cause| cause.downcast_ref::<Error>())
}

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::{classify, Error};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: CommandStatus,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Ok,
            message: message.into(),
            details,
        }
    }

    pub fn failure(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Failure,
            message: message.into(),
            details,
        }
    }

    pub fn user_error(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::UserError,
            message: message.into(),
            details,
        }
    }

    /// Map a component error to an outcome: configuration problems are the
    /// user's to fix, everything else is a failure.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        match classify(err) {
            Some(typed @ Error::Config(_)) => {
                Self::user_error(message, json!({ "code": typed.code() }))
            }
            Some(typed) => Self::failure(message, json!({ "code": typed.code() })),
            None => Self::failure(message, Value::Null),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    UserError,
    Failure,
}

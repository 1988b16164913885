//! Top-level error type for crew runs
//!
//! Every failure that ends a run surfaces as a [`CrewError`]. Messages shown to
//! the user go through [`sanitize_error_message`] first.

use crate::agent::AgentError;
use crate::config::ConfigError;
use crate::crew::IllegalStateError;
use crate::intake::IntakeError;
use crate::llm::LlmError;
use crate::sink::SinkError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("valid secret pattern")
});
static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("valid path pattern")
});
static BEARER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bearer\s+\S+").expect("valid bearer pattern"));

const MAX_MESSAGE_LEN: usize = 500;

/// Main error type for crew operations
#[derive(Debug, Error)]
pub enum CrewError {
    #[error("Intake error: {0}")]
    Intake(#[from] IntakeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid crew: {0}")]
    InvalidCrew(String),

    #[error("Completion capability unavailable: {0}")]
    Preflight(#[source] LlmError),

    #[error("Task '{task}' (stage {stage}) failed: {source}")]
    TaskFailed {
        task: String,
        stage: usize,
        #[source]
        source: AgentError,
    },

    #[error("Task '{task}' (stage {stage}) result could not be saved: {source}")]
    Persist {
        task: String,
        stage: usize,
        #[source]
        source: SinkError,
    },

    #[error("Output directory could not be prepared: {0}")]
    Prepare(#[source] SinkError),

    #[error("Illegal state: {0}")]
    IllegalState(#[from] IllegalStateError),
}

impl CrewError {
    /// 1-based stage of the task the error belongs to, if any
    pub fn stage(&self) -> Option<usize> {
        match self {
            CrewError::TaskFailed { stage, .. } | CrewError::Persist { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Message safe to print or log
    pub fn user_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

/// Redact secrets and sensitive paths, and cap the length at 500 bytes
pub fn sanitize_error_message(message: &str) -> String {
    let sanitized = SECRET_PATTERN.replace_all(message, "${1}=***");
    let sanitized = BEARER_PATTERN.replace_all(&sanitized, "Bearer ***");
    let mut sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .into_owned();

    if sanitized.len() > MAX_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(truncate_suffix);
    }

    sanitized
}

/// Result type for crew operations
pub type CrewResult<T> = Result<T, CrewError>;

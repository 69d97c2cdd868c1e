//! Error taxonomy for the guard.
//!
//! Policy denials (locked context, blocked verb, exhausted delete exceptions)
//! are not errors: they are [`RuleMatch`](crate::eval::RuleMatch) values with
//! [`Decision::Deny`](crate::eval::Decision::Deny). The variants here cover
//! document I/O, state the guard refuses to trust, and infrastructure faults.

use thiserror::Error;

use crate::discovery::DiscoveryError;

pub type Result<T> = std::result::Result<T, GuardError>;

#[derive(Debug, Error)]
pub enum GuardError {
    /// The lock document could not be read or parsed.
    #[error("failed to read lock config {path}: {reason}")]
    ConfigRead { path: String, reason: String },

    /// The lock document could not be serialized or written.
    #[error("failed to write lock config {path}: {reason}")]
    ConfigWrite { path: String, reason: String },

    /// A context record exists with no status. It has already been locked.
    #[error("context '{0}' has no status set, so it has been set to 'locked' for safety")]
    UnsafeState(String),

    /// The unlock window elapsed. The context has already been re-locked.
    #[error(
        "unlock for context '{context}' has expired (times out after {timeout}), status set back to 'locked'"
    )]
    ExpiredUnlock { context: String, timeout: String },

    #[error("profile '{profile}' not found. Please add it, or change the profile for context '{context}'")]
    ProfileNotFound { profile: String, context: String },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("malformed duration '{value}': {reason}")]
    MalformedDuration { value: String, reason: String },

    #[error("malformed unlock timestamp '{value}': {reason}")]
    MalformedTimestamp { value: String, reason: String },

    /// Neither an explicit `--context` nor a kubeconfig current-context was found.
    #[error("no kubectl context found")]
    NoContext,

    #[error("failed to run '{command}': {reason}")]
    Exec { command: String, reason: String },
}

impl GuardError {
    /// True for errors that were raised after the context was forced to
    /// `locked`. Callers turn these into a deny verdict instead of aborting.
    pub fn is_forced_lock(&self) -> bool {
        matches!(
            self,
            GuardError::UnsafeState(_) | GuardError::ExpiredUnlock { .. }
        )
    }
}

/// Parse a humantime duration (`10s`, `1h`, `1h30m`).
pub fn parse_duration(value: &str) -> Result<std::time::Duration> {
    humantime::parse_duration(value.trim()).map_err(|e| GuardError::MalformedDuration {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

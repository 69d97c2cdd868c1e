//! kube-lock: a kubectl wrapper that gates commands per context.
//!
//! Each kubectl context has a status: `locked` (nothing passes),
//! `unlocked` (everything passes, optionally for a limited time), or the
//! name of a profile whose blocked verbs and delete exceptions decide what
//! passes. Commands are evaluated to [`eval::Decision::Allow`] or
//! [`eval::Decision::Deny`] before anything reaches the cluster.
//!
//! # Architecture
//!
//! - **[`parse`]**: Verb/resource extraction from kubectl argument lists, shlex helpers.
//! - **[`discovery`]**: Resource kind catalogs per API group and the delete-exception matcher.
//! - **[`eval`]**: Decision types, profile rules, and the [`Guard`](crate::eval::Guard) entry point.
//! - **[`state`]**: Lock document model, its store, and the lock state machine.
//! - **[`config`]**: Tool settings: embedded defaults + user overlay merge.
//! - **[`target`]**: Which context a command is aimed at.
//! - **[`exec`]**: Forwarding allowed commands to kubectl.
//! - **[`logging`]**: Process logger and decision log at `~/.local/share/kube-lock/decisions.log`.

/// Tool settings, loading, and overlay merge logic.
pub mod config;
/// Resource discovery catalogs, caching, and exception matching.
pub mod discovery;
/// Error taxonomy shared by every module.
pub mod error;
/// Evaluation engine: guard, profile rules, decision types.
pub mod eval;
/// Running kubectl for allowed commands.
pub mod exec;
/// Process logging and the file-based decision log.
pub mod logging;
/// kubectl argument parsing.
pub mod parse;
/// Lock document, persistence, and the per-context state machine.
pub mod state;
/// Active context resolution.
pub mod target;

pub use error::{GuardError, Result};

use discovery::DiscoverySource;
use eval::RuleMatch;
use state::ConfigStore;

/// Evaluate a kubectl argument list for `target` with the default settings.
///
/// This is the main entry point for tests and embedding.
/// The CLI loads user settings and builds a [`eval::Guard`] directly.
pub fn authorize(
    store: &dyn ConfigStore,
    discovery: &dyn DiscoverySource,
    target: &str,
    args: &[String],
) -> Result<RuleMatch> {
    let config = config::Config::default_config();
    eval::Guard::new(store, discovery, &config).evaluate(target, args)
}

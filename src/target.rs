//! Resolve which kubectl context a command is aimed at.

use std::process::{Command, Stdio};

use crate::error::{GuardError, Result};
use crate::parse::join_args;

/// The value of `--context` in a kubectl argument list, in either the
/// spaced or the `=` form. The last occurrence wins, as in kubectl.
/// Arguments after a bare `--` belong to the remote command and are not
/// searched.
pub fn context_from_args(args: &[String]) -> Option<String> {
    let mut found = None;
    let mut iter = args.iter().take_while(|arg| arg.as_str() != "--");
    while let Some(arg) = iter.next() {
        if arg == "--context" {
            if let Some(value) = iter.next() {
                found = Some(value.clone());
            }
        } else if let Some(value) = arg.strip_prefix("--context=") {
            found = Some(value.to_string());
        }
    }
    found.filter(|c| !c.is_empty())
}

/// Ask kubectl for the kubeconfig's current context.
pub fn current_context(kubectl: &[String]) -> Result<String> {
    let Some((program, base_args)) = kubectl.split_first() else {
        return Err(GuardError::NoContext);
    };
    let output = Command::new(program)
        .args(base_args)
        .args(["config", "current-context"])
        .stdin(Stdio::null())
        .output()
        .map_err(|e| GuardError::Exec {
            command: join_args(kubectl),
            reason: e.to_string(),
        })?;

    let context = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() || context.is_empty() {
        log::debug!(
            "current-context lookup failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Err(GuardError::NoContext);
    }
    Ok(context)
}

/// Explicit override first, then `--context` in the kubectl arguments, then
/// the kubeconfig current context.
pub fn resolve(explicit: Option<&str>, args: &[String], kubectl: &[String]) -> Result<String> {
    if let Some(context) = explicit.filter(|c| !c.is_empty()) {
        return Ok(context.to_string());
    }
    if let Some(context) = context_from_args(args) {
        return Ok(context);
    }
    current_context(kubectl)
}

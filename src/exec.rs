//! Forward an allowed command to kubectl.

use std::process::Command;

use crate::error::{GuardError, Result};
use crate::parse::join_args;

/// Run `kubectl <args>` with inherited stdio and return its exit code.
/// A child killed by a signal reports 1.
pub fn run(kubectl: &[String], args: &[String]) -> Result<i32> {
    let exec_error = |reason: String| GuardError::Exec {
        command: join_args(kubectl),
        reason,
    };
    let Some((program, base_args)) = kubectl.split_first() else {
        return Err(exec_error("no kubectl command configured".into()));
    };

    log::debug!("running {} {}", join_args(kubectl), join_args(args));
    let status = Command::new(program)
        .args(base_args)
        .args(args)
        .status()
        .map_err(|e| exec_error(e.to_string()))?;

    Ok(status.code().unwrap_or(1))
}

/// Make sure the forwarded arguments address `context`, so kubectl runs
/// against the context that was authorized.
pub fn pin_context(args: &[String], context: &str) -> Vec<String> {
    if crate::target::context_from_args(args).is_some() {
        return args.to_vec();
    }
    let mut pinned = vec!["--context".to_string(), context.to_string()];
    pinned.extend_from_slice(args);
    pinned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::split_command;

    #[test]
    fn pin_adds_missing_context() {
        let args = split_command("get pods");
        assert_eq!(pin_context(&args, "prod"), split_command("--context prod get pods"));
    }

    #[test]
    fn pin_keeps_existing_context() {
        let args = split_command("get pods --context=dev");
        assert_eq!(pin_context(&args, "prod"), args);
    }

    #[test]
    fn pin_ignores_context_of_remote_command() {
        let args = split_command("exec web -- printenv --context dev");
        assert_eq!(
            pin_context(&args, "prod"),
            split_command("--context prod exec web -- printenv --context dev")
        );
    }

    #[test]
    fn empty_command_is_exec_error() {
        assert!(matches!(run(&[], &[]), Err(GuardError::Exec { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn relays_exit_code() {
        let sh = split_command("sh -c");
        assert_eq!(run(&sh, &["exit 3".to_string()]).unwrap(), 3);
    }
}

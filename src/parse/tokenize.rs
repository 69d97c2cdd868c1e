/// Split a configured command string (e.g. `"minikube kubectl --"`) into words
/// using shlex (POSIX word splitting).
pub fn split_command(command: &str) -> Vec<String> {
    shlex::split(command).unwrap_or_else(|| {
        // Fallback: simple whitespace splitting if shlex can't parse
        command.split_whitespace().map(String::from).collect()
    })
}

/// Render an argument vector as a single shell-quoted line for log output.
pub fn join_args<S: AsRef<str>>(args: &[S]) -> String {
    shlex::try_join(args.iter().map(AsRef::as_ref)).unwrap_or_else(|_| {
        // Arguments containing NUL can't be quoted; show them raw
        args.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ")
    })
}

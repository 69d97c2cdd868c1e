//! Types produced by the command parser and consumed by the eval layer.

/// The verb and resource extracted from a pass-through kubectl argument list.
///
/// Both fields are empty strings when the argument list has no such
/// positional. `resource` is only captured for verbs that need resource-level
/// checks (by default just `delete`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    pub verb: String,
    pub resource: String,
}

impl ParsedCommand {
    pub fn new(verb: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            resource: resource.into(),
        }
    }
}

/// How the parser classified a single argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Flag whose value is the next argument (`--namespace kube-system`, `-n x`).
    SpacedFlag,
    /// Configured boolean flag that takes no value (`--all`, `--force`).
    BoolFlag,
    /// Flag carrying its own value, or a flag cluster (`--output=yaml`, `-oyaml`).
    InlineFlag,
    /// Anything that is not a flag.
    Positional,
}

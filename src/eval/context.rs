use crate::parse::{CommandParser, ParsedCommand, join_args};

/// Context for evaluating one pass-through kubectl invocation.
#[derive(Debug)]
pub struct CommandContext<'a> {
    /// The kubectl context the command is aimed at.
    pub target: &'a str,
    /// The arguments that will be forwarded to kubectl.
    pub args: &'a [String],
    /// Verb and resource extracted from `args`.
    pub parsed: ParsedCommand,
}

impl<'a> CommandContext<'a> {
    pub fn from_args(target: &'a str, args: &'a [String], parser: &CommandParser) -> Self {
        Self {
            target,
            args,
            parsed: parser.parse(args),
        }
    }

    pub fn verb(&self) -> &str {
        &self.parsed.verb
    }

    pub fn resource(&self) -> &str {
        &self.parsed.resource
    }

    /// The forwarded command as a single quoted line.
    pub fn display(&self) -> String {
        join_args(self.args)
    }
}

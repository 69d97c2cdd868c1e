//! Best-effort extraction of the verb and resource from a kubectl argument list.
//!
//! The parser has no knowledge of kubectl's real flag schema. It skips flags
//! with a handful of syntactic rules and treats the list of value-less
//! (boolean) flags as configuration, so a flag it misjudges can be fixed by
//! operators without a rebuild. Flags never end up in `verb` or `resource`.

use super::types::{ParsedCommand, TokenKind};
use crate::config::ParserConfig;

/// The only verb that needs the resource token by default.
pub const DELETE_VERB: &str = "delete";

#[derive(Debug, Clone, Default)]
pub struct CommandParser {
    /// Flags that take no value, so the following token is not skipped.
    bool_flags: Vec<String>,
    /// Capture the resource for every verb, not just `delete`.
    resource_for_all_verbs: bool,
}

impl CommandParser {
    pub fn new(bool_flags: Vec<String>) -> Self {
        Self {
            bool_flags,
            resource_for_all_verbs: false,
        }
    }

    pub fn from_config(config: &ParserConfig) -> Self {
        Self {
            bool_flags: config.bool_flags.clone(),
            resource_for_all_verbs: config.resource_for_all_verbs,
        }
    }

    pub fn with_resource_for_all_verbs(mut self, enabled: bool) -> Self {
        self.resource_for_all_verbs = enabled;
        self
    }

    /// Classify one argument.
    ///
    /// Order matters: boolean flags are matched before the generic
    /// space-separated forms, and a bare `-` counts as a long flag.
    pub fn classify(&self, arg: &str) -> TokenKind {
        if self.bool_flags.iter().any(|f| f == arg) {
            return TokenKind::BoolFlag;
        }
        if arg.starts_with("--") && !arg.contains('=') {
            return TokenKind::SpacedFlag;
        }
        if arg == "-" {
            return TokenKind::SpacedFlag;
        }
        if arg.starts_with('-') && arg.len() == 2 && !arg.contains('=') {
            return TokenKind::SpacedFlag;
        }
        if arg.starts_with('-') {
            return TokenKind::InlineFlag;
        }
        TokenKind::Positional
    }

    fn wants_resource(&self, verb: &str) -> bool {
        self.resource_for_all_verbs || verb == DELETE_VERB
    }

    /// Extract the first positional as the verb and, for verbs that need it,
    /// the second positional as the resource. Never fails.
    pub fn parse<S: AsRef<str>>(&self, args: &[S]) -> ParsedCommand {
        let mut parsed = ParsedCommand::default();
        let mut skip_next = false;

        for arg in args.iter().map(AsRef::as_ref) {
            if skip_next {
                log::debug!("'{arg}' is the value of the previous flag, skipping");
                skip_next = false;
                continue;
            }

            match self.classify(arg) {
                TokenKind::SpacedFlag => {
                    log::debug!("'{arg}' is a flag with a space separator, skipping the next string");
                    skip_next = true;
                    continue;
                }
                TokenKind::BoolFlag => {
                    log::debug!("'{arg}' is a boolean flag, skipping");
                    continue;
                }
                TokenKind::InlineFlag => {
                    log::debug!("'{arg}' is a self-contained flag, skipping");
                    continue;
                }
                TokenKind::Positional => {}
            }

            if parsed.verb.is_empty() {
                parsed.verb = arg.to_string();
                if !self.wants_resource(&parsed.verb) {
                    log::debug!("verb '{arg}' needs no resource, not looking any further");
                    break;
                }
            } else {
                parsed.resource = arg.to_string();
                break;
            }
        }

        parsed
    }
}

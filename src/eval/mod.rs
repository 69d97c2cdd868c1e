pub mod context;
pub mod decision;
pub mod policy;

pub use context::CommandContext;
pub use decision::{Decision, RuleMatch};
pub use policy::PolicyEvaluator;

use chrono::{DateTime, FixedOffset};

use crate::config::Config;
use crate::discovery::DiscoverySource;
use crate::error::Result;
use crate::parse::CommandParser;
use crate::state::{ConfigStore, LockState, Status};

/// Authorizes pass-through kubectl commands for one context.
///
/// Each call loads the lock document, resolves the context's status
/// (persisting any forced transition), and returns the decision.
pub struct Guard<'a> {
    store: &'a dyn ConfigStore,
    discovery: &'a dyn DiscoverySource,
    config: &'a Config,
    parser: CommandParser,
    now: Option<DateTime<FixedOffset>>,
}

impl<'a> Guard<'a> {
    pub fn new(
        store: &'a dyn ConfigStore,
        discovery: &'a dyn DiscoverySource,
        config: &'a Config,
    ) -> Self {
        Self {
            store,
            discovery,
            config,
            parser: CommandParser::from_config(&config.parser),
            now: None,
        }
    }

    /// Evaluate against a fixed instant instead of the wall clock.
    pub fn at(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = Some(now);
        self
    }

    /// Decide whether `args` may be forwarded to kubectl for `target`.
    ///
    /// Unsafe records and expired unlocks come back as DENY after the
    /// context has been saved as `locked`. Errors are reserved for document
    /// I/O, malformed timeout settings and an unusable discovery client.
    pub fn evaluate(&self, target: &str, args: &[String]) -> Result<RuleMatch> {
        let mut state = LockState::load(self.store, self.config)?;
        if let Some(now) = self.now {
            state = state.at(now);
        }

        let resolved = match state.resolve_status(target) {
            Ok(resolved) => resolved,
            Err(e) if e.is_forced_lock() => return Ok(RuleMatch::deny(e.to_string())),
            Err(e) => return Err(e),
        };

        match resolved.status {
            Status::Locked => Ok(RuleMatch::deny(format!("context '{target}' is locked"))),
            Status::Unlocked => {
                match state.enforce_expiry(target, resolved.unlock_timestamp.as_deref()) {
                    Ok(()) => Ok(RuleMatch::allow(format!("context '{target}' is unlocked"))),
                    Err(e) if e.is_forced_lock() => Ok(RuleMatch::deny(e.to_string())),
                    Err(e) => Err(e),
                }
            }
            Status::Profile(name) => {
                let ctx = CommandContext::from_args(target, args, &self.parser);
                log::debug!(
                    "checking '{}' against profile '{name}' (verb '{}', resource '{}')",
                    ctx.display(),
                    ctx.verb(),
                    ctx.resource()
                );
                PolicyEvaluator::new(self.discovery).evaluate(
                    &ctx,
                    &name,
                    state.document().profile(&name),
                )
            }
        }
    }
}

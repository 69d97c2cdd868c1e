//! Profile rules: blocked verbs and delete exceptions.

use super::context::CommandContext;
use super::decision::RuleMatch;
use crate::discovery::{DiscoverySource, matches_exception, resource_kind};
use crate::error::{GuardError, Result};
use crate::parse::command::DELETE_VERB;
use crate::state::Profile;

/// Evaluation order:
/// 1. Unknown profile → DENY
/// 2. Verb not blocked → ALLOW
/// 3. Blocked verb other than `delete` → DENY
/// 4. `delete` → ALLOW on the first matching delete exception, else DENY
pub struct PolicyEvaluator<'a> {
    discovery: &'a dyn DiscoverySource,
}

impl<'a> PolicyEvaluator<'a> {
    pub fn new(discovery: &'a dyn DiscoverySource) -> Self {
        Self { discovery }
    }

    /// Only a client-level discovery failure is an error; every policy
    /// outcome, including a missing profile, is a [`RuleMatch`].
    pub fn evaluate(
        &self,
        ctx: &CommandContext,
        profile_name: &str,
        profile: Option<&Profile>,
    ) -> Result<RuleMatch> {
        let Some(profile) = profile else {
            let err = GuardError::ProfileNotFound {
                profile: profile_name.to_string(),
                context: ctx.target.to_string(),
            };
            return Ok(RuleMatch::deny(err.to_string()));
        };

        let verb = ctx.verb();
        if !profile.blocks(verb) {
            return Ok(RuleMatch::allow(format!(
                "verb '{verb}' is authorized with profile '{}'",
                profile.name
            )));
        }

        if verb != DELETE_VERB {
            return Ok(RuleMatch::deny(format!(
                "context '{}' has status '{}' which is not authorized to '{verb}' resources",
                ctx.target, profile.name
            )));
        }

        log::debug!("delete exceptions must be checked, continuing...");
        let resource = ctx.resource();
        for exception in &profile.delete_exceptions {
            if matches_exception(self.discovery, resource, exception)? {
                return Ok(RuleMatch::allow(format!(
                    "delete exceptions in profile '{}' allow deleting '{}'",
                    profile.name,
                    plural(&resource_kind(resource))
                )));
            }
            log::debug!(
                "delete exception '{}' does not match any resources in group '{}'",
                exception.resource,
                exception.group
            );
        }

        let reason = if resource.is_empty() {
            format!(
                "profile '{}' blocks 'delete' and no resource was given to match against its delete exceptions",
                profile.name
            )
        } else {
            format!(
                "delete exceptions in profile '{}' do not allow deleting '{}'",
                profile.name,
                plural(&resource_kind(resource))
            )
        };
        Ok(RuleMatch::deny(reason))
    }
}

/// English plural of a resource kind, for messages only.
fn plural(word: &str) -> String {
    if word.is_empty() || word.ends_with('s') {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix('y')
        && !stem.ends_with(['a', 'e', 'i', 'o', 'u'])
    {
        return format!("{stem}ies");
    }
    if word.ends_with('x') || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{word}es");
    }
    format!("{word}s")
}

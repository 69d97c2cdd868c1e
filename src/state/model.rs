//! The lock document: contexts, profiles and the global timeout policy.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Reserved status values. Any other non-empty status names a profile.
pub const LOCKED: &str = "locked";
pub const UNLOCKED: &str = "unlocked";

/// Current status of a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Locked,
    Unlocked,
    /// Commands are checked against the named profile.
    Profile(String),
}

impl Status {
    /// Map a stored status string to a status. Empty (or blank) is `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "" => None,
            LOCKED => Some(Status::Locked),
            UNLOCKED => Some(Status::Unlocked),
            other => Some(Status::Profile(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Status::Locked => LOCKED,
            Status::Unlocked => UNLOCKED,
            Status::Profile(name) => name,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn status_or_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Status>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Status::from_name))
}

/// One kubectl context known to the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    /// `None` when the record has no usable status; such a record is unsafe.
    #[serde(
        default,
        deserialize_with = "status_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<Status>,
    /// RFC 3339 instant of the last `locked` → `unlocked` transition, kept
    /// only while an unlock timeout is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_timestamp: Option<String>,
}

impl Target {
    pub fn new(name: impl Into<String>, status: Status) -> Self {
        Self {
            name: name.into(),
            status: Some(status),
            unlock_timestamp: None,
        }
    }
}

/// A delete exception: deleting this resource kind is allowed even when the
/// profile blocks `delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteException {
    /// API group-version as served by discovery (`v1`, `cert-manager.io/v1`).
    pub group: String,
    /// Canonical (plural) resource name (`pods`, `certificates`).
    pub resource: String,
}

impl DeleteException {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for DeleteException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.resource, self.group)
    }
}

/// Named authorization policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub blocked_verbs: Vec<String>,
    /// Checked in order; the first match wins.
    #[serde(default)]
    pub delete_exceptions: Vec<DeleteException>,
}

impl Profile {
    pub fn blocks(&self, verb: &str) -> bool {
        self.blocked_verbs.iter().any(|v| v == verb)
    }
}

/// The whole persisted document. Loaded once per invocation and written back
/// as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockDocument {
    /// Profile given to newly seen contexts.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_profile: String,
    /// Humantime duration after which an unlock expires. Empty disables expiry.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unlock_timeout_period: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<Target>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<Profile>,
}

impl LockDocument {
    pub fn timeout_armed(&self) -> bool {
        !self.unlock_timeout_period.trim().is_empty()
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.contexts.iter().find(|c| c.name == name)
    }

    pub(crate) fn target_index(&self, name: &str) -> Option<usize> {
        self.contexts.iter().position(|c| c.name == name)
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_reserved_names() {
        assert_eq!(Status::from_name("locked"), Some(Status::Locked));
        assert_eq!(Status::from_name("unlocked"), Some(Status::Unlocked));
        assert_eq!(
            Status::from_name("protected"),
            Some(Status::Profile("protected".into()))
        );
    }

    #[test]
    fn blank_status_is_none() {
        assert_eq!(Status::from_name(""), None);
        assert_eq!(Status::from_name("  "), None);
    }

    #[test]
    fn document_parses_from_toml() {
        let doc: LockDocument = toml::from_str(
            r#"
            default_profile = "protected"
            unlock_timeout_period = "1h"

            [[contexts]]
            name = "prod"
            status = "locked"

            [[contexts]]
            name = "dev"
            status = "unlocked"
            unlock_timestamp = "2026-10-15T09:00:00+00:00"

            [[contexts]]
            name = "broken"
            status = ""

            [[profiles]]
            name = "protected"
            blocked_verbs = ["delete", "apply"]

            [[profiles.delete_exceptions]]
            group = "v1"
            resource = "pods"
        "#,
        )
        .unwrap();

        assert!(doc.timeout_armed());
        assert_eq!(doc.target("prod").unwrap().status, Some(Status::Locked));
        assert_eq!(
            doc.target("dev").unwrap().unlock_timestamp.as_deref(),
            Some("2026-10-15T09:00:00+00:00")
        );
        assert_eq!(doc.target("broken").unwrap().status, None);
        let profile = doc.profile("protected").unwrap();
        assert!(profile.blocks("apply"));
        assert_eq!(profile.delete_exceptions, vec![DeleteException::new("v1", "pods")]);
    }

    #[test]
    fn missing_status_is_none() {
        let doc: LockDocument = toml::from_str(
            r#"
            [[contexts]]
            name = "bare"
        "#,
        )
        .unwrap();
        assert_eq!(doc.target("bare").unwrap().status, None);
    }

    #[test]
    fn empty_document_serializes_empty() {
        let out = toml::to_string(&LockDocument::default()).unwrap();
        assert!(out.trim().is_empty());
    }

    #[test]
    fn profile_status_survives_save() {
        let mut doc = LockDocument::default();
        doc.contexts
            .push(Target::new("staging", Status::Profile("protected".into())));
        let out = toml::to_string(&doc).unwrap();
        let back: LockDocument = toml::from_str(&out).unwrap();
        assert_eq!(back, doc);
    }
}

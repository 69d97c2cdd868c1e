//! Resource discovery: the catalog of resource kinds served per API group,
//! and the matcher that decides whether a command-line resource token names
//! the kind a delete exception refers to.

pub mod cache;
pub mod kubectl;

pub use cache::CachedDiscovery;
pub use kubectl::KubectlDiscovery;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;
use crate::state::DeleteException;

/// One resource kind in an API group, as served by the discovery API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCatalogEntry {
    /// Canonical plural name (`pods`).
    pub name: String,
    #[serde(default)]
    pub singular_name: String,
    #[serde(default)]
    pub short_names: Vec<String>,
    #[serde(default)]
    pub verbs: Vec<String>,
    #[serde(default)]
    pub kind: String,
}

impl ResourceCatalogEntry {
    /// Whether `token` (already normalized) refers to this kind.
    ///
    /// The verb list is part of the check: a token equal to one of the
    /// kind's verbs counts as a match.
    pub fn answers_to(&self, token: &str) -> bool {
        self.name == token
            || self.singular_name == token
            || self.short_names.iter().any(|s| s == token)
            || self.verbs.iter().any(|v| v == token)
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The catalog for one group could not be fetched. Other groups may
    /// still answer.
    #[error("couldn't get the resource list for group version '{group}': {reason}")]
    Group { group: String, reason: String },

    /// No catalog can be fetched at all.
    #[error("discovery client unavailable: {0}")]
    Client(String),
}

/// Upstream catalog of resource kinds, keyed by API group-version.
pub trait DiscoverySource {
    fn list_resource_kinds(
        &self,
        group: &str,
    ) -> std::result::Result<Vec<ResourceCatalogEntry>, DiscoveryError>;
}

/// Reduce a command-line resource token to the kind it names:
/// `pods/web-0` → `pods`, `Pod` → `pod`.
pub fn resource_kind(token: &str) -> String {
    let kind = token.split_once('/').map_or(token, |(kind, _)| kind);
    kind.trim().to_ascii_lowercase()
}

/// Does `resource` name the kind configured in `exception`?
///
/// A group whose catalog can't be fetched is no match (logged, not an
/// error), so later exceptions still get their turn. A client-level failure
/// propagates.
pub fn matches_exception(
    source: &dyn DiscoverySource,
    resource: &str,
    exception: &DeleteException,
) -> Result<bool> {
    let token = resource_kind(resource);
    if token.is_empty() {
        return Ok(false);
    }

    let catalog = match source.list_resource_kinds(&exception.group) {
        Ok(catalog) => catalog,
        Err(e @ DiscoveryError::Group { .. }) => {
            log::debug!("{e}");
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    for entry in catalog.iter().filter(|e| e.name == exception.resource) {
        if entry.answers_to(&token) {
            log::debug!("resource '{resource}' matches a string in resource '{}'", entry.name);
            return Ok(true);
        }
        log::debug!(
            "resource '{resource}' does not match any strings in resource '{}'",
            entry.name
        );
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuardError;
    use std::collections::HashMap;

    struct Catalog(HashMap<&'static str, Vec<ResourceCatalogEntry>>);

    impl DiscoverySource for Catalog {
        fn list_resource_kinds(
            &self,
            group: &str,
        ) -> std::result::Result<Vec<ResourceCatalogEntry>, DiscoveryError> {
            self.0.get(group).cloned().ok_or_else(|| DiscoveryError::Group {
                group: group.to_string(),
                reason: "the server could not find the requested resource".into(),
            })
        }
    }

    struct Offline;

    impl DiscoverySource for Offline {
        fn list_resource_kinds(
            &self,
            _group: &str,
        ) -> std::result::Result<Vec<ResourceCatalogEntry>, DiscoveryError> {
            Err(DiscoveryError::Client("kubectl not found".into()))
        }
    }

    fn pods() -> ResourceCatalogEntry {
        ResourceCatalogEntry {
            name: "pods".into(),
            singular_name: "pod".into(),
            short_names: vec!["po".into()],
            verbs: vec!["delete".into(), "get".into(), "list".into()],
            kind: "Pod".into(),
        }
    }

    fn catalog() -> Catalog {
        let services = ResourceCatalogEntry {
            name: "services".into(),
            singular_name: "service".into(),
            short_names: vec!["svc".into()],
            verbs: vec!["get".into()],
            kind: "Service".into(),
        };
        Catalog(HashMap::from([("v1", vec![pods(), services])]))
    }

    fn matches(resource: &str) -> bool {
        matches_exception(&catalog(), resource, &DeleteException::new("v1", "pods")).unwrap()
    }

    #[test]
    fn canonical_name() {
        assert!(matches("pods"));
    }

    #[test]
    fn singular_name() {
        assert!(matches("pod"));
    }

    #[test]
    fn short_name() {
        assert!(matches("po"));
    }

    #[test]
    fn slash_form() {
        assert!(matches("pods/web-0"));
        assert!(matches("pod/web-0"));
    }

    #[test]
    fn case_insensitive() {
        assert!(matches("Pod"));
    }

    #[test]
    fn verb_token_matches() {
        assert!(matches("list"));
    }

    #[test]
    fn other_kind_in_same_group() {
        assert!(!matches("svc"));
        assert!(!matches("services"));
    }

    #[test]
    fn empty_resource() {
        assert!(!matches(""));
    }

    #[test]
    fn missing_group_is_no_match() {
        let exception = DeleteException::new("cert-manager.io/v1", "certificates");
        assert!(!matches_exception(&catalog(), "certificates", &exception).unwrap());
    }

    #[test]
    fn client_failure_propagates() {
        let err =
            matches_exception(&Offline, "pods", &DeleteException::new("v1", "pods")).unwrap_err();
        assert!(matches!(err, GuardError::Discovery(DiscoveryError::Client(_))));
    }

    #[test]
    fn entry_parses_from_api_resource_list() {
        let entry: ResourceCatalogEntry = serde_json::from_str(
            r#"{"name":"certificates","singularName":"certificate","namespaced":true,
                "kind":"Certificate","verbs":["delete","get"],"shortNames":["cert","certs"]}"#,
        )
        .unwrap();
        assert!(entry.answers_to("certs"));
        assert!(entry.answers_to("certificate"));
    }
}

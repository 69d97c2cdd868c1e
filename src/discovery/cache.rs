//! Short-lived on-disk cache in front of a discovery source.
//!
//! One JSON file per group-version under the cache directory. Entries older
//! than the TTL are refetched. Cache I/O failures are never fatal.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::{DiscoveryError, DiscoverySource, ResourceCatalogEntry};
use crate::state::store::write_atomic;

pub struct CachedDiscovery<S> {
    inner: S,
    dir: PathBuf,
    ttl: Duration,
}

/// Turn a context or group-version into a safe file name component.
pub fn cache_key(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl<S: DiscoverySource> CachedDiscovery<S> {
    pub fn new(inner: S, dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            inner,
            dir: dir.into(),
            ttl,
        }
    }

    fn entry_path(&self, group: &str) -> PathBuf {
        self.dir.join(format!("{}.json", cache_key(group)))
    }

    fn read_fresh(&self, path: &Path) -> Option<Vec<ResourceCatalogEntry>> {
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age >= self.ttl {
            return None;
        }
        let content = std::fs::read(path).ok()?;
        serde_json::from_slice(&content).ok()
    }

    fn write(&self, path: &Path, catalog: &[ResourceCatalogEntry]) {
        let result = std::fs::create_dir_all(&self.dir).and_then(|_| {
            let body = serde_json::to_vec(catalog).map_err(std::io::Error::other)?;
            write_atomic(path, &body)
        });
        if let Err(e) = result {
            log::debug!("could not cache discovery result at {}: {e}", path.display());
        }
    }
}

impl<S: DiscoverySource> DiscoverySource for CachedDiscovery<S> {
    fn list_resource_kinds(
        &self,
        group: &str,
    ) -> Result<Vec<ResourceCatalogEntry>, DiscoveryError> {
        let path = self.entry_path(group);
        if let Some(catalog) = self.read_fresh(&path) {
            log::debug!("using cached resource list for group version '{group}'");
            return Ok(catalog);
        }
        let catalog = self.inner.list_resource_kinds(group)?;
        self.write(&path, &catalog);
        Ok(catalog)
    }
}

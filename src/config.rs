use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, parse_duration};
use crate::state::{DeleteException, Profile};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

// ── Final (merged) config types ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub seed_profile: SeedProfile,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Settings {
    /// Downstream command line, shlex-split before use.
    #[serde(default)]
    pub kubectl: String,
    #[serde(default)]
    pub new_target_status: NewTargetStatus,
}

/// Status assigned to a context the first time it is referenced.
#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NewTargetStatus {
    /// The lock document's default profile, or `unlocked` when none is set.
    #[default]
    DefaultProfile,
    Unlocked,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ParserConfig {
    #[serde(default)]
    pub bool_flags: Vec<String>,
    #[serde(default)]
    pub resource_for_all_verbs: bool,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct DiscoveryConfig {
    /// Bound on a whole catalog fetch, kubectl startup included (humantime, e.g. `100ms`).
    #[serde(default)]
    pub request_timeout: String,
    /// How long a fetched catalog is reused from disk.
    #[serde(default)]
    pub cache_ttl: String,
    #[serde(default)]
    pub cache_dir: String,
}

impl DiscoveryConfig {
    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration(&self.request_timeout)
    }

    pub fn cache_ttl(&self) -> Result<Duration> {
        parse_duration(&self.cache_ttl)
    }

    /// Cache directory with `~` expanded.
    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.cache_dir).into_owned())
    }
}

/// Profile seeded into an empty lock document.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct SeedProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub blocked_verbs: Vec<String>,
    #[serde(default)]
    pub delete_exceptions: Vec<DeleteException>,
}

impl SeedProfile {
    pub fn to_profile(&self) -> Profile {
        Profile {
            name: self.name.clone(),
            blocked_verbs: self.blocked_verbs.clone(),
            delete_exceptions: self.delete_exceptions.clone(),
        }
    }
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    parser: ParserOverlay,
    #[serde(default)]
    discovery: DiscoveryOverlay,
    #[serde(default)]
    seed_profile: SeedProfileOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    kubectl: Option<String>,
    new_target_status: Option<NewTargetStatus>,
}

#[derive(Debug, Deserialize, Default)]
struct ParserOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    bool_flags: Vec<String>,
    #[serde(default)]
    remove_bool_flags: Vec<String>,
    resource_for_all_verbs: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct DiscoveryOverlay {
    request_timeout: Option<String>,
    cache_ttl: Option<String>,
    cache_dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SeedProfileOverlay {
    #[serde(default)]
    replace: bool,
    name: Option<String>,
    #[serde(default)]
    blocked_verbs: Vec<String>,
    #[serde(default)]
    remove_blocked_verbs: Vec<String>,
    #[serde(default)]
    delete_exceptions: Vec<DeleteException>,
    #[serde(default)]
    remove_delete_exceptions: Vec<DeleteException>,
}

// ── Merge logic ──

/// Merge a user list into a default list.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped).
fn merge_list<T: PartialEq>(base: &mut Vec<T>, add: Vec<T>, remove: &[T], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge user overlay from ~/.config/kube-lock/config.toml (if exists)
    ///
    /// User config merges with defaults: lists extend, scalars override.
    /// Set `replace = true` in any section to replace its defaults entirely.
    /// Use `remove_<field>` lists to subtract specific items from defaults.
    pub fn load() -> Self {
        let mut config = Self::default_config();
        if let Some(overlay) = Self::load_overlay() {
            config.apply_overlay(overlay);
        }
        config
    }

    /// Try to load user overlay from ~/.config/kube-lock/config.toml.
    fn load_overlay() -> Option<ConfigOverlay> {
        let home = std::env::var_os("HOME")?;
        let path = std::path::Path::new(&home).join(".config/kube-lock/config.toml");
        let content = std::fs::read_to_string(&path).ok()?;
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                log::warn!("settings parse error in {}: {e}", path.display());
                None
            }
        }
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        // Settings: scalar overrides
        let s = overlay.settings;
        if let Some(v) = s.kubectl {
            self.settings.kubectl = v;
        }
        if let Some(v) = s.new_target_status {
            self.settings.new_target_status = v;
        }

        // Parser
        let p = overlay.parser;
        merge_list(
            &mut self.parser.bool_flags,
            p.bool_flags,
            &p.remove_bool_flags,
            p.replace,
        );
        if let Some(v) = p.resource_for_all_verbs {
            self.parser.resource_for_all_verbs = v;
        }

        // Discovery
        let d = overlay.discovery;
        if let Some(v) = d.request_timeout {
            self.discovery.request_timeout = v;
        }
        if let Some(v) = d.cache_ttl {
            self.discovery.cache_ttl = v;
        }
        if let Some(v) = d.cache_dir {
            self.discovery.cache_dir = v;
        }

        // Seed profile
        let sp = overlay.seed_profile;
        if let Some(v) = sp.name {
            self.seed_profile.name = v;
        }
        merge_list(
            &mut self.seed_profile.blocked_verbs,
            sp.blocked_verbs,
            &sp.remove_blocked_verbs,
            sp.replace,
        );
        merge_list(
            &mut self.seed_profile.delete_exceptions,
            sp.delete_exceptions,
            &sp.remove_delete_exceptions,
            sp.replace,
        );
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}

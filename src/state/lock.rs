//! Per-context lock state machine.
//!
//! States are `locked`, `unlocked` and `<profile>`. The document is loaded
//! once into a [`LockState`], mutated in memory, and every transition saves
//! the whole document through the [`ConfigStore`].

use chrono::{DateTime, FixedOffset, Local, SecondsFormat};
use std::time::Duration;

use super::model::{LockDocument, Profile, Status, Target};
use super::store::ConfigStore;
use crate::config::{Config, NewTargetStatus};
use crate::error::{GuardError, Result, parse_duration};

/// Status of a context as found in (or just added to) the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: Status,
    pub unlock_timestamp: Option<String>,
}

pub struct LockState<'a> {
    store: &'a dyn ConfigStore,
    doc: LockDocument,
    seed: Profile,
    new_target: NewTargetStatus,
    now: DateTime<FixedOffset>,
}

impl<'a> LockState<'a> {
    pub fn load(store: &'a dyn ConfigStore, config: &Config) -> Result<Self> {
        Ok(Self {
            doc: store.load()?,
            store,
            seed: config.seed_profile.to_profile(),
            new_target: config.settings.new_target_status,
            now: Local::now().fixed_offset(),
        })
    }

    /// Evaluate against a fixed instant instead of the wall clock.
    pub fn at(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = now;
        self
    }

    pub fn document(&self) -> &LockDocument {
        &self.doc
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.doc)
    }

    /// Look up the context's status, adding it with the default status if it
    /// is unknown. A record without a status is locked and reported as
    /// [`GuardError::UnsafeState`].
    pub fn resolve_status(&mut self, target: &str) -> Result<Resolution> {
        let Some(record) = self.doc.target(target).cloned() else {
            return self.register(target);
        };

        match record.status {
            Some(status) => Ok(Resolution {
                status,
                unlock_timestamp: record.unlock_timestamp,
            }),
            None => {
                log::warn!(
                    "context '{target}' has no status set, so it will be set to 'locked' for safety reasons"
                );
                self.transition(target, Status::Locked)?;
                Err(GuardError::UnsafeState(target.to_string()))
            }
        }
    }

    /// First sighting of a context. Seeds the default profile when the
    /// document has none; the seed and the new record go out in one save.
    fn register(&mut self, target: &str) -> Result<Resolution> {
        if self.doc.default_profile.is_empty() && !self.seed.name.is_empty() {
            log::debug!("setting up '{}' as the default profile", self.seed.name);
            if self.doc.profile(&self.seed.name).is_none() {
                self.doc.profiles.push(self.seed.clone());
            }
            self.doc.default_profile = self.seed.name.clone();
        }

        let status = match self.new_target {
            NewTargetStatus::DefaultProfile => {
                Status::from_name(&self.doc.default_profile).unwrap_or(Status::Unlocked)
            }
            NewTargetStatus::Unlocked => Status::Unlocked,
        };

        log::warn!(
            "no config entry exists for context '{target}'. Adding it with status '{status}'."
        );
        self.doc.contexts.push(Target::new(target, status.clone()));
        self.persist()?;

        Ok(Resolution {
            status,
            unlock_timestamp: None,
        })
    }

    /// Move a context to `status` and save.
    ///
    /// `locked` → `unlocked` stamps the unlock time when a timeout is
    /// configured; `unlocked` → `unlocked` keeps the existing stamp; every
    /// other transition clears it.
    pub fn transition(&mut self, target: &str, status: Status) -> Result<()> {
        let index = match self.doc.target_index(target) {
            Some(index) => index,
            None => {
                self.doc.contexts.push(Target {
                    name: target.to_string(),
                    status: None,
                    unlock_timestamp: None,
                });
                self.doc.contexts.len() - 1
            }
        };

        let armed = self.doc.timeout_armed();
        let stamp = self.now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let record = &mut self.doc.contexts[index];

        match (&status, &record.status) {
            (Status::Unlocked, Some(Status::Locked)) if armed => {
                log::debug!("setting context from 'locked' to 'unlocked', marking unlock timestamp");
                record.unlock_timestamp = Some(stamp);
            }
            (Status::Unlocked, Some(Status::Unlocked)) => {}
            _ => {
                if record.unlock_timestamp.take().is_some() {
                    log::debug!("clearing unlock timestamp");
                }
            }
        }
        record.status = Some(status.clone());

        self.persist()?;
        log::info!("Set context '{target}' to {status}.");
        Ok(())
    }

    /// Re-lock an unlocked context whose unlock window has passed.
    ///
    /// Returns [`GuardError::ExpiredUnlock`] after the `locked` status has
    /// been saved. Does nothing when no timeout is configured.
    pub fn enforce_expiry(&mut self, target: &str, unlock_timestamp: Option<&str>) -> Result<()> {
        if !self.doc.timeout_armed() {
            return Ok(());
        }
        let period = self.doc.unlock_timeout_period.clone();
        if check_expiry(unlock_timestamp, &period, self.now)? {
            return Ok(());
        }
        self.transition(target, Status::Locked)?;
        Err(GuardError::ExpiredUnlock {
            context: target.to_string(),
            timeout: period,
        })
    }

    /// Unlock a context. An unlock whose window already ran out is re-locked
    /// first, so the new unlock starts a fresh window.
    pub fn unlock(&mut self, target: &str) -> Result<()> {
        if let Some(record) = self.doc.target(target)
            && record.status == Some(Status::Unlocked)
        {
            let stamp = record.unlock_timestamp.clone();
            match self.enforce_expiry(target, stamp.as_deref()) {
                Ok(()) => {}
                Err(e) if e.is_forced_lock() => log::debug!("{e}"),
                Err(e) => return Err(e),
            }
        }
        self.transition(target, Status::Unlocked)
    }

    /// Put a context under a profile. The profile must exist.
    pub fn set_profile(&mut self, target: &str, profile: &str) -> Result<Profile> {
        let Some(found) = self.doc.profile(profile).cloned() else {
            return Err(GuardError::ProfileNotFound {
                profile: profile.to_string(),
                context: target.to_string(),
            });
        };
        self.transition(target, Status::Profile(found.name.clone()))?;
        Ok(found)
    }

    /// Validate and store a new unlock timeout.
    pub fn set_timeout(&mut self, period: &str) -> Result<()> {
        parse_duration(period)?;
        self.doc.unlock_timeout_period = period.trim().to_string();
        self.persist()
    }

    /// Turn expiry off and drop every unlock timestamp, in one save.
    pub fn disable_timeout(&mut self) -> Result<()> {
        self.doc.unlock_timeout_period.clear();
        log::info!("Removing unlock timestamps for all contexts...");
        for record in &mut self.doc.contexts {
            record.unlock_timestamp = None;
        }
        self.persist()
    }

    /// Time left before the context's unlock expires, if a window is running.
    pub fn remaining(&self, unlock_timestamp: Option<&str>) -> Result<Option<Duration>> {
        if !self.doc.timeout_armed() {
            return Ok(None);
        }
        let Some(unlocked_at) = parse_stamp(unlock_timestamp)? else {
            return Ok(None);
        };
        let timeout = parse_duration(&self.doc.unlock_timeout_period)?;
        let elapsed = self
            .now
            .signed_duration_since(unlocked_at)
            .to_std()
            .unwrap_or_default();
        Ok(Some(timeout.saturating_sub(elapsed)))
    }
}

fn parse_stamp(unlock_timestamp: Option<&str>) -> Result<Option<DateTime<FixedOffset>>> {
    let Some(stamp) = unlock_timestamp.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(stamp.trim())
        .map(Some)
        .map_err(|e| GuardError::MalformedTimestamp {
            value: stamp.to_string(),
            reason: e.to_string(),
        })
}

/// `true` while the unlock is still valid.
///
/// No timestamp means no window was ever started, which is never expired.
/// A malformed timestamp or duration is an error, not a pass.
pub fn check_expiry(
    unlock_timestamp: Option<&str>,
    timeout_period: &str,
    now: DateTime<FixedOffset>,
) -> Result<bool> {
    let Some(unlocked_at) = parse_stamp(unlock_timestamp)? else {
        log::debug!(
            "no unlock timestamp set; timestamps are only set when going from 'locked' to 'unlocked'"
        );
        return Ok(true);
    };
    let timeout = parse_duration(timeout_period)?;
    let timeout = chrono::Duration::from_std(timeout).map_err(|e| GuardError::MalformedDuration {
        value: timeout_period.to_string(),
        reason: e.to_string(),
    })?;
    Ok(now.signed_duration_since(unlocked_at) <= timeout)
}

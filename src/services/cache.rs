//! In-memory availability cache.
//!
//! Maps a GitLab username to the Slack user id and lower-cased Slack status
//! last seen for that user. Entries expire lazily: staleness is decided when
//! an entry is read, and nothing sweeps the map in the background. The map
//! only grows with the number of distinct users ever looked up, which is
//! bounded by the teams that use the service.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use strum::Display;
use tracing::debug;

use crate::services::observer::Observer;

/// Upper bound on a TTL (ten years).
const MAX_TTL_HOURS: u64 = 24 * 365 * 10;

/// Cached attributes of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserStatus {
    /// Slack user id; empty when unknown.
    pub chat_user_id: String,
    /// Lower-cased Slack status text; empty when unknown.
    pub status: String,
}

#[derive(Debug, Clone)]
struct CachedStatus {
    user: UserStatus,
    /// `None` after `clear`, which makes the entry read as expired.
    expires_at: Option<DateTime<Utc>>,
}

impl CachedStatus {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now > at)
    }
}

/// Outcome of a cache read, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CacheOutcome {
    Hit,
    NotFound,
    Expired,
}

/// Result of [`AvailabilityCache::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(UserStatus),
    /// Entry is stale. The last known attributes are still returned.
    Expired(UserStatus),
    NotFound,
}

impl CacheLookup {
    pub fn outcome(&self) -> CacheOutcome {
        match self {
            CacheLookup::Hit(_) => CacheOutcome::Hit,
            CacheLookup::Expired(_) => CacheOutcome::Expired,
            CacheLookup::NotFound => CacheOutcome::NotFound,
        }
    }
}

/// One row of [`AvailabilityCache::list_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub username: String,
    pub chat_user_id: String,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
}

/// Thread-safe username -> availability map guarded by a single RwLock.
pub struct AvailabilityCache {
    users: RwLock<HashMap<String, CachedStatus>>,
    observer: Arc<dyn Observer>,
}

impl AvailabilityCache {
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            observer,
        }
    }

    /// Insert or fully overwrite an entry.
    pub fn update(&self, username: &str, user: UserStatus, expires_at: DateTime<Utc>) {
        {
            let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
            users.insert(
                username.to_string(),
                CachedStatus {
                    user,
                    expires_at: Some(expires_at),
                },
            );
        }
        self.observer.cache_updated();
        debug!(username = %username, "user cache updated");
    }

    /// Convenience over [`update`](Self::update) with an expiry `ttl_hours` from now.
    pub fn update_for(&self, username: &str, user: UserStatus, ttl_hours: u64) {
        let hours = ttl_hours.min(MAX_TTL_HOURS) as i64;
        let expires_at = Utc::now() + Duration::hours(hours);
        self.update(username, user, expires_at);
    }

    pub fn read(&self, username: &str) -> CacheLookup {
        self.read_at(username, Utc::now())
    }

    /// Read with an explicit notion of "now".
    pub fn read_at(&self, username: &str, now: DateTime<Utc>) -> CacheLookup {
        let lookup = {
            let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
            match users.get(username) {
                None => CacheLookup::NotFound,
                Some(cached) if cached.is_expired(now) => CacheLookup::Expired(cached.user.clone()),
                Some(cached) => CacheLookup::Hit(cached.user.clone()),
            }
        };

        let outcome = lookup.outcome();
        self.observer.cache_read(outcome);
        debug!(username = %username, cache = %outcome, "cache read");
        lookup
    }

    pub fn delete(&self, username: &str) -> Result<(), CacheError> {
        let removed = {
            let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
            users.remove(username)
        };
        match removed {
            Some(_) => {
                self.observer.cache_deleted();
                debug!(username = %username, "cache entry deleted");
                Ok(())
            }
            None => {
                debug!(username = %username, "delete failed, username not found");
                Err(CacheError::NotFound(username.to_string()))
            }
        }
    }

    /// Forget the status and expiry of a user but keep the username and
    /// Slack id, so the next read is a stale miss rather than a lookup failure.
    pub fn clear(&self, username: &str) -> Result<(), CacheError> {
        {
            let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
            let cached = users
                .get_mut(username)
                .ok_or_else(|| CacheError::NotFound(username.to_string()))?;
            cached.user.status.clear();
            cached.expires_at = None;
        }
        self.observer.cache_cleared();
        debug!(username = %username, "user cache cleared");
        Ok(())
    }

    /// Usernames that are absent or have no Slack id, in input order.
    pub fn missing_identities<S: AsRef<str>>(&self, usernames: &[S]) -> Vec<String> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        if users.is_empty() {
            return usernames.iter().map(|u| u.as_ref().to_string()).collect();
        }

        usernames
            .iter()
            .map(AsRef::as_ref)
            .filter(|username| {
                users
                    .get(*username)
                    .map_or(true, |cached| cached.user.chat_user_id.is_empty())
            })
            .map(str::to_string)
            .collect()
    }

    /// Snapshot of every entry, sorted by username.
    pub fn list_all(&self) -> Vec<CacheEntry> {
        let now = Utc::now();
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<CacheEntry> = users
            .iter()
            .map(|(username, cached)| CacheEntry {
                username: username.clone(),
                chat_user_id: cached.user.chat_user_id.clone(),
                status: cached.user.status.clone(),
                expires_at: cached.expires_at,
                expired: cached.is_expired(now),
            })
            .collect();
        entries.sort_by(|a, b| a.username.cmp(&b.username));
        entries
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("no_user_in_cache: {0}")]
    NotFound(String),
}

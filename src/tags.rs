//! Tag vocabulary cache with a freshness window

use crate::db::Database;
use crate::error::StoreError;
use crate::models::{normalize_tags, TagSnapshot};
use chrono::{DateTime, Duration, Utc};
use log::warn;

const TAGS_KEY: &str = "CachedTags";
const TAGS_LAST_FETCH_KEY: &str = "TagsLastFetchTime";

/// Default freshness window: one day
pub const DEFAULT_TAG_TTL_SECS: i64 = 86_400;

#[derive(Clone)]
pub struct TagCache {
    db: Database,
    ttl: Duration,
}

impl TagCache {
    pub fn new(db: Database) -> Self {
        Self::with_ttl(db, DEFAULT_TAG_TTL_SECS)
    }

    /// A non-positive or out-of-range `ttl_secs` falls back to one day.
    pub fn with_ttl(db: Database, ttl_secs: i64) -> Self {
        let ttl = match Duration::try_seconds(ttl_secs) {
            Some(ttl) if ttl > Duration::zero() => ttl,
            _ => {
                warn!(
                    "[tags] cache ttl {}s is invalid, using {}s",
                    ttl_secs, DEFAULT_TAG_TTL_SECS
                );
                Duration::seconds(DEFAULT_TAG_TTL_SECS)
            }
        };
        Self { db, ttl }
    }

    /// Whatever is stored, fresh or not. A half-written pair reads as absent.
    pub fn load(&self) -> Result<Option<TagSnapshot>, StoreError> {
        let tags = self.db.get_value(TAGS_KEY)?;
        let stamp = self.db.get_value(TAGS_LAST_FETCH_KEY)?;
        let (Some(tags), Some(stamp)) = (tags, stamp) else {
            return Ok(None);
        };

        let tags: Vec<String> = serde_json::from_slice(&tags)?;
        let last_refreshed: DateTime<Utc> = serde_json::from_slice(&stamp)?;
        Ok(Some(TagSnapshot {
            tags,
            last_refreshed,
        }))
    }

    /// Persists `tags` (normalized) stamped with `refreshed_at`.
    pub fn store(&self, tags: Vec<String>, refreshed_at: DateTime<Utc>) -> Result<TagSnapshot, StoreError> {
        let snapshot = TagSnapshot {
            tags: normalize_tags(tags),
            last_refreshed: refreshed_at,
        };
        let tags_json = serde_json::to_vec(&snapshot.tags)?;
        let stamp_json = serde_json::to_vec(&snapshot.last_refreshed)?;
        self.db.set_values(&[
            (TAGS_KEY, tags_json.as_slice()),
            (TAGS_LAST_FETCH_KEY, stamp_json.as_slice()),
        ])?;
        Ok(snapshot)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.db.remove_values(&[TAGS_KEY, TAGS_LAST_FETCH_KEY])
    }

    /// Fresh iff the snapshot is younger than the TTL. Timestamps from the
    /// future count as stale.
    pub fn is_fresh(&self, snapshot: &TagSnapshot, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(snapshot.last_refreshed);
        age >= Duration::zero() && age < self.ttl
    }
}

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::records::stores::READING_CACHE;
use super::schema::Database;
use super::types::DatabaseError;
use crate::model::ReadingBundle;

/// Default freshness window for a cached bundle.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// A stored daily bundle with its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub date: NaiveDate,
    pub bundle: ReadingBundle,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(date: NaiveDate, bundle: ReadingBundle, stored_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            date,
            bundle,
            stored_at,
            expires_at: stored_at + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

fn cache_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl Database {
    // ========================================================================
    // Reading Cache Operations
    // ========================================================================

    /// Retrieve the cached bundle for `date` if it has not expired.
    ///
    /// Expired entries are deleted on the way out. An entry that no longer
    /// decodes is dropped the same way and reported as absent.
    pub async fn get_cached_bundle(&self, date: NaiveDate) -> Result<Option<CacheEntry>, DatabaseError> {
        self.get_cached_bundle_at(date, Utc::now()).await
    }

    pub async fn get_cached_bundle_at(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, DatabaseError> {
        let key = cache_key(date);
        let entry = match self.get_record::<CacheEntry>(READING_CACHE, &key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(None),
            Err(DatabaseError::Serialization(e)) => {
                tracing::warn!(date = %key, error = %e, "Discarding undecodable cache entry");
                self.delete_record(READING_CACHE, &key).await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if entry.is_expired_at(now) {
            tracing::debug!(date = %key, expires_at = %entry.expires_at, "Cache entry expired");
            self.delete_record(READING_CACHE, &key).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Store `bundle` for `date`, replacing any previous entry.
    pub async fn cache_bundle(
        &self,
        date: NaiveDate,
        bundle: &ReadingBundle,
        ttl: Duration,
    ) -> Result<CacheEntry, DatabaseError> {
        let entry = CacheEntry::new(date, bundle.clone(), Utc::now(), ttl);
        self.put_cache_entry(&entry).await?;
        Ok(entry)
    }

    pub async fn put_cache_entry(&self, entry: &CacheEntry) -> Result<(), DatabaseError> {
        self.put_record(READING_CACHE, &cache_key(entry.date), entry).await
    }

    /// Delete entries stored more than `older_than_days` days ago.
    ///
    /// Undecodable entries are removed too. Returns the number deleted.
    pub async fn prune_cache(&self, older_than_days: u32) -> Result<u64, DatabaseError> {
        self.prune_cache_at(older_than_days, Utc::now()).await
    }

    pub async fn prune_cache_at(
        &self,
        older_than_days: u32,
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let cutoff = now - Duration::days(i64::from(older_than_days));
        let mut removed = 0;

        for (key, raw) in self.list_records_raw(READING_CACHE).await? {
            let stale = match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => entry.stored_at < cutoff,
                Err(_) => true,
            };
            if stale && self.delete_record(READING_CACHE, &key).await? {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, older_than_days, "Pruned reading cache");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, Section, SourceKind, WeatherItem};
    use std::collections::BTreeMap;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    fn bundle(d: u32) -> ReadingBundle {
        let section = Section::new(
            SourceKind::Weather,
            "今日の天気（気象庁）",
            vec![Item::Weather(WeatherItem {
                text: "晴れています。".to_string(),
                agency: "気象庁".to_string(),
            })],
            "気象庁",
        );
        ReadingBundle::new(date(d), vec![section], BTreeMap::new())
    }

    #[tokio::test]
    async fn test_cache_roundtrip_within_ttl() {
        let db = test_db().await;
        let stored = db
            .cache_bundle(date(5), &bundle(5), Duration::hours(DEFAULT_TTL_HOURS))
            .await
            .unwrap();

        let entry = db.get_cached_bundle(date(5)).await.unwrap().unwrap();
        assert_eq!(entry, stored);
        assert_eq!(entry.expires_at - entry.stored_at, Duration::hours(24));
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_and_deleted() {
        let db = test_db().await;
        let stored_at = Utc::now() - Duration::hours(25);
        let entry = CacheEntry::new(date(5), bundle(5), stored_at, Duration::hours(24));
        db.put_cache_entry(&entry).await.unwrap();

        assert!(db.get_cached_bundle(date(5)).await.unwrap().is_none());
        let raw = db.get_record_raw(READING_CACHE, "2025-10-05").await.unwrap();
        assert!(raw.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_same_date() {
        let db = test_db().await;
        db.cache_bundle(date(5), &bundle(5), Duration::hours(24)).await.unwrap();
        let mut newer = bundle(5);
        newer.sections.clear();
        newer.total_char_count = 0;
        db.cache_bundle(date(5), &newer, Duration::hours(24)).await.unwrap();

        let entry = db.get_cached_bundle(date(5)).await.unwrap().unwrap();
        assert!(entry.bundle.sections.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_dropped() {
        let db = test_db().await;
        db.put_record(READING_CACHE, "2025-10-05", &"garbage").await.unwrap();

        assert!(db.get_cached_bundle(date(5)).await.unwrap().is_none());
        assert!(db.list_records_raw(READING_CACHE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prune_removes_entries_older_than_cutoff() {
        let db = test_db().await;
        let now = Utc::now();
        for (d, age_days) in [(1, 10), (2, 8), (3, 3)] {
            let entry = CacheEntry::new(
                date(d),
                bundle(d),
                now - Duration::days(age_days),
                Duration::hours(24),
            );
            db.put_cache_entry(&entry).await.unwrap();
        }
        db.put_record(READING_CACHE, "junk", &1).await.unwrap();

        let removed = db.prune_cache_at(7, now).await.unwrap();
        assert_eq!(removed, 3);
        let keys: Vec<String> = db
            .list_records_raw(READING_CACHE)
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["2025-10-03"]);
    }
}

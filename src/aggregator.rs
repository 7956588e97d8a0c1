//! Builds the daily bundle from every enabled source.
//!
//! All adapter calls run concurrently on the caller's task and each is bounded
//! by its own timeout, so one slow provider cannot hold up the rest beyond
//! that budget. Sections come back in invocation order regardless of which
//! source answered first.
use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::join_all;
use thiserror::Error;

use crate::config::Config;
use crate::model::{ReadingBundle, SourceKind, SourceSet};
use crate::sources::{SourceError, Sources};
use crate::storage::{Database, DEFAULT_TTL_HOURS};

const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum AggregateError {
    /// Every enabled source failed. Carries one reason per source.
    #[error("All sources failed ({})", describe(.errors))]
    AllSourcesFailed {
        errors: BTreeMap<SourceKind, String>,
    },

    #[error("No sources are enabled")]
    NoSourcesEnabled,
}

impl AggregateError {
    /// HTTP-equivalent status: 503 when providers are down, 500 otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            AggregateError::AllSourcesFailed { .. } => 503,
            AggregateError::NoSourcesEnabled => 500,
        }
    }
}

fn describe(errors: &BTreeMap<SourceKind, String>) -> String {
    errors
        .iter()
        .map(|(kind, reason)| format!("{kind}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct Aggregator {
    sources: Sources,
    cache: Option<Database>,
    source_timeout: Duration,
    cache_ttl: chrono::Duration,
}

impl Aggregator {
    /// An aggregator without a cache.
    pub fn new(sources: Sources) -> Self {
        Self {
            sources,
            cache: None,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            cache_ttl: chrono::Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    pub fn from_config(config: &Config, db: Database) -> Result<Self, SourceError> {
        Ok(Self::new(Sources::from_config(config)?)
            .with_cache(db)
            .source_timeout(config.source_timeout())
            .cache_ttl(config.cache_ttl()))
    }

    pub fn with_cache(mut self, db: Database) -> Self {
        self.cache = Some(db);
        self
    }

    pub fn source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub fn cache_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// The bundle for `date`, from cache when possible.
    ///
    /// A live cache entry is used only if it was built for the same source
    /// set. `force_refresh` skips the lookup. Fresh bundles are cached; cache
    /// failures are logged and otherwise ignored.
    pub async fn daily_bundle(
        &self,
        date: NaiveDate,
        enabled: SourceSet,
        force_refresh: bool,
    ) -> Result<ReadingBundle, AggregateError> {
        if !force_refresh {
            if let Some(bundle) = self.cached_bundle(date, Some(enabled)).await {
                return Ok(bundle);
            }
        }

        let bundle = self.fetch_all(date, enabled).await?;

        if let Some(db) = &self.cache {
            if let Err(e) = db.cache_bundle(date, &bundle, self.cache_ttl).await {
                tracing::warn!(date = %date, error = %e, "Failed to cache daily bundle");
            }
        }
        Ok(bundle)
    }

    /// The live cached bundle for `date`, marked `cached`.
    ///
    /// With `sources`, only a bundle requested for exactly that set counts.
    /// Without, whichever bundle was last fetched for the day is returned.
    pub async fn cached_bundle(
        &self,
        date: NaiveDate,
        sources: Option<SourceSet>,
    ) -> Option<ReadingBundle> {
        let db = self.cache.as_ref()?;
        match db.get_cached_bundle(date).await {
            Ok(Some(entry)) if sources.is_none_or(|s| entry.bundle.requested_sources() == s) => {
                tracing::debug!(date = %date, stored_at = %entry.stored_at, "Serving cached bundle");
                let mut bundle = entry.bundle;
                bundle.cached = true;
                Some(bundle)
            }
            Ok(Some(_)) => {
                tracing::debug!(date = %date, "Cached bundle covers other sources, refetching");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(date = %date, error = %e, "Cache lookup failed, refetching");
                None
            }
        }
    }

    /// Fetch every enabled source concurrently, bypassing the cache.
    pub async fn fetch_all(
        &self,
        date: NaiveDate,
        enabled: SourceSet,
    ) -> Result<ReadingBundle, AggregateError> {
        if enabled.is_empty() {
            return Err(AggregateError::NoSourcesEnabled);
        }

        let timeout = self.source_timeout;
        let results = join_all(enabled.iter().map(|kind| async move {
            let result = tokio::time::timeout(timeout, self.sources.fetch(kind, date))
                .await
                .unwrap_or(Err(SourceError::Timeout(timeout)));
            (kind, result)
        }))
        .await;

        let mut sections = Vec::new();
        let mut errors = BTreeMap::new();
        for (kind, result) in results {
            match result {
                Ok(section) => {
                    tracing::debug!(
                        source = %kind,
                        items = section.items.len(),
                        chars = section.char_count,
                        "Source succeeded"
                    );
                    sections.push(section);
                }
                Err(e) => {
                    tracing::warn!(source = %kind, error = %e, "Source failed");
                    errors.insert(kind, e.to_string());
                }
            }
        }

        if sections.is_empty() {
            return Err(AggregateError::AllSourcesFailed { errors });
        }

        let bundle = ReadingBundle::new(date, sections, errors);
        tracing::info!(
            date = %date,
            sections = bundle.sections.len(),
            failed = bundle.partial_errors.as_ref().map_or(0, |e| e.len()),
            chars = bundle.total_char_count,
            "Aggregated daily bundle"
        );
        Ok(bundle)
    }
}

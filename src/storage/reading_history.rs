use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::records::stores::READING_HISTORY;
use super::schema::Database;
use super::types::DatabaseError;
use crate::model::SourceKind;

/// One day's reading, keyed by date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub date: NaiveDate,
    pub char_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceKind>>,
    /// Fallback group read that day, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub completed: bool,
}

impl HistoryRecord {
    /// A completed reading recorded now.
    pub fn completed(date: NaiveDate, char_count: usize, sources: Vec<SourceKind>) -> Self {
        Self {
            date,
            char_count,
            sources: Some(sources),
            group_id: None,
            recorded_at: Utc::now(),
            completed: true,
        }
    }
}

/// Aggregates shown by `stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryStats {
    pub days_read: usize,
    pub total_char_count: usize,
    pub current_streak: u32,
}

/// Consecutive completed days ending at `today`. Zero if today is not completed.
pub fn compute_streak<'a>(records: impl IntoIterator<Item = &'a HistoryRecord>, today: NaiveDate) -> u32 {
    let completed: BTreeSet<NaiveDate> = records
        .into_iter()
        .filter(|r| r.completed)
        .map(|r| r.date)
        .collect();

    let mut streak = 0;
    let mut day = Some(today);
    while let Some(d) = day.filter(|d| completed.contains(d)) {
        streak += 1;
        day = d.pred_opt();
    }
    streak
}

fn history_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl Database {
    // ========================================================================
    // Reading History Operations
    // ========================================================================

    /// Record a day's reading. A second record for the same date replaces the
    /// first.
    pub async fn append_history(&self, record: &HistoryRecord) -> Result<(), DatabaseError> {
        self.put_record(READING_HISTORY, &history_key(record.date), record)
            .await?;
        tracing::info!(
            date = %record.date,
            chars = record.char_count,
            completed = record.completed,
            "Recorded reading history"
        );
        Ok(())
    }

    pub async fn get_history(&self, date: NaiveDate) -> Result<Option<HistoryRecord>, DatabaseError> {
        self.get_record(READING_HISTORY, &history_key(date)).await
    }

    pub async fn delete_history(&self, date: NaiveDate) -> Result<bool, DatabaseError> {
        self.delete_record(READING_HISTORY, &history_key(date)).await
    }

    /// All records, newest date first.
    pub async fn list_history(&self) -> Result<Vec<HistoryRecord>, DatabaseError> {
        let mut records: Vec<HistoryRecord> = self
            .list_records(READING_HISTORY)
            .await?
            .into_iter()
            .map(|(_, record)| record)
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(records)
    }

    pub async fn has_completed(&self, date: NaiveDate) -> Result<bool, DatabaseError> {
        Ok(self.get_history(date).await?.is_some_and(|r| r.completed))
    }

    /// Current streak as of the local calendar day.
    pub async fn streak(&self) -> Result<u32, DatabaseError> {
        self.streak_as_of(Local::now().date_naive()).await
    }

    pub async fn streak_as_of(&self, today: NaiveDate) -> Result<u32, DatabaseError> {
        let records = self.list_history().await?;
        Ok(compute_streak(&records, today))
    }

    /// Records within one calendar month, oldest first.
    pub async fn history_month(&self, year: i32, month: u32) -> Result<Vec<HistoryRecord>, DatabaseError> {
        let mut records: Vec<HistoryRecord> = self
            .list_history()
            .await?
            .into_iter()
            .filter(|r| r.date.year() == year && r.date.month() == month)
            .collect();
        records.reverse();
        Ok(records)
    }

    pub async fn history_stats(&self) -> Result<HistoryStats, DatabaseError> {
        self.history_stats_as_of(Local::now().date_naive()).await
    }

    pub async fn history_stats_as_of(&self, today: NaiveDate) -> Result<HistoryStats, DatabaseError> {
        let records = self.list_history().await?;
        let completed = records.iter().filter(|r| r.completed);
        Ok(HistoryStats {
            days_read: completed.clone().count(),
            total_char_count: completed.map(|r| r.char_count).sum(),
            current_streak: compute_streak(&records, today),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn record(m: u32, d: u32, chars: usize) -> HistoryRecord {
        HistoryRecord::completed(date(m, d), chars, vec![SourceKind::Wikipedia])
    }

    #[test]
    fn test_streak_stops_at_first_gap() {
        let records = vec![record(10, 5, 1), record(10, 4, 1), record(10, 2, 1)];
        assert_eq!(compute_streak(&records, date(10, 5)), 2);
    }

    #[test]
    fn test_streak_zero_when_today_missing() {
        let records = vec![record(10, 4, 1), record(10, 3, 1)];
        assert_eq!(compute_streak(&records, date(10, 5)), 0);
        assert_eq!(compute_streak(&Vec::<HistoryRecord>::new(), date(10, 5)), 0);
    }

    #[test]
    fn test_streak_crosses_month_boundary() {
        let records = vec![record(10, 1, 1), record(9, 30, 1), record(9, 29, 1)];
        assert_eq!(compute_streak(&records, date(10, 1)), 3);
    }

    #[test]
    fn test_incomplete_records_do_not_count() {
        let mut today = record(10, 5, 1);
        today.completed = false;
        let records = vec![today, record(10, 4, 1)];
        assert_eq!(compute_streak(&records, date(10, 5)), 0);
    }

    #[tokio::test]
    async fn test_list_history_is_descending() {
        let db = test_db().await;
        for d in [2, 5, 4] {
            db.append_history(&record(10, d, 100)).await.unwrap();
        }

        let dates: Vec<_> = db.list_history().await.unwrap().iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(10, 5), date(10, 4), date(10, 2)]);
        assert_eq!(db.streak_as_of(date(10, 5)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_same_date_replaces_record() {
        let db = test_db().await;
        db.append_history(&record(10, 5, 100)).await.unwrap();
        db.append_history(&record(10, 5, 250)).await.unwrap();

        let records = db.list_history().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].char_count, 250);
    }

    #[tokio::test]
    async fn test_has_completed() {
        let db = test_db().await;
        db.append_history(&record(10, 5, 100)).await.unwrap();
        assert!(db.has_completed(date(10, 5)).await.unwrap());
        assert!(!db.has_completed(date(10, 6)).await.unwrap());
    }

    #[tokio::test]
    async fn test_history_month_and_stats() {
        let db = test_db().await;
        for (m, d, chars) in [(9, 30, 300), (10, 1, 200), (10, 2, 100), (11, 1, 50)] {
            db.append_history(&record(m, d, chars)).await.unwrap();
        }

        let october: Vec<_> = db
            .history_month(2025, 10)
            .await
            .unwrap()
            .iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(october, vec![date(10, 1), date(10, 2)]);

        let stats = db.history_stats_as_of(date(10, 2)).await.unwrap();
        assert_eq!(
            stats,
            HistoryStats {
                days_read: 4,
                total_char_count: 650,
                current_streak: 3,
            }
        );
    }

    #[tokio::test]
    async fn test_delete_history() {
        let db = test_db().await;
        db.append_history(&record(10, 5, 100)).await.unwrap();
        assert!(db.delete_history(date(10, 5)).await.unwrap());
        assert!(db.get_history(date(10, 5)).await.unwrap().is_none());
    }
}

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::schema::Database;
use super::types::DatabaseError;

/// Logical store names. Each store is an independent key space.
pub mod stores {
    pub const READING_CACHE: &str = "reading_cache";
    pub const READING_HISTORY: &str = "reading_history";
    pub const USER_SETTINGS: &str = "user_settings";
}

impl Database {
    // ========================================================================
    // Record Store Operations
    // ========================================================================

    /// Fetch the raw JSON text of one record.
    pub async fn get_record_raw(
        &self,
        store: &str,
        key: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM records WHERE store = ? AND key = ?")
                .bind(store)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Fetch and decode one record.
    ///
    /// A stored value that no longer matches `T` is an error, not `None`.
    pub async fn get_record<T: DeserializeOwned>(
        &self,
        store: &str,
        key: &str,
    ) -> Result<Option<T>, DatabaseError> {
        match self.get_record_raw(store, key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Store a record (UPSERT). The last write for a key wins.
    pub async fn put_record<T: Serialize>(
        &self,
        store: &str,
        key: &str,
        value: &T,
    ) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO records (store, key, value, updated_at)
            VALUES (?, ?, ?, datetime('now'))
            ON CONFLICT(store, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(store)
        .bind(key)
        .bind(&json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete one record. Returns true if it existed.
    pub async fn delete_record(&self, store: &str, key: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM records WHERE store = ? AND key = ?")
            .bind(store)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Every `(key, raw JSON)` pair in a store, ordered by key.
    pub async fn list_records_raw(&self, store: &str) -> Result<Vec<(String, String)>, DatabaseError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM records WHERE store = ? ORDER BY key")
                .bind(store)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows)
    }

    /// Every record in a store, decoded, ordered by key.
    pub async fn list_records<T: DeserializeOwned>(
        &self,
        store: &str,
    ) -> Result<Vec<(String, T)>, DatabaseError> {
        self.list_records_raw(store)
            .await?
            .into_iter()
            .map(|(key, raw)| -> Result<(String, T), DatabaseError> {
                Ok((key, serde_json::from_str(&raw)?))
            })
            .collect()
    }

    /// Delete every record in one store. Returns the number removed.
    pub async fn clear_store(&self, store: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM records WHERE store = ?")
            .bind(store)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete every record in every store.
    pub async fn clear_all(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM records")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::stores::*;
    use crate::storage::{Database, DatabaseError};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        body: String,
    }

    fn note(body: &str) -> Note {
        Note {
            body: body.to_string(),
        }
    }

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_missing_record() {
        let db = test_db().await;
        let value: Option<Note> = db.get_record(READING_HISTORY, "2025-10-05").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_put_is_last_write_wins() {
        let db = test_db().await;
        db.put_record(READING_HISTORY, "k", &note("first")).await.unwrap();
        db.put_record(READING_HISTORY, "k", &note("second")).await.unwrap();

        let value: Option<Note> = db.get_record(READING_HISTORY, "k").await.unwrap();
        assert_eq!(value, Some(note("second")));
        assert_eq!(db.list_records_raw(READING_HISTORY).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stores_are_separate_key_spaces() {
        let db = test_db().await;
        db.put_record(READING_CACHE, "k", &note("cache")).await.unwrap();
        db.put_record(READING_HISTORY, "k", &note("history")).await.unwrap();

        assert_eq!(db.clear_store(READING_CACHE).await.unwrap(), 1);
        let value: Option<Note> = db.get_record(READING_HISTORY, "k").await.unwrap();
        assert_eq!(value, Some(note("history")));
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_key() {
        let db = test_db().await;
        for key in ["2025-10-05", "2025-10-02", "2025-10-04"] {
            db.put_record(READING_HISTORY, key, &note(key)).await.unwrap();
        }

        let keys: Vec<String> = db
            .list_records::<Note>(READING_HISTORY)
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["2025-10-02", "2025-10-04", "2025-10-05"]);
    }

    #[tokio::test]
    async fn test_delete_and_clear_all() {
        let db = test_db().await;
        db.put_record(READING_CACHE, "a", &note("a")).await.unwrap();
        db.put_record(USER_SETTINGS, "b", &note("b")).await.unwrap();

        assert!(db.delete_record(READING_CACHE, "a").await.unwrap());
        assert!(!db.delete_record(READING_CACHE, "a").await.unwrap());
        assert_eq!(db.clear_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_shape_is_serialization_error() {
        let db = test_db().await;
        db.put_record(USER_SETTINGS, "k", &42).await.unwrap();

        let result = db.get_record::<Note>(USER_SETTINGS, "k").await;
        assert!(matches!(result, Err(DatabaseError::Serialization(_))));
    }
}

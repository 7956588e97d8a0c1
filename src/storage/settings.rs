use serde::Serialize;

use super::records::stores::USER_SETTINGS;
use super::schema::Database;
use super::types::DatabaseError;

/// Settings live as a single JSON object under this key.
const SETTINGS_KEY: &str = "user_settings";

impl Database {
    // ========================================================================
    // User Settings Operations
    // ========================================================================

    /// The stored settings object, undecoded. `None` when nothing was saved.
    pub async fn load_settings_raw(&self) -> Result<Option<String>, DatabaseError> {
        self.get_record_raw(USER_SETTINGS, SETTINGS_KEY).await
    }

    /// Persist the full settings object, replacing what was stored.
    pub async fn save_settings<T: Serialize>(&self, settings: &T) -> Result<(), DatabaseError> {
        self.put_record(USER_SETTINGS, SETTINGS_KEY, settings).await
    }
}

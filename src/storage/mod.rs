mod reading_cache;
mod reading_history;
mod records;
mod schema;
mod settings;
mod types;

pub use reading_cache::{CacheEntry, DEFAULT_TTL_HOURS};
pub use reading_history::{compute_streak, HistoryRecord, HistoryStats};
pub use records::stores;
pub use schema::Database;
pub use types::DatabaseError;

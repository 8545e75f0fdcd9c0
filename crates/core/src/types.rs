/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identifier of a monitored system (also the cache key and URL segment).
pub type SystemId = String;

/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC. Conversion into the canonical reporting
/// timezone happens only inside the accounting engine.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

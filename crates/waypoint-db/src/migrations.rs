//! Schema migration runner for the SQL backend.
//!
//! Embeds the SQL files at compile time and executes them on open. All
//! statements use `IF NOT EXISTS` so re-running is harmless.

use crate::error::DatabaseError;
use crate::sql::SqlStore;

const MIGRATION_001: &str = include_str!("../migrations/001_initial.sql");

impl SqlStore {
    pub(crate) async fn run_migrations(&self) -> Result<(), DatabaseError> {
        self.conn()
            .execute_batch(MIGRATION_001)
            .await
            .map_err(|e| DatabaseError::Migration(format!("001_initial: {e}")))?;
        Ok(())
    }
}

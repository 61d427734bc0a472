//! Migration Ledger - persisted record of applied migrations
//!
//! Records are only ever inserted or deleted. The ordering returned by
//! [`Ledger::records`] (batch desc, then migration name desc) is the order
//! rollback undoes migrations in.

use async_trait::async_trait;

use crate::definitions::MigrationRecord;
use crate::error::MigrationResult;

pub mod clickhouse;
pub mod memory;
pub mod postgres;

pub use clickhouse::ClickHouseLedger;
pub use memory::MemoryLedger;
pub use postgres::PostgresLedger;

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Table the records live in
    fn table(&self) -> &str;

    /// Create the persistent structure if absent; safe to call on every run
    async fn ensure_store(&self) -> MigrationResult<()>;

    /// Whether the persistent structure exists, without creating it
    async fn store_exists(&self) -> MigrationResult<bool>;

    async fn has_run(&self, migration: &str) -> MigrationResult<bool>;

    /// Insert a record; `DuplicateRecord` if the name is already present
    async fn record(&self, migration: &str, batch: i64) -> MigrationResult<()>;

    /// Delete the record for `migration`; absent names are ignored
    async fn remove(&self, migration: &str) -> MigrationResult<()>;

    /// Highest batch number, 0 when empty
    async fn max_batch(&self) -> MigrationResult<i64>;

    /// Every record, batch desc then migration name desc
    async fn records(&self) -> MigrationResult<Vec<MigrationRecord>>;

    /// Next batch number for an apply run
    async fn next_batch(&self) -> MigrationResult<i64> {
        Ok(self.max_batch().await? + 1)
    }
}

/// Sort records into rollback order
pub(crate) fn sort_for_rollback(records: &mut [MigrationRecord]) {
    records.sort_by(|a, b| {
        b.batch
            .cmp(&a.batch)
            .then_with(|| b.migration.cmp(&a.migration))
    });
}

/// Table names are interpolated into SQL, so only plain identifiers are allowed
pub(crate) fn validate_table_name(table: &str) -> MigrationResult<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !table.starts_with(|c: char| c.is_ascii_digit());

    if valid {
        Ok(())
    } else {
        Err(crate::error::MigrationError::configuration(format!(
            "Invalid migrations table name '{}'",
            table
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(migration: &str, batch: i64) -> MigrationRecord {
        MigrationRecord {
            id: 0,
            migration: migration.to_string(),
            batch,
            applied_at: Utc::now(),
        }
    }

    #[test]
    fn test_rollback_order() {
        let mut records = vec![
            record("2024_01_01_000000_a", 1),
            record("2024_01_03_000000_c", 2),
            record("2024_01_02_000000_b", 1),
        ];
        sort_for_rollback(&mut records);

        let names: Vec<_> = records.iter().map(|r| r.migration.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "2024_01_03_000000_c",
                "2024_01_02_000000_b",
                "2024_01_01_000000_a"
            ]
        );
    }

    #[test]
    fn test_rollback_order_is_byte_wise() {
        // '_' sorts after the digits, unlike locale collations that skip it
        let mut records = vec![
            record("20250102000000_y", 3),
            record("2025_01_01_000000_x", 3),
            record("2024_12_30_000000_w", 2),
        ];
        sort_for_rollback(&mut records);

        let names: Vec<_> = records.iter().map(|r| r.migration.as_str()).collect();
        assert_eq!(
            names,
            vec!["2025_01_01_000000_x", "20250102000000_y", "2024_12_30_000000_w"]
        );
    }

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("migrations").is_ok());
        assert!(validate_table_name("analytics.clickhouse_migrations").is_ok());
        assert!(validate_table_name("migrations; DROP TABLE users").is_err());
        assert!(validate_table_name("").is_err());
    }
}

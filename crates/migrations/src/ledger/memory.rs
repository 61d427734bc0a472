//! In-process ledger for dry runs and tests

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{sort_for_rollback, Ledger};
use crate::definitions::MigrationRecord;
use crate::error::{MigrationError, MigrationResult};

#[derive(Debug, Default)]
struct MemoryState {
    created: bool,
    next_id: i64,
    records: Vec<MigrationRecord>,
}

/// Ledger kept in memory; the store "exists" once `ensure_store` ran
#[derive(Debug)]
pub struct MemoryLedger {
    table: String,
    state: Mutex<MemoryState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_table("migrations")
    }

    pub fn with_table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Records in insertion order
    pub fn snapshot(&self) -> Vec<MigrationRecord> {
        self.state.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    fn table(&self) -> &str {
        &self.table
    }

    async fn ensure_store(&self) -> MigrationResult<()> {
        self.state.lock().created = true;
        Ok(())
    }

    async fn store_exists(&self) -> MigrationResult<bool> {
        Ok(self.state.lock().created)
    }

    async fn has_run(&self, migration: &str) -> MigrationResult<bool> {
        Ok(self
            .state
            .lock()
            .records
            .iter()
            .any(|r| r.migration == migration))
    }

    async fn record(&self, migration: &str, batch: i64) -> MigrationResult<()> {
        let mut state = self.state.lock();
        if state.records.iter().any(|r| r.migration == migration) {
            return Err(MigrationError::DuplicateRecord {
                migration: migration.to_string(),
            });
        }

        state.next_id += 1;
        let id = state.next_id;
        state.records.push(MigrationRecord {
            id,
            migration: migration.to_string(),
            batch,
            applied_at: Utc::now(),
        });
        Ok(())
    }

    async fn remove(&self, migration: &str) -> MigrationResult<()> {
        self.state
            .lock()
            .records
            .retain(|r| r.migration != migration);
        Ok(())
    }

    async fn max_batch(&self) -> MigrationResult<i64> {
        Ok(self
            .state
            .lock()
            .records
            .iter()
            .map(|r| r.batch)
            .max()
            .unwrap_or(0))
    }

    async fn records(&self) -> MigrationResult<Vec<MigrationRecord>> {
        let mut records = self.snapshot();
        sort_for_rollback(&mut records);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_remove() {
        let ledger = MemoryLedger::new();
        assert!(!ledger.store_exists().await.unwrap());
        ledger.ensure_store().await.unwrap();
        ledger.ensure_store().await.unwrap();
        assert!(ledger.store_exists().await.unwrap());

        assert_eq!(ledger.max_batch().await.unwrap(), 0);
        ledger.record("2024_01_01_000000_a", 1).await.unwrap();
        ledger.record("2024_01_02_000000_b", 2).await.unwrap();

        assert!(ledger.has_run("2024_01_01_000000_a").await.unwrap());
        assert_eq!(ledger.max_batch().await.unwrap(), 2);
        assert_eq!(ledger.next_batch().await.unwrap(), 3);

        ledger.remove("2024_01_02_000000_b").await.unwrap();
        ledger.remove("2024_01_02_000000_b").await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.max_batch().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_record_is_rejected() {
        let ledger = MemoryLedger::new();
        ledger.record("2024_01_01_000000_a", 1).await.unwrap();

        let err = ledger.record("2024_01_01_000000_a", 2).await.unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateRecord { .. }));
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_ids_stay_monotonic_after_removal() {
        let ledger = MemoryLedger::new();
        ledger.record("2024_01_01_000000_a", 1).await.unwrap();
        ledger.remove("2024_01_01_000000_a").await.unwrap();
        ledger.record("2024_01_01_000000_a", 2).await.unwrap();

        assert_eq!(ledger.snapshot()[0].id, 2);
    }
}

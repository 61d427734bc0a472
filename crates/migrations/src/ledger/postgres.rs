//! PostgreSQL ledger table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use super::{sort_for_rollback, validate_table_name, Ledger};
use crate::definitions::MigrationRecord;
use crate::error::{MigrationError, MigrationResult};

pub struct PostgresLedger {
    pool: PgPool,
    table: String,
}

impl PostgresLedger {
    pub fn new(pool: PgPool, table: &str) -> MigrationResult<Self> {
        validate_table_name(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// SQL to create the migrations tracking table
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id BIGSERIAL PRIMARY KEY,\n    \
                migration VARCHAR(255) NOT NULL UNIQUE,\n    \
                batch INTEGER NOT NULL,\n    \
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP\n\
            )",
            self.table
        )
    }

    /// SQL to check if a migration has been applied
    pub fn has_run_sql(&self) -> String {
        format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE migration = $1)",
            self.table
        )
    }

    /// SQL to record a migration as applied
    pub fn record_sql(&self) -> String {
        format!(
            "INSERT INTO {} (migration, batch) VALUES ($1, $2)",
            self.table
        )
    }

    /// SQL to remove a migration record (for rollback)
    pub fn remove_sql(&self) -> String {
        format!("DELETE FROM {} WHERE migration = $1", self.table)
    }

    /// SQL to get the latest batch number
    pub fn max_batch_sql(&self) -> String {
        format!(
            "SELECT COALESCE(MAX(batch), 0)::BIGINT FROM {}",
            self.table
        )
    }

    /// SQL to get applied migrations in rollback order, compared byte-wise
    pub fn records_sql(&self) -> String {
        format!(
            "SELECT id, migration, batch, created_at FROM {} ORDER BY batch DESC, migration COLLATE \"C\" DESC",
            self.table
        )
    }
}

#[async_trait]
impl Ledger for PostgresLedger {
    fn table(&self) -> &str {
        &self.table
    }

    async fn ensure_store(&self) -> MigrationResult<()> {
        sqlx::query(&self.create_table_sql())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MigrationError::database(format!("Failed to create migrations table: {}", e))
            })?;
        Ok(())
    }

    async fn store_exists(&self) -> MigrationResult<bool> {
        let row = sqlx::query("SELECT to_regclass($1) IS NOT NULL")
            .bind(&self.table)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn has_run(&self, migration: &str) -> MigrationResult<bool> {
        let row = sqlx::query(&self.has_run_sql())
            .bind(migration)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                MigrationError::database(format!("Failed to check migration status: {}", e))
            })?;
        Ok(row.try_get(0)?)
    }

    async fn record(&self, migration: &str, batch: i64) -> MigrationResult<()> {
        let batch = i32::try_from(batch).map_err(|_| {
            MigrationError::database(format!("Batch number {} out of range", batch))
        })?;

        sqlx::query(&self.record_sql())
            .bind(migration)
            .bind(batch)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    MigrationError::DuplicateRecord {
                        migration: migration.to_string(),
                    }
                }
                _ => MigrationError::database(format!("Failed to record migration: {}", e)),
            })?;
        Ok(())
    }

    async fn remove(&self, migration: &str) -> MigrationResult<()> {
        sqlx::query(&self.remove_sql())
            .bind(migration)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MigrationError::database(format!("Failed to remove migration record: {}", e))
            })?;
        Ok(())
    }

    async fn max_batch(&self) -> MigrationResult<i64> {
        let row = sqlx::query(&self.max_batch_sql())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrationError::database(format!("Failed to get latest batch: {}", e)))?;
        Ok(row.try_get(0)?)
    }

    async fn records(&self) -> MigrationResult<Vec<MigrationRecord>> {
        let rows = sqlx::query(&self.records_sql())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                MigrationError::database(format!("Failed to query applied migrations: {}", e))
            })?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let batch: i32 = row.try_get("batch")?;
            let applied_at: DateTime<Utc> = row.try_get("created_at")?;
            records.push(MigrationRecord {
                id: row.try_get("id")?,
                migration: row.try_get("migration")?,
                batch: i64::from(batch),
                applied_at,
            });
        }

        // same order as the source and the other ledgers, whatever the column collation
        sort_for_rollback(&mut records);
        Ok(records)
    }
}

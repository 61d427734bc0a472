//! ClickHouse ledger table
//!
//! MergeTree has no unique constraint or auto-increment, so duplicate
//! detection and id allocation are done with queries before the insert.
//! Deletes are mutations and run with `mutations_sync=1`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

use super::{sort_for_rollback, validate_table_name, Ledger};
use crate::backends::ClickHouseAdapter;
use crate::definitions::MigrationRecord;
use crate::error::{MigrationError, MigrationResult};
use crate::sql::quote_literal;

pub struct ClickHouseLedger {
    adapter: Arc<ClickHouseAdapter>,
    table: String,
}

impl ClickHouseLedger {
    pub fn new(adapter: Arc<ClickHouseAdapter>, table: &str) -> MigrationResult<Self> {
        validate_table_name(table)?;
        Ok(Self {
            adapter,
            table: table.to_string(),
        })
    }

    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id UInt64,\n    \
                migration String,\n    \
                batch UInt32,\n    \
                created_at DateTime DEFAULT now()\n\
            ) ENGINE = MergeTree() ORDER BY id",
            self.table
        )
    }

    async fn scalar(&self, select: &str) -> MigrationResult<i64> {
        let rows = self.adapter.query_rows(select).await?;
        rows.first()
            .and_then(|row| row.as_object())
            .and_then(|row| row.values().next())
            .and_then(json_i64)
            .ok_or_else(|| MigrationError::query(format!("Unexpected response to `{}`", select)))
    }

    fn parse_record(&self, row: &JsonValue) -> MigrationResult<MigrationRecord> {
        let malformed = || MigrationError::query(format!("Malformed row in {}: {}", self.table, row));

        let migration = row["migration"].as_str().ok_or_else(malformed)?.to_string();
        let id = json_i64(&row["id"]).ok_or_else(malformed)?;
        let batch = json_i64(&row["batch"]).ok_or_else(malformed)?;
        let applied_at = row["created_at"]
            .as_str()
            .and_then(parse_datetime)
            .ok_or_else(malformed)?;

        Ok(MigrationRecord {
            id,
            migration,
            batch,
            applied_at,
        })
    }
}

/// UInt64 may arrive quoted depending on server settings
fn json_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_u64().map(|v| v as i64)),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl Ledger for ClickHouseLedger {
    fn table(&self) -> &str {
        &self.table
    }

    async fn ensure_store(&self) -> MigrationResult<()> {
        self.adapter.send(&self.create_table_sql(), &[]).await?;
        Ok(())
    }

    async fn store_exists(&self) -> MigrationResult<bool> {
        Ok(self.scalar(&format!("EXISTS TABLE {}", self.table)).await? == 1)
    }

    async fn has_run(&self, migration: &str) -> MigrationResult<bool> {
        let count = self
            .scalar(&format!(
                "SELECT count() AS total FROM {} WHERE migration = {}",
                self.table,
                quote_literal(migration)
            ))
            .await?;
        Ok(count > 0)
    }

    async fn record(&self, migration: &str, batch: i64) -> MigrationResult<()> {
        if self.has_run(migration).await? {
            return Err(MigrationError::DuplicateRecord {
                migration: migration.to_string(),
            });
        }

        // aggregate over an empty table still yields one row, so the first id is 1.
        // Ids are not monotonic: removing the newest record frees its id for the
        // next insert, unlike MemoryLedger which never reuses one.
        let insert = format!(
            "INSERT INTO {table} (id, migration, batch) SELECT max(id) + 1, {name}, {batch} FROM {table}",
            table = self.table,
            name = quote_literal(migration),
            batch = batch
        );
        self.adapter.send(&insert, &[]).await?;
        Ok(())
    }

    async fn remove(&self, migration: &str) -> MigrationResult<()> {
        let delete = format!(
            "ALTER TABLE {} DELETE WHERE migration = {}",
            self.table,
            quote_literal(migration)
        );
        self.adapter.send(&delete, &[("mutations_sync", "1")]).await?;
        Ok(())
    }

    async fn max_batch(&self) -> MigrationResult<i64> {
        self.scalar(&format!("SELECT max(batch) AS batch FROM {}", self.table))
            .await
    }

    async fn records(&self) -> MigrationResult<Vec<MigrationRecord>> {
        let rows = self
            .adapter
            .query_rows(&format!(
                "SELECT id, migration, batch, toString(created_at) AS created_at FROM {} ORDER BY batch DESC, migration DESC",
                self.table
            ))
            .await?;

        let mut records = rows
            .iter()
            .map(|row| self.parse_record(row))
            .collect::<MigrationResult<Vec<_>>>()?;
        sort_for_rollback(&mut records);
        Ok(records)
    }
}

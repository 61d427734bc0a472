//! Backend Adapters
//!
//! An adapter executes operations against a concrete store. Migrations hold
//! an `Arc<dyn BackendAdapter>` handed to them at construction instead of
//! inheriting connection logic from a per-backend base type.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{MigrationError, MigrationResult};
use crate::schema_builder::Operation;
use crate::sql::Dialect;

pub mod clickhouse;
pub mod postgres;

pub use clickhouse::ClickHouseAdapter;
pub use postgres::PostgresAdapter;

/// What a backend guarantees about the statements it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Relational store; statements commit individually unless explicitly grouped
    Transactional,
    /// One request per statement, no rollback and no multi-statement atomicity
    Stateless,
}

/// What executing an operation produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutcome {
    /// Statements sent to the backend
    pub statements: usize,
    /// Rows affected, when the backend reports it
    pub rows_affected: u64,
    /// Decoded response body, when the backend returns JSON
    pub payload: Option<JsonValue>,
}

impl ExecutionOutcome {
    pub fn merge(&mut self, other: ExecutionOutcome) {
        self.statements += other.statements;
        self.rows_affected += other.rows_affected;
        if other.payload.is_some() {
            self.payload = other.payload;
        }
    }
}

/// Executor for migration operations against one store
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn capability(&self) -> Capability;

    fn dialect(&self) -> Dialect;

    /// Execute a single operation; raw scripts may expand to several statements
    async fn execute(&self, operation: &Operation) -> MigrationResult<ExecutionOutcome>;

    /// Execute operations in order, stopping at the first failure. Statements
    /// that already ran stay committed.
    async fn execute_all(&self, operations: &[Operation]) -> MigrationResult<ExecutionOutcome> {
        let mut outcome = ExecutionOutcome::default();
        for operation in operations {
            outcome.merge(self.execute(operation).await?);
        }
        Ok(outcome)
    }

    /// Execute operations as one all-or-nothing group. Only transactional
    /// backends support this.
    async fn execute_atomic(&self, _operations: &[Operation]) -> MigrationResult<ExecutionOutcome> {
        Err(MigrationError::unsupported(
            "atomic execution",
            self.dialect().name(),
        ))
    }

    /// Convenience for raw SQL
    async fn execute_sql(&self, sql: &str) -> MigrationResult<ExecutionOutcome> {
        self.execute(&Operation::raw(sql)).await
    }
}

//! PostgreSQL adapter
//!
//! Transactional capability: statements run on the pool and commit one by
//! one. Units that need several statements to land atomically group them
//! with [`PostgresAdapter::execute_in_transaction`].

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{BackendAdapter, Capability, ExecutionOutcome};
use crate::config::PostgresConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::schema_builder::Operation;
use crate::sql::Dialect;

/// Executes migration operations through a sqlx connection pool
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool and verify the server answers before any unit runs
    pub async fn connect(config: &PostgresConfig) -> MigrationResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(config.connect_options())
            .await
            .map_err(|e| {
                MigrationError::connection(format!(
                    "Failed to connect to {}: {}",
                    config.display_target(),
                    e
                ))
            })?;

        tracing::debug!(server = %config.display_target(), "connected to postgres");
        Ok(Self::new(pool))
    }

    /// Get the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run every operation inside one transaction; any failure rolls the
    /// whole group back
    pub async fn execute_in_transaction(
        &self,
        operations: &[Operation],
    ) -> MigrationResult<ExecutionOutcome> {
        let mut transaction = self.pool.begin().await?;
        let mut outcome = ExecutionOutcome::default();

        for operation in operations {
            for statement in operation.render(Dialect::Postgres)? {
                let result = sqlx::query(&statement)
                    .execute(&mut *transaction)
                    .await
                    .map_err(|e| {
                        MigrationError::database(format!("Failed to execute `{}`: {}", statement, e))
                    })?;
                outcome.statements += 1;
                outcome.rows_affected += result.rows_affected();
            }
        }

        transaction
            .commit()
            .await
            .map_err(|e| MigrationError::database(format!("Failed to commit: {}", e)))?;
        Ok(outcome)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl BackendAdapter for PostgresAdapter {
    fn name(&self) -> &str {
        "postgres"
    }

    fn capability(&self) -> Capability {
        Capability::Transactional
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, operation: &Operation) -> MigrationResult<ExecutionOutcome> {
        let mut outcome = ExecutionOutcome::default();

        for statement in operation.render(Dialect::Postgres)? {
            if statement.trim().is_empty() {
                continue;
            }
            tracing::trace!(sql = %statement, "executing statement");
            let result = sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| match MigrationError::from(e) {
                    MigrationError::Database { message } => MigrationError::database(format!(
                        "Failed to execute `{}`: {}",
                        statement, message
                    )),
                    err => err,
                })?;
            outcome.statements += 1;
            outcome.rows_affected += result.rows_affected();
        }

        Ok(outcome)
    }

    async fn execute_atomic(&self, operations: &[Operation]) -> MigrationResult<ExecutionOutcome> {
        self.execute_in_transaction(operations).await
    }
}

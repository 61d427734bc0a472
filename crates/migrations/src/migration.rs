//! Migration units
//!
//! A unit is a name plus something implementing [`Migration`]. Units never
//! open their own connections; they are built with the adapter they run on.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::BackendAdapter;
use crate::error::MigrationResult;
use crate::schema_builder::{Operation, SchemaBuilder};

/// Forward and backward schema change; `down` must invert `up`
#[async_trait]
pub trait Migration: Send + Sync {
    async fn up(&self) -> MigrationResult<()>;

    async fn down(&self) -> MigrationResult<()>;
}

/// Named migration as returned by a source
#[derive(Clone)]
pub struct MigrationUnit {
    name: String,
    migration: Arc<dyn Migration>,
}

impl MigrationUnit {
    pub fn new(name: impl Into<String>, migration: Arc<dyn Migration>) -> Self {
        Self {
            name: name.into(),
            migration,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn migration(&self) -> &Arc<dyn Migration> {
        &self.migration
    }

    pub async fn up(&self) -> MigrationResult<()> {
        self.migration.up().await
    }

    pub async fn down(&self) -> MigrationResult<()> {
        self.migration.down().await
    }
}

impl fmt::Debug for MigrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationUnit")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Unit backed by raw SQL scripts, as read from a migration file
pub struct SqlMigration {
    up_sql: String,
    down_sql: String,
    adapter: Arc<dyn BackendAdapter>,
}

impl SqlMigration {
    pub fn new(
        up_sql: impl Into<String>,
        down_sql: impl Into<String>,
        adapter: Arc<dyn BackendAdapter>,
    ) -> Self {
        Self {
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
            adapter,
        }
    }

    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    pub fn down_sql(&self) -> &str {
        &self.down_sql
    }

    async fn run(&self, sql: &str) -> MigrationResult<()> {
        if sql.trim().is_empty() {
            tracing::debug!(adapter = self.adapter.name(), "empty migration script, nothing to execute");
            return Ok(());
        }
        self.adapter.execute_sql(sql).await?;
        Ok(())
    }
}

#[async_trait]
impl Migration for SqlMigration {
    async fn up(&self) -> MigrationResult<()> {
        self.run(&self.up_sql).await
    }

    async fn down(&self) -> MigrationResult<()> {
        self.run(&self.down_sql).await
    }
}

/// Unit built from schema builder operations, rendered for the adapter's dialect
pub struct SchemaMigration {
    up: Vec<Operation>,
    down: Vec<Operation>,
    adapter: Arc<dyn BackendAdapter>,
    atomic: bool,
}

impl SchemaMigration {
    pub fn new(adapter: Arc<dyn BackendAdapter>) -> Self {
        Self {
            up: Vec::new(),
            down: Vec::new(),
            adapter,
            atomic: false,
        }
    }

    /// Run each direction as a single transaction; fails with `Unsupported`
    /// on stateless backends
    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }

    async fn run(&self, operations: &[Operation]) -> MigrationResult<()> {
        if self.atomic {
            self.adapter.execute_atomic(operations).await?;
        } else {
            self.adapter.execute_all(operations).await?;
        }
        Ok(())
    }

    /// Describe the forward change
    pub fn up_with<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut SchemaBuilder),
    {
        let mut schema = SchemaBuilder::new();
        build(&mut schema);
        self.up.extend(schema.into_operations());
        self
    }

    /// Describe the backward change
    pub fn down_with<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut SchemaBuilder),
    {
        let mut schema = SchemaBuilder::new();
        build(&mut schema);
        self.down.extend(schema.into_operations());
        self
    }

    pub fn up_raw(mut self, sql: impl Into<String>) -> Self {
        self.up.push(Operation::raw(sql));
        self
    }

    pub fn down_raw(mut self, sql: impl Into<String>) -> Self {
        self.down.push(Operation::raw(sql));
        self
    }
}

#[async_trait]
impl Migration for SchemaMigration {
    async fn up(&self) -> MigrationResult<()> {
        self.run(&self.up).await
    }

    async fn down(&self) -> MigrationResult<()> {
        self.run(&self.down).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{Capability, ExecutionOutcome};
    use crate::sql::Dialect;
    use parking_lot::Mutex;

    /// Adapter that renders statements instead of executing them
    #[derive(Default)]
    struct CapturingAdapter {
        statements: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BackendAdapter for CapturingAdapter {
        fn name(&self) -> &str {
            "capturing"
        }

        fn capability(&self) -> Capability {
            Capability::Transactional
        }

        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        async fn execute(&self, operation: &Operation) -> MigrationResult<ExecutionOutcome> {
            let rendered = operation.render(Dialect::Postgres)?;
            let count = rendered.len();
            self.statements.lock().extend(rendered);
            Ok(ExecutionOutcome {
                statements: count,
                ..ExecutionOutcome::default()
            })
        }
    }

    #[tokio::test]
    async fn test_sql_migration_runs_scripts() {
        let adapter = Arc::new(CapturingAdapter::default());
        let migration = SqlMigration::new(
            "CREATE TABLE users (id INT); CREATE TABLE teams (id INT);",
            "DROP TABLE teams; DROP TABLE users;",
            adapter.clone(),
        );

        migration.up().await.unwrap();
        assert_eq!(adapter.statements.lock().len(), 2);

        migration.down().await.unwrap();
        let statements = adapter.statements.lock();
        assert_eq!(statements.len(), 4);
        assert_eq!(statements[2], "DROP TABLE teams");
    }

    #[tokio::test]
    async fn test_empty_down_script_is_a_no_op() {
        let adapter = Arc::new(CapturingAdapter::default());
        let migration = SqlMigration::new("CREATE TABLE users (id INT)", "  \n", adapter.clone());

        migration.down().await.unwrap();
        assert!(adapter.statements.lock().is_empty());
    }

    #[tokio::test]
    async fn test_schema_migration_renders_builder_operations() {
        let adapter = Arc::new(CapturingAdapter::default());
        let migration = SchemaMigration::new(adapter.clone())
            .up_with(|schema| {
                schema.create_table("posts", |table| {
                    table.id("id");
                    table.string("title", Some(200));
                });
                schema.create_index("posts", &["title"], None);
            })
            .down_with(|schema| {
                schema.drop_table("posts");
            });

        migration.up().await.unwrap();
        migration.down().await.unwrap();

        let statements = adapter.statements.lock();
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with("CREATE TABLE posts"));
        assert_eq!(statements[1], "CREATE INDEX idx_posts_title ON posts (title)");
        assert!(statements[2].starts_with("DROP TABLE"));
    }

    #[tokio::test]
    async fn test_atomic_needs_transactional_backend() {
        let adapter = Arc::new(CapturingAdapter::default());
        let migration = SchemaMigration::new(adapter.clone())
            .atomic()
            .up_raw("UPDATE players SET rating = 0");

        let err = migration.up().await.unwrap_err();
        assert!(matches!(err, crate::error::MigrationError::Unsupported { .. }));
        assert!(adapter.statements.lock().is_empty());
    }

    #[test]
    fn test_unit_debug_hides_body() {
        let unit = MigrationUnit::new(
            "2024_01_01_000000_create_users",
            Arc::new(SqlMigration::new("", "", Arc::new(CapturingAdapter::default()))),
        );
        assert!(format!("{:?}", unit).contains("2024_01_01_000000_create_users"));
    }
}

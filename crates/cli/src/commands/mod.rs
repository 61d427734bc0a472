pub mod make;
pub mod migrate;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rollcall_migrations::{
    ClickHouseAdapter, ClickHouseLedger, Connection, MigrationAction, MigrationEvent,
    MigrationResult, Migrator, PostgresAdapter, PostgresLedger, RollcallConfig,
    SqlDirectorySource,
};

/// Resolved inputs shared by every command
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: RollcallConfig,
    pub connection: Connection,
    /// `--path` override for the migrations directory
    pub path: Option<PathBuf>,
}

impl CommandContext {
    pub fn migrations_dir(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| {
            self.config
                .migrations_for(self.connection)
                .migrations_dir
                .as_path()
        })
    }

    pub fn migrations_table(&self) -> &str {
        &self.config.migrations_for(self.connection).migrations_table
    }

    /// Connect to the selected backend and wire source, ledger and engine
    pub async fn migrator(&self) -> MigrationResult<Migrator> {
        let dir = self.migrations_dir().to_path_buf();
        let table = self.migrations_table();

        let migrator = match self.connection {
            Connection::Postgres => {
                let adapter = Arc::new(PostgresAdapter::connect(&self.config.postgres).await?);
                let ledger = PostgresLedger::new(adapter.pool().clone(), table)?;
                Migrator::new(
                    Arc::new(SqlDirectorySource::new(dir, adapter)),
                    Arc::new(ledger),
                )
            }
            Connection::ClickHouse => {
                let adapter = Arc::new(ClickHouseAdapter::connect(&self.config.clickhouse).await?);
                let ledger = ClickHouseLedger::new(adapter.clone(), table)?;
                Migrator::new(
                    Arc::new(SqlDirectorySource::new(dir, adapter)),
                    Arc::new(ledger),
                )
            }
        };

        Ok(migrator.on_progress(print_progress))
    }
}

/// One console line per progress event
pub fn progress_line(event: &MigrationEvent) -> String {
    let label = match event.action {
        MigrationAction::Migrating => "Migrating:",
        MigrationAction::Migrated => "Migrated: ",
        MigrationAction::RollingBack => "Rolling back:",
        MigrationAction::RolledBack => "Rolled back: ",
    };
    format!("{} {}", label, event.migration)
}

fn print_progress(event: &MigrationEvent) {
    println!("{}", progress_line(event));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line() {
        let event = MigrationEvent::new(MigrationAction::Migrated, "2024_01_01_000000_create_users");
        assert_eq!(
            progress_line(&event),
            "Migrated:  2024_01_01_000000_create_users"
        );
    }

    #[test]
    fn test_path_override() {
        let mut context = CommandContext {
            config: RollcallConfig::new(),
            connection: Connection::ClickHouse,
            path: None,
        };
        assert_eq!(context.migrations_dir(), Path::new("clickhouse-migrations"));
        assert_eq!(context.migrations_table(), "clickhouse_migrations");

        context.path = Some(PathBuf::from("db/ch"));
        assert_eq!(context.migrations_dir(), Path::new("db/ch"));
    }
}

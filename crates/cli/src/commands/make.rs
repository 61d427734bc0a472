use std::path::PathBuf;

use chrono::Local;
use rollcall_migrations::{create_migration_file, Connection, StubKind};

use super::CommandContext;

/// Template for a new file; `--create` wins over `--table`
pub fn stub_kind(connection: Connection, create: Option<String>, table: Option<String>) -> StubKind {
    match (connection, create, table) {
        (Connection::ClickHouse, _, _) => StubKind::ClickHouse,
        (Connection::Postgres, Some(table), _) => StubKind::Create { table },
        (Connection::Postgres, None, Some(table)) => StubKind::Update { table },
        (Connection::Postgres, None, None) => StubKind::Blank,
    }
}

pub fn migration(
    context: &CommandContext,
    name: &str,
    create: Option<String>,
    table: Option<String>,
) -> anyhow::Result<PathBuf> {
    let kind = stub_kind(context.connection, create, table);
    let path = create_migration_file(
        context.migrations_dir(),
        &kind,
        name,
        Local::now().naive_local(),
    )?;

    match context.connection {
        Connection::ClickHouse => println!("Created ClickHouse Migration: {}", path.display()),
        Connection::Postgres => println!("Created Migration: {}", path.display()),
    }
    Ok(path)
}

//! Migration file stubs
//!
//! [`generate_stub`] is pure; [`create_migration_file`] is the only part that
//! touches the filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{MigrationError, MigrationResult};
use crate::source::{is_valid_name, migration_suffix};

/// Which template a new migration starts from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubKind {
    Blank,
    /// New PostgreSQL table with id and timestamps
    Create { table: String },
    /// Changes to an existing PostgreSQL table
    Update { table: String },
    /// ClickHouse file with example MergeTree DDL
    ClickHouse,
}

/// Render the file body for a new migration
pub fn generate_stub(kind: &StubKind, name: &str) -> String {
    let header = format!("-- Migration: {}\n\n", studly_case(name));

    let body = match kind {
        StubKind::Blank => "-- Up migration\n\
             -- Add your schema changes here\n\n\n\
             -- Down migration\n\
             -- Add rollback statements here\n"
            .to_string(),
        StubKind::Create { table } => format!(
            "-- Up migration\n\
             CREATE TABLE {table} (\n    \
                 id BIGSERIAL PRIMARY KEY,\n    \
                 created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,\n    \
                 updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP\n\
             );\n\n\
             -- Down migration\n\
             DROP TABLE IF EXISTS {table};\n",
            table = table
        ),
        StubKind::Update { table } => format!(
            "-- Up migration\n\
             -- ALTER TABLE {table} ADD COLUMN example VARCHAR(255);\n\n\
             -- Down migration\n\
             -- ALTER TABLE {table} DROP COLUMN example;\n",
            table = table
        ),
        StubKind::ClickHouse => "-- Up migration\n\
             -- Add your ClickHouse statements here, for example:\n\
             -- CREATE TABLE example_table (\n\
             --     id UInt64,\n\
             --     name String,\n\
             --     created_at DateTime DEFAULT now()\n\
             -- ) ENGINE = MergeTree()\n\
             -- ORDER BY id;\n\n\
             -- Down migration\n\
             -- DROP TABLE IF EXISTS example_table;\n"
            .to_string(),
    };

    header + &body
}

/// `YYYY_MM_DD_HHMMSS_<snake_name>.sql`
pub fn migration_file_name(name: &str, now: NaiveDateTime) -> String {
    format!("{}_{}.sql", now.format("%Y_%m_%d_%H%M%S"), snake_case(name))
}

/// `CreateUsersTable` / `create users-table` -> `create_users_table`
pub fn snake_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    for (i, c) in value.trim().chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c == ' ' || c == '-' {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `create_users_table` -> `CreateUsersTable`
pub fn studly_case(value: &str) -> String {
    value
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Write a new migration into `dir`, refusing names that already exist
pub fn create_migration_file(
    dir: &Path,
    kind: &StubKind,
    name: &str,
    now: NaiveDateTime,
) -> MigrationResult<PathBuf> {
    let file_name = migration_file_name(name, now);
    let stem = file_name.trim_end_matches(".sql");
    let suffix = snake_case(name);

    if !is_valid_name(stem) {
        return Err(MigrationError::InvalidName {
            name: name.to_string(),
        });
    }

    let path = dir.join(&file_name);
    if path.exists() {
        return Err(MigrationError::DuplicateDefinition {
            name: stem.to_string(),
        });
    }

    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let existing = entry?.path();
            let Some(existing_stem) = existing.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if migration_suffix(existing_stem) == Some(suffix.as_str()) {
                return Err(MigrationError::DuplicateDefinition {
                    name: existing_stem.to_string(),
                });
            }
        }
    } else {
        fs::create_dir_all(dir)?;
    }

    fs::write(&path, generate_stub(kind, name))?;
    tracing::debug!(path = %path.display(), "created migration file");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::parse_sql_sections;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 25)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_case_helpers() {
        assert_eq!(snake_case("CreateUsersTable"), "create_users_table");
        assert_eq!(snake_case("create_users_table"), "create_users_table");
        assert_eq!(snake_case("add kast-column"), "add_kast_column");
        assert_eq!(studly_case("create_users_table"), "CreateUsersTable");
        assert_eq!(studly_case("CreateUsersTable"), "CreateUsersTable");
    }

    #[test]
    fn test_file_name_shape() {
        assert_eq!(
            migration_file_name("CreateUserEvents", at(19, 32, 49)),
            "2025_06_25_193249_create_user_events.sql"
        );
    }

    #[test]
    fn test_create_stub_round_trips_through_parser() {
        let stub = generate_stub(
            &StubKind::Create {
                table: "teams".to_string(),
            },
            "create_teams_table",
        );
        assert!(stub.starts_with("-- Migration: CreateTeamsTable"));

        let (up, down) = parse_sql_sections(&stub);
        assert!(up.starts_with("CREATE TABLE teams ("));
        assert!(up.contains("id BIGSERIAL PRIMARY KEY"));
        assert_eq!(down, "DROP TABLE IF EXISTS teams;");
    }

    #[test]
    fn test_commented_stubs_have_empty_scripts() {
        for kind in [
            StubKind::Blank,
            StubKind::Update {
                table: "players".to_string(),
            },
            StubKind::ClickHouse,
        ] {
            let (up, down) = parse_sql_sections(&generate_stub(&kind, "change_things"));
            assert!(up.is_empty(), "{:?}", kind);
            assert!(down.is_empty(), "{:?}", kind);
        }

        let clickhouse = generate_stub(&StubKind::ClickHouse, "create_user_events");
        assert!(clickhouse.contains("ENGINE = MergeTree()"));
        let update = generate_stub(
            &StubKind::Update {
                table: "players".to_string(),
            },
            "add_rating",
        );
        assert!(update.contains("ALTER TABLE players"));
    }

    #[test]
    fn test_create_migration_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("migrations");

        let path = create_migration_file(
            &target,
            &StubKind::Blank,
            "CreateMapsTable",
            at(19, 40, 48),
        )
        .unwrap();

        assert_eq!(
            path.file_name().unwrap(),
            "2025_06_25_194048_create_maps_table.sql"
        );
        assert!(fs::read_to_string(&path)
            .unwrap()
            .contains("-- Up migration"));
    }

    #[test]
    fn test_refuses_duplicate_suffix() {
        let dir = TempDir::new().unwrap();
        create_migration_file(dir.path(), &StubKind::Blank, "create_maps_table", at(19, 40, 48))
            .unwrap();

        let err = create_migration_file(
            dir.path(),
            &StubKind::Blank,
            "CreateMapsTable",
            at(20, 0, 0),
        )
        .unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateDefinition { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_rejects_unusable_name() {
        let dir = TempDir::new().unwrap();
        let err = create_migration_file(dir.path(), &StubKind::Blank, "drop!", at(0, 0, 0))
            .unwrap_err();
        assert!(matches!(err, MigrationError::InvalidName { .. }));
    }
}

//! # rollcall-migrations: migration ledger and apply/rollback engine
//!
//! Applies ordered, named schema migrations to PostgreSQL (through sqlx) and
//! ClickHouse (through its HTTP interface), records what ran in a per-backend
//! ledger table grouped into batches, and undoes them by batch, by step count
//! or entirely.
//!
//! The pieces are wired by the caller: a [`MigrationSource`] that lists
//! units, a [`Ledger`] that stores records, and the [`Migrator`] that drives
//! both. Units execute through a [`BackendAdapter`] handed to them at
//! construction.

pub mod backends;
pub mod config;
pub mod definitions;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod migration;
pub mod schema_builder;
pub mod source;
pub mod sql;
pub mod stub;

pub use backends::{BackendAdapter, Capability, ClickHouseAdapter, ExecutionOutcome, PostgresAdapter};
pub use config::{ClickHouseConfig, Connection, MigrationConfig, PostgresConfig, RollcallConfig};
pub use definitions::*;
pub use engine::{Migrator, ProgressListener};
pub use error::{MigrationError, MigrationResult};
pub use ledger::{ClickHouseLedger, Ledger, MemoryLedger, PostgresLedger};
pub use migration::{Migration, MigrationUnit, SchemaMigration, SqlMigration};
pub use schema_builder::{ColumnDefinition, ColumnKind, Operation, SchemaBuilder, SchemaOperation, TableBuilder};
pub use source::{MigrationRegistry, MigrationSource, SqlDirectorySource, TimestampShape};
pub use sql::Dialect;
pub use stub::{create_migration_file, generate_stub, migration_file_name, StubKind};

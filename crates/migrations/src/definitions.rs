//! Migration Definitions - Core types shared by the ledger and the engine
//!
//! Defines ledger records, status rows, progress events and the results
//! returned by apply and rollback runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// A row of the migration ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Surrogate key, monotonic per ledger
    pub id: i64,
    /// Migration name (file stem)
    pub migration: String,
    /// Batch number (for grouping migrations)
    pub batch: i64,
    /// When the migration was applied
    pub applied_at: DateTime<Utc>,
}

/// Status of a single source migration joined against the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub migration: String,
    pub ran: bool,
    pub batch: Option<i64>,
}

/// What happened to a migration during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationAction {
    Migrating,
    Migrated,
    RollingBack,
    RolledBack,
}

impl MigrationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationAction::Migrating => "migrating",
            MigrationAction::Migrated => "migrated",
            MigrationAction::RollingBack => "rolling back",
            MigrationAction::RolledBack => "rolled back",
        }
    }
}

impl std::fmt::Display for MigrationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress event emitted by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationEvent {
    pub action: MigrationAction,
    pub migration: String,
}

impl MigrationEvent {
    pub fn new(action: MigrationAction, migration: impl Into<String>) -> Self {
        Self {
            action,
            migration: migration.into(),
        }
    }
}

/// Which applied migrations a rollback selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackSelection {
    /// Every record, batch desc then name desc
    All,
    /// Records of the most recent batch, name desc
    LastBatch,
    /// The N most recent records regardless of batch boundaries
    Steps(usize),
}

/// Recoverable condition found during rollback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerWarning {
    pub migration: String,
    pub message: String,
}

impl From<MigrationError> for LedgerWarning {
    fn from(err: MigrationError) -> Self {
        Self {
            migration: err.migration().unwrap_or_default().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of running migrations
#[derive(Debug, Clone, Default)]
pub struct MigrationRunResult {
    /// Batch allocated for this run, `None` when nothing was pending
    pub batch: Option<i64>,
    /// Names of migrations that were applied, in apply order
    pub applied_migrations: Vec<String>,
    /// Number of migrations that were skipped (already applied)
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied_migrations.len()
    }

    pub fn nothing_to_migrate(&self) -> bool {
        self.applied_migrations.is_empty()
    }
}

/// Result of rolling back migrations
#[derive(Debug, Clone, Default)]
pub struct RollbackResult {
    /// Names of migrations that were rolled back, in rollback order
    pub rolled_back_migrations: Vec<String>,
    /// Records removed without running `down()` because the source lacked them
    pub warnings: Vec<LedgerWarning>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl RollbackResult {
    pub fn rolled_back_count(&self) -> usize {
        self.rolled_back_migrations.len()
    }

    pub fn nothing_to_rollback(&self) -> bool {
        self.rolled_back_migrations.is_empty()
    }
}

/// Result of a reset followed by a full apply
#[derive(Debug, Clone, Default)]
pub struct RefreshResult {
    pub reset: RollbackResult,
    pub migrate: MigrationRunResult,
}

//! Migration Engine - apply, rollback, refresh and status
//!
//! Every backend call is awaited in sequence: one unit finishes before the
//! next starts. A failing unit aborts the run; units already applied in the
//! same run stay recorded. There is no inter-process locking, so two
//! concurrent runs against one ledger can race on the batch number.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::definitions::{
    LedgerWarning, MigrationAction, MigrationEvent, MigrationRecord, MigrationRunResult,
    MigrationStatus, RefreshResult, RollbackResult, RollbackSelection,
};
use crate::error::{MigrationError, MigrationResult};
use crate::ledger::Ledger;
use crate::migration::MigrationUnit;
use crate::source::MigrationSource;

/// Callback receiving progress events as they happen
pub type ProgressListener = Box<dyn Fn(&MigrationEvent) + Send + Sync>;

pub struct Migrator {
    source: Arc<dyn MigrationSource>,
    ledger: Arc<dyn Ledger>,
    listener: Option<ProgressListener>,
}

impl Migrator {
    pub fn new(source: Arc<dyn MigrationSource>, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            source,
            ledger,
            listener: None,
        }
    }

    /// Register a progress listener
    pub fn on_progress<F>(mut self, listener: F) -> Self
    where
        F: Fn(&MigrationEvent) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn source(&self) -> &Arc<dyn MigrationSource> {
        &self.source
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Apply every pending unit in one new batch
    pub async fn migrate(&self) -> MigrationResult<MigrationRunResult> {
        let start_time = Instant::now();

        self.ledger.ensure_store().await?;

        tracing::debug!(table = self.ledger.table(), "computing pending migrations");
        let units = self.source.list().await?;
        let applied: HashSet<String> = self
            .ledger
            .records()
            .await?
            .into_iter()
            .map(|record| record.migration)
            .collect();

        let (done, pending): (Vec<MigrationUnit>, Vec<MigrationUnit>) = units
            .into_iter()
            .partition(|unit| applied.contains(unit.name()));

        if pending.is_empty() {
            tracing::info!("Nothing to migrate.");
            return Ok(MigrationRunResult {
                batch: None,
                applied_migrations: Vec::new(),
                skipped_count: done.len(),
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        }

        let batch = self.ledger.next_batch().await?;
        tracing::debug!(batch, pending = pending.len(), "applying migrations");

        let mut applied_migrations = Vec::with_capacity(pending.len());
        for unit in &pending {
            self.emit(MigrationAction::Migrating, unit.name());

            unit.up()
                .await
                .map_err(|e| MigrationError::execution(unit.name(), e))?;
            self.ledger.record(unit.name(), batch).await?;

            self.emit(MigrationAction::Migrated, unit.name());
            applied_migrations.push(unit.name().to_string());
        }

        tracing::debug!(batch, applied = applied_migrations.len(), "apply finished");
        Ok(MigrationRunResult {
            batch: Some(batch),
            applied_migrations,
            skipped_count: done.len(),
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Undo the selected records, most recent first
    pub async fn rollback(&self, selection: RollbackSelection) -> MigrationResult<RollbackResult> {
        let start_time = Instant::now();

        if !self.ledger.store_exists().await? {
            tracing::info!(table = self.ledger.table(), "Migration table not found.");
            return Ok(RollbackResult {
                execution_time_ms: start_time.elapsed().as_millis(),
                ..RollbackResult::default()
            });
        }

        tracing::debug!(?selection, "selecting rollback set");
        let selected = select_for_rollback(self.ledger.records().await?, selection);

        if selected.is_empty() {
            tracing::info!("Nothing to rollback.");
            return Ok(RollbackResult {
                execution_time_ms: start_time.elapsed().as_millis(),
                ..RollbackResult::default()
            });
        }

        let units: HashMap<String, MigrationUnit> = self
            .source
            .list()
            .await?
            .into_iter()
            .map(|unit| (unit.name().to_string(), unit))
            .collect();

        tracing::debug!(count = selected.len(), "rolling back migrations");
        let mut result = RollbackResult::default();
        for record in &selected {
            let name = record.migration.as_str();
            self.emit(MigrationAction::RollingBack, name);

            match units.get(name) {
                Some(unit) => unit
                    .down()
                    .await
                    .map_err(|e| MigrationError::execution(name, e))?,
                None => {
                    let warning = LedgerWarning::from(MigrationError::LedgerCorruption {
                        migration: name.to_string(),
                    });
                    tracing::warn!(migration = name, "{}", warning.message);
                    result.warnings.push(warning);
                }
            }

            self.ledger.remove(name).await?;
            self.emit(MigrationAction::RolledBack, name);
            result.rolled_back_migrations.push(name.to_string());
        }

        result.execution_time_ms = start_time.elapsed().as_millis();
        Ok(result)
    }

    /// Roll back everything
    pub async fn reset(&self) -> MigrationResult<RollbackResult> {
        self.rollback(RollbackSelection::All).await
    }

    /// Reset, then apply everything in a fresh batch
    pub async fn refresh(&self) -> MigrationResult<RefreshResult> {
        let reset = self.reset().await?;
        let migrate = self.migrate().await?;
        Ok(RefreshResult { reset, migrate })
    }

    /// Source units joined with the ledger; never creates the ledger store
    pub async fn status(&self) -> MigrationResult<Vec<MigrationStatus>> {
        let batches: HashMap<String, i64> = if self.ledger.store_exists().await? {
            self.ledger
                .records()
                .await?
                .into_iter()
                .map(|record| (record.migration, record.batch))
                .collect()
        } else {
            tracing::debug!(table = self.ledger.table(), "ledger store missing, reporting all pending");
            HashMap::new()
        };

        Ok(self
            .source
            .list()
            .await?
            .iter()
            .map(|unit| {
                let batch = batches.get(unit.name()).copied();
                MigrationStatus {
                    migration: unit.name().to_string(),
                    ran: batch.is_some(),
                    batch,
                }
            })
            .collect())
    }

    fn emit(&self, action: MigrationAction, migration: &str) {
        match action {
            MigrationAction::Migrated | MigrationAction::RolledBack => {
                tracing::info!(migration, "{}", action)
            }
            _ => tracing::debug!(migration, "{}", action),
        }

        if let Some(listener) = &self.listener {
            listener(&MigrationEvent::new(action, migration));
        }
    }
}

/// Records are expected in rollback order (batch desc, name desc)
fn select_for_rollback(
    records: Vec<MigrationRecord>,
    selection: RollbackSelection,
) -> Vec<MigrationRecord> {
    match selection {
        RollbackSelection::All => records,
        RollbackSelection::Steps(steps) => records.into_iter().take(steps).collect(),
        RollbackSelection::LastBatch => {
            let Some(last) = records.first().map(|record| record.batch) else {
                return records;
            };
            records
                .into_iter()
                .take_while(|record| record.batch == last)
                .collect()
        }
    }
}

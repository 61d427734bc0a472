//! Migration Sources - discover the units a run can apply
//!
//! Sources return units in lexicographic name order and never consult the
//! ledger. [`MigrationRegistry`] holds units coded in Rust;
//! [`SqlDirectorySource`] turns `<timestamp>_<name>.sql` files into
//! [`SqlMigration`] units bound to an adapter.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::backends::BackendAdapter;
use crate::error::{MigrationError, MigrationResult};
use crate::migration::{Migration, MigrationUnit, SqlMigration};

/// `<timestamp>_<description>` with one of the supported timestamp shapes
static MIGRATION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<compact>\d{14})|(?P<split>\d{8}_\d{6})|(?P<dated>\d{4}_\d{2}_\d{2}_\d{6}))_(?P<suffix>[a-z0-9_]+)$",
    )
    .expect("migration name pattern is valid")
});

/// Layout of a migration name's timestamp prefix
///
/// Names sort chronologically only among names of the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimestampShape {
    /// `YYYYMMDDHHMMSS`
    Compact,
    /// `YYYYMMDD_HHMMSS`
    Split,
    /// `YYYY_MM_DD_HHMMSS`, the `make:migration` format
    Dated,
}

/// Whether `name` follows the migration naming convention
pub fn is_valid_name(name: &str) -> bool {
    MIGRATION_NAME.is_match(name)
}

/// Descriptive part of a migration name, without its timestamp prefix
pub fn migration_suffix(name: &str) -> Option<&str> {
    MIGRATION_NAME
        .captures(name)
        .and_then(|caps| caps.name("suffix"))
        .map(|m| m.as_str())
}

pub fn timestamp_shape(name: &str) -> Option<TimestampShape> {
    let caps = MIGRATION_NAME.captures(name)?;
    if caps.name("compact").is_some() {
        Some(TimestampShape::Compact)
    } else if caps.name("split").is_some() {
        Some(TimestampShape::Split)
    } else {
        Some(TimestampShape::Dated)
    }
}

/// Distinct timestamp shapes among `names`, ignoring invalid names
pub fn timestamp_shapes<'a>(names: impl IntoIterator<Item = &'a str>) -> BTreeSet<TimestampShape> {
    names.into_iter().filter_map(timestamp_shape).collect()
}

#[async_trait]
pub trait MigrationSource: Send + Sync {
    /// Every unit, ordered by name
    async fn list(&self) -> MigrationResult<Vec<MigrationUnit>>;

    async fn find(&self, name: &str) -> MigrationResult<Option<MigrationUnit>> {
        Ok(self.list().await?.into_iter().find(|unit| unit.name() == name))
    }
}

/// Explicit registry of units built in code
#[derive(Default)]
pub struct MigrationRegistry {
    units: BTreeMap<String, MigrationUnit>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        migration: Arc<dyn Migration>,
    ) -> MigrationResult<&mut Self> {
        if !is_valid_name(name) {
            return Err(MigrationError::InvalidName {
                name: name.to_string(),
            });
        }
        if self.units.contains_key(name) {
            return Err(MigrationError::DuplicateDefinition {
                name: name.to_string(),
            });
        }

        self.units
            .insert(name.to_string(), MigrationUnit::new(name, migration));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[async_trait]
impl MigrationSource for MigrationRegistry {
    async fn list(&self) -> MigrationResult<Vec<MigrationUnit>> {
        Ok(self.units.values().cloned().collect())
    }

    async fn find(&self, name: &str) -> MigrationResult<Option<MigrationUnit>> {
        Ok(self.units.get(name).cloned())
    }
}

/// Directory of `.sql` migration files
pub struct SqlDirectorySource {
    dir: PathBuf,
    adapter: Arc<dyn BackendAdapter>,
}

impl SqlDirectorySource {
    pub fn new(dir: impl Into<PathBuf>, adapter: Arc<dyn BackendAdapter>) -> Self {
        Self {
            dir: dir.into(),
            adapter,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn load_file(&self, path: &Path, name: &str) -> MigrationResult<MigrationUnit> {
        let content = tokio::fs::read_to_string(path).await?;
        let (up_sql, down_sql) = parse_sql_sections(&content);
        Ok(MigrationUnit::new(
            name,
            Arc::new(SqlMigration::new(up_sql, down_sql, self.adapter.clone())),
        ))
    }
}

#[async_trait]
impl MigrationSource for SqlDirectorySource {
    async fn list(&self) -> MigrationResult<Vec<MigrationUnit>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %self.dir.display(), "migrations directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut units = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_file = tokio::fs::metadata(&path)
                .await
                .map_or(false, |meta| meta.is_file());
            if !is_file || path.extension().map_or(true, |ext| ext != "sql") {
                continue;
            }

            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_valid_name(name) {
                tracing::warn!(file = %path.display(), "skipping file that does not follow the migration naming convention");
                continue;
            }

            units.push(self.load_file(&path, name).await?);
        }

        units.sort_by(|a, b| a.name().cmp(b.name()));

        let shapes = timestamp_shapes(units.iter().map(|unit| unit.name()));
        if shapes.len() > 1 {
            tracing::warn!(
                dir = %self.dir.display(),
                ?shapes,
                "migration names mix timestamp formats; run order follows the names, not the dates"
            );
        }

        Ok(units)
    }
}

/// Split a migration file into its `-- up` and `-- down` scripts
///
/// Comment and blank lines are dropped; anything before the first marker is
/// ignored.
pub fn parse_sql_sections(content: &str) -> (String, String) {
    #[derive(PartialEq)]
    enum Section {
        Preamble,
        Up,
        Down,
    }

    let mut up_sql = Vec::new();
    let mut down_sql = Vec::new();
    let mut section = Section::Preamble;

    for line in content.lines() {
        let trimmed = line.trim();
        let lowered = trimmed.to_lowercase();

        if lowered.starts_with("--") {
            let marker = lowered.trim_start_matches('-').trim();
            if marker == "up" || marker.starts_with("up ") || marker.contains("up migration") {
                section = Section::Up;
            } else if marker == "down"
                || marker.starts_with("down ")
                || marker.contains("down migration")
            {
                section = Section::Down;
            }
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        match section {
            Section::Up => up_sql.push(line),
            Section::Down => down_sql.push(line),
            Section::Preamble => {}
        }
    }

    (
        up_sql.join("\n").trim().to_string(),
        down_sql.join("\n").trim().to_string(),
    )
}

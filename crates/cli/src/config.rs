//! Environment configuration
//!
//! The only place that reads process environment. Everything downstream
//! receives a resolved [`RollcallConfig`].

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use rollcall_migrations::RollcallConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

/// Configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>;

    fn validate(&self) -> Result<(), ConfigError>;
}

/// Load `.env` from the working directory; existing variables win.
/// Returns the loaded path, `None` when there is no `.env`.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, expected: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: key.to_string(),
                value,
                expected: expected.to_string(),
            }),
        None => Ok(None),
    }
}

impl FromEnv for RollcallConfig {
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RollcallConfig::new();

        // PostgreSQL
        if let Some(host) = lookup("POSTGRES_HOST") {
            config.postgres.host = host;
        }
        if let Some(port) = parse_var(&lookup, "POSTGRES_PORT", "valid port number (1-65535)")? {
            config.postgres.port = port;
        }
        if let Some(database) = lookup("POSTGRES_DB") {
            config.postgres.database = database;
        }
        if let Some(username) = lookup("POSTGRES_USER") {
            config.postgres.username = username;
        }
        if let Some(password) = lookup("POSTGRES_PASSWORD") {
            config.postgres.password = password;
        }
        if let Some(table) = lookup("MIGRATION_TABLE") {
            config.postgres_migrations.migrations_table = table;
        }
        if let Some(path) = lookup("MIGRATIONS_PATH") {
            config.postgres_migrations.migrations_dir = PathBuf::from(path);
        }

        // ClickHouse
        if let Some(host) = lookup("CLICKHOUSE_HOST") {
            config.clickhouse.host = host;
        }
        if let Some(port) = parse_var(&lookup, "CLICKHOUSE_PORT", "valid port number (1-65535)")? {
            config.clickhouse.port = port;
        }
        if let Some(username) = lookup("CLICKHOUSE_USERNAME") {
            config.clickhouse.username = username;
        }
        if let Some(password) = lookup("CLICKHOUSE_PASSWORD") {
            config.clickhouse.password = password;
        }
        if let Some(database) = lookup("CLICKHOUSE_DATABASE") {
            config.clickhouse.database = database;
        }
        if let Some(table) = lookup("CLICKHOUSE_MIGRATION_TABLE") {
            config.clickhouse_migrations.migrations_table = table;
        }
        if let Some(path) = lookup("CLICKHOUSE_MIGRATIONS_PATH") {
            config.clickhouse_migrations.migrations_dir = PathBuf::from(path);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, port) in [
            ("POSTGRES_PORT", self.postgres.port),
            ("CLICKHOUSE_PORT", self.clickhouse.port),
        ] {
            if port == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: port.to_string(),
                    expected: "port between 1 and 65535".to_string(),
                });
            }
        }

        for (field, value) in [
            ("POSTGRES_HOST", &self.postgres.host),
            ("POSTGRES_DB", &self.postgres.database),
            ("CLICKHOUSE_HOST", &self.clickhouse.host),
            ("MIGRATION_TABLE", &self.postgres_migrations.migrations_table),
            (
                "CLICKHOUSE_MIGRATION_TABLE",
                &self.clickhouse_migrations.migrations_table,
            ),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: field.to_string(),
                    hint: format!("Unset {} or give it a non-empty value", field),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::path::Path;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = RollcallConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, RollcallConfig::new());
        assert_eq!(config.postgres.port, 5432);
        assert_eq!(config.clickhouse.port, 8123);
        assert_eq!(
            config.clickhouse_migrations.migrations_table,
            "clickhouse_migrations"
        );
    }

    #[test]
    fn test_overrides() {
        let config = RollcallConfig::from_lookup(lookup_from(&[
            ("POSTGRES_HOST", "db.internal"),
            ("POSTGRES_PORT", "6432"),
            ("POSTGRES_DB", "cs2_prediction"),
            ("POSTGRES_USER", "cs2_user"),
            ("MIGRATION_TABLE", "schema_migrations"),
            ("MIGRATIONS_PATH", "db/migrations"),
            ("CLICKHOUSE_HOST", "ch.internal"),
            ("CLICKHOUSE_DATABASE", "analytics"),
            ("CLICKHOUSE_MIGRATIONS_PATH", "db/clickhouse"),
        ]))
        .unwrap();

        assert_eq!(config.postgres.host, "db.internal");
        assert_eq!(config.postgres.port, 6432);
        assert_eq!(config.postgres.database, "cs2_prediction");
        assert_eq!(config.postgres.username, "cs2_user");
        assert_eq!(config.postgres_migrations.migrations_table, "schema_migrations");
        assert_eq!(
            config.postgres_migrations.migrations_dir,
            Path::new("db/migrations")
        );
        assert_eq!(config.clickhouse.host, "ch.internal");
        assert_eq!(config.clickhouse.database, "analytics");
        assert_eq!(
            config.clickhouse_migrations.migrations_dir,
            Path::new("db/clickhouse")
        );
    }

    #[test]
    fn test_invalid_port() {
        let err = RollcallConfig::from_lookup(lookup_from(&[("CLICKHOUSE_PORT", "http")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { field, value, .. } => {
                assert_eq!(field, "CLICKHOUSE_PORT");
                assert_eq!(value, "http");
            }
            other => panic!("unexpected error: {}", other),
        }

        assert!(RollcallConfig::from_lookup(lookup_from(&[("POSTGRES_PORT", "0")])).is_err());
    }

    #[test]
    fn test_empty_table_name_is_rejected() {
        let err = RollcallConfig::from_lookup(lookup_from(&[("MIGRATION_TABLE", "  ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
    }

    #[test]
    #[serial]
    fn test_from_process_environment() {
        env::set_var("POSTGRES_HOST", "from-env");
        env::set_var("CLICKHOUSE_MIGRATION_TABLE", "ch_ledger");

        let config = RollcallConfig::from_env().unwrap();

        env::remove_var("POSTGRES_HOST");
        env::remove_var("CLICKHOUSE_MIGRATION_TABLE");

        assert_eq!(config.postgres.host, "from-env");
        assert_eq!(config.clickhouse_migrations.migrations_table, "ch_ledger");
    }
}

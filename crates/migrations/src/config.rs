//! Resolved configuration consumed by adapters, ledgers and sources
//!
//! Nothing in this crate reads the environment. The binary resolves a
//! [`RollcallConfig`] once and threads the relevant parts into constructors.

use std::path::PathBuf;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

/// Connection parameters for the relational store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            username: "postgres".to_string(),
            password: String::new(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl PostgresConfig {
    /// Build sqlx connect options without going through a URL, so credentials
    /// never need escaping
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username);

        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }

    /// Human readable target, without credentials
    pub fn display_target(&self) -> String {
        format!("postgres://{}:{}/{}", self.host, self.port, self.database)
    }
}

/// Connection parameters for the ClickHouse HTTP interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickHouseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8123,
            database: "default".to_string(),
            username: "default".to_string(),
            password: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClickHouseConfig {
    /// Endpoint every statement is posted to
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

/// Where migrations live and which table records them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Table name for tracking migrations
    pub migrations_table: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self::postgres()
    }
}

impl MigrationConfig {
    pub fn postgres() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            migrations_table: "migrations".to_string(),
        }
    }

    pub fn clickhouse() -> Self {
        Self {
            migrations_dir: PathBuf::from("clickhouse-migrations"),
            migrations_table: "clickhouse_migrations".to_string(),
        }
    }
}

/// Which store a run targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connection {
    Postgres,
    ClickHouse,
}

impl std::str::FromStr for Connection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pgsql" | "postgres" | "postgresql" => Ok(Connection::Postgres),
            "clickhouse" | "ch" => Ok(Connection::ClickHouse),
            other => Err(format!(
                "unknown connection '{}', expected pgsql or clickhouse",
                other
            )),
        }
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connection::Postgres => write!(f, "pgsql"),
            Connection::ClickHouse => write!(f, "clickhouse"),
        }
    }
}

/// Everything a run needs, resolved once at the boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollcallConfig {
    pub postgres: PostgresConfig,
    pub postgres_migrations: MigrationConfig,
    pub clickhouse: ClickHouseConfig,
    pub clickhouse_migrations: MigrationConfig,
}

impl RollcallConfig {
    pub fn new() -> Self {
        Self {
            postgres: PostgresConfig::default(),
            postgres_migrations: MigrationConfig::postgres(),
            clickhouse: ClickHouseConfig::default(),
            clickhouse_migrations: MigrationConfig::clickhouse(),
        }
    }

    /// Migration settings for the selected connection
    pub fn migrations_for(&self, connection: Connection) -> &MigrationConfig {
        match connection {
            Connection::Postgres => &self.postgres_migrations,
            Connection::ClickHouse => &self.clickhouse_migrations,
        }
    }
}

impl Default for RollcallConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables() {
        let config = RollcallConfig::new();
        assert_eq!(config.postgres_migrations.migrations_table, "migrations");
        assert_eq!(
            config.migrations_for(Connection::ClickHouse).migrations_table,
            "clickhouse_migrations"
        );
        assert_eq!(config.clickhouse.endpoint(), "http://localhost:8123/");
    }

    #[test]
    fn test_connection_parsing() {
        assert_eq!("pgsql".parse::<Connection>(), Ok(Connection::Postgres));
        assert_eq!("ClickHouse".parse::<Connection>(), Ok(Connection::ClickHouse));
        assert!("mysql".parse::<Connection>().is_err());
    }
}

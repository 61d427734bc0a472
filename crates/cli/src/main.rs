mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rollcall_migrations::Connection;

use commands::{make, migrate, status, CommandContext};
use config::{load_dotenv, FromEnv};
use logging::{init_logging, LogFormat, LoggingConfig};
use rollcall_migrations::RollcallConfig;

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(version, about = "Apply, roll back and inspect PostgreSQL and ClickHouse migrations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend to run against (pgsql or clickhouse)
    #[arg(long, global = true, default_value = "pgsql")]
    connection: Connection,

    /// Migrations directory, overrides MIGRATIONS_PATH / CLICKHOUSE_MIGRATIONS_PATH
    #[arg(long, global = true)]
    path: Option<PathBuf>,

    /// Log level or filter directive, e.g. "debug" or "rollcall_migrations=trace"
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value = "plain")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pending migrations
    #[command(name = "migrate")]
    Migrate,

    /// Show the status of each migration
    #[command(name = "migrate:status")]
    Status,

    /// Roll back the last batch, or the given number of migrations
    #[command(name = "migrate:rollback")]
    Rollback {
        /// Number of migrations to roll back, across batches
        #[arg(long)]
        steps: Option<usize>,
    },

    /// Roll back all migrations
    #[command(name = "migrate:reset")]
    Reset,

    /// Roll back all migrations and run them again
    #[command(name = "migrate:refresh")]
    Refresh,

    /// Create a new migration file
    #[command(name = "make:migration")]
    MakeMigration {
        /// Migration name, e.g. create_users_table or CreateUsersTable
        name: String,

        /// The table to be created
        #[arg(long)]
        create: Option<String>,

        /// The table to migrate
        #[arg(long)]
        table: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = load_dotenv();
    let cli = Cli::parse();

    let logging = LoggingConfig::default()
        .with_level(cli.log_level.as_str())
        .with_format(cli.log_format)
        .with_service(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    if let Err(e) = init_logging(logging) {
        eprintln!("Error: failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }
    match dotenv {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "loaded .env"),
        Ok(None) => {}
        Err(e) => tracing::warn!("failed to load .env: {}", e),
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let context = CommandContext {
        config: RollcallConfig::from_env()?,
        connection: cli.connection,
        path: cli.path,
    };
    tracing::debug!(connection = %context.connection, dir = %context.migrations_dir().display(), "resolved configuration");

    match cli.command {
        Commands::Migrate => migrate::run(&context).await?,
        Commands::Status => status::run(&context).await?,
        Commands::Rollback { steps } => migrate::rollback(&context, steps).await?,
        Commands::Reset => migrate::reset(&context).await?,
        Commands::Refresh => migrate::refresh(&context).await?,
        Commands::MakeMigration {
            name,
            create,
            table,
        } => {
            make::migration(&context, &name, create, table)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_rollback_steps() {
        let cli = Cli::try_parse_from(["rollcall", "migrate:rollback", "--steps", "2"]).unwrap();
        assert!(matches!(cli.command, Commands::Rollback { steps: Some(2) }));
        assert_eq!(cli.connection, Connection::Postgres);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rollcall",
            "migrate",
            "--connection",
            "clickhouse",
            "--path",
            "db/ch",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Migrate));
        assert_eq!(cli.connection, Connection::ClickHouse);
        assert_eq!(cli.path, Some(PathBuf::from("db/ch")));
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_parse_make_migration() {
        let cli = Cli::try_parse_from([
            "rollcall",
            "make:migration",
            "create_teams_table",
            "--create",
            "teams",
        ])
        .unwrap();

        match cli.command {
            Commands::MakeMigration { name, create, table } => {
                assert_eq!(name, "create_teams_table");
                assert_eq!(create.as_deref(), Some("teams"));
                assert_eq!(table, None);
            }
            _ => panic!("expected make:migration"),
        }
    }

    #[test]
    fn test_unknown_connection_is_rejected() {
        assert!(Cli::try_parse_from(["rollcall", "migrate", "--connection", "mysql"]).is_err());
    }
}

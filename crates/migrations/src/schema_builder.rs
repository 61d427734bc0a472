//! Schema Builder - DSL for creating database schema changes
//!
//! Provides a fluent interface for building structured schema operations.
//! Operations stay dialect-neutral until an adapter renders them, so the same
//! builder serves PostgreSQL and ClickHouse migrations.

use crate::error::{MigrationError, MigrationResult};
use crate::sql::Dialect;

/// A unit of work handed to a backend adapter
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Structured schema change, rendered per dialect
    Schema(SchemaOperation),
    /// Raw statement or script, passed through verbatim
    Raw(String),
}

impl Operation {
    pub fn raw(sql: impl Into<String>) -> Self {
        Operation::Raw(sql.into())
    }

    /// Render into the statements to send, one request or execution each
    pub fn render(&self, dialect: Dialect) -> MigrationResult<Vec<String>> {
        match self {
            Operation::Schema(op) => Ok(vec![op.to_sql(dialect)?]),
            Operation::Raw(sql) => Ok(crate::sql::split_statements(sql, dialect)),
        }
    }
}

impl From<SchemaOperation> for Operation {
    fn from(op: SchemaOperation) -> Self {
        Operation::Schema(op)
    }
}

/// Structured schema-change primitives
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaOperation {
    CreateTable(TableBuilder),
    DropTable {
        table: String,
    },
    AddColumn {
        table: String,
        column: ColumnDefinition,
    },
    DropColumn {
        table: String,
        column: String,
    },
    AddConstraint {
        table: String,
        name: String,
        definition: String,
    },
    DropConstraint {
        table: String,
        name: String,
    },
    CreateIndex {
        table: String,
        name: String,
        columns: Vec<String>,
        index_type: Option<String>,
    },
    DropIndex {
        table: String,
        name: String,
    },
}

impl SchemaOperation {
    pub fn to_sql(&self, dialect: Dialect) -> MigrationResult<String> {
        match self {
            SchemaOperation::CreateTable(table) => table.to_sql(dialect),
            SchemaOperation::DropTable { table } => Ok(format!("DROP TABLE IF EXISTS {}", table)),
            SchemaOperation::AddColumn { table, column } => Ok(format!(
                "ALTER TABLE {} ADD COLUMN {}",
                table,
                column.to_sql(dialect)
            )),
            SchemaOperation::DropColumn { table, column } => {
                Ok(format!("ALTER TABLE {} DROP COLUMN {}", table, column))
            }
            SchemaOperation::AddConstraint {
                table,
                name,
                definition,
            } => {
                if dialect == Dialect::ClickHouse && !is_check(definition) {
                    return Err(MigrationError::unsupported(
                        format!("ADD CONSTRAINT {} {}", name, definition),
                        dialect.name(),
                    ));
                }
                Ok(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} {}",
                    table, name, definition
                ))
            }
            SchemaOperation::DropConstraint { table, name } => {
                Ok(format!("ALTER TABLE {} DROP CONSTRAINT {}", table, name))
            }
            SchemaOperation::CreateIndex {
                table,
                name,
                columns,
                index_type,
            } => match dialect {
                Dialect::Postgres => {
                    let using = index_type
                        .as_ref()
                        .map(|t| format!(" USING {}", t))
                        .unwrap_or_default();
                    Ok(format!(
                        "CREATE INDEX {} ON {}{} ({})",
                        name,
                        table,
                        using,
                        columns.join(", ")
                    ))
                }
                Dialect::ClickHouse => {
                    let expr = if columns.len() == 1 {
                        columns[0].clone()
                    } else {
                        format!("({})", columns.join(", "))
                    };
                    Ok(format!(
                        "ALTER TABLE {} ADD INDEX {} {} TYPE {} GRANULARITY 1",
                        table,
                        name,
                        expr,
                        index_type.as_deref().unwrap_or("bloom_filter")
                    ))
                }
            },
            SchemaOperation::DropIndex { table, name } => match dialect {
                Dialect::Postgres => Ok(format!("DROP INDEX IF EXISTS {}", name)),
                Dialect::ClickHouse => Ok(format!("ALTER TABLE {} DROP INDEX {}", table, name)),
            },
        }
    }
}

fn is_check(definition: &str) -> bool {
    definition.trim_start().to_uppercase().starts_with("CHECK")
}

/// Basic schema operations for migrations
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    operations: Vec<SchemaOperation>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Create a new table
    pub fn create_table<F>(&mut self, table_name: &str, callback: F) -> &mut Self
    where
        F: FnOnce(&mut TableBuilder),
    {
        let mut table_builder = TableBuilder::new(table_name);
        callback(&mut table_builder);

        self.operations
            .push(SchemaOperation::CreateTable(table_builder));
        self
    }

    /// Drop a table
    pub fn drop_table(&mut self, table_name: &str) -> &mut Self {
        self.operations.push(SchemaOperation::DropTable {
            table: table_name.to_string(),
        });
        self
    }

    /// Add a column to existing table
    pub fn add_column(&mut self, table_name: &str, column_name: &str, kind: ColumnKind) -> &mut Self {
        self.operations.push(SchemaOperation::AddColumn {
            table: table_name.to_string(),
            column: ColumnDefinition::new(column_name, kind),
        });
        self
    }

    /// Drop a column from existing table
    pub fn drop_column(&mut self, table_name: &str, column_name: &str) -> &mut Self {
        self.operations.push(SchemaOperation::DropColumn {
            table: table_name.to_string(),
            column: column_name.to_string(),
        });
        self
    }

    /// Add a named constraint, e.g. `UNIQUE (email)` or `CHECK (rating >= 0)`
    pub fn add_constraint(&mut self, table_name: &str, name: &str, definition: &str) -> &mut Self {
        self.operations.push(SchemaOperation::AddConstraint {
            table: table_name.to_string(),
            name: name.to_string(),
            definition: definition.to_string(),
        });
        self
    }

    pub fn drop_constraint(&mut self, table_name: &str, name: &str) -> &mut Self {
        self.operations.push(SchemaOperation::DropConstraint {
            table: table_name.to_string(),
            name: name.to_string(),
        });
        self
    }

    /// Create an index
    pub fn create_index(
        &mut self,
        table_name: &str,
        column_names: &[&str],
        index_name: Option<&str>,
    ) -> &mut Self {
        let default_name = format!("idx_{}_{}", table_name, column_names.join("_"));
        self.operations.push(SchemaOperation::CreateIndex {
            table: table_name.to_string(),
            name: index_name.unwrap_or(&default_name).to_string(),
            columns: column_names.iter().map(|c| c.to_string()).collect(),
            index_type: None,
        });
        self
    }

    /// Create an index of an explicit type (`gin` on PostgreSQL, `minmax` or
    /// `set(100)` on ClickHouse)
    pub fn create_typed_index(
        &mut self,
        table_name: &str,
        column_names: &[&str],
        index_name: &str,
        index_type: &str,
    ) -> &mut Self {
        self.operations.push(SchemaOperation::CreateIndex {
            table: table_name.to_string(),
            name: index_name.to_string(),
            columns: column_names.iter().map(|c| c.to_string()).collect(),
            index_type: Some(index_type.to_string()),
        });
        self
    }

    /// Drop an index
    pub fn drop_index(&mut self, table_name: &str, index_name: &str) -> &mut Self {
        self.operations.push(SchemaOperation::DropIndex {
            table: table_name.to_string(),
            name: index_name.to_string(),
        });
        self
    }

    /// Operations collected so far
    pub fn operations(&self) -> &[SchemaOperation] {
        &self.operations
    }

    /// Consume the builder into adapter operations
    pub fn into_operations(self) -> Vec<Operation> {
        self.operations.into_iter().map(Operation::Schema).collect()
    }

    /// Render every operation for a dialect
    pub fn to_sql(&self, dialect: Dialect) -> MigrationResult<Vec<String>> {
        self.operations.iter().map(|op| op.to_sql(dialect)).collect()
    }
}

/// Dialect-neutral column types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// Auto-increment primary key on PostgreSQL, UInt64 on ClickHouse
    Id,
    Uuid,
    String(Option<u32>),
    Integer,
    BigInteger,
    Float,
    Boolean,
    Timestamp,
    Json,
    /// Vendor type passed through verbatim
    Custom(String),
}

impl ColumnKind {
    pub fn to_sql(&self, dialect: Dialect) -> String {
        match (self, dialect) {
            (ColumnKind::Id, Dialect::Postgres) => "SERIAL PRIMARY KEY".to_string(),
            (ColumnKind::Id, Dialect::ClickHouse) => "UInt64".to_string(),
            (ColumnKind::Uuid, Dialect::Postgres) => "UUID DEFAULT gen_random_uuid()".to_string(),
            (ColumnKind::Uuid, Dialect::ClickHouse) => "UUID DEFAULT generateUUIDv4()".to_string(),
            (ColumnKind::String(Some(len)), Dialect::Postgres) => format!("VARCHAR({})", len),
            (ColumnKind::String(None), Dialect::Postgres) => "TEXT".to_string(),
            (ColumnKind::String(_), Dialect::ClickHouse) => "String".to_string(),
            (ColumnKind::Integer, Dialect::Postgres) => "INTEGER".to_string(),
            (ColumnKind::Integer, Dialect::ClickHouse) => "Int32".to_string(),
            (ColumnKind::BigInteger, Dialect::Postgres) => "BIGINT".to_string(),
            (ColumnKind::BigInteger, Dialect::ClickHouse) => "Int64".to_string(),
            (ColumnKind::Float, Dialect::Postgres) => "DOUBLE PRECISION".to_string(),
            (ColumnKind::Float, Dialect::ClickHouse) => "Float64".to_string(),
            (ColumnKind::Boolean, Dialect::Postgres) => "BOOLEAN".to_string(),
            (ColumnKind::Boolean, Dialect::ClickHouse) => "Bool".to_string(),
            (ColumnKind::Timestamp, Dialect::Postgres) => "TIMESTAMP".to_string(),
            (ColumnKind::Timestamp, Dialect::ClickHouse) => "DateTime".to_string(),
            (ColumnKind::Json, Dialect::Postgres) => "JSONB".to_string(),
            (ColumnKind::Json, Dialect::ClickHouse) => "String".to_string(),
            (ColumnKind::Custom(ty), _) => ty.clone(),
        }
    }
}

/// A column with its type and optional trailing modifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub kind: ColumnKind,
    pub modifiers: Option<String>,
    /// Default the column to the insertion time
    pub default_now: bool,
}

impl ColumnDefinition {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            modifiers: None,
            default_now: false,
        }
    }

    /// Append e.g. `NOT NULL DEFAULT 0`
    pub fn with_modifiers(mut self, modifiers: &str) -> Self {
        self.modifiers = Some(modifiers.to_string());
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default_now = true;
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = format!("{} {}", self.name, self.kind.to_sql(dialect));
        if self.default_now {
            sql.push_str(match dialect {
                Dialect::Postgres => " NOT NULL DEFAULT CURRENT_TIMESTAMP",
                Dialect::ClickHouse => " DEFAULT now()",
            });
        }
        if let Some(modifiers) = &self.modifiers {
            sql.push(' ');
            sql.push_str(modifiers);
        }
        sql
    }
}

/// Table builder for CREATE TABLE statements
#[derive(Debug, Clone, PartialEq)]
pub struct TableBuilder {
    table_name: String,
    columns: Vec<ColumnDefinition>,
    constraints: Vec<String>,
    engine: Option<String>,
    order_by: Option<String>,
}

impl TableBuilder {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            columns: Vec::new(),
            constraints: Vec::new(),
            engine: None,
            order_by: None,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Add a column with a verbatim type
    pub fn column(&mut self, name: &str, column_type: &str) -> &mut Self {
        self.columns
            .push(ColumnDefinition::new(name, ColumnKind::Custom(column_type.to_string())));
        self
    }

    /// Add a typed column with modifiers
    pub fn typed(&mut self, definition: ColumnDefinition) -> &mut Self {
        self.columns.push(definition);
        self
    }

    /// Add an ID column (auto-increment primary key)
    pub fn id(&mut self, name: &str) -> &mut Self {
        self.columns.push(ColumnDefinition::new(name, ColumnKind::Id));
        self
    }

    pub fn uuid(&mut self, name: &str) -> &mut Self {
        self.columns.push(ColumnDefinition::new(name, ColumnKind::Uuid));
        self
    }

    pub fn string(&mut self, name: &str, length: Option<u32>) -> &mut Self {
        self.columns
            .push(ColumnDefinition::new(name, ColumnKind::String(length)));
        self
    }

    pub fn integer(&mut self, name: &str) -> &mut Self {
        self.columns.push(ColumnDefinition::new(name, ColumnKind::Integer));
        self
    }

    pub fn big_integer(&mut self, name: &str) -> &mut Self {
        self.columns
            .push(ColumnDefinition::new(name, ColumnKind::BigInteger));
        self
    }

    pub fn boolean(&mut self, name: &str) -> &mut Self {
        self.columns.push(ColumnDefinition::new(name, ColumnKind::Boolean));
        self
    }

    /// Add created_at/updated_at columns defaulting to now
    pub fn timestamps(&mut self) -> &mut Self {
        for name in ["created_at", "updated_at"] {
            self.columns
                .push(ColumnDefinition::new(name, ColumnKind::Timestamp).default_now());
        }
        self
    }

    /// Add a primary key constraint
    pub fn primary_key(&mut self, columns: &[&str]) -> &mut Self {
        self.constraints
            .push(format!("PRIMARY KEY ({})", columns.join(", ")));
        self
    }

    /// Add a foreign key constraint
    pub fn foreign_key(
        &mut self,
        column: &str,
        references_table: &str,
        references_column: &str,
    ) -> &mut Self {
        self.constraints.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            column, references_table, references_column
        ));
        self
    }

    /// Add a unique constraint
    pub fn unique(&mut self, columns: &[&str]) -> &mut Self {
        self.constraints
            .push(format!("UNIQUE ({})", columns.join(", ")));
        self
    }

    /// ClickHouse table engine, `MergeTree()` when unset
    pub fn engine(&mut self, engine: &str) -> &mut Self {
        self.engine = Some(engine.to_string());
        self
    }

    /// ClickHouse sorting key, `id` when unset
    pub fn order_by(&mut self, expr: &str) -> &mut Self {
        self.order_by = Some(expr.to_string());
        self
    }

    /// Build the CREATE TABLE SQL
    pub fn to_sql(&self, dialect: Dialect) -> MigrationResult<String> {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|column| column.to_sql(dialect))
            .collect();

        match dialect {
            Dialect::Postgres => {
                parts.extend(self.constraints.iter().cloned());
                Ok(format!(
                    "CREATE TABLE {} (\n    {}\n)",
                    self.table_name,
                    parts.join(",\n    ")
                ))
            }
            Dialect::ClickHouse => {
                if let Some(constraint) = self.constraints.first() {
                    return Err(MigrationError::unsupported(
                        format!("table constraint {}", constraint),
                        dialect.name(),
                    ));
                }
                Ok(format!(
                    "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE = {} ORDER BY {}",
                    self.table_name,
                    parts.join(", "),
                    self.engine.as_deref().unwrap_or("MergeTree()"),
                    self.order_by.as_deref().unwrap_or("id")
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_builder() {
        let mut builder = SchemaBuilder::new();
        builder.create_table("users", |table| {
            table.id("id");
            table.string("name", Some(255));
            table.string("email", Some(255));
            table.timestamps();
            table.unique(&["email"]);
        });

        let sql = builder.to_sql(Dialect::Postgres).unwrap().join("\n");
        assert!(sql.contains("CREATE TABLE users"));
        assert!(sql.contains("id SERIAL PRIMARY KEY"));
        assert!(sql.contains("name VARCHAR(255)"));
        assert!(sql.contains("email VARCHAR(255)"));
        assert!(sql.contains("created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP"));
        assert!(sql.contains("UNIQUE (email)"));
    }

    #[test]
    fn test_table_builder() {
        let mut table = TableBuilder::new("posts");
        table.id("id");
        table.string("title", Some(255));
        table.string("content", None);
        table.integer("user_id");
        table.timestamps();
        table.foreign_key("user_id", "users", "id");

        let sql = table.to_sql(Dialect::Postgres).unwrap();
        assert!(sql.contains("CREATE TABLE posts"));
        assert!(sql.contains("id SERIAL PRIMARY KEY"));
        assert!(sql.contains("title VARCHAR(255)"));
        assert!(sql.contains("content TEXT"));
        assert!(sql.contains("user_id INTEGER"));
        assert!(sql.contains("FOREIGN KEY (user_id) REFERENCES users (id)"));
    }

    #[test]
    fn test_clickhouse_table() {
        let mut table = TableBuilder::new("user_events");
        table.id("id");
        table.string("event_type", None);
        table.timestamps();
        table.order_by("(id, created_at)");

        let sql = table.to_sql(Dialect::ClickHouse).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS user_events (id UInt64, event_type String, \
             created_at DateTime DEFAULT now(), updated_at DateTime DEFAULT now()) \
             ENGINE = MergeTree() ORDER BY (id, created_at)"
        );
    }

    #[test]
    fn test_clickhouse_rejects_relational_constraints() {
        let mut builder = SchemaBuilder::new();
        builder.add_constraint("matches", "matches_team_fk", "FOREIGN KEY (team_id) REFERENCES teams (id)");
        builder.add_constraint("matches", "matches_score_check", "CHECK (score >= 0)");

        let ops = builder.operations();
        assert!(matches!(
            ops[0].to_sql(Dialect::ClickHouse),
            Err(MigrationError::Unsupported { .. })
        ));
        assert_eq!(
            ops[1].to_sql(Dialect::ClickHouse).unwrap(),
            "ALTER TABLE matches ADD CONSTRAINT matches_score_check CHECK (score >= 0)"
        );
        assert!(ops[0].to_sql(Dialect::Postgres).is_ok());
    }

    #[test]
    fn test_index_rendering_per_dialect() {
        let mut builder = SchemaBuilder::new();
        builder
            .create_index("user_events", &["user_id"], None)
            .drop_index("user_events", "idx_user_events_user_id");

        let pg = builder.to_sql(Dialect::Postgres).unwrap();
        assert_eq!(pg[0], "CREATE INDEX idx_user_events_user_id ON user_events (user_id)");
        assert_eq!(pg[1], "DROP INDEX IF EXISTS idx_user_events_user_id");

        let ch = builder.to_sql(Dialect::ClickHouse).unwrap();
        assert_eq!(
            ch[0],
            "ALTER TABLE user_events ADD INDEX idx_user_events_user_id user_id TYPE bloom_filter GRANULARITY 1"
        );
        assert_eq!(ch[1], "ALTER TABLE user_events DROP INDEX idx_user_events_user_id");
    }

    #[test]
    fn test_add_and_drop_column() {
        let mut builder = SchemaBuilder::new();
        builder
            .add_column("players", "rating", ColumnKind::Float)
            .drop_column("players", "kast");

        let sql = builder.to_sql(Dialect::Postgres).unwrap();
        assert_eq!(sql[0], "ALTER TABLE players ADD COLUMN rating DOUBLE PRECISION");
        assert_eq!(sql[1], "ALTER TABLE players DROP COLUMN kast");
    }
}

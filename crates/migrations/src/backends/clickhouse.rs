//! ClickHouse adapter over the HTTP interface
//!
//! Stateless capability: each statement is one POST, there is no rollback and
//! no multi-statement atomicity. The statement travels in the request body,
//! the target database and settings in the query string, credentials in the
//! `X-ClickHouse-User`/`X-ClickHouse-Key` headers.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use url::Url;

use super::{BackendAdapter, Capability, ExecutionOutcome};
use crate::config::ClickHouseConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::schema_builder::Operation;
use crate::sql::Dialect;

/// Body of a `FORMAT JSON` response; only the rows are needed
#[derive(Debug, Deserialize)]
struct JsonResponse {
    #[serde(default)]
    data: Vec<JsonValue>,
}

#[derive(Debug, Clone)]
pub struct ClickHouseAdapter {
    client: Client,
    endpoint: Url,
    database: String,
}

impl ClickHouseAdapter {
    /// Build the HTTP client; does not contact the server
    pub fn new(config: &ClickHouseConfig) -> MigrationResult<Self> {
        let endpoint = Url::parse(&config.endpoint()).map_err(|e| {
            MigrationError::configuration(format!(
                "Invalid ClickHouse endpoint {}: {}",
                config.endpoint(),
                e
            ))
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(auth_headers(config)?)
            .build()
            .map_err(|e| {
                MigrationError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            database: config.database.clone(),
        })
    }

    /// Build the client and check the server accepts our credentials
    pub async fn connect(config: &ClickHouseConfig) -> MigrationResult<Self> {
        let adapter = Self::new(config)?;
        adapter.ping().await?;
        tracing::debug!(endpoint = %adapter.endpoint, database = %adapter.database, "connected to clickhouse");
        Ok(adapter)
    }

    /// `SELECT 1`; any failure here is a connection failure
    pub async fn ping(&self) -> MigrationResult<()> {
        match self.send("SELECT 1", &[]).await {
            Ok(_) => Ok(()),
            Err(MigrationError::Backend { status, body }) => Err(MigrationError::connection(
                format!("ClickHouse at {} rejected the connection ({}): {}", self.endpoint, status, body.trim()),
            )),
            Err(MigrationError::Query { message }) => Err(MigrationError::connection(message)),
            Err(e) => Err(e),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Send one statement and return the raw response body
    pub async fn send(&self, statement: &str, settings: &[(&str, &str)]) -> MigrationResult<String> {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("database", &self.database);
            for (key, value) in settings {
                pairs.append_pair(key, value);
            }
        }

        tracing::trace!(sql = %statement, "sending clickhouse statement");
        let response = self
            .client
            .post(url)
            .body(statement.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(MigrationError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    /// Run a SELECT and return its rows as JSON objects
    pub async fn query_rows(&self, select: &str) -> MigrationResult<Vec<JsonValue>> {
        let statement = format!("{} FORMAT JSON", select.trim_end().trim_end_matches(';'));
        let body = self
            .send(&statement, &[("output_format_json_quote_64bit_integers", "0")])
            .await?;
        let response: JsonResponse = serde_json::from_str(&body)?;
        Ok(response.data)
    }
}

fn auth_headers(config: &ClickHouseConfig) -> MigrationResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    if !config.username.is_empty() {
        headers.insert(
            "X-ClickHouse-User",
            HeaderValue::from_str(&config.username).map_err(|e| {
                MigrationError::configuration(format!("Invalid ClickHouse username: {}", e))
            })?,
        );
    }

    if !config.password.is_empty() {
        let mut key = HeaderValue::from_str(&config.password).map_err(|e| {
            MigrationError::configuration(format!("Invalid ClickHouse password: {}", e))
        })?;
        key.set_sensitive(true);
        headers.insert("X-ClickHouse-Key", key);
    }

    Ok(headers)
}

#[async_trait]
impl BackendAdapter for ClickHouseAdapter {
    fn name(&self) -> &str {
        "clickhouse"
    }

    fn capability(&self) -> Capability {
        Capability::Stateless
    }

    fn dialect(&self) -> Dialect {
        Dialect::ClickHouse
    }

    async fn execute(&self, operation: &Operation) -> MigrationResult<ExecutionOutcome> {
        let mut outcome = ExecutionOutcome::default();

        for statement in operation.render(Dialect::ClickHouse)? {
            let body = self.send(&statement, &[]).await?;
            outcome.statements += 1;
            if !body.trim().is_empty() {
                outcome.payload = serde_json::from_str(&body).ok();
            }
        }

        Ok(outcome)
    }
}

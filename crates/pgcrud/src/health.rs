//! Connection health check.
//!
//! A broken connection is an expected outcome here, so failures are captured
//! into [`ConnectionTestResult`] instead of being returned as errors.

use crate::client::{ConnectionProvider, GenericClient, guarded, release};
use crate::error::CrudError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

const LIVENESS_SQL: &str = "SELECT version()";

/// Outcome of one health check. Created fresh per call, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub success: bool,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub server_version: Option<String>,
    pub error_details: Option<String>,
    /// Connection string with password and database name masked.
    pub connection_string_redacted: String,
}

/// Open a connection to the default database and run a liveness query.
///
/// Host, port, database, user, timestamp and the redacted connection string
/// are filled in whatever the outcome.
pub async fn check_connection<P: ConnectionProvider>(
    provider: &P,
    cancel: &CancellationToken,
) -> ConnectionTestResult {
    let config = provider.config();
    let mut result = ConnectionTestResult {
        success: false,
        host: config.host.clone(),
        port: config.port,
        database: config.default_database.clone(),
        user: config.user.clone(),
        timestamp: Utc::now(),
        message: String::new(),
        server_version: None,
        error_details: None,
        connection_string_redacted: provider.redacted_connection_string(None),
    };

    match liveness(provider, cancel).await {
        Ok(version) => {
            result.success = true;
            result.message = "Connection successful".to_string();
            result.server_version = version;
            tracing::info!(host = %result.host, port = result.port, "connection test succeeded");
        }
        Err(err) => {
            let details = err.to_string();
            result.message = if err.is_cancelled() {
                "Connection test cancelled".to_string()
            } else {
                "Connection failed".to_string()
            };
            tracing::warn!(
                host = %result.host,
                port = result.port,
                connection = %result.connection_string_redacted,
                error = %details,
                "connection test failed"
            );
            result.error_details = Some(details);
        }
    }
    result
}

async fn liveness<P: ConnectionProvider>(
    provider: &P,
    cancel: &CancellationToken,
) -> Result<Option<String>, CrudError> {
    let client = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(CrudError::Cancelled("connection test".to_string())),
        client = provider.acquire(None) => client?,
    };

    let timeout = provider.settings().command_timeout;
    let result = guarded(
        client.cancel_token(),
        timeout,
        cancel,
        "connection test",
        client.query_typed(LIVENESS_SQL, &[]),
    )
    .await;
    let rows = release(client, result)?;

    Ok(rows.first().and_then(|row| row.try_get::<_, String>(0).ok()))
}

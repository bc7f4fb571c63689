//! Operation surface.
//!
//! [`CrudService`] runs one statement per call: validate, acquire one
//! connection, execute under the command timeout and the caller's
//! cancellation token, then map the result. The connection is released when
//! the call returns, on every path; after a cancel or timeout it is closed
//! instead of going back to the pool.

use crate::client::{ConnectionProvider, GenericClient, guarded, release};
use crate::error::{CrudError, CrudResult};
use crate::health::{self, ConnectionTestResult};
use crate::ident;
use crate::pool::ConnectionManager;
use crate::row::{self, ResultRow};
use crate::sql::Sql;
use crate::statement;
use crate::validate::{require_name, schema_or_default};
use crate::value::ColumnValues;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_postgres::Row;
use tokio_util::sync::CancellationToken;

/// Target and payload of one table-level operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrudRequest {
    /// Target database; blank means the configured default.
    pub database: String,
    /// Schema; `None` or blank means `public`.
    pub schema: Option<String>,
    pub table: String,
    /// Column values for INSERT and the SET list of UPDATE.
    pub values: ColumnValues,
    /// Equality predicates, ANDed together.
    pub condition: Option<ColumnValues>,
}

impl CrudRequest {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn values(mut self, values: ColumnValues) -> Self {
        self.values = values;
        self
    }

    pub fn condition(mut self, condition: ColumnValues) -> Self {
        self.condition = Some(condition);
        self
    }

    fn target_database(&self) -> Option<&str> {
        Some(self.database.as_str()).filter(|db| !db.trim().is_empty())
    }

    fn schema_name(&self) -> &str {
        schema_or_default(self.schema.as_deref())
    }

    /// `"schema"."table"`, as shown in errors and logs.
    fn target(&self) -> String {
        ident::qualified(self.schema_name(), &self.table)
    }
}

/// Success payload of a write or DDL operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcome {
    pub message: String,
    pub rows_affected: u64,
}

impl CommandOutcome {
    fn new(message: impl Into<String>, rows_affected: u64) -> Self {
        Self {
            message: message.into(),
            rows_affected,
        }
    }
}

/// CRUD and DDL operations over a [`ConnectionProvider`].
pub struct CrudService<P: ConnectionProvider = ConnectionManager> {
    provider: Arc<P>,
}

impl<P: ConnectionProvider> Clone for CrudService<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<P: ConnectionProvider> CrudService<P> {
    pub fn new(provider: P) -> Self {
        Self::from_shared(Arc::new(provider))
    }

    /// Share an existing provider (e.g. one [`ConnectionManager`] per process).
    pub fn from_shared(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Health check against the default database. Never fails; see [`ConnectionTestResult`].
    pub async fn test_connection(&self, cancel: &CancellationToken) -> ConnectionTestResult {
        health::check_connection(&*self.provider, cancel).await
    }

    /// `CREATE DATABASE`, issued on the default database.
    pub async fn create_database(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> CrudResult<CommandOutcome> {
        let name = require_name("database", name)?;
        let stmt = statement::create_database(name);
        let target = ident::escape(name);
        self.execute("create database", &target, None, &stmt, cancel)
            .await?;
        Ok(CommandOutcome::new(
            format!("Database {name} created successfully"),
            0,
        ))
    }

    /// `CREATE TABLE IF NOT EXISTS` with caller-supplied column definitions.
    ///
    /// `column_defs` is inserted verbatim and must be valid, trusted DDL.
    pub async fn create_table(
        &self,
        request: &CrudRequest,
        column_defs: &str,
        cancel: &CancellationToken,
    ) -> CrudResult<CommandOutcome> {
        require_name("table", &request.table)?;
        if column_defs.trim().is_empty() {
            return Err(CrudError::validation("column definitions are required"));
        }
        let stmt = statement::create_table(request.schema_name(), &request.table, column_defs);
        let target = request.target();
        self.execute("create table", &target, request.target_database(), &stmt, cancel)
            .await?;
        Ok(CommandOutcome::new(
            format!("Table {target} created successfully"),
            0,
        ))
    }

    /// `DROP TABLE IF EXISTS`.
    pub async fn drop_table(
        &self,
        request: &CrudRequest,
        cancel: &CancellationToken,
    ) -> CrudResult<CommandOutcome> {
        require_name("table", &request.table)?;
        let stmt = statement::drop_table(request.schema_name(), &request.table);
        let target = request.target();
        self.execute("drop table", &target, request.target_database(), &stmt, cancel)
            .await?;
        Ok(CommandOutcome::new(
            format!("Table {target} dropped successfully"),
            0,
        ))
    }

    /// Reconstruct the `CREATE TABLE` text of an existing table from the catalog.
    ///
    /// Returns [`CrudError::NotFound`] when the table does not exist.
    pub async fn get_create_table_sql(
        &self,
        request: &CrudRequest,
        cancel: &CancellationToken,
    ) -> CrudResult<String> {
        require_name("table", &request.table)?;
        let stmt = statement::describe_create_table(request.schema_name(), &request.table);
        let target = request.target();
        let rows = self
            .query("show create table", &target, request.target_database(), &stmt, cancel)
            .await?;

        let Some(row) = rows.first() else {
            return Err(CrudError::not_found(format!("table {target} does not exist")));
        };
        row.try_get::<_, String>(0)
            .map_err(|e| CrudError::decode("create_table_sql", e.to_string()))
    }

    /// `INSERT` one row.
    pub async fn insert(
        &self,
        request: &CrudRequest,
        cancel: &CancellationToken,
    ) -> CrudResult<CommandOutcome> {
        require_name("table", &request.table)?;
        let stmt = statement::insert(request.schema_name(), &request.table, &request.values)?;
        let target = request.target();
        let affected = self
            .execute("insert", &target, request.target_database(), &stmt, cancel)
            .await?;
        Ok(CommandOutcome::new(
            format!("Inserted {affected} row(s) into {target}"),
            affected,
        ))
    }

    /// `SELECT *`, optionally filtered. An absent condition returns every row.
    pub async fn select(
        &self,
        request: &CrudRequest,
        cancel: &CancellationToken,
    ) -> CrudResult<Vec<ResultRow>> {
        require_name("table", &request.table)?;
        let stmt = statement::select(
            request.schema_name(),
            &request.table,
            request.condition.as_ref(),
        )?;
        let target = request.target();
        let rows = self
            .query("select", &target, request.target_database(), &stmt, cancel)
            .await?;
        row::map_rows(&rows)
    }

    /// `UPDATE`. The condition is mandatory.
    pub async fn update(
        &self,
        request: &CrudRequest,
        cancel: &CancellationToken,
    ) -> CrudResult<CommandOutcome> {
        require_name("table", &request.table)?;
        let stmt = statement::update(
            request.schema_name(),
            &request.table,
            &request.values,
            request.condition.as_ref(),
        )?;
        let target = request.target();
        let affected = self
            .execute("update", &target, request.target_database(), &stmt, cancel)
            .await?;
        Ok(CommandOutcome::new(
            format!("Updated {affected} row(s) in {target}"),
            affected,
        ))
    }

    /// `DELETE`. An absent condition deletes every row.
    pub async fn delete(
        &self,
        request: &CrudRequest,
        cancel: &CancellationToken,
    ) -> CrudResult<CommandOutcome> {
        require_name("table", &request.table)?;
        let stmt = statement::delete(
            request.schema_name(),
            &request.table,
            request.condition.as_ref(),
        )?;
        let target = request.target();
        let affected = self
            .execute("delete", &target, request.target_database(), &stmt, cancel)
            .await?;
        Ok(CommandOutcome::new(
            format!("Deleted {affected} row(s) from {target}"),
            affected,
        ))
    }

    async fn execute(
        &self,
        operation: &str,
        target: &str,
        database: Option<&str>,
        stmt: &Sql,
        cancel: &CancellationToken,
    ) -> CrudResult<u64> {
        let sql = stmt.to_sql();
        let params = stmt.typed_params();
        let start = Instant::now();
        log_statement(operation, &sql, params.len());

        let result = async {
            let client = self.acquire(operation, database, cancel).await?;
            let result = guarded(
                client.cancel_token(),
                self.provider.settings().command_timeout,
                cancel,
                operation,
                client.execute_typed(&sql, &params),
            )
            .await;
            release(client, result)
        }
        .await;

        let affected = finish(operation, target, result)?;
        tracing::debug!(
            target: "pgcrud.sql",
            operation,
            rows_affected = affected,
            elapsed_us = elapsed_micros(start.elapsed()),
            "statement completed"
        );
        Ok(affected)
    }

    async fn query(
        &self,
        operation: &str,
        target: &str,
        database: Option<&str>,
        stmt: &Sql,
        cancel: &CancellationToken,
    ) -> CrudResult<Vec<Row>> {
        let sql = stmt.to_sql();
        let params = stmt.typed_params();
        let start = Instant::now();
        log_statement(operation, &sql, params.len());

        let result = async {
            let client = self.acquire(operation, database, cancel).await?;
            let result = guarded(
                client.cancel_token(),
                self.provider.settings().command_timeout,
                cancel,
                operation,
                client.query_typed(&sql, &params),
            )
            .await;
            release(client, result)
        }
        .await;

        let rows = finish(operation, target, result)?;
        tracing::debug!(
            target: "pgcrud.sql",
            operation,
            row_count = rows.len(),
            elapsed_us = elapsed_micros(start.elapsed()),
            "statement completed"
        );
        Ok(rows)
    }

    async fn acquire(
        &self,
        operation: &str,
        database: Option<&str>,
        cancel: &CancellationToken,
    ) -> CrudResult<P::Client> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CrudError::Cancelled(operation.to_string())),
            client = self.provider.acquire(database) => client,
        }
    }
}

/// Saturates instead of wrapping.
fn elapsed_micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

fn log_statement(operation: &str, sql: &str, param_count: usize) {
    tracing::debug!(
        target: "pgcrud.sql",
        operation,
        sql = %sql,
        param_count,
        "executing statement"
    );
}

/// Attach operation context to an engine failure and log it in full.
fn finish<T>(operation: &str, target: &str, result: CrudResult<T>) -> CrudResult<T> {
    result.map_err(|err| {
        let err = err.in_operation(operation, target);
        if err.is_cancelled() {
            tracing::info!(operation, object = %target, "operation cancelled");
        } else {
            tracing::error!(
                operation,
                object = %target,
                sqlstate = err.sqlstate(),
                error = %err,
                "operation failed"
            );
        }
        err
    })
}

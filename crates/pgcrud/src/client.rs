//! Engine client seam.
//!
//! [`GenericClient`] is what a statement runs against; [`ConnectionProvider`]
//! hands out one client per operation. Production code uses the pooled
//! [`PoolClient`] from [`crate::pool::ConnectionManager`]; tests substitute
//! their own engine.

use crate::config::{ConnectionConfig, PoolSettings};
use crate::conn_str;
use crate::error::{CrudError, CrudResult};
use futures_util::TryStreamExt;
use tokio_postgres::Row;
use tokio_postgres::types::{ToSql, Type};
use tokio_util::sync::CancellationToken;

/// A parameter paired with the wire type it is declared as.
pub type TypedParam<'a> = (&'a (dyn ToSql + Sync), Type);

/// A connection able to run typed statements.
///
/// Parameters always carry an explicit type, so the engine never has to
/// guess (and never defaults an ambiguous value to text).
pub trait GenericClient: Send + Sync {
    /// Execute a statement and return all rows.
    fn query_typed(
        &self,
        sql: &str,
        params: &[TypedParam<'_>],
    ) -> impl std::future::Future<Output = CrudResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute_typed(
        &self,
        sql: &str,
        params: &[TypedParam<'_>],
    ) -> impl std::future::Future<Output = CrudResult<u64>> + Send;

    /// Return a cancellation token for the underlying connection, if supported.
    ///
    /// Used for best-effort server-side cancellation when a statement times out
    /// or the caller cancels.
    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        None
    }

    /// Take this connection out of circulation instead of releasing it.
    ///
    /// Called after a statement was cancelled or timed out, while a
    /// server-side cancel request may still be on its way.
    fn discard(self)
    where
        Self: Sized,
    {
    }
}

impl GenericClient for tokio_postgres::Client {
    async fn query_typed(&self, sql: &str, params: &[TypedParam<'_>]) -> CrudResult<Vec<Row>> {
        Ok(tokio_postgres::Client::query_typed(self, sql, params).await?)
    }

    async fn execute_typed(&self, sql: &str, params: &[TypedParam<'_>]) -> CrudResult<u64> {
        let typed: Vec<TypedParam<'_>> = params.to_vec();
        let stream = tokio_postgres::Client::query_typed_raw(self, sql, typed).await?;
        let mut stream = std::pin::pin!(stream);
        while stream.try_next().await?.is_some() {}
        Ok(stream.rows_affected().unwrap_or(0))
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(tokio_postgres::Client::cancel_token(self))
    }
}

/// A pooled connection. Returned to its pool when dropped.
pub struct PoolClient(deadpool_postgres::Client);

impl PoolClient {
    pub fn new(client: deadpool_postgres::Client) -> Self {
        Self(client)
    }

    pub fn inner(&self) -> &deadpool_postgres::Client {
        &self.0
    }

    fn pg(&self) -> &tokio_postgres::Client {
        &self.0
    }
}

impl std::ops::Deref for PoolClient {
    type Target = deadpool_postgres::Client;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl GenericClient for PoolClient {
    async fn query_typed(&self, sql: &str, params: &[TypedParam<'_>]) -> CrudResult<Vec<Row>> {
        GenericClient::query_typed(self.pg(), sql, params).await
    }

    async fn execute_typed(&self, sql: &str, params: &[TypedParam<'_>]) -> CrudResult<u64> {
        GenericClient::execute_typed(self.pg(), sql, params).await
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        GenericClient::cancel_token(self.pg())
    }

    fn discard(self) {
        // Detached from the pool, the connection closes here.
        drop(deadpool_postgres::Object::take(self.0));
    }
}

impl std::fmt::Debug for PoolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolClient").finish_non_exhaustive()
    }
}

/// Source of one connection per operation.
pub trait ConnectionProvider: Send + Sync {
    type Client: GenericClient;

    /// Acquire a connection to `database` (the configured default if `None`).
    fn acquire(
        &self,
        database: Option<&str>,
    ) -> impl std::future::Future<Output = CrudResult<Self::Client>> + Send;

    fn config(&self) -> &ConnectionConfig;

    fn settings(&self) -> &PoolSettings;

    /// The connection string for `database` with credentials masked.
    fn redacted_connection_string(&self, database: Option<&str>) -> String {
        match conn_str::build(self.config(), database, self.settings()) {
            Ok(conn_str) => conn_str::redact(&conn_str),
            Err(_) => "<redacted>".to_string(),
        }
    }
}

/// Run `fut` bounded by `timeout` and the caller's cancellation signal.
///
/// On timeout or cancellation a server-side cancel request is sent in the
/// background for the in-flight statement; pass the outcome to [`release`].
pub(crate) async fn guarded<T>(
    cancel_token: Option<tokio_postgres::CancelToken>,
    timeout: std::time::Duration,
    cancel: &CancellationToken,
    what: &str,
    fut: impl std::future::Future<Output = CrudResult<T>>,
) -> CrudResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            cancel_in_background(cancel_token);
            Err(CrudError::Cancelled(what.to_string()))
        }
        res = tokio::time::timeout(timeout, fut) => match res {
            Ok(res) => res,
            Err(_) => {
                cancel_in_background(cancel_token);
                Err(CrudError::Timeout(timeout))
            }
        },
    }
}

/// Hand back `client` after a guarded statement.
///
/// An interrupted statement may still receive the background cancel request,
/// so its connection is discarded rather than returned to the pool.
pub(crate) fn release<C: GenericClient, T>(client: C, result: CrudResult<T>) -> CrudResult<T> {
    if matches!(result, Err(CrudError::Cancelled(_) | CrudError::Timeout(_))) {
        client.discard();
    }
    result
}

fn cancel_in_background(token: Option<tokio_postgres::CancelToken>) {
    if let Some(token) = token {
        tokio::spawn(async move {
            let _ = token.cancel_query(tokio_postgres::NoTls).await;
        });
    }
}

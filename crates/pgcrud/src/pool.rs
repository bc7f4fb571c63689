//! Connection management.
//!
//! [`ConnectionManager`] is the single process-scoped connection handle:
//! construct it once at startup and pass it (usually behind an `Arc`) to
//! [`crate::CrudService`]. It keeps one bounded pool per target database,
//! created lazily on first use.

use crate::client::{ConnectionProvider, PoolClient};
use crate::config::{ConnectionConfig, PoolSettings};
use crate::conn_str;
use crate::error::{CrudError, CrudResult};
use crate::health::{self, ConnectionTestResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio_postgres::NoTls;
use tokio_util::sync::CancellationToken;

/// Per-database pooled connections built from one immutable [`ConnectionConfig`].
pub struct ConnectionManager {
    config: ConnectionConfig,
    settings: PoolSettings,
    pools: Mutex<HashMap<String, Pool>>,
}

impl ConnectionManager {
    /// Create a manager with the default pool bounds (max 20, min 5, 10s timeouts).
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_settings(config, PoolSettings::default())
    }

    /// Create a manager with custom pool bounds.
    pub fn with_settings(config: ConnectionConfig, settings: PoolSettings) -> Self {
        Self {
            config,
            settings,
            pools: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Connection string for `database`, falling back to the configured default.
    ///
    /// Contains the password in clear text; use
    /// [`ConnectionProvider::redacted_connection_string`] for anything displayed or logged.
    pub fn connection_string(&self, database: Option<&str>) -> CrudResult<String> {
        conn_str::build(&self.config, database, &self.settings)
    }

    /// Open a pooled connection to `database` and wait until it is ready.
    ///
    /// Failures (including the acquisition timeout) surface as
    /// [`CrudError::Connection`]; nothing is retried.
    pub async fn open_connection(&self, database: Option<&str>) -> CrudResult<PoolClient> {
        let pool = self.pool_for(database)?;
        match pool.get().await {
            Ok(client) => Ok(PoolClient::new(client)),
            Err(e) => {
                let err = CrudError::from(e);
                tracing::warn!(
                    database = %self.config.target_database(database),
                    error = %err,
                    "failed to acquire connection"
                );
                Err(err)
            }
        }
    }

    /// Run the health check against the default database.
    pub async fn test_connection(&self) -> ConnectionTestResult {
        health::check_connection(self, &CancellationToken::new()).await
    }

    /// Close every pool. Connections in use are closed when returned.
    pub fn close(&self) {
        let mut pools = self.pools.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, pool) in pools.drain() {
            pool.close();
        }
    }

    /// Number of databases with a live pool.
    pub fn pool_count(&self) -> usize {
        self.pools
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn pool_for(&self, database: Option<&str>) -> CrudResult<Pool> {
        let key = self.config.target_database(database).to_string();
        let mut pools = self.pools.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pool) = pools.get(&key) {
            return Ok(pool.clone());
        }

        let pg_config = conn_str::pg_config(&self.config, Some(&key), &self.settings);
        let pool = create_pool(pg_config, &self.settings)?;
        tracing::debug!(
            database = %key,
            connection = %self.redacted_connection_string(Some(&key)),
            "created connection pool"
        );
        pools.insert(key.clone(), pool.clone());
        drop(pools);

        warm_up(pool.clone(), self.settings.min_idle.min(self.settings.max_size), key);
        Ok(pool)
    }
}

impl ConnectionProvider for ConnectionManager {
    type Client = PoolClient;

    async fn acquire(&self, database: Option<&str>) -> CrudResult<PoolClient> {
        self.open_connection(database).await
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn settings(&self) -> &PoolSettings {
        &self.settings
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("settings", &self.settings)
            .field("pools", &self.pool_count())
            .finish()
    }
}

/// Build a bounded pool over one driver configuration.
pub fn create_pool(pg_config: tokio_postgres::Config, settings: &PoolSettings) -> CrudResult<Pool> {
    if settings.max_size == 0 {
        return Err(CrudError::connection("pool max size must be at least 1"));
    }
    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, manager_config);
    Pool::builder(mgr)
        .max_size(settings.max_size)
        .runtime(Runtime::Tokio1)
        .wait_timeout(Some(settings.connect_timeout))
        .create_timeout(Some(settings.connect_timeout))
        .recycle_timeout(Some(settings.connect_timeout))
        .build()
        .map_err(|e| CrudError::connection(e.to_string()))
}

/// Open `min_idle` connections in the background so the pool starts warm.
fn warm_up(pool: Pool, min_idle: usize, database: String) {
    if min_idle == 0 {
        return;
    }
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        return;
    };
    handle.spawn(async move {
        let attempts = (0..min_idle).map(|_| pool.get());
        let results = futures_util::future::join_all(attempts).await;
        let opened = results.iter().filter(|r| r.is_ok()).count();
        tracing::debug!(database = %database, opened, requested = min_idle, "pool warm-up finished");
    });
}

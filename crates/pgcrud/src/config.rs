//! Connection configuration.
//!
//! [`ConnectionConfig`] is resolved once at startup and never mutated. The
//! per-call database name only overrides the target for that call.

use std::fmt;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_PASSWORD: &str = "password";
pub const DEFAULT_DATABASE: &str = "postgres";

/// Environment variable names read by [`ConnectionConfig::from_env`].
pub mod env {
    pub const HOST: &str = "DB_HOST";
    pub const PORT: &str = "DB_PORT";
    pub const USER: &str = "DB_USER";
    pub const PASSWORD: &str = "DB_PASSWORD";
    pub const DATABASE: &str = "DB_NAME";
}

/// Where and as whom to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub default_database: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            default_database: DEFAULT_DATABASE.to_string(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"****")
            .field("default_database", &self.default_database)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn default_database(mut self, database: impl Into<String>) -> Self {
        self.default_database = database.into();
        self
    }

    /// Resolve from the process environment (see [`env`]).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup. Unset or empty keys use the defaults.
    ///
    /// A port that does not parse as `u16` falls back to [`DEFAULT_PORT`] with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get(env::PORT) {
            None => defaults.port,
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) => port,
                Err(e) => {
                    tracing::warn!(
                        value = %raw,
                        error = %e,
                        default = DEFAULT_PORT,
                        "invalid {}; using default port",
                        env::PORT
                    );
                    defaults.port
                }
            },
        };

        Self {
            host: get(env::HOST).unwrap_or(defaults.host),
            port,
            user: get(env::USER).unwrap_or(defaults.user),
            password: get(env::PASSWORD).unwrap_or(defaults.password),
            default_database: get(env::DATABASE).unwrap_or(defaults.default_database),
        }
    }

    /// The database to target: `database` if given and non-blank, else the default.
    pub fn target_database<'a>(&'a self, database: Option<&'a str>) -> &'a str {
        match database {
            Some(db) if !db.trim().is_empty() => db,
            _ => &self.default_database,
        }
    }
}

/// Fixed pool bounds and timeouts applied to every per-database pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum concurrent connections per database.
    pub max_size: usize,
    /// Connections opened in the background when a pool is first created.
    pub min_idle: usize,
    /// Bound on establishing or acquiring a connection.
    pub connect_timeout: Duration,
    /// Bound on a single statement.
    pub command_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 20,
            min_idle: 5,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ConnectionConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ConnectionConfig::default());
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.user, "root");
        assert_eq!(config.password, "password");
        assert_eq!(config.default_database, "postgres");
    }

    #[test]
    fn reads_all_keys() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "5433"),
            ("DB_USER", "app"),
            ("DB_PASSWORD", "s3cret"),
            ("DB_NAME", "inventory"),
        ]));
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 5433);
        assert_eq!(config.user, "app");
        assert_eq!(config.password, "s3cret");
        assert_eq!(config.default_database, "inventory");
    }

    #[test]
    fn malformed_port_falls_back() {
        let config = ConnectionConfig::from_lookup(lookup(&[("DB_PORT", "eighty")]));
        assert_eq!(config.port, DEFAULT_PORT);

        let config = ConnectionConfig::from_lookup(lookup(&[("DB_PORT", "70000")]));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn blank_values_use_defaults() {
        let config = ConnectionConfig::from_lookup(lookup(&[("DB_HOST", "  ")]));
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn debug_masks_password() {
        let config = ConnectionConfig::new().password("hunter2");
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("****"));
    }

    #[test]
    fn target_database_override() {
        let config = ConnectionConfig::new();
        assert_eq!(config.target_database(None), "postgres");
        assert_eq!(config.target_database(Some("")), "postgres");
        assert_eq!(config.target_database(Some("shop")), "shop");
    }

    #[test]
    fn target_database_keeps_name_verbatim() {
        let config = ConnectionConfig::new();
        assert_eq!(config.target_database(Some("  \t")), "postgres");
        assert_eq!(config.target_database(Some(" shop ")), " shop ");
    }

    #[test]
    fn pool_settings_defaults() {
        let settings = PoolSettings::default();
        assert_eq!(settings.max_size, 20);
        assert_eq!(settings.min_idle, 5);
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.command_timeout, Duration::from_secs(10));
    }
}

//! # pgcrud
//!
//! Dynamic CRUD statements and typed value binding for Postgres.
//!
//! ## Features
//!
//! - **Injection-safe**: every identifier is quoted, every value is a bound parameter
//! - **Typed binding**: loosely typed input (JSON or native values) is normalized into
//!   [`FieldValue`] and bound with an explicit wire type
//! - **Pooled**: one bounded pool per target database, created on first use
//! - **Safe defaults**: UPDATE requires a condition; SELECT/DELETE without one target all rows
//! - **Cancellable**: every operation takes a [`CancellationToken`] and obeys a command timeout
//!
//! ## Example
//!
//! ```ignore
//! use pgcrud::{ColumnValues, ConnectionConfig, ConnectionManager, CrudRequest, CrudService};
//! use tokio_util::sync::CancellationToken;
//!
//! let service = CrudService::new(ConnectionManager::new(ConnectionConfig::from_env()));
//! let cancel = CancellationToken::new();
//!
//! let request = CrudRequest::new("shop", "users")
//!     .values(ColumnValues::new().with("id", 1).with("name", "John"));
//! service.insert(&request, &cancel).await?;
//!
//! let rows = service
//!     .select(&CrudRequest::new("shop", "users").condition(ColumnValues::new().with("id", 1)), &cancel)
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod conn_str;
pub mod error;
pub mod health;
pub mod ident;
pub mod pool;
pub mod row;
pub mod service;
pub mod sql;
pub mod statement;
pub mod validate;
pub mod value;

pub use client::{ConnectionProvider, GenericClient, PoolClient, TypedParam};
pub use config::{ConnectionConfig, PoolSettings};
pub use error::{CrudError, CrudResult};
pub use health::ConnectionTestResult;
pub use pool::{ConnectionManager, create_pool};
pub use row::ResultRow;
pub use service::{CommandOutcome, CrudRequest, CrudService};
pub use sql::Sql;
pub use value::{ColumnValues, FieldValue, WireType, normalize};

pub use tokio_util::sync::CancellationToken;

//! Local username/password login backed by a SQL Server account table.
//!
//! The crate has two layers:
//!
//! * a bounded, health-checked connection pool and a [`QueryExecutor`] that runs parameterized
//!   statements with named `@name` placeholders, either as direct SQL or as a stored-procedure
//!   call, and
//! * an [`auth::AuthPipeline`] that verifies credentials through the executor, resolves or creates
//!   the matching local identity, records the attempt, applies ban and local-login policy and
//!   clears the attempt counter.
//!
//! The host's identity, attempt and settings stores are reached through the traits in
//! [`auth::stores`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use sql_local_auth::prelude::*;
//!
//! # async fn demo(
//! #     identities: Arc<dyn IdentityStore>,
//! #     attempts: Arc<dyn AttemptStore>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::from_json_str(r#"{
//!     "connection": { "server": "db01", "database": "atum2_db_account",
//!                     "userName": "auth", "password": "secret" }
//! }"#)?;
//! let verifier = CredentialVerifier::from_config(&config)?;
//! let pipeline = AuthPipeline::new(verifier, identities, attempts, Arc::new(SettingsMap::new()));
//!
//! let request = LoginRequest::new("alice", "pw", "127.0.0.1".parse()?);
//! let decision = pipeline.authenticate(&request).await?;
//! println!("logged in as uid {}", decision.uid);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
#[cfg(feature = "mssql")]
pub mod mssql;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod translation;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{AuthConfig, PoolOptions};
pub use error::{AuthError, DriverError, SqlError, StoreError};
pub use executor::QueryExecutor;
pub use results::{CustomDbRow, ResultSet};
pub use types::{ExecMode, ParameterBinding, RowValues, SqlType};

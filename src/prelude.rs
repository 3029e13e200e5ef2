//! Convenient imports for common functionality.

pub use crate::auth::{
    AttemptStore, AuthDecision, AuthPipeline, CredentialVerifier, IdentityStore, LoginRequest,
    NewIdentity, SettingsMap, SiteConfig, Uid,
};
pub use crate::config::{AuthConfig, PoolOptions};
pub use crate::error::{AuthError, SqlError, StoreError};
pub use crate::executor::QueryExecutor;
pub use crate::pool::{ConnectionFactory, PoolStatus, SqlConnection};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::types::{ExecMode, ParameterBinding, RowValues, SqlType};

#[cfg(feature = "mssql")]
pub use crate::mssql::{MssqlFactory, MssqlOptions, create_mssql_client};

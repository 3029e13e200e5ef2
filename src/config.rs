//! Pool and authentication settings.
//!
//! Settings are usually read from the host's JSON configuration under an `"ao-auth"` section:
//!
//! ```json
//! {
//!   "ao-auth": {
//!     "pool": { "max": 10, "acquireTimeout": 5000 },
//!     "connection": { "server": "db01", "database": "atum2_db_account",
//!                     "userName": "auth", "password": "..." },
//!     "accountQuery": "SELECT * FROM td_Account WHERE AccountName = @accName AND Password = @password"
//!   }
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::SqlError;

#[cfg(feature = "mssql")]
use crate::mssql::MssqlOptions;

/// Section name the host configuration keeps these settings under.
pub const CONFIG_SECTION: &str = "ao-auth";

/// Account lookup used when the configuration does not override it.
pub const DEFAULT_ACCOUNT_QUERY: &str =
    "SELECT * FROM atum2_db_account.dbo.td_Account WHERE AccountName = @accName AND Password = @password";

/// Options for the bounded connection pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolOptions {
    /// Maximum number of live connections.
    #[serde(alias = "max")]
    pub max_size: usize,
    /// How long `acquire` waits for a free connection before failing with `PoolExhausted`.
    #[serde(alias = "acquireTimeout")]
    pub wait_timeout_ms: u64,
    /// Upper bound for opening a new connection.
    pub create_timeout_ms: Option<u64>,
    /// Upper bound for the health check run before a connection is reused.
    pub recycle_timeout_ms: Option<u64>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 10,
            wait_timeout_ms: 5_000,
            create_timeout_ms: Some(15_000),
            recycle_timeout_ms: Some(5_000),
        }
    }
}

impl PoolOptions {
    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout_ms = duration_ms(timeout);
        self
    }

    #[must_use]
    pub fn with_create_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.create_timeout_ms = timeout.map(duration_ms);
        self
    }

    #[must_use]
    pub fn with_recycle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.recycle_timeout_ms = timeout.map(duration_ms);
        self
    }

    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    #[must_use]
    pub fn create_timeout(&self) -> Option<Duration> {
        self.create_timeout_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub fn recycle_timeout(&self) -> Option<Duration> {
        self.recycle_timeout_ms.map(Duration::from_millis)
    }

    /// Reject settings that would make the pool useless or let `acquire` block forever.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ConfigError` for a zero pool size or a zero wait timeout.
    pub fn validate(&self) -> Result<(), SqlError> {
        if self.max_size == 0 {
            return Err(SqlError::ConfigError(
                "pool max size must be at least 1".to_string(),
            ));
        }
        if self.wait_timeout_ms == 0 {
            return Err(SqlError::ConfigError(
                "pool wait timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn default_account_query() -> String {
    DEFAULT_ACCOUNT_QUERY.to_string()
}

/// Everything needed to stand up the credential verifier.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(default)]
    pub pool: PoolOptions,
    #[cfg(feature = "mssql")]
    pub connection: MssqlOptions,
    #[serde(default = "default_account_query")]
    pub account_query: String,
}

impl AuthConfig {
    /// Parse a bare settings object.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ConfigError` if the JSON does not describe a valid configuration.
    pub fn from_json_str(json: &str) -> Result<Self, SqlError> {
        let value: JsonValue = serde_json::from_str(json)
            .map_err(|e| SqlError::ConfigError(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Pull the [`CONFIG_SECTION`] section out of a host configuration document.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ConfigError` if the section is missing or invalid.
    pub fn from_host_config(root: &JsonValue) -> Result<Self, SqlError> {
        let section = root.get(CONFIG_SECTION).ok_or_else(|| {
            SqlError::ConfigError(format!("missing '{CONFIG_SECTION}' section"))
        })?;
        Self::from_value(section.clone())
    }

    fn from_value(value: JsonValue) -> Result<Self, SqlError> {
        let config: AuthConfig = serde_json::from_value(value)
            .map_err(|e| SqlError::ConfigError(format!("invalid {CONFIG_SECTION} settings: {e}")))?;
        config.pool.validate()?;
        if config.account_query.trim().is_empty() {
            return Err(SqlError::ConfigError("account query is empty".to_string()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_options_accept_pool_style_aliases() {
        let opts: PoolOptions =
            serde_json::from_str(r#"{ "max": 3, "acquireTimeout": 250 }"#).unwrap();
        assert_eq!(opts.max_size, 3);
        assert_eq!(opts.wait_timeout(), Duration::from_millis(250));
        assert_eq!(opts.create_timeout_ms, PoolOptions::default().create_timeout_ms);
    }

    #[test]
    fn validation_rejects_unbounded_or_empty_pools() {
        assert!(PoolOptions::default().validate().is_ok());
        assert!(matches!(
            PoolOptions::default().with_max_size(0).validate(),
            Err(SqlError::ConfigError(_))
        ));
        assert!(matches!(
            PoolOptions::default()
                .with_wait_timeout(Duration::ZERO)
                .validate(),
            Err(SqlError::ConfigError(_))
        ));
    }

    #[cfg(feature = "mssql")]
    #[test]
    fn host_config_section_is_parsed() {
        let root = serde_json::json!({
            "ao-auth": {
                "pool": { "max": 4 },
                "connection": {
                    "server": "db01",
                    "database": "atum2_db_account",
                    "userName": "auth",
                    "password": "pw"
                }
            }
        });
        let config = AuthConfig::from_host_config(&root).unwrap();
        assert_eq!(config.pool.max_size, 4);
        assert_eq!(config.account_query, DEFAULT_ACCOUNT_QUERY);
        assert_eq!(config.connection.user, "auth");
        assert!(AuthConfig::from_host_config(&serde_json::json!({})).is_err());
    }
}

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tiberius::{AuthMethod, Client, Config as TiberiusConfig};
use tokio::net::TcpStream;
use tokio_util::compat::Compat;

use super::client::create_mssql_client;
use super::query::build_result_set;
use crate::config::PoolOptions;
use crate::error::{DriverError, SqlError};
use crate::executor::QueryExecutor;
use crate::pool::{ConnectionFactory, SqlConnection};
use crate::results::ResultSetBuilder;
use crate::translation::PreparedQuery;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Options for connecting to SQL Server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MssqlOptions {
    pub server: String,
    pub database: String,
    #[serde(alias = "userName")]
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub trust_cert: bool,
}

impl fmt::Debug for MssqlOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlOptions")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("instance_name", &self.instance_name)
            .field("trust_cert", &self.trust_cert)
            .finish_non_exhaustive()
    }
}

impl MssqlOptions {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            server,
            database,
            user,
            password,
            port: None,
            instance_name: None,
            trust_cert: false,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_instance_name(mut self, instance_name: Option<String>) -> Self {
        self.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn with_trust_cert(mut self, trust_cert: bool) -> Self {
        self.trust_cert = trust_cert;
        self
    }

    pub(crate) fn tiberius_config(&self) -> TiberiusConfig {
        let mut config = TiberiusConfig::new();
        config.host(&self.server);
        config.database(&self.database);
        config.authentication(AuthMethod::sql_server(&self.user, &self.password));
        config.port(self.port.unwrap_or(1433));
        if let Some(instance) = &self.instance_name {
            config.instance_name(instance);
        }
        if self.trust_cert {
            config.trust_cert();
        }
        config
    }
}

/// Fluent builder for MSSQL options.
#[derive(Debug, Clone)]
pub struct MssqlOptionsBuilder {
    opts: MssqlOptions,
}

impl MssqlOptionsBuilder {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            opts: MssqlOptions::new(server, database, user, password),
        }
    }

    #[must_use]
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.opts.port = port;
        self
    }

    #[must_use]
    pub fn instance_name(mut self, instance_name: Option<String>) -> Self {
        self.opts.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn trust_cert(mut self, trust_cert: bool) -> Self {
        self.opts.trust_cert = trust_cert;
        self
    }

    #[must_use]
    pub fn finish(self) -> MssqlOptions {
        self.opts
    }

    /// Build a pooled executor for SQL Server.
    ///
    /// # Errors
    ///
    /// Returns `SqlError` if the pool options are invalid or the pool cannot be built.
    pub fn build(self, pool: &PoolOptions) -> Result<QueryExecutor<MssqlFactory>, SqlError> {
        QueryExecutor::new(MssqlFactory::new(self.finish()), pool)
    }
}

/// Opens SQL Server sessions for the pool.
#[derive(Debug, Clone)]
pub struct MssqlFactory {
    options: MssqlOptions,
}

impl MssqlFactory {
    #[must_use]
    pub fn new(options: MssqlOptions) -> Self {
        Self { options }
    }
}

/// One pooled SQL Server session.
pub struct MssqlConnection {
    client: MssqlClient,
}

#[async_trait]
impl SqlConnection for MssqlConnection {
    async fn run(
        &mut self,
        query: &PreparedQuery,
        rows: &mut ResultSetBuilder,
    ) -> Result<(), DriverError> {
        build_result_set(&mut self.client, query, rows).await
    }
}

#[async_trait]
impl ConnectionFactory for MssqlFactory {
    type Connection = MssqlConnection;

    async fn connect(&self) -> Result<Self::Connection, DriverError> {
        let client = create_mssql_client(&self.options).await?;
        Ok(MssqlConnection { client })
    }
}

impl QueryExecutor<MssqlFactory> {
    /// Pooled executor for SQL Server.
    ///
    /// # Errors
    ///
    /// Returns `SqlError` if the pool options are invalid or the pool cannot be built.
    pub fn mssql(options: MssqlOptions, pool: &PoolOptions) -> Result<Self, SqlError> {
        QueryExecutor::new(MssqlFactory::new(options), pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_password() {
        let opts = MssqlOptionsBuilder::new(
            "db01".into(),
            "atum2_db_account".into(),
            "auth".into(),
            "s3cret".into(),
        )
        .port(Some(1444))
        .finish();
        let rendered = format!("{opts:?}");
        assert!(rendered.contains("db01"));
        assert!(!rendered.contains("s3cret"));
        assert_eq!(opts.port, Some(1444));
    }

    #[tokio::test]
    async fn executor_builds_without_connecting() {
        let executor = MssqlOptionsBuilder::new(
            "127.0.0.1".into(),
            "master".into(),
            "sa".into(),
            "pw".into(),
        )
        .build(&PoolOptions::default().with_max_size(2))
        .unwrap();
        let status = executor.status();
        assert_eq!(status.max_size, 2);
        assert_eq!(status.size, 0);
    }
}

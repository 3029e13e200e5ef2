//! Pooled query execution.

use std::time::Instant;

use deadpool::Runtime;
use deadpool::managed::Pool;

use crate::config::PoolOptions;
use crate::error::SqlError;
use crate::pool::{ConnectionFactory, ConnectionManager, PoolConnection, PoolStatus};
use crate::results::{ResultSet, ResultSetBuilder};
use crate::translation;
use crate::types::{ExecMode, ParameterBinding};

/// Runs parameterized statements on connections leased from a bounded pool.
///
/// Cloning is cheap and every clone shares the same pool. Build one executor at startup, share it,
/// and call [`QueryExecutor::close`] on shutdown.
pub struct QueryExecutor<F: ConnectionFactory> {
    pool: Pool<ConnectionManager<F>>,
}

impl<F: ConnectionFactory> Clone for QueryExecutor<F> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for QueryExecutor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("status", &self.status())
            .finish()
    }
}

impl<F: ConnectionFactory> QueryExecutor<F> {
    /// Build the pool. No connection is opened until the first query.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::ConfigError` for invalid options, or `SqlError::PoolUnavailable` if the
    /// pool cannot be constructed.
    pub fn new(factory: F, options: &PoolOptions) -> Result<Self, SqlError> {
        options.validate()?;
        let pool = Pool::builder(ConnectionManager::new(factory))
            .max_size(options.max_size)
            .wait_timeout(Some(options.wait_timeout()))
            .create_timeout(options.create_timeout())
            .recycle_timeout(options.recycle_timeout())
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| SqlError::PoolUnavailable(format!("failed to build pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Lease a connection, waiting at most the configured wait timeout.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::PoolExhausted` when no connection frees up in time and
    /// `SqlError::PoolUnavailable` when the pool is closed or cannot open a connection.
    pub async fn acquire(&self) -> Result<PoolConnection<F>, SqlError> {
        match self.pool.get().await {
            Ok(obj) => Ok(PoolConnection::new(obj)),
            Err(err) => {
                let err = SqlError::from(err);
                tracing::error!(error = %err, "pool error");
                Err(err)
            }
        }
    }

    /// Run `sql` with `bindings` in `mode` and collect every emitted row.
    ///
    /// The leased connection goes back to the pool exactly once whatever the outcome; on failure no
    /// rows are returned. Elapsed time is reported through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns pool errors from [`QueryExecutor::acquire`], `SqlError::BindingError` for invalid
    /// bindings, `SqlError::UnsupportedMode` if the connection cannot run `mode`, and
    /// `SqlError::QueryError` for driver failures.
    pub async fn execute(
        &self,
        sql: &str,
        bindings: &[ParameterBinding],
        mode: ExecMode,
    ) -> Result<ResultSet, SqlError> {
        let started = Instant::now();
        let result = self.execute_on_lease(sql, bindings, mode).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok(rows) => {
                tracing::debug!(elapsed_ms, rows = rows.len(), query = sql, "execute time");
            }
            Err(err) => {
                tracing::error!(error = %err, elapsed_ms, query = sql, "request error");
            }
        }
        result
    }

    /// [`QueryExecutor::execute`] in [`ExecMode::Direct`].
    ///
    /// # Errors
    ///
    /// See [`QueryExecutor::execute`].
    pub async fn query(
        &self,
        sql: &str,
        bindings: &[ParameterBinding],
    ) -> Result<ResultSet, SqlError> {
        self.execute(sql, bindings, ExecMode::Direct).await
    }

    async fn execute_on_lease(
        &self,
        sql: &str,
        bindings: &[ParameterBinding],
        mode: ExecMode,
    ) -> Result<ResultSet, SqlError> {
        let mut conn = self.acquire().await?;

        let prepared = translation::prepare(sql, bindings, mode)?;
        if !conn.supports_mode(mode) {
            return Err(SqlError::UnsupportedMode(mode));
        }

        let mut rows = ResultSetBuilder::with_capacity(4);
        let outcome = conn.run(&prepared, &mut rows).await;
        match outcome {
            Ok(()) => Ok(rows.finish()),
            Err(err) => {
                if !conn.is_clean() {
                    tracing::warn!(error = %err, "retiring connection after fatal driver error");
                    conn.retire();
                }
                Err(SqlError::QueryError(err))
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: usize::try_from(status.available).unwrap_or(0),
            waiting: status.waiting,
        }
    }

    /// Close the pool: idle connections are dropped, leased ones are dropped when released, and
    /// further acquisitions fail with `SqlError::PoolUnavailable`.
    pub fn close(&self) {
        self.pool.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::test_utils::{MemoryDatabase, MemoryFactory};

    #[tokio::test]
    async fn explicit_lease_is_exclusive_until_dropped() {
        let db = MemoryDatabase::new();
        let options = PoolOptions::default()
            .with_max_size(1)
            .with_wait_timeout(Duration::from_millis(30));
        let exec = QueryExecutor::new(MemoryFactory::new(Arc::clone(&db)), &options).unwrap();

        let lease = exec.acquire().await.unwrap();
        assert!(lease.is_clean());
        assert_eq!(exec.status().available, 0);
        assert!(matches!(exec.acquire().await, Err(SqlError::PoolExhausted)));

        drop(lease);
        assert_eq!(exec.status().available, 1);
        assert!(exec.acquire().await.is_ok());
        assert_eq!(db.opened_connections(), 1);
    }
}

use deadpool::managed::{Manager, Metrics, RecycleError, RecycleResult};

use super::connection::{ConnectionFactory, ManagedConnection};
use crate::error::DriverError;

/// deadpool manager that opens sessions through a [`ConnectionFactory`].
pub struct ConnectionManager<F> {
    factory: F,
}

impl<F> ConnectionManager<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F: ConnectionFactory> Manager for ConnectionManager<F> {
    type Type = ManagedConnection<F::Connection>;
    type Error = DriverError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let conn = self.factory.connect().await?;
        tracing::debug!("opened database connection");
        Ok(ManagedConnection::new(conn))
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _metrics: &Metrics,
    ) -> RecycleResult<Self::Error> {
        if !conn.clean {
            tracing::warn!("discarding connection left mid-query");
            return Err(RecycleError::Backend(DriverError::Protocol(
                "connection was released before its query completed".to_string(),
            )));
        }
        self.factory
            .ping(&mut conn.inner)
            .await
            .map_err(RecycleError::Backend)
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Configured upper bound.
    pub max_size: usize,
    /// Connections currently open (idle or leased).
    pub size: usize,
    /// Idle connections ready to hand out.
    pub available: usize,
    /// Callers waiting for a connection.
    pub waiting: usize,
}

use async_trait::async_trait;
use deadpool::managed::Object;

use super::types::ConnectionManager;
use crate::error::DriverError;
use crate::results::ResultSetBuilder;
use crate::translation::PreparedQuery;
use crate::types::ExecMode;

/// One live database session.
#[async_trait]
pub trait SqlConnection: Send + 'static {
    /// Whether this session can submit statements in `mode`.
    fn supports_mode(&self, _mode: ExecMode) -> bool {
        true
    }

    /// Run `query`, pushing every emitted row into `rows` in arrival order.
    async fn run(
        &mut self,
        query: &PreparedQuery,
        rows: &mut ResultSetBuilder,
    ) -> Result<(), DriverError>;
}

/// Opens sessions for the pool and checks them before reuse.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: SqlConnection;

    async fn connect(&self) -> Result<Self::Connection, DriverError>;

    /// Health check run before an idle connection is handed out again.
    async fn ping(&self, conn: &mut Self::Connection) -> Result<(), DriverError> {
        let mut sink = ResultSetBuilder::default();
        conn.run(&PreparedQuery::raw("SELECT 1"), &mut sink).await
    }
}

/// A pooled session plus whether its last query completed cleanly.
pub struct ManagedConnection<C> {
    pub(crate) inner: C,
    pub(crate) clean: bool,
}

impl<C> ManagedConnection<C> {
    pub(crate) fn new(inner: C) -> Self {
        Self { inner, clean: true }
    }
}

/// Exclusive lease on one pooled connection.
///
/// Dropping the lease returns the connection to the pool. A lease dropped while a query is still
/// in flight leaves the connection marked unclean, and the pool discards it instead of reusing it.
pub struct PoolConnection<F: ConnectionFactory> {
    obj: Object<ConnectionManager<F>>,
}

impl<F: ConnectionFactory> std::fmt::Debug for PoolConnection<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConnection")
            .field("clean", &self.obj.clean)
            .finish_non_exhaustive()
    }
}

impl<F: ConnectionFactory> PoolConnection<F> {
    pub(crate) fn new(obj: Object<ConnectionManager<F>>) -> Self {
        Self { obj }
    }

    pub(crate) fn supports_mode(&self, mode: ExecMode) -> bool {
        self.obj.inner.supports_mode(mode)
    }

    /// Run a prepared query on this connection, tracking whether it finished.
    pub(crate) async fn run(
        &mut self,
        query: &PreparedQuery,
        rows: &mut ResultSetBuilder,
    ) -> Result<(), DriverError> {
        self.obj.clean = false;
        let outcome = self.obj.inner.run(query, rows).await;
        match &outcome {
            Err(err) if err.is_fatal() => {}
            _ => self.obj.clean = true,
        }
        outcome
    }

    /// Whether the connection may go back into rotation.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.obj.clean
    }

    /// Remove the connection from the pool for good.
    pub(crate) fn retire(self) {
        drop(Object::take(self.obj));
    }
}

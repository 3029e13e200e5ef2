use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::pool::{ConnectionFactory, SqlConnection};
use crate::results::ResultSetBuilder;
use crate::translation::PreparedQuery;
use crate::types::{ExecMode, RowValues};

/// A scripted driver failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryFault {
    /// The server rejected the statement; the session survives.
    Server(String),
    /// The session broke mid-query.
    Disconnect(String),
}

impl MemoryFault {
    fn to_error(&self) -> DriverError {
        match self {
            MemoryFault::Server(msg) => DriverError::Server(msg.clone()),
            MemoryFault::Disconnect(msg) => DriverError::Protocol(msg.clone()),
        }
    }
}

/// What the in-memory server does for a given statement.
#[derive(Debug, Clone)]
pub enum Scripted {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<RowValues>>,
    },
    /// Emit `rows`, then fail.
    RowsThenFault {
        columns: Vec<String>,
        rows: Vec<Vec<RowValues>>,
        fault: MemoryFault,
    },
    Fault(MemoryFault),
}

/// Shared state behind every [`MemoryConnection`]; scripts responses and records traffic.
///
/// Statements are matched on [`PreparedQuery::source`], i.e. the SQL text or procedure name as the
/// caller wrote it. Unscripted statements succeed with no rows.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    responses: Mutex<HashMap<String, Scripted>>,
    executed: Mutex<Vec<PreparedQuery>>,
    opened: AtomicUsize,
    pings: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    procedures: AtomicBool,
    refuse: AtomicBool,
    latency: Mutex<Duration>,
}

impl MemoryDatabase {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            procedures: AtomicBool::new(true),
            ..Self::default()
        })
    }

    pub fn respond(&self, sql: &str, columns: &[&str], rows: Vec<Vec<RowValues>>) {
        self.respond_with(
            sql,
            Scripted::Rows {
                columns: columns.iter().map(|c| (*c).to_string()).collect(),
                rows,
            },
        );
    }

    pub fn fail(&self, sql: &str, fault: MemoryFault) {
        self.respond_with(sql, Scripted::Fault(fault));
    }

    pub fn respond_with(&self, sql: &str, scripted: Scripted) {
        lock(&self.responses).insert(sql.to_string(), scripted);
    }

    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    pub fn set_procedures_supported(&self, supported: bool) {
        self.procedures.store(supported, Ordering::SeqCst);
    }

    /// Make new connections fail as if the server were unreachable.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    #[must_use]
    pub fn executed(&self) -> Vec<PreparedQuery> {
        lock(&self.executed).clone()
    }

    #[must_use]
    pub fn executions_of(&self, sql: &str) -> usize {
        lock(&self.executed)
            .iter()
            .filter(|q| q.source == sql)
            .count()
    }

    #[must_use]
    pub fn opened_connections(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// Highest number of queries that were running at the same time.
    #[must_use]
    pub fn max_concurrent_queries(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connection factory over a [`MemoryDatabase`].
#[derive(Debug, Clone)]
pub struct MemoryFactory {
    db: Arc<MemoryDatabase>,
}

impl MemoryFactory {
    #[must_use]
    pub fn new(db: Arc<MemoryDatabase>) -> Self {
        Self { db }
    }
}

/// One in-memory session.
#[derive(Debug)]
pub struct MemoryConnection {
    db: Arc<MemoryDatabase>,
}

struct InFlight<'a>(&'a MemoryDatabase);

impl<'a> InFlight<'a> {
    fn enter(db: &'a MemoryDatabase) -> Self {
        let now = db.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        db.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(db)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SqlConnection for MemoryConnection {
    fn supports_mode(&self, mode: ExecMode) -> bool {
        match mode {
            ExecMode::Direct => true,
            ExecMode::StoredProcedure => self.db.procedures.load(Ordering::SeqCst),
        }
    }

    async fn run(
        &mut self,
        query: &PreparedQuery,
        rows: &mut ResultSetBuilder,
    ) -> Result<(), DriverError> {
        let _in_flight = InFlight::enter(&self.db);
        lock(&self.db.executed).push(query.clone());

        let latency = *lock(&self.db.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let scripted = lock(&self.db.responses).get(&query.source).cloned();
        match scripted {
            None => Ok(()),
            Some(Scripted::Rows { columns, rows: data }) => {
                for values in data {
                    rows.push_row(&columns, values)?;
                }
                Ok(())
            }
            Some(Scripted::RowsThenFault {
                columns,
                rows: data,
                fault,
            }) => {
                for values in data {
                    rows.push_row(&columns, values)?;
                }
                Err(fault.to_error())
            }
            Some(Scripted::Fault(fault)) => Err(fault.to_error()),
        }
    }
}

#[async_trait]
impl ConnectionFactory for MemoryFactory {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<Self::Connection, DriverError> {
        if self.db.refuse.load(Ordering::SeqCst) {
            return Err(DriverError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "memory database refuses connections",
            )));
        }
        self.db.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            db: Arc::clone(&self.db),
        })
    }

    async fn ping(&self, _conn: &mut Self::Connection) -> Result<(), DriverError> {
        self.db.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

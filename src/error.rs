use thiserror::Error;

use crate::types::ExecMode;

/// Failure reported by a database driver while running a query.
#[derive(Debug, Error)]
pub enum DriverError {
    #[cfg(feature = "mssql")]
    #[error(transparent)]
    Mssql(#[from] tiberius::error::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The server rejected the statement; the session itself is still usable.
    #[error("server error: {0}")]
    Server(String),

    /// The session is in an unknown state and must not be reused.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl DriverError {
    /// Whether the connection that produced this error has to be retired.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            #[cfg(feature = "mssql")]
            DriverError::Mssql(err) => matches!(
                err,
                tiberius::error::Error::Io { .. }
                    | tiberius::error::Error::Protocol(_)
                    | tiberius::error::Error::Tls(_)
                    | tiberius::error::Error::Routing { .. }
            ),
            DriverError::Io(_) | DriverError::Protocol(_) => true,
            DriverError::Server(_) => false,
        }
    }
}

/// Errors raised by the pool and the query executor.
#[derive(Debug, Error)]
pub enum SqlError {
    #[error("connection pool exhausted: no connection became available in time")]
    PoolExhausted,

    #[error("connection pool unavailable: {0}")]
    PoolUnavailable(String),

    #[error("Parameter binding error: {0}")]
    BindingError(String),

    #[error("execution mode {0} is not supported by this connection")]
    UnsupportedMode(ExecMode),

    #[error("SQL execution error: {0}")]
    QueryError(#[from] DriverError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<deadpool::managed::PoolError<DriverError>> for SqlError {
    fn from(err: deadpool::managed::PoolError<DriverError>) -> Self {
        use deadpool::managed::{PoolError, TimeoutType};
        match err {
            PoolError::Timeout(TimeoutType::Wait) => SqlError::PoolExhausted,
            PoolError::Backend(driver) => {
                SqlError::PoolUnavailable(format!("failed to open a connection: {driver}"))
            }
            other => SqlError::PoolUnavailable(other.to_string()),
        }
    }
}

/// Errors raised by the identity, attempt and profile collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Backend(String),

    #[error(transparent)]
    Sql(#[from] SqlError),
}

/// Which half of the concurrent status fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusField {
    Banned,
    Admin,
}

impl std::fmt::Display for StatusField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusField::Banned => f.write_str("banned"),
            StatusField::Admin => f.write_str("isAdmin"),
        }
    }
}

/// Outcome of a rejected or failed authentication attempt.
///
/// `NoSuchUser`, `LocalLoginDisabled` and `UserBanned` are deliberate rejections; every other
/// variant is an infrastructure fault. Use [`AuthError::is_rejection`] to tell them apart.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no such user")]
    NoSuchUser,

    #[error("local login is disabled")]
    LocalLoginDisabled,

    #[error("user is banned")]
    UserBanned,

    #[error("account row is malformed: {0}")]
    MalformedAccount(String),

    #[error("identity resolution failed: {0}")]
    Identity(#[source] StoreError),

    #[error("failed to record login attempt: {0}")]
    Recorder(#[source] StoreError),

    #[error("failed to fetch {field} status: {source}")]
    StatusFetch {
        field: StatusField,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Sql(#[from] SqlError),
}

impl AuthError {
    /// True for policy outcomes that should be shown to the user rather than logged as incidents.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::NoSuchUser | AuthError::LocalLoginDisabled | AuthError::UserBanned
        )
    }

    /// Translation key the host renders for rejections.
    #[must_use]
    pub fn message_key(&self) -> Option<&'static str> {
        match self {
            AuthError::NoSuchUser => Some("[[error:no-user]]"),
            AuthError::LocalLoginDisabled => Some("[[error:local-login-disabled]]"),
            AuthError::UserBanned => Some("[[error:user-banned]]"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_distinguishable_from_faults() {
        assert!(AuthError::NoSuchUser.is_rejection());
        assert!(AuthError::UserBanned.is_rejection());
        assert!(AuthError::LocalLoginDisabled.is_rejection());
        assert!(!AuthError::Sql(SqlError::PoolExhausted).is_rejection());
        assert!(
            !AuthError::Recorder(StoreError::Backend("down".into())).is_rejection()
        );
        assert_eq!(
            AuthError::LocalLoginDisabled.message_key(),
            Some("[[error:local-login-disabled]]")
        );
        assert_eq!(AuthError::Sql(SqlError::PoolExhausted).message_key(), None);
    }

    #[test]
    fn wait_timeout_maps_to_exhausted() {
        let err: SqlError = deadpool::managed::PoolError::<DriverError>::Timeout(
            deadpool::managed::TimeoutType::Wait,
        )
        .into();
        assert!(matches!(err, SqlError::PoolExhausted));

        let err: SqlError = deadpool::managed::PoolError::<DriverError>::Closed.into();
        assert!(matches!(err, SqlError::PoolUnavailable(_)));
    }

    #[test]
    fn server_errors_keep_the_connection() {
        assert!(!DriverError::Server("syntax".into()).is_fatal());
        assert!(DriverError::Protocol("eof".into()).is_fatal());
    }
}

use crate::error::AuthError;
use crate::executor::QueryExecutor;
use crate::pool::ConnectionFactory;
use crate::results::CustomDbRow;
use crate::types::{ParameterBinding, RowValues};

#[cfg(feature = "mssql")]
use crate::{config::AuthConfig, error::SqlError, mssql::MssqlFactory};

pub use crate::config::DEFAULT_ACCOUNT_QUERY;

const ACCOUNT_NAME_COLUMN: &str = "AccountName";
const EMAIL_COLUMN: &str = "email";

/// An account-table row that matched the submitted credentials.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub account_name: String,
    pub email: Option<String>,
    /// The full row, for hosts that want more columns.
    pub row: CustomDbRow,
}

impl TryFrom<CustomDbRow> for AccountRecord {
    type Error = AuthError;

    fn try_from(row: CustomDbRow) -> Result<Self, Self::Error> {
        let account_name = match row.get_ignore_ascii_case(ACCOUNT_NAME_COLUMN) {
            Some(RowValues::Text(name)) if !name.is_empty() => name.clone(),
            Some(other) => {
                return Err(AuthError::MalformedAccount(format!(
                    "{ACCOUNT_NAME_COLUMN} is {}, expected non-empty text",
                    other.kind()
                )));
            }
            None => {
                return Err(AuthError::MalformedAccount(format!(
                    "no {ACCOUNT_NAME_COLUMN} column"
                )));
            }
        };
        let email = row
            .get_ignore_ascii_case(EMAIL_COLUMN)
            .and_then(RowValues::as_text)
            .map(str::to_string);

        Ok(Self {
            account_name,
            email,
            row,
        })
    }
}

/// Looks a username/password pair up in the account table.
pub struct CredentialVerifier<F: ConnectionFactory> {
    executor: QueryExecutor<F>,
    account_query: String,
}

impl<F: ConnectionFactory> CredentialVerifier<F> {
    /// Verifier using [`DEFAULT_ACCOUNT_QUERY`].
    #[must_use]
    pub fn new(executor: QueryExecutor<F>) -> Self {
        Self::with_query(executor, DEFAULT_ACCOUNT_QUERY)
    }

    /// Verifier using a custom lookup; it must reference `@accName` and `@password`.
    #[must_use]
    pub fn with_query(executor: QueryExecutor<F>, account_query: impl Into<String>) -> Self {
        Self {
            executor,
            account_query: account_query.into(),
        }
    }

    /// Return the first matching account row, or `None` if nothing matched.
    ///
    /// Extra matching rows are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Sql` for pool or query failures and `AuthError::MalformedAccount` when
    /// the first row has no usable account name.
    pub async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<AccountRecord>, AuthError> {
        let bindings = [
            ParameterBinding::varchar("accName", username),
            ParameterBinding::varchar("password", password),
        ];
        let rows = self.executor.query(&self.account_query, &bindings).await?;
        if rows.len() > 1 {
            tracing::warn!(matches = rows.len(), "several account rows matched; using the first");
        }

        rows.into_iter()
            .next()
            .map(AccountRecord::try_from)
            .transpose()
    }
}

#[cfg(feature = "mssql")]
impl CredentialVerifier<MssqlFactory> {
    /// Stand up the pool and verifier described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `SqlError` if the pool cannot be built from the configuration.
    pub fn from_config(config: &AuthConfig) -> Result<Self, SqlError> {
        let executor = QueryExecutor::mssql(config.connection.clone(), &config.pool)?;
        Ok(Self::with_query(executor, config.account_query.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn row(columns: &[&str], values: Vec<RowValues>) -> CustomDbRow {
        CustomDbRow::new(
            Arc::new(columns.iter().map(|c| (*c).to_string()).collect()),
            values,
        )
    }

    #[test]
    fn account_record_reads_name_and_optional_email() {
        let record = AccountRecord::try_from(row(
            &["AccountUniqueNumber", "AccountName", "Password", "email"],
            vec![
                RowValues::Int(7),
                RowValues::Text("alice".into()),
                RowValues::Text("pw".into()),
                RowValues::Null,
            ],
        ))
        .unwrap();
        assert_eq!(record.account_name, "alice");
        assert_eq!(record.email, None);
        assert_eq!(record.row.get("AccountUniqueNumber"), Some(&RowValues::Int(7)));

        let record = AccountRecord::try_from(row(
            &["accountname", "Email"],
            vec![
                RowValues::Text("bob".into()),
                RowValues::Text("bob@example.com".into()),
            ],
        ))
        .unwrap();
        assert_eq!(record.email.as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn account_record_requires_text_name() {
        let missing = AccountRecord::try_from(row(&["email"], vec![RowValues::Null]));
        assert!(matches!(missing, Err(AuthError::MalformedAccount(_))));

        let numeric = AccountRecord::try_from(row(&["AccountName"], vec![RowValues::Int(1)]));
        assert!(matches!(numeric, Err(AuthError::MalformedAccount(_))));
    }
}

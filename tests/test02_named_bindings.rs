use std::sync::Arc;
use std::time::Duration;

use sql_local_auth::prelude::*;
use sql_local_auth::test_utils::{MemoryDatabase, MemoryFactory};
use sql_local_auth::types::TypedValue;

const ACCOUNT_SQL: &str =
    "SELECT AccountName FROM td_Account WHERE AccountName = @accName AND Password = @password";

fn executor(db: &Arc<MemoryDatabase>) -> Result<QueryExecutor<MemoryFactory>, SqlError> {
    let options = PoolOptions::default()
        .with_max_size(1)
        .with_wait_timeout(Duration::from_millis(200));
    QueryExecutor::new(MemoryFactory::new(Arc::clone(db)), &options)
}

#[tokio::test]
async fn direct_statement_is_sent_with_positional_parameters() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    db.respond(
        ACCOUNT_SQL,
        &["AccountName"],
        vec![vec![RowValues::Text("alice".into())]],
    );
    let exec = executor(&db)?;

    let rs = exec
        .query(
            ACCOUNT_SQL,
            &[
                ParameterBinding::varchar("@password", "pw"),
                ParameterBinding::varchar("accName", "alice"),
            ],
        )
        .await?;
    assert_eq!(rs.len(), 1);

    let sent = db.executed();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].text,
        "SELECT AccountName FROM td_Account WHERE AccountName = @P2 AND Password = @P1"
    );
    assert_eq!(sent[0].params[0].name, "password");
    assert_eq!(sent[0].params[1].value, TypedValue::Text("alice".into()));
    Ok(())
}

#[tokio::test]
async fn stored_procedure_call_names_its_arguments() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    db.respond("dbo.usp_Login", &["ok"], vec![vec![RowValues::Bool(true)]]);
    let exec = executor(&db)?;

    let bindings = [
        ParameterBinding::varchar("accName", "alice"),
        ParameterBinding::typed("attempts", "TinyInt", RowValues::Int(3))?,
    ];
    let rs = exec
        .execute("dbo.usp_Login", &bindings, ExecMode::StoredProcedure)
        .await?;
    assert_eq!(rs.results[0].get("ok"), Some(&RowValues::Bool(true)));

    let sent = db.executed();
    assert_eq!(
        sent[0].text,
        "EXEC dbo.usp_Login @accName = @P1, @attempts = @P2"
    );
    assert_eq!(sent[0].params[1].value, TypedValue::U8(3));
    Ok(())
}

#[tokio::test]
async fn unsupported_mode_still_releases_the_connection() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    db.set_procedures_supported(false);
    let exec = executor(&db)?;

    let err = exec
        .execute("usp_Login", &[], ExecMode::StoredProcedure)
        .await
        .unwrap_err();
    assert!(matches!(err, SqlError::UnsupportedMode(ExecMode::StoredProcedure)));
    assert_eq!(db.executed().len(), 0);

    let status = exec.status();
    assert_eq!(status.available, status.size);
    exec.query("SELECT 1", &[]).await?;
    Ok(())
}

#[tokio::test]
async fn binding_errors_never_reach_the_server() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    let exec = executor(&db)?;

    let unused = exec
        .query(
            "SELECT 1 WHERE 'x' = @a",
            &[
                ParameterBinding::varchar("a", "x"),
                ParameterBinding::varchar("b", "y"),
            ],
        )
        .await;
    assert!(matches!(unused, Err(SqlError::BindingError(_))));

    let too_wide = exec
        .query(
            "SELECT @n",
            &[ParameterBinding::new("n", SqlType::SmallInt, RowValues::Int(70_000))],
        )
        .await;
    assert!(matches!(too_wide, Err(SqlError::BindingError(_))));

    let duplicate = exec
        .query(
            "SELECT @id",
            &[ParameterBinding::int("id", 1), ParameterBinding::int("ID", 2)],
        )
        .await;
    assert!(matches!(duplicate, Err(SqlError::BindingError(_))));

    let bad_proc = exec
        .execute("usp_Login; DROP TABLE x", &[], ExecMode::StoredProcedure)
        .await;
    assert!(matches!(bad_proc, Err(SqlError::BindingError(_))));

    assert!(db.executed().is_empty());
    let status = exec.status();
    assert_eq!(status.available, status.size);
    Ok(())
}

#[tokio::test]
async fn null_values_bind_for_any_declared_type() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    let exec = executor(&db)?;

    exec.query(
        "UPDATE td_Account SET email = @email, LastLogin = @at WHERE AccountName = @accName",
        &[
            ParameterBinding::new("email", SqlType::NVarChar, RowValues::Null),
            ParameterBinding::new("at", SqlType::DateTime, RowValues::Null),
            ParameterBinding::varchar("accName", "alice"),
        ],
    )
    .await?;

    let sent = db.executed();
    assert_eq!(sent[0].params[0].value, TypedValue::Null(SqlType::NVarChar));
    assert_eq!(sent[0].params[1].value, TypedValue::Null(SqlType::DateTime));
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use sql_local_auth::DriverError;
use sql_local_auth::prelude::*;
use sql_local_auth::test_utils::{MemoryDatabase, MemoryFactory, MemoryFault, Scripted};

fn executor(
    db: &Arc<MemoryDatabase>,
    max_size: usize,
    wait: Duration,
) -> Result<QueryExecutor<MemoryFactory>, SqlError> {
    let options = PoolOptions::default()
        .with_max_size(max_size)
        .with_wait_timeout(wait);
    QueryExecutor::new(MemoryFactory::new(Arc::clone(db)), &options)
}

fn assert_all_released(exec: &QueryExecutor<MemoryFactory>) {
    let status = exec.status();
    assert_eq!(status.available, status.size, "a lease is still outstanding: {status:?}");
}

#[tokio::test]
async fn rows_come_back_in_order_and_the_lease_is_returned() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    db.respond(
        "SELECT id, name FROM accounts",
        &["id", "name"],
        vec![
            vec![RowValues::Int(1), RowValues::Text("alice".into())],
            vec![RowValues::Int(2), RowValues::Text("bob".into())],
            vec![RowValues::Int(3), RowValues::Null],
        ],
    );
    let exec = executor(&db, 2, Duration::from_millis(200))?;

    let rs = exec.query("SELECT id, name FROM accounts", &[]).await?;
    assert_eq!(rs.len(), 3);
    let ids: Vec<i64> = rs
        .iter()
        .filter_map(|row| row.get("id").and_then(RowValues::as_int).copied())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(rs.results[1].get("name"), Some(&RowValues::Text("bob".into())));
    assert!(rs.results[2].get("name").is_some_and(RowValues::is_null));
    assert_all_released(&exec);
    assert_eq!(exec.status().size, 1);
    Ok(())
}

#[tokio::test]
async fn empty_results_release_and_reuse_the_connection() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    let exec = executor(&db, 2, Duration::from_millis(200))?;

    for _ in 0..3 {
        let rs = exec.query("UPDATE accounts SET seen = 1", &[]).await?;
        assert!(rs.is_empty());
        assert_all_released(&exec);
    }
    assert_eq!(db.opened_connections(), 1);
    // every reuse is preceded by a health check
    assert_eq!(db.pings(), 2);
    Ok(())
}

#[tokio::test]
async fn server_error_keeps_the_connection() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    db.fail("SELEC 1", MemoryFault::Server("Incorrect syntax near 'SELEC'".into()));
    let exec = executor(&db, 1, Duration::from_millis(200))?;

    let err = exec.query("SELEC 1", &[]).await.unwrap_err();
    assert!(matches!(err, SqlError::QueryError(DriverError::Server(_))));
    assert_all_released(&exec);
    assert_eq!(exec.status().size, 1);

    exec.query("SELECT 1", &[]).await?;
    assert_eq!(db.opened_connections(), 1);
    Ok(())
}

#[tokio::test]
async fn partial_rows_are_discarded_on_error() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    db.respond_with(
        "SELECT * FROM big",
        Scripted::RowsThenFault {
            columns: vec!["n".into()],
            rows: vec![vec![RowValues::Int(1)], vec![RowValues::Int(2)]],
            fault: MemoryFault::Server("arithmetic overflow".into()),
        },
    );
    let exec = executor(&db, 1, Duration::from_millis(200))?;

    let result = exec.query("SELECT * FROM big", &[]).await;
    assert!(matches!(result, Err(SqlError::QueryError(_))));
    assert_all_released(&exec);
    Ok(())
}

#[tokio::test]
async fn fatal_driver_error_retires_the_connection() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    db.fail("SELECT 1 AS broken", MemoryFault::Disconnect("connection reset".into()));
    let exec = executor(&db, 1, Duration::from_millis(200))?;

    exec.query("SELECT 1", &[]).await?;
    assert_eq!(exec.status().size, 1);

    let err = exec.query("SELECT 1 AS broken", &[]).await.unwrap_err();
    assert!(matches!(err, SqlError::QueryError(DriverError::Protocol(_))));
    assert_eq!(exec.status().size, 0);

    exec.query("SELECT 1", &[]).await?;
    assert_eq!(db.opened_connections(), 2);
    assert_all_released(&exec);
    Ok(())
}

#[tokio::test]
async fn saturated_pool_reports_exhaustion() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    db.set_latency(Duration::from_millis(400));
    let exec = executor(&db, 1, Duration::from_millis(50))?;

    let holder = {
        let exec = exec.clone();
        tokio::spawn(async move { exec.query("WAITFOR DELAY '00:00:01'", &[]).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = exec.query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, SqlError::PoolExhausted));

    let held = holder.await.expect("holder task panicked");
    assert!(held.is_ok());
    assert_all_released(&exec);
    assert_eq!(db.executions_of("SELECT 1"), 0);
    Ok(())
}

#[tokio::test]
async fn concurrent_queries_never_exceed_the_pool_size() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    db.set_latency(Duration::from_millis(30));
    let exec = executor(&db, 2, Duration::from_secs(2))?;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let exec = exec.clone();
        handles.push(tokio::spawn(async move {
            exec.query("SELECT 1", &[]).await
        }));
    }
    for handle in handles {
        handle.await.expect("query task panicked")?;
    }

    assert!(db.max_concurrent_queries() <= 2);
    assert!(db.opened_connections() <= 2);
    assert_eq!(db.executions_of("SELECT 1"), 6);
    assert_all_released(&exec);
    Ok(())
}

#[tokio::test]
async fn cancelled_query_does_not_return_its_connection_to_rotation() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    db.set_latency(Duration::from_millis(500));
    let exec = executor(&db, 1, Duration::from_secs(1))?;

    let task = {
        let exec = exec.clone();
        tokio::spawn(async move { exec.query("SELECT 1", &[]).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    task.abort();
    assert!(task.await.is_err());

    db.set_latency(Duration::ZERO);
    exec.query("SELECT 1", &[]).await?;
    assert_eq!(db.opened_connections(), 2);
    assert_all_released(&exec);
    Ok(())
}

#[tokio::test]
async fn unreachable_server_and_closed_pool_are_unavailable() -> Result<(), SqlError> {
    let db = MemoryDatabase::new();
    db.refuse_connections(true);
    let exec = executor(&db, 1, Duration::from_millis(200))?;

    let err = exec.query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, SqlError::PoolUnavailable(_)));

    db.refuse_connections(false);
    exec.query("SELECT 1", &[]).await?;

    exec.close();
    assert!(exec.is_closed());
    let err = exec.query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, SqlError::PoolUnavailable(_)));
    Ok(())
}

#[test]
fn invalid_pool_options_are_rejected() {
    let db = MemoryDatabase::new();
    assert!(matches!(
        executor(&db, 0, Duration::from_millis(200)),
        Err(SqlError::ConfigError(_))
    ));
}

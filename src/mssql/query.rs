use chrono::{NaiveDate, NaiveDateTime};
use futures_util::TryStreamExt;
use tiberius::numeric::Numeric;

use super::config::MssqlClient;
use super::params::bind_query_params;
use crate::error::DriverError;
use crate::results::ResultSetBuilder;
use crate::translation::PreparedQuery;
use crate::types::RowValues;

/// Run `prepared` on `client` and push every returned row into `rows`.
///
/// Column names are read from each row's own metadata, so batches that return several result sets
/// with different shapes are reconstructed faithfully.
///
/// # Errors
///
/// Returns `DriverError::Mssql` if the server rejects the statement or the row stream fails.
pub async fn build_result_set(
    client: &mut MssqlClient,
    prepared: &PreparedQuery,
    rows: &mut ResultSetBuilder,
) -> Result<(), DriverError> {
    let stream = bind_query_params(prepared).query(client).await?;

    let mut row_stream = stream.into_row_stream();
    while let Some(row) = row_stream.try_next().await? {
        let column_names: Vec<&str> = row.columns().iter().map(|col| col.name()).collect();
        let values = (0..column_names.len())
            .map(|idx| extract_value(&row, idx))
            .collect();
        rows.push_row(&column_names, values)?;
    }

    Ok(())
}

/// Extract a value from a row at a specific index
fn extract_value(row: &tiberius::Row, idx: usize) -> RowValues {
    // The row API is typed, so probe the plausible Rust types in turn.
    if let Ok(Some(val)) = row.try_get::<i32, _>(idx) {
        return RowValues::Int(i64::from(val));
    }
    if let Ok(Some(val)) = row.try_get::<i64, _>(idx) {
        return RowValues::Int(val);
    }
    if let Ok(Some(val)) = row.try_get::<u8, _>(idx) {
        return RowValues::Int(i64::from(val));
    }
    if let Ok(Some(val)) = row.try_get::<i16, _>(idx) {
        return RowValues::Int(i64::from(val));
    }

    if let Ok(Some(val)) = row.try_get::<f32, _>(idx) {
        return RowValues::Float(f64::from(val));
    }
    if let Ok(Some(val)) = row.try_get::<f64, _>(idx) {
        return RowValues::Float(val);
    }
    if let Ok(Some(val)) = row.try_get::<Numeric, _>(idx) {
        return RowValues::Float(numeric_to_f64(val));
    }

    if let Ok(Some(val)) = row.try_get::<bool, _>(idx) {
        return RowValues::Bool(val);
    }

    if let Ok(Some(val)) = row.try_get::<NaiveDateTime, _>(idx) {
        return RowValues::Timestamp(val);
    }
    if let Ok(Some(val)) = row.try_get::<NaiveDate, _>(idx) {
        return RowValues::Timestamp(val.and_time(chrono::NaiveTime::MIN));
    }

    if let Ok(Some(val)) = row.try_get::<&str, _>(idx) {
        return RowValues::Text(val.to_string());
    }
    if let Ok(Some(val)) = row.try_get::<tiberius::Uuid, _>(idx) {
        return RowValues::Text(val.to_string());
    }
    if let Ok(Some(val)) = row.try_get::<&[u8], _>(idx) {
        return RowValues::Blob(val.to_vec());
    }

    RowValues::Null
}

#[allow(clippy::cast_precision_loss)]
fn numeric_to_f64(n: Numeric) -> f64 {
    n.value() as f64 / 10f64.powi(i32::from(n.scale()))
}

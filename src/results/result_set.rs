use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, index_columns};
use crate::error::DriverError;
use crate::types::RowValues;

/// Rows returned by one query, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
}

impl ResultSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&CustomDbRow> {
        self.results.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CustomDbRow> {
        self.results.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = CustomDbRow;
    type IntoIter = std::vec::IntoIter<CustomDbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

/// Accumulates streamed rows; only [`ResultSetBuilder::finish`] hands out a [`ResultSet`].
///
/// Backends call [`ResultSetBuilder::push_row`] once per emitted row with that row's column
/// metadata. Consecutive rows with identical metadata share one column list.
#[derive(Debug, Default)]
pub struct ResultSetBuilder {
    columns: Option<(Arc<Vec<String>>, Arc<HashMap<String, usize>>)>,
    rows: Vec<CustomDbRow>,
}

impl ResultSetBuilder {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: None,
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Append one row reconstructed from its column names and values.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::Protocol` if the number of values differs from the number of columns.
    pub fn push_row<S: AsRef<str>>(
        &mut self,
        column_names: &[S],
        values: Vec<RowValues>,
    ) -> Result<(), DriverError> {
        if column_names.len() != values.len() {
            return Err(DriverError::Protocol(format!(
                "row has {} values for {} columns",
                values.len(),
                column_names.len()
            )));
        }

        let reuse = self.columns.as_ref().is_some_and(|(names, _)| {
            names.len() == column_names.len()
                && names
                    .iter()
                    .zip(column_names)
                    .all(|(known, emitted)| known == emitted.as_ref())
        });
        if !reuse {
            let names: Vec<String> = column_names.iter().map(|c| c.as_ref().to_string()).collect();
            let index = index_columns(&names);
            self.columns = Some((Arc::new(names), Arc::new(index)));
        }

        let Some((names, index)) = &self.columns else {
            return Err(DriverError::Protocol("column metadata missing".to_string()));
        };
        self.rows.push(CustomDbRow {
            column_names: Arc::clone(names),
            rows: values,
            column_index_cache: Arc::clone(index),
        });
        Ok(())
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn finish(self) -> ResultSet {
        ResultSet { results: self.rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_keep_arrival_order_and_emitted_names() {
        let mut builder = ResultSetBuilder::with_capacity(2);
        builder
            .push_row(&["AccountName", "email"], vec![
                RowValues::Text("alice".into()),
                RowValues::Text("a@example.com".into()),
            ])
            .unwrap();
        builder
            .push_row(&["AccountName", "email"], vec![
                RowValues::Text("bob".into()),
                RowValues::Null,
            ])
            .unwrap();
        builder
            .push_row(&["Total"], vec![RowValues::Int(2)])
            .unwrap();

        let rs = builder.finish();
        assert_eq!(rs.len(), 3);
        assert_eq!(rs.results[0].get("AccountName").and_then(RowValues::as_text), Some("alice"));
        assert_eq!(rs.results[1].get("AccountName").and_then(RowValues::as_text), Some("bob"));
        assert!(Arc::ptr_eq(&rs.results[0].column_names, &rs.results[1].column_names));
        assert_eq!(rs.results[2].column_names.as_slice(), ["Total".to_string()]);
        assert_eq!(rs.results[2].get("AccountName"), None);
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let mut builder = ResultSetBuilder::default();
        let err = builder.push_row(&["a", "b"], vec![RowValues::Int(1)]);
        assert!(matches!(err, Err(DriverError::Protocol(_))));
        assert_eq!(builder.row_count(), 0);
    }

    #[test]
    fn json_map_preserves_first_duplicate() {
        let row = CustomDbRow::new(
            Arc::new(vec!["id".into(), "id".into(), "name".into()]),
            vec![RowValues::Int(1), RowValues::Int(2), RowValues::Text("x".into())],
        );
        let map = row.to_json_map();
        assert_eq!(map.get("id"), Some(&serde_json::json!(1)));
        assert_eq!(map.keys().collect::<Vec<_>>(), ["id", "name"]);
        assert_eq!(row.get("id"), Some(&RowValues::Int(1)));
    }
}

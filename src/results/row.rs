use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::types::RowValues;

/// A row from a database query result
///
/// Column names are shared by every row that arrived with the same column metadata, so a result
/// set of N rows holds one copy of the names rather than N.
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    /// The column names for this row, in the order the driver emitted them
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub rows: Vec<RowValues>,
    // Internal cache for faster column lookups (to avoid repeated string comparisons)
    #[doc(hidden)]
    pub(crate) column_index_cache: Arc<HashMap<String, usize>>,
}

impl CustomDbRow {
    /// Create a new database row
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        let cache = Arc::new(index_columns(&column_names));
        Self {
            column_names,
            rows,
            column_index_cache: cache,
        }
    }

    /// Get the index of a column by name
    ///
    /// When a column name repeats, the first occurrence wins.
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index_cache.get(column_name).copied()
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    /// Like [`CustomDbRow::get`], falling back to an ASCII case-insensitive match.
    #[must_use]
    pub fn get_ignore_ascii_case(&self, column_name: &str) -> Option<&RowValues> {
        self.get(column_name).or_else(|| {
            self.column_names
                .iter()
                .position(|col| col.eq_ignore_ascii_case(column_name))
                .and_then(|idx| self.rows.get(idx))
        })
    }

    /// Iterate `(column, value)` pairs in emitted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.rows.iter())
    }

    /// Render the row as a JSON object, keeping column order.
    #[must_use]
    pub fn to_json_map(&self) -> Map<String, JsonValue> {
        let mut map = Map::new();
        for (column, value) in self.iter() {
            map.entry(column.to_string()).or_insert_with(|| value.to_json());
        }
        map
    }
}

pub(super) fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        index.entry(name.clone()).or_insert(i);
    }
    index
}

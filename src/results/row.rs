use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StoreError;
use crate::types::{FromRowValue, RowValues};

/// A row from a database query result
///
/// Column names and the name-to-index lookup are shared by every row of the
/// result set the row came from.
#[derive(Debug, Clone)]
pub struct Row {
    column_names: Arc<Vec<String>>,
    values: Vec<RowValues>,
    column_index: Arc<HashMap<String, usize>>,
}

impl Row {
    /// Create a standalone row, building its own column lookup.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            column_names,
            values,
            column_index,
        }
    }

    pub(crate) fn with_shared_index(
        column_names: Arc<Vec<String>>,
        column_index: Arc<HashMap<String, usize>>,
        values: Vec<RowValues>,
    ) -> Self {
        Self {
            column_names,
            values,
            column_index,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn has_column(&self, column_name: &str) -> bool {
        self.column_index.contains_key(column_name)
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.column_index
            .get(column_name)
            .and_then(|&idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    /// Read a column and convert it to `T`.
    ///
    /// Use `Option<T>` for nullable columns.
    ///
    /// # Errors
    /// Returns `StoreError::ColumnError` if the column is missing or has an incompatible type.
    pub fn value<T: FromRowValue>(&self, column_name: &str) -> Result<T, StoreError> {
        let raw = self
            .get(column_name)
            .ok_or_else(|| StoreError::ColumnError(format!("no column named '{column_name}'")))?;
        T::from_row_value(raw)
            .map_err(|e| StoreError::ColumnError(format!("column '{column_name}': {e}")))
    }

    /// Integer column, `None` when the column is absent or NULL.
    #[must_use]
    pub fn int_or_null(&self, column_name: &str) -> Option<i64> {
        self.get(column_name).and_then(RowValues::as_int).copied()
    }
}

pub(crate) fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        // first occurrence wins for duplicated names, as with positional lookup
        index.entry(name.clone()).or_insert(i);
    }
    index
}

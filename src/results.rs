use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// A single row returned by a select.
///
/// Column names are shared by every row of one result, so they live behind an `Arc`;
/// lookups by name go through a prebuilt index.
#[derive(Debug, Clone)]
pub struct DbRow {
    /// The column names for this row (shared across all rows of a result)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row, in column order
    pub values: Vec<RowValues>,
    column_index: Arc<HashMap<String, usize>>,
}

impl DbRow {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        let column_index = Arc::new(column_index(&column_names));
        Self {
            column_names,
            values,
            column_index,
        }
    }

    /// Get a value from the row by column name.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.column_index
            .get(column_name)
            .and_then(|&idx| self.values.get(idx))
    }

    /// Iterate `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds rows for one result, sharing the column names and index between them.
#[derive(Debug)]
pub(crate) struct RowBuilder {
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    rows: Vec<DbRow>,
}

impl RowBuilder {
    pub(crate) fn new(column_names: Vec<String>) -> Self {
        let index = column_index(&column_names);
        Self {
            column_names: Arc::new(column_names),
            column_index: Arc::new(index),
            rows: Vec::new(),
        }
    }

    pub(crate) fn column_count(&self) -> usize {
        self.column_names.len()
    }

    pub(crate) fn push(&mut self, values: Vec<RowValues>) {
        self.rows.push(DbRow {
            column_names: Arc::clone(&self.column_names),
            values,
            column_index: Arc::clone(&self.column_index),
        });
    }

    pub(crate) fn finish(self) -> Vec<DbRow> {
        self.rows
    }
}

fn column_index(column_names: &[String]) -> HashMap<String, usize> {
    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}

use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::OrmError;
use crate::results::{DbRow, RowBuilder};
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
/// Returns `OrmError::SqliteError` if the value cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<RowValues, OrmError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Run a prepared statement and collect at most `limit` rows.
///
/// # Errors
/// Returns `OrmError::SqliteError` if execution or value extraction fails.
pub fn build_rows(
    stmt: &mut Statement<'_>,
    params: &[Value],
    limit: Option<usize>,
) -> Result<Vec<DbRow>, OrmError> {
    let param_refs: Vec<&dyn rusqlite::ToSql> =
        params.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let mut builder = RowBuilder::new(column_names);

    let mut rows = stmt.query(&param_refs[..])?;
    let mut fetched = 0usize;
    while limit.is_none_or(|max| fetched < max) {
        let Some(row) = rows.next()? else {
            break;
        };
        let mut values = Vec::with_capacity(builder.column_count());
        for i in 0..builder.column_count() {
            values.push(sqlite_extract_value(row, i)?);
        }
        builder.push(values);
        fetched += 1;
    }

    Ok(builder.finish())
}

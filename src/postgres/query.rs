use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use crate::error::OrmError;
use crate::results::{DbRow, RowBuilder};
use crate::types::RowValues;

/// How a Postgres column is read, chosen from its type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnRead {
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Bool,
    Timestamp,
    Json,
    Bytea,
    Text,
}

impl ColumnRead {
    pub(crate) fn for_type(type_name: &str) -> Self {
        match type_name {
            "int2" => Self::Int2,
            "int4" => Self::Int4,
            "int8" => Self::Int8,
            "float4" => Self::Float4,
            "float8" => Self::Float8,
            "numeric" => Self::Numeric,
            "bool" => Self::Bool,
            "timestamp" => Self::Timestamp,
            "json" | "jsonb" => Self::Json,
            "bytea" => Self::Bytea,
            // text, varchar, bpchar, name and anything else readable as a string
            _ => Self::Text,
        }
    }
}

/// `sum` and `avg` return `numeric`: whole values that fit read back as `Int`, the rest as
/// `Float`.
pub(crate) fn numeric_value(value: Decimal) -> RowValues {
    if value.fract().is_zero() {
        if let Some(i) = value.to_i64() {
            return RowValues::Int(i);
        }
    }
    value.to_f64().map_or_else(|| RowValues::Text(value.to_string()), RowValues::Float)
}

/// Extracts a `RowValues` from a `tokio_postgres` row at the given index.
///
/// # Errors
/// Returns `OrmError::PostgresError` if the column cannot be read as its declared type.
pub fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<RowValues, OrmError> {
    let value = match ColumnRead::for_type(row.columns()[idx].type_().name()) {
        ColumnRead::Int2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        ColumnRead::Int4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        ColumnRead::Int8 => row
            .try_get::<_, Option<i64>>(idx)?
            .map_or(RowValues::Null, RowValues::Int),
        ColumnRead::Float4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Float(f64::from(v))),
        ColumnRead::Float8 => row
            .try_get::<_, Option<f64>>(idx)?
            .map_or(RowValues::Null, RowValues::Float),
        ColumnRead::Numeric => row
            .try_get::<_, Option<Decimal>>(idx)?
            .map_or(RowValues::Null, numeric_value),
        ColumnRead::Bool => row
            .try_get::<_, Option<bool>>(idx)?
            .map_or(RowValues::Null, RowValues::Bool),
        ColumnRead::Timestamp => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map_or(RowValues::Null, RowValues::Timestamp),
        ColumnRead::Json => row
            .try_get::<_, Option<Value>>(idx)?
            .map_or(RowValues::Null, RowValues::JSON),
        ColumnRead::Bytea => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map_or(RowValues::Null, RowValues::Blob),
        ColumnRead::Text => row
            .try_get::<_, Option<String>>(idx)?
            .map_or(RowValues::Null, RowValues::Text),
    };
    Ok(value)
}

/// Convert driver rows into `DbRow`s, keeping at most `limit` of them.
///
/// # Errors
/// Returns an error if any value cannot be extracted.
pub fn build_rows(
    rows: &[tokio_postgres::Row],
    limit: Option<usize>,
) -> Result<Vec<DbRow>, OrmError> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let column_names: Vec<String> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let mut builder = RowBuilder::new(column_names);

    for row in rows.iter().take(limit.unwrap_or(usize::MAX)) {
        let mut values = Vec::with_capacity(builder.column_count());
        for idx in 0..builder.column_count() {
            values.push(postgres_extract_value(row, idx)?);
        }
        builder.push(values);
    }

    Ok(builder.finish())
}

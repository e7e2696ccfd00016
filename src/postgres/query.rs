use std::error::Error;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::Statement;
use tokio_postgres::types::{FromSql, Kind, Type};
use uuid::Uuid;

use crate::error::StoreError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Build a result set using statement metadata for column names.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_result_set(
    stmt: &Statement,
    rows: &[tokio_postgres::Row],
) -> Result<ResultSet, StoreError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut result_set = ResultSet::with_columns(column_names, rows.len());
    for row in rows {
        let mut row_values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            row_values.push(postgres_extract_value(row, idx)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// Every column type is accepted. Types without a natural `RowValues` shape
/// keep a lossless form: uuid and numeric as text, enums as their label, and
/// anything else (arrays, ranges, intervals, ...) as the raw wire bytes.
///
/// # Errors
/// Returns `StoreError` if a value is malformed for its declared type.
pub fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<RowValues, StoreError> {
    Ok(row.try_get::<_, ColumnValue>(idx)?.0)
}

/// Decodes any column into `RowValues`; NULL of any type becomes `RowValues::Null`.
struct ColumnValue(RowValues);

type DecodeError = Box<dyn Error + Sync + Send>;

impl<'a> FromSql<'a> for ColumnValue {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        let value = match *ty {
            Type::INT2 => RowValues::Int(i64::from(i16::from_sql(ty, raw)?)),
            Type::INT4 => RowValues::Int(i64::from(i32::from_sql(ty, raw)?)),
            Type::INT8 => RowValues::Int(i64::from_sql(ty, raw)?),
            Type::OID => RowValues::Int(i64::from(u32::from_sql(ty, raw)?)),
            Type::FLOAT4 => RowValues::Float(f64::from(f32::from_sql(ty, raw)?)),
            Type::FLOAT8 => RowValues::Float(f64::from_sql(ty, raw)?),
            Type::BOOL => RowValues::Bool(bool::from_sql(ty, raw)?),
            Type::TIMESTAMP => RowValues::Timestamp(NaiveDateTime::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => {
                RowValues::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?.naive_utc())
            }
            Type::DATE => RowValues::from(NaiveDate::from_sql(ty, raw)?),
            Type::JSON | Type::JSONB => RowValues::JSON(Value::from_sql(ty, raw)?),
            Type::BYTEA => RowValues::Blob(Vec::<u8>::from_sql(ty, raw)?),
            Type::UUID => RowValues::Text(Uuid::from_sql(ty, raw)?.to_string()),
            Type::NUMERIC => numeric(ty, raw)?,
            _ if <String as FromSql>::accepts(ty) => RowValues::Text(String::from_sql(ty, raw)?),
            _ if matches!(ty.kind(), Kind::Enum(_)) => {
                RowValues::Text(std::str::from_utf8(raw)?.to_string())
            }
            _ => RowValues::Blob(raw.to_vec()),
        };
        Ok(Self(value))
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, DecodeError> {
        Ok(Self(RowValues::Null))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

// sign word of the binary numeric header
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_POS_INF: u16 = 0xD000;
const NUMERIC_NEG_INF: u16 = 0xF000;

/// Numeric as exact decimal text; NaN and the infinities as floats.
fn numeric(ty: &Type, raw: &[u8]) -> Result<RowValues, DecodeError> {
    let sign = raw.get(4..6).map(|b| u16::from_be_bytes([b[0], b[1]]));
    let value = match sign {
        Some(NUMERIC_NAN) => RowValues::Float(f64::NAN),
        Some(NUMERIC_POS_INF) => RowValues::Float(f64::INFINITY),
        Some(NUMERIC_NEG_INF) => RowValues::Float(f64::NEG_INFINITY),
        _ => RowValues::Text(Decimal::from_sql(ty, raw)?.to_string()),
    };
    Ok(value)
}

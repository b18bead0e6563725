//! Moving tables between polars DataFrames and the engine.

use duckdb::types::{TimeUnit, Value};
use duckdb::{Connection, Params, appender_params_from_iter};
use polars::prelude::*;

use nps_ingest::any_to_string;

use crate::error::{EngineError, Result};
use crate::sql::{Ident, quote_ident};

/// Engine column type used to store a polars column.
fn sql_type(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Boolean => "BOOLEAN",
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => "BIGINT",
        DataType::UInt64 => "UBIGINT",
        DataType::Float32 | DataType::Float64 => "DOUBLE",
        _ => "VARCHAR",
    }
}

fn to_engine_value(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(v) => Value::Boolean(v),
        AnyValue::Int8(v) => Value::BigInt(i64::from(v)),
        AnyValue::Int16(v) => Value::BigInt(i64::from(v)),
        AnyValue::Int32(v) => Value::BigInt(i64::from(v)),
        AnyValue::Int64(v) => Value::BigInt(v),
        AnyValue::UInt8(v) => Value::BigInt(i64::from(v)),
        AnyValue::UInt16(v) => Value::BigInt(i64::from(v)),
        AnyValue::UInt32(v) => Value::BigInt(i64::from(v)),
        AnyValue::UInt64(v) => Value::UBigInt(v),
        AnyValue::Float32(v) => Value::Double(f64::from(v)),
        AnyValue::Float64(v) => Value::Double(v),
        other => Value::Text(any_to_string(other)),
    }
}

fn to_any_value(value: Value) -> AnyValue<'static> {
    match value {
        Value::Null => AnyValue::Null,
        Value::Boolean(v) => AnyValue::Boolean(v),
        Value::TinyInt(v) => AnyValue::Int64(i64::from(v)),
        Value::SmallInt(v) => AnyValue::Int64(i64::from(v)),
        Value::Int(v) => AnyValue::Int64(i64::from(v)),
        Value::BigInt(v) => AnyValue::Int64(v),
        Value::UTinyInt(v) => AnyValue::Int64(i64::from(v)),
        Value::USmallInt(v) => AnyValue::Int64(i64::from(v)),
        Value::UInt(v) => AnyValue::Int64(i64::from(v)),
        Value::UBigInt(v) => AnyValue::UInt64(v),
        Value::HugeInt(v) => AnyValue::Float64(v as f64),
        Value::Float(v) => AnyValue::Float64(f64::from(v)),
        Value::Double(v) => AnyValue::Float64(v),
        Value::Decimal(v) => AnyValue::StringOwned(v.to_string().into()),
        Value::Text(v) => AnyValue::StringOwned(v.into()),
        Value::Timestamp(unit, v) => AnyValue::StringOwned(format_timestamp(unit, v).into()),
        other => AnyValue::StringOwned(format!("{other:?}").into()),
    }
}

fn format_timestamp(unit: TimeUnit, value: i64) -> String {
    let micros = match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    };
    chrono::DateTime::from_timestamp_micros(micros)
        .map(|ts| ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Replaces `table` with the contents of `frame`.
///
/// Columns keep their polars names; types map to BOOLEAN, BIGINT, UBIGINT,
/// DOUBLE or VARCHAR.
pub fn load_frame(conn: &Connection, table: &Ident, frame: &DataFrame) -> Result<()> {
    let columns: Vec<String> = frame
        .get_columns()
        .iter()
        .map(|column| format!("{} {}", quote_ident(column.name()), sql_type(column.dtype())))
        .collect();
    let ddl = format!(
        "CREATE OR REPLACE TABLE {} ({})",
        table.quoted(),
        columns.join(", ")
    );
    conn.execute_batch(&ddl)
        .map_err(|source| EngineError::query(&ddl, source))?;

    let insert = format!("append into {table}");
    let mut appender = conn
        .appender(table.as_str())
        .map_err(|source| EngineError::query(&insert, source))?;
    let mut row = Vec::with_capacity(frame.width());
    for idx in 0..frame.height() {
        row.clear();
        for column in frame.get_columns() {
            row.push(to_engine_value(column.get(idx)?));
        }
        appender
            .append_row(appender_params_from_iter(row.iter()))
            .map_err(|source| EngineError::query(&insert, source))?;
    }
    appender
        .flush()
        .map_err(|source| EngineError::query(&insert, source))?;

    tracing::debug!(table = %table, rows = frame.height(), "Loaded frame into engine");
    Ok(())
}

/// Runs a read query and collects the result into a DataFrame.
///
/// Integer columns come back as Int64, floating columns as Float64, and
/// text, decimals and timestamps as strings.
pub fn query_frame<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<DataFrame> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|source| EngineError::query(sql, source))?;
    let mut rows = stmt
        .query(params)
        .map_err(|source| EngineError::query(sql, source))?;
    let names: Vec<String> = rows
        .as_ref()
        .map(|stmt| stmt.column_names())
        .unwrap_or_default();

    let mut values: Vec<Vec<AnyValue<'static>>> = vec![Vec::new(); names.len()];
    while let Some(row) = rows.next().map_err(|source| EngineError::query(sql, source))? {
        for (idx, column) in values.iter_mut().enumerate() {
            let value: Value = row
                .get(idx)
                .map_err(|source| EngineError::query(sql, source))?;
            column.push(to_any_value(value));
        }
    }

    let columns = names
        .iter()
        .zip(values)
        .map(|(name, column)| {
            Series::from_any_values(name.as_str().into(), &column, false).map(IntoColumn::into_column)
        })
        .collect::<PolarsResult<Vec<Column>>>()?;

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_then_query_frame() {
        let conn = Connection::open_in_memory().unwrap();
        let frame = df!(
            "scale" => ["Block Design", "Digit Span"],
            "score" => [12i64, 9],
            "percentile" => [Some(75.0), None],
            "timed" => [true, false]
        )
        .unwrap();

        let table = Ident::new("scores").unwrap();
        load_frame(&conn, &table, &frame).unwrap();

        let back = query_frame(&conn, "SELECT * FROM scores ORDER BY scale", []).unwrap();
        assert_eq!(back.height(), 2);
        assert!(back.equals_missing(&frame));
    }

    #[test]
    fn test_query_frame_binds_parameters() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t AS SELECT * FROM (VALUES ('a', 1), ('b', 2)) v(k, n)")
            .unwrap();

        let frame = query_frame(&conn, "SELECT n FROM t WHERE k = ?", ["b"]).unwrap();
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.column("n").unwrap().get(0).unwrap(), AnyValue::Int64(2));
    }

    #[test]
    fn test_query_frame_empty_result_keeps_columns() {
        let conn = Connection::open_in_memory().unwrap();
        let frame = query_frame(&conn, "SELECT 1 AS a, 'x' AS b WHERE false", []).unwrap();
        assert_eq!(frame.height(), 0);
        assert_eq!(frame.width(), 2);
    }

    #[test]
    fn test_timestamps_render_as_text() {
        assert_eq!(
            format_timestamp(TimeUnit::Second, 0),
            "1970-01-01 00:00:00"
        );
    }
}

//! Postgres row decoding shared by execution and introspection.

use sqlx::postgres::PgRow;
use sqlx::{Column as _, Row, TypeInfo, ValueRef};

/// Decode one result row to JSON cells by Postgres type name.
pub fn row_to_values(row: &PgRow) -> Vec<serde_json::Value> {
    use serde_json::Value;

    (0..row.columns().len())
        .map(|idx| {
            if let Ok(raw) = row.try_get_raw(idx) {
                if raw.is_null() {
                    return Value::Null;
                }
            }
            let type_name = row.columns()[idx].type_info().name().to_string();
            match type_name.as_str() {
                "INT2" => row
                    .try_get::<i16, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                "INT4" => row
                    .try_get::<i32, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                "INT8" => row
                    .try_get::<i64, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                "FLOAT4" => row
                    .try_get::<f32, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                "FLOAT8" => row
                    .try_get::<f64, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                "NUMERIC" => row
                    .try_get::<rust_decimal::Decimal, _>(idx)
                    .ok()
                    .and_then(|d| d.to_string().parse::<f64>().ok())
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                "BOOL" => row
                    .try_get::<bool, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                "DATE" => row
                    .try_get::<chrono::NaiveDate, _>(idx)
                    .map(|v| Value::from(v.to_string()))
                    .unwrap_or(Value::Null),
                "TIMESTAMP" => row
                    .try_get::<chrono::NaiveDateTime, _>(idx)
                    .map(|v| Value::from(v.to_string()))
                    .unwrap_or(Value::Null),
                "TIMESTAMPTZ" => row
                    .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
                    .map(|v| Value::from(v.to_rfc3339()))
                    .unwrap_or(Value::Null),
                _ => row
                    .try_get::<String, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            }
        })
        .collect()
}

//! Bounded query execution against Postgres.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Column as _, Row};
use tracing::{debug, info, warn};

use nlq_core::{
    DataSourceConfig, ExecutionCategory, NlqError, QueryExecutor, Result, ResultSet,
};

use crate::decode::row_to_values;

/// Executes validated SQL with a hard timeout and row cap.
///
/// Opens a short-lived single-connection pool per call, the same
/// discipline as introspection. Named `:param` placeholders are
/// rewritten to positional `$n` before binding, and the row cap is
/// enforced inside the statement so oversized results are never
/// materialized client-side.
pub struct PgExecutor {
    config: DataSourceConfig,
}

impl PgExecutor {
    pub fn new(config: DataSourceConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<sqlx::PgPool> {
        PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&self.config.url())
            .await
            .map_err(|e| NlqError::connection(format!("failed to connect to data source: {}", e)))
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(
        &self,
        sql: &str,
        params: &[serde_json::Value],
        timeout: Duration,
        row_limit: usize,
    ) -> Result<ResultSet> {
        let positional = to_positional(sql);
        let bounded = bound_rows(&positional, row_limit);
        debug!("Executing query ({} params)", params.len());

        let pool = self.connect().await?;

        let mut query = sqlx::query(&bounded);
        for value in params {
            query = bind_value(query, value);
        }

        let fetched = tokio::time::timeout(timeout, query.fetch_all(&pool))
            .await
            .map_err(|_| {
                NlqError::execution(
                    format!("query timed out after {}s", timeout.as_secs()),
                    ExecutionCategory::Fatal,
                )
            })?
            .map_err(categorize)?;

        pool.close().await;

        let columns: Vec<String> = fetched
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let truncated = fetched.len() > row_limit;
        if truncated {
            warn!("Result truncated to {} rows", row_limit);
        }

        let rows: Vec<Vec<serde_json::Value>> = fetched
            .iter()
            .take(row_limit)
            .map(row_to_values)
            .collect();

        info!("Query returned {} rows (truncated: {})", rows.len(), truncated);
        Ok(ResultSet {
            columns,
            rows,
            truncated,
        })
    }
}

type PgQuery<'a> = sqlx::query::Query<'a, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_value<'a>(query: PgQuery<'a>, value: &'a serde_json::Value) -> PgQuery<'a> {
    use serde_json::Value;
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.to_string()),
    }
}

/// Wrap the statement so the database itself bounds the result set.
/// One row past the cap is fetched to detect truncation; the full
/// result is never materialized.
fn bound_rows(sql: &str, row_limit: usize) -> String {
    let inner = sql.trim().trim_end_matches(';');
    format!(
        "SELECT * FROM ({}) AS bounded_rows LIMIT {}",
        inner,
        row_limit + 1
    )
}

/// Rewrite `:name` placeholders to `$n` by order of first appearance.
/// Repeated names share a position; `::` casts and quoted strings are
/// left alone.
fn to_positional(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut in_string = false;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == '\'' {
            in_string = !in_string;
            out.push(c);
            i += 1;
            continue;
        }
        if !in_string && c == ':' {
            let prev_colon = i > 0 && bytes[i - 1] == b':';
            let next_colon = i + 1 < bytes.len() && bytes[i + 1] == b':';
            if !prev_colon && !next_colon {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                if end > start && bytes[start].is_ascii_alphabetic() {
                    let name = sql[start..end].to_string();
                    let pos = match names.iter().position(|n| n == &name) {
                        Some(p) => p + 1,
                        None => {
                            names.push(name);
                            names.len()
                        }
                    };
                    out.push_str(&format!("${}", pos));
                    i = end;
                    continue;
                }
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Map a sqlx error to the retryability taxonomy.
///
/// Errors the model can plausibly fix on the next attempt (syntax,
/// unknown relation or column) are retryable; connectivity and
/// permission problems are not.
fn categorize(err: sqlx::Error) -> NlqError {
    match &err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string()).unwrap_or_default();
            let category = classify_sqlstate(&code);
            NlqError::execution(format!("{} (sqlstate {})", db.message(), code), category)
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            NlqError::connection(err.to_string())
        }
        _ => NlqError::execution(err.to_string(), ExecutionCategory::Fatal),
    }
}

/// SQLSTATE class 42 is syntax or access rule violations; all of it is
/// retryable except insufficient privilege (42501).
fn classify_sqlstate(code: &str) -> ExecutionCategory {
    if code.starts_with("42") && code != "42501" {
        ExecutionCategory::Retryable
    } else {
        ExecutionCategory::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_positional_rewrites_in_order() {
        let sql = "SELECT * FROM orders WHERE created_at >= :start AND created_at < :end";
        assert_eq!(
            to_positional(sql),
            "SELECT * FROM orders WHERE created_at >= $1 AND created_at < $2"
        );
    }

    #[test]
    fn test_to_positional_reuses_repeated_names() {
        let sql = "SELECT :year AS y FROM t WHERE a = :year AND b = :other";
        assert_eq!(
            to_positional(sql),
            "SELECT $1 AS y FROM t WHERE a = $1 AND b = $2"
        );
    }

    #[test]
    fn test_to_positional_leaves_casts_alone() {
        let sql = "SELECT total::float FROM orders WHERE id = :id";
        assert_eq!(
            to_positional(sql),
            "SELECT total::float FROM orders WHERE id = $1"
        );
    }

    #[test]
    fn test_to_positional_leaves_string_literals_alone() {
        let sql = "SELECT * FROM t WHERE note = 'time: :noon'";
        assert_eq!(to_positional(sql), sql);
    }

    #[test]
    fn test_bound_rows_wraps_with_limit() {
        assert_eq!(
            bound_rows("SELECT total FROM orders", 1000),
            "SELECT * FROM (SELECT total FROM orders) AS bounded_rows LIMIT 1001"
        );
    }

    #[test]
    fn test_bound_rows_strips_trailing_terminator() {
        assert_eq!(
            bound_rows("SELECT 1;", 5),
            "SELECT * FROM (SELECT 1) AS bounded_rows LIMIT 6"
        );
    }

    #[test]
    fn test_sqlstate_classification() {
        // Syntax error, undefined column, undefined table.
        assert_eq!(classify_sqlstate("42601"), ExecutionCategory::Retryable);
        assert_eq!(classify_sqlstate("42703"), ExecutionCategory::Retryable);
        assert_eq!(classify_sqlstate("42P01"), ExecutionCategory::Retryable);
        // Insufficient privilege.
        assert_eq!(classify_sqlstate("42501"), ExecutionCategory::Fatal);
        // Connection exception class, unknown codes.
        assert_eq!(classify_sqlstate("08006"), ExecutionCategory::Fatal);
        assert_eq!(classify_sqlstate(""), ExecutionCategory::Fatal);
    }
}

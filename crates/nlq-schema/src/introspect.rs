//! Live schema introspection.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::Row;
use std::time::Duration;
use tracing::debug;

use nlq_core::{Column, DataSourceConfig, Dialect, ForeignKey, NlqError, Result, SchemaInfo, Table};
use nlq_exec::row_to_values;

/// Source of schema metadata. The provider is generic over this so
/// tests can count round trips without a live database.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Introspect the data source, optionally restricted to the given
    /// tables. One call is one set of database round trips.
    async fn introspect(&self, table_filter: Option<&[String]>) -> Result<SchemaInfo>;
}

/// Postgres introspector reading `information_schema` and `pg_catalog`.
///
/// Opens a short-lived connection per call and never holds it past the
/// call. Raw credentials arrive only through the configuration
/// collaborator, never from user input.
pub struct PgIntrospector {
    config: DataSourceConfig,
}

impl PgIntrospector {
    pub fn new(config: DataSourceConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<sqlx::PgPool> {
        if self.config.dialect != Dialect::Postgres {
            return Err(NlqError::schema(format!(
                "schema introspection not supported for dialect {:?}",
                self.config.dialect
            )));
        }

        PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&self.config.url())
            .await
            .map_err(|e| NlqError::connection(format!("failed to connect to data source: {}", e)))
    }

    async fn list_tables(&self, pool: &sqlx::PgPool) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(|e| NlqError::schema(format!("failed to list tables: {}", e)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("table_name")
                    .map_err(|e| NlqError::schema(e.to_string()))
            })
            .collect()
    }

    async fn load_columns(&self, pool: &sqlx::PgPool, table: &str) -> Result<Vec<Column>> {
        let rows = sqlx::query(
            r#"
            SELECT column_name, data_type, is_nullable, column_default,
                   col_description(format('%I', table_name)::regclass, ordinal_position) AS comment
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|e| NlqError::schema(format!("failed to load columns for {}: {}", table, e)))?;

        rows.iter()
            .map(|row| {
                let nullable: String = row
                    .try_get("is_nullable")
                    .map_err(|e| NlqError::schema(e.to_string()))?;
                Ok(Column {
                    name: row
                        .try_get("column_name")
                        .map_err(|e| NlqError::schema(e.to_string()))?,
                    data_type: row
                        .try_get("data_type")
                        .map_err(|e| NlqError::schema(e.to_string()))?,
                    nullable: nullable == "YES",
                    default: row.try_get("column_default").unwrap_or(None),
                    comment: row.try_get("comment").unwrap_or(None),
                })
            })
            .collect()
    }

    async fn load_primary_key(&self, pool: &sqlx::PgPool, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT a.attname AS column_name
            FROM pg_index i
            JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
            WHERE i.indrelid = format('%I', $1::text)::regclass AND i.indisprimary
            "#,
        )
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|e| NlqError::schema(format!("failed to load primary key: {}", e)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("column_name")
                    .map_err(|e| NlqError::schema(e.to_string()))
            })
            .collect()
    }

    async fn load_indexes(&self, pool: &sqlx::PgPool, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT indexname FROM pg_indexes WHERE schemaname = 'public' AND tablename = $1",
        )
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|e| NlqError::schema(format!("failed to load indexes: {}", e)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("indexname")
                    .map_err(|e| NlqError::schema(e.to_string()))
            })
            .collect()
    }

    async fn load_foreign_keys(&self, pool: &sqlx::PgPool, table: &str) -> Result<Vec<ForeignKey>> {
        let rows = sqlx::query(
            r#"
            SELECT kcu.column_name, ccu.table_name AS ref_table, ccu.column_name AS ref_column
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
             AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
              ON ccu.constraint_name = tc.constraint_name
             AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
              AND tc.table_schema = 'public'
              AND tc.table_name = $1
            "#,
        )
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|e| NlqError::schema(format!("failed to load foreign keys: {}", e)))?;

        rows.iter()
            .map(|row| {
                Ok(ForeignKey {
                    column: row
                        .try_get("column_name")
                        .map_err(|e| NlqError::schema(e.to_string()))?,
                    ref_table: row
                        .try_get("ref_table")
                        .map_err(|e| NlqError::schema(e.to_string()))?,
                    ref_column: row
                        .try_get("ref_column")
                        .map_err(|e| NlqError::schema(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn load_sample_rows(
        &self,
        pool: &sqlx::PgPool,
        table: &str,
    ) -> Result<Vec<Vec<serde_json::Value>>> {
        // Identifiers cannot be bound; quote and escape the table name.
        let quoted = format!("\"{}\"", table.replace('"', "\"\""));
        let sql = format!("SELECT * FROM {} LIMIT {}", quoted, self.config.sample_rows);

        let rows = sqlx::query(&sql)
            .fetch_all(pool)
            .await
            .map_err(|e| NlqError::schema(format!("failed to sample {}: {}", table, e)))?;

        Ok(rows.iter().map(row_to_values).collect())
    }
}

#[async_trait]
impl SchemaIntrospector for PgIntrospector {
    async fn introspect(&self, table_filter: Option<&[String]>) -> Result<SchemaInfo> {
        let pool = self.connect().await?;

        let mut names = self.list_tables(&pool).await?;
        if let Some(filter) = table_filter {
            names.retain(|name| filter.iter().any(|f| f.eq_ignore_ascii_case(name)));
        }

        let mut tables = Vec::with_capacity(names.len());
        for name in &names {
            let table = Table {
                name: name.clone(),
                columns: self.load_columns(&pool, name).await?,
                primary_key: self.load_primary_key(&pool, name).await?,
                indexes: self.load_indexes(&pool, name).await?,
                foreign_keys: self.load_foreign_keys(&pool, name).await?,
                sample_rows: self.load_sample_rows(&pool, name).await?,
            };
            tables.push(table);
        }

        pool.close().await;

        debug!("Introspected {} tables", tables.len());
        Ok(SchemaInfo { tables })
    }
}

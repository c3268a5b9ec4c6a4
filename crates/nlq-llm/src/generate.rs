//! SQL generation: one prompt in, one extracted statement out.

use std::sync::Arc;

use tracing::{debug, info};

use nlq_core::{CompletionClient, GeneratedSql, Result};

use crate::extract::extract_sql;

/// Turns a fully assembled prompt into a candidate SQL statement.
///
/// Thin by design: prompt assembly and retry policy live with the
/// workflow; this only owns the completion call and extraction.
pub struct SqlGenerator {
    client: Arc<dyn CompletionClient + Send + Sync>,
}

impl SqlGenerator {
    pub fn new(client: Arc<dyn CompletionClient + Send + Sync>) -> Self {
        Self { client }
    }

    pub async fn generate(&self, prompt: &str) -> Result<GeneratedSql> {
        let response = self.client.complete(prompt).await?;
        debug!("Model response: {} chars", response.len());

        let generated = extract_sql(&response)?;
        info!(
            "Extracted SQL candidate ({} chars, {} params)",
            generated.sql.len(),
            generated.params.len()
        );
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedClient {
        response: String,
    }

    #[async_trait]
    impl CompletionClient for FixedClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn test_generate_extracts_from_response() {
        let client = Arc::new(FixedClient {
            response: "```sql\nSELECT sum(total) FROM orders\n```".to_string(),
        });
        let generator = SqlGenerator::new(client);

        let out = generator.generate("prompt").await.unwrap();
        assert_eq!(out.sql, "SELECT sum(total) FROM orders");
    }

    #[tokio::test]
    async fn test_generate_surfaces_no_sql_found() {
        let client = Arc::new(FixedClient {
            response: "I don't know.".to_string(),
        });
        let generator = SqlGenerator::new(client);

        let err = generator.generate("prompt").await.unwrap_err();
        assert_eq!(err.code(), "NO_SQL_FOUND");
        assert!(err.retryable());
    }
}

//! nlq-llm - Completion client and SQL extraction
//!
//! Talks to an OpenAI-compatible chat completions endpoint and pulls
//! a single SQL statement out of free-form model output. Model output
//! with no recognizable SQL maps to `NoSqlFound`, which the workflow
//! treats as retryable.

mod client;
mod extract;
mod generate;

pub use client::HttpCompletionClient;
pub use extract::extract_sql;
pub use generate::SqlGenerator;

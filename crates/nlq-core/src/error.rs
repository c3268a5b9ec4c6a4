//! Error types for the nlq system.

use thiserror::Error;

/// Result type alias using NlqError.
pub type Result<T> = std::result::Result<T, NlqError>;

/// Classification of an execution failure, used to decide retryability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionCategory {
    /// Syntax errors, unknown tables/columns - the model can fix these.
    Retryable,
    /// Connectivity, permission, resource errors - retrying is pointless.
    Fatal,
}

/// Errors that can occur in the nlq pipeline.
#[derive(Error, Debug)]
pub enum NlqError {
    /// Target data source unreachable.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Schema introspection failed or is unsupported for the dialect.
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// Embedding model could not be loaded or invoked.
    ///
    /// Callers must treat this as a capability loss (retrieval degrades
    /// to keyword-only), never as a fatal process error.
    #[error("Embedding unavailable: {message}")]
    EmbeddingUnavailable { message: String },

    /// The model response contained no parseable SQL statement.
    #[error("No SQL statement found in model response: {message}")]
    NoSqlFound { message: String },

    /// The safety validator rejected a SQL candidate.
    #[error("SQL rejected: {reason}")]
    SqlRejected { reason: String },

    /// The database rejected or failed the query at execution time.
    #[error("Execution error: {message}")]
    Execution {
        message: String,
        category: ExecutionCategory,
    },

    /// All generation attempts failed.
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    /// LLM endpoint call failed.
    #[error("LLM error: {message}")]
    Llm { message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl NlqError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create an embedding-unavailable error.
    pub fn embedding_unavailable(message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable {
            message: message.into(),
        }
    }

    /// Create a no-SQL-found error.
    pub fn no_sql(message: impl Into<String>) -> Self {
        Self::NoSqlFound {
            message: message.into(),
        }
    }

    /// Create a SQL-rejected error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::SqlRejected {
            reason: reason.into(),
        }
    }

    /// Create an execution error with the given category.
    pub fn execution(message: impl Into<String>, category: ExecutionCategory) -> Self {
        Self::Execution {
            message: message.into(),
            category,
        }
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the orchestrator may fold this error into the next
    /// generation attempt instead of failing the run.
    pub fn retryable(&self) -> bool {
        match self {
            Self::NoSqlFound { .. } | Self::SqlRejected { .. } => true,
            Self::Execution { category, .. } => *category == ExecutionCategory::Retryable,
            _ => false,
        }
    }

    /// Short stable code for traces and structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::EmbeddingUnavailable { .. } => "EMBEDDING_UNAVAILABLE",
            Self::NoSqlFound { .. } => "NO_SQL_FOUND",
            Self::SqlRejected { .. } => "SQL_REJECTED",
            Self::Execution { .. } => "EXECUTION_ERROR",
            Self::RetryExhausted { .. } => "RETRY_EXHAUSTED",
            Self::Llm { .. } => "LLM_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

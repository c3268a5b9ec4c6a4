//! nlq-exec - SQL safety validation and bounded execution
//!
//! The validator is the gate between model output and the database:
//! exactly one read-only statement, no denylisted keywords, every
//! identifier resolvable against the schema snapshot. Execution then
//! runs under a hard timeout and row cap. Nothing reaches the executor
//! without passing the validator first.

mod decode;
mod execute;
mod validate;

pub use decode::row_to_values;
pub use execute::PgExecutor;
pub use validate::SqlSafetyValidator;

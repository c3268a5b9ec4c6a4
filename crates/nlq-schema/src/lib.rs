//! nlq-schema - Schema metadata for the target data source
//!
//! Introspects tables, columns, keys, foreign-key relations and sample
//! rows from a live Postgres connection, and serves the resulting
//! snapshot from a TTL cache so repeated questions against the same
//! source perform zero extra round trips.

mod cache;
mod introspect;
mod provider;

pub use cache::TtlCache;
pub use introspect::{PgIntrospector, SchemaIntrospector};
pub use provider::SchemaProvider;

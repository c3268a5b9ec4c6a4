//! nlq-index - In-memory retrieval indexes
//!
//! Two index structures over the knowledge collections: a BM25 keyword
//! index and an exact-scan cosine vector index. Both are rebuilt
//! wholesale on sync; neither supports incremental updates. An index
//! that has not been built yet returns empty results rather than
//! erroring, so retrieval stays total.

mod lexical;
mod store;
mod vector;

pub use lexical::LexicalIndex;
pub use store::DocumentStore;
pub use vector::VectorIndex;

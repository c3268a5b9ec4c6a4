//! nlq-retrieve - Hybrid retrieval over the knowledge collections
//!
//! Combines BM25 keyword hits with cosine vector hits via min-max
//! normalized weighted fusion. When the embedder is down the vector
//! leg is skipped and keyword scores carry full weight; retrieval
//! itself never fails.

mod fusion;
mod retriever;

pub use fusion::{fuse_min_max, min_max_normalize};
pub use retriever::HybridRetriever;

//! nlq-embed - Text embedding for semantic retrieval
//!
//! Maps text to fixed-length dense vectors via a local ONNX model.
//! A failed model load is a capability loss, not a process error:
//! callers observe `available() == false` and retrieval degrades to
//! keyword-only scoring.

mod mock;
mod onnx;

pub use mock::MockEmbedder;
pub use onnx::OnnxEmbedder;

// Re-export the Embedder trait for convenience
pub use nlq_core::Embedder;

//! nlq-core - Core types and traits for the nlq system
//!
//! This crate provides the foundational types, traits, and error handling
//! used throughout the nlq question-to-SQL pipeline.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{ExecutionCategory, NlqError, Result};
pub use traits::*;
pub use types::*;

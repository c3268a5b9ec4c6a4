//! nlq-flow - The question-answering workflow
//!
//! Drives one question through retrieval, prompt assembly, SQL
//! generation, validation, bounded execution and chart selection as an
//! explicit state machine. Retryable failures are folded back into the
//! next prompt as diagnostic text, up to a configured attempt cap.

mod chart;
mod context;
mod conversation;
mod orchestrator;
mod prompt;
mod state;

pub use chart::ChartSelector;
pub use context::{BoundedContext, ContextMerger};
pub use conversation::{ConversationState, Turn};
pub use orchestrator::WorkflowOrchestrator;
pub use prompt::{PriorError, PromptBuilder};
pub use state::{RunOutcome, RunTrace, WorkflowRun, WorkflowState};

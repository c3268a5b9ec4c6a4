//! Workflow state machine and run tracing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nlq_core::{ChartSpec, ResultSet};

/// States of one question-answering run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Rewriting,
    Retrieving,
    Merging,
    Prompting,
    Generating,
    Validating,
    Executing,
    Charting,
    Erroring,
    Done,
    Failed,
}

impl WorkflowState {
    /// Happy-path successor. `Erroring` routes back to `Prompting`
    /// when a retry is allowed, otherwise to `Failed`; the
    /// orchestrator picks that edge.
    pub fn advance(&self) -> WorkflowState {
        match self {
            Self::Rewriting => Self::Retrieving,
            Self::Retrieving => Self::Merging,
            Self::Merging => Self::Prompting,
            Self::Prompting => Self::Generating,
            Self::Generating => Self::Validating,
            Self::Validating => Self::Executing,
            Self::Executing => Self::Charting,
            Self::Charting => Self::Done,
            Self::Erroring => Self::Prompting,
            Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Rewriting => "rewriting",
            Self::Retrieving => "retrieving",
            Self::Merging => "merging",
            Self::Prompting => "prompting",
            Self::Generating => "generating",
            Self::Validating => "validating",
            Self::Executing => "executing",
            Self::Charting => "charting",
            Self::Erroring => "erroring",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-run observability record: every transition with its timestamp,
/// the attempt count, the final SQL and the execution time.
#[derive(Debug, Clone, Default)]
pub struct RunTrace {
    pub transitions: Vec<(WorkflowState, DateTime<Utc>)>,
    pub attempts: u32,
    pub final_sql: Option<String>,
    pub execution_ms: Option<u64>,
}

impl RunTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, state: WorkflowState) {
        self.transitions.push((state, Utc::now()));
    }

    /// Record and return the happy-path successor of `state`.
    pub fn advance(&mut self, state: WorkflowState) -> WorkflowState {
        let next = state.advance();
        self.record(next);
        next
    }

    /// States in visit order, without timestamps.
    pub fn states(&self) -> Vec<WorkflowState> {
        self.transitions.iter().map(|(s, _)| *s).collect()
    }

    pub fn visited(&self, state: WorkflowState) -> bool {
        self.transitions.iter().any(|(s, _)| *s == state)
    }
}

/// Terminal result of a run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Done {
        sql: String,
        results: ResultSet,
        chart: ChartSpec,
    },
    Failed {
        /// Human-readable reason, never a raw backtrace.
        reason: String,
        last_sql: Option<String>,
        /// Error messages from every failed attempt, oldest first.
        errors: Vec<String>,
    },
}

impl RunOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// A completed run: outcome plus its trace.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub outcome: RunOutcome,
    pub trace: RunTrace,
}

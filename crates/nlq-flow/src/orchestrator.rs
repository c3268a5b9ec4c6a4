//! The question-answering state machine.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use nlq_core::{
    CollectionTag, KnowledgeRetriever, NlqError, QueryExecutor, RetrievalConfig, RetrievalResult,
    SchemaLoader, WorkflowConfig,
};
use nlq_exec::SqlSafetyValidator;
use nlq_llm::SqlGenerator;

use crate::chart::ChartSelector;
use crate::context::{BoundedContext, ContextMerger};
use crate::conversation::{ConversationState, Turn};
use crate::prompt::{PriorError, PromptBuilder};
use crate::state::{RunOutcome, RunTrace, WorkflowRun, WorkflowState};

/// Drives one question through the pipeline.
///
/// Every collaborator sits behind a trait so runs can be exercised
/// without a live database, model or endpoint. The validator gates
/// every execution, including retries.
pub struct WorkflowOrchestrator {
    schema: Arc<dyn SchemaLoader>,
    retriever: Arc<dyn KnowledgeRetriever>,
    generator: SqlGenerator,
    validator: SqlSafetyValidator,
    executor: Arc<dyn QueryExecutor>,
    merger: ContextMerger,
    prompts: PromptBuilder,
    charts: ChartSelector,
    retrieval: RetrievalConfig,
    workflow: WorkflowConfig,
}

impl WorkflowOrchestrator {
    pub fn new(
        schema: Arc<dyn SchemaLoader>,
        retriever: Arc<dyn KnowledgeRetriever>,
        generator: SqlGenerator,
        executor: Arc<dyn QueryExecutor>,
        retrieval: RetrievalConfig,
        workflow: WorkflowConfig,
    ) -> Self {
        let merger = ContextMerger::new(retrieval.context_cap);
        Self {
            schema,
            retriever,
            generator,
            validator: SqlSafetyValidator::new(),
            executor,
            merger,
            prompts: PromptBuilder::new(),
            charts: ChartSelector::new(),
            retrieval,
            workflow,
        }
    }

    /// Answer one question, mutating the conversation on success.
    ///
    /// Transitions follow `WorkflowState::advance`; only the error
    /// edges into `Erroring` and `Failed` are taken explicitly.
    pub async fn answer(&self, conversation: &mut ConversationState, question: &str) -> WorkflowRun {
        let mut trace = RunTrace::new();

        let mut state = WorkflowState::Rewriting;
        trace.record(state);
        let question = normalize_question(question);
        info!("Answering: {}", question);

        state = trace.advance(state);
        let context = match self
            .retrieve_context(&question, conversation, &mut trace, &mut state)
            .await
        {
            Ok(context) => context,
            Err(e) => {
                trace.record(WorkflowState::Failed);
                return WorkflowRun {
                    outcome: RunOutcome::Failed {
                        reason: e.to_string(),
                        last_sql: None,
                        errors: vec![e.to_string()],
                    },
                    trace,
                };
            }
        };

        let mut prior: Option<PriorError> = None;
        let mut errors: Vec<String> = Vec::new();
        let mut last_sql: Option<String> = None;

        for attempt in 1..=self.workflow.max_retries {
            trace.attempts = attempt;

            // Merging advances to Prompting, as does Erroring on retry.
            state = trace.advance(state);
            let prompt = self.prompts.build(&question, &context, prior.as_ref());

            match self.attempt(&prompt, &context, &mut trace, &mut state).await {
                Ok((sql, results, execution_ms)) => {
                    state = trace.advance(state);
                    let chart = self.charts.select(&results);

                    trace.final_sql = Some(sql.clone());
                    trace.execution_ms = Some(execution_ms);
                    trace.advance(state);

                    conversation.push(Turn {
                        question: question.clone(),
                        sql: sql.clone(),
                        result_summary: summarize(&results),
                    });
                    info!("Run succeeded on attempt {}", attempt);

                    return WorkflowRun {
                        outcome: RunOutcome::Done {
                            sql,
                            results,
                            chart,
                        },
                        trace,
                    };
                }
                Err((sql, error)) => {
                    warn!("Attempt {} failed: {}", attempt, error);
                    errors.push(error.to_string());
                    if sql.is_some() {
                        last_sql = sql.clone();
                    }

                    state = WorkflowState::Erroring;
                    trace.record(state);

                    if error.retryable() && attempt < self.workflow.max_retries {
                        prior = Some(PriorError {
                            sql: sql.unwrap_or_default(),
                            error: error.to_string(),
                        });
                        continue;
                    }

                    let reason = if error.retryable() {
                        NlqError::RetryExhausted {
                            attempts: attempt,
                            last_error: error.to_string(),
                        }
                        .to_string()
                    } else {
                        error.to_string()
                    };

                    trace.final_sql = last_sql.clone();
                    trace.record(WorkflowState::Failed);
                    return WorkflowRun {
                        outcome: RunOutcome::Failed {
                            reason,
                            last_sql,
                            errors,
                        },
                        trace,
                    };
                }
            }
        }

        // max_retries is at least 1, so the loop always returns.
        trace.record(WorkflowState::Failed);
        WorkflowRun {
            outcome: RunOutcome::Failed {
                reason: "no generation attempts configured".to_string(),
                last_sql,
                errors,
            },
            trace,
        }
    }

    /// Schema load plus the three collection retrievals, all
    /// concurrent. Retrieval legs degrade to empty on failure or
    /// timeout; a schema failure fails the run before merging.
    async fn retrieve_context(
        &self,
        question: &str,
        conversation: &ConversationState,
        trace: &mut RunTrace,
        state: &mut WorkflowState,
    ) -> nlq_core::Result<BoundedContext> {
        let (schema, terminology, examples, knowledge) = tokio::join!(
            self.schema.load_schema(None),
            self.retrieve_leg(CollectionTag::Terminology, question),
            self.retrieve_leg(CollectionTag::SqlExample, question),
            self.retrieve_leg(CollectionTag::Knowledge, question),
        );
        let schema = schema?;

        *state = trace.advance(*state);
        Ok(self
            .merger
            .merge(schema, vec![terminology, examples, knowledge], conversation))
    }

    async fn retrieve_leg(&self, tag: CollectionTag, question: &str) -> RetrievalResult {
        let deadline = Duration::from_secs(self.workflow.retrieval_timeout_secs);
        let task = self.retriever.retrieve(tag, question, self.retrieval.top_k);
        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("Retrieval over {} failed, continuing without it: {}", tag, e);
                RetrievalResult::empty(tag)
            }
            Err(_) => {
                warn!("Retrieval over {} timed out, continuing without it", tag);
                RetrievalResult::empty(tag)
            }
        }
    }

    /// One generate/validate/execute attempt. Errors carry the SQL
    /// that produced them, when one exists, for the correction prompt.
    async fn attempt(
        &self,
        prompt: &str,
        context: &BoundedContext,
        trace: &mut RunTrace,
        state: &mut WorkflowState,
    ) -> std::result::Result<(String, nlq_core::ResultSet, u64), (Option<String>, NlqError)> {
        *state = trace.advance(*state);
        let generated = self
            .generator
            .generate(prompt)
            .await
            .map_err(|e| (None, e))?;

        *state = trace.advance(*state);
        let sql = self
            .validator
            .validate(&generated.sql, &context.schema)
            .map_err(|e| (Some(generated.sql.clone()), e))?;

        // No caller supplies values for named parameters in this flow,
        // so a parameterized candidate cannot be executed as-is.
        if !generated.params.is_empty() {
            return Err((
                Some(sql.clone()),
                NlqError::rejected(format!(
                    "no value available for parameter :{} - inline literal values instead",
                    generated.params[0]
                )),
            ));
        }

        *state = trace.advance(*state);
        let started = std::time::Instant::now();
        let results = self
            .executor
            .execute(
                &sql,
                &[],
                Duration::from_secs(self.workflow.execution_timeout_secs),
                self.workflow.row_limit,
            )
            .await
            .map_err(|e| (Some(sql.clone()), e))?;

        Ok((sql, results, started.elapsed().as_millis() as u64))
    }
}

fn normalize_question(question: &str) -> String {
    question.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn summarize(results: &nlq_core::ResultSet) -> String {
    if results.truncated {
        format!("{} rows (truncated)", results.row_count())
    } else {
        format!("{} rows", results.row_count())
    }
}

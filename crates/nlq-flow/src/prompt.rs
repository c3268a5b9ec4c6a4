//! Prompt assembly.

use std::fmt::Write as _;

use nlq_core::CollectionTag;

use crate::context::BoundedContext;

/// A failed prior attempt, quoted verbatim in the correction section.
#[derive(Debug, Clone)]
pub struct PriorError {
    pub sql: String,
    pub error: String,
}

const RULES: &str = "\
Rules:
- Produce exactly one SELECT statement (WITH ... SELECT is allowed).
- Never write data: no INSERT, UPDATE, DELETE, DDL or temporary tables.
- Use only the tables and columns listed in the schema section.
- Use correct JOIN conditions from the foreign keys shown.
- When the question uses a business term defined above, use its mapped field name.
- Return the statement in a ```sql fenced block.";

/// Deterministic prompt template. Identical context and question
/// produce an identical prompt, byte for byte.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        question: &str,
        context: &BoundedContext,
        prior_error: Option<&PriorError>,
    ) -> String {
        let mut prompt = String::new();

        prompt.push_str("You translate business questions into SQL for the database below.\n\n");

        prompt.push_str("## Database schema\n\n");
        prompt.push_str(&context.schema.render());
        prompt.push('\n');

        for tag in CollectionTag::ALL {
            let section: Vec<&str> = context
                .documents
                .iter()
                .filter(|d| d.document.collection == tag)
                .map(|d| d.document.content.as_str())
                .collect();
            if section.is_empty() {
                continue;
            }
            let heading = match tag {
                CollectionTag::Terminology => "## Business terminology",
                CollectionTag::SqlExample => "## Example queries",
                CollectionTag::Knowledge => "## Domain knowledge",
            };
            let _ = writeln!(prompt, "{}\n", heading);
            for content in section {
                let _ = writeln!(prompt, "- {}", content);
            }
            prompt.push('\n');
        }

        if !context.history.is_empty() {
            prompt.push_str("## Conversation so far\n\n");
            for turn in &context.history {
                let _ = writeln!(
                    prompt,
                    "Q: {}\nSQL: {}\nResult: {}\n",
                    turn.question, turn.sql, turn.result_summary
                );
            }
        }

        if let Some(prior) = prior_error {
            prompt.push_str("## Previous attempt failed\n\n");
            let _ = writeln!(
                prompt,
                "This SQL was rejected or failed:\n```sql\n{}\n```\nError: {}\n\nFix the problem and produce a corrected statement.\n",
                prior.sql, prior.error
            );
        }

        let _ = writeln!(prompt, "## Question\n\n{}\n", question);
        prompt.push_str(RULES);
        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Built-in prompt definitions.
//!
//! These ship with the binary so a fresh workspace can answer questions
//! without any `.wikiqa/prompts/` files. A workspace file with the same id
//! takes precedence.

use crate::types::{PromptDefinition, PromptInputSpec};

/// Id of the grounded-answer prompt used by the generator.
pub const DEFAULT_ANSWER_PROMPT_ID: &str = "rag.answer.default";

const ANSWER_SYSTEM: &str = "You are a helpful assistant that answers questions based on provided context.

Rules:
- Answer ONLY based on the provided context
- If the context doesn't contain the answer, say \"I don't have enough information to answer this question\"
- Be concise and direct
- Cite the document sources when relevant";

const ANSWER_TEMPLATE: &str = "Context:
{{context}}

Question: {{question}}

Answer:";

/// Look up a built-in prompt by id.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    match id {
        DEFAULT_ANSWER_PROMPT_ID => Some(PromptDefinition {
            id: DEFAULT_ANSWER_PROMPT_ID.to_string(),
            title: "Grounded answer".to_string(),
            api_version: "1.0".to_string(),
            created_by: "wikiqa".to_string(),
            system: Some(ANSWER_SYSTEM.to_string()),
            template: ANSWER_TEMPLATE.to_string(),
            input: PromptInputSpec {
                variables: vec!["context".to_string(), "question".to_string()],
            },
        }),
        _ => None,
    }
}

/// Ids of all built-in prompts.
pub fn builtin_ids() -> Vec<String> {
    vec![DEFAULT_ANSWER_PROMPT_ID.to_string()]
}

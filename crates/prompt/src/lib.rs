//! Prompt system for wikiqa.
//!
//! Prompts are YAML definitions with Handlebars system and user templates.
//! The grounded-answer prompt is built in; a workspace can override it or
//! add its own under `.wikiqa/prompts/`.

pub mod builder;
pub mod defaults;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use defaults::{builtin_prompt, DEFAULT_ANSWER_PROMPT_ID};
pub use loader::{list_prompts, load_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptInputSpec};

//! Prompt loader for YAML prompt definitions.

use crate::defaults::{builtin_ids, builtin_prompt};
use crate::types::PromptDefinition;
use std::path::Path;
use wikiqa_core::{AppError, AppResult};

/// Load a prompt definition by ID.
///
/// Looks for `<id>.yml` in the workspace's `.wikiqa/prompts/` directory and
/// falls back to the built-in prompt of the same id.
///
/// # Example
/// ```no_run
/// use wikiqa_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "rag.answer.default")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".wikiqa/prompts")
        .join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return match builtin_prompt(prompt_id) {
            Some(definition) => {
                tracing::debug!("Using built-in prompt: {}", prompt_id);
                Ok(definition)
            }
            None => Err(AppError::Prompt(format!(
                "Prompt file not found: {:?}",
                prompt_file
            ))),
        };
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// List all available prompt IDs: built-ins plus workspace files, sorted.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let prompts_dir = workspace_path.join(".wikiqa/prompts");
    let mut prompt_ids = builtin_ids();

    if prompts_dir.exists() {
        for entry in walkdir::WalkDir::new(&prompts_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompt_ids.push(stem.to_string());
                }
            }
        }
    }

    prompt_ids.sort();
    prompt_ids.dedup();
    Ok(prompt_ids)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, content: &str) {
        let prompts_dir = dir.join(".wikiqa/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(format!("{}.yml", id)), content).unwrap();
    }

    fn valid_prompt(id: &str) -> String {
        format!(
            r#"
id: {}
title: "Workspace prompt"
apiVersion: "1.0"
template: "Q: {{{{question}}}}"
"#,
            id
        )
    }

    #[test]
    fn test_load_builtin_when_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_prompt(temp_dir.path(), "rag.answer.default").unwrap();
        assert_eq!(prompt.title, "Grounded answer");
    }

    #[test]
    fn test_workspace_file_overrides_builtin() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "rag.answer.default", &valid_prompt("rag.answer.default"));

        let prompt = load_prompt(temp_dir.path(), "rag.answer.default").unwrap();
        assert_eq!(prompt.title, "Workspace prompt");
        assert_eq!(prompt.template, "Q: {{question}}");
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "invalid", "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), "invalid").is_err());
    }

    #[test]
    fn test_bad_api_version_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "v1",
            "id: v1\ntitle: V1\napiVersion: \"1\"\ntemplate: x\n",
        );
        assert!(load_prompt(temp_dir.path(), "v1").is_err());
    }

    #[test]
    fn test_list_prompts() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "prompt1", &valid_prompt("prompt1"));
        write_prompt(temp_dir.path(), "rag.answer.default", &valid_prompt("rag.answer.default"));

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(prompts, vec!["prompt1".to_string(), "rag.answer.default".to_string()]);
    }
}

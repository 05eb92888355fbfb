//! System-prompt sources.
//!
//! Each agent names its prompt by an opaque reference; a [`PromptStore`]
//! resolves that reference to the prompt text, substituting `{variable}`
//! placeholders along the way. A load failure is not a per-agent hiccup: it
//! means the deployment is missing a prompt file, so the orchestrator treats
//! it as fatal to the whole run
//! ([`OrchestratorError::PromptLoad`](crate::OrchestratorError::PromptLoad)).
//!
//! Two implementations ship with the crate:
//!
//! - [`MarkdownPromptStore`] resolves `ref` to `<dir>/<ref>.md` on disk,
//!   the layout used by prompt-per-agent repositories.
//! - [`StaticPromptStore`] is an in-memory map, convenient for tests and
//!   embedded deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

/// A source of system prompts keyed by opaque reference.
///
/// Implementations must be `Send + Sync`; one store is shared by every agent
/// task in a run. Agents cache the loaded text per instance, so a store is
/// hit at most once per agent per run.
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Resolve `prompt_ref` to prompt text, substituting each `{key}`
    /// occurrence with the corresponding value from `variables`.
    async fn load(
        &self,
        prompt_ref: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

fn substitute(template: &str, variables: &HashMap<String, String>) -> String {
    let mut text = template.to_string();
    for (key, value) in variables {
        text = text.replace(&format!("{{{}}}", key), value);
    }
    text
}

/// Loads prompts from `<dir>/<ref>.md`.
///
/// # Example
///
/// ```no_run
/// use agentdag::MarkdownPromptStore;
///
/// // "analyst" resolves to prompts/analyst.md
/// let store = MarkdownPromptStore::new("prompts");
/// ```
pub struct MarkdownPromptStore {
    dir: PathBuf,
}

impl MarkdownPromptStore {
    /// Create a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The path a reference resolves to.
    pub fn path_for(&self, prompt_ref: &str) -> PathBuf {
        self.dir.join(format!("{}.md", prompt_ref))
    }
}

#[async_trait]
impl PromptStore for MarkdownPromptStore {
    async fn load(
        &self,
        prompt_ref: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let path = self.path_for(prompt_ref);
        let template = fs::read_to_string(&path).map_err(|e| {
            Box::new(e) as Box<dyn Error + Send + Sync>
        })?;
        Ok(substitute(&template, variables))
    }
}

/// An in-memory prompt map.
///
/// # Example
///
/// ```
/// use agentdag::StaticPromptStore;
///
/// let store = StaticPromptStore::new()
///     .with_prompt("analyst", "You are a business analyst.")
///     .with_prompt("reviewer", "You are the {role} reviewing the findings.");
/// ```
#[derive(Default)]
pub struct StaticPromptStore {
    prompts: HashMap<String, String>,
}

impl StaticPromptStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prompt under a reference (builder pattern).
    pub fn with_prompt(mut self, prompt_ref: impl Into<String>, text: impl Into<String>) -> Self {
        self.prompts.insert(prompt_ref.into(), text.into());
        self
    }
}

#[async_trait]
impl PromptStore for StaticPromptStore {
    async fn load(
        &self,
        prompt_ref: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        match self.prompts.get(prompt_ref) {
            Some(template) => Ok(substitute(template, variables)),
            None => Err(format!("no prompt registered under '{}'", prompt_ref).into()),
        }
    }
}

use serde::Deserialize;

use crate::pipeline::agents::{parse_json, StageAgent};
use crate::pipeline::context::PromptContext;
use crate::pipeline::prompts::{
    DEFAULT_SUGGESTIONS_PROMPT, SUGGESTIONS_PROMPT_TEMPLATE, SUGGESTIONS_SYSTEM,
};
use crate::pipeline::stage::{StageName, Suggestion, SuggestionSet};

#[derive(Debug, Deserialize)]
struct SuggestionsPayload {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
    #[serde(default)]
    prompt_text: Option<String>,
}

/// Asks the candidate for details that would strengthen the current draft.
pub struct SuggestionsAgent;

impl StageAgent for SuggestionsAgent {
    type Output = SuggestionSet;

    fn stage(&self) -> StageName {
        StageName::ImprovementSuggestions
    }

    fn schema_hint(&self) -> &'static str {
        SUGGESTIONS_SYSTEM
    }

    fn render(&self, prompt: &PromptContext) -> String {
        SUGGESTIONS_PROMPT_TEMPLATE.replace("{context}", &prompt.render_sections())
    }

    fn parse(&self, raw: &str, _prompt: &PromptContext) -> Result<SuggestionSet, String> {
        let payload: SuggestionsPayload = parse_json(raw)?;
        let suggestions: Vec<Suggestion> = payload
            .suggestions
            .into_iter()
            .map(|s| Suggestion {
                topic: s.topic.trim().to_string(),
                question: s.question.trim().to_string(),
            })
            .filter(|s| !s.topic.is_empty() && !s.question.is_empty())
            .collect();
        if suggestions.is_empty() {
            return Err("no usable suggestions".to_string());
        }

        Ok(SuggestionSet {
            suggestions,
            prompt_text: payload
                .prompt_text
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_SUGGESTIONS_PROMPT.to_string()),
        })
    }
}

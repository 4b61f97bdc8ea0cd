use uuid::Uuid;

use crate::pipeline::agents::{
    disallowed_term, render_draft_template, strip_json_fences, StageAgent,
};
use crate::pipeline::context::PromptContext;
use crate::pipeline::prompts::{SUMMARY_PROMPT_TEMPLATE, SUMMARY_SYSTEM};
use crate::pipeline::stage::{ProfessionalSummary, StageName};

const MAX_SUMMARY_CHARS: usize = 600;

/// Writes the professional summary. The reply is plain text, not JSON.
pub struct SummaryAgent;

impl StageAgent for SummaryAgent {
    type Output = ProfessionalSummary;

    fn stage(&self) -> StageName {
        StageName::SummaryGeneration
    }

    fn schema_hint(&self) -> &'static str {
        SUMMARY_SYSTEM
    }

    fn render(&self, prompt: &PromptContext) -> String {
        render_draft_template(SUMMARY_PROMPT_TEMPLATE, prompt)
    }

    fn parse(&self, raw: &str, prompt: &PromptContext) -> Result<ProfessionalSummary, String> {
        let text = strip_json_fences(raw)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return Err("summary is empty".to_string());
        }
        let len = text.chars().count();
        if len > MAX_SUMMARY_CHARS {
            return Err(format!(
                "summary is {len} chars, limit is {MAX_SUMMARY_CHARS}"
            ));
        }
        if let Some(term) = disallowed_term(&text, &prompt.constraints) {
            return Err(format!(
                "summary claims '{term}', which the candidate does not have"
            ));
        }

        Ok(ProfessionalSummary {
            id: Uuid::new_v4(),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::context::OutputConstraints;
    use crate::pipeline::test_support::empty_prompt;

    fn prompt() -> PromptContext {
        let mut prompt = empty_prompt(StageName::SummaryGeneration);
        prompt.constraints = OutputConstraints {
            allowed_skills: vec!["Go".to_string()],
            disallowed_terms: vec!["Kubernetes".to_string()],
            ..Default::default()
        };
        prompt
    }

    #[test]
    fn test_collapses_whitespace_and_tolerates_fences() {
        let summary = SummaryAgent
            .parse("```\nBackend engineer\n  building Go services.\n```", &prompt())
            .unwrap();
        assert_eq!(summary.text, "Backend engineer building Go services.");
    }

    #[test]
    fn test_rejects_empty_and_overlong() {
        assert_eq!(SummaryAgent.parse("  \n", &prompt()).unwrap_err(), "summary is empty");
        let long = "word ".repeat(200);
        assert!(SummaryAgent
            .parse(&long, &prompt())
            .unwrap_err()
            .contains("limit is 600"));
    }

    #[test]
    fn test_rejects_disallowed_term() {
        let err = SummaryAgent
            .parse("Go engineer who operates Kubernetes clusters.", &prompt())
            .unwrap_err();
        assert!(err.contains("'Kubernetes'"));
    }
}

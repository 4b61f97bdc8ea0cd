use crate::pipeline::agents::{
    parse_json, render_draft_template, validate_draft, DraftPayload, StageAgent,
};
use crate::pipeline::context::PromptContext;
use crate::pipeline::prompts::{DRAFT_SYSTEM, IMPROVEMENT_PROMPT_TEMPLATE};
use crate::pipeline::stage::{DraftContent, StageName};

/// Rewrites the current draft in response to a feedback note.
pub struct ImprovementAgent;

impl StageAgent for ImprovementAgent {
    type Output = DraftContent;

    fn stage(&self) -> StageName {
        StageName::FeedbackImprovement
    }

    fn schema_hint(&self) -> &'static str {
        DRAFT_SYSTEM
    }

    fn render(&self, prompt: &PromptContext) -> String {
        render_draft_template(IMPROVEMENT_PROMPT_TEMPLATE, prompt)
    }

    fn parse(&self, raw: &str, prompt: &PromptContext) -> Result<DraftContent, String> {
        let payload: DraftPayload = parse_json(raw)?;
        validate_draft(payload, &prompt.constraints)
    }
}

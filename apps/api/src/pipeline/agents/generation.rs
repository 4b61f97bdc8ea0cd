use crate::pipeline::agents::{
    parse_json, render_draft_template, validate_draft, DraftPayload, StageAgent,
};
use crate::pipeline::context::PromptContext;
use crate::pipeline::prompts::{DRAFT_SYSTEM, GENERATION_PROMPT_TEMPLATE};
use crate::pipeline::stage::{DraftContent, StageName};

pub struct GenerationAgent;

impl StageAgent for GenerationAgent {
    type Output = DraftContent;

    fn stage(&self) -> StageName {
        StageName::ResumeGeneration
    }

    fn schema_hint(&self) -> &'static str {
        DRAFT_SYSTEM
    }

    fn render(&self, prompt: &PromptContext) -> String {
        render_draft_template(GENERATION_PROMPT_TEMPLATE, prompt)
    }

    fn parse(&self, raw: &str, prompt: &PromptContext) -> Result<DraftContent, String> {
        let payload: DraftPayload = parse_json(raw)?;
        let mut content = validate_draft(payload, &prompt.constraints)?;
        // A first draft has nothing to summarise a change against.
        content.change_summary = None;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::context::OutputConstraints;
    use crate::pipeline::test_support::empty_prompt;

    fn prompt() -> PromptContext {
        let mut prompt = empty_prompt(StageName::ResumeGeneration);
        prompt.constraints = OutputConstraints {
            allowed_skills: vec!["Go".to_string(), "SQL".to_string()],
            disallowed_terms: vec!["Kubernetes".to_string()],
            required_sections: vec!["Summary".to_string(), "Experience".to_string()],
        };
        prompt
    }

    #[test]
    fn test_render_fills_every_placeholder() {
        let rendered = GenerationAgent.render(&prompt());
        assert!(rendered.contains("ALLOWED SKILLS: Go, SQL"));
        assert!(rendered.contains("using these titles: Summary, Experience"));
        assert!(!rendered.contains("{context}"));
        assert!(!rendered.contains("{allowed_skills}"));
    }

    #[test]
    fn test_parse_requires_every_outline_section() {
        let raw = r#"{"sections": [{"title": "Summary", "content": "Go engineer"}],
                      "skills_referenced": ["Go"]}"#;
        let err = GenerationAgent.parse(raw, &prompt()).unwrap_err();
        assert_eq!(err, "outline section 'Experience' is missing");
    }

    #[test]
    fn test_parse_accepts_grounded_draft() {
        let raw = r#"{"sections": [
                {"title": "Summary", "content": "Backend engineer working in Go and SQL."},
                {"title": "Experience", "content": "- Built Go services"}
            ],
            "skills_referenced": ["go", "sql"],
            "change_summary": "ignored"}"#;
        let content = GenerationAgent.parse(raw, &prompt()).unwrap();
        assert_eq!(content.skills_referenced, vec!["Go", "SQL"]);
        assert_eq!(content.change_summary, None);
    }
}

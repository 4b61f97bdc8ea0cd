use serde::Deserialize;
use uuid::Uuid;

use crate::pipeline::agents::{clean_list, parse_json, StageAgent};
use crate::pipeline::context::PromptContext;
use crate::pipeline::prompts::{COMPANY_ANALYSIS_PROMPT_TEMPLATE, COMPANY_ANALYSIS_SYSTEM};
use crate::pipeline::stage::{CompanyAnalysis, StageName};

#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    priorities: Vec<String>,
    #[serde(default)]
    culture_signals: Vec<String>,
}

pub struct CompanyAnalysisAgent;

impl StageAgent for CompanyAnalysisAgent {
    type Output = CompanyAnalysis;

    fn stage(&self) -> StageName {
        StageName::CompanyAnalysis
    }

    fn schema_hint(&self) -> &'static str {
        COMPANY_ANALYSIS_SYSTEM
    }

    fn render(&self, prompt: &PromptContext) -> String {
        COMPANY_ANALYSIS_PROMPT_TEMPLATE
            .replace("{context}", &prompt.render_sections())
            .replace("{retrieved}", &prompt.render_retrieved())
    }

    fn parse(&self, raw: &str, _prompt: &PromptContext) -> Result<CompanyAnalysis, String> {
        let payload: AnalysisPayload = parse_json(raw)?;

        let summary = payload.summary.trim().to_string();
        if summary.is_empty() {
            return Err("summary is empty".to_string());
        }
        let values = clean_list(payload.values);
        if values.is_empty() {
            return Err("no company values".to_string());
        }
        let priorities = clean_list(payload.priorities);
        if priorities.is_empty() {
            return Err("no company priorities".to_string());
        }

        Ok(CompanyAnalysis {
            id: Uuid::new_v4(),
            summary,
            values,
            priorities,
            culture_signals: clean_list(payload.culture_signals),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::empty_prompt;

    #[test]
    fn test_parses_fenced_reply() {
        let raw = "```json\n{\"summary\": \"Payments infra\", \"values\": [\"Ownership\", \"\"], \
                   \"priorities\": [\"Reliability\"]}\n```";
        let analysis = CompanyAnalysisAgent
            .parse(raw, &empty_prompt(StageName::CompanyAnalysis))
            .unwrap();
        assert_eq!(analysis.summary, "Payments infra");
        assert_eq!(analysis.values, vec!["Ownership"]);
        assert!(analysis.culture_signals.is_empty());
    }

    #[test]
    fn test_rejects_missing_priorities() {
        let raw = r#"{"summary": "Payments infra", "values": ["Ownership"], "priorities": [" "]}"#;
        let err = CompanyAnalysisAgent
            .parse(raw, &empty_prompt(StageName::CompanyAnalysis))
            .unwrap_err();
        assert_eq!(err, "no company priorities");
    }

    #[test]
    fn test_render_includes_retrieved_placeholder_text() {
        let rendered = CompanyAnalysisAgent.render(&empty_prompt(StageName::CompanyAnalysis));
        assert!(rendered.contains("(no similar postings available)"));
        assert!(!rendered.contains("{retrieved}"));
    }
}

use std::collections::HashSet;

use serde::Deserialize;
use uuid::Uuid;

use crate::pipeline::agents::{parse_json, StageAgent};
use crate::pipeline::context::PromptContext;
use crate::pipeline::prompts::{REQUIREMENTS_PROMPT_TEMPLATE, REQUIREMENTS_SYSTEM};
use crate::pipeline::stage::{Importance, Requirement, RequirementSet, StageName};

#[derive(Debug, Deserialize)]
struct RequirementsPayload {
    #[serde(default)]
    requirements: Vec<RequirementPayload>,
}

#[derive(Debug, Deserialize)]
struct RequirementPayload {
    #[serde(default)]
    text: String,
    importance: Importance,
    #[serde(default)]
    skill: Option<String>,
}

pub struct RequirementsAgent;

impl StageAgent for RequirementsAgent {
    type Output = RequirementSet;

    fn stage(&self) -> StageName {
        StageName::RequirementsExtraction
    }

    fn schema_hint(&self) -> &'static str {
        REQUIREMENTS_SYSTEM
    }

    fn render(&self, prompt: &PromptContext) -> String {
        REQUIREMENTS_PROMPT_TEMPLATE
            .replace("{context}", &prompt.render_sections())
            .replace("{retrieved}", &prompt.render_retrieved())
    }

    fn parse(&self, raw: &str, _prompt: &PromptContext) -> Result<RequirementSet, String> {
        let payload: RequirementsPayload = parse_json(raw)?;

        let mut seen = HashSet::new();
        let items: Vec<Requirement> = payload
            .requirements
            .into_iter()
            .filter_map(|r| {
                let text = r.text.trim().to_string();
                if text.is_empty() || !seen.insert(text.to_lowercase()) {
                    return None;
                }
                Some(Requirement {
                    text,
                    importance: r.importance,
                    skill: r
                        .skill
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty()),
                })
            })
            .collect();

        if items.is_empty() {
            return Err("no requirements extracted".to_string());
        }

        Ok(RequirementSet {
            id: Uuid::new_v4(),
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::empty_prompt;

    #[test]
    fn test_keeps_order_and_collapses_duplicates() {
        let raw = r#"{"requirements": [
            {"text": "Go experience", "importance": "required", "skill": "Go"},
            {"text": "Distributed systems", "importance": "preferred"},
            {"text": "go experience", "importance": "bonus", "skill": "Go"},
            {"text": "Kubernetes", "importance": "bonus", "skill": " "}
        ]}"#;
        let set = RequirementsAgent
            .parse(raw, &empty_prompt(StageName::RequirementsExtraction))
            .unwrap();

        let texts: Vec<_> = set.items.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Go experience", "Distributed systems", "Kubernetes"]);
        assert_eq!(set.items[0].importance, Importance::Required);
        assert_eq!(set.items[2].skill, None);
    }

    #[test]
    fn test_rejects_unknown_importance() {
        let raw = r#"{"requirements": [{"text": "Go", "importance": "critical"}]}"#;
        let err = RequirementsAgent
            .parse(raw, &empty_prompt(StageName::RequirementsExtraction))
            .unwrap_err();
        assert!(err.starts_with("malformed JSON"));
    }

    #[test]
    fn test_rejects_empty_set() {
        let err = RequirementsAgent
            .parse(r#"{"requirements": []}"#, &empty_prompt(StageName::RequirementsExtraction))
            .unwrap_err();
        assert_eq!(err, "no requirements extracted");
    }
}

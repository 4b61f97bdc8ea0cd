use serde::Deserialize;
use uuid::Uuid;

use crate::models::profile::WorkExperience;
use crate::pipeline::agents::{disallowed_term, parse_json, render_draft_template, StageAgent};
use crate::pipeline::context::PromptContext;
use crate::pipeline::prompts::{EXPERIENCE_PROMPT_TEMPLATE, EXPERIENCE_SYSTEM};
use crate::pipeline::stage::{RefinedExperiences, StageName};

#[derive(Debug, Deserialize)]
struct ExperiencePayload {
    #[serde(default)]
    work_experiences: Vec<ExperienceEntry>,
}

#[derive(Debug, Deserialize)]
struct ExperienceEntry {
    #[serde(default)]
    company: String,
    #[serde(default)]
    position: String,
    #[serde(default)]
    description: String,
}

impl ExperienceEntry {
    fn is_for(&self, exp: &WorkExperience) -> bool {
        self.company.trim().eq_ignore_ascii_case(exp.company.trim())
            && self.position.trim().eq_ignore_ascii_case(exp.position.trim())
    }
}

/// Rewrites each work experience toward the requirement set.
///
/// Holds the profile's experiences so a reply can be checked entry by entry; only
/// descriptions are taken from the reply.
pub struct ExperienceRefinementAgent {
    originals: Vec<WorkExperience>,
}

impl ExperienceRefinementAgent {
    pub fn new(originals: Vec<WorkExperience>) -> Self {
        Self { originals }
    }
}

impl StageAgent for ExperienceRefinementAgent {
    type Output = RefinedExperiences;

    fn stage(&self) -> StageName {
        StageName::ExperienceRefinement
    }

    fn schema_hint(&self) -> &'static str {
        EXPERIENCE_SYSTEM
    }

    fn render(&self, prompt: &PromptContext) -> String {
        render_draft_template(EXPERIENCE_PROMPT_TEMPLATE, prompt)
    }

    fn parse(&self, raw: &str, prompt: &PromptContext) -> Result<RefinedExperiences, String> {
        let payload: ExperiencePayload = parse_json(raw)?;

        if let Some(extra) = payload
            .work_experiences
            .iter()
            .find(|entry| !self.originals.iter().any(|exp| entry.is_for(exp)))
        {
            return Err(format!(
                "'{} at {}' is not a work experience in the profile",
                extra.position.trim(),
                extra.company.trim()
            ));
        }

        let mut experiences = Vec::with_capacity(self.originals.len());
        for original in &self.originals {
            let entry = payload
                .work_experiences
                .iter()
                .find(|entry| entry.is_for(original))
                .ok_or_else(|| {
                    format!(
                        "no refined entry for '{} at {}'",
                        original.position, original.company
                    )
                })?;
            let description = entry.description.trim();
            if description.is_empty() {
                return Err(format!(
                    "refined description for '{} at {}' is empty",
                    original.position, original.company
                ));
            }
            if let Some(term) = disallowed_term(description, &prompt.constraints) {
                return Err(format!(
                    "refined description for '{}' claims '{term}', which the candidate does not have",
                    original.company
                ));
            }
            experiences.push(WorkExperience {
                description: description.to_string(),
                ..original.clone()
            });
        }

        Ok(RefinedExperiences {
            id: Uuid::new_v4(),
            experiences,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::context::OutputConstraints;
    use crate::pipeline::test_support::{empty_prompt, jane_doe};

    fn agent() -> ExperienceRefinementAgent {
        ExperienceRefinementAgent::new(jane_doe().work_experiences)
    }

    fn prompt() -> PromptContext {
        let mut prompt = empty_prompt(StageName::ExperienceRefinement);
        prompt.constraints = OutputConstraints {
            allowed_skills: vec!["Go".to_string(), "SQL".to_string()],
            disallowed_terms: vec!["Kubernetes".to_string()],
            ..Default::default()
        };
        prompt
    }

    #[test]
    fn test_keeps_profile_order_and_period() {
        let raw = r#"{"work_experiences": [
            {"company": "ledgerline", "position": "Software Developer", "description": "Built SQL pipelines for finance."},
            {"company": "Parcelly", "position": "Backend Engineer", "description": " Ran distributed Go services. "}
        ]}"#;
        let refined = agent().parse(raw, &prompt()).unwrap();

        assert_eq!(refined.experiences.len(), 2);
        assert_eq!(refined.experiences[0].company, "Parcelly");
        assert_eq!(refined.experiences[0].period, "2020 – 2024");
        assert_eq!(refined.experiences[0].description, "Ran distributed Go services.");
        assert_eq!(refined.experiences[1].company, "Ledgerline");
    }

    #[test]
    fn test_rejects_missing_entry() {
        let raw = r#"{"work_experiences": [
            {"company": "Parcelly", "position": "Backend Engineer", "description": "Ran Go services."}
        ]}"#;
        let err = agent().parse(raw, &prompt()).unwrap_err();
        assert_eq!(err, "no refined entry for 'Software Developer at Ledgerline'");
    }

    #[test]
    fn test_rejects_invented_employer() {
        let raw = r#"{"work_experiences": [
            {"company": "Parcelly", "position": "Backend Engineer", "description": "Ran Go services."},
            {"company": "Ledgerline", "position": "Software Developer", "description": "SQL pipelines."},
            {"company": "Globex", "position": "Staff Engineer", "description": "Led everything."}
        ]}"#;
        let err = agent().parse(raw, &prompt()).unwrap_err();
        assert!(err.contains("Staff Engineer at Globex"), "{err}");
    }

    #[test]
    fn test_rejects_disallowed_skill_claim() {
        let raw = r#"{"work_experiences": [
            {"company": "Parcelly", "position": "Backend Engineer", "description": "Ran Go services on Kubernetes."},
            {"company": "Ledgerline", "position": "Software Developer", "description": "SQL pipelines."}
        ]}"#;
        let err = agent().parse(raw, &prompt()).unwrap_err();
        assert!(err.contains("'Kubernetes'"), "{err}");
    }
}

use std::collections::HashSet;

use serde::Deserialize;
use uuid::Uuid;

use crate::pipeline::agents::{parse_json, StageAgent};
use crate::pipeline::context::PromptContext;
use crate::pipeline::prompts::{STRUCTURING_PROMPT_TEMPLATE, STRUCTURING_SYSTEM};
use crate::pipeline::stage::{OutlineSection, ResumeOutline, StageName};

/// Rounding slack on the page total.
const MAX_TOTAL_ALLOCATION: f32 = 1.05;

#[derive(Debug, Deserialize)]
struct OutlinePayload {
    #[serde(default)]
    sections: Vec<OutlineSection>,
}

pub struct StructuringAgent;

impl StageAgent for StructuringAgent {
    type Output = ResumeOutline;

    fn stage(&self) -> StageName {
        StageName::ResumeStructuring
    }

    fn schema_hint(&self) -> &'static str {
        STRUCTURING_SYSTEM
    }

    fn render(&self, prompt: &PromptContext) -> String {
        STRUCTURING_PROMPT_TEMPLATE.replace("{context}", &prompt.render_sections())
    }

    fn parse(&self, raw: &str, _prompt: &PromptContext) -> Result<ResumeOutline, String> {
        let payload: OutlinePayload = parse_json(raw)?;
        if payload.sections.is_empty() {
            return Err("outline has no sections".to_string());
        }

        let mut names = HashSet::new();
        let mut total = 0.0_f32;
        let mut sections = Vec::with_capacity(payload.sections.len());
        for section in payload.sections {
            let name = section.name.trim().to_string();
            if name.is_empty() {
                return Err("outline section with empty name".to_string());
            }
            if !names.insert(name.to_lowercase()) {
                return Err(format!("duplicate outline section '{name}'"));
            }
            if !(section.allocation > 0.0 && section.allocation <= 1.0) {
                return Err(format!(
                    "section '{name}' has allocation {} outside (0, 1]",
                    section.allocation
                ));
            }
            total += section.allocation;
            sections.push(OutlineSection {
                name,
                allocation: section.allocation,
                focus: section
                    .focus
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty()),
            });
        }

        if total > MAX_TOTAL_ALLOCATION {
            return Err(format!("allocations sum to {total:.2}, more than one page"));
        }

        Ok(ResumeOutline {
            id: Uuid::new_v4(),
            sections,
        })
    }
}

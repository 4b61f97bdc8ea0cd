//! Stage agents. Each agent renders a `PromptContext` into a generation request and
//! parses the raw reply into its stage's typed output. Agents never call the
//! generation service themselves; `StageRunner` does, so retries and timeouts are
//! uniform across stages.

pub mod company_analysis;
pub mod experience;
pub mod generation;
pub mod improvement;
pub mod requirements;
pub mod structuring;
pub mod suggestions;
pub mod summary;

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::pipeline::context::{OutputConstraints, PromptContext};
use crate::pipeline::stage::{DraftContent, DraftSection, StageName};

pub use company_analysis::CompanyAnalysisAgent;
pub use experience::ExperienceRefinementAgent;
pub use generation::GenerationAgent;
pub use improvement::ImprovementAgent;
pub use requirements::RequirementsAgent;
pub use structuring::StructuringAgent;
pub use suggestions::SuggestionsAgent;
pub use summary::SummaryAgent;

pub trait StageAgent: Send + Sync {
    type Output: Send;

    fn stage(&self) -> StageName;

    /// System instruction describing the output shape.
    fn schema_hint(&self) -> &'static str;

    fn render(&self, prompt: &PromptContext) -> String;

    /// Parses and validates a raw reply. `Err` carries the reason the output was
    /// rejected and makes the runner retry with the same prompt.
    fn parse(&self, raw: &str, prompt: &PromptContext) -> Result<Self::Output, String>;
}

// ────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ────────────────────────────────────────────────────────────────────────────

/// Strips a Markdown code fence (with or without a language tag) around a reply.
/// Prose before the opening fence is dropped too.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_fence = &text[open + 3..];
    // Drop the language tag line, if any.
    let body = match after_fence.find('\n') {
        Some(nl) if !after_fence[..nl].contains(|c: char| c == '{' || c == '[') => &after_fence[nl + 1..],
        _ => after_fence,
    };
    match body.rfind("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_str(strip_json_fences(raw)).map_err(|e| format!("malformed JSON: {e}"))
}

/// Trims entries and drops blanks and case-insensitive duplicates, keeping order.
pub fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .collect()
}

/// Case-insensitive whole-word match. Word characters are alphanumerics plus `+` and
/// `#`, so "Go" does not match "Google" and "C" does not match "C++". A `.` joins
/// words only when more word follows it ("Node.js").
pub fn contains_term(haystack: &str, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    let haystack = haystack.to_lowercase();
    let is_word = |c: char| c.is_alphanumeric() || matches!(c, '+' | '#');

    let mut from = 0;
    while let Some(pos) = haystack[from..].find(&term) {
        let start = from + pos;
        let end = start + term.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        // A trailing '.' is sentence punctuation unless more word follows it.
        let after_is_word = match after {
            Some('.') => haystack[end + 1..].chars().next().is_some_and(is_word),
            Some(c) => is_word(c),
            None => false,
        };
        if !before.is_some_and(is_word) && !after_is_word {
            return true;
        }
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// The first disallowed term `text` names, if any.
pub(crate) fn disallowed_term<'a>(text: &str, constraints: &'a OutputConstraints) -> Option<&'a str> {
    constraints
        .disallowed_terms
        .iter()
        .map(String::as_str)
        .find(|term| contains_term(text, term))
}

fn is_skills_section(title: &str) -> bool {
    title.to_lowercase().contains("skill")
}

/// Entries of a list-style section: split on lines, commas, semicolons and pipes, with
/// bullets, emphasis, a leading `Label:` and a trailing parenthetical removed.
fn listed_entries(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .flat_map(|line| {
            let line = line.trim().trim_start_matches(|c: char| matches!(c, '-' | '*' | '•'));
            let line = line.rsplit_once(':').map_or(line, |(_, rest)| rest);
            line.split(|c: char| matches!(c, ',' | ';' | '|'))
        })
        .map(|entry| {
            let entry = entry.split('(').next().unwrap_or(entry);
            entry.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '`' | '_' | '.'))
        })
        .filter(|entry| !entry.is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Draft payloads shared by generation and improvement
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct DraftPayload {
    #[serde(default)]
    sections: Vec<DraftSectionPayload>,
    #[serde(default)]
    skills_referenced: Vec<String>,
    #[serde(default)]
    change_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DraftSectionPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// Validates a draft reply against the skill boundary and, when the constraints
/// name any, outline coverage.
pub(crate) fn validate_draft(
    payload: DraftPayload,
    constraints: &OutputConstraints,
) -> Result<DraftContent, String> {
    let sections: Vec<DraftSection> = payload
        .sections
        .into_iter()
        .map(|s| DraftSection {
            title: s.title.trim().to_string(),
            content: s.content.trim().to_string(),
        })
        .collect();

    if sections.is_empty() {
        return Err("draft has no sections".to_string());
    }
    if let Some(blank) = sections
        .iter()
        .find(|s| s.title.is_empty() || s.content.is_empty())
    {
        return Err(format!(
            "section '{}' has an empty title or content",
            blank.title
        ));
    }

    for required in &constraints.required_sections {
        if !sections.iter().any(|s| s.title.eq_ignore_ascii_case(required)) {
            return Err(format!("outline section '{required}' is missing"));
        }
    }

    let mut skills: Vec<String> = Vec::new();
    for skill in clean_list(payload.skills_referenced) {
        let canonical = constraints
            .allowed_skills
            .iter()
            .find(|s| s.eq_ignore_ascii_case(&skill))
            .ok_or_else(|| format!("skill '{skill}' is not in the candidate profile"))?;
        skills.push(canonical.clone());
    }
    if skills.is_empty() {
        return Err("skills_referenced is empty".to_string());
    }

    for section in &sections {
        let term = disallowed_term(&section.content, constraints)
            .or_else(|| disallowed_term(&section.title, constraints));
        if let Some(term) = term {
            return Err(format!(
                "section '{}' claims '{term}', which the candidate does not have",
                section.title
            ));
        }
    }

    // A skills list may only name profile skills, whether or not the posting asked.
    for section in sections.iter().filter(|s| is_skills_section(&s.title)) {
        if let Some(entry) = listed_entries(&section.content).find(|entry| {
            !constraints
                .allowed_skills
                .iter()
                .any(|skill| skill.eq_ignore_ascii_case(entry))
        }) {
            return Err(format!(
                "section '{}' lists '{entry}', which is not in the candidate profile",
                section.title
            ));
        }
    }

    Ok(DraftContent {
        sections,
        skills_referenced: skills,
        change_summary: payload
            .change_summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    })
}

/// Fills the placeholders shared by every template that writes resume text.
pub(crate) fn render_draft_template(template: &str, prompt: &PromptContext) -> String {
    use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, SKILL_BOUNDARY_INSTRUCTION};

    let required_sections = if prompt.constraints.required_sections.is_empty() {
        "(keep the current draft's sections)".to_string()
    } else {
        prompt.constraints.required_sections.join(", ")
    };
    template
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{skill_boundary}", SKILL_BOUNDARY_INSTRUCTION)
        .replace("{allowed_skills}", &prompt.constraints.allowed_skills.join(", "))
        .replace("{required_sections}", &required_sections)
        .replace("{context}", &prompt.render_sections())
}

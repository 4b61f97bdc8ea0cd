//! Stage names and the structured outputs each stage produces.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::profile::WorkExperience;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    CompanyAnalysis,
    RequirementsExtraction,
    ResumeStructuring,
    ResumeGeneration,
    FeedbackImprovement,
    /// Non-fatal: rewrites work experience descriptions toward the requirements.
    ExperienceRefinement,
    /// Non-fatal: writes the professional summary the draft opens with.
    SummaryGeneration,
    /// Auxiliary: advises the candidate what to add. Never changes run state.
    ImprovementSuggestions,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::CompanyAnalysis => "company_analysis",
            StageName::RequirementsExtraction => "requirements_extraction",
            StageName::ResumeStructuring => "resume_structuring",
            StageName::ResumeGeneration => "resume_generation",
            StageName::FeedbackImprovement => "feedback_improvement",
            StageName::ExperienceRefinement => "experience_refinement",
            StageName::SummaryGeneration => "summary_generation",
            StageName::ImprovementSuggestions => "improvement_suggestions",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 1: Company Analysis
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyAnalysis {
    pub id: Uuid,
    pub summary: String,
    pub values: Vec<String>,
    pub priorities: Vec<String>,
    pub culture_signals: Vec<String>,
}

impl CompanyAnalysis {
    pub fn to_prompt_text(&self) -> String {
        format!(
            "Summary: {}\nValues: {}\nPriorities: {}\nCulture signals: {}",
            self.summary,
            self.values.join(", "),
            self.priorities.join(", "),
            self.culture_signals.join(", ")
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 2: Requirements Extraction
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Required,
    Preferred,
    Bonus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub text: String,
    pub importance: Importance,
    /// The concrete skill the requirement asks for, when it names one.
    #[serde(default)]
    pub skill: Option<String>,
}

/// Ordered as the posting presents them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementSet {
    pub id: Uuid,
    pub items: Vec<Requirement>,
}

impl RequirementSet {
    pub fn to_prompt_text(&self) -> String {
        self.items
            .iter()
            .map(|r| {
                let importance = match r.importance {
                    Importance::Required => "required",
                    Importance::Preferred => "preferred",
                    Importance::Bonus => "bonus",
                };
                match &r.skill {
                    Some(skill) => format!("- [{importance}] {} (skill: {skill})", r.text),
                    None => format!("- [{importance}] {}", r.text),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn skills(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|r| r.skill.as_deref())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Auxiliary: Experience Refinement & Summary Generation
// ────────────────────────────────────────────────────────────────────────────

/// The profile's work experiences in profile order, descriptions rewritten.
/// Company, position and period always come from the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedExperiences {
    pub id: Uuid,
    pub experiences: Vec<WorkExperience>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalSummary {
    pub id: Uuid,
    pub text: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 3: Resume Structuring
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineSection {
    pub name: String,
    /// Share of the page this section should take, 0 < allocation ≤ 1.
    pub allocation: f32,
    #[serde(default)]
    pub focus: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeOutline {
    pub id: Uuid,
    pub sections: Vec<OutlineSection>,
}

impl ResumeOutline {
    pub fn to_prompt_text(&self) -> String {
        self.sections
            .iter()
            .map(|s| {
                let pct = (s.allocation * 100.0).round();
                match &s.focus {
                    Some(focus) => format!("- {} (~{pct}% of page): {focus}", s.name),
                    None => format!("- {} (~{pct}% of page)", s.name),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stages 4/5: Resume Generation & Feedback Improvement
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSection {
    pub title: String,
    /// Markdown body of the section, without its heading.
    pub content: String,
}

/// What the generation and improvement agents produce. Header and lineage are
/// stamped by the orchestrator when this becomes a `ResumeDraft`.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftContent {
    pub sections: Vec<DraftSection>,
    /// Canonicalised to the profile's spelling.
    pub skills_referenced: Vec<String>,
    pub change_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeDraft {
    pub id: Uuid,
    pub version: u32,
    pub candidate_name: String,
    pub contact_line: String,
    pub sections: Vec<DraftSection>,
    pub skills: Vec<String>,
    pub change_summary: Option<String>,
    pub company_analysis_id: Uuid,
    pub requirement_set_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ResumeDraft {
    /// Builds a draft from agent output with the lineage it was generated against.
    pub fn from_content(
        content: DraftContent,
        version: u32,
        candidate_name: &str,
        contact_line: String,
        company_analysis_id: Uuid,
        requirement_set_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            version,
            candidate_name: candidate_name.to_string(),
            contact_line,
            sections: content.sections,
            skills: content.skills_referenced,
            change_summary: content.change_summary,
            company_analysis_id,
            requirement_set_id,
            created_at: Utc::now(),
        }
    }

    /// The next version: same header and lineage, new body.
    pub fn revise(&self, content: DraftContent) -> Self {
        Self::from_content(
            content,
            self.version + 1,
            &self.candidate_name,
            self.contact_line.clone(),
            self.company_analysis_id,
            self.requirement_set_id,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackNote {
    pub id: Uuid,
    /// The draft version this critique was written against.
    pub draft_version: u32,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
}

impl FeedbackNote {
    pub fn new(draft_version: u32, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            draft_version,
            text: text.into(),
            submitted_at: Utc::now(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Improvement suggestions
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub topic: String,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionSet {
    pub suggestions: Vec<Suggestion>,
    pub prompt_text: String,
}

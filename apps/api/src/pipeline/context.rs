//! Context Assembler: decides what each stage gets to see.
//!
//! Every stage has a fixed allowlist of required and optional fields. Required fields
//! are never truncated; if they alone exceed the budget the stage fails before any
//! generation call. Optional fields are admitted next, then retrieved documents in
//! descending score order until the first one that does not fit.

use tracing::debug;
use uuid::Uuid;

use crate::models::posting::JobPosting;
use crate::models::profile::UserProfile;
use crate::pipeline::error::PipelineError;
use crate::pipeline::stage::{
    CompanyAnalysis, FeedbackNote, ProfessionalSummary, RefinedExperiences, RequirementSet,
    ResumeDraft, ResumeOutline, StageName,
};
use crate::retrieval::RetrievedDocument;

// ────────────────────────────────────────────────────────────────────────────
// StageContext
// ────────────────────────────────────────────────────────────────────────────

/// Accumulated state of one run. Grows monotonically; the only replacement is a
/// refined draft superseding the previous one.
#[derive(Debug, Clone)]
pub struct StageContext {
    run_id: Uuid,
    profile: UserProfile,
    posting: JobPosting,
    retrieved: Vec<RetrievedDocument>,
    company_analysis: Option<CompanyAnalysis>,
    requirements: Option<RequirementSet>,
    refined_experiences: Option<RefinedExperiences>,
    outline: Option<ResumeOutline>,
    summary: Option<ProfessionalSummary>,
    draft: Option<ResumeDraft>,
    feedback: Option<FeedbackNote>,
}

impl StageContext {
    pub fn new(run_id: Uuid, profile: UserProfile, posting: JobPosting) -> Self {
        Self {
            run_id,
            profile,
            posting,
            retrieved: Vec::new(),
            company_analysis: None,
            requirements: None,
            refined_experiences: None,
            outline: None,
            summary: None,
            draft: None,
            feedback: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn posting(&self) -> &JobPosting {
        &self.posting
    }

    pub fn retrieved(&self) -> &[RetrievedDocument] {
        &self.retrieved
    }

    pub fn company_analysis(&self) -> Option<&CompanyAnalysis> {
        self.company_analysis.as_ref()
    }

    pub fn requirements(&self) -> Option<&RequirementSet> {
        self.requirements.as_ref()
    }

    pub fn refined_experiences(&self) -> Option<&RefinedExperiences> {
        self.refined_experiences.as_ref()
    }

    pub fn summary(&self) -> Option<&ProfessionalSummary> {
        self.summary.as_ref()
    }

    pub fn outline(&self) -> Option<&ResumeOutline> {
        self.outline.as_ref()
    }

    pub fn draft(&self) -> Option<&ResumeDraft> {
        self.draft.as_ref()
    }

    pub fn set_retrieved(&mut self, documents: Vec<RetrievedDocument>) {
        self.retrieved = documents;
    }

    pub fn record_company_analysis(&mut self, analysis: CompanyAnalysis) {
        debug_assert!(self.company_analysis.is_none());
        self.company_analysis = Some(analysis);
    }

    pub fn record_requirements(&mut self, requirements: RequirementSet) {
        debug_assert!(self.requirements.is_none());
        self.requirements = Some(requirements);
    }

    pub fn record_refined_experiences(&mut self, refined: RefinedExperiences) {
        debug_assert!(self.refined_experiences.is_none());
        self.refined_experiences = Some(refined);
    }

    pub fn record_summary(&mut self, summary: ProfessionalSummary) {
        debug_assert!(self.summary.is_none());
        self.summary = Some(summary);
    }

    pub fn record_outline(&mut self, outline: ResumeOutline) {
        debug_assert!(self.outline.is_none());
        self.outline = Some(outline);
    }

    /// Stores the current draft. Replaces any previous one.
    pub fn record_draft(&mut self, draft: ResumeDraft) {
        self.draft = Some(draft);
    }

    pub fn record_feedback(&mut self, note: FeedbackNote) {
        self.feedback = Some(note);
    }

    pub fn take_draft(&mut self) -> Option<ResumeDraft> {
        self.draft.take()
    }

    fn field_text(&self, field: ContextField) -> Option<String> {
        match field {
            ContextField::JobPosting => Some(self.posting.to_prompt_text()),
            ContextField::CompanyProfile => Some(self.posting.company_profile_text()),
            ContextField::UserProfile => Some(match &self.refined_experiences {
                Some(refined) => UserProfile {
                    work_experiences: refined.experiences.clone(),
                    ..self.profile.clone()
                }
                .to_prompt_text(),
                None => self.profile.to_prompt_text(),
            }),
            ContextField::CompanyAnalysis => {
                self.company_analysis.as_ref().map(|a| a.to_prompt_text())
            }
            ContextField::RequirementSet => self.requirements.as_ref().map(|r| r.to_prompt_text()),
            ContextField::ResumeOutline => self.outline.as_ref().map(|o| o.to_prompt_text()),
            ContextField::ProfessionalSummary => self.summary.as_ref().map(|s| s.text.clone()),
            ContextField::ResumeDraft => self.draft.as_ref().map(crate::output::markdown::to_markdown),
            ContextField::FeedbackNote => self.feedback.as_ref().map(|f| f.text.clone()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Allowlists
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextField {
    JobPosting,
    CompanyProfile,
    UserProfile,
    CompanyAnalysis,
    RequirementSet,
    ResumeOutline,
    ProfessionalSummary,
    ResumeDraft,
    FeedbackNote,
}

impl ContextField {
    pub fn label(&self) -> &'static str {
        match self {
            ContextField::JobPosting => "JOB POSTING",
            ContextField::CompanyProfile => "COMPANY PROFILE",
            ContextField::UserProfile => "CANDIDATE PROFILE",
            ContextField::CompanyAnalysis => "COMPANY ANALYSIS",
            ContextField::RequirementSet => "REQUIREMENTS",
            ContextField::ResumeOutline => "RESUME OUTLINE",
            ContextField::ProfessionalSummary => "PROFESSIONAL SUMMARY",
            ContextField::ResumeDraft => "CURRENT DRAFT",
            ContextField::FeedbackNote => "FEEDBACK",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            ContextField::JobPosting => "job_posting",
            ContextField::CompanyProfile => "company_profile",
            ContextField::UserProfile => "user_profile",
            ContextField::CompanyAnalysis => "company_analysis",
            ContextField::RequirementSet => "requirement_set",
            ContextField::ResumeOutline => "resume_outline",
            ContextField::ProfessionalSummary => "professional_summary",
            ContextField::ResumeDraft => "resume_draft",
            ContextField::FeedbackNote => "feedback_note",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StagePolicy {
    pub required: &'static [ContextField],
    pub optional: &'static [ContextField],
    pub retrieval: bool,
}

pub fn policy_for(stage: StageName) -> StagePolicy {
    use ContextField::*;
    match stage {
        StageName::CompanyAnalysis => StagePolicy {
            required: &[JobPosting, CompanyProfile],
            optional: &[],
            retrieval: true,
        },
        StageName::RequirementsExtraction => StagePolicy {
            required: &[JobPosting, CompanyAnalysis],
            optional: &[],
            retrieval: true,
        },
        StageName::ExperienceRefinement => StagePolicy {
            required: &[UserProfile, RequirementSet],
            optional: &[CompanyAnalysis],
            retrieval: false,
        },
        StageName::ResumeStructuring => StagePolicy {
            required: &[UserProfile, RequirementSet, CompanyAnalysis],
            optional: &[],
            retrieval: false,
        },
        StageName::ResumeGeneration => StagePolicy {
            required: &[CompanyAnalysis, RequirementSet, ResumeOutline, UserProfile],
            optional: &[ProfessionalSummary, FeedbackNote],
            retrieval: false,
        },
        StageName::SummaryGeneration => StagePolicy {
            required: &[UserProfile, CompanyAnalysis, RequirementSet],
            optional: &[],
            retrieval: false,
        },
        StageName::FeedbackImprovement => StagePolicy {
            required: &[ResumeDraft, FeedbackNote, RequirementSet],
            optional: &[UserProfile],
            retrieval: false,
        },
        StageName::ImprovementSuggestions => StagePolicy {
            required: &[ResumeDraft, RequirementSet],
            optional: &[JobPosting],
            retrieval: false,
        },
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PromptContext
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PromptSection {
    pub field: ContextField,
    pub body: String,
}

/// Constraints the agent validates its output against. Not counted in the budget.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputConstraints {
    /// The candidate's skills, profile spelling.
    pub allowed_skills: Vec<String>,
    /// Skills the posting asks for that the candidate does not list.
    pub disallowed_terms: Vec<String>,
    /// Outline sections a fresh draft must cover.
    pub required_sections: Vec<String>,
}

/// The bounded, stage-specific view handed to an agent.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub stage: StageName,
    pub sections: Vec<PromptSection>,
    pub retrieved: Vec<RetrievedDocument>,
    pub constraints: OutputConstraints,
}

impl PromptContext {
    pub fn section(&self, field: ContextField) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.field == field)
            .map(|s| s.body.as_str())
    }

    /// Characters counted against the budget.
    pub fn size(&self) -> usize {
        self.sections.iter().map(|s| s.body.chars().count()).sum::<usize>()
            + self
                .retrieved
                .iter()
                .map(|d| d.text.chars().count())
                .sum::<usize>()
    }

    /// All admitted fields as labelled blocks, in allowlist order.
    pub fn render_sections(&self) -> String {
        self.sections
            .iter()
            .map(|s| format!("{}:\n{}", s.field.label(), s.body.trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Retrieved documents as a numbered reference list, or an explicit "none".
    pub fn render_retrieved(&self) -> String {
        if self.retrieved.is_empty() {
            return "(no similar postings available)".to_string();
        }
        self.retrieved
            .iter()
            .enumerate()
            .map(|(i, d)| format!("[{}] ({:.2}) {}", i + 1, d.score, d.text.trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ContextAssembler
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    budget_chars: usize,
}

impl ContextAssembler {
    pub fn new(budget_chars: usize) -> Self {
        Self { budget_chars }
    }

    pub fn build(&self, stage: StageName, ctx: &StageContext) -> Result<PromptContext, PipelineError> {
        let policy = policy_for(stage);

        let mut sections = Vec::with_capacity(policy.required.len() + policy.optional.len());
        for &field in policy.required {
            let body = ctx
                .field_text(field)
                .ok_or(PipelineError::MissingStageInput {
                    stage,
                    field: field.key(),
                })?;
            sections.push(PromptSection { field, body });
        }

        let required: usize = sections.iter().map(|s| s.body.chars().count()).sum();
        if required > self.budget_chars {
            return Err(PipelineError::ContextTooLarge {
                stage,
                required,
                budget: self.budget_chars,
            });
        }
        let mut used = required;

        for &field in policy.optional {
            let Some(body) = ctx.field_text(field) else {
                continue;
            };
            let len = body.chars().count();
            if used + len > self.budget_chars {
                debug!(
                    "Run {}: {stage} skipped optional field {} ({len} chars)",
                    ctx.run_id(),
                    field.key()
                );
                continue;
            }
            used += len;
            sections.push(PromptSection { field, body });
        }

        let mut retrieved = Vec::new();
        if policy.retrieval {
            let mut candidates = ctx.retrieved().to_vec();
            candidates.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let total = candidates.len();
            for doc in candidates {
                let len = doc.text.chars().count();
                if used + len > self.budget_chars {
                    break;
                }
                used += len;
                retrieved.push(doc);
            }
            if retrieved.len() < total {
                debug!(
                    "Run {}: {stage} admitted {}/{} retrieved documents within {} chars",
                    ctx.run_id(),
                    retrieved.len(),
                    total,
                    self.budget_chars
                );
            }
        }

        Ok(PromptContext {
            stage,
            sections,
            retrieved,
            constraints: constraints_for(stage, ctx),
        })
    }
}

fn constraints_for(stage: StageName, ctx: &StageContext) -> OutputConstraints {
    let writes_resume_text = matches!(
        stage,
        StageName::ResumeGeneration
            | StageName::FeedbackImprovement
            | StageName::ExperienceRefinement
            | StageName::SummaryGeneration
    );
    if !writes_resume_text {
        return OutputConstraints::default();
    }

    let profile = ctx.profile();
    let mut disallowed_terms: Vec<String> = Vec::new();
    if let Some(requirements) = ctx.requirements() {
        for skill in requirements.skills() {
            let skill = skill.trim();
            if skill.is_empty() || profile.canonical_skill(skill).is_some() {
                continue;
            }
            if !disallowed_terms.iter().any(|t| t.eq_ignore_ascii_case(skill)) {
                disallowed_terms.push(skill.to_string());
            }
        }
    }

    let required_sections = match (stage, ctx.outline()) {
        (StageName::ResumeGeneration, Some(outline)) => {
            outline.sections.iter().map(|s| s.name.clone()).collect()
        }
        _ => Vec::new(),
    };

    OutputConstraints {
        allowed_skills: profile.skills.clone(),
        disallowed_terms,
        required_sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{jane_doe, backend_posting, requirements_with_skills};
    use crate::retrieval::DocumentKind;

    fn hit(id: &str, text: &str, score: f32) -> RetrievedDocument {
        RetrievedDocument {
            source_id: id.to_string(),
            text: text.to_string(),
            score,
            kind: DocumentKind::JobPosting,
        }
    }

    fn context() -> StageContext {
        StageContext::new(Uuid::new_v4(), jane_doe(), backend_posting())
    }

    #[test]
    fn test_company_analysis_sees_posting_and_retrieval_only() {
        let mut ctx = context();
        ctx.set_retrieved(vec![hit("a", "similar posting", 0.9)]);
        let prompt = ContextAssembler::new(24_000)
            .build(StageName::CompanyAnalysis, &ctx)
            .unwrap();

        assert!(prompt.section(ContextField::JobPosting).is_some());
        assert!(prompt.section(ContextField::CompanyProfile).is_some());
        assert!(prompt.section(ContextField::UserProfile).is_none());
        assert_eq!(prompt.retrieved.len(), 1);
    }

    #[test]
    fn test_missing_prior_output_is_ordering_error() {
        let err = ContextAssembler::new(24_000)
            .build(StageName::RequirementsExtraction, &context())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingStageInput {
                field: "company_analysis",
                ..
            }
        ));
    }

    #[test]
    fn test_required_fields_over_budget_is_context_too_large() {
        let err = ContextAssembler::new(10)
            .build(StageName::CompanyAnalysis, &context())
            .unwrap_err();
        match err {
            PipelineError::ContextTooLarge { stage, budget, required } => {
                assert_eq!(stage, StageName::CompanyAnalysis);
                assert_eq!(budget, 10);
                assert!(required > 10);
            }
            other => panic!("expected ContextTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_lowest_scoring_documents_are_dropped_first() {
        let mut ctx = context();
        let required = ContextAssembler::new(usize::MAX)
            .build(StageName::CompanyAnalysis, &ctx)
            .unwrap()
            .size();

        ctx.set_retrieved(vec![
            hit("low", &"l".repeat(100), 0.2),
            hit("high", &"h".repeat(100), 0.9),
            hit("mid", &"m".repeat(100), 0.5),
        ]);
        let prompt = ContextAssembler::new(required + 250)
            .build(StageName::CompanyAnalysis, &ctx)
            .unwrap();

        let ids: Vec<_> = prompt.retrieved.iter().map(|d| d.source_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid"]);
        assert!(prompt.size() <= required + 250);
    }

    #[test]
    fn test_admission_stops_at_first_document_that_does_not_fit() {
        let mut ctx = context();
        let required = ContextAssembler::new(usize::MAX)
            .build(StageName::CompanyAnalysis, &ctx)
            .unwrap()
            .size();

        ctx.set_retrieved(vec![
            hit("big", &"b".repeat(500), 0.9),
            hit("small", "s", 0.1),
        ]);
        let prompt = ContextAssembler::new(required + 100)
            .build(StageName::CompanyAnalysis, &ctx)
            .unwrap();
        assert!(prompt.retrieved.is_empty());
    }

    #[test]
    fn test_generation_constraints_flag_missing_skills() {
        let mut ctx = context();
        ctx.record_requirements(requirements_with_skills(&["go", "Kubernetes", "kubernetes"]));
        let constraints = constraints_for(StageName::ResumeGeneration, &ctx);

        assert_eq!(constraints.allowed_skills, vec!["Go", "SQL"]);
        assert_eq!(constraints.disallowed_terms, vec!["Kubernetes"]);
    }

    #[test]
    fn test_refined_experiences_replace_originals_in_profile_text() {
        let mut ctx = context();
        let mut experiences = jane_doe().work_experiences;
        experiences[0].description = "Ran distributed order routing in Go.".to_string();
        ctx.record_refined_experiences(RefinedExperiences {
            id: Uuid::new_v4(),
            experiences,
        });

        let profile = ctx.field_text(ContextField::UserProfile).unwrap();
        assert!(profile.contains("Ran distributed order routing in Go."));
        assert!(!profile.contains("Built order-routing services"));
        // the submitted profile is untouched
        assert!(ctx.profile().work_experiences[0]
            .description
            .starts_with("Built order-routing services"));
    }

    #[test]
    fn test_summary_is_optional_for_generation() {
        let mut ctx = context();
        ctx.record_company_analysis(CompanyAnalysis {
            id: Uuid::new_v4(),
            summary: "Cloud infrastructure".to_string(),
            values: vec!["Ownership".to_string()],
            priorities: vec!["Scale".to_string()],
            culture_signals: vec![],
        });
        ctx.record_requirements(requirements_with_skills(&["Go"]));
        ctx.record_outline(ResumeOutline {
            id: Uuid::new_v4(),
            sections: vec![],
        });
        let assembler = ContextAssembler::new(24_000);

        let without = assembler.build(StageName::ResumeGeneration, &ctx).unwrap();
        assert!(without.section(ContextField::ProfessionalSummary).is_none());

        ctx.record_summary(ProfessionalSummary {
            id: Uuid::new_v4(),
            text: "Backend engineer focused on Go services.".to_string(),
        });
        let with = assembler.build(StageName::ResumeGeneration, &ctx).unwrap();
        assert_eq!(
            with.section(ContextField::ProfessionalSummary),
            Some("Backend engineer focused on Go services.")
        );
    }

    #[test]
    fn test_auxiliary_writers_get_skill_constraints() {
        let mut ctx = context();
        ctx.record_requirements(requirements_with_skills(&["Kubernetes"]));
        for stage in [StageName::ExperienceRefinement, StageName::SummaryGeneration] {
            let constraints = constraints_for(stage, &ctx);
            assert_eq!(constraints.disallowed_terms, vec!["Kubernetes"]);
            assert!(constraints.required_sections.is_empty());
        }
    }

    #[test]
    fn test_non_writing_stages_have_no_constraints() {
        let mut ctx = context();
        ctx.record_requirements(requirements_with_skills(&["Kubernetes"]));
        assert_eq!(
            constraints_for(StageName::RequirementsExtraction, &ctx),
            OutputConstraints::default()
        );
    }
}

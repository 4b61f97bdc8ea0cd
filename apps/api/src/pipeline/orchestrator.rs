//! Pipeline Orchestrator: sequences the stage agents and owns the run state machine.
//!
//! ```text
//! Pending → Analyzing → ExtractingRequirements → Structuring → Generating
//!         → AwaitingFeedback ⇄ Refining
//!         → Complete
//! Failed / Cancelled are reachable from any non-terminal state.
//! ```
//!
//! `AwaitingFeedback` is the only suspension point. A fatal stage error moves the run
//! to `Failed` and discards its `StageContext`, so no partial draft can be returned
//! as final. Experience refinement (inside `ExtractingRequirements`) and summary
//! generation (inside `Generating`) are sub-steps the run survives losing.
//!
//! Every transition publishes a `RunSnapshot`, so status readers never need the run
//! lock that an in-flight stage holds.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pipeline::agents::{
    CompanyAnalysisAgent, ExperienceRefinementAgent, GenerationAgent, ImprovementAgent,
    RequirementsAgent, StageAgent, StructuringAgent, SuggestionsAgent, SummaryAgent,
};
use crate::pipeline::context::{ContextAssembler, PromptContext, StageContext};
use crate::pipeline::error::PipelineError;
use crate::pipeline::intake::GenerationRequest;
use crate::pipeline::retry::StageRunner;
use crate::pipeline::stage::{FeedbackNote, ResumeDraft, StageName, SuggestionSet};
use crate::retrieval::{RetrievalStore, RetrievedDocument};

// ────────────────────────────────────────────────────────────────────────────
// Run state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReason {
    pub stage: Option<StageName>,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Analyzing,
    ExtractingRequirements,
    Structuring,
    Generating,
    AwaitingFeedback,
    Refining,
    Complete,
    Failed(FailureReason),
    Cancelled,
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Analyzing => "analyzing",
            RunState::ExtractingRequirements => "extracting_requirements",
            RunState::Structuring => "structuring",
            RunState::Generating => "generating",
            RunState::AwaitingFeedback => "awaiting_feedback",
            RunState::Refining => "refining",
            RunState::Complete => "complete",
            RunState::Failed(_) => "failed",
            RunState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Complete | RunState::Failed(_) | RunState::Cancelled
        )
    }

    /// The stage whose agent runs while in this state.
    fn active_stage(&self) -> Option<StageName> {
        match self {
            RunState::Analyzing => Some(StageName::CompanyAnalysis),
            RunState::ExtractingRequirements => Some(StageName::RequirementsExtraction),
            RunState::Structuring => Some(StageName::ResumeStructuring),
            RunState::Generating => Some(StageName::ResumeGeneration),
            RunState::Refining => Some(StageName::FeedbackImprovement),
            _ => None,
        }
    }
}

/// Point-in-time view of a run, readable without the run lock.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub id: Uuid,
    pub state: RunState,
    pub refinements: u32,
    pub retrieval_degraded: bool,
    pub draft: Option<ResumeDraft>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One generation session. Owned by the run registry behind its own lock.
#[derive(Debug)]
pub struct PipelineRun {
    id: Uuid,
    state: RunState,
    context: Option<StageContext>,
    final_draft: Option<ResumeDraft>,
    refinements: u32,
    retrieval_degraded: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    status: watch::Sender<RunSnapshot>,
}

impl PipelineRun {
    /// Validates the request. Nothing runs for an incomplete request.
    pub fn new(request: GenerationRequest) -> Result<Self, PipelineError> {
        let (profile, posting) = request.validate()?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let (status, _) = watch::channel(RunSnapshot {
            id,
            state: RunState::Pending,
            refinements: 0,
            retrieval_degraded: false,
            draft: None,
            created_at: now,
            updated_at: now,
        });
        Ok(Self {
            id,
            state: RunState::Pending,
            context: Some(StageContext::new(id, profile, posting)),
            final_draft: None,
            refinements: 0,
            retrieval_degraded: false,
            created_at: now,
            updated_at: now,
            status,
        })
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            id: self.id,
            state: self.state.clone(),
            refinements: self.refinements,
            retrieval_degraded: self.retrieval_degraded,
            draft: self.current_draft().cloned(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Receives a fresh snapshot on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.status.subscribe()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn context(&self) -> Option<&StageContext> {
        self.context.as_ref()
    }

    /// The draft a caller may see: the final one once complete, else the current one.
    pub fn current_draft(&self) -> Option<&ResumeDraft> {
        self.final_draft
            .as_ref()
            .or_else(|| self.context.as_ref().and_then(StageContext::draft))
    }

    fn ctx(&self) -> Result<&StageContext, PipelineError> {
        self.context.as_ref().ok_or(PipelineError::InvalidState {
            action: "read the stage context",
            state: self.state.name(),
        })
    }

    fn ctx_mut(&mut self) -> Result<&mut StageContext, PipelineError> {
        let state = self.state.name();
        self.context.as_mut().ok_or(PipelineError::InvalidState {
            action: "update the stage context",
            state,
        })
    }

    fn expect_state(&self, expected: RunState, action: &'static str) -> Result<(), PipelineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PipelineError::InvalidState {
                action,
                state: self.state.name(),
            })
        }
    }

    fn transition(&mut self, next: RunState) {
        info!(
            "Run {}: {} → {}",
            self.id,
            self.state.name(),
            next.name()
        );
        self.state = next;
        self.updated_at = Utc::now();
        self.status.send_replace(self.snapshot());
    }

    /// Ends the run on a fatal error or cancellation and drops all partial state.
    fn abort(&mut self, err: &PipelineError) {
        let next = match err {
            PipelineError::Cancelled => RunState::Cancelled,
            _ => RunState::Failed(FailureReason {
                stage: err.stage().or_else(|| self.state.active_stage()),
                code: err.code(),
                message: err.to_string(),
            }),
        };
        warn!("Run {} aborted in {}: {err}", self.id, self.state.name());
        self.context = None;
        self.final_draft = None;
        self.transition(next);
    }

    /// Marks a run cancelled outside of an in-flight stage.
    pub fn cancel(&mut self) -> Result<(), PipelineError> {
        if self.state.is_terminal() {
            return Err(PipelineError::InvalidState {
                action: "cancel",
                state: self.state.name(),
            });
        }
        self.abort(&PipelineError::Cancelled);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub retrieval_top_k: usize,
    pub retrieval_timeout: Duration,
    /// `None` = unlimited, every iteration is logged.
    pub max_refinements: Option<u32>,
}

pub struct Orchestrator {
    runner: StageRunner,
    assembler: ContextAssembler,
    retrieval: Arc<dyn RetrievalStore>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        runner: StageRunner,
        assembler: ContextAssembler,
        retrieval: Arc<dyn RetrievalStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            runner,
            assembler,
            retrieval,
            settings,
        }
    }

    pub fn max_refinements(&self) -> Option<u32> {
        self.settings.max_refinements
    }

    /// Drives a `Pending` run through the four generation stages to `AwaitingFeedback`.
    pub async fn generate(
        &self,
        run: &mut PipelineRun,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        run.expect_state(RunState::Pending, "start generation")?;
        info!("Run {}: starting generation", run.id);

        let result = self.drive_generation(run, cancel).await;
        if let Err(err) = &result {
            run.abort(err);
        }
        result
    }

    async fn drive_generation(
        &self,
        run: &mut PipelineRun,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let query = run.ctx()?.posting().retrieval_query();
        let (documents, degraded) = until_cancelled(cancel, self.retrieve(run.id, &query)).await?;
        run.retrieval_degraded = degraded;
        run.ctx_mut()?.set_retrieved(documents);

        run.transition(RunState::Analyzing);
        let analysis = self.run_stage(run, &CompanyAnalysisAgent, cancel).await?;
        run.ctx_mut()?.record_company_analysis(analysis);

        run.transition(RunState::ExtractingRequirements);
        let requirements = self.run_stage(run, &RequirementsAgent, cancel).await?;
        run.ctx_mut()?.record_requirements(requirements);

        let originals = run.ctx()?.profile().work_experiences.clone();
        let refiner = ExperienceRefinementAgent::new(originals);
        if let Some(refined) = self.run_optional_stage(run, &refiner, cancel).await? {
            info!(
                "Run {}: refined {} work experiences",
                run.id,
                refined.experiences.len()
            );
            run.ctx_mut()?.record_refined_experiences(refined);
        }

        run.transition(RunState::Structuring);
        let outline = self.run_stage(run, &StructuringAgent, cancel).await?;
        run.ctx_mut()?.record_outline(outline);

        run.transition(RunState::Generating);
        if let Some(summary) = self.run_optional_stage(run, &SummaryAgent, cancel).await? {
            run.ctx_mut()?.record_summary(summary);
        }
        let content = self.run_stage(run, &GenerationAgent, cancel).await?;
        let ctx = run.ctx_mut()?;
        let (analysis_id, requirements_id) = lineage(ctx)?;
        let draft = ResumeDraft::from_content(
            content,
            1,
            &ctx.profile().name,
            ctx.profile().contact_line(),
            analysis_id,
            requirements_id,
        );
        ctx.record_draft(draft);

        run.transition(RunState::AwaitingFeedback);
        Ok(())
    }

    /// Applies a feedback note to the current draft and returns to `AwaitingFeedback`.
    ///
    /// Stale versions, empty notes and notes past the refinement limit are rejected
    /// without touching the run.
    pub async fn refine(
        &self,
        run: &mut PipelineRun,
        draft_version: u32,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        run.expect_state(RunState::AwaitingFeedback, "submit feedback")?;

        let current = run
            .current_draft()
            .map(|d| d.version)
            .ok_or(PipelineError::InvalidState {
                action: "submit feedback",
                state: run.state.name(),
            })?;
        if draft_version != current {
            return Err(PipelineError::StaleDraft {
                submitted: draft_version,
                current,
            });
        }
        if text.trim().is_empty() {
            return Err(PipelineError::IncompleteInput(vec![
                "feedback text cannot be empty".to_string(),
            ]));
        }
        let iteration = run.refinements + 1;
        match self.settings.max_refinements {
            Some(limit) if run.refinements >= limit => {
                return Err(PipelineError::RefinementLimitExceeded { limit });
            }
            Some(limit) => info!("Run {}: refinement {iteration}/{limit}", run.id),
            None => warn!(
                "Run {}: refinement {iteration} (no refinement limit configured)",
                run.id
            ),
        }

        run.ctx_mut()?
            .record_feedback(FeedbackNote::new(draft_version, text.trim()));
        run.transition(RunState::Refining);

        let result = self.run_stage(run, &ImprovementAgent, cancel).await;
        let content = match result {
            Ok(content) => content,
            Err(err) => {
                run.abort(&err);
                return Err(err);
            }
        };

        let ctx = run.ctx_mut()?;
        let revised = ctx
            .draft()
            .map(|previous| previous.revise(content))
            .ok_or(PipelineError::MissingStageInput {
                stage: StageName::FeedbackImprovement,
                field: "resume_draft",
            })?;
        ctx.record_draft(revised);
        run.refinements = iteration;
        run.transition(RunState::AwaitingFeedback);
        Ok(())
    }

    /// Accepts the current draft. The run becomes `Complete` and keeps only the draft.
    pub fn accept(&self, run: &mut PipelineRun) -> Result<ResumeDraft, PipelineError> {
        run.expect_state(RunState::AwaitingFeedback, "accept")?;
        let draft = run
            .ctx_mut()?
            .take_draft()
            .ok_or(PipelineError::InvalidState {
                action: "accept",
                state: "awaiting_feedback",
            })?;
        run.context = None;
        run.final_draft = Some(draft.clone());
        run.transition(RunState::Complete);
        info!("Run {}: accepted draft v{}", run.id, draft.version);
        Ok(draft)
    }

    /// Builds the suggestions prompt. Needs the run lock; the generation call in
    /// `suggest_improvements` does not.
    pub fn suggestions_prompt(&self, run: &PipelineRun) -> Result<PromptContext, PipelineError> {
        run.expect_state(RunState::AwaitingFeedback, "suggest improvements")?;
        self.assembler.build(StageName::ImprovementSuggestions, run.ctx()?)
    }

    /// Questions for the candidate about the current draft. Never touches the run, so
    /// a failure here leaves it in `AwaitingFeedback`.
    pub async fn suggest_improvements(
        &self,
        prompt: &PromptContext,
        cancel: &CancellationToken,
    ) -> Result<SuggestionSet, PipelineError> {
        until_cancelled(cancel, self.runner.run(&SuggestionsAgent, prompt)).await
    }

    async fn run_stage<A: StageAgent>(
        &self,
        run: &PipelineRun,
        agent: &A,
        cancel: &CancellationToken,
    ) -> Result<A::Output, PipelineError> {
        let prompt = self.assembler.build(agent.stage(), run.ctx()?)?;
        until_cancelled(cancel, self.runner.run(agent, &prompt)).await
    }

    /// Runs a sub-step whose failure the run survives. Only cancellation propagates.
    async fn run_optional_stage<A: StageAgent>(
        &self,
        run: &PipelineRun,
        agent: &A,
        cancel: &CancellationToken,
    ) -> Result<Option<A::Output>, PipelineError> {
        match self.run_stage(run, agent, cancel).await {
            Ok(output) => Ok(Some(output)),
            Err(PipelineError::Cancelled) => Err(PipelineError::Cancelled),
            Err(err) => {
                warn!(
                    "Run {}: {} skipped, continuing without it: {err}",
                    run.id,
                    agent.stage()
                );
                Ok(None)
            }
        }
    }

    /// Queries the retrieval store. Any failure degrades to an empty set.
    async fn retrieve(
        &self,
        run_id: Uuid,
        query: &str,
    ) -> Result<(Vec<RetrievedDocument>, bool), PipelineError> {
        let k = self.settings.retrieval_top_k;
        let outcome = tokio::time::timeout(
            self.settings.retrieval_timeout,
            self.retrieval.query(query, k),
        )
        .await;

        match outcome {
            Ok(Ok(documents)) => {
                info!("Run {run_id}: retrieved {} similar documents", documents.len());
                Ok((documents, false))
            }
            Ok(Err(err)) => {
                warn!("Run {run_id}: retrieval degraded, continuing without context: {err}");
                Ok((Vec::new(), true))
            }
            Err(_) => {
                warn!(
                    "Run {run_id}: retrieval timed out after {}s, continuing without context",
                    self.settings.retrieval_timeout.as_secs()
                );
                Ok((Vec::new(), true))
            }
        }
    }
}

fn lineage(ctx: &StageContext) -> Result<(Uuid, Uuid), PipelineError> {
    let analysis = ctx
        .company_analysis()
        .ok_or(PipelineError::MissingStageInput {
            stage: StageName::ResumeGeneration,
            field: "company_analysis",
        })?;
    let requirements = ctx
        .requirements()
        .ok_or(PipelineError::MissingStageInput {
            stage: StageName::ResumeGeneration,
            field: "requirement_set",
        })?;
    Ok((analysis.id, requirements.id))
}

/// Races `fut` against cancellation; the stage future is dropped when cancelled.
async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>>,
{
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    tokio::select! {
        result = fut => result,
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
    }
}

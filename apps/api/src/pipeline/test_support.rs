//! Fixtures and stub collaborators shared by the pipeline, output and route tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::llm_client::{LlmError, TextGenerator};
use crate::models::posting::{CompanyProfile, JobPosting};
use crate::models::profile::{ContactInfo, EducationEntry, UserProfile, WorkExperience};
use crate::output::export::{export_key, DraftExport, DraftExporter, ExportReceipt};
use crate::output::render::{PdfRenderer, RenderError};
use crate::pipeline::context::{OutputConstraints, PromptContext};
use crate::pipeline::prompts::{
    COMPANY_ANALYSIS_SYSTEM, DRAFT_SYSTEM, EXPERIENCE_SYSTEM, REQUIREMENTS_SYSTEM,
    STRUCTURING_SYSTEM, SUGGESTIONS_SYSTEM, SUMMARY_SYSTEM,
};
use crate::pipeline::stage::{Importance, Requirement, RequirementSet, ResumeDraft, StageName};
use crate::retrieval::{
    IndexOutcome, RetrievalError, RetrievalStore, RetrievedDocument, SourceDocument,
};

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

pub fn jane_doe() -> UserProfile {
    UserProfile {
        name: "Jane Doe".to_string(),
        contact: ContactInfo {
            email: "jane@example.com".to_string(),
            phone: None,
            location: Some("Berlin".to_string()),
        },
        residence: Some("Berlin".to_string()),
        job_title: Some("Software Engineer".to_string()),
        years_of_experience: Some("6".to_string()),
        work_experiences: vec![
            WorkExperience {
                company: "Parcelly".to_string(),
                position: "Backend Engineer".to_string(),
                period: "2020 – 2024".to_string(),
                description: "Built order-routing services in Go backed by PostgreSQL."
                    .to_string(),
            },
            WorkExperience {
                company: "Ledgerline".to_string(),
                position: "Software Developer".to_string(),
                period: "2018 – 2020".to_string(),
                description: "Wrote reporting jobs and SQL pipelines for finance teams."
                    .to_string(),
            },
        ],
        education: vec![EducationEntry {
            institution: "TU Berlin".to_string(),
            degree: "BSc".to_string(),
            field: Some("Computer Science".to_string()),
            period: Some("2014 – 2018".to_string()),
        }],
        skills: vec!["Go".to_string(), "SQL".to_string()],
        personal_projects: vec![],
        portfolio_url: None,
    }
}

pub fn backend_posting() -> JobPosting {
    JobPosting {
        title: Some("Backend Engineer".to_string()),
        company_name: Some("Acme Cloud".to_string()),
        description: "We are hiring a backend engineer to build distributed systems. \
                      You will design Go services, own SQL data models, and operate \
                      workloads on Kubernetes."
            .to_string(),
        company: CompanyProfile {
            industry: Some("Cloud infrastructure".to_string()),
            size: Some("200 employees".to_string()),
            culture: Some("Remote-first, written communication".to_string()),
            values: vec!["Ownership".to_string(), "Reliability".to_string()],
        },
    }
}

pub fn requirements_with_skills(skills: &[&str]) -> RequirementSet {
    RequirementSet {
        id: Uuid::new_v4(),
        items: skills
            .iter()
            .map(|s| Requirement {
                text: format!("Experience with {s}"),
                importance: Importance::Required,
                skill: Some(s.to_string()),
            })
            .collect(),
    }
}

pub fn empty_prompt(stage: StageName) -> PromptContext {
    PromptContext {
        stage,
        sections: Vec::new(),
        retrieved: Vec::new(),
        constraints: OutputConstraints::default(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generation service stub
// ────────────────────────────────────────────────────────────────────────────

type Responder = Box<dyn Fn(usize, &str, &str) -> Result<String, LlmError> + Send + Sync>;

/// Scripted `TextGenerator` that records every call.
pub struct ScriptedGenerator {
    responder: Responder,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// `f(call_index, prompt, schema_hint)` produces each reply.
    pub fn responder<F>(f: F) -> Self
    where
        F: Fn(usize, &str, &str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(f),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: Result<String, LlmError>) -> Self {
        Self::responder(move |_, _, _| replay(&reply))
    }

    /// Replies in order, repeating the last one once exhausted.
    pub fn sequence(replies: Vec<Result<String, LlmError>>) -> Self {
        assert!(!replies.is_empty());
        Self::responder(move |i, _, _| replay(&replies[i.min(replies.len() - 1)]))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

fn replay(reply: &Result<String, LlmError>) -> Result<String, LlmError> {
    match reply {
        Ok(text) => Ok(text.clone()),
        Err(LlmError::Api { status, message }) => Err(LlmError::Api {
            status: *status,
            message: message.clone(),
        }),
        Err(LlmError::Timeout(secs)) => Err(LlmError::Timeout(*secs)),
        Err(LlmError::EmptyContent) => Err(LlmError::EmptyContent),
        Err(other) => panic!("cannot replay {other:?}"),
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, schema_hint: &str) -> Result<String, LlmError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(index, prompt, schema_hint)
    }
}

/// Well-formed replies for every stage of the Jane Doe scenario.
pub fn jane_doe_replies(_call: usize, prompt: &str, schema_hint: &str) -> Result<String, LlmError> {
    let reply = match schema_hint {
        COMPANY_ANALYSIS_SYSTEM => {
            r#"{"summary": "Acme Cloud runs distributed infrastructure for mid-size SaaS teams.",
                "values": ["Ownership", "Reliability"],
                "priorities": ["Scaling backend services"],
                "culture_signals": ["Remote-first"]}"#
        }
        REQUIREMENTS_SYSTEM => {
            r#"{"requirements": [
                {"text": "Backend development in Go", "importance": "required", "skill": "Go"},
                {"text": "Distributed systems experience", "importance": "required", "skill": null},
                {"text": "Relational data modelling", "importance": "preferred", "skill": "SQL"},
                {"text": "Kubernetes operations", "importance": "bonus", "skill": "Kubernetes"}
            ]}"#
        }
        EXPERIENCE_SYSTEM => {
            r#"{"work_experiences": [
                {"company": "Parcelly", "position": "Backend Engineer",
                 "description": "Designed and ran distributed order-routing services in Go backed by PostgreSQL."},
                {"company": "Ledgerline", "position": "Software Developer",
                 "description": "Built SQL reporting pipelines feeding finance dashboards."}
            ]}"#
        }
        SUMMARY_SYSTEM => {
            "Backend engineer with six years of experience building distributed order-routing services in Go and SQL."
        }
        STRUCTURING_SYSTEM => {
            r#"{"sections": [
                {"name": "Summary", "allocation": 0.15, "focus": "Backend and distributed systems"},
                {"name": "Experience", "allocation": 0.55, "focus": "Go services at Parcelly"},
                {"name": "Education", "allocation": 0.15},
                {"name": "Skills", "allocation": 0.15}
            ]}"#
        }
        DRAFT_SYSTEM if prompt.contains("Revise the current draft") => {
            r#"{"sections": [
                {"title": "Summary", "content": "Backend engineer who cut order-routing latency by 40% with Go services."},
                {"title": "Experience", "content": "**Backend Engineer**, Parcelly (2020 – 2024)\n- Reduced p99 routing latency 40% in Go services backed by SQL"},
                {"title": "Education", "content": "BSc Computer Science, TU Berlin (2014 – 2018)"},
                {"title": "Skills", "content": "Go, SQL"}
            ],
            "skills_referenced": ["Go", "SQL"],
            "change_summary": "Led with measurable impact"}"#
        }
        DRAFT_SYSTEM => {
            r#"{"sections": [
                {"title": "Summary", "content": "Backend engineer building distributed order-routing services in Go."},
                {"title": "Experience", "content": "**Backend Engineer**, Parcelly (2020 – 2024)\n- Built order-routing services in Go backed by SQL\n\n**Software Developer**, Ledgerline (2018 – 2020)\n- Wrote SQL reporting pipelines"},
                {"title": "Education", "content": "BSc Computer Science, TU Berlin (2014 – 2018)"},
                {"title": "Skills", "content": "Go, SQL"}
            ],
            "skills_referenced": ["go", "SQL"]}"#
        }
        SUGGESTIONS_SYSTEM => {
            r#"{"suggestions": [
                {"topic": "Distributed systems", "question": "How many regions or nodes did the routing service run on?"}
            ],
            "prompt_text": "A few details would make the distributed systems angle stronger."}"#
        }
        _ => {
            return Err(LlmError::Api {
                status: 400,
                message: "unexpected prompt".to_string(),
            })
        }
    };
    Ok(reply.to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborator stubs
// ────────────────────────────────────────────────────────────────────────────

/// Retrieval backend that is always down.
pub struct FailingRetrievalStore;

#[async_trait]
impl RetrievalStore for FailingRetrievalStore {
    async fn index(&self, _document: SourceDocument) -> Result<IndexOutcome, RetrievalError> {
        Err(RetrievalError::Unavailable("connection refused".to_string()))
    }

    async fn query(&self, _text: &str, _k: usize) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        Err(RetrievalError::Unavailable("connection refused".to_string()))
    }
}

pub struct StubRenderer {
    pub fail: bool,
}

#[async_trait]
impl PdfRenderer for StubRenderer {
    async fn render(&self, _draft: &ResumeDraft, markdown: &str) -> Result<Bytes, RenderError> {
        if self.fail {
            return Err(RenderError::Unavailable("renderer offline".to_string()));
        }
        Ok(Bytes::from(format!("%PDF-1.7\n{markdown}")))
    }
}

/// Exporter that remembers what it was given.
#[derive(Default)]
pub struct RecordingExporter {
    pub fail: bool,
    pub exported: Mutex<Vec<(Uuid, u32)>>,
}

#[async_trait]
impl DraftExporter for RecordingExporter {
    async fn export(&self, export: DraftExport<'_>) -> anyhow::Result<ExportReceipt> {
        if self.fail {
            anyhow::bail!("bucket unavailable");
        }
        self.exported
            .lock()
            .unwrap()
            .push((export.run_id, export.draft.version));
        Ok(ExportReceipt {
            export_id: Uuid::new_v4(),
            s3_key: export_key(export.run_id, export.draft.version),
        })
    }
}

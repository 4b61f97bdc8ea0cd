use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::pipeline::error::PipelineError;
use crate::pipeline::orchestrator::{PipelineRun, RunSnapshot};

/// A registered run: its lock, the token that cancels its in-flight stage and the
/// latest published snapshot.
#[derive(Clone)]
pub struct RunHandle {
    pub run: Arc<Mutex<PipelineRun>>,
    pub cancel: CancellationToken,
    pub status: watch::Receiver<RunSnapshot>,
}

/// Live runs keyed by id. Each run sits behind its own lock, so runs never block
/// each other; the map lock is held only to look a handle up.
#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<Uuid, RunHandle>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, run: PipelineRun) -> RunHandle {
        let id = run.id();
        let handle = RunHandle {
            status: run.subscribe(),
            run: Arc::new(Mutex::new(run)),
            cancel: CancellationToken::new(),
        };
        self.runs.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, id: Uuid) -> Option<RunHandle> {
        self.runs.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    /// Cancels a run that has not finished, then forgets it.
    ///
    /// An in-flight stage is signalled first and aborts the run itself; an idle run
    /// is marked cancelled here. A terminal run keeps its state and is only removed.
    pub async fn cancel(&self, id: Uuid) -> Result<(), PipelineError> {
        let handle = self.get(id).await.ok_or(PipelineError::RunNotFound(id))?;

        handle.cancel.cancel();
        let state = {
            let mut run = handle.run.lock().await;
            if !run.state().is_terminal() {
                run.cancel()?;
            }
            run.state().name()
        };

        self.runs.write().await.remove(&id);
        info!("Run {id}: removed ({state})");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::context::ContextAssembler;
    use crate::pipeline::intake::GenerationRequest;
    use crate::pipeline::orchestrator::RunState;
    use crate::pipeline::retry::{RetryPolicy, StageRunner};
    use crate::pipeline::test_support::{
        backend_posting, jane_doe, jane_doe_replies, ScriptedGenerator,
    };
    use crate::pipeline::{Orchestrator, OrchestratorSettings};
    use crate::retrieval::InMemoryRetrievalStore;

    fn run() -> PipelineRun {
        PipelineRun::new(GenerationRequest {
            profile: jane_doe(),
            posting: backend_posting(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_cancel_idle_run_removes_it() {
        let registry = RunRegistry::new();
        let handle = registry.insert(run()).await;
        let id = handle.run.lock().await.id();

        registry.cancel(id).await.unwrap();

        assert!(registry.get(id).await.is_none());
        assert!(handle.cancel.is_cancelled());
        assert_eq!(handle.run.lock().await.state(), &RunState::Cancelled);
    }

    #[tokio::test]
    async fn test_failed_run_is_removed_and_keeps_its_state() {
        // a budget too small for any stage fails the run before the first call
        let orchestrator = Orchestrator::new(
            StageRunner::new(
                Arc::new(ScriptedGenerator::responder(jane_doe_replies)),
                RetryPolicy::default(),
            ),
            ContextAssembler::new(10),
            Arc::new(InMemoryRetrievalStore::default()),
            OrchestratorSettings {
                retrieval_top_k: 5,
                retrieval_timeout: std::time::Duration::from_secs(45),
                max_refinements: None,
            },
        );
        let registry = RunRegistry::new();
        let handle = registry.insert(run()).await;
        let id = {
            let mut run = handle.run.lock().await;
            assert!(orchestrator.generate(&mut run, &handle.cancel).await.is_err());
            assert!(matches!(run.state(), RunState::Failed(_)));
            run.id()
        };

        registry.cancel(id).await.unwrap();

        assert!(registry.get(id).await.is_none());
        assert_eq!(registry.len().await, 0);
        assert!(matches!(handle.run.lock().await.state(), RunState::Failed(_)));
        assert!(matches!(handle.status.borrow().state, RunState::Failed(_)));
    }

    #[tokio::test]
    async fn test_cancel_unknown_run_is_not_found() {
        let registry = RunRegistry::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            registry.cancel(id).await,
            Err(PipelineError::RunNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let registry = RunRegistry::new();
        let a = registry.insert(run()).await;
        let b = registry.insert(run()).await;

        let _held = a.run.lock().await;
        // b stays reachable while a is locked
        let b_id = b.run.lock().await.id();
        assert!(registry.get(b_id).await.is_some());
        assert_eq!(registry.len().await, 2);
    }
}

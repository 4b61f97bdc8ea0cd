//! Stage runner: one place where generation calls are made, timed out and retried.
//!
//! Two independent budgets apply to a stage:
//! - invalid output (unparseable, failed validation, empty reply) is retried with the
//!   identical prompt up to `output_retries` times;
//! - transient service errors (timeout, transport, 429, 5xx) are retried with
//!   exponential backoff up to `transient_max_attempts` calls per invocation.
//! Anything else is fatal immediately.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::llm_client::{LlmError, TextGenerator};
use crate::pipeline::agents::StageAgent;
use crate::pipeline::context::PromptContext;
use crate::pipeline::error::PipelineError;
use crate::pipeline::stage::StageName;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub output_retries: u32,
    pub transient_max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_factor: f64,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            output_retries: 2,
            transient_max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_factor: 2.0,
            call_timeout: Duration::from_secs(45),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failed call (1-based): base, base·f, base·f², …
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        self.backoff_base
            .mul_f64(self.backoff_factor.max(1.0).powi(exponent))
    }
}

enum CallFailure {
    /// Counts against the output budget.
    Invalid(String),
    Fatal(PipelineError),
}

#[derive(Clone)]
pub struct StageRunner {
    generator: Arc<dyn TextGenerator>,
    policy: RetryPolicy,
}

impl StageRunner {
    pub fn new(generator: Arc<dyn TextGenerator>, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    /// Runs `agent` against `prompt`. The agent is invoked at most
    /// `1 + output_retries` times on invalid output.
    pub async fn run<A: StageAgent>(
        &self,
        agent: &A,
        prompt: &PromptContext,
    ) -> Result<A::Output, PipelineError> {
        let stage = agent.stage();
        let request = agent.render(prompt);
        let max_invocations = 1 + self.policy.output_retries;
        let mut last_reason = String::new();

        for invocation in 1..=max_invocations {
            let raw = match self.call(stage, &request, agent.schema_hint()).await {
                Ok(raw) => raw,
                Err(CallFailure::Invalid(reason)) => {
                    warn!("{stage}: attempt {invocation}/{max_invocations} failed: {reason}");
                    last_reason = reason;
                    continue;
                }
                Err(CallFailure::Fatal(err)) => return Err(err),
            };

            match agent.parse(&raw, prompt) {
                Ok(output) => return Ok(output),
                Err(reason) => {
                    warn!(
                        "{stage}: attempt {invocation}/{max_invocations} produced invalid output: {reason}"
                    );
                    last_reason = reason;
                }
            }
        }

        Err(PipelineError::StageOutputInvalid {
            stage,
            attempts: max_invocations,
            reason: last_reason,
        })
    }

    /// One logical generation call, with transient retries and backoff.
    async fn call(&self, stage: StageName, request: &str, schema_hint: &str) -> Result<String, CallFailure> {
        let max_attempts = self.policy.transient_max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(
                self.policy.call_timeout,
                self.generator.generate(request, schema_hint),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(self.policy.call_timeout.as_secs())),
            };

            let err = match result {
                Ok(text) if text.trim().is_empty() => {
                    return Err(CallFailure::Invalid("empty reply".to_string()))
                }
                Ok(text) => return Ok(text),
                Err(LlmError::EmptyContent) => {
                    return Err(CallFailure::Invalid("empty reply".to_string()))
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(CallFailure::Fatal(PipelineError::ServiceRejected {
                    stage,
                    message: err.to_string(),
                }));
            }
            if attempt >= max_attempts {
                return Err(CallFailure::Fatal(PipelineError::ServiceUnavailable {
                    stage,
                    attempts: attempt,
                    message: err.to_string(),
                }));
            }

            let delay = self.policy.backoff_delay(attempt);
            warn!(
                "{stage}: transient failure on call {attempt}/{max_attempts}, retrying in {}ms: {err}",
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Worker Agent
//!
//! One worker owns one slice of the run's controls. It splits the slice into
//! token-budgeted sub-batches, issues a generation call per sub-batch under
//! the retry policy, parses and trims the response, and accumulates its own
//! [`AgentStats`]. Workers never communicate with each other; the
//! coordinator joins them.
//!
//! # Budget math
//!
//! Output length scales with `controls_in_batch * questions_per_control`, so
//! the batch size shrinks as the per-control question count grows — verbose
//! configurations get smaller sub-batches instead of truncating mid-response.

use std::sync::Arc;

use tracing::{info, warn};
use veris_core::domain::control::Control;
use veris_core::domain::llm::{
    GenerationClient, GenerationError, GenerationOutput, GenerationRequest, SystemBlock,
};
use veris_core::domain::question::ControlQuestions;
use veris_core::domain::retry::RetryPolicy;

use crate::application::{parser, prompt};
use crate::domain::swarm::AgentStats;

/// Hard ceiling on a single call's output tokens.
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Expected output tokens per generated question.
pub const TOKENS_PER_QUESTION: u32 = 60;

/// Output tokens for one control's envelope (ids, titles, framing).
pub const PER_CONTROL_OVERHEAD: u32 = 40;

/// Sub-batch size bounds.
pub const MIN_CONTROLS_PER_CALL: usize = 5;
pub const MAX_CONTROLS_PER_CALL: usize = 30;

/// Floor on a single call's output-token budget.
pub const MIN_CALL_TOKENS: u32 = 1024;

const USER_MESSAGE: &str =
    "Generate the compliance assessment questions for these specific controls.";

/// Largest sub-batch whose expected output fits the token ceiling with a 25%
/// safety margin. Monotonically non-increasing in `questions_per_control`.
pub fn effective_batch_size(questions_per_control: u32) -> usize {
    let per_control = questions_per_control.max(1) * TOKENS_PER_QUESTION;
    let max_controls = (MAX_OUTPUT_TOKENS * 3 / 4 / per_control) as usize;
    max_controls.clamp(MIN_CONTROLS_PER_CALL, MAX_CONTROLS_PER_CALL)
}

/// Output-token budget for one sub-batch: expected size plus a 50% margin,
/// never below the floor or above the model ceiling. Small batches get small
/// budgets instead of always requesting the maximum.
pub fn dynamic_max_tokens(controls_in_batch: usize, questions_per_control: u32) -> u32 {
    let per_control = questions_per_control.max(1) * TOKENS_PER_QUESTION + PER_CONTROL_OVERHEAD;
    let raw = controls_in_batch as u32 * per_control;
    (raw + raw / 2).clamp(MIN_CALL_TOKENS, MAX_OUTPUT_TOKENS)
}

/// A single worker generating questions for its assigned controls.
pub struct WorkerAgent {
    agent_id: usize,
    client: Arc<dyn GenerationClient>,
    model: String,
    retry: RetryPolicy,
}

impl WorkerAgent {
    pub fn new(
        agent_id: usize,
        client: Arc<dyn GenerationClient>,
        model: String,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            agent_id,
            client,
            model,
            retry,
        }
    }

    pub fn agent_id(&self) -> usize {
        self.agent_id
    }

    /// Generate questions for the assigned controls.
    ///
    /// A sub-batch that fails after retries records the error in the stats
    /// and the worker moves on to its remaining sub-batches; the worker
    /// itself never fails the run.
    pub async fn generate(
        &self,
        controls: &[Control],
        shared_context: &str,
        session_id: &str,
        questions_per_control: u32,
    ) -> (Vec<ControlQuestions>, AgentStats) {
        let mut stats = AgentStats::new(self.agent_id, controls.len());
        if controls.is_empty() {
            return (Vec::new(), stats);
        }

        let batch_size = effective_batch_size(questions_per_control);
        let sub_batch_count = controls.len().div_ceil(batch_size);
        let mut generated: Vec<ControlQuestions> = Vec::new();

        for (sub_idx, sub_batch) in controls.chunks(batch_size).enumerate() {
            let batch_text = prompt::format_batch_controls(sub_batch);
            let controls_section = prompt::build_controls_section(&batch_text);

            let request = GenerationRequest {
                model: self.model.clone(),
                max_tokens: dynamic_max_tokens(sub_batch.len(), questions_per_control),
                system: vec![
                    SystemBlock::cacheable(shared_context),
                    SystemBlock::plain(controls_section),
                ],
                user_message: USER_MESSAGE.to_string(),
            };

            match self.call_with_retry(request).await {
                Ok(output) => {
                    stats.input_tokens += output.usage.input_tokens;
                    stats.cache_read_tokens += output.usage.cache_read_tokens;
                    stats.output_tokens += output.usage.output_tokens;

                    let parsed = parser::parse_questions(&output.text, session_id);
                    let batch_questions: usize =
                        parsed.iter().map(|c| c.questions.len()).sum();
                    stats.controls_generated += parsed.len();
                    stats.questions_generated += batch_questions;

                    info!(
                        agent_id = self.agent_id,
                        sub_batch = sub_idx + 1,
                        sub_batches = sub_batch_count,
                        controls = parsed.len(),
                        questions = batch_questions,
                        input_tokens = output.usage.input_tokens,
                        cache_read_tokens = output.usage.cache_read_tokens,
                        output_tokens = output.usage.output_tokens,
                        "sub-batch complete"
                    );

                    generated.extend(parsed);
                }
                Err(e) => {
                    warn!(
                        agent_id = self.agent_id,
                        sub_batch = sub_idx + 1,
                        sub_batches = sub_batch_count,
                        error = %e,
                        "sub-batch failed"
                    );
                    stats.error = Some(e.to_string());
                }
            }
        }

        (generated, stats)
    }

    /// Issue one call under the retry policy. Only transient transport
    /// errors are retried; anything else propagates immediately.
    async fn call_with_retry(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.client.create(request.clone()).await {
                Ok(output) => return Ok(output),
                Err(e) => {
                    if !self.retry.should_retry(&e, attempt) {
                        return Err(e);
                    }
                    let delay = self.retry.backoff_for(attempt);
                    warn!(
                        agent_id = self.agent_id,
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient generation error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use veris_core::domain::llm::TokenUsage;

    fn make_controls(n: usize) -> Vec<Control> {
        (0..n)
            .map(|i| Control {
                id: format!("A.{}", i + 1),
                title: format!("Control {}", i + 1),
                framework: "ISO 27001".to_string(),
                description: format!("Description for control {}", i + 1),
                section_title: None,
                domain: None,
            })
            .collect()
    }

    fn sample_response() -> String {
        serde_json::json!([
            {
                "control_id": "A.1",
                "control_title": "Control 1",
                "framework": "ISO 27001",
                "questions": [
                    {
                        "id": "q-abc123",
                        "question": "Walk me through your last access review cycle.",
                        "category": "implementation",
                        "priority": "high",
                        "expected_evidence": "Access review records"
                    }
                ]
            }
        ])
        .to_string()
    }

    /// Scripted client: pops the next result per call, counting calls.
    struct ScriptedClient {
        results: Mutex<Vec<Result<GenerationOutput, GenerationError>>>,
        calls: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedClient {
        fn new(results: Vec<Result<GenerationOutput, GenerationError>>) -> Self {
            Self {
                results: Mutex::new(results),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn ok(text: &str) -> Result<GenerationOutput, GenerationError> {
            Ok(GenerationOutput {
                text: text.to_string(),
                usage: TokenUsage {
                    input_tokens: 1000,
                    output_tokens: 500,
                    cache_read_tokens: 800,
                },
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        async fn create(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationOutput, GenerationError> {
            self.calls.lock().unwrap().push(request);
            self.results.lock().unwrap().remove(0)
        }
    }

    fn worker(client: Arc<ScriptedClient>) -> WorkerAgent {
        WorkerAgent::new(
            0,
            client,
            "test-model".to_string(),
            RetryPolicy::immediate(3),
        )
    }

    // ── budget math ──────────────────────────────────────────────────────

    #[test]
    fn test_effective_batch_size_monotone_and_bounded() {
        let mut previous = usize::MAX;
        for qpc in 1..=10 {
            let size = effective_batch_size(qpc);
            assert!(size >= MIN_CONTROLS_PER_CALL);
            assert!(size <= MAX_CONTROLS_PER_CALL);
            assert!(size <= previous, "batch size must not grow with qpc");
            previous = size;
        }
    }

    #[test]
    fn test_effective_batch_size_shrinks_for_verbose_runs() {
        assert_eq!(effective_batch_size(2), 30); // 6144/120 = 51 -> capped
        assert_eq!(effective_batch_size(3), 30); // 6144/180 = 34 -> capped
        assert_eq!(effective_batch_size(5), 20); // 6144/300 = 20
        assert_eq!(effective_batch_size(10), 10); // 6144/600 = 10
    }

    #[test]
    fn test_dynamic_max_tokens_bounded() {
        for controls in [1usize, 5, 10, 30] {
            for qpc in 1..=10 {
                let budget = dynamic_max_tokens(controls, qpc);
                assert!(budget >= MIN_CALL_TOKENS);
                assert!(budget <= MAX_OUTPUT_TOKENS);
            }
        }
    }

    #[test]
    fn test_dynamic_max_tokens_scales_with_batch() {
        // 5 controls * (3*60+40) * 1.5 = 1650
        assert_eq!(dynamic_max_tokens(5, 3), 1650);
        // Small batches hit the floor.
        assert_eq!(dynamic_max_tokens(1, 2), MIN_CALL_TOKENS);
        // Large verbose batches hit the ceiling.
        assert_eq!(dynamic_max_tokens(30, 10), MAX_OUTPUT_TOKENS);
    }

    // ── generation ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_generate_single_batch() {
        let client = Arc::new(ScriptedClient::new(vec![ScriptedClient::ok(
            &sample_response(),
        )]));
        let (generated, stats) = worker(Arc::clone(&client))
            .generate(&make_controls(5), "shared context", "test-session", 3)
            .await;

        assert_eq!(generated.len(), 1);
        assert_eq!(stats.agent_id, 0);
        assert_eq!(stats.controls_assigned, 5);
        assert_eq!(stats.controls_generated, 1);
        assert_eq!(stats.questions_generated, 1);
        assert_eq!(stats.input_tokens, 1000);
        assert_eq!(stats.cache_read_tokens, 800);
        assert_eq!(stats.output_tokens, 500);
        assert!(stats.error.is_none());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_generate_marks_shared_block_cacheable() {
        let client = Arc::new(ScriptedClient::new(vec![ScriptedClient::ok(
            &sample_response(),
        )]));
        worker(Arc::clone(&client))
            .generate(&make_controls(3), "shared context", "test-session", 3)
            .await;

        let calls = client.calls.lock().unwrap();
        let system = &calls[0].system;
        assert_eq!(system.len(), 2);
        assert!(system[0].cacheable);
        assert_eq!(system[0].text, "shared context");
        assert!(!system[1].cacheable);
        assert!(system[1].text.contains("Controls to Process"));
        assert!(system[1].text.contains("**A.1**"));
    }

    #[tokio::test]
    async fn test_generate_empty_controls_makes_no_call() {
        let client = Arc::new(ScriptedClient::new(Vec::new()));
        let (generated, stats) = worker(Arc::clone(&client))
            .generate(&[], "shared", "test-session", 3)
            .await;

        assert!(generated.is_empty());
        assert_eq!(stats.controls_assigned, 0);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generate_sub_batches_large_assignments() {
        // 35 controls at 3 questions each -> batch size 30 -> 2 calls.
        let client = Arc::new(ScriptedClient::new(vec![
            ScriptedClient::ok(&sample_response()),
            ScriptedClient::ok(&sample_response()),
        ]));
        let (generated, stats) = worker(Arc::clone(&client))
            .generate(&make_controls(35), "shared", "test-session", 3)
            .await;

        assert_eq!(client.call_count(), 2);
        assert_eq!(generated.len(), 2);
        assert_eq!(stats.input_tokens, 2000);

        let calls = client.calls.lock().unwrap();
        assert!(calls[0].system[1].text.contains("**A.30**"));
        assert!(!calls[0].system[1].text.contains("**A.31**"));
        assert!(calls[1].system[1].text.contains("**A.31**"));
    }

    #[tokio::test]
    async fn test_generate_retries_transient_errors() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(GenerationError::RateLimit),
            Err(GenerationError::Timeout),
            ScriptedClient::ok(&sample_response()),
        ]));
        let (generated, stats) = worker(Arc::clone(&client))
            .generate(&make_controls(3), "shared", "test-session", 3)
            .await;

        assert_eq!(client.call_count(), 3);
        assert_eq!(generated.len(), 1);
        assert!(stats.error.is_none());
    }

    #[tokio::test]
    async fn test_generate_does_not_retry_fatal_errors() {
        let client = Arc::new(ScriptedClient::new(vec![Err(
            GenerationError::Authentication("denied".into()),
        )]));
        let (generated, stats) = worker(Arc::clone(&client))
            .generate(&make_controls(3), "shared", "test-session", 3)
            .await;

        assert_eq!(client.call_count(), 1);
        assert!(generated.is_empty());
        assert!(stats.error.as_deref().unwrap().contains("denied"));
    }

    #[tokio::test]
    async fn test_failed_sub_batch_does_not_abort_remaining() {
        // First sub-batch fails fatally; the second still runs and lands.
        let client = Arc::new(ScriptedClient::new(vec![
            Err(GenerationError::InvalidRequest("schema".into())),
            ScriptedClient::ok(&sample_response()),
        ]));
        let (generated, stats) = worker(Arc::clone(&client))
            .generate(&make_controls(35), "shared", "test-session", 3)
            .await;

        assert_eq!(client.call_count(), 2);
        assert_eq!(generated.len(), 1);
        assert!(stats.error.is_some());
        assert_eq!(stats.controls_generated, 1);
        assert_eq!(stats.input_tokens, 1000);
    }

    #[tokio::test]
    async fn test_retries_exhausted_surface_as_error() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(GenerationError::RateLimit),
            Err(GenerationError::RateLimit),
            Err(GenerationError::RateLimit),
        ]));
        let (generated, stats) = worker(Arc::clone(&client))
            .generate(&make_controls(3), "shared", "test-session", 3)
            .await;

        assert_eq!(client.call_count(), 3);
        assert!(generated.is_empty());
        assert!(stats.error.as_deref().unwrap().contains("Rate limit"));
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Coordinator
//!
//! Sizes the worker pool from the input, distributes controls round-robin,
//! builds the shared prompt block once, and runs the workers concurrently.
//!
//! Two execution modes share the same setup and converge to the same
//! [`SwarmResult`] shape:
//!
//! - [`SwarmCoordinator::generate`] joins all workers and aggregates.
//! - [`SwarmCoordinator::generate_stream`] drains a completion queue and
//!   emits a [`SwarmEvent`] pair per finishing worker.
//!
//! One worker's failure never cancels the others; it becomes an
//! [`AgentStats`] entry with `error` set. The only run-level failure is the
//! streaming queue-wait timeout, and even that is configurable.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use metrics::counter;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{error, info, warn};
use veris_core::domain::control::{AssessmentContext, Control};
use veris_core::domain::criteria::GenerationCriteria;
use veris_core::domain::llm::GenerationClient;
use veris_core::domain::question::ControlQuestions;
use veris_core::infrastructure::cache::PromptCache;

use crate::application::prompt;
use crate::application::worker::WorkerAgent;
use crate::domain::events::SwarmEvent;
use crate::domain::swarm::{
    worker_count_for, AgentStats, SwarmConfig, SwarmError, SwarmResult,
};

/// Message a worker pushes onto the completion queue when it finishes.
type WorkerCompletion = (usize, Vec<ControlQuestions>, AgentStats);

/// Coordinates worker agents generating questions in parallel.
pub struct SwarmCoordinator {
    client: Arc<dyn GenerationClient>,
    model: String,
    config: SwarmConfig,
    prompt_cache: Mutex<PromptCache>,
}

impl SwarmCoordinator {
    pub fn new(client: Arc<dyn GenerationClient>, model: impl Into<String>) -> Self {
        Self::with_config(client, model, SwarmConfig::default())
    }

    pub fn with_config(
        client: Arc<dyn GenerationClient>,
        model: impl Into<String>,
        config: SwarmConfig,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            config,
            prompt_cache: Mutex::new(PromptCache::default()),
        }
    }

    /// Swap in a caller-owned prompt cache (capacity/TTL under the caller's
    /// control).
    pub fn with_prompt_cache(mut self, cache: PromptCache) -> Self {
        self.prompt_cache = Mutex::new(cache);
        self
    }

    /// Round-robin distribution of controls across `worker_count` buckets.
    ///
    /// Bucket sizes differ by at most one and relative order is preserved
    /// within each bucket, regardless of input order.
    pub fn distribute_controls(controls: &[Control], worker_count: usize) -> Vec<Vec<Control>> {
        let mut buckets: Vec<Vec<Control>> = vec![Vec::new(); worker_count.max(1)];
        let len = buckets.len();
        for (i, control) in controls.iter().enumerate() {
            buckets[i % len].push(control.clone());
        }
        buckets
    }

    /// Run all workers in parallel and aggregate their results.
    pub async fn generate(
        &self,
        controls: &[Control],
        context: &AssessmentContext,
        criteria: &GenerationCriteria,
        session_id: &str,
    ) -> SwarmResult {
        if controls.is_empty() {
            info!(session_id, "no controls to process, returning empty result");
            return SwarmResult::default();
        }

        let worker_count = worker_count_for(controls.len(), self.config.max_workers);
        let buckets = Self::distribute_controls(controls, worker_count);
        let shared_context = self.shared_context(context, criteria);
        let questions_per_control = criteria.effective_questions_per_control();

        info!(
            session_id,
            controls = controls.len(),
            workers = worker_count,
            bucket_sizes = ?buckets.iter().map(Vec::len).collect::<Vec<_>>(),
            "swarm starting"
        );

        let workers: Vec<WorkerAgent> = (0..worker_count).map(|id| self.worker(id)).collect();
        let tasks = workers.iter().zip(&buckets).map(|(worker, bucket)| {
            worker.generate(bucket, &shared_context, session_id, questions_per_control)
        });
        let results = join_all(tasks).await;

        let mut swarm_result = SwarmResult::default();
        for (generated, stats) in results {
            if let Some(err) = &stats.error {
                error!(session_id, agent_id = stats.agent_id, error = %err, "agent reported an error");
            }
            swarm_result.absorb(generated, stats);
        }

        self.record_completion(session_id, &swarm_result);
        swarm_result
    }

    /// Run all workers in parallel, emitting progress events as each one
    /// finishes.
    ///
    /// Event order across workers is first-to-finish. The terminal
    /// `complete` frame is the calling layer's job; on success this returns
    /// the same [`SwarmResult`] shape batch mode produces.
    pub async fn generate_stream(
        &self,
        controls: &[Control],
        context: &AssessmentContext,
        criteria: &GenerationCriteria,
        session_id: &str,
        events: mpsc::Sender<SwarmEvent>,
    ) -> Result<SwarmResult, SwarmError> {
        let worker_count = worker_count_for(controls.len(), self.config.max_workers);
        let total_controls = controls.len();

        // Initial zero progress so consumers can render immediately.
        let _ = events
            .send(SwarmEvent::Progress {
                batch: 0,
                total: worker_count,
                controls_done: 0,
                total_controls,
                agent_id: None,
                agents_complete: 0,
                total_agents: worker_count,
            })
            .await;

        if controls.is_empty() {
            info!(session_id, "no controls to process, stream is a no-op");
            return Ok(SwarmResult::default());
        }

        let buckets = Self::distribute_controls(controls, worker_count);
        let bucket_sizes: Vec<usize> = buckets.iter().map(Vec::len).collect();
        let shared_context = self.shared_context(context, criteria);
        let questions_per_control = criteria.effective_questions_per_control();

        info!(
            session_id,
            controls = total_controls,
            workers = worker_count,
            "swarm stream starting"
        );

        let (done_tx, mut done_rx) = mpsc::channel::<WorkerCompletion>(worker_count);
        for (agent_id, bucket) in buckets.into_iter().enumerate() {
            let worker = self.worker(agent_id);
            let tx = done_tx.clone();
            let shared = shared_context.clone();
            let session = session_id.to_string();
            tokio::spawn(async move {
                let (generated, stats) = worker
                    .generate(&bucket, &shared, &session, questions_per_control)
                    .await;
                let _ = tx.send((agent_id, generated, stats)).await;
            });
        }
        drop(done_tx);

        let mut agents_complete = 0;
        let mut controls_done = 0;
        let mut result = SwarmResult::default();

        while agents_complete < worker_count {
            let completion = match timeout(self.config.stream_wait_timeout, done_rx.recv()).await
            {
                Ok(Some(completion)) => completion,
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        session_id,
                        waited_secs = self.config.stream_wait_timeout.as_secs(),
                        agents_complete,
                        total_agents = worker_count,
                        "timed out waiting for worker completion"
                    );
                    let _ = events
                        .send(SwarmEvent::Error {
                            error: "Agent processing timed out".to_string(),
                        })
                        .await;

                    if self.config.abort_stream_on_timeout {
                        // Fail fast: in-flight workers are abandoned, not
                        // cancelled, and the stream ends here.
                        return Err(SwarmError::StreamTimeout);
                    }

                    // Isolation mode: every unreported worker becomes a
                    // timed-out stats entry and the partial aggregate stands.
                    let reported: Vec<usize> =
                        result.agent_stats.iter().map(|s| s.agent_id).collect();
                    for agent_id in (0..worker_count).filter(|id| !reported.contains(id)) {
                        result.absorb(
                            Vec::new(),
                            AgentStats::failed(
                                agent_id,
                                bucket_sizes[agent_id],
                                "timed out waiting for completion",
                            ),
                        );
                    }
                    break;
                }
            };

            let (agent_id, generated, stats) = completion;
            agents_complete += 1;
            controls_done += stats.controls_generated;

            let _ = events
                .send(SwarmEvent::AgentComplete {
                    agent_id,
                    agent_label: format!("Agent {}", agent_id + 1),
                    controls_generated: stats.controls_generated,
                    questions_generated: stats.questions_generated,
                })
                .await;
            let _ = events
                .send(SwarmEvent::Progress {
                    batch: agents_complete,
                    total: worker_count,
                    controls_done,
                    total_controls,
                    agent_id: Some(agent_id),
                    agents_complete,
                    total_agents: worker_count,
                })
                .await;

            result.absorb(generated, stats);
        }

        self.record_completion(session_id, &result);
        Ok(result)
    }

    fn worker(&self, agent_id: usize) -> WorkerAgent {
        WorkerAgent::new(
            agent_id,
            Arc::clone(&self.client),
            self.model.clone(),
            self.config.retry.clone(),
        )
    }

    /// Build (or reuse) the shared prompt block for this context/criteria
    /// pair. The cache key covers everything the block depends on, so a hit
    /// is byte-identical to a rebuild.
    fn shared_context(
        &self,
        context: &AssessmentContext,
        criteria: &GenerationCriteria,
    ) -> String {
        let key = prompt_cache_key(context, criteria);
        let mut cache = match self.prompt_cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(cached) = cache.get(key) {
            return cached;
        }
        let built = prompt::build_shared_context(context, criteria);
        cache.insert(key, built.clone());
        built
    }

    fn record_completion(&self, session_id: &str, result: &SwarmResult) {
        counter!("veris_swarm_controls_generated_total")
            .increment(result.controls.len() as u64);
        counter!("veris_swarm_questions_generated_total")
            .increment(result.total_questions() as u64);
        counter!("veris_swarm_output_tokens_total").increment(result.total_output_tokens);

        info!(
            session_id,
            controls = result.controls.len(),
            questions = result.total_questions(),
            input_tokens = result.total_input_tokens,
            cache_read_tokens = result.total_cache_read_tokens,
            output_tokens = result.total_output_tokens,
            "swarm complete"
        );
    }
}

fn prompt_cache_key(context: &AssessmentContext, criteria: &GenerationCriteria) -> u64 {
    let mut hasher = DefaultHasher::new();
    serde_json::to_string(context).unwrap_or_default().hash(&mut hasher);
    serde_json::to_string(criteria).unwrap_or_default().hash(&mut hasher);
    hasher.finish()
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Aggregates
//!
//! Result and telemetry types for one generation run:
//!
//! - [`AgentStats`] — per-worker telemetry, owned by exactly one worker.
//! - [`SwarmResult`] — aggregate built by the coordinator as workers finish.
//! - [`SwarmConfig`] — pool tuning knobs (plain values, no file loading).
//!
//! # Invariants
//!
//! - `SwarmResult` token totals equal the sum of the same field across all
//!   `agent_stats` entries.
//! - A control contributes at most one `ControlQuestions` entry; parse
//!   failures drop controls, they never duplicate them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use veris_core::domain::question::ControlQuestions;
use veris_core::domain::retry::RetryPolicy;

/// Upper bound on the worker pool when the input is large enough to want it.
pub const DEFAULT_MAX_WORKERS: usize = 6;

/// How long the streaming consumer waits for any worker to report before
/// declaring the run stuck.
pub const DEFAULT_STREAM_WAIT_TIMEOUT: Duration = Duration::from_secs(90);

/// Per-agent generation statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    pub agent_id: usize,
    pub controls_assigned: usize,
    pub controls_generated: usize,
    pub questions_generated: usize,
    pub input_tokens: u64,
    pub cache_read_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentStats {
    pub fn new(agent_id: usize, controls_assigned: usize) -> Self {
        Self {
            agent_id,
            controls_assigned,
            ..Self::default()
        }
    }

    /// Stats for a worker that produced nothing because of `error`.
    pub fn failed(agent_id: usize, controls_assigned: usize, error: impl Into<String>) -> Self {
        Self {
            agent_id,
            controls_assigned,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Aggregated results from all workers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmResult {
    pub controls: Vec<ControlQuestions>,
    pub agent_stats: Vec<AgentStats>,
    pub total_input_tokens: u64,
    pub total_cache_read_tokens: u64,
    pub total_output_tokens: u64,
}

impl SwarmResult {
    /// Fold one worker's contribution into the aggregate.
    pub fn absorb(&mut self, generated: Vec<ControlQuestions>, stats: AgentStats) {
        self.total_input_tokens += stats.input_tokens;
        self.total_cache_read_tokens += stats.cache_read_tokens;
        self.total_output_tokens += stats.output_tokens;
        self.controls.extend(generated);
        self.agent_stats.push(stats);
    }

    pub fn total_questions(&self) -> usize {
        self.controls.iter().map(|c| c.questions.len()).sum()
    }
}

/// Swarm tuning knobs.
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    pub max_workers: usize,
    /// Bound on each streaming-mode wait for a worker completion.
    pub stream_wait_timeout: Duration,
    /// When a streaming wait expires: `true` aborts the whole stream (fail
    /// fast for interactive consumers), `false` marks every unreported
    /// worker as timed out and finishes with the partial aggregate.
    pub abort_stream_on_timeout: bool,
    pub retry: RetryPolicy,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            stream_wait_timeout: DEFAULT_STREAM_WAIT_TIMEOUT,
            abort_stream_on_timeout: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// Errors that can end a swarm run as a whole.
///
/// Individual worker failures never surface here; they are recorded in the
/// worker's [`AgentStats`] instead.
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("timed out waiting for a worker to report completion")]
    StreamTimeout,
}

/// Select the worker-pool size for an input of `control_count` controls.
///
/// Below the thresholds, per-call fixed overhead (connection setup, shared
/// context re-transmission on cache misses) dominates, so fewer, larger
/// workers win; above them, parallelism buys more wall-clock than the
/// overhead costs.
pub fn worker_count_for(control_count: usize, max_workers: usize) -> usize {
    let stepped = match control_count {
        0..=9 => 2,
        10..=29 => 3,
        30..=59 => 4,
        _ => max_workers,
    };
    stepped.clamp(1, max_workers.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_step_function() {
        assert_eq!(worker_count_for(0, 6), 2);
        assert_eq!(worker_count_for(9, 6), 2);
        assert_eq!(worker_count_for(10, 6), 3);
        assert_eq!(worker_count_for(29, 6), 3);
        assert_eq!(worker_count_for(30, 6), 4);
        assert_eq!(worker_count_for(59, 6), 4);
        assert_eq!(worker_count_for(60, 6), 6);
        assert_eq!(worker_count_for(500, 6), 6);
    }

    #[test]
    fn test_worker_count_respects_configured_maximum() {
        assert_eq!(worker_count_for(100, 3), 3);
        assert_eq!(worker_count_for(5, 1), 1);
        assert_eq!(worker_count_for(100, 8), 8);
    }

    #[test]
    fn test_absorb_sums_token_counters() {
        let mut result = SwarmResult::default();
        let mut stats_a = AgentStats::new(0, 4);
        stats_a.input_tokens = 1000;
        stats_a.cache_read_tokens = 800;
        stats_a.output_tokens = 500;
        let mut stats_b = AgentStats::new(1, 4);
        stats_b.input_tokens = 900;
        stats_b.output_tokens = 400;

        result.absorb(Vec::new(), stats_a);
        result.absorb(Vec::new(), stats_b);

        assert_eq!(result.total_input_tokens, 1900);
        assert_eq!(result.total_cache_read_tokens, 800);
        assert_eq!(result.total_output_tokens, 900);
        assert_eq!(result.agent_stats.len(), 2);
    }

    #[test]
    fn test_failed_stats_carry_error() {
        let stats = AgentStats::failed(2, 10, "API exhausted retries");
        assert_eq!(stats.agent_id, 2);
        assert_eq!(stats.controls_assigned, 10);
        assert_eq!(stats.controls_generated, 0);
        assert_eq!(stats.error.as_deref(), Some("API exhausted retries"));
    }
}

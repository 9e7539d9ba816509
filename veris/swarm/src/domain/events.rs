// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Progress Events
//!
//! Events emitted while a generation run streams progress to a consumer.
//! Ordering is first-to-finish across workers and deterministic within one
//! worker's events. Wire framing lives in `presentation::sse`, not here.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Progress event for one streaming generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwarmEvent {
    /// Cumulative totals. Emitted once with zeros before any worker
    /// finishes, then after every worker completion.
    Progress {
        batch: usize,
        total: usize,
        controls_done: usize,
        total_controls: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<usize>,
        agents_complete: usize,
        total_agents: usize,
    },
    /// One worker finished (successfully or with a recorded error).
    AgentComplete {
        agent_id: usize,
        agent_label: String,
        controls_generated: usize,
        questions_generated: usize,
    },
    /// Fatal: the run cannot continue. Terminal when emitted.
    Error { error: String },
}

impl SwarmEvent {
    /// Wire name used by the SSE framing layer.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::AgentComplete { .. } => "agent_complete",
            Self::Error { .. } => "error",
        }
    }
}

/// Channel pair connecting a streaming run to its consumer.
///
/// The receiver side is wrapped as a `Stream` so callers can plug it straight
/// into an SSE response body.
pub fn event_channel(capacity: usize) -> (mpsc::Sender<SwarmEvent>, ReceiverStream<SwarmEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, ReceiverStream::new(rx))
}

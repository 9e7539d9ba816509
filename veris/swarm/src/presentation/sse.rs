// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Server-Sent-Event Framing
//!
//! Wire-format concerns for streaming consumers. Coordination code emits
//! [`SwarmEvent`] values; this module turns them into
//! `event: <name>\ndata: <json>\n\n` frames. The terminal `complete` frame
//! carries the full serialized [`SwarmResult`] and is emitted by the calling
//! layer once streaming finishes successfully.

use serde_json::{json, Value};

use crate::domain::events::SwarmEvent;
use crate::domain::swarm::SwarmResult;

/// One wire event: a name plus a JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: Value,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Serialize to SSE framing.
    pub fn to_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

impl From<&SwarmEvent> for SseEvent {
    fn from(event: &SwarmEvent) -> Self {
        let data = match event {
            SwarmEvent::Progress {
                batch,
                total,
                controls_done,
                total_controls,
                agent_id,
                agents_complete,
                total_agents,
            } => {
                let mut data = json!({
                    "batch": batch,
                    "total": total,
                    "controls_done": controls_done,
                    "total_controls": total_controls,
                    "agents_complete": agents_complete,
                    "total_agents": total_agents,
                });
                if let Some(agent_id) = agent_id {
                    data["agent_id"] = json!(agent_id);
                }
                data
            }
            SwarmEvent::AgentComplete {
                agent_id,
                agent_label,
                controls_generated,
                questions_generated,
            } => json!({
                "agent_id": agent_id,
                "agent_label": agent_label,
                "controls_generated": controls_generated,
                "questions_generated": questions_generated,
            }),
            SwarmEvent::Error { error } => json!({ "error": error }),
        };

        Self::new(event.name(), data)
    }
}

/// Frame one swarm event for the wire.
pub fn event_frame(event: &SwarmEvent) -> String {
    SseEvent::from(event).to_frame()
}

/// Terminal frame carrying the full aggregated result.
pub fn complete_frame(result: &SwarmResult) -> String {
    let data = serde_json::to_value(result).unwrap_or_else(|_| json!({}));
    SseEvent::new("complete", data).to_frame()
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod events;
pub mod swarm;

pub use events::{event_channel, SwarmEvent};
pub use swarm::{worker_count_for, AgentStats, SwarmConfig, SwarmError, SwarmResult};

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Question-Generation Swarm
//!
//! Coordinates a pool of worker agents that generate compliance assessment
//! questions in parallel. The shared prompt prefix is cached at the
//! transport layer, so adding workers costs a fraction of the first call.
//!
//! - [`SwarmCoordinator`] — pool sizing, distribution, batch and streaming runs.
//! - [`WorkerAgent`] — token-budgeted sub-batching and retrying generation calls.
//! - [`application::parser`] — truncation-tolerant response parsing.
//! - [`application::prompt`] — the shared/per-worker prompt partition.

pub mod application;
pub mod domain;
pub mod presentation;

pub use application::coordinator::SwarmCoordinator;
pub use application::worker::WorkerAgent;
pub use domain::events::{event_channel, SwarmEvent};
pub use domain::swarm::{worker_count_for, AgentStats, SwarmConfig, SwarmError, SwarmResult};

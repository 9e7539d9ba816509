// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod coordinator;
pub mod parser;
pub mod prompt;
pub mod worker;

pub use coordinator::SwarmCoordinator;
pub use worker::WorkerAgent;

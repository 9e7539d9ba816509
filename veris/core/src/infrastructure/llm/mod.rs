// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Generation Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between our domain interface and an external API.

pub mod anthropic;

pub use anthropic::AnthropicAdapter;

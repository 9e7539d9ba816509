// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Provides llm functionality for the system.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements llm

// Generation Provider Domain Interface (Anti-Corruption Layer)
//
// Defines the domain interface for question-generation endpoints.
// Prevents vendor lock-in by abstracting external LLM APIs.
//
// Implementations in infrastructure/llm/ directory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One block of the system prompt.
///
/// Blocks marked `cacheable` must be byte-identical across the calls that
/// want to share a transport-level cache entry; the per-worker controls
/// section is therefore always a separate, non-cacheable block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemBlock {
    pub text: String,
    pub cacheable: bool,
}

impl SystemBlock {
    pub fn cacheable(text: impl Into<String>) -> Self {
        Self { text: text.into(), cacheable: true }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), cacheable: false }
    }
}

/// A single generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    /// Output-token budget for this call.
    pub max_tokens: u32,
    /// Ordered system blocks; the cacheable shared block comes first.
    pub system: Vec<SystemBlock>,
    pub user_message: String,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Input tokens served from the provider's prompt cache.
    pub cache_read_tokens: u64,
}

/// The provider's answer to one generation call.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub text: String,
    pub usage: TokenUsage,
}

/// Errors that can occur during generation calls.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Request timed out")]
    Timeout,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl GenerationError {
    /// Transient failures are worth retrying; everything else fails fast.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Timeout)
    }
}

/// Domain interface for generation endpoints.
/// Anti-Corruption Layer that isolates swarm logic from vendor APIs.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Issue one generation call and return the raw text plus usage.
    async fn create(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError>;
}

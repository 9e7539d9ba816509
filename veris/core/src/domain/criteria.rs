// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Generation Criteria
//!
//! Typed configuration gathered by the interview layer before a swarm run.
//! Replaces the loose key/value criteria bag with named, validated fields:
//! the enums are the vocabulary, and [`GenerationCriteria::effective_questions_per_control`]
//! resolves the one number the token-budget math needs.

use serde::{Deserialize, Serialize};

/// Question-count bounds accepted for an explicit per-control override.
const MIN_QUESTIONS_PER_CONTROL: u32 = 1;
const MAX_QUESTIONS_PER_CONTROL: u32 = 10;

/// How established the organization's ISMS is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaturityLevel {
    FirstTimeAudit,
    #[default]
    RecurringAssessment,
    MatureIsms,
}

/// How deep the generated questions should probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionDepth {
    HighLevelOverview,
    #[default]
    Balanced,
    DetailedTechnical,
}

impl QuestionDepth {
    /// Default question count for this depth when no explicit override is set.
    pub fn questions_per_control(self) -> u32 {
        match self {
            Self::HighLevelOverview => 2,
            Self::Balanced => 3,
            Self::DetailedTechnical => 5,
        }
    }
}

/// Criteria driving one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationCriteria {
    #[serde(default)]
    pub maturity_level: MaturityLevel,
    #[serde(default)]
    pub question_depth: QuestionDepth,
    /// Explicit question count; overrides the depth mapping when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions_per_control: Option<u32>,
    /// Domains that deserve more detailed questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_domains: Option<Vec<String>>,
    /// Free-text gaps the customer already knows about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_concerns: Option<String>,
    /// Free-text controls to de-emphasize.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controls_to_skip: Option<String>,
}

impl GenerationCriteria {
    /// Resolve the question count used for prompting and token budgeting.
    ///
    /// An explicit override is clamped into `[1, 10]`; otherwise the depth
    /// mapping decides.
    pub fn effective_questions_per_control(&self) -> u32 {
        match self.questions_per_control {
            Some(n) => n.clamp(MIN_QUESTIONS_PER_CONTROL, MAX_QUESTIONS_PER_CONTROL),
            None => self.question_depth.questions_per_control(),
        }
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Generated Question Aggregates
//!
//! Output value objects of a generation run:
//!
//! - [`GeneratedQuestion`] — one assessment question with its metadata.
//! - [`ControlQuestions`] — the ordered question set for one control.
//!
//! The category and priority vocabularies are fixed by the output schema the
//! model is instructed to follow; lenient parsing maps anything the model
//! improvises back into the fixed set.

use serde::{Deserialize, Serialize};

/// Question perspective, fixed by the output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    PolicyExistence,
    Implementation,
    Monitoring,
    Effectiveness,
    Documentation,
}

impl QuestionCategory {
    /// Map a model-supplied label into the fixed set.
    ///
    /// Unknown labels fall back to `Implementation`, the broadest of the
    /// five perspectives.
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "policy_existence" => Self::PolicyExistence,
            "implementation" => Self::Implementation,
            "monitoring" => Self::Monitoring,
            "effectiveness" => Self::Effectiveness,
            "documentation" => Self::Documentation,
            _ => Self::Implementation,
        }
    }
}

/// Assessment priority assigned by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl QuestionPriority {
    /// Map a model-supplied label into the fixed set; unknown labels default
    /// to `Medium`.
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// A single generated compliance question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub id: String,
    pub question: String,
    pub category: QuestionCategory,
    pub priority: QuestionPriority,
    /// Short evidence tag, e.g. "Reconciliation reports".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_evidence: Option<String>,
}

/// Questions generated for one framework control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlQuestions {
    pub control_id: String,
    pub control_title: String,
    pub framework: String,
    pub questions: Vec<GeneratedQuestion>,
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Control Catalog Inputs
//!
//! Input value objects for a generation run:
//!
//! - [`Control`] — one compliance requirement pulled from a framework catalog.
//! - [`AssessmentContext`] — organization facts passed through to prompt text.
//!
//! Both are produced upstream (catalog fetch, interview layer) and are
//! read-only to the swarm.

use serde::{Deserialize, Serialize};

/// A single compliance requirement that needs assessment questions.
///
/// # Invariants
///
/// - A control entering a swarm run is assigned to exactly one worker and
///   appears in at most one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    /// Catalog identifier, e.g. `A.5.1`.
    pub id: String,
    pub title: String,
    /// Framework tag, e.g. `ISO 27001`.
    pub framework: String,
    pub description: String,
    /// Section the control belongs to, when the catalog provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    /// Security domain grouping, when the catalog provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Organization context consumed only by the prompt builder.
///
/// Kept deliberately narrow: the swarm never branches on these values, it
/// only interpolates them into the shared prompt block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

impl AssessmentContext {
    pub fn organization_name(&self) -> &str {
        self.organization_name.as_deref().unwrap_or("the organization")
    }

    pub fn industry(&self) -> &str {
        self.industry.as_deref().unwrap_or("unspecified")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_round_trips_optional_fields() {
        let control = Control {
            id: "A.5.1".to_string(),
            title: "Policies for information security".to_string(),
            framework: "ISO 27001".to_string(),
            description: "Management direction for information security.".to_string(),
            section_title: Some("Organizational controls".to_string()),
            domain: None,
        };
        let json = serde_json::to_string(&control).unwrap();
        assert!(!json.contains("\"domain\""));
        let back: Control = serde_json::from_str(&json).unwrap();
        assert_eq!(back, control);
    }

    #[test]
    fn test_context_defaults() {
        let ctx = AssessmentContext::default();
        assert_eq!(ctx.organization_name(), "the organization");
        assert_eq!(ctx.industry(), "unspecified");
    }
}

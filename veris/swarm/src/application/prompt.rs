// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Prompt Partition Builder
//!
//! Splits the system prompt into the cacheable shared block and the
//! per-worker controls block.
//!
//! The shared block depends only on context and criteria, so it is
//! byte-identical across every worker of one run — that is the whole caching
//! contract. Worker 1 pays full input cost; workers 2..n read the cached
//! prefix at a steep discount. Anything that varies per worker must go
//! through [`build_controls_section`] instead; mixing it into the shared
//! block silently destroys the cache hit without any functional error.

use veris_core::domain::control::{AssessmentContext, Control};
use veris_core::domain::criteria::{GenerationCriteria, MaturityLevel, QuestionDepth};

/// Build the cacheable shared portion of the system prompt.
///
/// Identical across all workers in one run; marked cacheable at the
/// transport layer.
pub fn build_shared_context(context: &AssessmentContext, criteria: &GenerationCriteria) -> String {
    let org_name = context.organization_name();
    let industry = context.industry();

    let question_count = match criteria.questions_per_control {
        Some(_) => format!(
            "{} questions per control",
            criteria.effective_questions_per_control()
        ),
        None => depth_label(criteria.question_depth).to_string(),
    };

    let maturity_guidance = maturity_guidance(criteria.maturity_level);
    let maturity_title = maturity_title(criteria.maturity_level);

    let mut optional_sections = String::new();
    if let Some(domains) = criteria
        .priority_domains
        .as_ref()
        .filter(|d| !d.is_empty())
    {
        optional_sections.push_str(&format!(
            "\n\n## Priority Focus Areas\nMore detailed questions for: {}.",
            domains.join(", ")
        ));
    }
    if let Some(concerns) = criteria.compliance_concerns.as_deref() {
        optional_sections.push_str(&format!(
            "\n\n## Compliance Concerns\nAddress these gaps: {}",
            concerns
        ));
    }
    if let Some(skip) = criteria.controls_to_skip.as_deref() {
        optional_sections.push_str(&format!(
            "\n\n## De-emphasized Controls\n1 basic question for: {}.",
            skip
        ));
    }

    format!(
        r#"You are a senior GRC professional with 20+ years of audit experience across regulated industries. You write questions that probe implementation depth, demand evidence of real practice, and expose gaps that checklist audits miss. You use precise domain terminology naturally.

Organization: {org_name} ({industry})
Maturity: {maturity_title}
Depth: {question_count}

## Question Craft — Professional Audit Technique
1. MAX 45 WORDS per question — concise but substantive
2. ONE sentence, ONE control aspect per question — never combine topics
3. Use precise GRC terminology ({industry}-appropriate where possible)
4. Specific to {org_name} where possible

## Question Styles (vary across these)
- **Scenario-based**: "Walk me through...", "Describe what happens when...", "How did your last..."
- **Evidence-probing**: "What evidence demonstrates...", "Show me how you validate...", "What artifacts confirm..."
- **Implementation-depth**: "How do you reconcile...", "What is the handoff between...", "How does [X] integrate with..."
- **Failure-mode**: "When was the last time [control] failed, and how was it escalated?", "What happens if..."
- **Effectiveness**: "How do you measure whether...", "What metrics indicate...", "What was the trend in..."

## Examples

GOOD (senior GRC voice):
Control: "Access Control Policy"
- "Walk me through how a contractor's access is provisioned on day one and fully revoked upon engagement termination." -> evidence: "Provisioning workflow, offboarding logs"
- "How do you reconcile access entitlements across HR systems, IAM platforms, and downstream applications during role transfers?" -> evidence: "Reconciliation reports, IAM logs"
- "What was the exception rate in your last access certification cycle, and how were exceptions resolved?" -> evidence: "Certification results, exception tracker"

BAD (junior checklist — avoid these patterns):
- "Do you have a documented access control policy?" (existence check, no depth)
- "Are access reviews conducted regularly?" (vague, yes/no)
- "Is there a process for revoking access?" (binary, no implementation detail)

Guidance: {maturity_guidance}{optional_sections}

## JSON Output (ONLY this format)
[
  {{
    "control_id": "ID",
    "control_title": "Title",
    "framework": "Framework Name",
    "questions": [
      {{
        "id": "q-<unique-id>",
        "question": "Professional audit question under 45 words",
        "category": "policy_existence|implementation|monitoring|effectiveness|documentation",
        "priority": "high|medium|low",
        "expected_evidence": "2-6 word evidence tag, e.g. Reconciliation reports, Incident post-mortems, Board risk minutes"
      }}
    ]
  }}
]"#
    )
}

/// Build the per-worker controls portion of the system prompt.
///
/// Unique to each worker and never cached.
pub fn build_controls_section(batch_controls_text: &str) -> String {
    format!("## Controls to Process\n{batch_controls_text}")
}

/// Format one sub-batch of controls into prompt text.
pub fn format_batch_controls(batch: &[Control]) -> String {
    batch
        .iter()
        .map(|c| {
            let section = c
                .section_title
                .as_deref()
                .map(|s| format!(" ({s})"))
                .unwrap_or_default();
            format!(
                "- **{}** [{}]{}: {} — {}",
                c.id, c.framework, section, c.title, c.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn depth_label(depth: QuestionDepth) -> &'static str {
    match depth {
        QuestionDepth::HighLevelOverview => "2 questions per control",
        QuestionDepth::Balanced => "3 questions per control",
        QuestionDepth::DetailedTechnical => "4-5 questions per control",
    }
}

fn maturity_title(level: MaturityLevel) -> &'static str {
    match level {
        MaturityLevel::FirstTimeAudit => "First Time Audit",
        MaturityLevel::RecurringAssessment => "Recurring Assessment",
        MaturityLevel::MatureIsms => "Mature ISMS",
    }
}

fn maturity_guidance(level: MaturityLevel) -> &'static str {
    match level {
        MaturityLevel::FirstTimeAudit => {
            "Organization is establishing its ISMS. Probe governance foundations: \
             risk ownership and accountability structures, policy approval chains, \
             asset inventory completeness, and initial risk assessment methodology. \
             Ask how controls were selected and what gaps were identified during scoping. \
             Still use professional tone — avoid simplistic 'do you have' questions."
        }
        MaturityLevel::RecurringAssessment => {
            "Organization has an established ISMS. Probe operational effectiveness: \
             control testing evidence and exception handling, incident response \
             lessons learned, metrics-driven validation of control performance, \
             management review outputs, and corrective action closure rates. \
             Ask for trend data and root cause analysis."
        }
        MaturityLevel::MatureIsms => {
            "Organization has a mature ISMS. Probe optimization and strategic integration: \
             benchmarking against industry peers, automation ROI on compliance processes, \
             threat-informed defense prioritization, integration with enterprise risk \
             management and business continuity, board-level risk reporting, and \
             how the ISMS drives competitive advantage."
        }
    }
}

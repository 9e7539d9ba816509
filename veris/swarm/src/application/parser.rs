// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Response Parser & Repair
//!
//! Turns raw model output into [`ControlQuestions`]. Parse failures are a
//! data-quality signal, not a fatal condition: the worst case is an empty
//! list and a log line, never an error.
//!
//! Extraction tries, in order: a fenced code block, balanced-bracket
//! matching from the first `[`, then the span from the first `[` to the last
//! `]`. A candidate that fails to parse goes through the repair cascade,
//! which cuts the text back to the last complete-object boundary and closes
//! the array. Truncated tail elements are dropped, never fabricated.

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;
use veris_core::domain::question::{
    ControlQuestions, GeneratedQuestion, QuestionCategory, QuestionPriority,
};

/// Hard ceiling on question length, enforced after parsing.
pub const QUESTION_WORD_LIMIT: usize = 50;

/// Hard ceiling on the expected-evidence tag.
pub const EVIDENCE_WORD_LIMIT: usize = 8;

/// Bound on the backward walk through object boundaries during repair.
const REPAIR_WALK_LIMIT: usize = 20;

/// Extract the questions array from raw model output.
///
/// Returns an empty list when nothing salvageable is found; the containing
/// controls are simply dropped from the run's result.
pub fn parse_questions(text: &str, session_id: &str) -> Vec<ControlQuestions> {
    let trimmed = text.trim();
    let Some(json_str) = extract_json_array(trimmed) else {
        warn!(session_id, "could not locate a JSON array in model output");
        return Vec::new();
    };

    let value = match serde_json::from_str::<Value>(&json_str) {
        Ok(v) => v,
        Err(parse_err) => {
            // Repair the full span from the first bracket first: the
            // fallback extraction cuts at the last `]`, which can drop a
            // complete trailing object's closing brace and shrink what the
            // cascade can recover.
            let repaired = trimmed
                .find('[')
                .and_then(|start| repair_truncated_array(&trimmed[start..]))
                .or_else(|| repair_truncated_array(&json_str));
            match repaired {
                Some(v) => {
                    debug!(session_id, "recovered a truncated questions array");
                    v
                }
                None => {
                    warn!(session_id, error = %parse_err, "unrecoverable model output");
                    return Vec::new();
                }
            }
        }
    };

    let Some(items) = value.as_array() else {
        warn!(session_id, "extracted JSON was not an array");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(map_control)
        .map(enforce_limits)
        .collect()
}

/// Find the outermost JSON array in a text blob.
fn extract_json_array(text: &str) -> Option<String> {
    let text = text.trim();

    // Fenced code block first: the model usually wraps its answer.
    if let Ok(fence) = Regex::new(r"(?is)```(?:json)?\s*(\[.*?\])\s*```") {
        if let Some(captures) = fence.captures(text) {
            return Some(captures[1].to_string());
        }
    }

    // Bracket matching from the first opening bracket.
    let start = text.find('[')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }

    // Last resort: first `[` to the last `]` anywhere after it.
    let end = text.rfind(']')?;
    (end > start).then(|| text[start..=end].to_string())
}

/// Repair cascade for output cut off mid-array (usually mid-string).
///
/// Each strategy truncates at an object boundary, closes the array, and is
/// validated by a real parse before being accepted.
fn repair_truncated_array(json_str: &str) -> Option<Value> {
    let open = json_str.find('[')?;

    // End of the last complete object.
    if let Some(pos) = json_str.rfind("},") {
        if let Some(value) = close_at(json_str, pos + 1) {
            return Some(value);
        }
    }

    // Last closing brace after the opening bracket.
    if let Some(pos) = json_str.rfind('}') {
        if pos > open {
            if let Some(value) = close_at(json_str, pos + 1) {
                return Some(value);
            }
        }
    }

    // Walk back through earlier boundaries: a cut inside a string value can
    // leave unbalanced quotes that defeat the last-boundary cuts above.
    let mut cursor = json_str.rfind("},");
    let mut steps = 0;
    while let Some(pos) = cursor {
        if steps >= REPAIR_WALK_LIMIT {
            break;
        }
        if let Some(value) = close_at(json_str, pos + 1) {
            return Some(value);
        }
        cursor = json_str[..pos].rfind("},");
        steps += 1;
    }

    None
}

fn close_at(json_str: &str, end: usize) -> Option<Value> {
    if !json_str.is_char_boundary(end) {
        return None;
    }
    let mut candidate = json_str[..end].to_string();
    candidate.push(']');
    serde_json::from_str(&candidate).ok()
}

/// Map one parsed object to a `ControlQuestions`, defaulting missing fields
/// instead of rejecting the object. The model's `guidance_notes`, when
/// present, are dropped entirely.
fn map_control(item: &Value) -> Option<ControlQuestions> {
    let obj = item.as_object()?;

    let questions = obj
        .get("questions")
        .and_then(Value::as_array)
        .map(|qs| qs.iter().filter_map(map_question).collect())
        .unwrap_or_default();

    Some(ControlQuestions {
        control_id: string_field(obj, "control_id"),
        control_title: string_field(obj, "control_title"),
        framework: string_field(obj, "framework"),
        questions,
    })
}

fn map_question(item: &Value) -> Option<GeneratedQuestion> {
    let obj = item.as_object()?;

    Some(GeneratedQuestion {
        id: obj
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(fresh_question_id),
        question: string_field(obj, "question"),
        category: obj
            .get("category")
            .and_then(Value::as_str)
            .map(QuestionCategory::parse_lenient)
            .unwrap_or(QuestionCategory::Implementation),
        priority: obj
            .get("priority")
            .and_then(Value::as_str)
            .map(QuestionPriority::parse_lenient)
            .unwrap_or_default(),
        expected_evidence: obj
            .get("expected_evidence")
            .and_then(Value::as_str)
            .map(str::to_owned),
    })
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn fresh_question_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("q-{}", &id[..8])
}

/// Enforce output bounds regardless of which extraction path succeeded.
fn enforce_limits(mut control: ControlQuestions) -> ControlQuestions {
    for question in &mut control.questions {
        question.question = truncate_question(&question.question);
        if let Some(evidence) = question.expected_evidence.take() {
            question.expected_evidence = Some(truncate_words(&evidence, EVIDENCE_WORD_LIMIT));
        }
    }
    control
}

/// Hard-truncate over-long questions to the word ceiling, ending with `?`.
fn truncate_question(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= QUESTION_WORD_LIMIT {
        return text.to_string();
    }
    let mut truncated = words[..QUESTION_WORD_LIMIT].join(" ");
    while truncated.ends_with([',', ';', ':', '.']) {
        truncated.pop();
    }
    truncated.push('?');
    truncated
}

fn truncate_words(text: &str, limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= limit {
        return text.to_string();
    }
    words[..limit].join(" ")
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod control;
pub mod criteria;
pub mod llm;
pub mod question;
pub mod retry;

pub use control::{AssessmentContext, Control};
pub use criteria::{GenerationCriteria, MaturityLevel, QuestionDepth};
pub use llm::{
    GenerationClient, GenerationError, GenerationOutput, GenerationRequest, SystemBlock,
    TokenUsage,
};
pub use question::{ControlQuestions, GeneratedQuestion, QuestionCategory, QuestionPriority};
pub use retry::RetryPolicy;

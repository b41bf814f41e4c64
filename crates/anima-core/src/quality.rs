//! Quality gate: deterministic checks on every composed reply, with one fixed fallback.

use crate::classify::is_sensitive;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Substituted for any rejected candidate. Passes every check itself.
pub const FALLBACK_REPLY: &str = "I hear you, and I'm here with you. Tell me a little more: \
what feels most important for you to change or understand right now?";

static EMPATHY: LazyLock<Regex> = LazyLock::new(|| {
    crate::classify::compile(
        r"(?i)(\bhear\b|\bunderstand\w*|\bfeel\w*|\bwith you\b|\bhere for you\b|\bsounds?\b|\bsupport\w*|\bglad\b|\blisten\w*|\bmatters?\b)",
    )
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCheck {
    Sensitive,
    TooShort,
    TooLong,
    NoQuestion,
    NoEmpathy,
}

/// Number of independent checks the score is computed over
/// (sensitive, length, question, empathy).
const CHECKS: f32 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub accepted: bool,
    /// Text to send: the candidate, or [`FALLBACK_REPLY`] when rejected.
    pub reply: String,
    /// Share of passed checks in [0, 1].
    pub score: f32,
    pub failures: Vec<QualityCheck>,
    /// Similarity of the user message to the session goal, when one exists.
    pub on_topic: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityGate {
    min_len: usize,
    max_len: usize,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(60, 900)
    }
}

impl QualityGate {
    pub fn new(min_len: usize, max_len: usize) -> Self {
        Self { min_len, max_len }
    }

    pub fn evaluate(&self, user_text: &str, candidate: &str, goal_vector: Option<&[f32]>) -> QualityVerdict {
        let mut failures = Vec::new();
        if is_sensitive(candidate) {
            failures.push(QualityCheck::Sensitive);
        }
        let len = candidate.chars().count();
        if len < self.min_len {
            failures.push(QualityCheck::TooShort);
        } else if len > self.max_len {
            failures.push(QualityCheck::TooLong);
        }
        if !candidate.contains('?') {
            failures.push(QualityCheck::NoQuestion);
        }
        if !EMPATHY.is_match(candidate) {
            failures.push(QualityCheck::NoEmpathy);
        }

        let accepted = failures.is_empty();
        let score = (CHECKS - failures.len() as f32) / CHECKS;
        let on_topic = goal_vector.map(|g| crate::goal::on_topic(g, user_text));
        if !accepted {
            tracing::debug!(target: "anima::engine", ?failures, score, "reply rejected by quality gate");
        }
        QualityVerdict {
            accepted,
            reply: if accepted { candidate.to_string() } else { FALLBACK_REPLY.to_string() },
            score,
            failures,
            on_topic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_candidate_is_replaced_and_long_kept() {
        let gate = QualityGate::default();
        let short = "I hear you. Why so?";
        assert_eq!(short.chars().count(), 19);
        let v = gate.evaluate("hi", short, None);
        assert!(!v.accepted);
        assert_eq!(v.reply, FALLBACK_REPLY);
        assert_eq!(v.failures, vec![QualityCheck::TooShort]);
        assert!((v.score - 0.75).abs() < 1e-6);

        let long = format!("I hear you and I'm here with you. {} What matters most to you today?", "x".repeat(130));
        assert!(long.chars().count() >= 190);
        let v = gate.evaluate("hi", &long, None);
        assert!(v.accepted);
        assert_eq!(v.reply, long);
        assert_eq!(v.score, 1.0);
    }

    #[test]
    fn twenty_char_reply_without_question_is_replaced() {
        let gate = QualityGate::default();
        let short = "I hear you, friend. ";
        assert_eq!(short.chars().count(), 20);
        let v = gate.evaluate("hi", short, None);
        assert!(!v.accepted);
        assert_eq!(v.reply, FALLBACK_REPLY);
        assert_eq!(v.failures, vec![QualityCheck::TooShort, QualityCheck::NoQuestion]);
        assert_eq!(v.score, 0.5);
    }

    #[test]
    fn two_hundred_char_empathic_question_is_kept() {
        let gate = QualityGate::default();
        let reply = format!(
            "I hear you and I am here with you. {} What feels most important to you right now?",
            "a".repeat(121)
        );
        assert_eq!(reply.chars().count(), 200);
        let v = gate.evaluate("hi", &reply, None);
        assert!(v.accepted);
        assert_eq!(v.reply, reply);
        assert_eq!(v.score, 1.0);
    }

    #[test]
    fn missing_question_or_empathy_is_rejected() {
        let gate = QualityGate::default();
        let v = gate.evaluate("hi", "Here is a plain statement that goes on for long enough to pass the length.", None);
        assert!(v.failures.contains(&QualityCheck::NoQuestion));
        assert!(v.failures.contains(&QualityCheck::NoEmpathy));
        assert_eq!(v.score, 0.5);
    }

    #[test]
    fn sensitive_candidate_is_rejected() {
        let gate = QualityGate::default();
        let v = gate.evaluate(
            "hi",
            "I hear you. What do you think about the political situation and how it affects you?",
            None,
        );
        assert_eq!(v.failures, vec![QualityCheck::Sensitive]);
        assert_eq!(v.reply, FALLBACK_REPLY);
    }

    #[test]
    fn fallback_passes_its_own_gate() {
        let v = QualityGate::default().evaluate("hi", FALLBACK_REPLY, None);
        assert!(v.accepted);
    }

    #[test]
    fn on_topic_is_reported_only_with_a_goal() {
        let gate = QualityGate::default();
        let goal = crate::goal::embed("pay off debt");
        let v = gate.evaluate("my debt", FALLBACK_REPLY, Some(&goal));
        assert!(v.on_topic.unwrap() > 0.0);
        assert!(gate.evaluate("my debt", FALLBACK_REPLY, None).on_topic.is_none());
    }
}

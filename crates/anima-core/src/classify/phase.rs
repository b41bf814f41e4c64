use super::Emotion;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Conversational phase, loosely following motivational interviewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Engage,
    Focus,
    Evoke,
    Plan,
    /// Used for safety interceptions.
    Support,
}

impl Phase {
    pub fn all() -> [Self; 5] {
        [Self::Engage, Self::Focus, Self::Evoke, Self::Plan, Self::Support]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Engage => "engage",
            Self::Focus => "focus",
            Self::Evoke => "evoke",
            Self::Plan => "plan",
            Self::Support => "support",
        }
    }
}

static FOCUS_CUES: LazyLock<Regex> =
    LazyLock::new(|| super::compile(r"(?i)(\bfocus\b|\bmain thing\b|\bmost important\b|\bconcentrat\w*|\bprioriti\w*)"));

static EVOKE_CUES: LazyLock<Regex> = LazyLock::new(|| {
    super::compile(r"(?i)(\bwhy\b|\bi think\b|\bwant to understand\b|\bit seems\b|\bseems like\b|\bi wonder\b)")
});

static PLAN_CUES: LazyLock<Regex> = LazyLock::new(|| {
    super::compile(r"(?i)(\bready\b|\bi will\b|\bi'll\b|\bwill try\b|\blet me try\b|\bstart\b|\bplanning\b)")
});

/// Next phase from the last one, the message tone and explicit cues.
pub fn choose_phase(last: Phase, emotion: Emotion, text: &str) -> Phase {
    if matches!(emotion, Emotion::Tense | Emotion::Uncertain) {
        return Phase::Engage;
    }
    if FOCUS_CUES.is_match(text) {
        return Phase::Focus;
    }
    if EVOKE_CUES.is_match(text) {
        return Phase::Evoke;
    }
    if PLAN_CUES.is_match(text) {
        return Phase::Plan;
    }
    match last {
        Phase::Engage => Phase::Focus,
        Phase::Support => Phase::Engage,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tension_pulls_back_to_engage() {
        assert_eq!(choose_phase(Phase::Plan, Emotion::Tense, "I will start"), Phase::Engage);
        assert_eq!(choose_phase(Phase::Evoke, Emotion::Uncertain, "why"), Phase::Engage);
    }

    #[test]
    fn cues_are_checked_in_order() {
        assert_eq!(choose_phase(Phase::Engage, Emotion::Neutral, "the main thing, why?"), Phase::Focus);
        assert_eq!(choose_phase(Phase::Engage, Emotion::Neutral, "I think it matters"), Phase::Evoke);
        assert_eq!(choose_phase(Phase::Focus, Emotion::Calm, "ok, I'm ready"), Phase::Plan);
    }

    #[test]
    fn without_cues_engage_advances_and_others_stay() {
        assert_eq!(choose_phase(Phase::Engage, Emotion::Neutral, "hmm"), Phase::Focus);
        assert_eq!(choose_phase(Phase::Evoke, Emotion::Neutral, "hmm"), Phase::Evoke);
        assert_eq!(choose_phase(Phase::Support, Emotion::Neutral, "hmm"), Phase::Engage);
    }
}

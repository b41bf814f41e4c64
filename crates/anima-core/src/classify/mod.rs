//! Rule-based text classifiers: ordered pattern tables, first match wins.

mod emotion;
mod intent;
mod phase;
mod relevance;
mod safety;

pub use emotion::{detect_emotion, Emotion};
pub use intent::{IntentClassifier, IntentMatch, EARLY_WINDOW_CHARS, PARENT_SCORE, SUBTOPIC_SCORE};
pub use phase::{choose_phase, Phase};
pub use relevance::{detect_relevance, RelevanceSignal};
pub use safety::{is_crisis, is_sensitive};

use regex::Regex;

/// A classifier maps free text to at most one label.
pub trait Classifier: Send + Sync {
    type Label;

    fn classify(&self, text: &str) -> Option<Self::Label>;
}

/// Ordered (label, pattern) rules. Evaluation stops at the first match.
pub struct RuleTable<L> {
    rules: Vec<(L, Regex)>,
}

impl<L: Copy> RuleTable<L> {
    /// Compiles the table. Patterns are literals shipped with the crate.
    pub fn new(rules: &[(L, &str)]) -> Self {
        let rules = rules
            .iter()
            .map(|(label, pattern)| (*label, Regex::new(pattern).expect("valid classifier pattern")))
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<L: Copy + Send + Sync> Classifier for RuleTable<L> {
    type Label = L;

    fn classify(&self, text: &str) -> Option<L> {
        self.rules
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(label, _)| *label)
    }
}

/// Compiles a single crate-owned pattern.
pub(crate) fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid classifier pattern")
}

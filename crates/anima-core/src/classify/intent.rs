use crate::topics::{TopicSpec, TOPICS};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Score of a parent-topic match.
pub const PARENT_SCORE: f32 = 0.40;
/// Score of a sub-topic match.
pub const SUBTOPIC_SCORE: f32 = 0.60;
/// Bonus when the match starts within the first [`EARLY_WINDOW_CHARS`] characters.
const EARLY_BONUS: f32 = 0.10;
pub const EARLY_WINDOW_CHARS: usize = 16;

/// Best topic guess for a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentMatch {
    pub topic: String,
    pub subtopic: Option<String>,
    pub score: f32,
}

struct CompiledSubtopic {
    name: &'static str,
    pattern: Regex,
}

struct CompiledTopic {
    name: &'static str,
    pattern: Regex,
    subtopics: Vec<CompiledSubtopic>,
}

impl CompiledTopic {
    fn from_spec(spec: &'static TopicSpec) -> Self {
        Self {
            name: spec.name,
            pattern: super::compile(spec.pattern),
            subtopics: spec
                .subtopics
                .iter()
                .map(|s| CompiledSubtopic {
                    name: s.name,
                    pattern: super::compile(s.pattern),
                })
                .collect(),
        }
    }
}

/// Scores every catalog topic and keeps the strictly best one.
/// Equal scores resolve to the topic and sub-topic declared first.
pub struct IntentClassifier {
    topics: Vec<CompiledTopic>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            topics: TOPICS.iter().map(CompiledTopic::from_spec).collect(),
        }
    }

    /// Best match regardless of threshold; callers compare `score` to their own cutoff.
    pub fn detect(&self, text: &str) -> Option<IntentMatch> {
        let mut best: Option<IntentMatch> = None;
        for topic in &self.topics {
            let mut candidate = topic.pattern.find(text).map(|m| IntentMatch {
                topic: topic.name.to_string(),
                subtopic: None,
                score: score_at(PARENT_SCORE, text, m.start()),
            });
            for sub in &topic.subtopics {
                if let Some(m) = sub.pattern.find(text) {
                    let score = score_at(SUBTOPIC_SCORE, text, m.start());
                    if candidate.as_ref().map_or(true, |c| score > c.score) {
                        candidate = Some(IntentMatch {
                            topic: topic.name.to_string(),
                            subtopic: Some(sub.name.to_string()),
                            score,
                        });
                    }
                }
            }
            if let Some(c) = candidate {
                if best.as_ref().map_or(true, |b| c.score > b.score) {
                    best = Some(c);
                }
            }
        }
        best
    }
}

impl super::Classifier for IntentClassifier {
    type Label = IntentMatch;

    fn classify(&self, text: &str) -> Option<IntentMatch> {
        self.detect(text)
    }
}

fn score_at(base: f32, text: &str, byte_offset: usize) -> f32 {
    let chars_before = text[..byte_offset].chars().count();
    if chars_before < EARLY_WINDOW_CHARS {
        base + EARLY_BONUS
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_with<C: crate::classify::Classifier>(c: &C, text: &str) -> Option<C::Label> {
        c.classify(text)
    }

    #[test]
    fn usable_through_the_classifier_trait() {
        let c = IntentClassifier::new();
        let m = classify_with(&c, "my credit card debt keeps growing").unwrap();
        assert_eq!(m, c.detect("my credit card debt keeps growing").unwrap());
        assert_eq!(m.subtopic.as_deref(), Some("debt"));
        assert!(classify_with(&c, "the weather is nice").is_none());
    }

    #[test]
    fn parent_match_scores_base() {
        let c = IntentClassifier::new();
        let m = c.detect("honestly, lately I keep thinking about money").unwrap();
        assert_eq!(m.topic, "finance");
        assert_eq!(m.subtopic, None);
        assert!((m.score - PARENT_SCORE).abs() < 1e-6);
    }

    #[test]
    fn early_match_gets_bonus() {
        let c = IntentClassifier::new();
        let m = c.detect("money is tight").unwrap();
        assert!((m.score - (PARENT_SCORE + EARLY_BONUS)).abs() < 1e-6);
    }

    #[test]
    fn subtopic_outscores_parent() {
        let c = IntentClassifier::new();
        let m = c.detect("my credit card debt keeps growing").unwrap();
        assert_eq!(m.topic, "finance");
        assert_eq!(m.subtopic.as_deref(), Some("debt"));
        assert!(m.score >= SUBTOPIC_SCORE);
    }

    #[test]
    fn ties_resolve_to_first_declared_topic() {
        let c = IntentClassifier::new();
        let m = c.detect("I have been thinking about my finances and my career lately").unwrap();
        assert_eq!(m.topic, "finance");
    }

    #[test]
    fn strictly_higher_score_wins_over_declaration_order() {
        let c = IntentClassifier::new();
        let m = c.detect("career is fine, but I am thinking about money").unwrap();
        assert_eq!(m.topic, "career");
    }

    #[test]
    fn nothing_detected_in_small_talk() {
        assert!(IntentClassifier::new().detect("hello, how are you?").is_none());
    }
}

use super::{Classifier, RuleTable};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Coarse emotional tone of a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Tense,
    Calm,
    Uncertain,
    Neutral,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tense => "tense",
            Self::Calm => "calm",
            Self::Uncertain => "uncertain",
            Self::Neutral => "neutral",
        }
    }
}

// Priority: tense > calm > uncertain.
static EMOTION_RULES: LazyLock<RuleTable<Emotion>> = LazyLock::new(|| {
    RuleTable::new(&[
        (
            Emotion::Tense,
            r"(?i)(\btired\b|\bexhaust\w*|\bstress\w*|\btense\b|\banxi\w*|\bscared\b|\bafraid\b|\bangry\b|\birritat\w*|\bannoy\w*|\bsad\b|\bupset\b|\bawful\b|\bterrible\b|\bworr\w*|\boverwhelm\w*|\bbad\b)",
        ),
        (
            Emotion::Calm,
            r"(?i)(\bcalm\b|\bglad\b|\bhappy\b|\brelaxed\b|\beasy\b|\bgreat\b|\bgood\b|\bfine\b|\bsuper\b|\bnice\b|\bok\b|\bokay\b)",
        ),
        (
            Emotion::Uncertain,
            r"(?i)(\bdon'?t know\b|\bdo not know\b|\bnot sure\b|\bconfus\w*|\bdoubt\w*|\bunclear\b|\blost\b)",
        ),
    ])
});

/// Classifies tone; `Neutral` when no rule matches.
pub fn detect_emotion(text: &str) -> Emotion {
    EMOTION_RULES.classify(text).unwrap_or(Emotion::Neutral)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tense_outranks_calm() {
        assert_eq!(detect_emotion("I'm tired but glad it's Friday"), Emotion::Tense);
    }

    #[test]
    fn calm_outranks_uncertain() {
        assert_eq!(detect_emotion("not sure, but I'm fine"), Emotion::Calm);
        assert_eq!(detect_emotion("I don't know what to do"), Emotion::Uncertain);
    }

    #[test]
    fn ok_matches_only_as_a_word() {
        assert_eq!(detect_emotion("ok"), Emotion::Calm);
        assert_eq!(detect_emotion("I read a book"), Emotion::Neutral);
        assert_eq!(detect_emotion(""), Emotion::Neutral);
    }
}

use regex::Regex;
use std::sync::LazyLock;

static CRISIS: LazyLock<Regex> = LazyLock::new(|| {
    super::compile(
        r"(?i)(don'?t want to live|do not want to live|want to die|kill myself|suicid\w*|self[- ]harm\w*|hurt myself|end my life|unbearable pain|pain is unbearable)",
    )
});

static SENSITIVE: LazyLock<Regex> = LazyLock::new(|| {
    super::compile(r"(?i)(politic\w*|religio\w*|violen\w*|medical|vaccin\w*|diagnos\w*|medication\w*|prescri\w*|suicid\w*)")
});

/// Self-harm or suicidal language. Checked before everything else.
pub fn is_crisis(text: &str) -> bool {
    CRISIS.is_match(text)
}

/// Topics the assistant declines to discuss (politics, religion, violence, medicine).
/// Also applied to outgoing replies by the quality gate.
pub fn is_sensitive(text: &str) -> bool {
    SENSITIVE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crisis_phrases_match_case_insensitively() {
        assert!(is_crisis("I DON'T WANT TO LIVE anymore"));
        assert!(is_crisis("thinking about self-harm"));
        assert!(is_crisis("The pain is unbearable"));
        assert!(!is_crisis("I want to live a calmer life"));
    }

    #[test]
    fn sensitive_stems_match() {
        assert!(is_sensitive("what about politics"));
        assert!(is_sensitive("should I change my medication"));
        assert!(is_sensitive("is religion helpful"));
        assert!(!is_sensitive("my budget is a mess"));
    }
}

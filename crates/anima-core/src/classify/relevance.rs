use crate::profile::{Anchor, Axis, AxisDeltas};
use regex::Regex;
use std::sync::LazyLock;

/// Longest quote stored in an anchor.
const QUOTE_CHARS: usize = 80;

struct Cue {
    axis: Axis,
    delta: f32,
    label: &'static str,
    pattern: Regex,
}

static CUES: LazyLock<Vec<Cue>> = LazyLock::new(|| {
    let table: [(Axis, f32, &str, &str); 8] = [
        (Axis::Jp, 0.2, "planning", r"(?i)(\bplan(s|ned|ning)?\b|\bschedul\w*|\bcontrol\b|\borgani[sz]\w*|\bto-?do list\b)"),
        (Axis::Jp, -0.2, "spontaneity", r"(?i)(\bspontan\w*|\bimprovis\w*|\bgo with the flow\b)"),
        (Axis::Ei, 0.2, "sociability", r"(?i)(\bmeet(ing|ings|ups?)?\b|\bteam\b|\bpeople\b|\bfriends\b|\bsociali[sz]\w*)"),
        (Axis::Ei, -0.2, "solitude", r"(?i)(\bquiet\b|\balone\b|\bby myself\b|\bsolitude\b|\bsilence\b)"),
        (Axis::Sn, -0.15, "facts", r"(?i)(\bfacts?\b|\bstep[- ]by[- ]step\b|\bconcrete\b|\bspecifics?\b)"),
        (Axis::Sn, 0.15, "meaning", r"(?i)(\bmeaning\b|\bideas?\b|\bbig picture\b|\bvision\b|\bimagin\w*)"),
        (Axis::Tf, 0.15, "analysis", r"(?i)(\blogic\w*|\brational\w*|\bcompar\w*|\banaly[sz]\w*)"),
        (Axis::Tf, -0.15, "empathy", r"(?i)(\bfeel(s|ing|ings)?\b|\bharmony\b|\bemotion\w*|\bvalues\b)"),
    ];
    table
        .into_iter()
        .map(|(axis, delta, label, pattern)| Cue {
            axis,
            delta,
            label,
            pattern: super::compile(pattern),
        })
        .collect()
});

/// Personality cues found in one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelevanceSignal {
    /// Summed delta per axis; opposite cues on one axis cancel.
    pub deltas: AxisDeltas,
    pub anchors: Vec<Anchor>,
}

impl RelevanceSignal {
    /// A message is relevant when at least one cue matched.
    pub fn relevant(&self) -> bool {
        !self.anchors.is_empty()
    }
}

/// Scans for axis cues; every matching cue contributes its delta and an anchor.
pub fn detect_relevance(text: &str) -> RelevanceSignal {
    let mut signal = RelevanceSignal::default();
    let quote: String = text.trim().chars().take(QUOTE_CHARS).collect();
    let at_ms = crate::now_ms();
    for cue in CUES.iter() {
        if cue.pattern.is_match(text) {
            *signal.deltas.entry(cue.axis).or_insert(0.0) += cue.delta;
            signal.anchors.push(Anchor {
                axis: cue.axis,
                cue: cue.label.to_string(),
                quote: quote.clone(),
                at_ms,
            });
        }
    }
    signal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planning_cue_nudges_jp() {
        let s = detect_relevance("I like to plan my week in advance");
        assert!(s.relevant());
        assert_eq!(s.deltas.get(&Axis::Jp).copied(), Some(0.2));
        assert_eq!(s.anchors[0].cue, "planning");
        assert!(s.anchors[0].quote.starts_with("I like to plan"));
    }

    #[test]
    fn multiple_axes_accumulate_independently() {
        let s = detect_relevance("I prefer to be alone and look at the facts");
        assert_eq!(s.deltas.get(&Axis::Ei).copied(), Some(-0.2));
        assert_eq!(s.deltas.get(&Axis::Sn).copied(), Some(-0.15));
        assert_eq!(s.anchors.len(), 2);
    }

    #[test]
    fn no_cue_means_irrelevant() {
        let s = detect_relevance("hello there");
        assert!(!s.relevant());
        assert!(s.deltas.is_empty());
    }

    #[test]
    fn quote_is_truncated() {
        let long = format!("plan {}", "x".repeat(200));
        let s = detect_relevance(&long);
        assert_eq!(s.anchors[0].quote.chars().count(), QUOTE_CHARS);
    }
}

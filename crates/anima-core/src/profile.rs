//! Psychometric profile: four MBTI-like axis scores with EWMA updates.
//!
//! Axis orientation: `1.0` leans to E, N, T, J and `0.0` to I, S, F, P.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Anchors kept per profile (oldest dropped first).
pub const MAX_ANCHORS: usize = 50;
/// Confidence never grows past this cap.
pub const MAX_CONFIDENCE: f32 = 0.99;
/// Confidence written at onboarding completion.
pub const INITIAL_CONFIDENCE: f32 = 0.4;
/// Type label is revealed when `confidence >= REVEAL_THRESHOLD` (inclusive).
pub const REVEAL_THRESHOLD: f32 = 0.4;
/// Smoothing factor for axis updates.
pub const EWMA_ALPHA: f32 = 0.1;
/// Confidence gained per update that carried at least one delta.
pub const CONFIDENCE_STEP: f32 = 0.02;
/// Neutral value used for new profiles and for users without a profile.
pub const NEUTRAL_AXIS: f32 = 0.5;

/// One of the four personality dichotomies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Extraversion (1.0) / introversion (0.0).
    Ei,
    /// Intuition (1.0) / sensing (0.0).
    Sn,
    /// Thinking (1.0) / feeling (0.0).
    Tf,
    /// Judging (1.0) / perceiving (0.0).
    Jp,
}

impl Axis {
    pub fn all() -> [Self; 4] {
        [Self::Ei, Self::Sn, Self::Tf, Self::Jp]
    }

    /// Letters as (score >= 0.5, score < 0.5).
    pub fn letters(&self) -> (char, char) {
        match self {
            Self::Ei => ('E', 'I'),
            Self::Sn => ('N', 'S'),
            Self::Tf => ('T', 'F'),
            Self::Jp => ('J', 'P'),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ei => "ei",
            Self::Sn => "sn",
            Self::Tf => "tf",
            Self::Jp => "jp",
        }
    }
}

/// Signed nudges per axis. Axes absent from the map are left unchanged.
pub type AxisDeltas = BTreeMap<Axis, f32>;

/// Which utterance justified an axis nudge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub axis: Axis,
    /// Short cue label (e.g. "planning", "solitude").
    pub cue: String,
    /// Snippet of the user message that matched.
    pub quote: String,
    #[serde(default)]
    pub at_ms: i64,
}

/// Per-user psychometric profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychoProfile {
    pub user_id: i64,
    pub ei: f32,
    pub sn: f32,
    pub tf: f32,
    pub jp: f32,
    pub confidence: f32,
    /// Four-letter label; `None` while the profile is still drafting.
    #[serde(default)]
    pub mbti_type: Option<String>,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
    #[serde(default)]
    pub updated_at_ms: i64,
}

impl PsychoProfile {
    /// Neutral profile with zero confidence (lazy creation on the first signal).
    pub fn neutral(user_id: i64) -> Self {
        Self {
            user_id,
            ei: NEUTRAL_AXIS,
            sn: NEUTRAL_AXIS,
            tf: NEUTRAL_AXIS,
            jp: NEUTRAL_AXIS,
            confidence: 0.0,
            mbti_type: None,
            anchors: Vec::new(),
            updated_at_ms: crate::now_ms(),
        }
    }

    /// Profile produced by questionnaire finalization: fixed initial confidence, no anchors.
    pub fn from_questionnaire(user_id: i64, ei: f32, sn: f32, tf: f32, jp: f32) -> Self {
        let mut profile = Self {
            user_id,
            ei: clamp01(ei),
            sn: clamp01(sn),
            tf: clamp01(tf),
            jp: clamp01(jp),
            confidence: INITIAL_CONFIDENCE,
            mbti_type: None,
            anchors: Vec::new(),
            updated_at_ms: crate::now_ms(),
        };
        profile.refresh_label();
        profile
    }

    pub fn axis(&self, axis: Axis) -> f32 {
        match axis {
            Axis::Ei => self.ei,
            Axis::Sn => self.sn,
            Axis::Tf => self.tf,
            Axis::Jp => self.jp,
        }
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut f32 {
        match axis {
            Axis::Ei => &mut self.ei,
            Axis::Sn => &mut self.sn,
            Axis::Tf => &mut self.tf,
            Axis::Jp => &mut self.jp,
        }
    }

    /// Applies an EWMA update, grows confidence, appends anchors and refreshes the label.
    pub fn apply(&mut self, deltas: &AxisDeltas, anchors: Vec<Anchor>) {
        for (&axis, &delta) in deltas {
            let slot = self.axis_mut(axis);
            *slot = ewma(*slot, delta);
        }
        if !deltas.is_empty() {
            self.confidence = (self.confidence + CONFIDENCE_STEP).min(MAX_CONFIDENCE);
        }
        self.anchors.extend(anchors);
        if self.anchors.len() > MAX_ANCHORS {
            let excess = self.anchors.len() - MAX_ANCHORS;
            self.anchors.drain(..excess);
        }
        self.refresh_label();
        self.updated_at_ms = crate::now_ms();
    }

    /// True once the label may be shown to the composer and to the user.
    /// Inclusive: the questionnaire's initial confidence already reveals the label.
    pub fn revealed(&self) -> bool {
        self.confidence + 1e-6 >= REVEAL_THRESHOLD
    }

    /// Four-letter type from the current axes, regardless of confidence.
    pub fn type_guess(&self) -> String {
        Axis::all()
            .iter()
            .map(|&axis| {
                let (hi, lo) = axis.letters();
                if self.axis(axis) >= 0.5 {
                    hi
                } else {
                    lo
                }
            })
            .collect()
    }

    fn refresh_label(&mut self) {
        self.mbti_type = self.revealed().then(|| self.type_guess());
    }
}

/// `clamp01(old + alpha * delta)`.
pub fn ewma(value: f32, delta: f32) -> f32 {
    clamp01(value + EWMA_ALPHA * delta)
}

fn clamp01(v: f32) -> f32 {
    if v.is_nan() {
        NEUTRAL_AXIS
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn anchor(axis: Axis, n: usize) -> Anchor {
        Anchor {
            axis,
            cue: "test".into(),
            quote: format!("quote {}", n),
            at_ms: n as i64,
        }
    }

    #[test]
    fn ewma_moves_by_alpha_and_clamps() {
        assert!((ewma(0.5, 0.2) - 0.52).abs() < 1e-6);
        assert_eq!(ewma(0.99, 5.0), 1.0);
        assert_eq!(ewma(0.01, -5.0), 0.0);
    }

    #[test]
    fn absent_axes_are_untouched() {
        let mut p = PsychoProfile::neutral(1);
        let deltas: AxisDeltas = [(Axis::Jp, 0.2)].into_iter().collect();
        p.apply(&deltas, Vec::new());
        assert_eq!(p.ei, 0.5);
        assert_eq!(p.sn, 0.5);
        assert_eq!(p.tf, 0.5);
        assert!((p.jp - 0.52).abs() < 1e-6);
        assert!((p.confidence - 0.02).abs() < 1e-6);
    }

    #[test]
    fn empty_delta_does_not_grow_confidence() {
        let mut p = PsychoProfile::neutral(1);
        p.apply(&AxisDeltas::new(), vec![anchor(Axis::Ei, 0)]);
        assert_eq!(p.confidence, 0.0);
        assert_eq!(p.anchors.len(), 1);
    }

    #[test]
    fn randomized_deltas_keep_axes_in_unit_range_and_confidence_monotonic() {
        let mut rng = StdRng::seed_from_u64(0xA41A);
        let mut p = PsychoProfile::neutral(7);
        let mut last_confidence = p.confidence;
        for i in 0..5_000 {
            let mut deltas = AxisDeltas::new();
            for axis in Axis::all() {
                if rng.gen_bool(0.6) {
                    // Mix ordinary nudges with extreme repeated pushes.
                    let d: f32 = if i % 50 < 10 { 1e6 } else { rng.gen_range(-20.0f32..20.0) };
                    deltas.insert(axis, if rng.gen_bool(0.5) { d } else { -d });
                }
            }
            p.apply(&deltas, Vec::new());
            for axis in Axis::all() {
                let v = p.axis(axis);
                assert!((0.0..=1.0).contains(&v), "axis {:?} out of range: {}", axis, v);
            }
            assert!(p.confidence >= last_confidence);
            assert!(p.confidence <= MAX_CONFIDENCE);
            last_confidence = p.confidence;
        }
        assert!((p.confidence - MAX_CONFIDENCE).abs() < 1e-6);
    }

    #[test]
    fn anchors_keep_latest_fifty() {
        let mut p = PsychoProfile::neutral(1);
        let deltas: AxisDeltas = [(Axis::Ei, 0.2)].into_iter().collect();
        for n in 0..70 {
            p.apply(&deltas, vec![anchor(Axis::Ei, n)]);
        }
        assert_eq!(p.anchors.len(), MAX_ANCHORS);
        assert_eq!(p.anchors.first().unwrap().quote, "quote 20");
        assert_eq!(p.anchors.last().unwrap().quote, "quote 69");
    }

    #[test]
    fn label_is_withheld_below_threshold_and_shown_at_it() {
        let mut p = PsychoProfile::neutral(1);
        p.confidence = 0.36;
        let deltas: AxisDeltas = [(Axis::Tf, -3.0)].into_iter().collect();
        p.apply(&deltas, Vec::new());
        assert!((p.confidence - 0.38).abs() < 1e-5);
        assert_eq!(p.mbti_type, None);

        p.apply(&deltas, Vec::new());
        assert!(p.revealed());
        assert_eq!(p.mbti_type.as_deref(), Some("ENFJ"));
    }

    #[test]
    fn questionnaire_profile_reveals_at_exact_initial_confidence() {
        let p = PsychoProfile::from_questionnaire(1, 1.0, 1.0, 1.0, 0.5);
        assert_eq!(p.confidence, INITIAL_CONFIDENCE);
        assert_eq!(p.mbti_type.as_deref(), Some("ENTJ"));
    }
}

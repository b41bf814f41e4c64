//! Reply composition: emotion reflection, then a topic prompt or phase
//! question, then optional tool and humor suffixes. Wording is chosen by a
//! deterministic seed and the user's communication style.

use crate::classify::{Emotion, Phase};
use crate::profile::{PsychoProfile, NEUTRAL_AXIS};
use crate::topics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Active,
    Calm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detail {
    Meaning,
    Steps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mind {
    Analysis,
    Feelings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStyle {
    Plan,
    Experiment,
}

/// Communication style derived from the profile axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommsStyle {
    pub tone: Tone,
    pub detail: Detail,
    pub mind: Mind,
    pub plan: PlanStyle,
}

impl CommsStyle {
    /// Independent threshold rules per axis; a missing profile counts as neutral.
    /// `detail_override` (the `/style` preference) wins over the sn axis.
    pub fn from_profile(profile: Option<&PsychoProfile>, detail_override: Option<Detail>) -> Self {
        let (ei, sn, tf, jp) = profile
            .map(|p| (p.ei, p.sn, p.tf, p.jp))
            .unwrap_or((NEUTRAL_AXIS, NEUTRAL_AXIS, NEUTRAL_AXIS, NEUTRAL_AXIS));
        Self {
            tone: if ei >= 0.5 { Tone::Active } else { Tone::Calm },
            detail: detail_override.unwrap_or(if sn >= 0.5 { Detail::Meaning } else { Detail::Steps }),
            mind: if tf >= 0.5 { Mind::Analysis } else { Mind::Feelings },
            plan: if jp >= 0.5 { PlanStyle::Plan } else { PlanStyle::Experiment },
        }
    }
}

/// The locked topic a reply should follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicCue<'a> {
    pub topic: &'a str,
    pub subtopic: Option<&'a str>,
    pub step: u32,
    /// True on the turn the topic was adopted.
    pub fresh: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ReplyRequest<'a> {
    pub emotion: Emotion,
    pub phase: Phase,
    pub topic: Option<TopicCue<'a>>,
    pub humor: bool,
    pub seed: u64,
}

const TENSE_FEELINGS: &[&str] = &[
    "I hear how much tension there is in what you wrote, and I'm here with you. ",
    "It sounds like things feel heavy right now, and that's okay to feel. ",
];
const TENSE_ANALYSIS: &[&str] = &[
    "I understand that a lot is pressing on you right now. ",
    "I hear that the pressure is high; let's sort it out together. ",
];
const CALM_FEELINGS: &[&str] = &[
    "It's good to hear some calm in your words, I'm glad you're here. ",
    "That sounds steady, and I'm glad to hear it. ",
];
const CALM_ANALYSIS: &[&str] = &[
    "I hear a clear head in what you wrote, and that helps a lot. ",
    "That sounds like a good, solid place to think from. ",
];
const UNCERTAIN_FEELINGS: &[&str] = &[
    "It's understandable to feel a bit lost, and I'm here with you. ",
    "I hear that things feel unclear right now, and that's completely okay. ",
];
const UNCERTAIN_ANALYSIS: &[&str] = &[
    "I understand you want more clarity; let's untangle it together. ",
    "I hear that the picture isn't clear yet; we can sort it out step by step. ",
];
const NEUTRAL_FEELINGS: &[&str] = &[
    "Thank you for sharing this with me, I hear you. ",
    "I'm here with you and listening carefully. ",
];
const NEUTRAL_ANALYSIS: &[&str] = &[
    "I hear you, and I understand what you're describing. ",
    "Thank you, I understand; let's look at it together. ",
];

const ENGAGE_QUESTIONS: &[&str] = &[
    "What feels most important for you to talk about right now?",
    "Where would you like to start: what is weighing on you most at the moment?",
    "What is happening in your life right now that you would like to look at together?",
];
const FOCUS_QUESTIONS: &[&str] = &[
    "Of everything going on, what would you like us to focus on first?",
    "If we pick one thing to work on today, which one would make the biggest difference?",
];
const EVOKE_MEANING: &[&str] = &[
    "What meaning does this have for you, and what do you truly want here?",
    "What would change for you if this worked out the way you hope?",
];
const EVOKE_STEPS: &[&str] = &[
    "What concrete facts stand out to you most in this situation?",
    "What exactly happens, step by step, when this comes up for you?",
];
const PLAN_PLAN: &[&str] = &[
    "What small step could you plan for the next few days?",
    "What would a simple plan for this week look like, with one clear first step?",
];
const PLAN_EXPERIMENT: &[&str] = &[
    "What light experiment could you try this week to see what changes?",
    "What is one small thing you could try out, just to see how it goes?",
];

const TOOL_SUFFIXES: &[&str] = &[
    " Tool: write down three tiny steps and circle the easiest one for today.",
    " Tip: set a 10-minute timer and do only the very first step.",
];
const HUMOR_ACTIVE: &[&str] = &[
    " And remember: even superheroes take coffee breaks 😄",
    " Small steps count too, even a penguin waddles somewhere 🐧",
];
const HUMOR_CALM: &[&str] = &[" No rush here, the tea is still warm 🍵", " Slow and steady, like a well-fed cat 🐈"];

fn pick(options: &'static [&'static str], seed: u64, salt: u64) -> &'static str {
    options[(seed.wrapping_add(salt) % options.len() as u64) as usize]
}

/// Builds replies from fixed template pools. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplyComposer;

impl ReplyComposer {
    pub fn compose(&self, style: &CommsStyle, req: &ReplyRequest<'_>) -> String {
        let mut out = String::new();
        out.push_str(reflection(req.emotion, style.mind, req.seed));

        let phase = match req.topic {
            Some(_) => Phase::Focus,
            None => req.phase,
        };
        match req.topic {
            Some(cue) => {
                if cue.fresh {
                    out.push_str(&format!("Let's stay with {} for a while. ", topics::label(cue.topic)));
                }
                let prompt = topics::prompt_at(cue.topic, cue.subtopic, cue.step)
                    .unwrap_or_else(|| phase_question(Phase::Focus, style, req.seed));
                out.push_str(prompt);
            }
            None => out.push_str(phase_question(phase, style, req.seed)),
        }

        if req.phase == Phase::Plan || style.detail == Detail::Steps {
            out.push_str(pick(TOOL_SUFFIXES, req.seed, 3));
        }

        let humor_allowed = req.humor
            && matches!(req.emotion, Emotion::Calm | Emotion::Neutral)
            && matches!(phase, Phase::Engage | Phase::Focus)
            && req.seed % 4 == 0;
        if humor_allowed {
            let pool = match style.tone {
                Tone::Active => HUMOR_ACTIVE,
                Tone::Calm => HUMOR_CALM,
            };
            out.push_str(pick(pool, req.seed, 5));
        }
        out
    }
}

fn reflection(emotion: Emotion, mind: Mind, seed: u64) -> &'static str {
    let pool = match (emotion, mind) {
        (Emotion::Tense, Mind::Feelings) => TENSE_FEELINGS,
        (Emotion::Tense, Mind::Analysis) => TENSE_ANALYSIS,
        (Emotion::Calm, Mind::Feelings) => CALM_FEELINGS,
        (Emotion::Calm, Mind::Analysis) => CALM_ANALYSIS,
        (Emotion::Uncertain, Mind::Feelings) => UNCERTAIN_FEELINGS,
        (Emotion::Uncertain, Mind::Analysis) => UNCERTAIN_ANALYSIS,
        (Emotion::Neutral, Mind::Feelings) => NEUTRAL_FEELINGS,
        (Emotion::Neutral, Mind::Analysis) => NEUTRAL_ANALYSIS,
    };
    pick(pool, seed, 0)
}

fn phase_question(phase: Phase, style: &CommsStyle, seed: u64) -> &'static str {
    let pool = match phase {
        Phase::Engage | Phase::Support => ENGAGE_QUESTIONS,
        Phase::Focus => FOCUS_QUESTIONS,
        Phase::Evoke => match style.detail {
            Detail::Meaning => EVOKE_MEANING,
            Detail::Steps => EVOKE_STEPS,
        },
        Phase::Plan => match style.plan {
            PlanStyle::Plan => PLAN_PLAN,
            PlanStyle::Experiment => PLAN_EXPERIMENT,
        },
    };
    pick(pool, seed, 1)
}

/// One-shot nudge back to the locked topic. The drifting message is not answered.
pub fn redirect_reply(topic: &str, subtopic: Option<&str>, step: u32) -> String {
    let prompt = topics::prompt_at(topic, subtopic, step).unwrap_or("Shall we continue where we stopped?");
    format!(
        "I hear that this matters to you too, and we can get to it. \
         Let's finish with {} first, so nothing gets lost. {}",
        topics::label(topic),
        prompt
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityGate;

    fn styles() -> Vec<CommsStyle> {
        let mut out = Vec::new();
        for ei in [0.2, 0.8] {
            for sn in [0.2, 0.8] {
                for tf in [0.2, 0.8] {
                    for jp in [0.2, 0.8] {
                        let mut p = PsychoProfile::neutral(1);
                        p.ei = ei;
                        p.sn = sn;
                        p.tf = tf;
                        p.jp = jp;
                        out.push(CommsStyle::from_profile(Some(&p), None));
                    }
                }
            }
        }
        out
    }

    #[test]
    fn neutral_style_without_profile() {
        let s = CommsStyle::from_profile(None, None);
        assert_eq!(s.tone, Tone::Active);
        assert_eq!(s.detail, Detail::Meaning);
        assert_eq!(s.mind, Mind::Analysis);
        assert_eq!(s.plan, PlanStyle::Plan);
        assert_eq!(CommsStyle::from_profile(None, Some(Detail::Steps)).detail, Detail::Steps);
    }

    #[test]
    fn every_composed_reply_passes_the_gate() {
        let composer = ReplyComposer;
        let gate = QualityGate::default();
        let emotions = [Emotion::Tense, Emotion::Calm, Emotion::Uncertain, Emotion::Neutral];
        for style in styles() {
            for emotion in emotions {
                for phase in Phase::all() {
                    for seed in 0..8u64 {
                        for topic in [None, Some(TopicCue { topic: "finance", subtopic: Some("debt"), step: 9, fresh: true })] {
                            let req = ReplyRequest { emotion, phase, topic, humor: true, seed };
                            let reply = composer.compose(&style, &req);
                            assert!(reply.chars().count() >= 60, "too short: {}", reply);
                            assert!(reply.contains('?'), "no question: {}", reply);
                            let verdict = gate.evaluate("hello", &reply, None);
                            assert!(verdict.accepted, "rejected {:?}: {}", verdict.failures, reply);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn same_seed_same_reply_and_reseed_changes_it() {
        let composer = ReplyComposer;
        let style = CommsStyle::from_profile(None, None);
        let req = ReplyRequest { emotion: Emotion::Neutral, phase: Phase::Engage, topic: None, humor: false, seed: 2 };
        assert_eq!(composer.compose(&style, &req), composer.compose(&style, &req));
        let next = ReplyRequest { seed: 3, ..req };
        assert_ne!(composer.compose(&style, &req), composer.compose(&style, &next));
    }

    #[test]
    fn humor_only_when_enabled_and_calm_enough() {
        let composer = ReplyComposer;
        let style = CommsStyle::from_profile(None, None);
        let base = ReplyRequest { emotion: Emotion::Calm, phase: Phase::Engage, topic: None, humor: true, seed: 0 };
        let with = composer.compose(&style, &base);
        assert!(HUMOR_ACTIVE.iter().any(|h| with.ends_with(h)));

        let off = composer.compose(&style, &ReplyRequest { humor: false, ..base });
        assert!(!HUMOR_ACTIVE.iter().any(|h| off.ends_with(h)));
        let tense = composer.compose(&style, &ReplyRequest { emotion: Emotion::Tense, ..base });
        assert!(!HUMOR_ACTIVE.iter().any(|h| tense.ends_with(h)));
    }

    #[test]
    fn topic_reply_uses_prompt_at_step() {
        let composer = ReplyComposer;
        let style = CommsStyle::from_profile(None, None);
        let cue = TopicCue { topic: "stress", subtopic: None, step: 1, fresh: false };
        let req = ReplyRequest { emotion: Emotion::Neutral, phase: Phase::Evoke, topic: Some(cue), humor: false, seed: 0 };
        let reply = composer.compose(&style, &req);
        assert!(reply.ends_with(topics::prompts_for("stress", None)[1]));
    }

    #[test]
    fn redirect_names_the_locked_topic() {
        let r = redirect_reply("finance", None, 0);
        assert!(r.contains("money and finances"));
        assert!(r.ends_with('?'));
    }
}

//! Onboarding: optional intro (name, mood, goal) and a six-question forced-choice
//! questionnaire that produces the initial profile.

use crate::profile::{Axis, PsychoProfile};
use crate::store::AppState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Names longer than this (in characters) are re-asked.
pub const MAX_NAME_CHARS: usize = 40;

const GREETING: &str = "Hi 🌿 I'm Anima, your personal psychological assistant. \
I help bring clarity, ease stress and find the next steps. \
Our conversations are confidential: no spam, only support 💛";

const ASK_NAME: &str = "How should I call you?";
const ASK_NAME_AGAIN: &str = "How should I call you? A short name is enough, one word will do 🙂";
const ASK_GOAL: &str = "Thank you for sharing. What would you like to get from our conversations? \
One sentence about your goal is enough.";
const QUESTIONNAIRE_INTRO: &str =
    "A short questionnaire will help me adapt to you (6 questions). Answer 1 or 2, or in your own words.";
const ANSWER_HINT: &str = "Answer 1 or 2, words are fine too.";

/// One forced-choice question.
#[derive(Debug)]
pub struct Question {
    pub key: &'static str,
    pub axis: Axis,
    pub prompt: &'static str,
    /// Whether option 1 selects the axis' high letter (E, N, T, J).
    pub option_one_high: bool,
    option_one_words: &'static [&'static str],
    option_two_words: &'static [&'static str],
}

const EI_ONE: &[&str] = &["people", "friend", "talk", "meet", "someone", "company", "social", "together"];
const EI_TWO: &[&str] = &["alone", "myself", "quiet", "silence", "solitude", "write"];
const SN_ONE: &[&str] = &["fact", "concrete", "step", "specific", "practical", "detail"];
const SN_TWO: &[&str] = &["meaning", "idea", "sense", "vision", "intuition", "big picture"];
const TF_ONE: &[&str] = &["logic", "argument", "reason", "rational", "head", "analy"];
const TF_TWO: &[&str] = &["feel", "emotion", "value", "heart", "harmony"];
const JP_ONE: &[&str] = &["plan", "list", "schedule", "control", "order", "advance", "organi"];
const JP_TWO: &[&str] = &["freedom", "free", "improvis", "spontan", "flexib", "see how", "flow"];

pub static QUESTIONS: [Question; 6] = [
    Question {
        key: "ei_q1",
        axis: Axis::Ei,
        prompt: "When you are tired, what helps you recover faster: 1) time with people 🌱 or 2) time alone ☁️?",
        option_one_high: true,
        option_one_words: EI_ONE,
        option_two_words: EI_TWO,
    },
    Question {
        key: "sn_q1",
        axis: Axis::Sn,
        prompt: "What is closer to you: 1) concrete steps and facts 🎯 or 2) an idea and its meaning ✨?",
        option_one_high: false,
        option_one_words: SN_ONE,
        option_two_words: SN_TWO,
    },
    Question {
        key: "tf_q1",
        axis: Axis::Tf,
        prompt: "How do you usually make decisions: 1) through logic and arguments 🧠 or 2) through feelings and values 💛?",
        option_one_high: true,
        option_one_words: TF_ONE,
        option_two_words: TF_TWO,
    },
    Question {
        key: "jp_q1",
        axis: Axis::Jp,
        prompt: "When do you feel calmer: 1) when everything is planned 📋 or 2) when there is freedom to improvise 🎲?",
        option_one_high: true,
        option_one_words: JP_ONE,
        option_two_words: JP_TWO,
    },
    Question {
        key: "jp_q2",
        axis: Axis::Jp,
        prompt: "When there are many tasks: 1) you make a list in advance or 2) you try things and see how it goes?",
        option_one_high: true,
        option_one_words: JP_ONE,
        option_two_words: JP_TWO,
    },
    Question {
        key: "ei_q2",
        axis: Axis::Ei,
        prompt: "When you need to sort something out: 1) you talk it through with someone or 2) you write your thoughts down?",
        option_one_high: true,
        option_one_words: EI_ONE,
        option_two_words: EI_TWO,
    },
];

/// Onboarding progress, stored in [`AppState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStage {
    #[default]
    NotStarted,
    AskingName,
    AskingMood,
    AskingGoal,
    Questionnaire {
        index: usize,
    },
    Complete,
}

impl OnboardingStage {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// `None` before the questionnaire starts, the position while answering,
    /// the question count once complete.
    pub fn question_index(&self) -> Option<usize> {
        match self {
            Self::Questionnaire { index } => Some(*index),
            Self::Complete => Some(QUESTIONS.len()),
            _ => None,
        }
    }
}

/// Result of feeding one message into onboarding.
#[derive(Debug, Clone, PartialEq)]
pub enum OnboardingStep {
    /// Onboarding continues; send this prompt.
    Prompt(String),
    /// Questionnaire finished; persist the profile and send the summary.
    Completed { profile: PsychoProfile, reply: String },
}

/// The onboarding state machine. Stateless apart from configuration; all
/// progress lives in [`AppState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Onboarding {
    intro: bool,
}

impl Onboarding {
    pub fn new(intro: bool) -> Self {
        Self { intro }
    }

    /// Greeting plus the first prompt. Resets answers; the message that
    /// triggered this is not an answer.
    pub fn start(&self, state: &mut AppState) -> String {
        state.onboarding_answers.clear();
        if self.intro {
            state.onboarding = OnboardingStage::AskingName;
            format!("{GREETING}\n\n{ASK_NAME}")
        } else {
            state.onboarding = OnboardingStage::Questionnaire { index: 0 };
            format!("{GREETING}\n\n{QUESTIONNAIRE_INTRO}\n\n{}", QUESTIONS[0].prompt)
        }
    }

    /// Consumes one message as the answer to the current prompt.
    pub fn advance(&self, user_id: i64, state: &mut AppState, text: &str) -> OnboardingStep {
        match state.onboarding {
            OnboardingStage::NotStarted | OnboardingStage::Complete => OnboardingStep::Prompt(self.start(state)),
            OnboardingStage::AskingName => {
                let name = text.trim();
                if !valid_name(name) {
                    return OnboardingStep::Prompt(ASK_NAME_AGAIN.to_string());
                }
                state.name = Some(name.to_string());
                state.onboarding = OnboardingStage::AskingMood;
                OnboardingStep::Prompt(format!(
                    "Nice to meet you, {name}! ✨ How are you feeling right now? \
                     Pick a word: calm, tense, confused, or describe it your own way."
                ))
            }
            OnboardingStage::AskingMood => {
                let mood = text.trim();
                if !mood.is_empty() {
                    state.mood = Some(mood.to_string());
                }
                state.onboarding = OnboardingStage::AskingGoal;
                OnboardingStep::Prompt(ASK_GOAL.to_string())
            }
            OnboardingStage::AskingGoal => {
                state.set_goal(text);
                state.onboarding = OnboardingStage::Questionnaire { index: 0 };
                OnboardingStep::Prompt(format!(
                    "Thank you! {QUESTIONNAIRE_INTRO}\n\n{}",
                    QUESTIONS[0].prompt
                ))
            }
            OnboardingStage::Questionnaire { index } => {
                let Some(question) = QUESTIONS.get(index) else {
                    return self.finish(user_id, state);
                };
                state
                    .onboarding_answers
                    .insert(question.key.to_string(), normalize_answer(question, text));
                let next = index + 1;
                if next < QUESTIONS.len() {
                    state.onboarding = OnboardingStage::Questionnaire { index: next };
                    OnboardingStep::Prompt(format!("{}\n\n{ANSWER_HINT}", QUESTIONS[next].prompt))
                } else {
                    self.finish(user_id, state)
                }
            }
        }
    }

    fn finish(&self, user_id: i64, state: &mut AppState) -> OnboardingStep {
        let profile = score_answers(user_id, &state.onboarding_answers);
        state.onboarding = OnboardingStage::Complete;
        let label = profile.mbti_type.clone().unwrap_or_else(|| profile.type_guess());
        let reply = format!(
            "Thank you, now I understand better how to talk with you 💛\n\
             Draft profile: {label}. Confidence {}%, and it will grow as we talk.\n\n\
             Tell me briefly: what would you like to work on or talk about today?",
            (profile.confidence * 100.0).round() as u32
        );
        OnboardingStep::Completed { profile, reply }
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().count() <= MAX_NAME_CHARS && !name.chars().any(|c| c.is_ascii_digit())
}

/// Maps a free-text answer to 1 or 2. Never rejects: unknown answers count as 1.
pub fn normalize_answer(question: &Question, text: &str) -> u8 {
    let lowered = text.trim().to_lowercase();
    let bare = lowered.trim_matches(|c: char| !c.is_alphanumeric());
    match bare {
        "1" | "one" | "first" | "the first" | "first one" => return 1,
        "2" | "two" | "second" | "the second" | "second one" => return 2,
        _ => {}
    }
    if bare.starts_with("1)") || bare.starts_with("1 ") {
        return 1;
    }
    if bare.starts_with("2)") || bare.starts_with("2 ") {
        return 2;
    }
    if question.option_one_words.iter().any(|w| lowered.contains(w)) {
        return 1;
    }
    if question.option_two_words.iter().any(|w| lowered.contains(w)) {
        return 2;
    }
    1
}

/// Tallies answers into axis shares and builds the initial profile.
pub fn score_answers(user_id: i64, answers: &BTreeMap<String, u8>) -> PsychoProfile {
    let mut high = BTreeMap::<Axis, u32>::new();
    let mut low = BTreeMap::<Axis, u32>::new();
    for question in &QUESTIONS {
        let picked_high = match answers.get(question.key) {
            Some(1) => question.option_one_high,
            Some(2) => !question.option_one_high,
            _ => continue,
        };
        let tally = if picked_high { &mut high } else { &mut low };
        *tally.entry(question.axis).or_default() += 1;
    }
    let share = |axis: Axis| -> f32 {
        let a = high.get(&axis).copied().unwrap_or(0);
        let b = low.get(&axis).copied().unwrap_or(0);
        // An axis nobody answered scores 0.0 and labels as the low pole.
        a as f32 / (a + b).max(1) as f32
    };
    PsychoProfile::from_questionnaire(
        user_id,
        share(Axis::Ei),
        share(Axis::Sn),
        share(Axis::Tf),
        share(Axis::Jp),
    )
}

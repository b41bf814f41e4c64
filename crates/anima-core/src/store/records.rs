//! Persisted record shapes. All records are JSON-encoded sled values.

use crate::classify::{Emotion, Phase};
use crate::compose::Detail;
use crate::focus::FocusState;
use crate::onboarding::OnboardingStage;
use crate::profile::AxisDeltas;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of the conversational state inside [`UserRecord::facts`].
pub const APP_STATE_KEY: &str = "app_state";

/// One chat user. `facts` is an open bag; `app_state` lives under [`APP_STATE_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub facts: serde_json::Map<String, serde_json::Value>,
}

impl UserRecord {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            created_at_ms: crate::now_ms(),
            ..Self::default()
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Conversational state; default when never written.
    pub fn app_state(&self) -> Result<AppState, serde_json::Error> {
        match self.facts.get(APP_STATE_KEY) {
            Some(value) => AppState::deserialize(value),
            None => Ok(AppState::default()),
        }
    }

    pub fn set_app_state(&mut self, state: &AppState) -> Result<(), serde_json::Error> {
        self.facts.insert(APP_STATE_KEY.to_string(), serde_json::to_value(state)?);
        Ok(())
    }
}

/// Per-user conversational state persisted between messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub onboarding: OnboardingStage,
    /// Questionnaire answers by question key; values are 1 or 2.
    pub onboarding_answers: BTreeMap<String, u8>,
    pub name: Option<String>,
    pub mood: Option<String>,
    pub session_goal: Option<String>,
    /// Hashed bag-of-words vector of `session_goal`.
    pub goal_vector: Option<Vec<f32>>,
    #[serde(flatten)]
    pub focus: FocusState,
    pub humor_on: bool,
    /// Explicit `/style` override of the profile-derived detail level.
    pub detail_preference: Option<Detail>,
}

impl AppState {
    pub fn onboarding_complete(&self) -> bool {
        self.onboarding.is_complete()
    }

    /// Questionnaire position, when the user is answering questions.
    pub fn onboarding_index(&self) -> Option<usize> {
        self.onboarding.question_index()
    }

    /// Sets the session goal and its vector together.
    pub fn set_goal(&mut self, goal: &str) {
        let goal = goal.trim();
        if goal.is_empty() {
            return;
        }
        self.goal_vector = Some(crate::goal::embed(goal));
        self.session_goal = Some(goal.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One logged message with its classification and quality metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogEvent {
    #[serde(default)]
    pub id: u64,
    pub user_id: i64,
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub emotion: Option<Emotion>,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub relevance: bool,
    #[serde(default)]
    pub axes: Option<AxisDeltas>,
    /// Quality score in [0, 1] for assistant replies that went through the gate.
    #[serde(default)]
    pub quality: Option<f32>,
    /// Similarity of the user message to the session goal.
    #[serde(default)]
    pub on_topic: Option<f32>,
    /// True for safety interceptions (crisis or sensitive).
    #[serde(default)]
    pub safety: bool,
    pub created_at_ms: i64,
}

impl DialogEvent {
    fn now(user_id: i64, role: Role, text: impl Into<String>, phase: Phase) -> Self {
        Self {
            id: 0,
            user_id,
            role,
            text: text.into(),
            emotion: None,
            phase,
            topic: None,
            relevance: false,
            axes: None,
            quality: None,
            on_topic: None,
            safety: false,
            created_at_ms: crate::now_ms(),
        }
    }

    pub fn user(user_id: i64, text: impl Into<String>, phase: Phase) -> Self {
        Self::now(user_id, Role::User, text, phase)
    }

    pub fn assistant(user_id: i64, text: impl Into<String>, phase: Phase) -> Self {
        Self::now(user_id, Role::Assistant, text, phase)
    }

    pub fn with_emotion(mut self, emotion: Emotion) -> Self {
        self.emotion = Some(emotion);
        self
    }

    pub fn with_topic(mut self, topic: Option<String>) -> Self {
        self.topic = topic;
        self
    }

    pub fn with_axes(mut self, axes: AxisDeltas) -> Self {
        self.relevance = !axes.is_empty();
        self.axes = (!axes.is_empty()).then_some(axes);
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_on_topic(mut self, on_topic: Option<f32>) -> Self {
        self.on_topic = on_topic;
        self
    }

    pub fn flagged_safety(mut self) -> Self {
        self.safety = true;
        self
    }

    pub fn at(mut self, created_at_ms: i64) -> Self {
        self.created_at_ms = created_at_ms;
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Axis;

    #[test]
    fn app_state_survives_the_facts_bag() {
        let mut state = AppState::default();
        state.name = Some("Ann".into());
        state.focus.current_topic = Some("finance".into());
        state.focus.topic_locked = true;
        state.set_goal("pay off my debts");

        let mut user = UserRecord::new(5);
        user.facts.insert("other".into(), serde_json::json!(1));
        user.set_app_state(&state).unwrap();

        let decoded = UserRecord::from_bytes(&user.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.app_state().unwrap(), state);
        assert_eq!(decoded.facts.get("other"), Some(&serde_json::json!(1)));
        // Focus fields are stored flat next to the other state keys.
        assert_eq!(decoded.facts[APP_STATE_KEY]["current_topic"], "finance");
    }

    #[test]
    fn missing_and_partial_state_fall_back_to_defaults() {
        let mut user = UserRecord::new(1);
        assert_eq!(user.app_state().unwrap(), AppState::default());
        user.facts.insert(APP_STATE_KEY.into(), serde_json::json!({"humor_on": true}));
        let state = user.app_state().unwrap();
        assert!(state.humor_on);
        assert!(!state.onboarding_complete());
    }

    #[test]
    fn axes_builder_sets_relevance() {
        let axes: AxisDeltas = [(Axis::Jp, 0.2)].into_iter().collect();
        let e = DialogEvent::user(1, "plan", Phase::Focus).with_axes(axes);
        assert!(e.relevance);
        let e = DialogEvent::user(1, "hi", Phase::Focus).with_axes(AxisDeltas::new());
        assert!(!e.relevance);
        assert!(e.axes.is_none());
    }
}

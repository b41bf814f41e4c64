//! Topic focus: keeps the conversation on one topic until the user insists
//! on another one.

use crate::classify::{IntentClassifier, IntentMatch};
use crate::topics;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Focus fields of [`crate::AppState`] (stored flat alongside the other state keys).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusState {
    pub current_topic: Option<String>,
    pub current_subtopic: Option<String>,
    pub topic_step: u32,
    pub topic_locked: bool,
    pub topic_reminded: bool,
    /// Single history slot for "go back", restored together with its sub-topic.
    pub previous_topic: Option<String>,
    pub previous_subtopic: Option<String>,
}

/// Locked (topic, sub-topic) view of a [`FocusState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedTopic<'a> {
    pub topic: &'a str,
    pub subtopic: Option<&'a str>,
    pub step: u32,
}

impl FocusState {
    pub fn current(&self) -> Option<LockedTopic<'_>> {
        if !self.topic_locked {
            return None;
        }
        self.current_topic.as_deref().map(|topic| LockedTopic {
            topic,
            subtopic: self.current_subtopic.as_deref(),
            step: self.topic_step,
        })
    }

    /// Locks `topic` at step 0. The replaced topic moves to the history slot.
    fn lock(&mut self, topic: &str, subtopic: Option<&str>) {
        if let Some(old) = self.current_topic.take() {
            if self.topic_locked && old != topic {
                self.previous_topic = Some(old);
                self.previous_subtopic = self.current_subtopic.take();
            }
        }
        self.current_topic = Some(topic.to_string());
        self.current_subtopic = subtopic.map(str::to_string);
        self.topic_step = 0;
        self.topic_locked = true;
        self.topic_reminded = false;
    }

    fn clear(&mut self) {
        if self.topic_locked {
            if let Some(old) = self.current_topic.take() {
                self.previous_topic = Some(old);
                self.previous_subtopic = self.current_subtopic.take();
            }
        }
        self.current_topic = None;
        self.current_subtopic = None;
        self.topic_step = 0;
        self.topic_locked = false;
        self.topic_reminded = false;
    }
}

/// What the controller decided for one ordinary message.
#[derive(Debug, Clone, PartialEq)]
pub enum FocusDecision {
    /// No topic locked and nothing detected.
    Unfocused,
    /// A topic was detected and is now locked at step 0.
    Adopted { topic: String },
    /// Stayed on the locked topic; `step` is the new prompt index.
    OnTopic { step: u32 },
    /// Drift detected for the first time: nudge back, do not answer.
    Redirect { current: String, proposed: String },
    /// Drift after a redirect: the new topic is locked at step 0.
    Switched { from: String, topic: String },
}

/// Explicit topic commands; they bypass the classifier's threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusCommand {
    SwitchTo(String),
    GoBack,
    Clear,
}

static SWITCH: LazyLock<Regex> =
    LazyLock::new(|| crate::classify::compile(r"(?i)^\s*(?:/topic\s+|switch\s+to\s+|let'?s\s+switch\s+to\s+)(?P<target>.+?)\s*[.!?]*\s*$"));
static GO_BACK: LazyLock<Regex> =
    LazyLock::new(|| crate::classify::compile(r"(?i)^\s*(?:/back|go\s+back|let'?s\s+go\s+back)\s*[.!?]*\s*$"));
static CLEAR: LazyLock<Regex> =
    LazyLock::new(|| crate::classify::compile(r"(?i)^\s*(?:/clear|clear\s+(?:the\s+)?topic)\s*[.!?]*\s*$"));

pub fn parse_command(text: &str) -> Option<FocusCommand> {
    if GO_BACK.is_match(text) {
        return Some(FocusCommand::GoBack);
    }
    if CLEAR.is_match(text) {
        return Some(FocusCommand::Clear);
    }
    SWITCH
        .captures(text)
        .map(|caps| FocusCommand::SwitchTo(caps["target"].to_string()))
}

/// Outcome of an explicit topic command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Switched { topic: String },
    Restored { topic: String },
    Cleared,
    NothingToRestore,
    UnknownTopic(String),
}

impl CommandOutcome {
    pub fn reply(&self) -> String {
        match self {
            Self::Switched { topic } | Self::Restored { topic } => {
                let prompt = topics::prompt_at(topic, None, 0).unwrap_or("What would you like to start with?");
                format!("Okay, let's talk about {}. {}", topics::label(topic), prompt)
            }
            Self::Cleared => {
                "Okay, no fixed topic for now. What is on your mind right now?".to_string()
            }
            Self::NothingToRestore => {
                "There is no earlier topic to go back to yet. What would you like to talk about?".to_string()
            }
            Self::UnknownTopic(raw) => {
                let known: Vec<&str> = topics::TOPICS.iter().map(|t| t.aliases[0]).collect();
                format!(
                    "I'm not sure which topic \"{}\" is. I can focus on: {}. Which one would you like?",
                    raw,
                    known.join(", ")
                )
            }
        }
    }
}

/// Locks, advances and redirects topics against a detection threshold.
#[derive(Debug, Clone, Copy)]
pub struct FocusController {
    threshold: f32,
}

impl FocusController {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Updates `focus` for one ordinary message given the classifier's best match.
    pub fn observe(&self, focus: &mut FocusState, detected: Option<&IntentMatch>) -> FocusDecision {
        let strong = detected.filter(|m| m.score >= self.threshold);
        let locked = focus
            .current()
            .map(|c| (c.topic.to_string(), c.subtopic.map(str::to_string)));
        let Some((current_topic, current_sub)) = locked else {
            return match strong {
                Some(m) => {
                    focus.lock(&m.topic, m.subtopic.as_deref());
                    FocusDecision::Adopted { topic: m.topic.clone() }
                }
                None => FocusDecision::Unfocused,
            };
        };

        let drift = strong.filter(|m| {
            m.topic != current_topic
                || matches!((&current_sub, &m.subtopic), (Some(a), Some(b)) if a != b)
        });

        match drift {
            Some(m) if !focus.topic_reminded => {
                focus.topic_reminded = true;
                FocusDecision::Redirect {
                    current: current_topic,
                    proposed: m.topic.clone(),
                }
            }
            Some(m) => {
                focus.lock(&m.topic, m.subtopic.as_deref());
                FocusDecision::Switched {
                    from: current_topic,
                    topic: m.topic.clone(),
                }
            }
            None => {
                if let Some(m) = strong {
                    if current_sub.is_none() && m.subtopic.is_some() {
                        focus.current_subtopic = m.subtopic.clone();
                    }
                }
                focus.topic_step = focus.topic_step.saturating_add(1);
                focus.topic_reminded = false;
                FocusDecision::OnTopic { step: focus.topic_step }
            }
        }
    }

    /// Applies an explicit command. Topic names resolve by alias first, then via the classifier.
    pub fn apply_command(
        &self,
        focus: &mut FocusState,
        command: FocusCommand,
        classifier: &IntentClassifier,
    ) -> CommandOutcome {
        match command {
            FocusCommand::SwitchTo(raw) => {
                let resolved = topics::topic_by_alias(&raw)
                    .map(|t| (t.name.to_string(), None))
                    .or_else(|| classifier.detect(&raw).map(|m| (m.topic, m.subtopic)));
                match resolved {
                    Some((topic, subtopic)) => {
                        focus.lock(&topic, subtopic.as_deref());
                        CommandOutcome::Switched { topic }
                    }
                    None => CommandOutcome::UnknownTopic(raw),
                }
            }
            FocusCommand::GoBack => match focus.previous_topic.take() {
                Some(previous) => {
                    let (current, current_sub) = if focus.topic_locked {
                        (focus.current_topic.take(), focus.current_subtopic.take())
                    } else {
                        (None, None)
                    };
                    focus.current_topic = Some(previous.clone());
                    focus.current_subtopic = focus.previous_subtopic.take();
                    focus.topic_step = 0;
                    focus.topic_locked = true;
                    focus.topic_reminded = false;
                    focus.previous_topic = current;
                    focus.previous_subtopic = current_sub;
                    CommandOutcome::Restored { topic: previous }
                }
                None => CommandOutcome::NothingToRestore,
            },
            FocusCommand::Clear => {
                focus.clear();
                CommandOutcome::Cleared
            }
        }
    }
}

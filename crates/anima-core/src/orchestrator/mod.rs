//! Webhook orchestrator: runs one inbound update through idempotency, safety,
//! commands, onboarding and the dialogue pipeline, then persists and replies.

mod locks;
mod sender;

pub use locks::UserLocks;
pub use sender::{DryRunSender, MessageSender};

use crate::classify::{
    choose_phase, detect_emotion, detect_relevance, is_crisis, is_sensitive, IntentClassifier, Phase,
};
use crate::commands::{self, Command};
use crate::compose::{self, CommsStyle, Detail, ReplyComposer, ReplyRequest, TopicCue};
use crate::error::{EngineError, StoreError};
use crate::focus::{FocusController, FocusDecision};
use crate::homework::{self, HomeworkCommand, HomeworkStatus};
use crate::onboarding::{Onboarding, OnboardingStep};
use crate::quality::QualityGate;
use crate::shared::AnimaConfig;
use crate::store::{AppState, DialogEvent, ProfileStore};
use crate::telegram::{TelegramMessage, TelegramUpdate};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const CRISIS_REPLY: &str = "I'm really glad you told me, and I'm here with you. You matter, and you don't have to \
carry this alone. If you might be in danger right now, please call your local emergency number or a crisis line, \
or reach out to someone you trust nearby. Would you tell me where you are right now and whether someone is with you?";

pub const SENSITIVE_REPLY: &str = "I hear that this is important to you. I don't discuss politics, religion, violence \
or medical questions, because I can't give reliable help there. Would you like to talk about how this situation \
affects you and what you feel about it?";

pub const APOLOGY_REPLY: &str = "Sorry, something went wrong on my side. Please try again in a moment.";

/// How many alternative seeds are tried when a draft repeats the previous reply.
const DUPLICATE_RESEEDS: u64 = 4;

/// Engine tuning taken from [`AnimaConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub intent_threshold: f32,
    pub quality_min_len: usize,
    pub quality_max_len: usize,
    pub onboarding_intro: bool,
    /// Pipelines allowed to use the store at once.
    pub pool_size: usize,
    /// Longest wait for a store slot before the update is refused.
    pub store_timeout: Duration,
}

impl From<&AnimaConfig> for EngineSettings {
    fn from(cfg: &AnimaConfig) -> Self {
        Self {
            intent_threshold: cfg.intent_threshold,
            quality_min_len: cfg.quality_min_len,
            quality_max_len: cfg.quality_max_len,
            onboarding_intro: cfg.onboarding_intro,
            pool_size: cfg.db_pool_max.max(1),
            store_timeout: Duration::from_secs(cfg.db_command_timeout_secs),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&AnimaConfig::default())
    }
}

/// What happened to one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// `update_id` was already processed.
    Duplicate,
    /// No message, or a message without text.
    Ignored,
    Crisis,
    Sensitive,
    Command,
    Onboarding,
    /// One-shot nudge back to the locked topic.
    Redirected,
    Replied,
    /// The pipeline failed after idempotency; an apology was sent.
    Failed,
}

impl UpdateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Ignored => "ignored",
            Self::Crisis => "crisis",
            Self::Sensitive => "sensitive",
            Self::Command => "command",
            Self::Onboarding => "onboarding",
            Self::Redirected => "redirected",
            Self::Replied => "replied",
            Self::Failed => "failed",
        }
    }

    /// Value of `ok` in the webhook response.
    pub fn ok(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// The conversation engine. Store, transport and settings are injected.
pub struct ConversationEngine {
    store: Arc<ProfileStore>,
    sender: Arc<dyn MessageSender>,
    settings: EngineSettings,
    locks: UserLocks,
    pool: Arc<Semaphore>,
    intents: IntentClassifier,
    focus: FocusController,
    composer: ReplyComposer,
    gate: QualityGate,
    onboarding: Onboarding,
}

impl ConversationEngine {
    pub fn new(store: Arc<ProfileStore>, sender: Arc<dyn MessageSender>, settings: EngineSettings) -> Self {
        Self {
            pool: Arc::new(Semaphore::new(settings.pool_size.max(1))),
            intents: IntentClassifier::new(),
            focus: FocusController::new(settings.intent_threshold),
            composer: ReplyComposer,
            gate: QualityGate::new(settings.quality_min_len, settings.quality_max_len),
            onboarding: Onboarding::new(settings.onboarding_intro),
            locks: UserLocks::new(),
            store,
            sender,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Handles one inbound update. `Err` only when idempotency could not be
    /// checked; later failures are answered with an apology and reported as
    /// [`UpdateOutcome::Failed`].
    ///
    /// A store slot is held only while the store is used, never while
    /// waiting on the user's lock or on the outbound send.
    pub async fn handle_update(&self, update: TelegramUpdate) -> Result<UpdateOutcome, EngineError> {
        if let Some(update_id) = update.update_id {
            let _slot = self.store_slot().await.map_err(EngineError::Unavailable)?;
            let first_time = self
                .store
                .mark_update_processed(update_id)
                .map_err(EngineError::Unavailable)?;
            if !first_time {
                tracing::info!(target: "anima::engine", update_id, "duplicate update skipped");
                return Ok(UpdateOutcome::Duplicate);
            }
        }

        let Some(message) = update.message else {
            return Ok(UpdateOutcome::Ignored);
        };
        let user_id = message.chat.id;
        let text = message.text.as_deref().unwrap_or("").trim().to_string();

        let _guard = self.locks.lock(user_id).await;
        let turn = match self.store_slot().await {
            Ok(_slot) => self.process(user_id, &message, &text),
            Err(e) => Err(e),
        };
        let outcome = match turn {
            Ok(Turn { outcome, reply }) => {
                if let Some(reply) = reply {
                    self.deliver(user_id, &reply).await;
                }
                outcome
            }
            Err(e) => {
                tracing::error!(target: "anima::engine", user_id, error = %e, "message pipeline failed");
                self.deliver(user_id, APOLOGY_REPLY).await;
                UpdateOutcome::Failed
            }
        };
        tracing::info!(target: "anima::engine", user_id, outcome = outcome.as_str(), "update handled");
        Ok(outcome)
    }

    /// Waits at most `store_timeout` for a store slot.
    async fn store_slot(&self) -> Result<OwnedSemaphorePermit, StoreError> {
        match tokio::time::timeout(self.settings.store_timeout, self.pool.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(StoreError::Unavailable("store pool closed".into())),
            Err(_) => {
                tracing::warn!(target: "anima::engine", "timed out waiting for a store slot");
                Err(StoreError::Unavailable("timed out waiting for a store slot".into()))
            }
        }
    }

    /// Store-bound part of the pipeline. Returns the reply instead of sending it.
    fn process(&self, user_id: i64, message: &TelegramMessage, text: &str) -> Result<Turn, StoreError> {
        let from = message.from.clone().unwrap_or_default();
        if let Err(e) = self.store.ensure_user(
            user_id,
            from.username.as_deref(),
            from.first_name.as_deref(),
            from.last_name.as_deref(),
        ) {
            tracing::warn!(target: "anima::engine", user_id, error = %e, "could not upsert user");
        }
        if text.is_empty() {
            return Ok(Turn::silent(UpdateOutcome::Ignored));
        }

        if is_crisis(text) {
            return self.intercept(user_id, text, CRISIS_REPLY, Phase::Support, UpdateOutcome::Crisis);
        }
        if is_sensitive(text) {
            return self.intercept(user_id, text, SENSITIVE_REPLY, Phase::Engage, UpdateOutcome::Sensitive);
        }

        let mut state = self.store.app_state(user_id)?;
        if let Some(command) = commands::parse(text) {
            if let Some(turn) = self.run_command(user_id, &mut state, command)? {
                return Ok(turn);
            }
        }
        if commands::asks_for_humor(text) && !state.humor_on {
            state.humor_on = true;
            tracing::debug!(target: "anima::engine", user_id, "humor switched on by phrase");
        }

        if !state.onboarding_complete() {
            return self.onboard(user_id, &mut state, text);
        }
        self.converse(user_id, state, text)
    }

    /// Safety interception: fixed reply, both turns logged, nothing else runs.
    fn intercept(
        &self,
        user_id: i64,
        text: &str,
        reply: &str,
        phase: Phase,
        outcome: UpdateOutcome,
    ) -> Result<Turn, StoreError> {
        tracing::warn!(target: "anima::engine", user_id, phase = phase.as_str(), "safety interception");
        self.store.log_event(
            DialogEvent::user(user_id, text, phase)
                .with_emotion(detect_emotion(text))
                .flagged_safety(),
        )?;
        self.respond(outcome, reply, DialogEvent::assistant(user_id, reply, phase).flagged_safety())
    }

    /// `Ok(None)` lets the message continue down the pipeline.
    fn run_command(&self, user_id: i64, state: &mut AppState, command: Command) -> Result<Option<Turn>, StoreError> {
        let reply = match command {
            Command::Start => {
                *state = AppState {
                    humor_on: state.humor_on,
                    detail_preference: state.detail_preference,
                    ..AppState::default()
                };
                let greeting = self.onboarding.start(state);
                self.store.set_app_state(user_id, state)?;
                let event = DialogEvent::assistant(user_id, &greeting, Phase::Engage);
                return self.respond(UpdateOutcome::Onboarding, &greeting, event).map(Some);
            }
            Command::Humor(on) => {
                state.humor_on = on;
                if on {
                    "Humor is on 😊 I'll add a light touch now and then. What would you like to talk about?".to_string()
                } else {
                    "Okay, no jokes for now. What would you like to talk about?".to_string()
                }
            }
            Command::Homework(cmd) => self.homework_reply(user_id, cmd)?,
            Command::Style(detail) => {
                state.detail_preference = detail;
                match detail {
                    Some(Detail::Steps) => "Got it: I'll keep things concrete, step by step.".to_string(),
                    Some(Detail::Meaning) => "Got it: I'll focus more on ideas and meaning.".to_string(),
                    None => "Got it: I'll adapt my style to your profile again.".to_string(),
                }
            }
            Command::Goal(Some(goal)) => {
                state.set_goal(&goal);
                format!("Got it, your goal is: \"{}\". I'll keep it in mind as we talk.", goal.trim())
            }
            Command::Goal(None) => match &state.session_goal {
                Some(goal) => format!("Your current goal: \"{goal}\". Set a new one with /goal <text>."),
                None => "You haven't set a goal yet. Set one with /goal <text>.".to_string(),
            },
            Command::Focus(cmd) => {
                if !state.onboarding_complete() {
                    return Ok(None);
                }
                self.focus.apply_command(&mut state.focus, cmd, &self.intents).reply()
            }
            Command::Usage(text) => text.to_string(),
        };
        self.store.set_app_state(user_id, state)?;
        let phase = self.last_phase(user_id)?;
        let event = DialogEvent::assistant(user_id, &reply, phase);
        self.respond(UpdateOutcome::Command, &reply, event).map(Some)
    }

    fn homework_reply(&self, user_id: i64, command: HomeworkCommand) -> Result<String, StoreError> {
        let reply = match command {
            HomeworkCommand::Add { text, due } => {
                let task = self.store.add_homework(user_id, &text, due)?;
                match task.due {
                    Some(due) => format!("Added to your homework: \"{}\" (due {}). You've got this 💪", task.text, due),
                    None => format!("Added to your homework: \"{}\". You've got this 💪", task.text),
                }
            }
            HomeworkCommand::List => homework::render_list(&self.store.open_homework(user_id)?),
            HomeworkCommand::Done(n) => self.close_homework(user_id, n, HomeworkStatus::Done)?,
            HomeworkCommand::Delete(n) => self.close_homework(user_id, n, HomeworkStatus::Deleted)?,
            HomeworkCommand::Usage => homework::USAGE.to_string(),
        };
        Ok(reply)
    }

    /// Marks the `n`-th open task (1-based) done or deleted.
    fn close_homework(&self, user_id: i64, n: usize, status: HomeworkStatus) -> Result<String, StoreError> {
        let open = self.store.open_homework(user_id)?;
        let Some(mut task) = n.checked_sub(1).and_then(|i| open.into_iter().nth(i)) else {
            return Ok(format!("There is no open task number {n}. Use /hw list to see them."));
        };
        task.status = status;
        self.store.put_homework(&task)?;
        Ok(match status {
            HomeworkStatus::Done => format!("Well done! \"{}\" is marked as finished 🎉", task.text),
            _ => format!("Removed \"{}\" from your homework.", task.text),
        })
    }

    fn onboard(&self, user_id: i64, state: &mut AppState, text: &str) -> Result<Turn, StoreError> {
        let reply = match self.onboarding.advance(user_id, state, text) {
            OnboardingStep::Prompt(prompt) => prompt,
            OnboardingStep::Completed { profile, reply } => {
                self.store.put_profile(&profile)?;
                tracing::info!(
                    target: "anima::engine",
                    user_id,
                    mbti = profile.mbti_type.as_deref().unwrap_or("-"),
                    "onboarding complete"
                );
                reply
            }
        };
        self.store.set_app_state(user_id, state)?;
        let event = DialogEvent::assistant(user_id, &reply, Phase::Engage);
        self.respond(UpdateOutcome::Onboarding, &reply, event)
    }

    fn converse(&self, user_id: i64, mut state: AppState, text: &str) -> Result<Turn, StoreError> {
        let emotion = detect_emotion(text);
        let signal = detect_relevance(text);
        let profile = if signal.relevant() {
            Some(self.store.update_profile(user_id, &signal.deltas, signal.anchors.clone())?)
        } else {
            self.store.profile(user_id)?
        };

        let detected = self.intents.detect(text);
        let decision = self.focus.observe(&mut state.focus, detected.as_ref());
        let phase = choose_phase(self.last_phase(user_id)?, emotion, text);
        let locked_topic = state.focus.current().map(|c| c.topic.to_string());
        let user_event = DialogEvent::user(user_id, text, phase)
            .with_emotion(emotion)
            .with_topic(locked_topic.clone())
            .with_axes(signal.deltas);

        if let FocusDecision::Redirect { current, proposed } = &decision {
            tracing::info!(target: "anima::engine", user_id, current = %current, proposed = %proposed, "topic drift redirected");
            let reply = compose::redirect_reply(current, state.focus.current_subtopic.as_deref(), state.focus.topic_step);
            self.store.set_app_state(user_id, &state)?;
            self.store.log_event(user_event)?;
            let event = DialogEvent::assistant(user_id, &reply, phase).with_topic(locked_topic);
            return self.respond(UpdateOutcome::Redirected, &reply, event);
        }

        let fresh_topic = matches!(decision, FocusDecision::Adopted { .. } | FocusDecision::Switched { .. });
        if fresh_topic && state.session_goal.is_none() {
            state.set_goal(text);
        }

        let style = CommsStyle::from_profile(profile.as_ref(), state.detail_preference);
        let previous = self.store.last_assistant_event(user_id)?.map(|e| e.text);
        let base_seed = variant_seed(user_id, self.store.event_count(user_id)?);
        let cue = state.focus.current().map(|c| TopicCue {
            topic: c.topic,
            subtopic: c.subtopic,
            step: c.step,
            fresh: fresh_topic,
        });
        let mut draft = String::new();
        for bump in 0..DUPLICATE_RESEEDS {
            let request = ReplyRequest {
                emotion,
                phase,
                topic: cue,
                humor: state.humor_on,
                seed: base_seed.wrapping_add(bump),
            };
            draft = self.composer.compose(&style, &request);
            if previous.as_deref() != Some(draft.as_str()) {
                break;
            }
        }

        let verdict = self.gate.evaluate(text, &draft, state.goal_vector.as_deref());
        self.store.set_app_state(user_id, &state)?;
        self.store.log_event(user_event.with_on_topic(verdict.on_topic))?;
        tracing::debug!(
            target: "anima::engine",
            user_id,
            emotion = emotion.as_str(),
            phase = phase.as_str(),
            quality = verdict.score,
            accepted = verdict.accepted,
            "reply composed"
        );
        let event = DialogEvent::assistant(user_id, &verdict.reply, phase)
            .with_topic(locked_topic)
            .with_quality(verdict.score);
        self.respond(UpdateOutcome::Replied, &verdict.reply, event)
    }

    fn last_phase(&self, user_id: i64) -> Result<Phase, StoreError> {
        Ok(self.store.last_event(user_id)?.map(|e| e.phase).unwrap_or_default())
    }

    /// Logs the assistant turn; the caller sends it once the store slot is released.
    fn respond(&self, outcome: UpdateOutcome, text: &str, event: DialogEvent) -> Result<Turn, StoreError> {
        self.store.log_event(event)?;
        Ok(Turn {
            outcome,
            reply: Some(text.to_string()),
        })
    }

    /// Sends without failing the pipeline: transport errors are logged and dropped.
    async fn deliver(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.sender.send(chat_id, text).await {
            tracing::warn!(target: "anima::telegram", chat_id, error = %e, "send failed");
        }
    }

    /// Sends one reminder per due task per day. Returns the number sent.
    pub async fn sweep_reminders(&self, today: NaiveDate) -> Result<usize, StoreError> {
        let due: Vec<_> = {
            let _slot = self.store_slot().await?;
            self.store
                .all_open_homework()?
                .into_iter()
                .filter(|t| t.needs_reminder(today))
                .collect()
        };
        let mut sent = 0;
        for task in due {
            let _guard = self.locks.lock(task.user_id).await;
            let reminder = {
                let _slot = self.store_slot().await?;
                // Re-read under the lock: the task may have been closed meanwhile.
                let current = self
                    .store
                    .open_homework(task.user_id)?
                    .into_iter()
                    .find(|t| t.id == task.id);
                let Some(mut current) = current.filter(|t| t.needs_reminder(today)) else {
                    continue;
                };
                current.last_reminded = Some(today);
                self.store.put_homework(&current)?;
                current.reminder_text()
            };
            self.deliver(task.user_id, &reminder).await;
            sent += 1;
        }
        let pruned = self.locks.prune();
        tracing::info!(target: "anima::daemon", reminders = sent, pruned_locks = pruned, "homework reminder sweep");
        Ok(sent)
    }
}

/// Outcome of the store-bound pipeline and the reply it produced.
struct Turn {
    outcome: UpdateOutcome,
    reply: Option<String>,
}

impl Turn {
    fn silent(outcome: UpdateOutcome) -> Self {
        Self { outcome, reply: None }
    }
}

fn variant_seed(user_id: i64, event_count: usize) -> u64 {
    (user_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ event_count as u64
}

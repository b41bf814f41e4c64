//! ANIMA core: a rule-based conversational assistant behind a chat webhook.
//!
//! Pipeline per inbound update: idempotency, safety, commands, onboarding,
//! then classification, topic focus, reply composition and the quality gate.

pub mod classify;
pub mod commands;
pub mod compose;
mod error;
pub mod focus;
pub mod goal;
pub mod homework;
pub mod onboarding;
pub mod orchestrator;
pub mod profile;
pub mod quality;
pub mod reports;
pub mod shared;
pub mod store;
pub mod telegram;
pub mod topics;

pub use classify::{detect_emotion, detect_relevance, is_crisis, is_sensitive, Emotion, Phase};
pub use error::{EngineError, SendError, StoreError};
pub use orchestrator::{ConversationEngine, DryRunSender, EngineSettings, MessageSender, UpdateOutcome};
pub use profile::{Anchor, Axis, AxisDeltas, PsychoProfile};
pub use shared::AnimaConfig;
pub use store::{AppState, Collection, DialogEvent, ProfileStore, Role, UserRecord};
pub use telegram::{TelegramChat, TelegramMessage, TelegramUpdate, TelegramUser};

/// Wall clock in Unix milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

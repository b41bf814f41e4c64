//! Slash commands and command-like phrases.

use crate::compose::Detail;
use crate::focus::{self, FocusCommand};
use crate::homework::{self, HomeworkCommand};
use regex::Regex;
use std::sync::LazyLock;

pub const STYLE_USAGE: &str = "Style commands: /style steps (concrete steps), /style meaning (ideas and meaning), /style auto (follow your profile).";
pub const HUMOR_USAGE: &str = "Humor commands: /humor on or /humor off.";

static HUMOR_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    crate::classify::compile(r"(?i)(\btell (me )?a joke\b|\ba bit of humou?r\b|\bmake me laugh\b|\bsome humou?r\b)")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reset onboarding and focus, then greet again.
    Start,
    Humor(bool),
    Homework(HomeworkCommand),
    /// `None` returns to the profile-derived detail level.
    Style(Option<Detail>),
    /// `None` shows the current goal.
    Goal(Option<String>),
    Focus(FocusCommand),
    /// Malformed command; reply with this usage text.
    Usage(&'static str),
}

/// Parses a message into a command. Plain conversation yields `None`.
pub fn parse(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if let Some(cmd) = homework::parse_command(trimmed) {
        return Some(Command::Homework(cmd));
    }
    if let Some(cmd) = focus::parse_command(trimmed) {
        return Some(Command::Focus(cmd));
    }
    if !trimmed.starts_with('/') {
        return None;
    }
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or("").to_lowercase();
    // Telegram appends "@botname" to commands in groups.
    let head = head.split('@').next().unwrap_or("").to_string();
    let arg = parts.next().unwrap_or("").trim();
    let cmd = match head.as_str() {
        "/start" => Command::Start,
        "/humor" | "/humour" => match arg.to_lowercase().as_str() {
            "on" => Command::Humor(true),
            "off" => Command::Humor(false),
            _ => Command::Usage(HUMOR_USAGE),
        },
        "/style" => match arg.to_lowercase().as_str() {
            "steps" => Command::Style(Some(Detail::Steps)),
            "meaning" => Command::Style(Some(Detail::Meaning)),
            "auto" => Command::Style(None),
            _ => Command::Usage(STYLE_USAGE),
        },
        "/goal" => Command::Goal((!arg.is_empty()).then(|| arg.to_string())),
        _ => return None,
    };
    Some(cmd)
}

/// "Tell me a joke" and similar phrases switch humor on without a slash command.
pub fn asks_for_humor(text: &str) -> bool {
    HUMOR_PHRASE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_slash_commands() {
        assert_eq!(parse("/start"), Some(Command::Start));
        assert_eq!(parse("/start@anima_bot"), Some(Command::Start));
        assert_eq!(parse("/humor OFF"), Some(Command::Humor(false)));
        assert_eq!(parse("/humor maybe"), Some(Command::Usage(HUMOR_USAGE)));
        assert_eq!(parse("/style steps"), Some(Command::Style(Some(Detail::Steps))));
        assert_eq!(parse("/style auto"), Some(Command::Style(None)));
        assert_eq!(parse("/goal sleep better"), Some(Command::Goal(Some("sleep better".into()))));
        assert_eq!(parse("/goal"), Some(Command::Goal(None)));
        assert_eq!(parse("/hw list"), Some(Command::Homework(HomeworkCommand::List)));
        assert_eq!(parse("/topic money"), Some(Command::Focus(FocusCommand::SwitchTo("money".into()))));
    }

    #[test]
    fn plain_text_and_unknown_commands_are_not_commands() {
        assert_eq!(parse("hello"), None);
        assert_eq!(parse("/unknown"), None);
    }

    #[test]
    fn humor_phrases() {
        assert!(asks_for_humor("Could you tell me a joke?"));
        assert!(asks_for_humor("add a bit of humour please"));
        assert!(!asks_for_humor("this is no laughing matter"));
    }
}

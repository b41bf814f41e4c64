//! Homework: small action items agreed in conversation, with daily reminders.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const USAGE: &str = "Homework commands:\n\
/hw add <text> [due YYYY-MM-DD]: add a task\n\
/hw list: show open tasks\n\
/hw done <n>: mark task n as done\n\
/hw del <n>: delete task n";

static DUE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| crate::classify::compile(r"(?i)^(?P<text>.*?)\s+due\s+(?P<date>\d{4}-\d{2}-\d{2})\s*$"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeworkStatus {
    Open,
    Done,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeworkTask {
    pub id: u64,
    pub user_id: i64,
    pub text: String,
    #[serde(default)]
    pub due: Option<NaiveDate>,
    pub status: HomeworkStatus,
    #[serde(default)]
    pub last_reminded: Option<NaiveDate>,
    pub created_at_ms: i64,
}

impl HomeworkTask {
    pub fn new(id: u64, user_id: i64, text: &str, due: Option<NaiveDate>) -> Self {
        Self {
            id,
            user_id,
            text: text.trim().to_string(),
            due,
            status: HomeworkStatus::Open,
            last_reminded: None,
            created_at_ms: crate::now_ms(),
        }
    }

    /// Open, due on or before `today`, and not yet reminded today.
    pub fn needs_reminder(&self, today: NaiveDate) -> bool {
        self.status == HomeworkStatus::Open
            && self.due.is_some_and(|due| due <= today)
            && self.last_reminded != Some(today)
    }

    pub fn reminder_text(&self) -> String {
        format!(
            "A gentle reminder about your homework: \"{}\". How is it going? Reply /hw done when it's finished.",
            self.text
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeworkCommand {
    Add { text: String, due: Option<NaiveDate> },
    List,
    /// 1-based position in the open list.
    Done(usize),
    /// 1-based position in the open list.
    Delete(usize),
    Usage,
}

/// Parses `/hw ...` (or `/homework ...`). `None` when the text is not a homework command.
pub fn parse_command(text: &str) -> Option<HomeworkCommand> {
    let text = text.trim();
    let mut parts = text.splitn(2, char::is_whitespace);
    let head = parts.next()?.to_lowercase();
    if head != "/hw" && head != "/homework" {
        return None;
    }
    let rest = parts.next().unwrap_or("").trim();
    let mut args = rest.splitn(2, char::is_whitespace);
    let verb = args.next().unwrap_or("").to_lowercase();
    let arg = args.next().unwrap_or("").trim();
    let cmd = match verb.as_str() {
        "add" if !arg.is_empty() => parse_add(arg),
        "list" | "ls" => HomeworkCommand::List,
        "done" => arg.parse::<usize>().ok().filter(|n| *n > 0).map_or(HomeworkCommand::Usage, HomeworkCommand::Done),
        "del" | "delete" | "rm" => arg
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map_or(HomeworkCommand::Usage, HomeworkCommand::Delete),
        _ => HomeworkCommand::Usage,
    };
    Some(cmd)
}

fn parse_add(arg: &str) -> HomeworkCommand {
    if let Some(caps) = DUE_SUFFIX.captures(arg) {
        if let Ok(due) = NaiveDate::parse_from_str(&caps["date"], "%Y-%m-%d") {
            let text = caps["text"].trim();
            if !text.is_empty() {
                return HomeworkCommand::Add {
                    text: text.to_string(),
                    due: Some(due),
                };
            }
        }
    }
    HomeworkCommand::Add {
        text: arg.to_string(),
        due: None,
    }
}

/// Numbered list of open tasks.
pub fn render_list(tasks: &[HomeworkTask]) -> String {
    if tasks.is_empty() {
        return "You have no open homework. Add one with /hw add <text>.".to_string();
    }
    let mut out = String::from("Your open homework:");
    for (i, task) in tasks.iter().enumerate() {
        match task.due {
            Some(due) => out.push_str(&format!("\n{}. {} (due {})", i + 1, task.text, due)),
            None => out.push_str(&format!("\n{}. {}", i + 1, task.text)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parses_add_with_and_without_due_date() {
        assert_eq!(
            parse_command("/hw add write three gratitudes due 2026-03-01"),
            Some(HomeworkCommand::Add {
                text: "write three gratitudes".into(),
                due: Some(date("2026-03-01")),
            })
        );
        assert_eq!(
            parse_command("/hw add call mom"),
            Some(HomeworkCommand::Add { text: "call mom".into(), due: None })
        );
        // An invalid date stays part of the text.
        assert_eq!(
            parse_command("/hw add walk due 2026-13-40"),
            Some(HomeworkCommand::Add { text: "walk due 2026-13-40".into(), due: None })
        );
    }

    #[test]
    fn parses_list_done_and_delete() {
        assert_eq!(parse_command("/HW list"), Some(HomeworkCommand::List));
        assert_eq!(parse_command("/hw done 2"), Some(HomeworkCommand::Done(2)));
        assert_eq!(parse_command("/homework del 1"), Some(HomeworkCommand::Delete(1)));
        assert_eq!(parse_command("/hw done zero"), Some(HomeworkCommand::Usage));
        assert_eq!(parse_command("/hw"), Some(HomeworkCommand::Usage));
        assert_eq!(parse_command("homework is hard"), None);
    }

    #[test]
    fn reminder_fires_once_per_day_for_due_open_tasks() {
        let today = date("2026-05-10");
        let mut task = HomeworkTask::new(1, 1, "journal", Some(date("2026-05-09")));
        assert!(task.needs_reminder(today));
        task.last_reminded = Some(today);
        assert!(!task.needs_reminder(today));
        assert!(task.needs_reminder(date("2026-05-11")));

        let later = HomeworkTask::new(2, 1, "walk", Some(date("2026-06-01")));
        assert!(!later.needs_reminder(today));
        let undated = HomeworkTask::new(3, 1, "read", None);
        assert!(!undated.needs_reminder(today));
        let mut done = task.clone();
        done.status = HomeworkStatus::Done;
        assert!(!done.needs_reminder(date("2026-05-12")));
    }

    #[test]
    fn list_is_numbered_from_one() {
        let tasks = vec![
            HomeworkTask::new(1, 1, "journal", None),
            HomeworkTask::new(2, 1, "walk", Some(date("2026-05-10"))),
        ];
        let text = render_list(&tasks);
        assert!(text.contains("1. journal"));
        assert!(text.contains("2. walk (due 2026-05-10)"));
    }
}

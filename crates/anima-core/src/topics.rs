//! Topic catalog: patterns and ordered prompt sequences.
//!
//! Declaration order matters: the intent classifier resolves equal scores
//! to the topic (and sub-topic) declared first.

/// A sub-topic with its own pattern and prompt sequence.
#[derive(Debug)]
pub struct SubtopicSpec {
    pub name: &'static str,
    pub pattern: &'static str,
    pub prompts: &'static [&'static str],
}

/// A conversation topic the focus controller can lock onto.
#[derive(Debug)]
pub struct TopicSpec {
    pub name: &'static str,
    /// Human-readable label used in replies.
    pub label: &'static str,
    /// Words accepted by explicit "switch to X" commands.
    pub aliases: &'static [&'static str],
    pub pattern: &'static str,
    pub prompts: &'static [&'static str],
    pub subtopics: &'static [SubtopicSpec],
}

impl TopicSpec {
    pub fn subtopic(&self, name: &str) -> Option<&'static SubtopicSpec> {
        self.subtopics.iter().find(|s| s.name == name)
    }
}

pub static TOPICS: &[TopicSpec] = &[
    TopicSpec {
        name: "finance",
        label: "money and finances",
        aliases: &["finance", "finances", "money"],
        pattern: r"(?i)(\bfinanc\w*|\bmoney\b|\bbudget\w*|\bdebts?\b|\bloans?\b|\bsalary\b|\bsavings?\b|\bincome\b|\bspending\b|\bbills\b)",
        prompts: &[
            "What feels most pressing about money right now: income, spending or debt?",
            "If you picture your finances three months from now, what would \"better\" look like for you?",
            "What is one small money habit you could try this week?",
            "How will you notice that this habit is starting to work for you?",
        ],
        subtopics: &[
            SubtopicSpec {
                name: "debt",
                pattern: r"(?i)(\bdebts?\b|\bloans?\b|\bcredit cards?\b|\bmortgage\b|\bowe\b)",
                prompts: &[
                    "What weighs on you most about the debt: the amount, the deadlines or the feeling around it?",
                    "Which single payment, if it were handled, would bring you the most relief?",
                    "What could be a first realistic step with that payment this month?",
                ],
            },
            SubtopicSpec {
                name: "budget",
                pattern: r"(?i)(\bbudget\w*|\bspending\b|\bexpenses?\b|\bsav(e|ing|ings)\b)",
                prompts: &[
                    "Where does your money tend to slip away without you noticing?",
                    "Which expense would be easiest to trim without feeling deprived?",
                    "How would you like to track your spending this week so it stays light for you?",
                ],
            },
            SubtopicSpec {
                name: "income",
                pattern: r"(?i)(\bsalary\b|\bincome\b|\braise\b|\bearn\w*|\bunderpaid\b)",
                prompts: &[
                    "What would a fair income look like for you, and what stands between you and it?",
                    "Who could you talk to about your pay, and what would you want to say?",
                    "What is one step this week that moves your income in the right direction?",
                ],
            },
        ],
    },
    TopicSpec {
        name: "career",
        label: "work and career",
        aliases: &["career", "work", "job"],
        pattern: r"(?i)(\bcareer\w*|\bjobs?\b|\bwork(ing|place)?\b|\bboss\b|\bcolleagues?\b|\bpromotion\b|\boffice\b|\bprofession\w*)",
        prompts: &[
            "What is happening at work that you would most like to change?",
            "What part of your work gives you energy, and what part drains it?",
            "If work felt a bit better next month, what would be different?",
            "What small step at work could you take in the next few days?",
        ],
        subtopics: &[
            SubtopicSpec {
                name: "job_search",
                pattern: r"(?i)(\binterviews?\b|\bresume\b|\bcv\b|\bjob search\b|\bnew job\b|\bhiring\b)",
                prompts: &[
                    "What kind of role would feel like a real step forward for you?",
                    "What is the hardest part of the search for you right now?",
                    "Which one application or conversation could you move forward this week?",
                ],
            },
            SubtopicSpec {
                name: "burnout",
                pattern: r"(?i)(\bburn(ed|t)? ?out\b|\boverwork\w*|\btoo many hours\b)",
                prompts: &[
                    "When did you last feel rested after a working week?",
                    "Which obligations could you hand off or postpone without real harm?",
                    "What boundary around work would you like to try first?",
                ],
            },
            SubtopicSpec {
                name: "growth",
                pattern: r"(?i)(\bpromotion\b|\bskills?\b|\bcareer growth\b|\bgrow at work\b)",
                prompts: &[
                    "Where would you like to be professionally in a year?",
                    "Which skill, if you improved it, would open the most doors for you?",
                    "What would be a first small practice step for that skill?",
                ],
            },
        ],
    },
    TopicSpec {
        name: "relationships",
        label: "relationships",
        aliases: &["relationships", "relationship", "love"],
        pattern: r"(?i)(\brelationships?\b|\bpartner\b|\bhusband\b|\bwife\b|\bboyfriend\b|\bgirlfriend\b|\bmarriage\b|\bdating\b|\bfamily\b|\bparents?\b)",
        prompts: &[
            "Which relationship is on your mind the most right now?",
            "What do you need from this person that you are not getting yet?",
            "How could you say that to them in a way that feels safe for you?",
            "What would be a gentle first step toward that conversation?",
        ],
        subtopics: &[
            SubtopicSpec {
                name: "conflict",
                pattern: r"(?i)(\bargu\w*|\bfight\w*|\bconflicts?\b|\bquarrel\w*)",
                prompts: &[
                    "What usually sets the arguments off between you?",
                    "What do you think the other person needs in those moments?",
                    "What could you try the next time tension starts to rise?",
                ],
            },
            SubtopicSpec {
                name: "breakup",
                pattern: r"(?i)(\bbreak ?up\b|\bbroke up\b|\bdivorc\w*|\bseparat\w*)",
                prompts: &[
                    "What has been the hardest part of the separation for you?",
                    "Who or what has been supporting you through this so far?",
                    "What could help you take care of yourself this week?",
                ],
            },
        ],
    },
    TopicSpec {
        name: "stress",
        label: "stress",
        aliases: &["stress", "anxiety"],
        pattern: r"(?i)(\bstress\w*|\banxi\w*|\bpanic\w*|\boverwhelm\w*|\bworr\w*|\bpressure\b)",
        prompts: &[
            "When does the stress show up most strongly during your day?",
            "What do you notice in your body when the pressure rises?",
            "What has helped you calm down even a little in the past?",
            "Which one of those could you try today, even for five minutes?",
        ],
        subtopics: &[
            SubtopicSpec {
                name: "sleep",
                pattern: r"(?i)(\bsleep\w*|\binsomnia\b|\basleep\b)",
                prompts: &[
                    "What usually keeps you awake: thoughts, worries or something around you?",
                    "What does your evening look like in the hour before bed?",
                    "What small change to your evening routine would you like to try tonight?",
                ],
            },
            SubtopicSpec {
                name: "overload",
                pattern: r"(?i)(\btoo much\b|\boverload\w*|\bno time\b|\bdeadlines?\b)",
                prompts: &[
                    "If you wrote everything down, which items really have to be done by you?",
                    "What could wait a week without anything bad happening?",
                    "What would be the single most relieving thing to finish first?",
                ],
            },
        ],
    },
    TopicSpec {
        name: "self_esteem",
        label: "self-esteem",
        aliases: &["self-esteem", "self esteem", "confidence"],
        pattern: r"(?i)(\bconfiden\w*|\bself[- ]esteem\b|\bself[- ]worth\b|\binsecur\w*|\bnot good enough\b|\bbelieve in myself\b)",
        prompts: &[
            "Where do you most need more confidence right now: at work, in relationships or with yourself?",
            "What does the inner critic usually tell you in those moments?",
            "What would a kind friend say to you instead?",
            "What small act this week could remind you of your own strength?",
        ],
        subtopics: &[],
    },
];

pub fn topic(name: &str) -> Option<&'static TopicSpec> {
    TOPICS.iter().find(|t| t.name == name)
}

/// Resolves a topic from an explicit command argument by name or alias.
pub fn topic_by_alias(word: &str) -> Option<&'static TopicSpec> {
    let needle = word.trim().trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    if needle.is_empty() {
        return None;
    }
    TOPICS.iter().find(|t| {
        t.name == needle || t.label == needle || t.aliases.iter().any(|a| *a == needle)
    })
}

/// Human-readable label for a topic name; falls back to the raw name.
pub fn label(name: &str) -> &str {
    topic(name).map(|t| t.label).unwrap_or(name)
}

/// Prompt sequence for a (topic, sub-topic) pair; the sub-topic's own prompts win.
pub fn prompts_for(topic_name: &str, subtopic: Option<&str>) -> &'static [&'static str] {
    let Some(spec) = topic(topic_name) else {
        return &[];
    };
    subtopic
        .and_then(|s| spec.subtopic(s))
        .map(|s| s.prompts)
        .unwrap_or(spec.prompts)
}

/// Prompt at `step`, clamped to the last prompt of the sequence.
pub fn prompt_at(topic_name: &str, subtopic: Option<&str>, step: u32) -> Option<&'static str> {
    let prompts = prompts_for(topic_name, subtopic);
    let last = prompts.len().checked_sub(1)?;
    prompts.get((step as usize).min(last)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_index_clamps_at_last_prompt() {
        let prompts = prompts_for("finance", None);
        assert_eq!(prompt_at("finance", None, 0), Some(prompts[0]));
        assert_eq!(prompt_at("finance", None, 99), Some(prompts[prompts.len() - 1]));
        assert_eq!(prompt_at("nope", None, 0), None);
    }

    #[test]
    fn subtopic_prompts_override_parent() {
        assert_eq!(prompts_for("finance", Some("debt")).len(), 3);
        assert_eq!(prompts_for("finance", Some("unknown")), prompts_for("finance", None));
    }

    #[test]
    fn aliases_resolve_case_insensitively() {
        assert_eq!(topic_by_alias("Money").map(|t| t.name), Some("finance"));
        assert_eq!(topic_by_alias("work!").map(|t| t.name), Some("career"));
        assert!(topic_by_alias("  ").is_none());
    }

    #[test]
    fn every_prompt_is_a_question() {
        for t in TOPICS {
            assert!(!t.prompts.is_empty());
            for p in t.prompts.iter().chain(t.subtopics.iter().flat_map(|s| s.prompts.iter())) {
                assert!(p.ends_with('?'), "{} prompt is not a question: {}", t.name, p);
            }
        }
    }
}

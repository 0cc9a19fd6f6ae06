//! Conversation signals.
//!
//! Cheap phrase heuristics computed per request and handed to the model as
//! hidden hints: what the user is trying to do, what they are talking
//! about, whether they changed subject mid-troubleshoot, and which
//! troubleshooting checks they have already confirmed.

use kazpa_core::message::{Message, Role};
use regex_lite::Regex;
use serde::Serialize;

/// What the user is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Troubleshoot,
    Setup,
    Broker,
    Risk,
    Learn,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Troubleshoot => "troubleshoot",
            Self::Setup => "setup",
            Self::Broker => "broker",
            Self::Risk => "risk",
            Self::Learn => "learn",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user is talking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Topic {
    VistaX,
    VistaONE,
    Vps,
    Mt5,
    License,
    Broker,
    Risk,
    General,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VistaX => "VistaX",
            Self::VistaONE => "VistaONE",
            Self::Vps => "VPS",
            Self::Mt5 => "MT5",
            Self::License => "License",
            Self::Broker => "Broker",
            Self::Risk => "Risk",
            Self::General => "General",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Checked in this order; the first list with a hit wins.
const TROUBLESHOOT_PHRASES: &[&str] = &[
    "not working",
    "doesn't work",
    "isn't working",
    "no trades",
    "not trading",
    "not placing trades",
    "isn't placing trades",
    "error",
    "journal",
    "experts",
    "won't attach",
    "won't load",
    "not loading",
    "missing",
    "stuck",
    "help me fix",
    "issue",
    "problem",
];

const SETUP_PHRASES: &[&str] = &[
    "how do i",
    "how to",
    "install",
    "set up",
    "setup",
    "activate",
    "license",
    "download",
    "mql5",
    "experts",
    "advisors",
    "vps",
    "mt5",
    "metatrader",
    "allow algo",
    "dll",
    "webrequest",
];

const BROKER_PHRASES: &[&str] = &[
    "broker",
    "which broker",
    "what broker",
    "best broker",
    "raw spread",
    "leverage",
    "server name",
    "account type",
];

const RISK_PHRASES: &[&str] = &[
    "risk",
    "drawdown",
    "lot size",
    "margin",
    "equity stop",
    "safe",
    "aggressive",
    "conservative",
    "how much can i make",
    "profit",
    "guarantee",
    "returns",
];

const LEARN_PHRASES: &[&str] = &[
    "what is forex",
    "i'm new",
    "im new",
    "beginner",
    "explain",
    "how does",
    "what does",
    "fundamentals",
    "technicals",
];

const TROUBLESHOOTING_REPLY_MARKERS: &[&str] = &[
    "progress:",
    "confirm",
    "next check",
    "journal",
    "experts",
    "autotrading",
    "blue hat",
];

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

fn matches(pattern: &str, text: &str) -> bool {
    Regex::new(pattern).is_ok_and(|re| re.is_match(text))
}

pub fn detect_intent(user_msg: &str) -> Intent {
    let t = normalize(user_msg);
    [
        (TROUBLESHOOT_PHRASES, Intent::Troubleshoot),
        (SETUP_PHRASES, Intent::Setup),
        (BROKER_PHRASES, Intent::Broker),
        (RISK_PHRASES, Intent::Risk),
        (LEARN_PHRASES, Intent::Learn),
    ]
    .into_iter()
    .find(|(phrases, _)| contains_any(&t, phrases))
    .map_or(Intent::General, |(_, intent)| intent)
}

pub fn detect_topic(user_msg: &str) -> Topic {
    let t = normalize(user_msg);
    if t.contains("vistax") {
        Topic::VistaX
    } else if t.contains("vistaone") || t.contains("vista one") {
        Topic::VistaONE
    } else if t.contains("vps") {
        Topic::Vps
    } else if t.contains("mt5") || t.contains("metatrader") {
        Topic::Mt5
    } else if t.contains("license") || t.contains("activate") {
        Topic::License
    } else if t.contains("broker") {
        Topic::Broker
    } else if contains_any(&t, &["risk", "drawdown", "margin"]) {
        Topic::Risk
    } else {
        Topic::General
    }
}

/// Two or more question marks, a numbered list, or " and " in a question.
pub fn looks_like_multi_question(user_msg: &str) -> bool {
    let t = user_msg.trim();
    let question_marks = t.matches('?').count();
    question_marks >= 2
        || matches(r"\n\s*\d+[.)]", t)
        || (question_marks >= 1 && t.contains(" and "))
}

/// Whether the most recent assistant turn reads like a troubleshooting step.
pub fn last_assistant_was_troubleshooting(messages: &[Message]) -> bool {
    kazpa_core::message::latest_assistant_text(messages)
        .map(normalize)
        .is_some_and(|t| contains_any(&t, TROUBLESHOOTING_REPLY_MARKERS))
}

/// Signals for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Signals {
    pub intent: Intent,
    pub topic: Topic,
    /// Troubleshooting was under way and the user asked something else
    pub pivoted: bool,
    pub multi_question: bool,
}

impl Signals {
    pub fn detect(question: &str, history: &[Message]) -> Self {
        let intent = detect_intent(question);
        Self {
            intent,
            topic: detect_topic(question),
            pivoted: last_assistant_was_troubleshooting(history) && intent != Intent::Troubleshoot,
            multi_question: looks_like_multi_question(question),
        }
    }
}

const AFFIRMATIVE: &str = r"\b(yes|yeah|yep|yup|correct|confirmed|done|fixed|it is|it’s on|its on)\b";

const STEP_PHRASES: &[(&str, &[&str])] = &[
    ("autotrading", &["autotrading", "algo trading"]),
    ("attached", &["attached", "on the chart", "added to chart"]),
    ("symbol", &["xauusd", "eurusd", "symbol"]),
    ("timeframe", &["m5", "m15", "timeframe"]),
    ("session", &["session", "trading window", "hours"]),
    (
        "permissions",
        &["allow algo", "allow algorithmic", "permissions", "dll", "webrequest"],
    ),
];

/// Whether `step` names one of the troubleshooting checks tracked above.
pub fn is_known_step(step: &str) -> bool {
    STEP_PHRASES.iter().any(|(name, _)| *name == step)
}

/// Troubleshooting checks the user has said yes to, in first-confirmed order.
pub fn extract_confirmed_steps(messages: &[Message]) -> Vec<String> {
    let mut confirmed: Vec<String> = Vec::new();
    for message in messages.iter().filter(|m| m.role == Role::User) {
        let t = message.content.to_lowercase();
        if !matches(AFFIRMATIVE, &t) {
            continue;
        }
        for (step, phrases) in STEP_PHRASES {
            if contains_any(&t, phrases) && !confirmed.iter().any(|c| c == step) {
                confirmed.push((*step).to_string());
            }
        }
    }
    confirmed
}

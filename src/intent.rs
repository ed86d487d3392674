//! Intent classification for steady-state (onboarded) members.
//!
//! An ordered table of compiled regexes, checked first-match-wins. Matching
//! is case-insensitive on the trimmed message. Anything unmatched falls
//! through to `Unknown`, which the dispatcher routes to the FAQ assist.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What a steady-state message is asking for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Price sheet request.
    Price,
    /// Order placement; carries the order body after the keyword.
    Order { body: String },
    /// Referral code / sign-up count request.
    Referral,
    /// Capabilities menu.
    Help,
    /// Nothing matched; goes to the FAQ assist.
    Unknown,
}

impl Intent {
    /// Stable tag for logging and the message-log `intent` column.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Order { .. } => "order",
            Self::Referral => "referral",
            Self::Help => "help",
            Self::Unknown => "unknown",
        }
    }
}

struct IntentRule {
    regex: Regex,
    build: fn(&regex::Captures<'_>) -> Intent,
}

static RULES: LazyLock<Vec<IntentRule>> = LazyLock::new(|| {
    vec![
        IntentRule {
            regex: Regex::new(r"(?i)^(price|prices|pricing|price\s*sheet|cost|costs)\b").unwrap(),
            build: |_| Intent::Price,
        },
        IntentRule {
            regex: Regex::new(r"(?i)^(order|buy|purchase)\b(.*)").unwrap(),
            build: |caps| Intent::Order {
                body: caps
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
            },
        },
        IntentRule {
            regex: Regex::new(r"(?i)^(referral|refer|my\s+code|invite)\b").unwrap(),
            build: |_| Intent::Referral,
        },
        IntentRule {
            regex: Regex::new(r"(?i)^(help|menu|commands|what\s+can\s+you\s+do)\b").unwrap(),
            build: |_| Intent::Help,
        },
    ]
});

/// Classify one inbound message. First matching rule wins.
pub fn classify(text: &str) -> Intent {
    let text = text.trim();
    for rule in RULES.iter() {
        if let Some(caps) = rule.regex.captures(text) {
            return (rule.build)(&caps);
        }
    }
    Intent::Unknown
}

//! Intent Classification
//!
//! Maps free-text user input onto a small, fixed set of intents using an
//! ordered keyword table. The first rule whose keyword set has a substring
//! match wins, so the order of the table is part of the behavior: "create"
//! must be tested before "thank" even though neither contains the other.

use serde::{Deserialize, Serialize};

/// The classified purpose of a user's submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CodeRequest,
    Greeting,
    StatusQuery,
    HelpRequest,
    Thanks,
    Generic,
}

/// One row of the keyword table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRule {
    pub intent: Intent,
    /// Lower-case keywords; any one of them appearing as a substring matches.
    pub keywords: Vec<String>,
}

impl IntentRule {
    fn new(intent: Intent, keywords: &[&str]) -> Self {
        Self {
            intent,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn matches(&self, normalized: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && normalized.contains(k.as_str()))
    }
}

/// Deterministic keyword classifier.
///
/// `Generic` has no row; it is what falls out when nothing matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self {
            rules: vec![
                IntentRule::new(
                    Intent::CodeRequest,
                    &["build", "create", "generate", "code", "make", "develop", "write"],
                ),
                IntentRule::new(Intent::Greeting, &["hello", "hi", "hey"]),
                IntentRule::new(Intent::StatusQuery, &["status", "system"]),
                IntentRule::new(Intent::HelpRequest, &["help"]),
                IntentRule::new(Intent::Thanks, &["thank"]),
            ],
        }
    }
}

impl IntentClassifier {
    /// Replaces the keyword set of one intent without changing its priority.
    ///
    /// Keywords are lower-cased on the way in. Setting keywords for
    /// `Intent::Generic` is ignored.
    pub fn set_keywords<I, S>(&mut self, intent: Intent, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if intent == Intent::Generic {
            return;
        }
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .collect();
        if let Some(rule) = self.rules.iter_mut().find(|r| r.intent == intent) {
            rule.keywords = keywords;
        }
    }

    /// The keyword set currently bound to `intent`.
    pub fn keywords(&self, intent: Intent) -> &[String] {
        self.rules
            .iter()
            .find(|r| r.intent == intent)
            .map(|r| r.keywords.as_slice())
            .unwrap_or(&[])
    }

    /// Classifies `text`. Total: every input maps to some intent.
    pub fn classify(&self, text: &str) -> Intent {
        let normalized = text.trim().to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&normalized))
            .map(|rule| rule.intent)
            .unwrap_or(Intent::Generic)
    }
}

/// Classifies `text` against the default keyword table.
pub fn classify(text: &str) -> Intent {
    IntentClassifier::default().classify(text)
}

//! Phrase screens over cleaned content.

use serde::{Deserialize, Serialize};

/// Phrases a generator emits when it had nothing to work with.
pub const FAILURE_PHRASES: &[&str] = &[
    "insufficient source content",
    "no relevant content found",
    "unable to generate",
    "content not available",
];

/// Hedging phrases that suggest the generator filled gaps on its own.
pub const HALLUCINATION_PHRASES: &[&str] = &[
    "I don't have access to",
    "I do not have access to",
    "I cannot verify",
    "I can't verify",
    "hypothetically",
    "I assume",
    "as an AI",
    "I'm not able to confirm",
    "based on my training data",
];

/// Result of the hedging-phrase screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallucinationReport {
    pub detected: bool,
    /// Matched phrases in canonical casing, in list order.
    pub matched: Vec<String>,
}

/// Lowercase and fold typographic apostrophes so `don’t` matches `don't`.
fn fold(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}'], "'").to_lowercase()
}

/// First failure phrase (built-in, then `extra`) found in `text`, case-insensitive.
pub fn detect_failure(text: &str, extra: &[String]) -> Option<String> {
    let haystack = fold(text);
    FAILURE_PHRASES
        .iter()
        .map(|p| p.to_string())
        .chain(extra.iter().filter(|p| !p.trim().is_empty()).cloned())
        .find(|phrase| haystack.contains(&fold(phrase)))
}

/// Scan for hedging phrases.
pub fn detect_hallucination(text: &str) -> HallucinationReport {
    let haystack = fold(text);
    let matched: Vec<String> = HALLUCINATION_PHRASES
        .iter()
        .filter(|phrase| haystack.contains(&fold(phrase)))
        .map(|phrase| phrase.to_string())
        .collect();

    HallucinationReport {
        detected: !matched.is_empty(),
        matched,
    }
}

//! Screening of generated section text.
//!
//! Raw generator output is cleaned, then screened for explicit failure phrases,
//! hedging language, and insufficient length. The outcome is a
//! [`GeneratedSectionResult`]; nothing here returns an error.

mod cleanup;
mod grounding;
mod screens;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use docforge_shared::ValidationConfig;

pub use cleanup::clean;
pub use grounding::{CoverageReport, GroundingReport, check_grounding, check_source_coverage};
pub use screens::{
    FAILURE_PHRASES, HALLUCINATION_PHRASES, HallucinationReport, detect_failure,
    detect_hallucination,
};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Counts and flags derived from the cleaned content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMetadata {
    pub word_count: usize,
    pub paragraph_count: usize,
    pub has_hallucination_markers: bool,
}

/// Outcome of screening one section's generated text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSectionResult {
    /// Cleaned text. Empty when a failure phrase matched.
    pub content: String,
    pub success: bool,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: SectionMetadata,
}

impl GeneratedSectionResult {
    /// A failed result carrying only a warning, for generator errors.
    pub fn failed(warning: impl Into<String>) -> Self {
        let warning = warning.into();
        Self {
            content: String::new(),
            success: false,
            warnings: vec![warning.clone()],
            error: Some(warning),
            metadata: SectionMetadata::default(),
        }
    }

    /// The section should be written or regenerated by hand.
    pub fn needs_manual_input(&self) -> bool {
        !self.success
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Whitespace-delimited token count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Non-empty chunks separated by blank lines.
pub fn paragraph_count(text: &str) -> usize {
    text.split("\n\n").filter(|p| !p.trim().is_empty()).count()
}

/// Clean and screen raw generated text.
#[instrument(skip_all, fields(raw_len = raw.len()))]
pub fn validate_section(raw: &str, config: &ValidationConfig) -> GeneratedSectionResult {
    let content = clean(raw);
    let mut warnings = Vec::new();

    if let Some(phrase) = detect_failure(&content, &config.extra_failure_phrases) {
        warn!(%phrase, "generator reported failure");
        warnings.push(format!("generator reported failure (\"{phrase}\")"));
        return GeneratedSectionResult {
            content: String::new(),
            success: false,
            warnings,
            error: Some(format!(
                "generation failed: output contains \"{phrase}\"; supply more source material or write this section manually"
            )),
            metadata: SectionMetadata::default(),
        };
    }

    let report = detect_hallucination(&content);
    if report.detected {
        warn!(matched = ?report.matched, "hedging language detected");
        warnings.push(format!(
            "possible hallucination markers: {}",
            report.matched.join(", ")
        ));
    }

    let chars = content.chars().count();
    let mut success = true;
    if chars < config.min_content_chars {
        warn!(chars, min = config.min_content_chars, "content too short");
        success = false;
        warnings.push(format!(
            "content is only {chars} characters (minimum {}); consider adding more source material",
            config.min_content_chars
        ));
    }

    let metadata = SectionMetadata {
        word_count: word_count(&content),
        paragraph_count: paragraph_count(&content),
        has_hallucination_markers: report.detected,
    };

    debug!(
        success,
        words = metadata.word_count,
        paragraphs = metadata.paragraph_count,
        "section validated"
    );

    GeneratedSectionResult {
        content,
        success,
        warnings,
        error: None,
        metadata,
    }
}

/// [`validate_section`] plus grounding and coverage checks against the source texts.
///
/// Grounding compares against all sources joined. Coverage only runs with two or
/// more sources.
pub fn validate_against_sources(
    raw: &str,
    sources: &[String],
    config: &ValidationConfig,
) -> GeneratedSectionResult {
    let mut result = validate_section(raw, config);
    if result.content.is_empty() || sources.is_empty() {
        return result;
    }

    let joined = sources.join("\n\n");
    let grounding = check_grounding(&result.content, &joined);
    result.warnings.extend(grounding.warnings);

    if sources.len() > 1 {
        let coverage = check_source_coverage(&result.content, sources.len());
        result.warnings.extend(coverage.warnings);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BODY: &str = "The cohort study followed participants for several years and \
                        reported consistent effects across all sites.";

    #[test]
    fn accepts_substantive_content() {
        let raw = format!("Here is the section:\n\n{BODY}\n\nSecond paragraph here.");
        let result = validate_section(&raw, &ValidationConfig::default());

        assert!(result.success);
        assert!(!result.needs_manual_input());
        assert!(result.warnings.is_empty());
        assert_eq!(result.metadata.paragraph_count, 2);
        assert_eq!(result.metadata.word_count, word_count(&result.content));
        assert!(result.content.starts_with("The cohort study"));
    }

    #[test]
    fn failure_phrase_short_circuits() {
        let raw = format!("{BODY} Insufficient source content to continue, I cannot verify.");
        let result = validate_section(&raw, &ValidationConfig::default());

        assert!(!result.success);
        assert!(result.needs_manual_input());
        assert!(result.content.is_empty());
        assert!(
            result
                .error
                .as_deref()
                .is_some_and(|e| e.contains("insufficient source content"))
        );
        // hallucination screen never ran
        assert_eq!(result.warnings.len(), 1);
        assert!(!result.metadata.has_hallucination_markers);
    }

    #[test]
    fn configured_failure_phrase() {
        let config = ValidationConfig {
            extra_failure_phrases: vec!["no sources attached".into()],
            ..ValidationConfig::default()
        };
        let result = validate_section(&format!("{BODY} No sources attached."), &config);
        assert!(!result.success);
    }

    #[test]
    fn hallucination_markers_warn_but_succeed() {
        let raw =
            "I cannot verify this claim, but the results show 42% improvement over the baseline.";
        let result = validate_section(raw, &ValidationConfig::default());

        assert!(result.success);
        assert!(result.metadata.has_hallucination_markers);
        assert_eq!(
            result.warnings,
            vec!["possible hallucination markers: I cannot verify".to_string()]
        );
    }

    #[test]
    fn short_content_keeps_text_but_fails() {
        let result = validate_section("Too short.", &ValidationConfig::default());
        assert!(!result.success);
        assert_eq!(result.content, "Too short.");
        assert!(result.warnings[0].contains("minimum 50"));
        assert!(result.error.is_none());
    }

    #[test]
    fn sources_add_grounding_and_coverage_warnings() {
        let raw =
            "Paper 1 reports 42% improvement while the pooled estimate was 17 points overall.";
        let sources = vec![
            "Improvement of 42 percent.".to_string(),
            "Another source.".to_string(),
        ];
        let result = validate_against_sources(raw, &sources, &ValidationConfig::default());

        assert!(result.success);
        assert_eq!(
            result.warnings,
            vec![
                "number 17 may not be in source".to_string(),
                "1 of 2 sources never referenced: 2".to_string(),
            ]
        );
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = validate_section(BODY, &ValidationConfig::default());
        let json = serde_json::to_value(&result).expect("serialize");
        assert!(json["metadata"]["wordCount"].is_number());
        assert_eq!(json["metadata"]["hasHallucinationMarkers"], false);
        assert!(json.get("error").is_none());
    }

    proptest! {
        #[test]
        fn word_count_matches_cleaned_tokens(raw in "[a-zA-Z0-9 \t\n.,:#*-]{0,400}") {
            let result = validate_section(&raw, &ValidationConfig::default());
            prop_assert_eq!(
                result.metadata.word_count,
                result.content.split_whitespace().count()
            );
        }
    }
}

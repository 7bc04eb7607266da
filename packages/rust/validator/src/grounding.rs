//! Source-fidelity heuristics.
//!
//! These checks look for surface signals only. A number that appears in the source
//! may still be misused, and a missing one may be a legitimate derivation.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Small numbers that show up everywhere and prove nothing.
const COMMON_NUMBERS: &[&str] = &["1", "2", "3", "4", "5", "10", "100"];

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?%?").expect("valid regex"));

static SOURCE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:paper|study|document)\s+(\d+)\b").expect("valid regex")
});

/// Numbers in generated text that the source does not contain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingReport {
    /// Number tokens as written in the generated text, first occurrence order.
    pub unsupported: Vec<String>,
    pub warnings: Vec<String>,
}

impl GroundingReport {
    pub fn is_grounded(&self) -> bool {
        self.unsupported.is_empty()
    }
}

/// Flag numbers in `generated` whose numeric part never appears in `source`.
///
/// `42%` is compared as `42`. The common small numbers 1-5, 10 and 100 are ignored.
/// This is a heuristic: it catches invented figures, not misquoted ones.
pub fn check_grounding(generated: &str, source: &str) -> GroundingReport {
    let source_numbers: HashSet<&str> = NUMBER_RE
        .find_iter(source)
        .map(|m| m.as_str().trim_end_matches('%'))
        .collect();

    let mut seen = HashSet::new();
    let unsupported: Vec<String> = NUMBER_RE
        .find_iter(generated)
        .map(|m| m.as_str())
        .filter(|token| {
            let numeric = token.trim_end_matches('%');
            !COMMON_NUMBERS.contains(&numeric) && !source_numbers.contains(numeric)
        })
        .filter(|token| seen.insert(*token))
        .map(str::to_string)
        .collect();

    let warnings = unsupported
        .iter()
        .map(|n| format!("number {n} may not be in source"))
        .collect();

    GroundingReport {
        unsupported,
        warnings,
    }
}

/// Which of `n` sources a multi-source synthesis mentions by ordinal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub referenced: BTreeSet<usize>,
    /// Ordinals in `1..=n` never referenced.
    pub missing: Vec<usize>,
    pub warnings: Vec<String>,
}

/// Find "Paper i" / "Study i" / "Document i" references and report unreferenced sources.
pub fn check_source_coverage(text: &str, source_count: usize) -> CoverageReport {
    let referenced: BTreeSet<usize> = SOURCE_REF_RE
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<usize>().ok())
        .collect();

    let missing: Vec<usize> = (1..=source_count)
        .filter(|i| !referenced.contains(i))
        .collect();

    let mut warnings = Vec::new();
    if !missing.is_empty() {
        let list = missing
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        warnings.push(format!(
            "{} of {source_count} sources never referenced: {list}",
            missing.len()
        ));
    }

    CoverageReport {
        referenced,
        missing,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_compares_numeric_part() {
        let generated = "I cannot verify this claim, but the results show 42% improvement.";
        assert!(check_grounding(generated, "Improvement reached 42 points.").is_grounded());

        let report = check_grounding(generated, "Improvement reached 40%.");
        assert_eq!(report.unsupported, vec!["42%".to_string()]);
        assert_eq!(report.warnings, vec!["number 42% may not be in source".to_string()]);
    }

    #[test]
    fn common_numbers_are_ignored() {
        let report = check_grounding("Two groups (n = 2), 3 rounds, 100 trials, 10 sites.", "");
        assert!(report.is_grounded());
    }

    #[test]
    fn decimals_and_repeats() {
        let report = check_grounding("Mean 3.75, again 3.75, and 17.", "scores of 17");
        assert_eq!(report.unsupported, vec!["3.75".to_string()]);
    }

    #[test]
    fn coverage_reports_missing_sources() {
        let text = "Paper 1 argues X while study 3 disagrees. PAPER 1 also notes Y.";
        let report = check_source_coverage(text, 4);
        assert_eq!(report.referenced, BTreeSet::from([1, 3]));
        assert_eq!(report.missing, vec![2, 4]);
        assert_eq!(report.warnings, vec!["2 of 4 sources never referenced: 2, 4".to_string()]);
    }

    #[test]
    fn full_coverage_has_no_warning() {
        let report = check_source_coverage("Document 1 and Document 2 agree.", 2);
        assert!(report.missing.is_empty());
        assert!(report.warnings.is_empty());
    }
}

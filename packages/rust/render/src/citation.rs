//! Reference-list citation strings.

use docforge_shared::ReferenceRecord;

const DOI_PREFIX: &str = "https://doi.org/";

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Citation text for one reference.
///
/// Uses `formatted` verbatim when present. Otherwise builds
/// `Authors (Year). Title. Journal, Volume, Pages. https://doi.org/DOI` when authors and
/// title are known, and falls back to the raw text or the bare title.
pub fn format_citation(reference: &ReferenceRecord) -> String {
    if let Some(formatted) = non_empty(&reference.formatted) {
        return formatted.to_string();
    }

    let authors: Vec<&str> = reference
        .authors
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    let title = non_empty(&reference.title);

    if let Some(title) = title.filter(|_| !authors.is_empty()) {
        let year = non_empty(&reference.year).unwrap_or("n.d.");
        let mut out = format!(
            "{} ({year}). {}.",
            authors.join(", "),
            title.trim_end_matches('.')
        );

        let venue: Vec<&str> = [&reference.journal, &reference.volume, &reference.pages]
            .into_iter()
            .filter_map(non_empty)
            .collect();
        if !venue.is_empty() {
            out.push(' ');
            out.push_str(&venue.join(", "));
            out.push('.');
        }

        if let Some(doi) = non_empty(&reference.doi) {
            out.push(' ');
            out.push_str(DOI_PREFIX);
            out.push_str(doi.trim_start_matches(DOI_PREFIX));
        }
        return out;
    }

    let raw = reference.raw_text.trim();
    if !raw.is_empty() {
        return raw.to_string();
    }
    title.unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> ReferenceRecord {
        ReferenceRecord {
            authors: vec!["Smith, J.".into(), "Lee, K.".into()],
            title: Some("Sleep and memory.".into()),
            year: Some("2021".into()),
            journal: Some("Journal of Sleep".into()),
            volume: Some("12".into()),
            pages: Some("100-120".into()),
            doi: Some("10.1000/xyz".into()),
            raw_text: "raw".into(),
            formatted: None,
        }
    }

    #[test]
    fn builds_citation_from_fields() {
        assert_eq!(
            format_citation(&full()),
            "Smith, J., Lee, K. (2021). Sleep and memory. Journal of Sleep, 12, 100-120. https://doi.org/10.1000/xyz"
        );
    }

    #[test]
    fn formatted_wins() {
        let reference = ReferenceRecord {
            formatted: Some("Pre-formatted.".into()),
            ..full()
        };
        assert_eq!(format_citation(&reference), "Pre-formatted.");
    }

    #[test]
    fn doi_url_is_not_doubled_and_missing_parts_are_skipped() {
        let reference = ReferenceRecord {
            year: None,
            journal: None,
            volume: None,
            pages: Some(" ".into()),
            doi: Some("https://doi.org/10.1/abc".into()),
            ..full()
        };
        assert_eq!(
            format_citation(&reference),
            "Smith, J., Lee, K. (n.d.). Sleep and memory. https://doi.org/10.1/abc"
        );
    }

    #[test]
    fn falls_back_to_raw_then_title() {
        let reference = ReferenceRecord {
            authors: vec![],
            ..full()
        };
        assert_eq!(format_citation(&reference), "raw");

        let reference = ReferenceRecord {
            authors: vec![],
            raw_text: String::new(),
            ..full()
        };
        assert_eq!(format_citation(&reference), "Sleep and memory.");
    }
}

//! Text patterns used when a template carries no heading styles.

use std::sync::LazyLock;

use regex::Regex;

use crate::RawHeading;

/// Lines this long or longer are treated as body text.
const MAX_HEADING_CHARS: usize = 100;

/// Deepest level an outline prefix can produce.
const MAX_OUTLINE_LEVEL: u8 = 4;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Z][A-Z0-9_]*)\}\}").expect("valid regex"));

static OUTLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\.?\s+\p{Lu}").expect("valid regex"));

/// First `{{UPPER_SNAKE}}` name in `text`.
pub fn placeholder_of(text: &str) -> Option<String> {
    PLACEHOLDER_RE.captures(text).map(|c| c[1].to_string())
}

/// Heading level implied by a numeric outline prefix.
///
/// `"2 Methods"` is level 1, `"2.1 Background"` level 2, `"2.1.3. Detail"` level 3.
/// Levels are capped at 4.
pub fn outline_level(line: &str) -> Option<u8> {
    let caps = OUTLINE_RE.captures(line.trim())?;
    let dots = caps[1].matches('.').count();
    let level = (dots + 1).min(MAX_OUTLINE_LEVEL as usize);
    Some(level as u8)
}

/// Scan plain lines for placeholder and outline-numbered headings.
pub fn pattern_headings<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<RawHeading> {
    lines
        .into_iter()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.chars().count() >= MAX_HEADING_CHARS {
                return None;
            }

            if PLACEHOLDER_RE.is_match(line) {
                return Some(RawHeading::new(1, line));
            }

            outline_level(line).map(|level| RawHeading::new(level, line))
        })
        .collect()
}

//! Cleanup pipeline for raw generated text.
//!
//! Each pass is a function `&str -> String`. The pipeline is repeated until a
//! full round leaves the text unchanged, so `clean(clean(t)) == clean(t)`.
//! No pass ever lengthens its input, so the loop terminates.

use std::sync::LazyLock;

use regex::Regex;

/// Clean generated text down to its substantive content.
pub fn clean(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = run_pipeline(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn run_pipeline(text: &str) -> String {
    let mut result = text.to_string();

    result = strip_code_fence(&result);
    result = strip_preamble(&result);
    result = strip_leading_heading(&result);
    result = strip_trailing_boilerplate(&result);
    result = normalize_whitespace(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Unwrap a whole-text code fence
// ---------------------------------------------------------------------------

/// Unwrap text that is entirely one fenced code block.
fn strip_code_fence(text: &str) -> String {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)\A\s*```[A-Za-z0-9_+-]*[ \t]*\n(.*?)\n?```\s*\z").expect("valid regex")
    });

    match FENCE_RE.captures(text) {
        Some(caps) if !caps[1].contains("```") => caps[1].to_string(),
        _ => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pass 2: Leading "Here is ...:" preamble
// ---------------------------------------------------------------------------

fn strip_preamble(text: &str) -> String {
    static PREAMBLE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)\A\s*(?:here\s+is|here's|here’s|below\s+is|the\s+following\s+is)[^:\n]*:[ \t]*",
        )
        .expect("valid regex")
    });

    PREAMBLE_RE.replace(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Leading markdown heading
// ---------------------------------------------------------------------------

/// Drop a leading `# Title` line; the section heading comes from the template.
fn strip_leading_heading(text: &str) -> String {
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\A\s*#{1,6}[ \t]+[^\n]*(?:\n|\z)").expect("valid regex"));

    HEADING_RE.replace(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Trailing assistant boilerplate
// ---------------------------------------------------------------------------

/// Cut from a line starting with a sign-off phrase to the end of the text.
fn strip_trailing_boilerplate(text: &str) -> String {
    static TRAILER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?is)\n[ \t]*(?:please\s+note:|note:|i\s+hope|let\s+me\s+know|is\s+there\s+anything).*\z",
        )
        .expect("valid regex")
    });

    TRAILER_RE.replace(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Whitespace
// ---------------------------------------------------------------------------

/// Collapse horizontal whitespace, trim every line, keep at most one blank line.
fn normalize_whitespace(text: &str) -> String {
    static HSPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));
    static MULTI_NL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let lines: Vec<String> = text
        .split('\n')
        .map(|line| HSPACE_RE.replace_all(line, " ").trim().to_string())
        .collect();

    MULTI_NL_RE
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

//! Markdown-like text → block nodes.

use std::sync::LazyLock;

use regex::Regex;

use docforge_shared::{BlockNode, Mark, RunNode};

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid regex"));

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*]\s+(.*)$").expect("valid regex"));

static ORDERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s+(.*)$").expect("valid regex"));

/// `***both***`, `**bold**` or `*italic*`, leftmost first. The marked text must not
/// start or end with whitespace, so `2 * 3 * 4` stays plain.
static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\*\*\*([^*\s](?:[^*]*[^*\s])?)\*\*\*",
        r"|\*\*([^*\s](?:[^*]*[^*\s])?)\*\*",
        r"|\*([^*\s](?:[^*]*[^*\s])?)\*",
    ))
    .expect("valid regex")
});

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s|:-]*-[\s|:-]*$").expect("valid regex"));

/// Parse blank-line-separated chunks into blocks.
///
/// Each chunk is a heading (`#`..`######` line), a table (contains `|` over several
/// lines), a list (first line starts with `- `, `* ` or `1. `), or a paragraph.
pub fn parse_blocks(text: &str) -> Vec<BlockNode> {
    chunks(text).into_iter().map(|lines| classify(&lines)).collect()
}

/// Group trimmed lines into chunks. Blank lines and heading lines end a chunk.
fn chunks(text: &str) -> Vec<Vec<&str>> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        if HEADING_RE.is_match(line) {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            out.push(vec![line]);
            continue;
        }
        current.push(line);
    }
    if !current.is_empty() {
        out.push(current);
    }

    out
}

fn classify(lines: &[&str]) -> BlockNode {
    if let [line] = lines {
        if let Some(caps) = HEADING_RE.captures(line) {
            return BlockNode::Heading {
                level: caps[1].len() as u8,
                runs: parse_inline(caps[2].trim()),
            };
        }
    }

    if lines.len() > 1 && lines.iter().any(|l| l.contains('|')) {
        return parse_table(lines);
    }

    let first = lines.first().copied().unwrap_or_default();
    if BULLET_RE.is_match(first) {
        return BlockNode::BulletList {
            items: list_items(lines, &BULLET_RE),
        };
    }
    if ORDERED_RE.is_match(first) {
        return BlockNode::OrderedList {
            items: list_items(lines, &ORDERED_RE),
        };
    }

    BlockNode::Paragraph {
        runs: parse_inline(&lines.join(" ")),
    }
}

/// Marker lines open items; other lines continue the previous item.
fn list_items(lines: &[&str], marker: &Regex) -> Vec<Vec<RunNode>> {
    let mut items: Vec<String> = Vec::new();
    for line in lines {
        match marker.captures(line) {
            Some(caps) => items.push(caps[1].trim().to_string()),
            None => match items.last_mut() {
                Some(last) => {
                    last.push(' ');
                    last.push_str(line);
                }
                None => items.push(line.to_string()),
            },
        }
    }
    items.iter().map(|item| parse_inline(item)).collect()
}

/// Split a pipe-table row into trimmed cells, dropping empty edge cells.
pub fn split_row(line: &str) -> Vec<String> {
    let mut cells: Vec<String> = line.split('|').map(|c| c.trim().to_string()).collect();
    if cells.first().is_some_and(String::is_empty) {
        cells.remove(0);
    }
    if cells.last().is_some_and(String::is_empty) {
        cells.pop();
    }
    cells
}

fn parse_table(lines: &[&str]) -> BlockNode {
    let mut rows = lines
        .iter()
        .filter(|l| !SEPARATOR_RE.is_match(l))
        .map(|l| split_row(l));

    let headers = rows.next().unwrap_or_default();
    BlockNode::Table {
        headers,
        rows: rows.collect(),
    }
}

/// Split text into plain and emphasized runs, scanning matches left to right.
pub fn parse_inline(text: &str) -> Vec<RunNode> {
    let mut runs = Vec::new();
    let mut last = 0;

    for caps in EMPHASIS_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            runs.push(RunNode::plain(&text[last..whole.start()]));
        }

        if let Some(both) = caps.get(1) {
            let mut run = RunNode::marked(both.as_str(), Mark::Bold);
            run.marks.insert(Mark::Italic);
            runs.push(run);
        } else if let Some(bold) = caps.get(2) {
            runs.push(RunNode::marked(bold.as_str(), Mark::Bold));
        } else if let Some(italic) = caps.get(3) {
            runs.push(RunNode::marked(italic.as_str(), Mark::Italic));
        }
        last = whole.end();
    }

    if last < text.len() {
        runs.push(RunNode::plain(&text[last..]));
    }
    if runs.is_empty() && !text.is_empty() {
        runs.push(RunNode::plain(text));
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_table_example() {
        let blocks = parse_blocks("| A | B |\n| --- | --- |\n| 1 | 2 |");
        assert_eq!(
            blocks,
            vec![BlockNode::Table {
                headers: vec!["A".into(), "B".into()],
                rows: vec![vec!["1".into(), "2".into()]],
            }]
        );
    }

    #[test]
    fn table_without_edge_pipes() {
        let blocks = parse_blocks("Name | Score\n:--- | ---:\nAda | 9");
        assert_eq!(
            blocks,
            vec![BlockNode::Table {
                headers: vec!["Name".into(), "Score".into()],
                rows: vec![vec!["Ada".into(), "9".into()]],
            }]
        );
    }

    #[test]
    fn single_line_with_pipe_is_a_paragraph() {
        let blocks = parse_blocks("either | or");
        assert_eq!(blocks, vec![BlockNode::paragraph("either | or")]);
    }

    #[test]
    fn lists_and_continuations() {
        let blocks = parse_blocks("- first\n  wrapped\n* second\n\n1. one\n2. two");
        assert_eq!(
            blocks,
            vec![
                BlockNode::BulletList {
                    items: vec![
                        vec![RunNode::plain("first wrapped")],
                        vec![RunNode::plain("second")],
                    ],
                },
                BlockNode::OrderedList {
                    items: vec![vec![RunNode::plain("one")], vec![RunNode::plain("two")]],
                },
            ]
        );
    }

    #[test]
    fn emphasis_at_line_start_is_not_a_list() {
        let blocks = parse_blocks("*Note* the effect.");
        assert_eq!(
            blocks,
            vec![BlockNode::Paragraph {
                runs: vec![
                    RunNode::marked("Note", Mark::Italic),
                    RunNode::plain(" the effect."),
                ],
            }]
        );
    }

    #[test]
    fn headings_split_chunks() {
        let blocks = parse_blocks("## Results\nThe effect held.\n\nSecond.");
        assert_eq!(
            blocks,
            vec![
                BlockNode::heading(2, "Results"),
                BlockNode::paragraph("The effect held."),
                BlockNode::paragraph("Second."),
            ]
        );
    }

    #[test]
    fn paragraph_lines_are_joined() {
        let blocks = parse_blocks("line one\nline two\n\n\n\nnext");
        assert_eq!(
            blocks,
            vec![
                BlockNode::paragraph("line one line two"),
                BlockNode::paragraph("next"),
            ]
        );
    }

    #[test]
    fn inline_runs_in_order() {
        let runs = parse_inline("Plain **bold** mid *ital* and ***both*** end");
        let summary: Vec<_> = runs
            .iter()
            .map(|r| (r.text.as_str(), r.is_bold(), r.is_italic()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Plain ", false, false),
                ("bold", true, false),
                (" mid ", false, false),
                ("ital", false, true),
                (" and ", false, false),
                ("both", true, true),
                (" end", false, false),
            ]
        );
    }

    #[test]
    fn no_emphasis_is_one_run() {
        assert_eq!(parse_inline("just text"), vec![RunNode::plain("just text")]);
        assert!(parse_inline("").is_empty());
    }

    #[test]
    fn unmatched_asterisk_stays_plain() {
        assert_eq!(parse_inline("2 * 3"), vec![RunNode::plain("2 * 3")]);
    }

    #[test]
    fn spaced_asterisks_are_arithmetic() {
        let text = "2 * 3 * 4 = 24";
        assert_eq!(parse_inline(text), vec![RunNode::plain(text)]);

        let runs = parse_inline("a *b* c");
        assert_eq!(runs[1], RunNode::marked("b", Mark::Italic));
    }
}

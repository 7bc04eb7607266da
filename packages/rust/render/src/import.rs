//! DOCX → block nodes.

use std::collections::BTreeSet;

use tracing::{debug, instrument};

use docforge_shared::{BlockNode, Mark, Result, RunNode};
use docforge_structure::{DocxBlock, DocxParagraph, ListKind, read_docx};

use crate::text::blocks_to_markdown;

/// Convert paragraph runs to run nodes, merging neighbours with equal marks.
fn merge_runs(paragraph: &DocxParagraph) -> Vec<RunNode> {
    let mut out: Vec<RunNode> = Vec::new();
    for run in &paragraph.runs {
        let mut marks = BTreeSet::new();
        if run.bold {
            marks.insert(Mark::Bold);
        }
        if run.italic {
            marks.insert(Mark::Italic);
        }

        match out.last_mut() {
            Some(prev) if prev.marks == marks => prev.text.push_str(&run.text),
            _ => out.push(RunNode {
                text: run.text.clone(),
                marks,
            }),
        }
    }
    out
}

/// An open list waiting for more items.
struct PendingList {
    kind: ListKind,
    num_id: Option<String>,
    items: Vec<Vec<RunNode>>,
}

impl PendingList {
    fn into_block(self) -> BlockNode {
        match self.kind {
            ListKind::Bullet => BlockNode::BulletList { items: self.items },
            ListKind::Ordered => BlockNode::OrderedList { items: self.items },
        }
    }
}

/// Read a DOCX into block nodes.
///
/// Heading-styled paragraphs become headings, numbered paragraphs are grouped into
/// lists per numbering definition, tables keep their first row as the header.
#[instrument(skip_all, fields(bytes = bytes.len()))]
pub fn import_blocks(bytes: &[u8]) -> Result<Vec<BlockNode>> {
    let doc = read_docx(bytes)?;
    let mut blocks = Vec::new();
    let mut pending: Option<PendingList> = None;

    let flush = |pending: &mut Option<PendingList>, blocks: &mut Vec<BlockNode>| {
        if let Some(list) = pending.take() {
            blocks.push(list.into_block());
        }
    };

    for block in &doc.blocks {
        let paragraph = match block {
            DocxBlock::Table(rows) => {
                flush(&mut pending, &mut blocks);
                let mut rows = rows.iter().cloned();
                if let Some(headers) = rows.next() {
                    blocks.push(BlockNode::Table {
                        headers,
                        rows: rows.collect(),
                    });
                }
                continue;
            }
            DocxBlock::Paragraph(p) => p,
        };

        let runs = merge_runs(paragraph);
        let has_text = runs.iter().any(|r| !r.text.trim().is_empty());

        if let Some(level) = doc.heading_level(paragraph) {
            flush(&mut pending, &mut blocks);
            if has_text {
                blocks.push(BlockNode::Heading { level, runs });
            }
            continue;
        }

        if let Some(kind) = doc.list_kind(paragraph) {
            let continues = pending
                .as_ref()
                .is_some_and(|l| l.kind == kind && l.num_id == paragraph.num_id);
            if !continues {
                flush(&mut pending, &mut blocks);
                pending = Some(PendingList {
                    kind,
                    num_id: paragraph.num_id.clone(),
                    items: Vec::new(),
                });
            }
            if let Some(list) = pending.as_mut() {
                list.items.push(runs);
            }
            continue;
        }

        flush(&mut pending, &mut blocks);
        if has_text {
            blocks.push(BlockNode::Paragraph { runs });
        }
    }
    flush(&mut pending, &mut blocks);

    debug!(blocks = blocks.len(), "document imported");
    Ok(blocks)
}

/// Read a DOCX and serialize it as markdown-like text.
pub fn import_text(bytes: &[u8]) -> Result<String> {
    Ok(blocks_to_markdown(&import_blocks(bytes)?))
}

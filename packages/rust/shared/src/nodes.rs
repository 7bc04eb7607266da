//! Content-tree node types.
//!
//! The tree is a plain owned value: sections own blocks, blocks own runs.
//! Nothing is reference-counted, so no node can be shared between two trees.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::SectionId;

/// Run-level formatting mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mark {
    Bold,
    Italic,
}

/// A span of text with uniform formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunNode {
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub marks: BTreeSet<Mark>,
}

impl RunNode {
    /// An unmarked run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: BTreeSet::new(),
        }
    }

    /// A run carrying a single mark.
    pub fn marked(text: impl Into<String>, mark: Mark) -> Self {
        Self {
            text: text.into(),
            marks: BTreeSet::from([mark]),
        }
    }

    pub fn is_bold(&self) -> bool {
        self.marks.contains(&Mark::Bold)
    }

    pub fn is_italic(&self) -> bool {
        self.marks.contains(&Mark::Italic)
    }
}

/// A block-level node inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BlockNode {
    Heading { level: u8, runs: Vec<RunNode> },
    Paragraph { runs: Vec<RunNode> },
    BulletList { items: Vec<Vec<RunNode>> },
    OrderedList { items: Vec<Vec<RunNode>> },
    /// Cells hold raw cell text; inline emphasis is parsed when rendering.
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

impl BlockNode {
    /// A heading block with a single unmarked run.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::Heading {
            level,
            runs: vec![RunNode::plain(text)],
        }
    }

    /// A paragraph block with a single unmarked run.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph {
            runs: vec![RunNode::plain(text)],
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, Self::Heading { .. })
    }

    /// Concatenated text of the block, ignoring marks.
    pub fn plain_text(&self) -> String {
        fn join(runs: &[RunNode]) -> String {
            runs.iter().map(|r| r.text.as_str()).collect()
        }

        match self {
            Self::Heading { runs, .. } | Self::Paragraph { runs } => join(runs),
            Self::BulletList { items } | Self::OrderedList { items } => items
                .iter()
                .map(|item| join(item))
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Table { headers, rows } => std::iter::once(headers)
                .chain(rows.iter())
                .map(|row| row.join(" | "))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A named document part: the unit of generation and provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionNode {
    pub id: SectionId,
    pub title: String,
    pub level: u8,
    #[serde(default)]
    pub blocks: Vec<BlockNode>,
}

impl SectionNode {
    /// True when the section holds more than its own heading.
    pub fn has_content(&self) -> bool {
        self.blocks.iter().any(|b| !b.is_heading()) || self.blocks.len() > 1
    }
}

/// Root of a document-in-progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTree {
    #[serde(default)]
    pub sections: Vec<SectionNode>,
}

impl ContentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, id: &SectionId) -> Option<&SectionNode> {
        self.sections.iter().find(|s| &s.id == id)
    }

    pub fn section_mut(&mut self, id: &SectionId) -> Option<&mut SectionNode> {
        self.sections.iter_mut().find(|s| &s.id == id)
    }
}

//! Section-hierarchy extraction from document templates.
//!
//! A template is a DOCX whose headings (or, failing that, numbered/placeholder lines)
//! describe the sections the final document must contain. Extraction never fails past
//! this boundary: unreadable input yields `success = false` plus a warning.

pub mod docx;
mod hierarchy;
mod patterns;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use docforge_shared::{SectionDescriptor, SectionId};

pub use docx::{DocxBlock, DocxDocument, DocxParagraph, DocxRun, ListKind, StyleInfo, read_docx};
pub use hierarchy::{OutlineNode, assign_parents, outline, outline_text};
pub use patterns::{outline_level, placeholder_of};

/// Fewer descriptors than this triggers a structural warning.
const MIN_EXPECTED_SECTIONS: usize = 2;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A heading found in the template, before ids and parents are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeading {
    pub level: u8,
    pub title: String,
}

impl RawHeading {
    pub fn new(level: u8, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
        }
    }
}

/// How headings were found. Chosen once per document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Headings came from paragraph styles.
    StyleBased(Vec<RawHeading>),
    /// Headings came from text patterns, with the warnings that path produced.
    PatternBased(Vec<RawHeading>, Vec<String>),
}

impl Extraction {
    /// Style-based when any paragraph carries a heading style, pattern-based otherwise.
    pub fn from_docx(doc: &DocxDocument) -> Self {
        let styled: Vec<RawHeading> = doc
            .paragraphs()
            .filter_map(|p| {
                let level = doc.heading_level(p)?;
                let title = p.text().trim().to_string();
                (!title.is_empty()).then(|| RawHeading::new(level, title))
            })
            .collect();

        if !styled.is_empty() {
            return Self::StyleBased(styled);
        }

        let texts: Vec<String> = doc.paragraphs().map(DocxParagraph::text).collect();
        let headings = patterns::pattern_headings(texts.iter().map(String::as_str));
        Self::PatternBased(
            headings,
            vec!["no heading styles found; sections were detected from text patterns".into()],
        )
    }

    /// Pattern pass over a plain-text template.
    pub fn from_text(text: &str) -> Self {
        Self::PatternBased(patterns::pattern_headings(text.lines()), Vec::new())
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::StyleBased(_) => "style",
            Self::PatternBased(..) => "pattern",
        }
    }

    fn into_parts(self) -> (Vec<RawHeading>, Vec<String>) {
        match self {
            Self::StyleBased(headings) => (headings, Vec::new()),
            Self::PatternBased(headings, warnings) => (headings, warnings),
        }
    }
}

/// Outcome of one template parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStructure {
    pub success: bool,
    pub structure: Vec<SectionDescriptor>,
    pub warnings: Vec<String>,
}

impl TemplateStructure {
    fn failed(warning: String) -> Self {
        Self {
            success: false,
            structure: Vec::new(),
            warnings: vec![warning],
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract the section hierarchy from DOCX bytes.
#[instrument(skip_all, fields(bytes = bytes.len()))]
pub fn extract_structure(bytes: &[u8]) -> TemplateStructure {
    let doc = match read_docx(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "template could not be read");
            return TemplateStructure::failed(format!("could not read template: {e}"));
        }
    };

    let extraction = Extraction::from_docx(&doc);
    debug!(method = extraction.method(), "extraction method selected");
    build_structure(extraction)
}

/// Extract the section hierarchy from a plain-text template.
#[instrument(skip_all, fields(chars = text.len()))]
pub fn extract_from_text(text: &str) -> TemplateStructure {
    build_structure(Extraction::from_text(text))
}

fn build_structure(extraction: Extraction) -> TemplateStructure {
    let (headings, mut warnings) = extraction.into_parts();

    let mut seen_placeholders: HashSet<String> = HashSet::new();
    let mut structure: Vec<SectionDescriptor> = headings
        .into_iter()
        .enumerate()
        .map(|(order, heading)| {
            let placeholder = placeholder_of(&heading.title).filter(|name| {
                let fresh = seen_placeholders.insert(name.clone());
                if !fresh {
                    warnings.push(format!(
                        "placeholder {{{{{name}}}}} repeated in \"{}\"; keeping the first use",
                        heading.title
                    ));
                }
                fresh
            });

            SectionDescriptor {
                id: SectionId::new(),
                level: heading.level,
                title: heading.title,
                placeholder,
                order: order as u32,
                parent_id: None,
            }
        })
        .collect();

    assign_parents(&mut structure);

    if structure.len() < MIN_EXPECTED_SECTIONS {
        warnings.push(format!(
            "only {} section(s) found; the template may be missing headings",
            structure.len()
        ));
    }

    info!(
        sections = structure.len(),
        warnings = warnings.len(),
        "template structure extracted"
    );

    TemplateStructure {
        success: true,
        structure,
        warnings,
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

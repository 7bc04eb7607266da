//! Block nodes → DOCX.
//!
//! Template sections are emitted in template order. Sections with no content still get
//! their heading plus an italic placeholder, so the output's headings always mirror the
//! template.

use std::collections::HashSet;
use std::io::Cursor;

use docx_rs::{
    AbstractNumbering, AlignmentType, BreakType, Docx, IndentLevel, Level, LevelJc, LevelText,
    NumberFormat, Numbering, NumberingId, PageMargin, Paragraph, Run, RunFonts, Shading, ShdType,
    SpecialIndentType, Start, Style, StyleType, Table, TableCell, TableRow,
};
use tracing::{debug, info, instrument};

use docforge_shared::{
    BlockNode, ContentTree, DocforgeError, DocumentMetadata, ExportStyle, Mark, ReferenceRecord,
    Result, RunNode, SectionDescriptor, SectionId, SectionNode,
};

use crate::citation::format_citation;
use crate::markdown::{parse_blocks, parse_inline};

/// Numbering ids are allocated from here up; the bullet definition takes the first.
const FIRST_NUMBERING_ID: usize = 10;

/// Twips of hanging indent for list items and reference entries.
const HANGING_INDENT: i32 = 720;

const HEADER_FILL: &str = "D9D9D9";

const REFERENCES_TITLE: &str = "References";

/// Everything needed to render one document.
#[derive(Debug, Clone, Copy)]
pub struct ExportRequest<'a> {
    pub tree: &'a ContentTree,
    /// Template descriptors. Without them the tree is rendered in tree order.
    pub template: Option<&'a [SectionDescriptor]>,
    pub references: &'a [ReferenceRecord],
    pub metadata: Option<&'a DocumentMetadata>,
    pub style: &'a ExportStyle,
}

impl<'a> ExportRequest<'a> {
    pub fn new(tree: &'a ContentTree, style: &'a ExportStyle) -> Self {
        Self {
            tree,
            template: None,
            references: &[],
            metadata: None,
            style,
        }
    }

    pub fn with_template(mut self, template: &'a [SectionDescriptor]) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_references(mut self, references: &'a [ReferenceRecord]) -> Self {
        self.references = references;
        self
    }

    pub fn with_metadata(mut self, metadata: &'a DocumentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// ---------------------------------------------------------------------------
// Section planning
// ---------------------------------------------------------------------------

/// One section slot in output order.
#[derive(Debug)]
struct PlannedSection<'a> {
    level: u8,
    title: &'a str,
    /// `None` when the section has no content yet.
    blocks: Option<&'a [BlockNode]>,
}

fn filled(node: &SectionNode) -> Option<&[BlockNode]> {
    node.has_content().then_some(node.blocks.as_slice())
}

fn plan_sections<'a>(
    tree: &'a ContentTree,
    template: Option<&'a [SectionDescriptor]>,
) -> Vec<PlannedSection<'a>> {
    let Some(template) = template else {
        return tree
            .sections
            .iter()
            .map(|node| PlannedSection {
                level: node.level,
                title: &node.title,
                blocks: filled(node),
            })
            .collect();
    };

    let mut ordered: Vec<&SectionDescriptor> = template.iter().collect();
    ordered.sort_by_key(|d| d.order);
    let known: HashSet<SectionId> = ordered.iter().map(|d| d.id).collect();

    let from_template = ordered.into_iter().map(|d| PlannedSection {
        level: d.level,
        title: &d.title,
        blocks: tree.section(&d.id).and_then(filled),
    });

    let extras = tree
        .sections
        .iter()
        .filter(|node| !known.contains(&node.id))
        .map(|node| PlannedSection {
            level: node.level,
            title: &node.title,
            blocks: filled(node),
        });

    from_template.chain(extras).collect()
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

enum BodyElement {
    Paragraph(Paragraph),
    Table(Table),
}

/// Accumulates body elements and numbering definitions, then assembles the package.
struct DocxWriter<'a> {
    style: &'a ExportStyle,
    body: Vec<BodyElement>,
    abstract_numberings: Vec<AbstractNumbering>,
    numberings: Vec<Numbering>,
    bullet_id: Option<usize>,
    next_numbering_id: usize,
}

fn heading_style_id(level: u8) -> String {
    format!("Heading{}", level.clamp(1, 6))
}

fn heading_size(level: u8, body_size: usize) -> usize {
    match level {
        1 => body_size + 8,
        2 => body_size + 4,
        3 => body_size + 2,
        _ => body_size,
    }
}

fn to_run(node: &RunNode) -> Run {
    let mut run = Run::new().add_text(&node.text);
    if node.is_bold() {
        run = run.bold();
    }
    if node.is_italic() {
        run = run.italic();
    }
    run
}

fn with_runs(mut paragraph: Paragraph, runs: &[RunNode]) -> Paragraph {
    for node in runs.iter().filter(|r| !r.text.is_empty()) {
        paragraph = paragraph.add_run(to_run(node));
    }
    paragraph
}

fn list_level(format: &str, text: &str) -> Level {
    Level::new(
        0,
        Start::new(1),
        NumberFormat::new(format),
        LevelText::new(text),
        LevelJc::new("left"),
    )
    .indent(
        Some(HANGING_INDENT),
        Some(SpecialIndentType::Hanging(HANGING_INDENT / 2)),
        None,
        None,
    )
}

impl<'a> DocxWriter<'a> {
    fn new(style: &'a ExportStyle) -> Self {
        Self {
            style,
            body: Vec::new(),
            abstract_numberings: Vec::new(),
            numberings: Vec::new(),
            bullet_id: None,
            next_numbering_id: FIRST_NUMBERING_ID,
        }
    }

    fn push(&mut self, paragraph: Paragraph) {
        self.body.push(BodyElement::Paragraph(paragraph));
    }

    fn allocate_numbering(&mut self, format: &str, text: &str) -> usize {
        let id = self.next_numbering_id;
        self.next_numbering_id += 1;
        self.abstract_numberings
            .push(AbstractNumbering::new(id).add_level(list_level(format, text)));
        self.numberings.push(Numbering::new(id, id));
        id
    }

    /// Bullet lists share one definition.
    fn bullet_numbering(&mut self) -> usize {
        match self.bullet_id {
            Some(id) => id,
            None => {
                let id = self.allocate_numbering("bullet", "•");
                self.bullet_id = Some(id);
                id
            }
        }
    }

    fn heading(&mut self, level: u8, runs: &[RunNode]) {
        let paragraph = Paragraph::new().style(&heading_style_id(level));
        self.push(with_runs(paragraph, runs));
    }

    fn body_paragraph(&mut self, runs: &[RunNode]) {
        let mut paragraph = Paragraph::new();
        if self.style.justify_paragraphs {
            paragraph = paragraph.align(AlignmentType::Both);
        }
        self.push(with_runs(paragraph, runs));
    }

    fn list(&mut self, items: &[Vec<RunNode>], numbering_id: usize) {
        for item in items {
            let paragraph = Paragraph::new()
                .numbering(NumberingId::new(numbering_id), IndentLevel::new(0));
            self.push(with_runs(paragraph, item));
        }
    }

    fn table(&mut self, headers: &[String], rows: &[Vec<String>]) {
        let columns = rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(headers.len()))
            .max()
            .unwrap_or(0);
        if columns == 0 {
            return;
        }

        let cell = |text: &str, header: bool| {
            let runs: Vec<RunNode> = parse_inline(text)
                .into_iter()
                .map(|mut run| {
                    if header {
                        run.marks.insert(Mark::Bold);
                    }
                    run
                })
                .collect();
            let cell = TableCell::new().add_paragraph(with_runs(Paragraph::new(), &runs));
            if header {
                cell.shading(
                    Shading::new()
                        .shd_type(ShdType::Clear)
                        .color("auto")
                        .fill(HEADER_FILL),
                )
            } else {
                cell
            }
        };

        let row = |cells: &[String], header: bool| {
            let padded = (0..columns).map(|i| cells.get(i).map(String::as_str).unwrap_or(""));
            TableRow::new(padded.map(|text| cell(text, header)).collect())
        };

        let mut table_rows = Vec::with_capacity(rows.len() + 1);
        if !headers.is_empty() {
            table_rows.push(row(headers, true));
        }
        table_rows.extend(rows.iter().map(|r| row(r, false)));

        // docx-rs tables carry single-line borders on every edge by default
        self.body.push(BodyElement::Table(Table::new(table_rows)));
    }

    /// Only a section's leading heading is heading-styled. Headings inside the content
    /// become bold paragraphs, leaving the outline to the template.
    fn body_block(&mut self, block: &BlockNode) {
        match block {
            BlockNode::Heading { runs, .. } => {
                let bold: Vec<RunNode> = runs
                    .iter()
                    .map(|run| {
                        let mut run = run.clone();
                        run.marks.insert(Mark::Bold);
                        run
                    })
                    .collect();
                self.push(with_runs(Paragraph::new(), &bold));
            }
            BlockNode::Paragraph { runs } => self.body_paragraph(runs),
            BlockNode::BulletList { items } => {
                let id = self.bullet_numbering();
                self.list(items, id);
            }
            BlockNode::OrderedList { items } => {
                let id = self.allocate_numbering("decimal", "%1.");
                self.list(items, id);
            }
            BlockNode::Table { headers, rows } => self.table(headers, rows),
        }
    }

    fn section(&mut self, planned: &PlannedSection<'_>) {
        match planned.blocks {
            Some(blocks) => {
                let body = match blocks.split_first() {
                    Some((BlockNode::Heading { level, runs }, rest)) => {
                        self.heading(*level, runs);
                        rest
                    }
                    _ => {
                        self.heading(planned.level, &[RunNode::plain(planned.title)]);
                        blocks
                    }
                };
                for block in body {
                    self.body_block(block);
                }
            }
            None => {
                self.heading(planned.level, &[RunNode::plain(planned.title)]);
                let placeholder = RunNode::marked(&self.style.placeholder_text, Mark::Italic);
                self.body_paragraph(&[placeholder]);
            }
        }
    }

    fn title_block(&mut self, metadata: &DocumentMetadata) {
        if !metadata.title.trim().is_empty() {
            self.push(
                Paragraph::new()
                    .style("Title")
                    .align(AlignmentType::Center)
                    .add_run(Run::new().add_text(metadata.title.trim()).bold()),
            );
        }
        let authors: Vec<&str> = metadata
            .authors
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect();
        if !authors.is_empty() {
            self.push(
                Paragraph::new()
                    .align(AlignmentType::Center)
                    .add_run(Run::new().add_text(authors.join(", "))),
            );
        }
    }

    fn references(&mut self, references: &[ReferenceRecord]) {
        self.push(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)));
        self.heading(1, &[RunNode::plain(REFERENCES_TITLE)]);

        for (i, reference) in references.iter().enumerate() {
            let entry = format!("[{}] {}", i + 1, format_citation(reference));
            self.push(
                Paragraph::new()
                    .indent(
                        Some(HANGING_INDENT),
                        Some(SpecialIndentType::Hanging(HANGING_INDENT)),
                        None,
                        None,
                    )
                    .add_run(Run::new().add_text(entry)),
            );
        }
    }

    fn finish(self) -> Result<Vec<u8>> {
        let style = self.style;
        let margin = style.margin_twips;
        let font = style.font_family.as_str();

        let mut docx = Docx::new()
            .page_margin(
                PageMargin::new()
                    .top(margin)
                    .bottom(margin)
                    .left(margin)
                    .right(margin),
            )
            .default_fonts(
                RunFonts::new()
                    .ascii(font)
                    .hi_ansi(font)
                    .east_asia(font)
                    .cs(font),
            )
            .default_size(style.font_size_half_points)
            .add_style(
                Style::new("Title", StyleType::Paragraph)
                    .name("Title")
                    .bold()
                    .size(style.font_size_half_points + 12),
            );

        for level in 1..=6u8 {
            docx = docx.add_style(
                Style::new(heading_style_id(level), StyleType::Paragraph)
                    .name(format!("heading {level}"))
                    .bold()
                    .size(heading_size(level, style.font_size_half_points)),
            );
        }

        for abstract_numbering in self.abstract_numberings {
            docx = docx.add_abstract_numbering(abstract_numbering);
        }
        for numbering in self.numberings {
            docx = docx.add_numbering(numbering);
        }

        for element in self.body {
            docx = match element {
                BodyElement::Paragraph(p) => docx.add_paragraph(p),
                BodyElement::Table(t) => docx.add_table(t),
            };
        }

        let mut buf = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buf)
            .map_err(|e| DocforgeError::render(format!("failed to pack DOCX: {e}")))?;
        Ok(buf.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Render a content tree to DOCX bytes.
#[instrument(skip_all, fields(
    sections = request.tree.sections.len(),
    templated = request.template.is_some(),
    references = request.references.len(),
))]
pub fn render_document(request: &ExportRequest<'_>) -> Result<Vec<u8>> {
    let mut writer = DocxWriter::new(request.style);

    if let Some(metadata) = request.metadata {
        writer.title_block(metadata);
    }

    let plan = plan_sections(request.tree, request.template);
    let missing = plan.iter().filter(|p| p.blocks.is_none()).count();
    debug!(planned = plan.len(), missing, "section plan built");

    for planned in &plan {
        writer.section(planned);
    }

    if request.style.include_references && !request.references.is_empty() {
        writer.references(request.references);
    }

    let bytes = writer.finish()?;
    info!(bytes = bytes.len(), sections = plan.len(), missing, "document rendered");
    Ok(bytes)
}

/// Render free generation text under a single title, without a template.
pub fn render_plain(title: &str, text: &str, style: &ExportStyle) -> Result<Vec<u8>> {
    let mut blocks = vec![BlockNode::heading(1, title)];
    blocks.extend(parse_blocks(text));

    let tree = ContentTree {
        sections: vec![SectionNode {
            id: SectionId::new(),
            title: title.to_string(),
            level: 1,
            blocks,
        }],
    };
    render_document(&ExportRequest::new(&tree, style))
}

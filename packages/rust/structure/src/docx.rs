//! Minimal OOXML (DOCX) reader.
//!
//! DOCX files are ZIP archives containing:
//! - `word/document.xml`: paragraphs, runs and tables
//! - `word/styles.xml`: style ids, display names and outline levels
//! - `word/numbering.xml`: list definitions (bullet vs numbered)
//!
//! Only what the structure extractor and the importer need is read: paragraph
//! style, list membership, run text with bold/italic, and table cell text.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use zip::ZipArchive;

use docforge_shared::{DocforgeError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A parsed DOCX body plus the style and numbering tables needed to interpret it.
#[derive(Debug, Clone, Default)]
pub struct DocxDocument {
    /// Body blocks in document order.
    pub blocks: Vec<DocxBlock>,
    /// Style id → style info from `styles.xml`.
    pub styles: HashMap<String, StyleInfo>,
    /// Numbering id → list kind from `numbering.xml`.
    pub numbering: HashMap<String, ListKind>,
}

/// A top-level body element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocxBlock {
    Paragraph(DocxParagraph),
    /// Rows of cell text.
    Table(Vec<Vec<String>>),
}

/// A body paragraph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocxParagraph {
    pub style_id: Option<String>,
    pub num_id: Option<String>,
    pub runs: Vec<DocxRun>,
}

impl DocxParagraph {
    /// Concatenated run text.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// A text run with its emphasis flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocxRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

/// Style information parsed from `styles.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleInfo {
    /// Display name (`w:name`), e.g. `heading 1`.
    pub name: Option<String>,
    /// Heading level from `w:outlineLvl`, already +1 adjusted.
    pub outline_level: Option<u8>,
}

/// List flavour of a numbering definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Ordered,
}

impl DocxDocument {
    /// Heading level of a paragraph, if its style marks it as a heading.
    ///
    /// Matches `Heading1`..`Heading6` / `heading 1`..`heading 6` on either the style
    /// id or its display name, treats `Title` as level 1, and falls back to the
    /// style's outline level.
    pub fn heading_level(&self, paragraph: &DocxParagraph) -> Option<u8> {
        let style_id = paragraph.style_id.as_deref()?;
        let info = self.styles.get(style_id);

        let candidates = std::iter::once(style_id).chain(info.and_then(|i| i.name.as_deref()));
        for name in candidates {
            if let Some(level) = heading_level_from_name(name) {
                return Some(level);
            }
        }

        info.and_then(|i| i.outline_level).filter(|l| (1..=6).contains(l))
    }

    /// List kind of a paragraph, if it belongs to a numbering definition.
    pub fn list_kind(&self, paragraph: &DocxParagraph) -> Option<ListKind> {
        let num_id = paragraph.num_id.as_deref()?;
        // numId 0 means "numbering removed" in OOXML
        if num_id == "0" {
            return None;
        }
        Some(
            self.numbering
                .get(num_id)
                .copied()
                .unwrap_or(ListKind::Bullet),
        )
    }

    /// Non-table paragraphs in order.
    pub fn paragraphs(&self) -> impl Iterator<Item = &DocxParagraph> {
        self.blocks.iter().filter_map(|b| match b {
            DocxBlock::Paragraph(p) => Some(p),
            DocxBlock::Table(_) => None,
        })
    }
}

fn heading_level_from_name(name: &str) -> Option<u8> {
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)^heading\s*([1-6])$").expect("valid regex"));

    let name = name.trim();
    if name.eq_ignore_ascii_case("title") {
        return Some(1);
    }
    HEADING_RE
        .captures(name)
        .and_then(|c| c[1].parse::<u8>().ok())
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Read a DOCX package from memory.
pub fn read_docx(bytes: &[u8]) -> Result<DocxDocument> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DocforgeError::parse(format!("failed to open DOCX as ZIP: {e}")))?;

    let document_xml = read_part(&mut archive, "word/document.xml")?
        .ok_or_else(|| DocforgeError::parse("missing word/document.xml"))?;

    let styles = match read_part(&mut archive, "word/styles.xml")? {
        Some(xml) => parse_styles_xml(&xml)?,
        None => HashMap::new(),
    };

    let numbering = match read_part(&mut archive, "word/numbering.xml")? {
        Some(xml) => parse_numbering_xml(&xml)?,
        None => HashMap::new(),
    };

    let blocks = walk_body(&document_xml)?;

    tracing::debug!(
        blocks = blocks.len(),
        styles = styles.len(),
        numbering = numbering.len(),
        "read DOCX package"
    );

    Ok(DocxDocument {
        blocks,
        styles,
        numbering,
    })
}

fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(DocforgeError::parse(format!("failed to read {name}: {e}"))),
    };

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| DocforgeError::parse(format!("failed to decode {name}: {e}")))?;
    Ok(Some(content))
}

/// Extract an attribute value by key from an element.
fn get_attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .find(|a| a.as_ref().ok().map(|x| x.key.as_ref()) == Some(key))
        .and_then(std::result::Result::ok)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// True when `w:val` explicitly turns a toggle property off.
fn val_off(e: &BytesStart) -> bool {
    matches!(get_attr(e, b"w:val").as_deref(), Some("0" | "false" | "off"))
}

fn parse_styles_xml(xml: &str) -> Result<HashMap<String, StyleInfo>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut styles = HashMap::new();
    let mut buf = Vec::new();
    let mut current: Option<(String, StyleInfo)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:style" => {
                    let id = get_attr(&e, b"w:styleId").unwrap_or_default();
                    current = Some((id, StyleInfo::default()));
                }
                b"w:name" => {
                    if let Some((_, info)) = current.as_mut() {
                        info.name = get_attr(&e, b"w:val");
                    }
                }
                b"w:outlineLvl" => {
                    if let Some((_, info)) = current.as_mut() {
                        info.outline_level = get_attr(&e, b"w:val")
                            .and_then(|v| v.parse::<u8>().ok())
                            .map(|l| l + 1);
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) if e.name().as_ref() == b"w:style" => {
                if let Some((id, info)) = current.take() {
                    if !id.is_empty() {
                        styles.insert(id, info);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DocforgeError::parse(format!(
                    "error parsing styles.xml: {e}"
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(styles)
}

fn parse_numbering_xml(xml: &str) -> Result<HashMap<String, ListKind>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut abstract_kinds: HashMap<String, ListKind> = HashMap::new();
    let mut num_to_abstract: Vec<(String, String)> = Vec::new();

    let mut buf = Vec::new();
    let mut current_abstract: Option<String> = None;
    let mut current_level: Option<String> = None;
    let mut current_num: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:abstractNum" => current_abstract = get_attr(&e, b"w:abstractNumId"),
                b"w:lvl" => current_level = get_attr(&e, b"w:ilvl"),
                b"w:numFmt" if current_level.as_deref() == Some("0") => {
                    if let Some(id) = current_abstract.clone() {
                        let kind = match get_attr(&e, b"w:val").as_deref() {
                            Some("bullet") | Some("none") => ListKind::Bullet,
                            _ => ListKind::Ordered,
                        };
                        abstract_kinds.insert(id, kind);
                    }
                }
                b"w:num" => current_num = get_attr(&e, b"w:numId"),
                b"w:abstractNumId" => {
                    if let (Some(num), Some(abs)) = (current_num.clone(), get_attr(&e, b"w:val")) {
                        num_to_abstract.push((num, abs));
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:abstractNum" => current_abstract = None,
                b"w:lvl" => current_level = None,
                b"w:num" => current_num = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DocforgeError::parse(format!(
                    "error parsing numbering.xml: {e}"
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(num_to_abstract
        .into_iter()
        .map(|(num, abs)| {
            let kind = abstract_kinds.get(&abs).copied().unwrap_or(ListKind::Bullet);
            (num, kind)
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Body walk
// ---------------------------------------------------------------------------

/// Mutable state while walking `document.xml`.
#[derive(Default)]
struct WalkState {
    blocks: Vec<DocxBlock>,
    paragraph: Option<DocxParagraph>,
    run: Option<DocxRun>,
    in_run_props: bool,
    in_num_pr: bool,
    in_text: bool,
    /// Nesting depth of `w:tbl`; inner tables flatten into the outer cell.
    table_depth: usize,
    table_rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

impl WalkState {
    fn start(&mut self, e: &BytesStart) {
        match e.name().as_ref() {
            b"w:tbl" => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.table_rows.clear();
                }
            }
            b"w:tr" if self.table_depth == 1 => self.row.clear(),
            b"w:tc" if self.table_depth == 1 => self.cell.clear(),
            b"w:p" => self.paragraph = Some(DocxParagraph::default()),
            b"w:r" if self.paragraph.is_some() => self.run = Some(DocxRun::default()),
            b"w:rPr" if self.run.is_some() => self.in_run_props = true,
            b"w:numPr" => self.in_num_pr = true,
            b"w:t" if self.run.is_some() => self.in_text = true,
            _ => self.property(e),
        }
    }

    /// Property elements that usually arrive as empty tags.
    fn property(&mut self, e: &BytesStart) {
        match e.name().as_ref() {
            b"w:pStyle" => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.style_id = get_attr(e, b"w:val");
                }
            }
            b"w:numId" if self.in_num_pr => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.num_id = get_attr(e, b"w:val");
                }
            }
            b"w:b" if self.in_run_props => {
                if let Some(r) = self.run.as_mut() {
                    r.bold = !val_off(e);
                }
            }
            b"w:i" if self.in_run_props => {
                if let Some(r) = self.run.as_mut() {
                    r.italic = !val_off(e);
                }
            }
            b"w:tab" => {
                if let Some(r) = self.run.as_mut() {
                    r.text.push(' ');
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_text {
            if let Some(r) = self.run.as_mut() {
                r.text.push_str(text);
            }
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"w:t" => self.in_text = false,
            b"w:rPr" => self.in_run_props = false,
            b"w:numPr" => self.in_num_pr = false,
            b"w:r" => {
                if let (Some(run), Some(p)) = (self.run.take(), self.paragraph.as_mut()) {
                    if !run.text.is_empty() {
                        p.runs.push(run);
                    }
                }
            }
            b"w:p" => {
                let Some(paragraph) = self.paragraph.take() else {
                    return;
                };
                if self.table_depth > 0 {
                    let text = paragraph.text();
                    let text = text.trim();
                    if !text.is_empty() {
                        if !self.cell.is_empty() {
                            self.cell.push(' ');
                        }
                        self.cell.push_str(text);
                    }
                } else {
                    self.blocks.push(DocxBlock::Paragraph(paragraph));
                }
            }
            b"w:tc" if self.table_depth == 1 => {
                self.row.push(std::mem::take(&mut self.cell));
            }
            b"w:tr" if self.table_depth == 1 => {
                self.table_rows.push(std::mem::take(&mut self.row));
            }
            b"w:tbl" => {
                self.table_depth = self.table_depth.saturating_sub(1);
                if self.table_depth == 0 {
                    let rows = std::mem::take(&mut self.table_rows);
                    if !rows.is_empty() {
                        self.blocks.push(DocxBlock::Table(rows));
                    }
                }
            }
            _ => {}
        }
    }
}

fn walk_body(xml: &str) -> Result<Vec<DocxBlock>> {
    let mut reader = Reader::from_str(xml);
    // `xml:space="preserve"` runs carry meaningful leading/trailing spaces
    reader.trim_text(false);

    let mut state = WalkState::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => state.start(&e),
            Ok(Event::Empty(e)) => state.property(&e),
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| DocforgeError::parse(format!("bad text in document.xml: {e}")))?;
                state.text(&text);
            }
            Ok(Event::End(e)) => state.end(e.name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DocforgeError::parse(format!(
                    "error parsing document.xml: {e}"
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(state.blocks)
}

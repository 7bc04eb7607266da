//! Conversions between markdown-like text, content-tree blocks, and DOCX.
//!
//! - [`parse_blocks`] / [`parse_inline`]: text → blocks
//! - [`blocks_to_markdown`] / [`tree_to_markdown`]: blocks → text
//! - [`render_document`] / [`render_plain`]: blocks → DOCX
//! - [`import_blocks`] / [`import_text`]: DOCX → blocks
//!
//! All conversions are pure and deterministic apart from generated section ids.

mod citation;
mod export;
mod import;
mod markdown;
mod text;

pub use citation::format_citation;
pub use export::{ExportRequest, render_document, render_plain};
pub use import::{import_blocks, import_text};
pub use markdown::{parse_blocks, parse_inline, split_row};
pub use text::{blocks_to_markdown, runs_to_markdown, tree_to_markdown};

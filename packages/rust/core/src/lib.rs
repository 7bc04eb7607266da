//! Orchestration for docforge.
//!
//! Ties template extraction, generation, validation, the content tree, and DOCX
//! rendering together into the assemble/export workflows used by the CLI.

pub mod generation;
pub mod pipeline;

pub use generation::{HttpGenerator, SectionGenerator, SectionRequest, SourceDocument};
pub use pipeline::{
    GenerationOptions, GenerationReport, ProgressReporter, SectionOutcome, SilentProgress,
    export_draft, generate_sections, prepare_template, section_requests,
};

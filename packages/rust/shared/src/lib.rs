//! Shared types, error model, and configuration for docforge.
//!
//! This crate is the foundation depended on by all other docforge crates.
//! It provides:
//! - [`DocforgeError`], the unified error type
//! - Domain types ([`SectionId`], [`SectionDescriptor`], [`ReferenceRecord`], [`DocumentMetadata`])
//! - Content-tree nodes ([`ContentTree`], [`SectionNode`], [`BlockNode`], [`RunNode`])
//! - Configuration ([`AppConfig`], [`ExportStyle`], [`ValidationConfig`], config loading)

pub mod config;
pub mod error;
pub mod nodes;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EditStampPolicy, ExportConfig, ExportStyle, GenerationConfig, TreeConfig,
    ValidationConfig, ValidationSettings, config_dir, config_file_path, init_config,
    init_config_in, load_config, load_config_from, validate_config,
};
pub use error::{DocforgeError, Result};
pub use nodes::{BlockNode, ContentTree, Mark, RunNode, SectionNode};
pub use types::{DocumentMetadata, ReferenceRecord, SectionDescriptor, SectionId};

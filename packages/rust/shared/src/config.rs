//! Application configuration for docforge.
//!
//! User config lives at `~/.docforge/docforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DocforgeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docforge";

// ---------------------------------------------------------------------------
// Config structs (matching docforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output document formatting.
    #[serde(default)]
    pub export: ExportConfig,

    /// Generated-content screening.
    #[serde(default)]
    pub validation: ValidationSettings,

    /// External generation service.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Content tree behavior.
    #[serde(default)]
    pub tree: TreeConfig,
}

/// `[export]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Default body font.
    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Default body font size in points.
    #[serde(default = "default_font_size_pt")]
    pub font_size_pt: u32,

    /// Page margin applied to all four edges, in inches.
    #[serde(default = "default_margin_inches")]
    pub margin_inches: f32,

    /// Justify body paragraphs.
    #[serde(default = "default_true")]
    pub justify_paragraphs: bool,

    /// Text shown for template sections that have no content yet.
    #[serde(default = "default_placeholder_text")]
    pub placeholder_text: String,

    /// Append a References section when references are supplied.
    #[serde(default = "default_true")]
    pub include_references: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            font_family: default_font_family(),
            font_size_pt: default_font_size_pt(),
            margin_inches: default_margin_inches(),
            justify_paragraphs: true,
            placeholder_text: default_placeholder_text(),
            include_references: true,
        }
    }
}

fn default_font_family() -> String {
    "Times New Roman".into()
}
fn default_font_size_pt() -> u32 {
    12
}
fn default_margin_inches() -> f32 {
    1.0
}
fn default_placeholder_text() -> String {
    "[Content not yet generated]".into()
}
fn default_true() -> bool {
    true
}

/// `[validation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Cleaned content shorter than this is flagged as unusable.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Failure phrases checked in addition to the built-in set.
    #[serde(default)]
    pub extra_failure_phrases: Vec<String>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            min_content_chars: default_min_content_chars(),
            extra_failure_phrases: Vec::new(),
        }
    }
}

fn default_min_content_chars() -> usize {
    50
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// HTTP endpoint of the generation service (POST, JSON in/out).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Url>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Cap on concurrent generation calls. `0` means one call per section.
    #[serde(default)]
    pub max_concurrent: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            max_concurrent: 0,
        }
    }
}

fn default_timeout_secs() -> u64 {
    120
}

/// `[tree]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Which provenance entries get `manuallyEdited` on whole-tree replacement.
    #[serde(default)]
    pub edit_policy: EditStampPolicy,
}

/// Policy for stamping provenance when an external edit replaces the whole tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditStampPolicy {
    /// Every existing provenance entry is marked edited.
    #[default]
    All,
    /// Only sections whose block content differs are marked edited.
    ChangedOnly,
}

// ---------------------------------------------------------------------------
// Runtime views (derived from AppConfig)
// ---------------------------------------------------------------------------

/// Runtime export styling, in the units the document writer expects.
#[derive(Debug, Clone)]
pub struct ExportStyle {
    pub font_family: String,
    /// Font size in half-points.
    pub font_size_half_points: usize,
    /// Page margin in twentieths of a point.
    pub margin_twips: i32,
    pub justify_paragraphs: bool,
    pub placeholder_text: String,
    pub include_references: bool,
}

impl Default for ExportStyle {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ExportStyle {
    fn from(config: &AppConfig) -> Self {
        let export = &config.export;
        Self {
            font_family: export.font_family.clone(),
            font_size_half_points: export.font_size_pt as usize * 2,
            margin_twips: (export.margin_inches * 1440.0).round() as i32,
            justify_paragraphs: export.justify_paragraphs,
            placeholder_text: export.placeholder_text.clone(),
            include_references: export.include_references,
        }
    }
}

/// Runtime validation thresholds.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub min_content_chars: usize,
    pub extra_failure_phrases: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ValidationConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            min_content_chars: config.validation.min_content_chars,
            extra_failure_phrases: config.validation.extra_failure_phrases.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocforgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docforge/docforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocforgeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DocforgeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    init_config_in(&dir)
}

/// Write a default config file into `dir`, creating it if needed.
pub fn init_config_in(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| DocforgeError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocforgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocforgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject values that would produce a broken document or a stalled pipeline.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.export.font_size_pt == 0 {
        return Err(DocforgeError::config("export.font_size_pt must be positive"));
    }
    if !(0.0..=4.0).contains(&config.export.margin_inches) {
        return Err(DocforgeError::config(
            "export.margin_inches must be between 0 and 4",
        ));
    }
    if config.generation.timeout_secs == 0 {
        return Err(DocforgeError::config("generation.timeout_secs must be positive"));
    }
    Ok(())
}

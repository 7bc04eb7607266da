//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use docforge_core::{
    GenerationOptions, GenerationReport, HttpGenerator, ProgressReporter, SectionGenerator,
    SectionRequest, SourceDocument, export_draft, generate_sections, prepare_template,
    section_requests,
};
use docforge_render::import_text;
use docforge_shared::{
    AppConfig, DocforgeError, DocumentMetadata, ExportStyle, ReferenceRecord, ValidationConfig,
    init_config, load_config, load_config_from,
};
use docforge_structure::{outline, outline_text};
use docforge_tree::{DraftDocument, DraftRecord};
use docforge_validator::{check_source_coverage, validate_against_sources, validate_section};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docforge: fill a DOCX template section by section.
#[derive(Parser)]
#[command(
    name = "docforge",
    version,
    about = "Extract a template's sections, fill them from drafts or a generation service, and export DOCX.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.docforge/docforge.toml.
    #[arg(long, global = true, env = "DOCFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print the section structure of a DOCX template.
    Structure {
        /// Template file.
        template: PathBuf,

        /// Print an indented outline instead of JSON.
        #[arg(long)]
        tree: bool,
    },

    /// Clean and screen a generated section, printing the result as JSON.
    Validate {
        /// Text file holding the generated section.
        file: PathBuf,

        /// Source text to check numbers against (repeatable).
        #[arg(long = "source")]
        sources: Vec<PathBuf>,

        /// Number of sources the text should cite as "Paper N" / "Study N".
        #[arg(long = "sources", value_name = "N", conflicts_with = "sources")]
        source_count: Option<usize>,
    },

    /// Build a document from a template, filling each section.
    Assemble {
        /// Template file.
        #[arg(long)]
        template: PathBuf,

        /// Directory of per-section drafts (`<PLACEHOLDER>.md` or `<title-slug>.md`).
        #[arg(long, conflicts_with = "endpoint")]
        drafts: Option<PathBuf>,

        /// Generation service URL (defaults to generation.endpoint).
        #[arg(long)]
        endpoint: Option<Url>,

        /// Directory of source documents (.txt, .md, .docx).
        #[arg(long)]
        sources_dir: Option<PathBuf>,

        /// JSON file with a list of references.
        #[arg(long)]
        refs: Option<PathBuf>,

        /// JSON file with document metadata.
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Draft state file; resumed from if present and written afterwards.
        #[arg(long)]
        state: Option<PathBuf>,

        /// Output DOCX path.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Export a saved draft state as DOCX.
    Export {
        /// Draft state file written by `assemble --state`.
        #[arg(long)]
        state: PathBuf,

        /// Output DOCX path.
        #[arg(short, long)]
        out: PathBuf,

        /// JSON file with a list of references.
        #[arg(long)]
        refs: Option<PathBuf>,

        /// JSON file with document metadata.
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Print a DOCX file's content as markdown-like text.
    Import {
        /// DOCX file to read.
        file: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docforge=info",
        1 => "docforge=debug",
        _ => "docforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Structure { template, tree } => cmd_structure(&template, tree),
        Command::Validate {
            file,
            sources,
            source_count,
        } => cmd_validate(config_path, &file, &sources, source_count),
        Command::Assemble {
            template,
            drafts,
            endpoint,
            sources_dir,
            refs,
            metadata,
            state,
            out,
        } => {
            let args = AssembleArgs {
                template,
                drafts,
                endpoint,
                sources_dir,
                refs,
                metadata,
                state,
                out,
            };
            cmd_assemble(config_path, args).await
        }
        Command::Export {
            state,
            out,
            refs,
            metadata,
        } => cmd_export(config_path, &state, &out, refs.as_deref(), metadata.as_deref()),
        Command::Import { file } => cmd_import(&file),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_structure(template: &Path, tree: bool) -> Result<()> {
    let bytes = read_bytes(template)?;
    let structure = prepare_template(&bytes);

    if tree {
        print!("{}", outline_text(&outline(&structure.structure)));
        for warning in &structure.warnings {
            eprintln!("warning: {warning}");
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&structure)?);
    }

    if !structure.success {
        return Err(eyre!("could not extract a structure from '{}'", template.display()));
    }
    Ok(())
}

fn cmd_validate(
    config_path: Option<&Path>,
    file: &Path,
    sources: &[PathBuf],
    source_count: Option<usize>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let validation = ValidationConfig::from(&config);
    let raw = read_text(file)?;

    let result = if !sources.is_empty() {
        let texts = sources
            .iter()
            .map(|p| read_text(p))
            .collect::<Result<Vec<_>>>()?;
        validate_against_sources(&raw, &texts, &validation)
    } else {
        let mut result = validate_section(&raw, &validation);
        if let Some(n) = source_count.filter(|_| !result.content.is_empty()) {
            let coverage = check_source_coverage(&result.content, n);
            result.warnings.extend(coverage.warnings);
        }
        result
    };

    info!(
        file = %file.display(),
        success = result.success,
        warnings = result.warnings.len(),
        "section validated"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Parsed `assemble` arguments.
struct AssembleArgs {
    template: PathBuf,
    drafts: Option<PathBuf>,
    endpoint: Option<Url>,
    sources_dir: Option<PathBuf>,
    refs: Option<PathBuf>,
    metadata: Option<PathBuf>,
    state: Option<PathBuf>,
    out: PathBuf,
}

async fn cmd_assemble(config_path: Option<&Path>, args: AssembleArgs) -> Result<()> {
    let config = resolve_config(config_path)?;
    let policy = config.tree.edit_policy;

    let mut draft = match args.state.as_deref().filter(|p| p.exists()) {
        Some(state) => {
            info!(state = %state.display(), "resuming from saved state");
            DraftDocument::from_record(read_record(state)?, policy)?
        }
        None => {
            let bytes = read_bytes(&args.template)?;
            let structure = prepare_template(&bytes);
            if !structure.success {
                return Err(eyre!(
                    "could not extract a structure from '{}': {}",
                    args.template.display(),
                    structure.warnings.join("; ")
                ));
            }
            DraftDocument::new(&structure.structure, policy)
        }
    };

    let sources = match args.sources_dir.as_deref() {
        Some(dir) => load_sources(dir)?,
        None => Vec::new(),
    };
    let requests = section_requests(draft.template(), &sources);
    let options = GenerationOptions {
        validation: ValidationConfig::from(&config),
        max_concurrent: config.generation.max_concurrent,
    };

    info!(
        template = %args.template.display(),
        sections = requests.len(),
        sources = sources.len(),
        "assembling document"
    );

    let reporter = CliProgress::new();
    let report = match (args.drafts, args.endpoint) {
        (Some(dir), _) => {
            let generator = Arc::new(DraftDirGenerator::new(dir));
            generate_sections(&mut draft, generator, requests, &options, &reporter).await?
        }
        (None, endpoint) => {
            let generator = match endpoint {
                Some(url) => HttpGenerator::new(url, config.generation.timeout_secs)?,
                None => HttpGenerator::from_config(&config.generation)
                    .wrap_err("pass --drafts or --endpoint, or set generation.endpoint")?,
            };
            info!(endpoint = %generator.endpoint(), "using generation service");
            generate_sections(&mut draft, Arc::new(generator), requests, &options, &reporter)
                .await?
        }
    };

    if let Some(state) = args.state.as_deref() {
        write_record(state, &draft.to_record())?;
    }

    let references = read_references(args.refs.as_deref())?;
    let metadata = read_metadata(args.metadata.as_deref())?;
    let bytes = export_draft(&draft, &references, metadata.as_ref(), &ExportStyle::from(&config))?;
    write_bytes(&args.out, &bytes)?;

    print_report(&report, &args.out);
    Ok(())
}

fn cmd_export(
    config_path: Option<&Path>,
    state: &Path,
    out: &Path,
    refs: Option<&Path>,
    metadata: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let draft = DraftDocument::from_record(read_record(state)?, config.tree.edit_policy)?;

    let references = read_references(refs)?;
    let metadata = read_metadata(metadata)?;
    let bytes = export_draft(&draft, &references, metadata.as_ref(), &ExportStyle::from(&config))?;
    write_bytes(out, &bytes)?;

    let sections = draft.list_sections();
    let filled = sections.iter().filter(|s| s.has_content).count();
    info!(out = %out.display(), sections = sections.len(), filled, "document exported");
    println!("  Exported {filled}/{} sections to {}", sections.len(), out.display());
    Ok(())
}

fn cmd_import(file: &Path) -> Result<()> {
    let bytes = read_bytes(file)?;
    let text = import_text(&bytes)?;
    println!("{text}");
    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DocforgeError::io(parent, e))?;
            }
            let content = toml::to_string_pretty(&AppConfig::default())?;
            std::fs::write(path, content).map_err(|e| DocforgeError::io(path, e))?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_report(report: &GenerationReport, out: &Path) {
    println!();
    println!("  Document assembled!");
    println!("  Sections: {}", report.outcomes.len());
    println!("  Filled:   {}", report.applied());
    println!("  Output:   {}", out.display());
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());

    let manual = report.needs_manual_input();
    if !manual.is_empty() {
        println!();
        println!("  Needs manual input:");
        for outcome in manual {
            let reason = outcome
                .result
                .error
                .as_deref()
                .or_else(|| outcome.result.warnings.first().map(String::as_str))
                .unwrap_or("no content");
            println!("    - {}: {reason}", outcome.title);
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// Draft directory generator
// ---------------------------------------------------------------------------

/// Serves pre-written section drafts from a directory.
///
/// A section's draft is the first of `<PLACEHOLDER>.md`, `<PLACEHOLDER>.txt`,
/// `<title-slug>.md`, `<title-slug>.txt` that exists.
struct DraftDirGenerator {
    dir: PathBuf,
}

impl DraftDirGenerator {
    fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn candidates(&self, request: &SectionRequest) -> Vec<PathBuf> {
        let mut stems: Vec<String> = request.placeholder.iter().cloned().collect();
        let slug = slugify(&request.title);
        if !slug.is_empty() {
            stems.push(slug);
        }
        stems
            .iter()
            .flat_map(|stem| ["md", "txt"].map(|ext| self.dir.join(format!("{stem}.{ext}"))))
            .collect()
    }
}

impl SectionGenerator for DraftDirGenerator {
    async fn generate(&self, request: &SectionRequest) -> docforge_shared::Result<String> {
        for path in self.candidates(request) {
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    debug!(path = %path.display(), "draft found");
                    return Ok(text);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(DocforgeError::io(&path, e)),
            }
        }
        Err(DocforgeError::generation(format!(
            "no draft for '{}' in {}",
            request.title,
            self.dir.display()
        )))
    }
}

/// Lowercase ASCII alphanumerics with single dashes between words.
fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    Ok(std::fs::read(path).map_err(|e| DocforgeError::io(path, e))?)
}

fn read_text(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path).map_err(|e| DocforgeError::io(path, e))?)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    Ok(std::fs::write(path, bytes).map_err(|e| DocforgeError::io(path, e))?)
}

fn read_record(path: &Path) -> Result<DraftRecord> {
    let text = read_text(path)?;
    serde_json::from_str(&text).wrap_err_with(|| format!("invalid state file '{}'", path.display()))
}

fn write_record(path: &Path, record: &DraftRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    write_bytes(path, json.as_bytes())?;
    debug!(path = %path.display(), "state written");
    Ok(())
}

fn read_references(path: Option<&Path>) -> Result<Vec<ReferenceRecord>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let text = read_text(path)?;
    serde_json::from_str(&text)
        .wrap_err_with(|| format!("invalid references file '{}'", path.display()))
}

fn read_metadata(path: Option<&Path>) -> Result<Option<DocumentMetadata>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = read_text(path)?;
    let metadata = serde_json::from_str(&text)
        .wrap_err_with(|| format!("invalid metadata file '{}'", path.display()))?;
    Ok(Some(metadata))
}

/// Every .txt, .md, and .docx file in `dir`, sorted by file name. Ids are file stems.
fn load_sources(dir: &Path) -> Result<Vec<SourceDocument>> {
    let entries = std::fs::read_dir(dir).map_err(|e| DocforgeError::io(dir, e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut sources = Vec::new();
    for path in paths {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let text = match ext.as_deref() {
            Some("txt" | "md") => read_text(&path)?,
            Some("docx") => import_text(&read_bytes(&path)?)?,
            _ => {
                debug!(path = %path.display(), "skipping non-source file");
                continue;
            }
        };
        if text.trim().is_empty() {
            warn!(path = %path.display(), "source is empty, skipping");
            continue;
        }
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        sources.push(SourceDocument { id, text });
    }
    Ok(sources)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid progress template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn section_done(&self, title: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Merged [{current}/{total}] {title}"));
    }

    fn done(&self, _report: &GenerationReport) {
        self.spinner.finish_and_clear();
    }
}

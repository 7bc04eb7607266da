//! End-to-end assembly: template → concurrent generation → validated upserts → export.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use docforge_render::{ExportRequest, render_document};
use docforge_shared::{
    DocforgeError, DocumentMetadata, ExportStyle, ReferenceRecord, Result, SectionDescriptor,
    SectionId, ValidationConfig,
};
use docforge_structure::{TemplateStructure, extract_structure};
use docforge_tree::{DraftDocument, ProvenanceInputs};
use docforge_validator::{GeneratedSectionResult, validate_against_sources};

use crate::generation::{SectionGenerator, SectionRequest, SourceDocument};

/// Knobs for one generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub validation: ValidationConfig,
    /// Cap on in-flight generator calls. `0` means no cap.
    pub max_concurrent: usize,
}

/// What happened to one request.
#[derive(Debug, Clone)]
pub struct SectionOutcome {
    pub section_id: SectionId,
    pub title: String,
    pub result: GeneratedSectionResult,
    /// Content was written into the draft.
    pub applied: bool,
}

/// Summary of a generation run, outcomes in request order.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub outcomes: Vec<SectionOutcome>,
    pub elapsed: std::time::Duration,
}

impl GenerationReport {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.applied).count()
    }

    /// Sections that should be written or regenerated by hand.
    pub fn needs_manual_input(&self) -> Vec<&SectionOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.result.needs_manual_input())
            .collect()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each section's result is applied, in request order.
    fn section_done(&self, title: &str, current: usize, total: usize);
    /// Called when the generation run completes.
    fn done(&self, report: &GenerationReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn section_done(&self, _title: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &GenerationReport) {}
}

/// Parse a DOCX template. Never fails; problems are reported as warnings.
pub fn prepare_template(bytes: &[u8]) -> TemplateStructure {
    let structure = extract_structure(bytes);
    for warning in &structure.warnings {
        warn!(%warning, "template warning");
    }
    structure
}

/// One request per descriptor, in template order, each carrying every source.
pub fn section_requests(
    template: &[SectionDescriptor],
    sources: &[SourceDocument],
) -> Vec<SectionRequest> {
    let mut ordered: Vec<&SectionDescriptor> = template.iter().collect();
    ordered.sort_by_key(|d| d.order);
    ordered
        .into_iter()
        .map(|d| SectionRequest {
            section_id: d.id,
            title: d.title.clone(),
            placeholder: d.placeholder.clone(),
            sources: sources.to_vec(),
        })
        .collect()
}

/// Generate every requested section concurrently and merge the results into `draft`.
///
/// Generator calls run as independent tokio tasks. Once all have finished, results are
/// validated and applied one at a time in request order, so several requests for the
/// same section resolve last-write-wins. A generator error is recorded as a failed
/// outcome and leaves that section unpopulated.
#[instrument(skip_all, fields(requests = requests.len(), max_concurrent = options.max_concurrent))]
pub async fn generate_sections<G: SectionGenerator>(
    draft: &mut DraftDocument,
    generator: Arc<G>,
    requests: Vec<SectionRequest>,
    options: &GenerationOptions,
    progress: &dyn ProgressReporter,
) -> Result<GenerationReport> {
    let start = Instant::now();

    if let Some(stray) = requests
        .iter()
        .find(|r| draft.descriptor(&r.section_id).is_none())
    {
        return Err(DocforgeError::unknown_section(stray.section_id));
    }

    progress.phase("Generating sections");
    let semaphore = (options.max_concurrent > 0)
        .then(|| Arc::new(Semaphore::new(options.max_concurrent)));

    let handles: Vec<_> = requests
        .iter()
        .cloned()
        .map(|request| {
            let generator = Arc::clone(&generator);
            let semaphore = semaphore.clone();
            tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(s) => Some(s.acquire_owned().await.map_err(|e| {
                        DocforgeError::generation(format!("concurrency limiter closed: {e}"))
                    })?),
                    None => None,
                };
                generator.generate(&request).await
            })
        })
        .collect();

    let mut raw = Vec::with_capacity(handles.len());
    for handle in handles {
        let outcome = handle.await.unwrap_or_else(|e| {
            Err(DocforgeError::generation(format!("generation task failed: {e}")))
        });
        raw.push(outcome);
    }

    progress.phase("Validating and merging");
    let total = requests.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, (request, generated)) in requests.into_iter().zip(raw).enumerate() {
        let (result, applied) = match generated {
            Ok(text) => {
                let result =
                    validate_against_sources(&text, &request.source_texts(), &options.validation);
                let applied = !result.content.is_empty();
                if applied {
                    let inputs = ProvenanceInputs::new(
                        request.sources.iter().map(|s| s.id.clone()),
                        request.placeholder.iter().cloned(),
                    );
                    draft.upsert_section(request.section_id, &request.title, &result, inputs)?;
                }
                (result, applied)
            }
            Err(e) => {
                warn!(section = %request.section_id, error = %e, "generation failed");
                (GeneratedSectionResult::failed(format!("generation failed: {e}")), false)
            }
        };

        progress.section_done(&request.title, i + 1, total);
        outcomes.push(SectionOutcome {
            section_id: request.section_id,
            title: request.title,
            result,
            applied,
        });
    }

    let report = GenerationReport {
        outcomes,
        elapsed: start.elapsed(),
    };
    info!(
        applied = report.applied(),
        manual = report.needs_manual_input().len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "generation run complete"
    );
    progress.done(&report);
    Ok(report)
}

/// Render the draft as DOCX in template order.
pub fn export_draft(
    draft: &DraftDocument,
    references: &[ReferenceRecord],
    metadata: Option<&DocumentMetadata>,
    style: &ExportStyle,
) -> Result<Vec<u8>> {
    let mut request = ExportRequest::new(draft.tree(), style).with_references(references);
    if !draft.template().is_empty() {
        request = request.with_template(draft.template());
    }
    if let Some(metadata) = metadata {
        request = request.with_metadata(metadata);
    }
    render_document(&request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use docforge_shared::{BlockNode, EditStampPolicy};
    use docforge_structure::{extract_from_text, read_docx};

    const BODY: &str =
        "This section reviews the evidence in detail and draws together the main findings.";

    /// Answers by title; titles without an entry fail.
    struct MapGenerator {
        answers: HashMap<String, String>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl MapGenerator {
        fn new(answers: &[(&str, &str)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                delay: Duration::from_millis(0),
            }
        }
    }

    impl SectionGenerator for MapGenerator {
        async fn generate(&self, request: &SectionRequest) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.answers
                .get(&request.title)
                .cloned()
                .ok_or_else(|| DocforgeError::generation("service unavailable"))
        }
    }

    fn template() -> Vec<SectionDescriptor> {
        extract_from_text("1 Introduction\n2 Methods\n3 Results").structure
    }

    #[tokio::test]
    async fn generates_validates_and_merges() {
        let t = template();
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        let generator = Arc::new(MapGenerator::new(&[
            ("1 Introduction", BODY),
            ("2 Methods", "unable to generate: insufficient source content"),
        ]));

        let report = generate_sections(
            &mut draft,
            generator,
            section_requests(&t, &[]),
            &GenerationOptions::default(),
            &SilentProgress,
        )
        .await
        .expect("run");

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.applied(), 1);
        // failure phrase and generator error both need manual input
        assert_eq!(report.needs_manual_input().len(), 2);
        assert!(report.outcomes[2].result.warnings[0].contains("service unavailable"));

        assert_eq!(draft.tree().sections.len(), 1);
        assert!(draft.section(&t[0].id).is_some());
    }

    #[tokio::test]
    async fn duplicate_requests_resolve_last_write_wins() {
        let t = template();
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        let revised = "A second, revised rendering of the introduction with more careful wording.";
        let generator = Arc::new(MapGenerator::new(&[("first", BODY), ("second", revised)]));

        let request = |title: &str| SectionRequest {
            section_id: t[0].id,
            title: title.to_string(),
            placeholder: None,
            sources: vec![],
        };

        generate_sections(
            &mut draft,
            generator,
            vec![request("first"), request("second")],
            &GenerationOptions::default(),
            &SilentProgress,
        )
        .await
        .expect("run");

        assert_eq!(draft.tree().sections.len(), 1);
        let node = draft.section(&t[0].id).expect("section");
        assert_eq!(node.title, "second");
        assert_eq!(node.blocks[1], BlockNode::paragraph(revised));
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        let t = extract_from_text("1 A\n2 B\n3 C\n4 D\n5 E").structure;
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        let mut generator = MapGenerator::new(&[]);
        generator.delay = Duration::from_millis(20);
        let generator = Arc::new(generator);

        let options = GenerationOptions {
            max_concurrent: 2,
            ..GenerationOptions::default()
        };
        generate_sections(
            &mut draft,
            Arc::clone(&generator),
            section_requests(&t, &[]),
            &options,
            &SilentProgress,
        )
        .await
        .expect("run");

        assert!(generator.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn unknown_request_id_is_rejected_before_generation() {
        let t = template();
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        let generator = Arc::new(MapGenerator::new(&[]));
        let stray = SectionRequest {
            section_id: SectionId::new(),
            title: "Stray".into(),
            placeholder: None,
            sources: vec![],
        };

        let err = generate_sections(
            &mut draft,
            Arc::clone(&generator),
            vec![stray],
            &GenerationOptions::default(),
            &SilentProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DocforgeError::UnknownSection { .. }));
        assert_eq!(generator.peak.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provenance_records_sources_and_grounding() {
        let t = template();
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        let text = "Paper 1 found a 37% reduction in symptoms across the treatment group overall.";
        let generator = Arc::new(MapGenerator::new(&[("1 Introduction", text)]));
        let sources = [
            SourceDocument {
                id: "paper-1".into(),
                text: "Symptoms fell by 37 percent.".into(),
            },
            SourceDocument {
                id: "paper-2".into(),
                text: "A second trial.".into(),
            },
        ];

        generate_sections(
            &mut draft,
            generator,
            section_requests(&t[..1], &sources),
            &GenerationOptions::default(),
            &SilentProgress,
        )
        .await
        .expect("run");

        let provenance = draft.provenance(&t[0].id).expect("provenance");
        assert_eq!(provenance.source_document_ids.len(), 2);
        assert_eq!(
            provenance.warnings,
            vec!["1 of 2 sources never referenced: 2".to_string()]
        );
    }

    #[tokio::test]
    async fn export_fills_gaps_with_placeholders() {
        let t = template();
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        let generator = Arc::new(MapGenerator::new(&[("2 Methods", BODY)]));
        generate_sections(
            &mut draft,
            generator,
            section_requests(&t, &[]),
            &GenerationOptions::default(),
            &SilentProgress,
        )
        .await
        .expect("run");

        let style = ExportStyle::default();
        let bytes = export_draft(&draft, &[], None, &style).expect("export");
        let doc = read_docx(&bytes).expect("read back");
        let headings: Vec<String> = doc
            .paragraphs()
            .filter(|p| doc.heading_level(p).is_some())
            .map(|p| p.text())
            .collect();
        assert_eq!(headings, ["1 Introduction", "2 Methods", "3 Results"]);
        assert_eq!(
            doc.paragraphs()
                .filter(|p| p.text() == style.placeholder_text)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn generated_subheadings_keep_template_outline() {
        let t = template();
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        let text = format!("{BODY}\n\n## Background\n\n{BODY}");
        let generator = Arc::new(MapGenerator::new(&[
            ("1 Introduction", text.as_str()),
            ("3 Results", text.as_str()),
        ]));
        generate_sections(
            &mut draft,
            generator,
            section_requests(&t, &[]),
            &GenerationOptions::default(),
            &SilentProgress,
        )
        .await
        .expect("run");

        let bytes = export_draft(&draft, &[], None, &ExportStyle::default()).expect("export");
        let reextracted = extract_structure(&bytes);
        let titles: Vec<&str> = reextracted.structure.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, ["1 Introduction", "2 Methods", "3 Results"]);
    }
}

//! The document being assembled: template, content tree, and provenance.
//!
//! [`DraftDocument`] is the single owner of a tree. All mutation goes through
//! [`DraftDocument::upsert_section`] (one section from generation) or
//! [`DraftDocument::replace_whole`] (an external edit of the whole tree).

mod provenance;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use docforge_render::{parse_blocks, tree_to_markdown};
use docforge_shared::{
    BlockNode, ContentTree, DocforgeError, EditStampPolicy, Result, SectionDescriptor, SectionId,
    SectionNode,
};
use docforge_validator::GeneratedSectionResult;

pub use provenance::{ProvenanceInputs, SectionProvenance};

use provenance::{fingerprint, next_stamp};

/// Listing entry for one section in tree order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    pub id: SectionId,
    pub title: String,
    pub has_content: bool,
    pub warnings: Vec<String>,
}

/// Persisted form of a draft, round-tripped verbatim as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    #[serde(default)]
    pub template: Vec<SectionDescriptor>,
    #[serde(default)]
    pub tree: ContentTree,
    #[serde(default)]
    pub provenance: BTreeMap<SectionId, SectionProvenance>,
}

/// A document in progress.
#[derive(Debug, Clone)]
pub struct DraftDocument {
    template: Vec<SectionDescriptor>,
    tree: ContentTree,
    provenance: BTreeMap<SectionId, SectionProvenance>,
    policy: EditStampPolicy,
}

fn ensure_unique_ids(tree: &ContentTree) -> Result<()> {
    let mut seen = HashSet::new();
    for section in &tree.sections {
        if !seen.insert(section.id) {
            return Err(DocforgeError::validation(format!(
                "duplicate section id {} in tree",
                section.id
            )));
        }
    }
    Ok(())
}

impl DraftDocument {
    /// An empty draft for `template`.
    pub fn new(template: &[SectionDescriptor], policy: EditStampPolicy) -> Self {
        Self {
            template: template.to_vec(),
            tree: ContentTree::new(),
            provenance: BTreeMap::new(),
            policy,
        }
    }

    /// Restore a draft from its persisted record.
    pub fn from_record(record: DraftRecord, policy: EditStampPolicy) -> Result<Self> {
        ensure_unique_ids(&record.tree)?;
        Ok(Self {
            template: record.template,
            tree: record.tree,
            provenance: record.provenance,
            policy,
        })
    }

    pub fn to_record(&self) -> DraftRecord {
        DraftRecord {
            template: self.template.clone(),
            tree: self.tree.clone(),
            provenance: self.provenance.clone(),
        }
    }

    pub fn template(&self) -> &[SectionDescriptor] {
        &self.template
    }

    pub fn tree(&self) -> &ContentTree {
        &self.tree
    }

    pub fn descriptor(&self, id: &SectionId) -> Option<&SectionDescriptor> {
        self.template.iter().find(|d| &d.id == id)
    }

    pub fn section(&self, id: &SectionId) -> Option<&SectionNode> {
        self.tree.section(id)
    }

    pub fn provenance(&self, id: &SectionId) -> Option<&SectionProvenance> {
        self.provenance.get(id)
    }

    /// Populate (or repopulate) one template section from validated content.
    ///
    /// The section's block list is replaced as a whole: a heading carrying `title` at the
    /// template level, followed by the parsed content. Provenance is overwritten.
    #[instrument(skip_all, fields(section = %id))]
    pub fn upsert_section(
        &mut self,
        id: SectionId,
        title: &str,
        result: &GeneratedSectionResult,
        inputs: ProvenanceInputs,
    ) -> Result<()> {
        let level = self
            .descriptor(&id)
            .map(|d| d.level)
            .ok_or_else(|| DocforgeError::unknown_section(id))?;

        let mut blocks = vec![BlockNode::heading(level, title)];
        blocks.extend(parse_blocks(&result.content));

        match self.tree.section_mut(&id) {
            Some(node) => {
                node.title = title.to_string();
                node.level = level;
                node.blocks = blocks;
                debug!("section replaced");
            }
            None => {
                self.tree.sections.push(SectionNode {
                    id,
                    title: title.to_string(),
                    level,
                    blocks,
                });
                debug!("section appended");
            }
        }

        let previous = self.provenance.get(&id).map(|p| p.last_modified_at);
        self.provenance.insert(
            id,
            SectionProvenance {
                source_document_ids: inputs.source_document_ids,
                source_sections: inputs.source_sections,
                ai_generated: true,
                manually_edited: false,
                warnings: result.warnings.clone(),
                last_modified_at: next_stamp(previous),
            },
        );

        Ok(())
    }

    /// Replace the whole tree after an external edit.
    ///
    /// Rejects trees with duplicate section ids. Provenance entries are stamped
    /// `manually_edited` according to the draft's [`EditStampPolicy`].
    #[instrument(skip_all, fields(sections = tree.sections.len(), policy = ?self.policy))]
    pub fn replace_whole(&mut self, tree: ContentTree) -> Result<()> {
        ensure_unique_ids(&tree)?;

        let changed: HashSet<SectionId> = match self.policy {
            EditStampPolicy::All => self.provenance.keys().copied().collect(),
            EditStampPolicy::ChangedOnly => self
                .provenance
                .keys()
                .copied()
                .filter(|id| {
                    let before = self.tree.section(id).map(|s| fingerprint(&s.blocks));
                    let after = tree.section(id).map(|s| fingerprint(&s.blocks));
                    before != after
                })
                .collect(),
        };

        for (id, entry) in self.provenance.iter_mut() {
            if changed.contains(id) {
                entry.manually_edited = true;
                entry.last_modified_at = next_stamp(Some(entry.last_modified_at));
            }
        }

        self.tree = tree;
        info!(stamped = changed.len(), "tree replaced");
        Ok(())
    }

    /// Sections in tree order.
    pub fn list_sections(&self) -> Vec<SectionSummary> {
        self.tree
            .sections
            .iter()
            .map(|s| SectionSummary {
                id: s.id,
                title: s.title.clone(),
                has_content: s.has_content(),
                warnings: self
                    .provenance
                    .get(&s.id)
                    .map(|p| p.warnings.clone())
                    .unwrap_or_default(),
            })
            .collect()
    }

    pub fn to_markdown(&self) -> String {
        tree_to_markdown(&self.tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docforge_shared::ValidationConfig;
    use docforge_validator::validate_section;

    fn template(titles: &[(&str, u8)]) -> Vec<SectionDescriptor> {
        titles
            .iter()
            .enumerate()
            .map(|(i, (title, level))| SectionDescriptor {
                id: SectionId::new(),
                level: *level,
                title: (*title).to_string(),
                placeholder: None,
                order: i as u32,
                parent_id: None,
            })
            .collect()
    }

    fn generated(text: &str) -> GeneratedSectionResult {
        validate_section(text, &ValidationConfig::default())
    }

    const INTRO: &str =
        "The introduction sets out the scope of the review and its three questions.";
    const REVISED: &str = "A revised introduction that narrows the scope to two central questions.";

    #[test]
    fn upsert_builds_heading_and_blocks() {
        let t = template(&[("Introduction", 1), ("Scope", 2)]);
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);

        draft
            .upsert_section(
                t[1].id,
                "Scope",
                &generated(INTRO),
                ProvenanceInputs::new(["doc-1"], ["s1"]),
            )
            .expect("upsert");

        let node = draft.section(&t[1].id).expect("section");
        assert_eq!(node.blocks[0], BlockNode::heading(2, "Scope"));
        assert_eq!(node.blocks[1], BlockNode::paragraph(INTRO));

        let provenance = draft.provenance(&t[1].id).expect("provenance");
        assert!(provenance.ai_generated);
        assert!(!provenance.manually_edited);
        assert!(provenance.source_document_ids.contains("doc-1"));
    }

    #[test]
    fn double_upsert_keeps_one_node_with_later_stamp() {
        let t = template(&[("Introduction", 1)]);
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        let id = t[0].id;

        draft
            .upsert_section(id, "Introduction", &generated(INTRO), ProvenanceInputs::default())
            .expect("first");
        let first_stamp = draft.provenance(&id).expect("p").last_modified_at;

        draft
            .upsert_section(id, "Introduction", &generated(REVISED), ProvenanceInputs::default())
            .expect("second");

        assert_eq!(draft.tree().sections.len(), 1);
        assert_eq!(draft.section(&id).expect("s").blocks[1], BlockNode::paragraph(REVISED));
        assert!(draft.provenance(&id).expect("p").last_modified_at > first_stamp);
    }

    #[test]
    fn unknown_section_is_rejected() {
        let t = template(&[("Introduction", 1)]);
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        let err = draft
            .upsert_section(
                SectionId::new(),
                "Stray",
                &generated(INTRO),
                ProvenanceInputs::default(),
            )
            .unwrap_err();
        assert!(matches!(err, DocforgeError::UnknownSection { .. }));
        assert!(draft.tree().sections.is_empty());
    }

    #[test]
    fn insertion_order_is_tree_order() {
        let t = template(&[("A", 1), ("B", 1), ("C", 1)]);
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        for i in [2, 0] {
            draft
                .upsert_section(
                    t[i].id,
                    &t[i].title,
                    &generated(INTRO),
                    ProvenanceInputs::default(),
                )
                .expect("upsert");
        }
        let titles: Vec<_> = draft.list_sections().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, ["C", "A"]);
    }

    #[test]
    fn replace_whole_stamps_every_entry_by_default() {
        let t = template(&[("A", 1), ("B", 1)]);
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        for d in &t {
            draft
                .upsert_section(d.id, &d.title, &generated(INTRO), ProvenanceInputs::default())
                .expect("upsert");
        }

        let before: Vec<_> = t
            .iter()
            .map(|d| draft.provenance(&d.id).expect("p").last_modified_at)
            .collect();

        let mut edited = draft.tree().clone();
        edited.sections[0].blocks[1] = BlockNode::paragraph("Hand-edited text.");
        draft.replace_whole(edited).expect("replace");

        // the untouched section B is stamped too
        for (d, stamp) in t.iter().zip(before) {
            let provenance = draft.provenance(&d.id).expect("p");
            assert!(provenance.manually_edited);
            assert!(provenance.ai_generated);
            assert!(provenance.last_modified_at > stamp);
        }
    }

    #[test]
    fn changed_only_policy_stamps_changed_sections() {
        let t = template(&[("A", 1), ("B", 1)]);
        let mut draft = DraftDocument::new(&t, EditStampPolicy::ChangedOnly);
        for d in &t {
            draft
                .upsert_section(d.id, &d.title, &generated(INTRO), ProvenanceInputs::default())
                .expect("upsert");
        }
        let untouched_stamp = draft.provenance(&t[1].id).expect("p").last_modified_at;

        let mut edited = draft.tree().clone();
        edited.sections[0].blocks.push(BlockNode::paragraph("Added by hand."));
        draft.replace_whole(edited).expect("replace");

        assert!(draft.provenance(&t[0].id).expect("p").manually_edited);
        let untouched = draft.provenance(&t[1].id).expect("p");
        assert!(!untouched.manually_edited);
        assert_eq!(untouched.last_modified_at, untouched_stamp);
    }

    #[test]
    fn replace_whole_rejects_duplicate_ids() {
        let t = template(&[("A", 1)]);
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        let node = SectionNode {
            id: t[0].id,
            title: "A".into(),
            level: 1,
            blocks: vec![],
        };
        let tree = ContentTree {
            sections: vec![node.clone(), node],
        };
        let err = draft.replace_whole(tree).unwrap_err();
        assert!(matches!(err, DocforgeError::Validation { .. }));
    }

    #[test]
    fn list_sections_reports_content_and_warnings() {
        let t = template(&[("A", 1), ("B", 1)]);
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        let hedged = generated(&format!("{INTRO} Hypothetically this holds."));
        draft
            .upsert_section(t[0].id, "A", &hedged, ProvenanceInputs::default())
            .expect("upsert");
        draft
            .upsert_section(t[1].id, "B", &generated(""), ProvenanceInputs::default())
            .expect("upsert");

        let sections = draft.list_sections();
        assert!(sections[0].has_content);
        assert_eq!(sections[0].warnings.len(), 1);
        assert!(!sections[1].has_content);
    }

    #[test]
    fn record_round_trips_through_json() {
        let t = template(&[("A", 1), ("B", 2)]);
        let mut draft = DraftDocument::new(&t, EditStampPolicy::All);
        draft
            .upsert_section(t[0].id, "A", &generated(INTRO), ProvenanceInputs::new(["d"], ["x"]))
            .expect("upsert");

        let json = serde_json::to_string(&draft.to_record()).expect("serialize");
        let record: DraftRecord = serde_json::from_str(&json).expect("deserialize");
        let restored = DraftDocument::from_record(record, EditStampPolicy::All).expect("restore");

        assert_eq!(restored.to_record(), draft.to_record());
        assert_eq!(restored.to_markdown(), format!("# A\n\n{INTRO}"));
    }
}

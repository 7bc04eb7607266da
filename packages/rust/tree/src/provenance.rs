//! Per-section provenance records, kept beside the tree rather than inside it.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use docforge_shared::BlockNode;

/// Where a section's content came from and what happened to it since.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionProvenance {
    #[serde(default)]
    pub source_document_ids: BTreeSet<String>,
    #[serde(default)]
    pub source_sections: BTreeSet<String>,
    pub ai_generated: bool,
    pub manually_edited: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub last_modified_at: DateTime<Utc>,
}

/// Caller-supplied source sets for an upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceInputs {
    pub source_document_ids: BTreeSet<String>,
    pub source_sections: BTreeSet<String>,
}

impl ProvenanceInputs {
    pub fn new(
        documents: impl IntoIterator<Item = impl Into<String>>,
        sections: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            source_document_ids: documents.into_iter().map(Into::into).collect(),
            source_sections: sections.into_iter().map(Into::into).collect(),
        }
    }
}

/// A timestamp strictly after `previous`, normally just `Utc::now()`.
pub(crate) fn next_stamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if prev >= now => prev + Duration::microseconds(1),
        _ => now,
    }
}

/// SHA-256 over the serialized block list.
pub(crate) fn fingerprint(blocks: &[BlockNode]) -> String {
    let mut hasher = Sha256::new();
    // serializing plain owned nodes into a Vec cannot fail
    if let Ok(bytes) = serde_json::to_vec(blocks) {
        hasher.update(&bytes);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_are_strictly_increasing() {
        let future = Utc::now() + Duration::seconds(60);
        let stamp = next_stamp(Some(future));
        assert!(stamp > future);
        assert!(next_stamp(None) <= Utc::now());
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = vec![BlockNode::paragraph("one")];
        let b = vec![BlockNode::paragraph("two")];
        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn provenance_serializes_camel_case() {
        let provenance = SectionProvenance {
            source_document_ids: BTreeSet::from(["doc-1".to_string()]),
            source_sections: BTreeSet::new(),
            ai_generated: true,
            manually_edited: false,
            warnings: vec![],
            last_modified_at: Utc::now(),
        };
        let json = serde_json::to_value(&provenance).expect("serialize");
        assert_eq!(json["sourceDocumentIds"][0], "doc-1");
        assert_eq!(json["aiGenerated"], true);
        assert!(json["lastModifiedAt"].is_string());
    }
}

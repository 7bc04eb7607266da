//! Parent assignment and outline nesting for section descriptors.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use docforge_shared::{SectionDescriptor, SectionId};

/// Link every descriptor to the nearest preceding descriptor of strictly lower level.
///
/// Single left-to-right pass over a stack of `(level, id)`: entries at or below the
/// current depth are popped, whatever remains on top is the parent.
pub fn assign_parents(descriptors: &mut [SectionDescriptor]) {
    let mut stack: Vec<(u8, SectionId)> = Vec::with_capacity(8);

    for descriptor in descriptors.iter_mut() {
        while stack
            .last()
            .is_some_and(|(level, _)| *level >= descriptor.level)
        {
            stack.pop();
        }
        descriptor.parent_id = stack.last().map(|(_, id)| *id);
        stack.push((descriptor.level, descriptor.id));
    }
}

/// A descriptor with its nested children, for display.
#[derive(Debug, Clone, Serialize)]
pub struct OutlineNode {
    #[serde(flatten)]
    pub descriptor: SectionDescriptor,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutlineNode>,
}

/// Nest descriptors by `parent_id`. Order within each level follows `order`.
///
/// Descriptors whose parent is absent from the slice become roots.
pub fn outline(descriptors: &[SectionDescriptor]) -> Vec<OutlineNode> {
    let mut sorted: Vec<&SectionDescriptor> = descriptors.iter().collect();
    sorted.sort_by_key(|d| d.order);

    let known: HashSet<SectionId> = sorted.iter().map(|d| d.id).collect();
    let mut children: HashMap<SectionId, Vec<&SectionDescriptor>> = HashMap::new();
    let mut roots = Vec::new();

    for d in sorted {
        match d.parent_id.filter(|p| known.contains(p)) {
            Some(parent) => children.entry(parent).or_default().push(d),
            None => roots.push(d),
        }
    }

    fn build(
        d: &SectionDescriptor,
        children: &HashMap<SectionId, Vec<&SectionDescriptor>>,
    ) -> OutlineNode {
        OutlineNode {
            descriptor: d.clone(),
            children: children
                .get(&d.id)
                .map(|kids| kids.iter().map(|k| build(k, children)).collect())
                .unwrap_or_default(),
        }
    }

    roots.into_iter().map(|d| build(d, &children)).collect()
}

/// Render an outline as indented lines, two spaces per depth.
pub fn outline_text(nodes: &[OutlineNode]) -> String {
    let mut out = String::new();
    let mut stack: Vec<(&OutlineNode, usize)> = nodes.iter().rev().map(|n| (n, 0)).collect();

    while let Some((node, depth)) = stack.pop() {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&node.descriptor.title);
        if let Some(p) = &node.descriptor.placeholder {
            out.push_str(&format!("  [{p}]"));
        }
        out.push('\n');
        stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
    }

    out
}

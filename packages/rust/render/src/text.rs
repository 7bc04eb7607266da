//! Block nodes → markdown-like text.

use docforge_shared::{BlockNode, ContentTree, RunNode};

/// Re-wrap runs with their emphasis markers.
pub fn runs_to_markdown(runs: &[RunNode]) -> String {
    runs.iter()
        .map(|run| match (run.is_bold(), run.is_italic()) {
            (true, true) => format!("***{}***", run.text),
            (true, false) => format!("**{}**", run.text),
            (false, true) => format!("*{}*", run.text),
            (false, false) => run.text.clone(),
        })
        .collect()
}

fn table_row(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

fn block_to_markdown(block: &BlockNode) -> String {
    match block {
        BlockNode::Heading { level, runs } => {
            format!("{} {}", "#".repeat(usize::from(*level).clamp(1, 6)), runs_to_markdown(runs))
        }
        BlockNode::Paragraph { runs } => runs_to_markdown(runs),
        BlockNode::BulletList { items } => items
            .iter()
            .map(|item| format!("- {}", runs_to_markdown(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        BlockNode::OrderedList { items } => items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {}", i + 1, runs_to_markdown(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        BlockNode::Table { headers, rows } => {
            let separator = vec!["---".to_string(); headers.len().max(1)];
            std::iter::once(table_row(headers))
                .chain(std::iter::once(table_row(&separator)))
                .chain(rows.iter().map(|r| table_row(r)))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

/// Serialize blocks, separated by blank lines.
pub fn blocks_to_markdown(blocks: &[BlockNode]) -> String {
    blocks
        .iter()
        .map(block_to_markdown)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Serialize every section of a tree in tree order.
pub fn tree_to_markdown(tree: &ContentTree) -> String {
    tree.sections
        .iter()
        .filter(|s| !s.blocks.is_empty())
        .map(|s| blocks_to_markdown(&s.blocks))
        .collect::<Vec<_>>()
        .join("\n\n")
}

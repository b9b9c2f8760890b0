//! Plain text and JSON rendering of the cached tree.

use super::cache::{CoverageCache, NodeKind, NodeSummary};
use super::orchestrator::CollectionReport;
use serde::Serialize;
use std::fmt::Write;

const NAME_WIDTH: usize = 48;

/// One line of a report: a node and how deep it sits below the root
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub depth: usize,
    pub name: String,
    #[serde(flatten)]
    pub summary: NodeSummary,
}

impl ReportRow {
    /// Row for a node shown on its own, labeled with its full path
    pub fn standalone(summary: NodeSummary) -> Self {
        Self {
            depth: 0,
            name: summary.path.display().to_string(),
            summary,
        }
    }
}

/// Every node, parents before children, the root labeled with its full path
pub fn tree_rows(cache: &CoverageCache) -> Vec<ReportRow> {
    cache
        .walk()
        .into_iter()
        .map(|(depth, node)| {
            let mut name = if depth == 0 {
                node.path().display().to_string()
            } else {
                node.name()
            };
            if node.is_folder() {
                name.push('/');
            }
            ReportRow {
                depth,
                name,
                summary: node.summary(),
            }
        })
        .collect()
}

pub fn render_text(rows: &[ReportRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$} {:>7} {:>7} {:>6}  Missing",
        "Name",
        "Stmts",
        "Exec",
        "Cover",
        width = NAME_WIDTH
    );

    for row in rows {
        let label = format!("{}{}", "  ".repeat(row.depth), row.name);
        let summary = &row.summary;

        if let Some(error) = &summary.error {
            let _ = writeln!(
                out,
                "{:<width$} error: {}",
                label,
                error.trim_end(),
                width = NAME_WIDTH
            );
            continue;
        }

        let stats = summary.stats();
        let missing = match summary.kind {
            NodeKind::File => summary.missed_lines.as_str(),
            NodeKind::Folder => "",
        };
        let line = format!(
            "{:<width$} {:>7} {:>7} {:>5.0}%  {}",
            label,
            stats.statements,
            stats.executed(),
            stats.percent_covered(),
            missing,
            width = NAME_WIDTH
        );
        let _ = writeln!(out, "{}", line.trim_end());
    }

    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    collection: Option<&'a CollectionReport>,
    nodes: &'a [ReportRow],
}

pub fn render_json(
    rows: &[ReportRow],
    collection: Option<&CollectionReport>,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        collection,
        nodes: rows,
    })
}

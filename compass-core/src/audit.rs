//! Consistency audit over the whole snapshot sequence.
//!
//! The engine does not judge narrative plausibility itself. It renders every
//! stored snapshot as compact text, hands that to the generator, and records
//! whatever inconsistencies come back (a dead character who reappears, an
//! alliance that flips without cause, and so on).

use crate::generator::{GenerationRequest, Generator, GeneratorError};
use crate::graph::{GraphData, SnapshotStore};
use crate::normalize;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Sent in place of a missing chapter outline.
const NO_OUTLINE: &str = "(no outline)";

/// Errors from running an audit.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("graph has not been generated yet")]
    GraphNotGenerated,

    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),
}

/// How serious an inconsistency is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A contradiction in the story.
    Error,
    /// Likely a problem, worth a look.
    #[default]
    Warning,
    /// Informational only.
    Info,
}

impl Severity {
    /// Get the display name for this severity.
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Info => "Info",
        }
    }
}

/// One flagged problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inconsistency {
    /// Short machine-readable kind, e.g. `dead_reappear`.
    #[serde(rename = "type", default, deserialize_with = "crate::graph::null_as_default")]
    pub kind: String,

    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub severity: Severity,

    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub node_ids: Vec<String>,

    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub edge_ids: Vec<String>,

    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub chapters: Vec<u32>,

    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub message: String,
}

/// Result of the most recent audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditState {
    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub inconsistencies: Vec<Inconsistency>,

    #[serde(default)]
    pub last_audit_at: Option<DateTime<Utc>>,
}

impl AuditState {
    /// Count inconsistencies of a given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.inconsistencies
            .iter()
            .filter(|i| i.severity == severity)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.inconsistencies.is_empty()
    }
}

/// Render every snapshot, ascending, in the compact form sent to the generator.
///
/// ```text
/// --- Chapter 0 snapshot ---
/// Nodes: Ada(active), Bram(deceased)
/// Relations: A-[alliance]-B
/// ```
///
/// Blocks are separated by a blank line.
pub fn describe_snapshots(store: &SnapshotStore) -> String {
    store
        .iter()
        .map(|(chapter, snapshot)| {
            let nodes = snapshot
                .nodes
                .iter()
                .map(|n| format!("{}({})", n.label, n.status.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            let relations = snapshot
                .edges
                .iter()
                .map(|e| format!("{}-[{}]-{}", e.source, e.relation_type.as_str(), e.target))
                .collect::<Vec<_>>()
                .join(", ");
            format!("--- Chapter {chapter} snapshot ---\nNodes: {nodes}\nRelations: {relations}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Read the `inconsistencies` list from a generator response.
///
/// Items are decoded one at a time and any item that does not fit is dropped.
fn read_inconsistencies(response: &str) -> Vec<Inconsistency> {
    let value = match normalize::extract_json(response) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Audit response could not be parsed, recording no findings: {e}");
            return Vec::new();
        }
    };

    let items = match value.get("inconsistencies") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Vec::new(),
        Some(other) => {
            tracing::warn!("Audit inconsistencies is not a list: {other}");
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| match Inconsistency::deserialize(item) {
            Ok(inconsistency) => Some(inconsistency),
            Err(e) => {
                tracing::warn!("Dropping unreadable audit finding {item}: {e}");
                None
            }
        })
        .collect()
}

/// Audit the snapshot sequence and record the result in `data.audit`.
///
/// Only `data.audit` is written. A response that cannot be read as an
/// inconsistency list is recorded as a clean audit. Individual findings that
/// cannot be read are dropped and the rest are kept.
pub async fn run_audit<G: Generator + ?Sized>(
    generator: &G,
    data: &mut GraphData,
    chapter_outline: Option<&str>,
) -> Result<AuditState, AuditError> {
    if !data.graph_generated {
        return Err(AuditError::GraphNotGenerated);
    }

    let snapshots_text = describe_snapshots(&data.snapshots);
    let outline = chapter_outline
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(NO_OUTLINE);
    let request = GenerationRequest::Audit {
        chapter_outline: Some(outline),
        snapshots_text: &snapshots_text,
    };

    let response = generator.generate(&request).await?;

    let inconsistencies = read_inconsistencies(&response);

    tracing::info!(
        count = inconsistencies.len(),
        snapshots = data.snapshots.len(),
        "Audit complete"
    );

    let state = AuditState {
        inconsistencies,
        last_audit_at: Some(Utc::now()),
    };
    data.audit = state.clone();
    Ok(state)
}

//! Building and extending the snapshot sequence.
//!
//! [`GraphBuilder`] drives the generator for the three graph-producing
//! operations:
//!
//! - [`baseline`](GraphBuilder::baseline) builds chapter 0 from the setting documents;
//! - [`advance`](GraphBuilder::advance) derives one snapshot per new chapter from the
//!   nearest earlier snapshot and a generated delta;
//! - [`chapter_graph`](GraphBuilder::chapter_graph) extracts a standalone graph from a
//!   single chapter, outside the versioned sequence.

use crate::generator::{GenerationRequest, Generator};
use crate::graph::{apply, Delta, Edge, GraphData, Node, Snapshot};
use crate::normalize;
use crate::project::NarrativeMaterial;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from building graphs.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("baseline graph could not be generated: {0}")]
    BaselineUnavailable(String),

    #[error("no baseline snapshot; generate the baseline first")]
    MissingBaseline,

    #[error("chapter graph could not be generated: {0}")]
    ChapterGraphUnavailable(String),
}

/// A progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub message: String,
    /// 1-based step within `total`.
    pub step: usize,
    pub total: usize,
}

impl Progress {
    fn new(message: impl Into<String>, step: usize, total: usize) -> Self {
        Self {
            message: message.into(),
            step,
            total,
        }
    }
}

/// What happened to one pending chapter during [`GraphBuilder::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterOutcome {
    /// A new snapshot was stored for the chapter.
    Stored { nodes: usize, edges: usize },
    /// The generator reported no changes; nothing was stored.
    Unchanged,
    /// The response could not be read as a delta.
    Malformed(String),
    /// The generator call failed.
    Failed(String),
    /// No snapshot exists at or before the previous chapter.
    NoReference,
}

impl ChapterOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, ChapterOutcome::Stored { .. })
    }

    /// Whether the chapter should be retried on a later run.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ChapterOutcome::Malformed(_) | ChapterOutcome::Failed(_)
        )
    }
}

/// Per-chapter results of one [`GraphBuilder::advance`] call, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<(u32, ChapterOutcome)>,
}

impl BatchReport {
    /// Chapters that got a new snapshot.
    pub fn stored(&self) -> Vec<u32> {
        self.chapters_where(ChapterOutcome::is_stored)
    }

    /// Chapters whose generation or parsing failed.
    pub fn errors(&self) -> Vec<u32> {
        self.chapters_where(ChapterOutcome::is_error)
    }

    pub fn outcome(&self, chapter: u32) -> Option<&ChapterOutcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == chapter)
            .map(|(_, outcome)| outcome)
    }

    /// True when no chapter was pending.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn chapters_where(&self, predicate: impl Fn(&ChapterOutcome) -> bool) -> Vec<u32> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| predicate(outcome))
            .map(|(chapter, _)| *chapter)
            .collect()
    }
}

/// Shape of a full-graph response.
#[derive(Debug, Deserialize)]
struct GraphPayload {
    nodes: Vec<Node>,
    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    edges: Vec<Edge>,
}

impl GraphPayload {
    fn into_snapshot(self) -> Snapshot {
        Snapshot::from_parts(self.nodes, self.edges)
    }
}

type ProgressFn<'g> = Box<dyn Fn(&Progress) + Send + Sync + 'g>;

/// Builds graphs through a [`Generator`].
pub struct GraphBuilder<'g, G: Generator + ?Sized> {
    generator: &'g G,
    progress: Option<ProgressFn<'g>>,
}

impl<'g, G: Generator + ?Sized> GraphBuilder<'g, G> {
    pub fn new(generator: &'g G) -> Self {
        Self {
            generator,
            progress: None,
        }
    }

    /// Receive a [`Progress`] for every step.
    pub fn with_progress(mut self, progress: impl Fn(&Progress) + Send + Sync + 'g) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    fn report(&self, message: impl Into<String>, step: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(&Progress::new(message, step, total));
        }
    }

    /// Build the chapter 0 graph.
    ///
    /// Returns a fresh [`GraphData`] holding only the baseline. Nothing is
    /// returned on failure, so a caller's existing data stays as it was.
    pub async fn baseline(&self, material: &NarrativeMaterial) -> Result<GraphData, BuildError> {
        self.report("Analysing the setting and extracting entities", 1, 3);

        let response = self
            .generator
            .generate(&GenerationRequest::Baseline(material))
            .await
            .map_err(|e| BuildError::BaselineUnavailable(e.to_string()))?;

        let payload: GraphPayload = normalize::parse_typed(&response)
            .map_err(|e| BuildError::BaselineUnavailable(e.to_string()))?;
        let snapshot = payload.into_snapshot();

        tracing::info!(
            nodes = snapshot.node_count(),
            edges = snapshot.edge_count(),
            "Baseline graph generated"
        );
        self.report("Baseline graph complete", 3, 3);

        Ok(GraphData::from_baseline(snapshot))
    }

    /// Derive snapshots for every chapter that has text but no snapshot yet.
    ///
    /// Chapters are processed in ascending order, each from the nearest
    /// snapshot at or before the previous chapter, so a chapter stored earlier
    /// in the batch is the reference for the next. A failing chapter is
    /// logged and recorded in the report; the rest of the batch continues.
    pub async fn advance(
        &self,
        data: &mut GraphData,
        chapters: &BTreeMap<u32, String>,
    ) -> Result<BatchReport, BuildError> {
        if !data.has_baseline() {
            return Err(BuildError::MissingBaseline);
        }

        let pending: Vec<(u32, &str)> = chapters
            .iter()
            .filter(|(chapter, text)| !text.trim().is_empty() && !data.snapshots.contains(**chapter))
            .map(|(chapter, text)| (*chapter, text.as_str()))
            .collect();

        let mut report = BatchReport::default();
        if pending.is_empty() {
            return Ok(report);
        }

        let total = pending.len();
        for (i, (chapter, text)) in pending.into_iter().enumerate() {
            self.report(format!("Analysing changes in chapter {chapter}"), i + 1, total);

            let next = match data.snapshot_for_chapter(i64::from(chapter) - 1) {
                Some(reference) => self.derive(chapter, text, reference).await,
                None => Err(ChapterOutcome::NoReference),
            };

            let outcome = match next {
                Ok(snapshot) => {
                    let (nodes, edges) = (snapshot.node_count(), snapshot.edge_count());
                    match data.store_snapshot(chapter, snapshot) {
                        Ok(()) => {
                            tracing::info!(chapter, nodes, edges, "Stored chapter snapshot");
                            ChapterOutcome::Stored { nodes, edges }
                        }
                        Err(e) => ChapterOutcome::Failed(e.to_string()),
                    }
                }
                Err(outcome) => outcome,
            };
            report.outcomes.push((chapter, outcome));
        }

        data.touch();
        Ok(report)
    }

    /// Generate, read and apply the delta for one chapter.
    async fn derive(
        &self,
        chapter: u32,
        chapter_text: &str,
        reference: &Snapshot,
    ) -> Result<Snapshot, ChapterOutcome> {
        let request = GenerationRequest::ChapterDelta {
            chapter,
            chapter_text,
            reference,
        };

        let response = self.generator.generate(&request).await.map_err(|e| {
            tracing::warn!(chapter, "Chapter graph analysis failed: {e}");
            ChapterOutcome::Failed(e.to_string())
        })?;

        let delta: Delta = normalize::parse_typed(&response).map_err(|e| {
            tracing::warn!(chapter, "Chapter delta could not be read: {e}");
            ChapterOutcome::Malformed(e.to_string())
        })?;

        if delta.is_empty() {
            tracing::info!(chapter, "No graph changes in chapter");
            return Err(ChapterOutcome::Unchanged);
        }

        tracing::debug!(chapter, operations = delta.operation_count(), "Applying delta");
        Ok(apply(reference, &delta))
    }

    /// Extract a standalone graph from one chapter's text.
    ///
    /// The result is not part of the snapshot sequence; callers keep it in
    /// [`NovelProject::chapter_graphs`](crate::project::NovelProject::chapter_graphs).
    pub async fn chapter_graph(
        &self,
        chapter: u32,
        chapter_text: &str,
        character_state: Option<&str>,
    ) -> Result<Snapshot, BuildError> {
        self.report("Extracting character relations for this chapter", 1, 1);

        let request = GenerationRequest::ChapterGraph {
            chapter,
            chapter_text,
            character_state,
        };
        let response = self
            .generator
            .generate(&request)
            .await
            .map_err(|e| BuildError::ChapterGraphUnavailable(e.to_string()))?;

        let payload: GraphPayload = normalize::parse_typed(&response)
            .map_err(|e| BuildError::ChapterGraphUnavailable(e.to_string()))?;

        Ok(payload.into_snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::RequestKind;
    use crate::graph::NodeStatus;
    use crate::testing::MockGenerator;
    use std::sync::Mutex;

    const BASELINE: &str = r#"{"nodes":[{"id":"A","label":"Ada"},{"id":"B","label":"Bram"}],"edges":[{"source":"A","target":"B","relationType":"alliance"}]}"#;

    fn chapters(entries: &[(u32, &str)]) -> BTreeMap<u32, String> {
        entries
            .iter()
            .map(|(chapter, text)| (*chapter, text.to_string()))
            .collect()
    }

    async fn baseline_data() -> GraphData {
        let generator = MockGenerator::new();
        generator.push_text(BASELINE);
        let data = GraphBuilder::new(&generator)
            .baseline(&NarrativeMaterial::default())
            .await
            .unwrap();
        data
    }

    #[tokio::test]
    async fn test_baseline_assigns_edge_ids() {
        let data = baseline_data().await;
        let baseline = data.baseline().unwrap();

        assert!(data.graph_generated);
        assert_eq!(baseline.node_count(), 2);
        assert_eq!(baseline.edges[0].id, "edge_A_B_0");
        assert_eq!(baseline.node("A").unwrap().first_appearance, 0);
    }

    #[tokio::test]
    async fn test_baseline_without_nodes_fails() {
        let generator = MockGenerator::new();
        generator.push_text(r#"{"edges":[]}"#);

        let result = GraphBuilder::new(&generator)
            .baseline(&NarrativeMaterial::default())
            .await;
        assert!(matches!(result, Err(BuildError::BaselineUnavailable(_))));
    }

    #[tokio::test]
    async fn test_baseline_generator_failure() {
        let generator = MockGenerator::new();
        generator.push_failure("connection refused");

        let result = GraphBuilder::new(&generator)
            .baseline(&NarrativeMaterial::default())
            .await;
        assert!(
            matches!(result, Err(BuildError::BaselineUnavailable(m)) if m.contains("connection refused"))
        );
    }

    #[tokio::test]
    async fn test_advance_requires_baseline() {
        let generator = MockGenerator::new();
        let mut data = GraphData::new();

        let result = GraphBuilder::new(&generator)
            .advance(&mut data, &chapters(&[(1, "text")]))
            .await;
        assert!(matches!(result, Err(BuildError::MissingBaseline)));
    }

    #[tokio::test]
    async fn test_advance_chains_references_within_batch() {
        let mut data = baseline_data().await;
        let generator = MockGenerator::new();
        generator.push_text(r#"{"newNodes":[{"id":"C","label":"Cato"}]}"#);
        generator.push_text(r#"{"updatedNodes":[{"id":"C","changes":{"status":"deceased"}}]}"#);

        let report = GraphBuilder::new(&generator)
            .advance(&mut data, &chapters(&[(1, "Cato arrives."), (2, "Cato falls.")]))
            .await
            .unwrap();

        assert_eq!(report.stored(), vec![1, 2]);
        let second = data.snapshots.get(2).unwrap();
        assert_eq!(second.node("C").unwrap().status, NodeStatus::Deceased);

        // Chapter 2 was derived from the chapter 1 snapshot stored in the same batch
        let requests = generator.requests();
        assert!(requests[1].prompt.contains(r#"{"id":"C","label":"Cato"}"#));
    }

    #[tokio::test]
    async fn test_empty_delta_is_not_stored() {
        let mut data = baseline_data().await;
        let generator = MockGenerator::new();
        generator.push_text(
            r#"{"newNodes":[],"updatedNodes":[],"removedNodeIds":[],"newEdges":[],"updatedEdges":[],"removedEdgeIds":[]}"#,
        );

        let report = GraphBuilder::new(&generator)
            .advance(&mut data, &chapters(&[(1, "Nothing happens.")]))
            .await
            .unwrap();

        assert_eq!(report.outcome(1), Some(&ChapterOutcome::Unchanged));
        assert!(!data.snapshots.contains(1));
        assert!(report.errors().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_delta_distinguished_from_empty() {
        let mut data = baseline_data().await;
        let generator = MockGenerator::new();
        generator.push_text("Sorry, I cannot help with that.");
        generator.push_text(r#"{"newNodes":[{"id":"X","type":"deity"}]}"#);

        let report = GraphBuilder::new(&generator)
            .advance(&mut data, &chapters(&[(1, "one"), (2, "two")]))
            .await
            .unwrap();

        assert!(matches!(report.outcome(1), Some(ChapterOutcome::Malformed(_))));
        assert!(matches!(report.outcome(2), Some(ChapterOutcome::Malformed(_))));
        assert_eq!(report.errors(), vec![1, 2]);
        assert_eq!(data.snapshots.len(), 1);
    }

    #[tokio::test]
    async fn test_null_importance_and_strength_are_stored() {
        let mut data = baseline_data().await;
        let generator = MockGenerator::new();
        generator.push_text(
            r#"{"newNodes":[{"id":"C","label":"Cato","importance":null}],"newEdges":[{"source":"A","target":"C","strength":null}]}"#,
        );

        let report = GraphBuilder::new(&generator)
            .advance(&mut data, &chapters(&[(1, "Cato arrives.")]))
            .await
            .unwrap();

        assert_eq!(report.stored(), vec![1]);
        let snapshot = data.snapshots.get(1).unwrap();
        assert_eq!(snapshot.node("C").unwrap().importance, 5);
        assert_eq!(snapshot.edges.last().unwrap().strength, 3);
    }

    #[tokio::test]
    async fn test_skips_stored_and_blank_chapters() {
        let mut data = baseline_data().await;
        data.store_snapshot(1, Snapshot::new()).unwrap();
        let generator = MockGenerator::new();
        generator.push_text(r#"{"removedNodeIds":["A"]}"#);

        let report = GraphBuilder::new(&generator)
            .advance(&mut data, &chapters(&[(1, "one"), (2, "   "), (3, "three")]))
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.stored(), vec![3]);
        assert_eq!(generator.requests()[0].chapter, Some(3));
    }

    #[tokio::test]
    async fn test_nothing_pending_leaves_timestamp() {
        let mut data = baseline_data().await;
        let before = data.generated_at;
        let generator = MockGenerator::new();

        let report = GraphBuilder::new(&generator)
            .advance(&mut data, &BTreeMap::new())
            .await
            .unwrap();

        assert!(report.is_empty());
        assert_eq!(data.generated_at, before);
    }

    #[tokio::test]
    async fn test_progress_reports_each_chapter() {
        let mut data = baseline_data().await;
        let generator = MockGenerator::new();
        generator.push_text(r#"{"removedEdgeIds":["edge_A_B_0"]}"#);
        generator.push_failure("timeout");

        let seen = Mutex::new(Vec::new());
        GraphBuilder::new(&generator)
            .with_progress(|p| seen.lock().unwrap().push((p.step, p.total)))
            .advance(&mut data, &chapters(&[(4, "four"), (9, "nine")]))
            .await
            .unwrap();

        assert_eq!(seen.into_inner().unwrap(), vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_chapter_graph() {
        let generator = MockGenerator::new();
        generator.push_text(
            r#"Here is the graph: {"nodes":[{"id":"char_lin","label":"Lin"}],"edges":[{"source":"char_lin","target":"char_oru","relationType":"hostile","strength":8}]}"#,
        );

        let snapshot = GraphBuilder::new(&generator)
            .chapter_graph(5, "Oru ambushes Lin.", None)
            .await
            .unwrap();

        assert_eq!(snapshot.edges[0].id, "edge_char_lin_char_oru_0");
        assert_eq!(snapshot.edges[0].strength, 8);
        assert_eq!(generator.requests()[0].kind, RequestKind::ChapterGraph);
    }

    #[tokio::test]
    async fn test_chapter_graph_without_nodes() {
        let generator = MockGenerator::new();
        generator.push_text(r#"{"relations":[]}"#);

        let result = GraphBuilder::new(&generator)
            .chapter_graph(5, "text", Some("state"))
            .await;
        assert!(matches!(result, Err(BuildError::ChapterGraphUnavailable(_))));
    }
}

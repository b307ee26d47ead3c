//! Prompt templates for the four generation requests.
//!
//! Every template asks for bare JSON and shows the exact shape expected back.
//! Inputs are cut to a fixed number of characters so one long chapter cannot
//! blow the context window.

use crate::generator::GenerationRequest;
use crate::graph::{RelationType, Snapshot};
use crate::project::NarrativeMaterial;
use serde_json::json;

const BASELINE_CHARACTERS_LIMIT: usize = 2000;
const BASELINE_STATE_LIMIT: usize = 1000;
const BASELINE_WORLD_LIMIT: usize = 1000;
const BASELINE_PLOT_LIMIT: usize = 1000;

const DELTA_TEXT_LIMIT: usize = 2000;

const AUDIT_OUTLINE_LIMIT: usize = 500;
const AUDIT_SNAPSHOTS_LIMIT: usize = 1000;

const CHAPTER_GRAPH_TEXT_LIMIT: usize = 2000;
const CHAPTER_GRAPH_STATE_LIMIT: usize = 500;

/// Placeholder for a missing or blank input.
const MISSING: &str = "none";

/// First `max` characters of `text`, or `none` if it is blank.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    if text.trim().is_empty() {
        return MISSING;
    }
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn optional(text: Option<&str>, max: usize) -> &str {
    truncate_chars(text.unwrap_or_default(), max)
}

fn relation_types() -> String {
    RelationType::ALL
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

/// Render the prompt text for a request.
pub fn render(request: &GenerationRequest<'_>) -> String {
    match request {
        GenerationRequest::Baseline(material) => baseline(material),
        GenerationRequest::ChapterDelta {
            chapter,
            chapter_text,
            reference,
        } => chapter_delta(*chapter, chapter_text, reference),
        GenerationRequest::Audit {
            chapter_outline,
            snapshots_text,
        } => audit(*chapter_outline, snapshots_text),
        GenerationRequest::ChapterGraph {
            chapter,
            chapter_text,
            character_state,
        } => chapter_graph(*chapter, chapter_text, *character_state),
    }
}

fn baseline(material: &NarrativeMaterial) -> String {
    let characters = truncate_chars(&material.character_dynamics, BASELINE_CHARACTERS_LIMIT);
    let state = truncate_chars(&material.character_state, BASELINE_STATE_LIMIT);
    let world = truncate_chars(&material.world_building, BASELINE_WORLD_LIMIT);
    let plot = truncate_chars(&material.plot_architecture, BASELINE_PLOT_LIMIT);
    let relations = relation_types();

    format!(
        r#"You are a JSON generator. Extract the characters, factions, locations and items of this novel and the relations between them. Output JSON directly, with no other text.

Characters: {characters}
Character state: {state}
World: {world}
Plot: {plot}

Example output:
{{"nodes":[{{"id":"char_lin","label":"Lin","type":"character","importance":8,"faction":null,"status":"active","bio":"Protagonist, a salt courier","traits":["stubborn"],"firstAppearance":0}}],"edges":[{{"id":"edge_lin_oru","source":"char_lin","target":"char_oru","relationType":"alliance","label":"friends","strength":7,"description":"Grew up together","events":[]}}]}}

Node types: character/faction/location/item. Status: active/deceased/offline.
Relation types: {relations}
importance and strength range from 1 to 10. Output JSON only."#
    )
}

fn chapter_delta(chapter: u32, chapter_text: &str, reference: &Snapshot) -> String {
    let nodes = json!(reference
        .nodes
        .iter()
        .map(|n| json!({"id": n.id, "label": n.label}))
        .collect::<Vec<_>>());
    let edges = json!(reference
        .edges
        .iter()
        .map(|e| json!({"id": e.id, "source": e.source, "target": e.target}))
        .collect::<Vec<_>>());
    let text = truncate_chars(chapter_text, DELTA_TEXT_LIMIT);
    let relations = relation_types();

    format!(
        r#"You are a JSON generator. Describe how the relationship graph changes in this chapter, as a JSON delta.

Current nodes: {nodes}
Current relations: {edges}

Chapter {chapter}: {text}

Output format:
{{"newNodes":[],"updatedNodes":[{{"id":"char_lin","changes":{{"status":"deceased"}}}}],"removedNodeIds":[],"newEdges":[],"updatedEdges":[{{"id":"edge_lin_oru","changes":{{"strength":9,"events":["what happened"]}}}}],"removedEdgeIds":[]}}

Relation types: {relations}
Leave every list empty if nothing changed. Output JSON only, no other text."#
    )
}

fn audit(chapter_outline: Option<&str>, snapshots_text: &str) -> String {
    let outline = optional(chapter_outline, AUDIT_OUTLINE_LIMIT);
    let snapshots = truncate_chars(snapshots_text, AUDIT_SNAPSHOTS_LIMIT);

    format!(
        r#"You are a JSON generator. Check the graph snapshots for logical problems, such as a deceased character reappearing, and output JSON.

Chapter outline: {outline}
Graph snapshots: {snapshots}

Output format:
{{"inconsistencies":[{{"type":"dead_reappear","severity":"error","nodeIds":[],"edgeIds":[],"chapters":[],"message":"description"}}]}}

severity: error/warning/info. Output JSON only."#
    )
}

fn chapter_graph(chapter: u32, chapter_text: &str, character_state: Option<&str>) -> String {
    let text = truncate_chars(chapter_text, CHAPTER_GRAPH_TEXT_LIMIT);
    let state = optional(character_state, CHAPTER_GRAPH_STATE_LIMIT);
    let relations = relation_types();

    format!(
        r#"You are a JSON generator. Extract the character relations in this chapter.

Chapter {chapter}: {text}
Character state: {state}

Output format:
{{"nodes":[{{"id":"char_xxx","label":"name","type":"character","importance":5,"faction":null,"status":"active","bio":"short bio"}}],"edges":[{{"source":"char_a","target":"char_b","relationType":"alliance","label":"relation","strength":5}}]}}

Relation types: {relations}. Output JSON only."#
    )
}

//! Typed relations between nodes.

use serde::{Deserialize, Deserializer, Serialize};

/// Types of relationships between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Hostile,
    Romantic,
    Alliance,
    #[default]
    Neutral,
    Family,
    Mentor,
}

impl RelationType {
    /// All variants in prompt order.
    pub const ALL: [RelationType; 6] = [
        RelationType::Hostile,
        RelationType::Romantic,
        RelationType::Alliance,
        RelationType::Neutral,
        RelationType::Family,
        RelationType::Mentor,
    ];

    /// Wire name, as used in prompts and audit descriptions.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Hostile => "hostile",
            RelationType::Romantic => "romantic",
            RelationType::Alliance => "alliance",
            RelationType::Neutral => "neutral",
            RelationType::Family => "family",
            RelationType::Mentor => "mentor",
        }
    }
}

fn default_strength() -> u8 {
    3
}

fn strength_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    Ok(Option::<u8>::deserialize(deserializer)?.unwrap_or_else(default_strength))
}

/// Deterministic id for an edge that arrived without one.
pub fn default_edge_id(source: &str, target: &str, index: usize) -> String {
    format!("edge_{source}_{target}_{index}")
}

/// A relation between two nodes.
///
/// `source` and `target` are node ids but are not checked against the snapshot
/// the edge lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique identifier within a snapshot. Empty until assigned.
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub id: String,

    pub source: String,

    pub target: String,

    #[serde(default, deserialize_with = "super::null_as_default")]
    pub relation_type: RelationType,

    #[serde(default, deserialize_with = "super::null_as_default")]
    pub label: String,

    /// Strength from 1 to 10.
    #[serde(default = "default_strength", deserialize_with = "strength_or_default")]
    pub strength: u8,

    #[serde(default, deserialize_with = "super::null_as_default")]
    pub description: String,

    /// Story beats for this relation, oldest first. Only ever appended to.
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub events: Vec<String>,
}

impl Edge {
    /// Create a new edge with default strength and no events.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        relation_type: RelationType,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            relation_type,
            label: String::new(),
            strength: default_strength(),
            description: String::new(),
            events: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_strength(mut self, strength: u8) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    /// Assign `edge_{source}_{target}_{index}` if the id is empty.
    pub fn ensure_id(&mut self, index: usize) {
        if self.id.trim().is_empty() {
            self.id = default_edge_id(&self.source, &self.target, index);
        }
    }

    /// Whether the edge touches the given node.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    /// Shallow-merge a patch onto this edge; `events` are appended, never replaced.
    pub fn apply_changes(&mut self, changes: &EdgeChanges) {
        if let Some(source) = &changes.source {
            self.source = source.clone();
        }
        if let Some(target) = &changes.target {
            self.target = target.clone();
        }
        if let Some(relation_type) = changes.relation_type {
            self.relation_type = relation_type;
        }
        if let Some(label) = &changes.label {
            self.label = label.clone();
        }
        if let Some(strength) = changes.strength {
            self.strength = strength;
        }
        if let Some(description) = &changes.description {
            self.description = description.clone();
        }
        if let Some(events) = &changes.events {
            self.events.extend(events.iter().cloned());
        }
    }
}

/// Partial update for an [`Edge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<RelationType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Appended to the existing events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<String>>,
}

impl EdgeChanges {
    pub fn events<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            events: Some(events.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }
}

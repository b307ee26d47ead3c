//! Graph nodes: characters, factions, locations and items.

use serde::{Deserialize, Deserializer, Serialize};

/// Kind of entity a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    Character,
    Faction,
    Location,
    Item,
}

impl NodeType {
    /// Get the display name for this node type.
    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Character => "Character",
            NodeType::Faction => "Faction",
            NodeType::Location => "Location",
            NodeType::Item => "Item",
        }
    }
}

/// Whether a node is still part of the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Active,
    Deceased,
    Offline,
}

impl NodeStatus {
    /// Wire name, as used in prompts and audit descriptions.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Active => "active",
            NodeStatus::Deceased => "deceased",
            NodeStatus::Offline => "offline",
        }
    }
}

fn default_importance() -> u8 {
    5
}

fn importance_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    Ok(Option::<u8>::deserialize(deserializer)?.unwrap_or_else(default_importance))
}

/// An entity in the relationship graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier within a snapshot.
    pub id: String,

    /// Display name.
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub label: String,

    #[serde(rename = "type", default, deserialize_with = "super::null_as_default")]
    pub node_type: NodeType,

    /// Narrative weight from 1 to 10.
    #[serde(default = "default_importance", deserialize_with = "importance_or_default")]
    pub importance: u8,

    /// Label (not id) of the faction this node belongs to.
    #[serde(default)]
    pub faction: Option<String>,

    #[serde(default, deserialize_with = "super::null_as_default")]
    pub status: NodeStatus,

    #[serde(default, deserialize_with = "super::null_as_default")]
    pub bio: String,

    #[serde(default, deserialize_with = "super::null_as_default")]
    pub traits: Vec<String>,

    /// Chapter in which the node first appears.
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub first_appearance: u32,
}

impl Node {
    /// Create an active node with default importance.
    pub fn new(id: impl Into<String>, label: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type,
            importance: default_importance(),
            faction: None,
            status: NodeStatus::Active,
            bio: String::new(),
            traits: Vec::new(),
            first_appearance: 0,
        }
    }

    /// Shorthand for a character node.
    pub fn character(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, NodeType::Character)
    }

    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_faction(mut self, faction: impl Into<String>) -> Self {
        self.faction = Some(faction.into());
        self
    }

    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = bio.into();
        self
    }

    pub fn with_trait(mut self, t: impl Into<String>) -> Self {
        self.traits.push(t.into());
        self
    }

    pub fn with_first_appearance(mut self, chapter: u32) -> Self {
        self.first_appearance = chapter;
        self
    }

    /// Shallow-merge a patch onto this node. Absent fields are left untouched.
    pub fn apply_changes(&mut self, changes: &NodeChanges) {
        if let Some(label) = &changes.label {
            self.label = label.clone();
        }
        if let Some(node_type) = changes.node_type {
            self.node_type = node_type;
        }
        if let Some(importance) = changes.importance {
            self.importance = importance;
        }
        if let Some(faction) = &changes.faction {
            self.faction = faction.clone();
        }
        if let Some(status) = changes.status {
            self.status = status;
        }
        if let Some(bio) = &changes.bio {
            self.bio = bio.clone();
        }
        if let Some(traits) = &changes.traits {
            self.traits = traits.clone();
        }
        if let Some(first_appearance) = changes.first_appearance {
            self.first_appearance = first_appearance;
        }
    }
}

/// Partial update for a [`Node`].
///
/// `faction` is doubly optional: `Some(None)` clears the faction, `None` keeps it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<u8>,

    #[serde(
        default,
        deserialize_with = "super::present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub faction: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_appearance: Option<u32>,
}

impl NodeChanges {
    pub fn status(status: NodeStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

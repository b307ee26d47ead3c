//! Novel projects as stored on disk.

use crate::graph::{GraphData, Snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The setting documents a baseline graph is built from.
///
/// Empty strings count as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrativeMaterial {
    pub character_dynamics: String,
    pub character_state: String,
    pub world_building: String,
    pub plot_architecture: String,
}

impl NarrativeMaterial {
    /// True when every document is blank.
    pub fn is_empty(&self) -> bool {
        [
            &self.character_dynamics,
            &self.character_state,
            &self.world_building,
            &self.plot_architecture,
        ]
        .iter()
        .all(|s| s.trim().is_empty())
    }
}

/// A generated novel: its setting documents, chapter texts and graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovelProject {
    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub id: String,

    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub title: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub core_seed: String,

    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub character_dynamics: String,

    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub character_state: String,

    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub world_building: String,

    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub plot_architecture: String,

    /// Per-chapter outline.
    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub chapter_blueprint: String,

    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub global_summary: String,

    /// Chapter text keyed by chapter number.
    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub chapters: BTreeMap<u32, String>,

    #[serde(default)]
    pub graph_data: GraphData,

    /// Standalone graphs extracted from single chapters.
    ///
    /// Never merged into `graph_data.snapshots`.
    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub chapter_graphs: BTreeMap<u32, Snapshot>,

    /// Set once the setting documents have been written.
    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub architecture_generated: bool,

    /// Set once the chapter outline has been written.
    #[serde(default, deserialize_with = "crate::graph::null_as_default")]
    pub blueprint_generated: bool,
}

impl NovelProject {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            created_at: Some(now),
            updated_at: Some(now),
            ..Self::default()
        }
    }

    pub fn with_chapter(mut self, chapter: u32, text: impl Into<String>) -> Self {
        self.chapters.insert(chapter, text.into());
        self
    }

    /// The documents the baseline is built from.
    pub fn material(&self) -> NarrativeMaterial {
        NarrativeMaterial {
            character_dynamics: self.character_dynamics.clone(),
            character_state: self.character_state.clone(),
            world_building: self.world_building.clone(),
            plot_architecture: self.plot_architecture.clone(),
        }
    }

    /// The chapter outline, if one was written.
    pub fn outline(&self) -> Option<&str> {
        Some(self.chapter_blueprint.as_str()).filter(|s| !s.trim().is_empty())
    }

    /// The character state document, if one was written.
    pub fn character_state(&self) -> Option<&str> {
        Some(self.character_state.as_str()).filter(|s| !s.trim().is_empty())
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

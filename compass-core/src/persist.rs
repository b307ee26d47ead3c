//! JSON persistence for graph data and novel projects.
//!
//! Files use the same camelCase layout the web front end stores, so a project
//! exported from the browser can be loaded, advanced and written back.

use crate::graph::{GraphData, GRAPH_DATA_VERSION};
use crate::project::NovelProject;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

fn check_version(found: u32) -> Result<(), PersistError> {
    if found != GRAPH_DATA_VERSION {
        return Err(PersistError::VersionMismatch {
            expected: GRAPH_DATA_VERSION,
            found,
        });
    }
    Ok(())
}

impl GraphData {
    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let data: Self = serde_json::from_str(&content)?;
        check_version(data.version)?;
        Ok(data)
    }
}

impl NovelProject {
    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let project: Self = serde_json::from_str(&content)?;
        check_version(project.graph_data.version)?;
        Ok(project)
    }

    /// Read the summary of a project file without its graph.
    pub async fn peek(path: impl AsRef<Path>) -> Result<ProjectInfo, PersistError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Partial {
            #[serde(default)]
            id: String,
            #[serde(default)]
            title: String,
            #[serde(default)]
            chapters: serde_json::Map<String, serde_json::Value>,
            #[serde(default)]
            graph_data: Option<PartialGraph>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct PartialGraph {
            #[serde(default)]
            graph_generated: bool,
            #[serde(default)]
            snapshots: serde_json::Map<String, serde_json::Value>,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        let (graph_generated, snapshots) = partial
            .graph_data
            .map(|g| (g.graph_generated, g.snapshots.len()))
            .unwrap_or_default();

        Ok(ProjectInfo {
            path: path.to_path_buf(),
            id: partial.id,
            title: partial.title,
            chapters: partial.chapters.len(),
            snapshots,
            graph_generated,
        })
    }
}

/// Summary of a project file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub path: PathBuf,
    pub id: String,
    pub title: String,
    /// Number of written chapters.
    pub chapters: usize,
    /// Number of stored graph snapshots.
    pub snapshots: usize,
    pub graph_generated: bool,
}

/// List all project files in a directory, sorted by path.
pub async fn list_projects(dir: impl AsRef<Path>) -> Result<Vec<ProjectInfo>, PersistError> {
    let mut projects = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            match NovelProject::peek(&path).await {
                Ok(info) => projects.push(info),
                Err(e) => tracing::debug!("Skipping {}: {e}", path.display()),
            }
        }
    }

    projects.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(projects)
}

/// File name for a project, derived from its title.
pub fn project_path(dir: impl AsRef<Path>, title: &str) -> PathBuf {
    let sanitized = title
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    let name = if sanitized.is_empty() {
        "untitled".to_string()
    } else {
        sanitized
    };
    dir.as_ref().join(format!("{name}.json"))
}

//! Chapter-versioned character relationship graphs for AI-generated novels.
//!
//! This crate provides:
//! - A typed entity/relation graph with deltas and a pure merge
//! - Sparse, write-once snapshot storage keyed by chapter
//! - Baseline and incremental graph builders driven by a [`Generator`]
//! - A consistency audit across the snapshot sequence
//! - Chart projection and JSON persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use compass_core::{ChatGenerator, GraphBuilder, NovelProject};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = ChatGenerator::from_env()?;
//!     let mut project = NovelProject::load_json("salt_road.json").await?;
//!
//!     let builder = GraphBuilder::new(&generator);
//!     project.graph_data = builder.baseline(&project.material()).await?;
//!     let report = builder.advance(&mut project.graph_data, &project.chapters).await?;
//!     println!("stored chapters: {:?}", report.stored());
//!
//!     project.save_json("salt_road.json").await?;
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod builder;
pub mod chart;
pub mod generator;
pub mod graph;
pub mod normalize;
pub mod persist;
pub mod project;
pub mod prompts;
pub mod testing;

// Primary public API
pub use audit::{run_audit, AuditError, AuditState, Inconsistency, Severity};
pub use builder::{BatchReport, BuildError, ChapterOutcome, GraphBuilder, Progress};
pub use chart::{ChartData, Theme};
pub use generator::{ChatGenerator, GenerationConfig, GenerationRequest, Generator, GeneratorError};
pub use graph::{apply, Delta, Edge, GraphData, Node, Snapshot, SnapshotStore};
pub use persist::PersistError;
pub use project::{NarrativeMaterial, NovelProject};
pub use testing::{MockGenerator, MockReply};

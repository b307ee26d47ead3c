//! Versioned relationship graph.
//!
//! A novel's cast and their relations are tracked as a sequence of full graph
//! snapshots keyed by chapter number:
//!
//! ```text
//! ┌────────────┐   apply(Δ1)   ┌────────────┐   apply(Δ3)   ┌────────────┐
//! │ chapter 0  │ ────────────► │ chapter 1  │ ────────────► │ chapter 3  │
//! │ (baseline) │               │            │  (2 unchanged) │            │
//! └────────────┘               └────────────┘               └────────────┘
//! ```
//!
//! Stored snapshots are never modified. Looking up chapter 2 above yields the
//! chapter 1 snapshot (see [`SnapshotStore::nearest_at_or_before`]).

mod data;
mod delta;
mod edge;
mod node;
mod snapshot;
mod store;

pub use data::{GraphData, GRAPH_DATA_VERSION};
pub use delta::{apply, Delta, EdgeUpdate, NodeUpdate};
pub use edge::{default_edge_id, Edge, EdgeChanges, RelationType};
pub use node::{Node, NodeChanges, NodeStatus, NodeType};
pub use snapshot::Snapshot;
pub use store::{SnapshotStore, StoreError};

use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` the same as a missing field.
///
/// Generators routinely emit `"traits": null` or `"newEdges": null`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Distinguish a present `null` (`Some(None)`) from a missing key (`None`).
pub(crate) fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

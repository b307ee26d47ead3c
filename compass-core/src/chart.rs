//! Projection of a snapshot into force-graph chart data.
//!
//! The output is plain data: sizes, colours and categories already resolved,
//! ready to be serialized for whichever chart library renders it.

use crate::graph::{Node, NodeStatus, NodeType, RelationType, Snapshot};
use serde::Serialize;
use std::collections::HashMap;

/// Name of the category for nodes without a faction. Always the last category.
pub const OTHER_CATEGORY: &str = "Other";

/// Colours assigned to factions, in order of first appearance.
pub const FACTION_PALETTE: [&str; 8] = [
    "#6366f1", "#8b5cf6", "#06b6d4", "#14b8a6", "#f97316", "#ef4444", "#ec4899", "#84cc16",
];

/// Colour for a faction missing from the colour map.
const FALLBACK_CATEGORY_COLOR: &str = "#6366f1";
const OTHER_COLOR_DARK: &str = "#a78bfa";
const OTHER_COLOR_LIGHT: &str = "#6366f1";
const DECEASED_COLOR: &str = "#6b7280";

const LINK_OPACITY: f32 = 0.6;

/// Background the chart is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Marker shape for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    Circle,
    Diamond,
    Rect,
    Triangle,
}

impl From<NodeType> for Symbol {
    fn from(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Character => Symbol::Circle,
            NodeType::Faction => Symbol::Diamond,
            NodeType::Location => Symbol::Rect,
            NodeType::Item => Symbol::Triangle,
        }
    }
}

/// Line colour for a relation type.
pub fn relation_color(relation: RelationType) -> &'static str {
    match relation {
        RelationType::Hostile => "#ef4444",
        RelationType::Romantic => "#ec4899",
        RelationType::Alliance => "#f59e0b",
        RelationType::Neutral => "#9ca3af",
        RelationType::Family => "#3b82f6",
        RelationType::Mentor => "#22c55e",
    }
}

/// Assign palette colours to distinct factions in first-seen order, cycling
/// when there are more factions than colours.
pub fn faction_colors(nodes: &[Node]) -> HashMap<String, &'static str> {
    let mut colors = HashMap::new();
    for faction in nodes.iter().filter_map(faction_of) {
        if !colors.contains_key(faction) {
            let color = FACTION_PALETTE[colors.len() % FACTION_PALETTE.len()];
            colors.insert(faction.to_string(), color);
        }
    }
    colors
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartNode {
    pub id: String,
    pub name: String,
    pub symbol: Symbol,
    pub symbol_size: u32,
    /// Index into [`ChartData::categories`].
    pub category: usize,
    pub value: u8,
    pub show_label: bool,
    pub opacity: f32,
    /// Overrides the category colour.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartLink {
    pub source: String,
    pub target: String,
    pub value: u8,
    pub color: &'static str,
    pub width: f32,
    pub opacity: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartCategory {
    pub name: String,
    pub color: String,
}

/// Everything needed to draw one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartData {
    pub nodes: Vec<ChartNode>,
    pub links: Vec<ChartLink>,
    pub categories: Vec<ChartCategory>,
}

impl ChartData {
    /// Project with colours assigned from the snapshot's own factions.
    pub fn from_snapshot(snapshot: &Snapshot, theme: Theme) -> Self {
        project(snapshot, theme, &faction_colors(&snapshot.nodes))
    }
}

// Zero means the field was never filled in.
fn importance_or_default(importance: u8) -> u8 {
    if importance == 0 {
        5
    } else {
        importance
    }
}

fn strength_or_default(strength: u8) -> u8 {
    if strength == 0 {
        3
    } else {
        strength
    }
}

// An empty faction counts as none.
fn faction_of(node: &Node) -> Option<&str> {
    node.faction.as_deref().filter(|f| !f.is_empty())
}

/// Project a snapshot into chart data.
pub fn project(
    snapshot: &Snapshot,
    theme: Theme,
    faction_colors: &HashMap<String, &'static str>,
) -> ChartData {
    let mut factions: Vec<&str> = Vec::new();
    for faction in snapshot.nodes.iter().filter_map(faction_of) {
        if !factions.contains(&faction) {
            factions.push(faction);
        }
    }

    let mut categories: Vec<ChartCategory> = factions
        .iter()
        .map(|name| ChartCategory {
            name: name.to_string(),
            color: faction_colors
                .get(*name)
                .copied()
                .unwrap_or(FALLBACK_CATEGORY_COLOR)
                .to_string(),
        })
        .collect();
    let other_color = match theme {
        Theme::Dark => OTHER_COLOR_DARK,
        Theme::Light => OTHER_COLOR_LIGHT,
    };
    categories.push(ChartCategory {
        name: OTHER_CATEGORY.to_string(),
        color: other_color.to_string(),
    });
    let other_index = factions.len();

    let nodes = snapshot
        .nodes
        .iter()
        .map(|node| {
            let importance = importance_or_default(node.importance);
            let size = 20 + u32::from(importance) * 4;
            let category = faction_of(node)
                .and_then(|f| factions.iter().position(|name| *name == f))
                .unwrap_or(other_index);
            let (opacity, color) = match node.status {
                NodeStatus::Deceased => (0.35, Some(DECEASED_COLOR)),
                NodeStatus::Offline => (0.6, None),
                NodeStatus::Active => (1.0, None),
            };

            ChartNode {
                id: node.id.clone(),
                name: node.label.clone(),
                symbol: node.node_type.into(),
                symbol_size: size,
                category,
                value: importance,
                show_label: size > 36,
                opacity,
                color,
            }
        })
        .collect();

    let links = snapshot
        .edges
        .iter()
        .map(|edge| {
            let strength = strength_or_default(edge.strength);
            ChartLink {
                source: edge.source.clone(),
                target: edge.target.clone(),
                value: strength,
                color: relation_color(edge.relation_type),
                width: (f32::from(strength) / 3.0).max(1.0),
                opacity: LINK_OPACITY,
            }
        })
        .collect();

    ChartData {
        nodes,
        links,
        categories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;

    fn snapshot() -> Snapshot {
        Snapshot::from_parts(
            vec![
                Node::character("lin", "Lin").with_importance(8).with_faction("Couriers"),
                Node::character("oru", "Oru")
                    .with_importance(4)
                    .with_status(NodeStatus::Deceased),
                Node::new("guild", "Salt Guild", NodeType::Faction).with_faction("Guild"),
                Node::new("keep", "Black Keep", NodeType::Location)
                    .with_faction("Couriers")
                    .with_status(NodeStatus::Offline),
            ],
            vec![
                Edge::new("e1", "lin", "oru", RelationType::Hostile).with_strength(9),
                Edge::new("e2", "lin", "guild", RelationType::Mentor).with_strength(2),
            ],
        )
    }

    #[test]
    fn test_categories_and_node_styles() {
        let chart = ChartData::from_snapshot(&snapshot(), Theme::Light);

        let names: Vec<_> = chart.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Couriers", "Guild", OTHER_CATEGORY]);
        assert_eq!(chart.categories[0].color, "#6366f1");
        assert_eq!(chart.categories[1].color, "#8b5cf6");
        assert_eq!(chart.categories[2].color, "#6366f1");

        let lin = &chart.nodes[0];
        assert_eq!(lin.symbol_size, 52);
        assert!(lin.show_label);
        assert_eq!(lin.category, 0);
        assert_eq!(lin.value, 8);

        let oru = &chart.nodes[1];
        assert_eq!(oru.symbol_size, 36);
        assert!(!oru.show_label);
        assert_eq!(oru.category, 2);
        assert_eq!(oru.opacity, 0.35);
        assert_eq!(oru.color, Some("#6b7280"));

        assert_eq!(chart.nodes[2].symbol, Symbol::Diamond);
        assert_eq!(chart.nodes[3].symbol, Symbol::Rect);
        assert_eq!(chart.nodes[3].opacity, 0.6);
        assert_eq!(chart.nodes[3].category, 0);
    }

    #[test]
    fn test_link_styles() {
        let chart = ChartData::from_snapshot(&snapshot(), Theme::Dark);

        assert_eq!(chart.links[0].color, "#ef4444");
        assert_eq!(chart.links[0].width, 3.0);
        assert_eq!(chart.links[0].value, 9);
        assert_eq!(chart.links[1].color, "#22c55e");
        assert_eq!(chart.links[1].width, 1.0);
        assert_eq!(chart.links[1].opacity, 0.6);
        assert_eq!(chart.categories.last().unwrap().color, "#a78bfa");
    }

    #[test]
    fn test_faction_palette_cycles() {
        let nodes: Vec<Node> = (0..10)
            .map(|i| Node::character(format!("n{i}"), "x").with_faction(format!("f{i}")))
            .collect();
        let colors = faction_colors(&nodes);

        assert_eq!(colors.len(), 10);
        assert_eq!(colors["f0"], "#6366f1");
        assert_eq!(colors["f7"], "#84cc16");
        assert_eq!(colors["f8"], "#6366f1");
        assert_eq!(colors["f9"], "#8b5cf6");
    }

    #[test]
    fn test_unmapped_faction_uses_fallback() {
        let chart = project(&snapshot(), Theme::Dark, &HashMap::new());
        assert!(chart.categories[..2].iter().all(|c| c.color == "#6366f1"));
    }

    #[test]
    fn test_empty_faction_is_other() {
        let nodes = vec![
            Node::character("lin", "Lin").with_faction(""),
            Node::character("oru", "Oru").with_faction("Couriers"),
        ];
        assert_eq!(faction_colors(&nodes).len(), 1);

        let chart = ChartData::from_snapshot(&Snapshot::from_parts(nodes, Vec::new()), Theme::Light);
        let names: Vec<_> = chart.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Couriers", OTHER_CATEGORY]);
        assert_eq!(chart.nodes[0].category, 1);
    }

    #[test]
    fn test_empty_snapshot() {
        let chart = ChartData::from_snapshot(&Snapshot::new(), Theme::Light);
        assert!(chart.nodes.is_empty());
        assert!(chart.links.is_empty());
        assert_eq!(chart.categories.len(), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(ChartData::from_snapshot(&snapshot(), Theme::Light)).unwrap();
        assert_eq!(json["nodes"][0]["symbolSize"], 52);
        assert_eq!(json["nodes"][0]["symbol"], "circle");
        assert!(json["nodes"][0].get("color").is_none());
        assert_eq!(json["nodes"][1]["color"], "#6b7280");
    }
}

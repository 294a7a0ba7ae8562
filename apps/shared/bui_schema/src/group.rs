//! Panel group documents
//!
//! A [`PanelGroupConfig`] is what the graph editor stores into a group: bridge
//! records describing which panel opens which, and one [`PanelNode`] per panel.
//! The merge helpers (`insert_*`, `record_graph`) implement the editor's
//! "store into group" step so re-exporting a graph updates records in place.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::{Result, UiType, Validatable};

/// How an opened panel is presented relative to the panel that opened it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShowModel {
    /// Shown on top, the in-panel stays visible
    #[default]
    Overlay,
    /// Pushed as a child of the in-panel
    Push,
    /// Replaces the in-panel, which is hidden until the out-panel goes away
    Replace,
}

impl fmt::Display for ShowModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShowModel::Overlay => write!(f, "overlay"),
            ShowModel::Push => write!(f, "push"),
            ShowModel::Replace => write!(f, "replace"),
        }
    }
}

/// Static routing record: `in_node` opens `out_node`
///
/// An empty `in_node` means the panel is opened by the system rather than by
/// another panel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BridgeInfo {
    #[serde(default)]
    pub in_node: String,
    pub out_node: String,
    #[serde(default)]
    pub show_model: ShowModel,
}

impl BridgeInfo {
    pub fn new(in_node: impl Into<String>, out_node: impl Into<String>, show_model: ShowModel) -> Self {
        Self {
            in_node: in_node.into(),
            out_node: out_node.into(),
            show_model,
        }
    }

    /// Route opened by the system (no in-panel)
    pub fn from_system(out_node: impl Into<String>, show_model: ShowModel) -> Self {
        Self::new("", out_node, show_model)
    }

    pub fn is_from_system(&self) -> bool {
        self.in_node.is_empty()
    }

    pub fn matches(&self, in_node: &str, out_node: &str) -> bool {
        self.in_node == in_node && self.out_node == out_node
    }
}

impl fmt::Display for BridgeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = if self.is_from_system() { "<system>" } else { &self.in_node };
        write!(f, "{}->{} ({})", from, self.out_node, self.show_model)
    }
}

/// Where panel assets are loaded from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoadType {
    #[default]
    Prefab,
    Bundle,
}

/// Asset reference of a single panel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelSource {
    Prefab {
        prefab: String,
    },
    Bundle {
        bundle_name: String,
        asset_id: String,
    },
}

impl PanelSource {
    pub fn load_type(&self) -> LoadType {
        match self {
            PanelSource::Prefab { .. } => LoadType::Prefab,
            PanelSource::Bundle { .. } => LoadType::Bundle,
        }
    }

    /// The asset identifier, empty when the asset was never assigned
    pub fn asset_id(&self) -> &str {
        match self {
            PanelSource::Prefab { prefab } => prefab,
            PanelSource::Bundle { asset_id, .. } => asset_id,
        }
    }
}

/// One panel of the group
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PanelNode {
    pub panel_name: String,
    #[serde(default)]
    pub ui_type: UiType,
    pub source: PanelSource,
}

impl PanelNode {
    pub fn new(panel_name: impl Into<String>, ui_type: UiType, source: PanelSource) -> Self {
        Self {
            panel_name: panel_name.into(),
            ui_type,
            source,
        }
    }
}

/// Graph that contributed records to this group
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GraphRecord {
    pub graph_name: String,
    pub guid: String,
}

/// Findings reported by [`PanelGroupConfig::issues`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    #[error("panel '{0}' has no source asset")]
    MissingSource(String),

    #[error("panel '{panel}' is a {found:?} source in a {expected:?} group")]
    SourceKindMismatch {
        panel: String,
        expected: LoadType,
        found: LoadType,
    },

    #[error("bridge {bridge} references unknown panel '{panel}'")]
    UnknownNode { bridge: String, panel: String },

    #[error("panel '{0}' is declared more than once")]
    DuplicateNode(String),
}

/// Persisted panel group
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Panel Group")]
#[schemars(description = "Bridges and panel sources of a BridgeUI panel group")]
pub struct PanelGroupConfig {
    pub name: String,

    #[serde(default)]
    pub load_type: LoadType,

    #[serde(default)]
    pub bridges: Vec<BridgeInfo>,

    #[serde(default)]
    pub nodes: Vec<PanelNode>,

    #[serde(default)]
    pub graphs: Vec<GraphRecord>,
}

impl Validatable for PanelGroupConfig {
    fn check(&self) -> Result<()> {
        for node in &self.nodes {
            node.ui_type.validate().map_err(|e| {
                crate::SchemaError::Validation(format!("panel '{}': {}", node.panel_name, e))
            })?;
        }
        Ok(())
    }
}

impl PanelGroupConfig {
    pub fn new(name: impl Into<String>, load_type: LoadType) -> Self {
        Self {
            name: name.into(),
            load_type,
            ..Default::default()
        }
    }

    /// Bridge record for `in_node -> out_node`, `in_node` empty for system opens
    pub fn find_bridge(&self, in_node: &str, out_node: &str) -> Option<&BridgeInfo> {
        self.bridges.iter().find(|b| b.matches(in_node, out_node))
    }

    /// All routes leaving `in_node`
    pub fn routes_from<'a>(&'a self, in_node: &'a str) -> impl Iterator<Item = &'a BridgeInfo> {
        self.bridges.iter().filter(move |b| b.in_node == in_node)
    }

    pub fn node(&self, panel_name: &str) -> Option<&PanelNode> {
        self.nodes.iter().find(|n| n.panel_name == panel_name)
    }

    /// Merge bridge records, updating the show model of existing routes
    ///
    /// Records without an `out_node` are skipped. Returns how many routes were added.
    pub fn insert_bridges(&mut self, bridges: impl IntoIterator<Item = BridgeInfo>) -> usize {
        let mut added = 0;
        for bridge in bridges {
            if bridge.out_node.is_empty() {
                continue;
            }
            match self
                .bridges
                .iter_mut()
                .find(|b| b.matches(&bridge.in_node, &bridge.out_node))
            {
                Some(existing) => existing.show_model = bridge.show_model,
                None => {
                    self.bridges.push(bridge);
                    added += 1;
                }
            }
        }
        added
    }

    /// Merge panel nodes by name, replacing source and display config
    ///
    /// Returns how many nodes were added.
    pub fn insert_nodes(&mut self, nodes: impl IntoIterator<Item = PanelNode>) -> usize {
        let mut added = 0;
        for node in nodes {
            match self.nodes.iter_mut().find(|n| n.panel_name == node.panel_name) {
                Some(existing) => {
                    existing.source = node.source;
                    existing.ui_type = node.ui_type;
                }
                None => {
                    self.nodes.push(node);
                    added += 1;
                }
            }
        }
        added
    }

    /// Remember the graph that produced these records, renaming a known one
    pub fn record_graph(&mut self, graph_name: impl Into<String>, guid: impl Into<String>) {
        let graph_name = graph_name.into();
        let guid = guid.into();
        match self.graphs.iter_mut().find(|g| g.guid == guid) {
            Some(record) => record.graph_name = graph_name,
            None => self.graphs.push(GraphRecord { graph_name, guid }),
        }
    }

    /// Merge another export of this group: bridges, nodes and graph records
    pub fn merge(&mut self, other: PanelGroupConfig) -> (usize, usize) {
        let bridges = self.insert_bridges(other.bridges);
        let nodes = self.insert_nodes(other.nodes);
        for graph in other.graphs {
            self.record_graph(graph.graph_name, graph.guid);
        }
        (bridges, nodes)
    }

    /// Consistency findings; an empty list means the group is ready to load
    pub fn issues(&self) -> Vec<GraphIssue> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for node in &self.nodes {
            if !seen.insert(node.panel_name.as_str()) {
                issues.push(GraphIssue::DuplicateNode(node.panel_name.clone()));
            }
            if node.source.asset_id().is_empty() {
                issues.push(GraphIssue::MissingSource(node.panel_name.clone()));
            }
            let found = node.source.load_type();
            if found != self.load_type {
                issues.push(GraphIssue::SourceKindMismatch {
                    panel: node.panel_name.clone(),
                    expected: self.load_type,
                    found,
                });
            }
        }

        for bridge in &self.bridges {
            let referenced = [bridge.in_node.as_str(), bridge.out_node.as_str()];
            for panel in referenced.into_iter().filter(|p| !p.is_empty()) {
                if !seen.contains(panel) {
                    issues.push(GraphIssue::UnknownNode {
                        bridge: bridge.to_string(),
                        panel: panel.to_string(),
                    });
                }
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefab(name: &str) -> PanelNode {
        PanelNode::new(
            name,
            UiType::default(),
            PanelSource::Prefab {
                prefab: format!("{}.prefab", name),
            },
        )
    }

    fn sample_group() -> PanelGroupConfig {
        let mut group = PanelGroupConfig::new("main", LoadType::Prefab);
        group.insert_nodes([prefab("Menu"), prefab("Settings")]);
        group.insert_bridges([
            BridgeInfo::from_system("Menu", ShowModel::Overlay),
            BridgeInfo::new("Menu", "Settings", ShowModel::Replace),
        ]);
        group
    }

    #[test]
    fn test_find_bridge_from_system() {
        let group = sample_group();
        let route = group.find_bridge("", "Menu").unwrap();
        assert!(route.is_from_system());
        assert_eq!(group.find_bridge("Menu", "Settings").unwrap().show_model, ShowModel::Replace);
        assert!(group.find_bridge("Settings", "Menu").is_none());
        assert_eq!(group.routes_from("Menu").count(), 1);
    }

    #[test]
    fn test_insert_bridges_upserts_show_model() {
        let mut group = sample_group();
        let added = group.insert_bridges([
            BridgeInfo::new("Menu", "Settings", ShowModel::Push),
            BridgeInfo::new("Menu", "", ShowModel::Push),
            BridgeInfo::new("Settings", "Menu", ShowModel::Overlay),
        ]);
        assert_eq!(added, 1);
        assert_eq!(group.bridges.len(), 3);
        assert_eq!(group.find_bridge("Menu", "Settings").unwrap().show_model, ShowModel::Push);
    }

    #[test]
    fn test_insert_nodes_replaces_source() {
        let mut group = sample_group();
        let mut updated = prefab("Menu");
        updated.source = PanelSource::Prefab {
            prefab: "menu_v2.prefab".to_string(),
        };
        assert_eq!(group.insert_nodes([updated]), 0);
        assert_eq!(group.node("Menu").unwrap().source.asset_id(), "menu_v2.prefab");
    }

    #[test]
    fn test_record_graph_renames_by_guid() {
        let mut group = sample_group();
        group.record_graph("ui_graph", "abc");
        group.record_graph("ui_graph_renamed", "abc");
        assert_eq!(group.graphs.len(), 1);
        assert_eq!(group.graphs[0].graph_name, "ui_graph_renamed");
    }

    #[test]
    fn test_issues() {
        let mut group = sample_group();
        assert!(group.issues().is_empty());

        group.nodes.push(PanelNode::new(
            "Shop",
            UiType::default(),
            PanelSource::Bundle {
                bundle_name: "ui".to_string(),
                asset_id: String::new(),
            },
        ));
        group.bridges.push(BridgeInfo::new("Menu", "Inventory", ShowModel::Overlay));

        let issues = group.issues();
        assert!(issues.contains(&GraphIssue::MissingSource("Shop".to_string())));
        assert!(issues.iter().any(|i| matches!(i, GraphIssue::SourceKindMismatch { panel, .. } if panel == "Shop")));
        assert!(issues.iter().any(|i| matches!(i, GraphIssue::UnknownNode { panel, .. } if panel == "Inventory")));
    }

    #[test]
    fn test_load_and_validate_json() {
        let json = r#"{
            "name": "main",
            "load_type": "bundle",
            "bridges": [
                { "out_node": "Menu" },
                { "in_node": "Menu", "out_node": "Settings", "show_model": "push" }
            ],
            "nodes": [
                {
                    "panel_name": "Menu",
                    "source": { "kind": "bundle", "bundle_name": "ui", "asset_id": "a1" }
                },
                {
                    "panel_name": "Settings",
                    "ui_type": { "close_rule": "hide_instead" },
                    "source": { "kind": "bundle", "bundle_name": "ui", "asset_id": "a2" }
                }
            ]
        }"#;
        let group = PanelGroupConfig::from_json_str(json).unwrap();
        assert_eq!(group.bridges[0].show_model, ShowModel::Overlay);
        assert!(group.bridges[0].is_from_system());
        assert!(group.issues().is_empty());
    }

    #[test]
    fn test_schema_rejects_missing_out_node() {
        let json = r#"{ "name": "main", "bridges": [ { "in_node": "Menu" } ] }"#;
        assert!(PanelGroupConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_check_rejects_bad_alpha() {
        let json = r#"{
            "name": "main",
            "nodes": [ {
                "panel_name": "Menu",
                "ui_type": { "hide_alpha": 3.0 },
                "source": { "kind": "prefab", "prefab": "menu" }
            } ]
        }"#;
        assert!(matches!(
            PanelGroupConfig::from_json_str(json),
            Err(crate::SchemaError::Validation(_))
        ));
    }
}

//! The JSON document: export, bulk load, and the serde shapes between.
//!
//! ```text
//! { "type": "graph", "id": "...", "children": [ node | package | edge ] }
//! ```
//!
//! Nodes carry their ports (and, for packages, child nodes) in
//! `children`; edges only appear at the top level, after the nodes.
//! Exported port positions are the unrotated, unflipped baselines, so a
//! loaded document re-applies each node's transform on top of them.

use crate::config::GraphConfig;
use crate::error::LoadError;
use crate::id::ElementId;
use crate::model::*;
use crate::svg;
use kurbo::{Point, Size};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Root of a serialized diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Always `"graph"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub id: ElementId,
    #[serde(default)]
    pub children: Vec<DocElement>,
}

/// Any element that can appear in a `children` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DocElement {
    #[serde(rename = "node:process")]
    Process(DocNode),
    #[serde(rename = "node:svg")]
    Svg(DocNode),
    #[serde(rename = "node:package")]
    Package(DocPackage),
    #[serde(rename = "port:flow")]
    Port(DocPort),
    #[serde(rename = "edge:flow")]
    Edge(Edge),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XY {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WH {
    pub width: f64,
    pub height: f64,
}

impl From<Point> for XY {
    fn from(p: Point) -> Self {
        XY { x: p.x, y: p.y }
    }
}

impl From<XY> for Point {
    fn from(p: XY) -> Self {
        Point::new(p.x, p.y)
    }
}

impl From<Size> for WH {
    fn from(s: Size) -> Self {
        WH {
            width: s.width,
            height: s.height,
        }
    }
}

impl From<WH> for Size {
    fn from(s: WH) -> Self {
        Size::new(s.width, s.height)
    }
}

fn default_port_size() -> WH {
    WH {
        width: crate::geometry::PORT_SIZE,
        height: crate::geometry::PORT_SIZE,
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A process or vector-art node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocNode {
    pub id: ElementId,
    pub position: XY,
    pub size: WH,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub children: Vec<DocElement>,
    #[serde(default)]
    pub flip_horizontal: Option<f64>,
    #[serde(default)]
    pub flip_vertical: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub flip_horizontal_enabled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub flip_vertical_enabled: bool,
    #[serde(default)]
    pub rotation: f64,
    /// Declared rotation pivot, local to the node. Absent means the centre.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivot: Option<XY>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svg_content: Option<String>,
    /// The payload the node was imported from; ports are regenerated from
    /// its markers on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svg_source: Option<String>,
}

/// A container node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocPackage {
    pub id: ElementId,
    pub position: XY,
    pub size: WH,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub children: Vec<DocElement>,
    #[serde(default)]
    pub rotation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocPort {
    pub id: ElementId,
    pub position: XY,
    #[serde(default = "default_port_size")]
    pub size: WH,
    #[serde(rename = "portType")]
    pub direction: PortDirection,
    #[serde(default)]
    pub shape: PortShape,
    /// Unknown side names load as "no side" rather than failing.
    #[serde(
        default,
        deserialize_with = "lenient_side",
        skip_serializing_if = "Option::is_none"
    )]
    pub side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn lenient_side<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Side>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Side::parse))
}

// ─── Export ─────────────────────────────────────────────────────────────

impl FlowGraph {
    /// Snapshot the whole diagram as a document.
    pub fn to_document(&self) -> GraphDocument {
        let mut children: Vec<DocElement> = self
            .node_children(self.root())
            .into_iter()
            .filter_map(|idx| self.export_element(idx))
            .collect();
        children.extend(self.edges().iter().cloned().map(DocElement::Edge));
        GraphDocument {
            kind: "graph".to_string(),
            id: self.id,
            children,
        }
    }

    /// Serialize to JSON, pretty-printed unless the config says otherwise.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let doc = self.to_document();
        if self.config().pretty_json {
            serde_json::to_string_pretty(&doc)
        } else {
            serde_json::to_string(&doc)
        }
    }

    fn export_element(&self, idx: NodeIndex) -> Option<DocElement> {
        match self.element(idx)? {
            Element::Root => None,
            Element::Port(port) => Some(DocElement::Port(DocPort {
                id: port.id,
                position: port.baseline().into(),
                size: port.size.into(),
                direction: port.direction,
                shape: port.shape,
                side: port.side,
                label: port.label.clone(),
            })),
            Element::Node(node) => {
                let children = self
                    .children(idx)
                    .iter()
                    .filter_map(|&c| self.export_element(c))
                    .collect();
                Some(export_node(node, children))
            }
        }
    }
}

fn export_node(node: &Node, children: Vec<DocElement>) -> DocElement {
    if node.kind.is_container() {
        return DocElement::Package(DocPackage {
            id: node.id,
            position: node.position.into(),
            size: node.size.into(),
            name: node.name.clone(),
            children,
            rotation: node.rotation,
        });
    }
    let (svg_content, svg_source) = match &node.kind {
        NodeKind::Svg { content, source } => (Some(content.clone()), source.clone()),
        _ => (None, None),
    };
    let doc = DocNode {
        id: node.id,
        position: node.position.into(),
        size: node.size.into(),
        name: node.name.clone(),
        children,
        flip_horizontal: node.flip_horizontal,
        flip_vertical: node.flip_vertical,
        flip_horizontal_enabled: node.flip_horizontal_enabled,
        flip_vertical_enabled: node.flip_vertical_enabled,
        rotation: node.rotation,
        pivot: node.pivot.map(XY::from),
        svg_content,
        svg_source,
    };
    match node.kind {
        NodeKind::Svg { .. } => DocElement::Svg(doc),
        _ => DocElement::Process(doc),
    }
}

// ─── Load ───────────────────────────────────────────────────────────────

impl FlowGraph {
    /// Build a graph from a document.
    ///
    /// The edge counter is set from the highest `edge-<n>` present, and
    /// every rotated or flipped node has its ports re-placed: vector-art
    /// nodes that kept their source payload re-derive port baselines from
    /// its markers, the rest treat the stored positions as baselines.
    pub fn from_document(doc: GraphDocument, config: GraphConfig) -> Result<FlowGraph, LoadError> {
        if doc.kind != "graph" {
            return Err(LoadError::NotAGraph(doc.kind));
        }
        let mut graph = FlowGraph::with_config(doc.id.as_str(), config);

        let mut edges = Vec::new();
        for child in doc.children {
            match child {
                DocElement::Edge(edge) => edges.push(edge),
                DocElement::Port(port) => return Err(LoadError::StrayPort(port.id)),
                node => {
                    graph.add_node(template_from(node)?)?;
                }
            }
        }
        for edge in edges {
            graph.push_loaded_edge(edge)?;
        }
        graph.recompute_edge_counter();
        graph.repair_transforms();

        log::debug!(
            "loaded graph {}: {} node(s), {} edge(s), edge counter {}",
            graph.id,
            graph.node_count(),
            graph.edges().len(),
            graph.edge_counter()
        );
        Ok(graph)
    }

    /// Parse a JSON document into a new graph.
    pub fn from_json(text: &str, config: GraphConfig) -> Result<FlowGraph, LoadError> {
        let doc: GraphDocument = serde_json::from_str(text)?;
        Self::from_document(doc, config)
    }

    /// Replace this graph with the one in `text`. On error `self` is left
    /// exactly as it was.
    pub fn load_from_json(&mut self, text: &str) -> Result<(), LoadError> {
        let loaded = Self::from_json(text, self.config().clone())?;
        *self = loaded;
        Ok(())
    }

    /// Replace this graph with `doc`, atomically.
    pub fn replace_with(&mut self, doc: GraphDocument) -> Result<(), LoadError> {
        let loaded = Self::from_document(doc, self.config().clone())?;
        *self = loaded;
        Ok(())
    }

    fn repair_transforms(&mut self) {
        let pending: Vec<(ElementId, Option<String>)> = self
            .nodes()
            .into_iter()
            .filter(|n| n.transform_state() != TransformState::Identity)
            .map(|n| {
                let source = match &n.kind {
                    NodeKind::Svg { source, .. } => source.clone(),
                    _ => None,
                };
                (n.id, source)
            })
            .collect();

        for (id, source) in pending {
            let Some(idx) = self.index_of(id) else {
                continue;
            };
            if let Some(source) = source {
                match svg::marker_layout(id, &source, self.config()) {
                    Ok(layout) => {
                        if let Some(pivot) = layout.pivot
                            && let Some(node) = self.node_mut(id)
                        {
                            node.pivot = Some(pivot);
                        }
                        let positions: HashMap<ElementId, Point> = layout.baselines.into_iter().collect();
                        self.replace_port_positions(idx, &positions);
                    }
                    Err(e) => {
                        log::warn!("could not regenerate ports of {id} from its source ({e}); keeping stored positions");
                    }
                }
            }
            self.apply_port_transforms(idx);
        }
    }
}

/// Convert one serialized node subtree.
fn template_from(element: DocElement) -> Result<NodeTemplate, LoadError> {
    let (node, children) = match element {
        DocElement::Process(doc) => (node_from(&doc, NodeKind::Process), doc.children),
        DocElement::Svg(doc) => {
            let kind = NodeKind::Svg {
                content: doc.svg_content.clone().unwrap_or_default(),
                source: doc.svg_source.clone(),
            };
            (node_from(&doc, kind), doc.children)
        }
        DocElement::Package(doc) => {
            let mut node = Node::new(
                doc.id,
                NodeKind::Package,
                doc.position.into(),
                doc.size.into(),
                &doc.name,
            );
            node.rotation = doc.rotation;
            (node, doc.children)
        }
        DocElement::Port(port) => return Err(LoadError::StrayPort(port.id)),
        DocElement::Edge(edge) => return Err(LoadError::NestedEdge(edge.id)),
    };

    let mut ports = Vec::new();
    let mut nested = Vec::new();
    for child in children {
        match child {
            DocElement::Port(p) => ports.push(Port {
                id: p.id,
                position: p.position.into(),
                size: p.size.into(),
                direction: p.direction,
                shape: p.shape,
                side: p.side,
                label: p.label,
                original_position: None,
            }),
            DocElement::Edge(edge) => return Err(LoadError::NestedEdge(edge.id)),
            other => nested.push(template_from(other)?),
        }
    }
    Ok(NodeTemplate {
        node,
        ports,
        children: nested,
    })
}

fn node_from(doc: &DocNode, kind: NodeKind) -> Node {
    let mut node = Node::new(doc.id, kind, doc.position.into(), doc.size.into(), &doc.name);
    node.rotation = doc.rotation;
    node.flip_horizontal = doc.flip_horizontal;
    node.flip_vertical = doc.flip_vertical;
    node.flip_horizontal_enabled = doc.flip_horizontal_enabled;
    node.flip_vertical_enabled = doc.flip_vertical_enabled;
    node.pivot = doc.pivot.map(Point::from);
    node
}

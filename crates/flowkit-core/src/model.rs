//! Core data model for flowkit diagrams.
//!
//! A diagram is a containment tree: the root holds top-level nodes,
//! nodes hold their ports, and package nodes additionally hold child
//! nodes. Edges connect two ports by id and are kept beside the tree.
//! Child order is significant: it is the display (z) order.
//!
//! Positions are always local to the parent; nothing in the tree is
//! pre-offset by an ancestor. See `coords` for composing them.

use crate::config::GraphConfig;
use crate::error::{EdgeError, LoadError, ModelError};
use crate::geometry::{self, PORT_SIZE};
use crate::id::ElementId;
use kurbo::{Point, Rect, Size};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

// ─── Ports ───────────────────────────────────────────────────────────────

/// Which way data flows through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    /// The side a port of this direction sits on when none is given.
    pub fn default_side(self) -> Side {
        match self {
            PortDirection::Input => Side::Left,
            PortDirection::Output => Side::Right,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
    }
}

/// Glyph drawn for a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortShape {
    #[default]
    Circle,
    Square,
    Diamond,
    Triangle,
}

/// The node edge a port is distributed along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Top, Side::Bottom];

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Top => "top",
            Side::Bottom => "bottom",
        }
    }

    pub fn parse(s: &str) -> Option<Side> {
        match s {
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            "top" => Some(Side::Top),
            "bottom" => Some(Side::Bottom),
            _ => None,
        }
    }
}

/// A connection point owned by exactly one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub id: ElementId,
    /// Top-left corner, local to the owning node.
    pub position: Point,
    pub size: Size,
    pub direction: PortDirection,
    pub shape: PortShape,
    /// `None` when the port is not attached to a recognized side; such
    /// ports are never re-laid-out.
    pub side: Option<Side>,
    pub label: Option<String>,
    /// Unrotated, unflipped position captured the first time a transform
    /// is applied, so repeated transforms stay reversible.
    pub original_position: Option<Point>,
}

impl Port {
    pub fn new(id: ElementId, direction: PortDirection, side: Side) -> Self {
        Self {
            id,
            position: Point::ZERO,
            size: Size::new(PORT_SIZE, PORT_SIZE),
            direction,
            shape: PortShape::default(),
            side: Some(side),
            label: None,
            original_position: None,
        }
    }

    /// Position before any rotation or flip.
    pub fn baseline(&self) -> Point {
        self.original_position.unwrap_or(self.position)
    }

    /// Local bounding box.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// The node variants.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Plain rectangular processing block.
    Process,
    /// Vector-art node. `content` is what the renderer draws (port markers
    /// removed); `source` is the raw imported payload, kept so ports can be
    /// regenerated from its markers.
    Svg {
        content: String,
        source: Option<String>,
    },
    /// Container whose children are full nodes.
    Package,
}

impl NodeKind {
    /// The `type` tag used in the JSON document.
    pub fn type_tag(&self) -> &'static str {
        match self {
            NodeKind::Process => "node:process",
            NodeKind::Svg { .. } => "node:svg",
            NodeKind::Package => "node:package",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, NodeKind::Package)
    }
}

/// Where a node sits in its rotate/flip pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformState {
    Identity,
    Rotated,
    Flipped,
    RotatedFlipped,
}

/// A positioned, sized element with ports.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: ElementId,
    pub kind: NodeKind,
    /// Top-left corner, local to the parent.
    pub position: Point,
    pub size: Size,
    pub name: String,
    /// Degrees. ±360 is kept as-is and treated as neutral.
    pub rotation: f64,
    /// Horizontal flip offset; `None` means the node cannot flip this way.
    pub flip_horizontal: Option<f64>,
    /// Vertical flip offset; `None` means the node cannot flip this way.
    pub flip_vertical: Option<f64>,
    pub flip_horizontal_enabled: bool,
    pub flip_vertical_enabled: bool,
    /// Rotation pivot in local coordinates, when the artwork declares one
    /// (`rotate(a, cx, cy)`). Otherwise the node centre.
    pub pivot: Option<Point>,
}

impl Node {
    pub fn new(id: ElementId, kind: NodeKind, position: Point, size: Size, name: &str) -> Self {
        Self {
            id,
            kind,
            position,
            size,
            name: name.to_string(),
            rotation: 0.0,
            flip_horizontal: None,
            flip_vertical: None,
            flip_horizontal_enabled: false,
            flip_vertical_enabled: false,
            pivot: None,
        }
    }

    /// Local centre.
    pub fn center(&self) -> Point {
        Point::new(self.size.width / 2.0, self.size.height / 2.0)
    }

    /// The point body and ports rotate about.
    pub fn pivot(&self) -> Point {
        self.pivot.unwrap_or_else(|| self.center())
    }

    /// Bounding box in the parent's frame (unrotated).
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    /// The flip offset in effect on each axis, if that flip is both
    /// supported and enabled.
    pub fn active_flips(&self) -> (Option<f64>, Option<f64>) {
        (
            self.flip_horizontal.filter(|_| self.flip_horizontal_enabled),
            self.flip_vertical.filter(|_| self.flip_vertical_enabled),
        )
    }

    pub fn transform_state(&self) -> TransformState {
        let rotated = !geometry::is_neutral_rotation(self.rotation);
        let flipped = !matches!(self.active_flips(), (None, None));
        match (rotated, flipped) {
            (false, false) => TransformState::Identity,
            (true, false) => TransformState::Rotated,
            (false, true) => TransformState::Flipped,
            (true, true) => TransformState::RotatedFlipped,
        }
    }

    pub fn has_valid_size(&self) -> bool {
        self.size.width > 0.0
            && self.size.height > 0.0
            && self.size.width.is_finite()
            && self.size.height.is_finite()
    }
}

// ─── Edges ───────────────────────────────────────────────────────────────

/// A directed connection between two ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: ElementId,
    pub source_id: ElementId,
    pub target_id: ElementId,
}

impl Edge {
    pub fn involves_port(&self, port: ElementId) -> bool {
        self.source_id == port || self.target_id == port
    }
}

/// Host-facing view of an `add_edge` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<ElementId>,
}

impl EdgeOutcome {
    pub fn from_result(
        source: ElementId,
        target: ElementId,
        result: &Result<ElementId, EdgeError>,
    ) -> Self {
        match result {
            Ok(id) => Self {
                success: true,
                message: format!("Connected {source} to {target}"),
                edge_id: Some(*id),
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
                edge_id: None,
            },
        }
    }
}

// ─── Tree elements ───────────────────────────────────────────────────────

/// An element of the containment tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Root,
    Node(Node),
    Port(Port),
}

impl Element {
    pub fn id(&self) -> Option<ElementId> {
        match self {
            Element::Root => None,
            Element::Node(n) => Some(n.id),
            Element::Port(p) => Some(p.id),
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Element::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut Node> {
        match self {
            Element::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_port(&self) -> Option<&Port> {
        match self {
            Element::Port(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_port_mut(&mut self) -> Option<&mut Port> {
        match self {
            Element::Port(p) => Some(p),
            _ => None,
        }
    }
}

/// A detached node subtree, ready to be inserted into a `FlowGraph`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTemplate {
    pub node: Node,
    pub ports: Vec<Port>,
    /// Child nodes; only valid for package nodes.
    pub children: Vec<NodeTemplate>,
}

impl NodeTemplate {
    pub fn port(&self, id: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.id.as_str() == id)
    }
}

// ─── Graph ───────────────────────────────────────────────────────────────

/// The authoritative diagram model.
///
/// All mutation goes through `&mut self` methods; readers get `&FlowGraph`.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    /// Stable identifier of the diagram.
    pub id: ElementId,

    tree: StableDiGraph<Element, ()>,
    root: NodeIndex,

    /// Id → tree index for nodes and ports.
    id_index: HashMap<ElementId, NodeIndex>,

    /// Children of each tree element in insertion (z) order.
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,

    edges: Vec<Edge>,

    /// Highest edge number handed out (or found on load).
    edge_counter: u64,

    config: GraphConfig,
}

impl FlowGraph {
    /// Create an empty diagram.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self::with_config(id, GraphConfig::default())
    }

    #[must_use]
    pub fn with_config(id: &str, config: GraphConfig) -> Self {
        let mut tree = StableDiGraph::new();
        let root = tree.add_node(Element::Root);
        Self {
            id: ElementId::intern(id),
            tree,
            root,
            id_index: HashMap::new(),
            child_order: HashMap::new(),
            edges: Vec::new(),
            edge_counter: 0,
            config,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: GraphConfig) {
        self.config = config;
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn element(&self, idx: NodeIndex) -> Option<&Element> {
        self.tree.node_weight(idx)
    }

    pub fn index_of(&self, id: ElementId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.id_index.contains_key(&id)
    }

    pub fn node(&self, id: ElementId) -> Option<&Node> {
        self.index_of(id).and_then(|idx| self.tree[idx].as_node())
    }

    pub fn port(&self, id: ElementId) -> Option<&Port> {
        self.index_of(id).and_then(|idx| self.tree[idx].as_port())
    }

    pub(crate) fn node_mut(&mut self, id: ElementId) -> Option<&mut Node> {
        let idx = self.index_of(id)?;
        self.tree[idx].as_node_mut()
    }

    /// Children of a tree element in z-order.
    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.child_order.get(&idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parent of a tree element (`None` for the root).
    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.tree
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .next()
    }

    /// Tree indices of the ports owned by the element at `idx`, in order.
    pub fn port_indices(&self, idx: NodeIndex) -> SmallVec<[NodeIndex; 8]> {
        self.children(idx)
            .iter()
            .copied()
            .filter(|&c| matches!(self.tree[c], Element::Port(_)))
            .collect()
    }

    /// Ports owned by node `id`, in order. Empty if the node is unknown.
    pub fn ports_of(&self, id: ElementId) -> Vec<&Port> {
        let Some(idx) = self.index_of(id) else {
            return Vec::new();
        };
        self.port_indices(idx)
            .into_iter()
            .filter_map(|c| self.tree[c].as_port())
            .collect()
    }

    /// Tree indices of the nodes directly under `idx`, in order.
    pub fn node_children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.children(idx)
            .iter()
            .copied()
            .filter(|&c| matches!(self.tree[c], Element::Node(_)))
            .collect()
    }

    /// Every node in the tree, depth-first in z-order.
    pub fn nodes(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeIndex> = self.node_children(self.root).into_iter().rev().collect();
        while let Some(idx) = stack.pop() {
            if let Element::Node(node) = &self.tree[idx] {
                out.push(node);
                stack.extend(self.node_children(idx).into_iter().rev());
            }
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.id_index
            .values()
            .filter(|&&idx| matches!(self.tree[idx], Element::Node(_)))
            .count()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, id: ElementId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// The numeric part of the most recently allocated edge id.
    pub fn edge_counter(&self) -> u64 {
        self.edge_counter
    }

    /// The node that owns port `port_id`, resolved through the tree.
    pub fn owner_of_port(&self, port_id: ElementId) -> Option<ElementId> {
        let idx = self.index_of(port_id)?;
        if !matches!(self.tree[idx], Element::Port(_)) {
            return None;
        }
        self.parent(idx).and_then(|p| self.tree[p].id())
    }

    /// Ancestor nodes of `idx`, nearest first, stopping before the root.
    pub fn ancestors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut current = idx;
        while let Some(parent) = self.parent(current) {
            if parent == self.root {
                break;
            }
            out.push(parent);
            current = parent;
        }
        out
    }

    // ─── Insertion ───────────────────────────────────────────────────────

    /// Insert a node subtree at the top level.
    pub fn add_node(&mut self, template: NodeTemplate) -> Result<ElementId, ModelError> {
        self.insert(None, template)
    }

    /// Insert a node subtree under `parent` (a package node), or at the top
    /// level when `parent` is `None`.
    ///
    /// The whole subtree is validated before anything is attached, so a
    /// rejected template leaves the graph unchanged.
    pub fn insert(
        &mut self,
        parent: Option<ElementId>,
        template: NodeTemplate,
    ) -> Result<ElementId, ModelError> {
        let parent_idx = match parent {
            None => self.root,
            Some(pid) => match self.index_of(pid) {
                Some(idx) if self.tree[idx].as_node().is_some_and(|n| n.kind.is_container()) => {
                    idx
                }
                _ => return Err(ModelError::InvalidParent(pid)),
            },
        };

        let mut seen = HashSet::new();
        self.check_template(&template, &mut seen)?;

        let id = template.node.id;
        self.attach(parent_idx, template);
        log::debug!("inserted node {id}");
        Ok(id)
    }

    fn check_template(
        &self,
        template: &NodeTemplate,
        seen: &mut HashSet<ElementId>,
    ) -> Result<(), ModelError> {
        let node = &template.node;
        if !node.has_valid_size() {
            return Err(ModelError::InvalidSize {
                id: node.id,
                width: node.size.width,
                height: node.size.height,
            });
        }
        if !template.children.is_empty() && !node.kind.is_container() {
            return Err(ModelError::InvalidParent(node.id));
        }
        let ids = std::iter::once(node.id).chain(template.ports.iter().map(|p| p.id));
        for id in ids {
            if self.contains(id) || !seen.insert(id) {
                return Err(ModelError::DuplicateId(id));
            }
        }
        for child in &template.children {
            self.check_template(child, seen)?;
        }
        Ok(())
    }

    fn attach(&mut self, parent: NodeIndex, template: NodeTemplate) -> NodeIndex {
        let NodeTemplate {
            node,
            ports,
            children,
        } = template;
        let idx = self.push_element(parent, Element::Node(node));
        for port in ports {
            self.push_element(idx, Element::Port(port));
        }
        for child in children {
            self.attach(idx, child);
        }
        idx
    }

    fn push_element(&mut self, parent: NodeIndex, element: Element) -> NodeIndex {
        let id = element.id();
        let idx = self.tree.add_node(element);
        self.tree.add_edge(parent, idx, ());
        if let Some(id) = id {
            self.id_index.insert(id, idx);
        }
        self.child_order.entry(parent).or_default().push(idx);
        idx
    }

    /// Rebuild a template from the subtree rooted at `idx`.
    pub fn template_of(&self, idx: NodeIndex) -> Option<NodeTemplate> {
        let node = self.tree.node_weight(idx)?.as_node()?.clone();
        let ports = self
            .port_indices(idx)
            .into_iter()
            .filter_map(|c| self.tree[c].as_port().cloned())
            .collect();
        let children = self
            .node_children(idx)
            .into_iter()
            .filter_map(|c| self.template_of(c))
            .collect();
        Some(NodeTemplate {
            node,
            ports,
            children,
        })
    }

    // ─── Removal ─────────────────────────────────────────────────────────

    /// Remove a node with its ports and descendants. Returns `false` if the
    /// id is not a node.
    ///
    /// Edges touching the removed ports are only dropped when
    /// `GraphConfig::cascade_edge_delete` is set.
    pub fn remove_node(&mut self, id: ElementId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        if !matches!(self.tree[idx], Element::Node(_)) {
            return false;
        }

        if let Some(parent) = self.parent(idx)
            && let Some(siblings) = self.child_order.get_mut(&parent)
        {
            siblings.retain(|&s| s != idx);
        }

        let mut removed_ports = HashSet::new();
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            if let Some(children) = self.child_order.remove(&current) {
                stack.extend(children);
            }
            if let Some(element) = self.tree.remove_node(current) {
                if let Some(eid) = element.id() {
                    self.id_index.remove(&eid);
                }
                if let Element::Port(port) = element {
                    removed_ports.insert(port.id);
                }
            }
        }

        if self.config.cascade_edge_delete {
            let before = self.edges.len();
            self.edges.retain(|e| {
                !removed_ports.contains(&e.source_id) && !removed_ports.contains(&e.target_id)
            });
            log::debug!(
                "removed node {id} and {} attached edge(s)",
                before - self.edges.len()
            );
        } else {
            log::debug!("removed node {id}");
        }
        true
    }

    /// Remove an edge by id. Returns `false` if no such edge exists.
    pub fn remove_edge(&mut self, id: ElementId) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != id);
        self.edges.len() != before
    }

    // ─── Mutation ────────────────────────────────────────────────────────

    /// Move a node (top-level or nested at any depth) to `(x, y)` in its
    /// parent's frame. Unknown ids are ignored.
    pub fn update_node_position(&mut self, id: ElementId, x: f64, y: f64) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.position = Point::new(x, y);
                true
            }
            None => {
                log::trace!("update_node_position: no node {id}");
                false
            }
        }
    }

    /// Resize a node and re-derive every port position from its side and
    /// its current ordinal on that side. Unknown ids are ignored.
    pub fn update_node_size(&mut self, id: ElementId, width: f64, height: f64) -> bool {
        let Some(idx) = self.index_of(id) else {
            log::trace!("update_node_size: no node {id}");
            return false;
        };
        let size = Size::new(width, height);
        match self.tree[idx].as_node_mut() {
            Some(node) => {
                if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
                    log::warn!("ignoring non-positive size {width}x{height} for node {id}");
                    return false;
                }
                node.size = size;
            }
            None => return false,
        }
        self.relayout_ports(idx);
        true
    }

    /// Place every sided port of the node at `idx` from scratch, then
    /// re-apply the node's rotation/flip on top of the new baseline.
    pub(crate) fn relayout_ports(&mut self, idx: NodeIndex) {
        let Some(size) = self.tree[idx].as_node().map(|n| n.size) else {
            return;
        };
        let ports = self.port_indices(idx);
        for side in Side::ALL {
            let on_side: SmallVec<[NodeIndex; 8]> = ports
                .iter()
                .copied()
                .filter(|&p| self.tree[p].as_port().is_some_and(|p| p.side == Some(side)))
                .collect();
            let total = on_side.len();
            for (ordinal, &p) in on_side.iter().enumerate() {
                if let Some(port) = self.tree[p].as_port_mut() {
                    port.position = geometry::port_position_for_side(side, ordinal, total, size);
                    port.original_position = None;
                }
            }
        }
        self.apply_port_transforms(idx);
    }

    /// Overwrite the port positions of the node at `idx` (and forget their
    /// cached baselines). Used when ports are regenerated from a source.
    pub(crate) fn replace_port_positions(&mut self, idx: NodeIndex, positions: &HashMap<ElementId, Point>) {
        for p in self.port_indices(idx) {
            if let Some(port) = self.tree[p].as_port_mut()
                && let Some(&pos) = positions.get(&port.id)
            {
                port.position = pos;
                port.original_position = None;
            }
        }
    }

    pub(crate) fn port_mut_at(&mut self, idx: NodeIndex) -> Option<&mut Port> {
        self.tree.node_weight_mut(idx).and_then(Element::as_port_mut)
    }

    // ─── Edges ───────────────────────────────────────────────────────────

    /// Connect two ports.
    ///
    /// Rejects unknown ports, ports owned by the same node (whatever their
    /// direction), and an exact duplicate of an existing (source, target)
    /// pair. On success the next `edge-<n>` id is allocated.
    pub fn add_edge(&mut self, source: ElementId, target: ElementId) -> Result<ElementId, EdgeError> {
        let source_owner = self
            .owner_of_port(source)
            .ok_or(EdgeError::UnknownPort(source))?;
        let target_owner = self
            .owner_of_port(target)
            .ok_or(EdgeError::UnknownPort(target))?;
        if source_owner == target_owner {
            return Err(EdgeError::SelfLoop { node: source_owner });
        }
        if self
            .edges
            .iter()
            .any(|e| e.source_id == source && e.target_id == target)
        {
            return Err(EdgeError::Duplicate {
                source_id: source,
                target_id: target,
            });
        }

        let id = self.next_edge_id();
        self.edges.push(Edge {
            id,
            source_id: source,
            target_id: target,
        });
        log::debug!("added {id}: {source} -> {target}");
        Ok(id)
    }

    /// `add_edge`, reported as `{ success, message }` for hosts.
    pub fn connect(&mut self, source: ElementId, target: ElementId) -> EdgeOutcome {
        let result = self.add_edge(source, target);
        EdgeOutcome::from_result(source, target, &result)
    }

    /// Raise the edge counter to at least `counter`, so no id up to
    /// `edge-<counter>` is allocated again.
    pub fn reserve_edge_ids(&mut self, counter: u64) {
        self.edge_counter = self.edge_counter.max(counter);
    }

    fn next_edge_id(&mut self) -> ElementId {
        loop {
            self.edge_counter += 1;
            let id = ElementId::intern(&format!("edge-{}", self.edge_counter));
            if self.edge(id).is_none() {
                return id;
            }
        }
    }

    /// Append an already-identified edge without validation (bulk load).
    /// Append an edge from a document being loaded.
    ///
    /// Endpoints are not required to exist, so edges left dangling by a
    /// non-cascading delete survive a save and reload. Repeated ids,
    /// repeated pairs and edges within one node are refused.
    pub(crate) fn push_loaded_edge(&mut self, edge: Edge) -> Result<(), LoadError> {
        if self.edges.iter().any(|e| e.id == edge.id) {
            return Err(LoadError::DuplicateEdgeId(edge.id));
        }
        let repeated = self
            .edges
            .iter()
            .any(|e| e.source_id == edge.source_id && e.target_id == edge.target_id);
        let reason = if repeated {
            Some(EdgeError::Duplicate {
                source_id: edge.source_id,
                target_id: edge.target_id,
            })
        } else {
            match (self.owner_of_port(edge.source_id), self.owner_of_port(edge.target_id)) {
                (Some(a), Some(b)) if a == b => Some(EdgeError::SelfLoop { node: a }),
                _ => None,
            }
        };
        if let Some(reason) = reason {
            return Err(LoadError::InvalidEdge { id: edge.id, reason });
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Reset the edge counter to the highest `edge-<n>` suffix present.
    pub(crate) fn recompute_edge_counter(&mut self) {
        self.edge_counter = self
            .edges
            .iter()
            .filter_map(|e| e.id.numeric_suffix())
            .max()
            .unwrap_or(0);
    }
}

impl Default for FlowGraph {
    fn default() -> Self {
        Self::new("graph")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{NodeSpec, PortSpec, create_node, create_node_with_ports, create_package_node};

    fn id(s: &str) -> ElementId {
        ElementId::intern(s)
    }

    fn io_node(name: &str, x: f64) -> NodeTemplate {
        create_node(&NodeSpec::new(name, x, 0.0).with_io(true, true))
    }

    #[test]
    fn insert_indexes_nodes_and_ports() {
        let mut g = FlowGraph::new("g");
        g.add_node(io_node("a", 0.0)).unwrap();

        assert!(g.node(id("a")).is_some());
        assert!(g.port(id("a-in")).is_some());
        assert_eq!(g.owner_of_port(id("a-out")), Some(id("a")));
        assert_eq!(g.ports_of(id("a")).len(), 2);
    }

    #[test]
    fn duplicate_ids_are_rejected_atomically() {
        let mut g = FlowGraph::new("g");
        g.add_node(io_node("dup", 0.0)).unwrap();
        let err = g.add_node(io_node("dup", 50.0)).unwrap_err();
        assert_eq!(err, ModelError::DuplicateId(id("dup")));
        assert_eq!(g.node(id("dup")).unwrap().position.x, 0.0);
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn non_positive_size_is_rejected() {
        let spec = NodeSpec::new("flat", 0.0, 0.0).with_size(120.0, 0.0);
        let mut g = FlowGraph::new("g");
        assert!(matches!(
            g.add_node(create_node(&spec)),
            Err(ModelError::InvalidSize { .. })
        ));
    }

    #[test]
    fn nested_position_update_reaches_package_children() {
        let mut g = FlowGraph::new("g");
        let pkg = create_package_node(
            &NodeSpec::new("pkg", 300.0, 300.0),
            vec![io_node("inner", 10.0)],
        );
        g.add_node(pkg).unwrap();
        g.add_node(io_node("outer", 0.0)).unwrap();

        assert!(g.update_node_position(id("inner"), 42.0, 24.0));
        assert_eq!(g.node(id("inner")).unwrap().position, Point::new(42.0, 24.0));
        assert_eq!(g.node(id("outer")).unwrap().position, Point::new(0.0, 0.0));
        assert_eq!(g.node(id("pkg")).unwrap().position, Point::new(300.0, 300.0));
    }

    #[test]
    fn missing_ids_are_silent_no_ops() {
        let mut g = FlowGraph::new("g");
        assert!(!g.update_node_position(id("ghost"), 1.0, 1.0));
        assert!(!g.update_node_size(id("ghost"), 10.0, 10.0));
        assert!(!g.remove_node(id("ghost")));
    }

    #[test]
    fn resize_redistributes_ports() {
        let spec = NodeSpec::new("n", 0.0, 0.0).with_ports(vec![
            PortSpec::new(PortDirection::Input, Side::Left),
            PortSpec::new(PortDirection::Input, Side::Left),
            PortSpec::new(PortDirection::Output, Side::Right),
        ]);
        let mut g = FlowGraph::new("g");
        g.add_node(create_node_with_ports(&spec)).unwrap();

        assert!(g.update_node_size(id("n"), 200.0, 100.0));
        let ports = g.ports_of(id("n"));
        assert_eq!(ports[0].position, Point::new(-8.0, 0.0));
        assert_eq!(ports[1].position, Point::new(-8.0, 84.0));
        assert_eq!(ports[2].position, Point::new(192.0, 42.0));
    }

    #[test]
    fn unsided_ports_are_left_alone_on_resize() {
        let mut template = io_node("u", 0.0);
        template.ports[0].side = None;
        template.ports[0].position = Point::new(3.0, 4.0);
        let mut g = FlowGraph::new("g");
        g.add_node(template).unwrap();

        g.update_node_size(id("u"), 300.0, 300.0);
        assert_eq!(g.port(id("u-in")).unwrap().position, Point::new(3.0, 4.0));
        assert_eq!(g.port(id("u-out")).unwrap().position, Point::new(292.0, 142.0));
    }

    #[test]
    fn add_edge_rejects_self_loop_and_duplicates() {
        let mut g = FlowGraph::new("g");
        g.add_node(io_node("a", 0.0)).unwrap();
        g.add_node(io_node("b", 200.0)).unwrap();

        assert_eq!(
            g.add_edge(id("a-out"), id("a-in")),
            Err(EdgeError::SelfLoop { node: id("a") })
        );
        assert_eq!(g.add_edge(id("a-out"), id("b-in")), Ok(id("edge-1")));
        assert!(matches!(
            g.add_edge(id("a-out"), id("b-in")),
            Err(EdgeError::Duplicate { .. })
        ));
        assert_eq!(g.edges().len(), 1);

        // Direction is not the model's concern.
        assert_eq!(g.add_edge(id("b-in"), id("a-in")), Ok(id("edge-2")));
    }

    #[test]
    fn unknown_ports_are_rejected() {
        let mut g = FlowGraph::new("g");
        g.add_node(io_node("a", 0.0)).unwrap();
        assert_eq!(
            g.add_edge(id("a-out"), id("nowhere-in")),
            Err(EdgeError::UnknownPort(id("nowhere-in")))
        );
        // A node id is not a port id.
        assert_eq!(
            g.add_edge(id("a"), id("a-in")),
            Err(EdgeError::UnknownPort(id("a")))
        );
    }

    #[test]
    fn connect_reports_messages() {
        let mut g = FlowGraph::new("g");
        g.add_node(io_node("a", 0.0)).unwrap();
        g.add_node(io_node("b", 200.0)).unwrap();

        let ok = g.connect(id("a-out"), id("b-in"));
        assert!(ok.success);
        assert_eq!(ok.edge_id, Some(id("edge-1")));

        let dup = g.connect(id("a-out"), id("b-in"));
        assert!(!dup.success);
        assert!(dup.message.contains("already exists"), "{}", dup.message);
    }

    #[test]
    fn remove_node_keeps_edges_by_default() {
        let mut g = FlowGraph::new("g");
        g.add_node(io_node("a", 0.0)).unwrap();
        g.add_node(io_node("b", 200.0)).unwrap();
        g.add_edge(id("a-out"), id("b-in")).unwrap();

        assert!(g.remove_node(id("b")));
        assert!(g.port(id("b-in")).is_none());
        assert_eq!(g.edges().len(), 1);
    }

    #[test]
    fn remove_node_cascades_when_configured() {
        let config = GraphConfig {
            cascade_edge_delete: true,
            ..GraphConfig::default()
        };
        let mut g = FlowGraph::with_config("g", config);
        g.add_node(io_node("a", 0.0)).unwrap();
        g.add_node(io_node("b", 200.0)).unwrap();
        g.add_node(io_node("c", 400.0)).unwrap();
        g.add_edge(id("a-out"), id("b-in")).unwrap();
        g.add_edge(id("b-out"), id("c-in")).unwrap();
        g.add_edge(id("a-out"), id("c-in")).unwrap();

        g.remove_node(id("b"));
        assert_eq!(g.edges().len(), 1);
        assert_eq!(g.edges()[0].id, id("edge-3"));
    }

    #[test]
    fn removing_a_package_drops_its_subtree() {
        let mut g = FlowGraph::new("g");
        let pkg = create_package_node(
            &NodeSpec::new("box", 0.0, 0.0),
            vec![io_node("box_a", 0.0), io_node("box_b", 100.0)],
        );
        g.add_node(pkg).unwrap();
        assert_eq!(g.node_count(), 3);

        g.remove_node(id("box"));
        assert_eq!(g.node_count(), 0);
        assert!(g.port(id("box_a-in")).is_none());
        assert!(g.children(g.root()).is_empty());
    }

    #[test]
    fn insert_into_non_container_is_rejected() {
        let mut g = FlowGraph::new("g");
        g.add_node(io_node("plain", 0.0)).unwrap();
        assert_eq!(
            g.insert(Some(id("plain")), io_node("child", 0.0)),
            Err(ModelError::InvalidParent(id("plain")))
        );
    }

    #[test]
    fn nodes_iterates_in_z_order_depth_first() {
        let mut g = FlowGraph::new("g");
        g.add_node(io_node("first", 0.0)).unwrap();
        g.add_node(create_package_node(
            &NodeSpec::new("group", 0.0, 0.0),
            vec![io_node("nested", 0.0)],
        ))
        .unwrap();
        g.add_node(io_node("last", 0.0)).unwrap();

        let order: Vec<&str> = g.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["first", "group", "nested", "last"]);
    }

    #[test]
    fn ancestors_stop_at_root() {
        let mut g = FlowGraph::new("g");
        let inner = create_package_node(&NodeSpec::new("mid", 0.0, 0.0), vec![io_node("leaf", 0.0)]);
        g.add_node(create_package_node(&NodeSpec::new("top", 0.0, 0.0), vec![inner]))
            .unwrap();

        let leaf = g.index_of(id("leaf")).unwrap();
        let names: Vec<ElementId> = g
            .ancestors(leaf)
            .into_iter()
            .filter_map(|i| g.element(i).and_then(Element::id))
            .collect();
        assert_eq!(names, vec![id("mid"), id("top")]);
    }
}

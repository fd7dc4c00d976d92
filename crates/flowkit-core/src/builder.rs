//! Node construction from declarative specs.
//!
//! Builders are pure: the same spec always yields the same template. Port
//! ids come from the node id plus either the caller's suffix or the
//! port's side, direction, and ordinal on that side.

use crate::geometry;
use crate::id::ElementId;
use crate::model::*;
use crate::transform::TransformParams;
use kurbo::{Point, Size};
use serde::Deserialize;
use std::collections::HashMap;

/// Default node footprint.
pub const DEFAULT_NODE_WIDTH: f64 = 120.0;
pub const DEFAULT_NODE_HEIGHT: f64 = 60.0;

fn default_width() -> f64 {
    DEFAULT_NODE_WIDTH
}

fn default_height() -> f64 {
    DEFAULT_NODE_HEIGHT
}

/// One port in a `NodeSpec`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    #[serde(rename = "portType")]
    pub direction: PortDirection,
    /// Defaults to left for inputs and right for outputs.
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub shape: PortShape,
    /// Id suffix; the full id becomes `<nodeId>-<id>`.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// Placement slot on the side, overriding the declaration ordinal.
    /// Must be below the number of ports on that side.
    #[serde(default)]
    pub index: Option<usize>,
}

impl PortSpec {
    pub fn new(direction: PortDirection, side: Side) -> Self {
        Self {
            direction,
            side: Some(side),
            shape: PortShape::default(),
            id: None,
            label: None,
            index: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_shape(mut self, shape: PortShape) -> Self {
        self.shape = shape;
        self
    }

    fn resolved_side(&self) -> Side {
        self.side.unwrap_or_else(|| self.direction.default_side())
    }
}

/// Everything needed to build a node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    /// Display name; the id is used when absent.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub flip_horizontal: Option<f64>,
    #[serde(default)]
    pub flip_vertical: Option<f64>,
    #[serde(default)]
    pub flip_horizontal_enabled: bool,
    #[serde(default)]
    pub flip_vertical_enabled: bool,
    /// `create_node` only: add a left input port `<id>-in`.
    #[serde(default)]
    pub input: bool,
    /// `create_node` only: add a right output port `<id>-out`.
    #[serde(default)]
    pub output: bool,
}

impl NodeSpec {
    pub fn new(id: &str, x: f64, y: f64) -> Self {
        Self {
            id: id.to_string(),
            x,
            y,
            width: DEFAULT_NODE_WIDTH,
            height: DEFAULT_NODE_HEIGHT,
            name: None,
            ports: Vec::new(),
            rotation: 0.0,
            flip_horizontal: None,
            flip_vertical: None,
            flip_horizontal_enabled: false,
            flip_vertical_enabled: false,
            input: false,
            output: false,
        }
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_ports(mut self, ports: Vec<PortSpec>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_io(mut self, input: bool, output: bool) -> Self {
        self.input = input;
        self.output = output;
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_flips(mut self, horizontal: Option<f64>, vertical: Option<f64>) -> Self {
        self.flip_horizontal = horizontal;
        self.flip_vertical = vertical;
        self
    }

    fn to_node(&self, kind: NodeKind) -> Node {
        let id = ElementId::intern(&self.id);
        let name = self.name.as_deref().unwrap_or(&self.id);
        let mut node = Node::new(
            id,
            kind,
            Point::new(self.x, self.y),
            Size::new(self.width, self.height),
            name,
        );
        node.rotation = self.rotation;
        node.flip_horizontal = self.flip_horizontal;
        node.flip_vertical = self.flip_vertical;
        node.flip_horizontal_enabled = self.flip_horizontal_enabled;
        node.flip_vertical_enabled = self.flip_vertical_enabled;
        node
    }
}

/// Build a process node with the spec's port list.
///
/// Ports are grouped by side and distributed along it; a spec `index`
/// overrides the slot. Default ids are
/// `<nodeId>-<side>-<direction>-<ordinalWithinSide>`.
pub fn create_node_with_ports(spec: &NodeSpec) -> NodeTemplate {
    let node = spec.to_node(NodeKind::Process);
    let ports = place_ports(&node, &spec.ports);
    finish(node, ports, Vec::new())
}

/// Build a process node with at most one input (`<id>-in`, left) and one
/// output (`<id>-out`, right).
pub fn create_node(spec: &NodeSpec) -> NodeTemplate {
    let mut ports = Vec::with_capacity(2);
    if spec.input {
        ports.push(PortSpec::new(PortDirection::Input, Side::Left).with_id("in"));
    }
    if spec.output {
        ports.push(PortSpec::new(PortDirection::Output, Side::Right).with_id("out"));
    }
    let node = spec.to_node(NodeKind::Process);
    let ports = place_ports(&node, &ports);
    finish(node, ports, Vec::new())
}

/// Wrap `children` in a package node. Children keep their own local
/// positions.
pub fn create_package_node(spec: &NodeSpec, children: Vec<NodeTemplate>) -> NodeTemplate {
    let node = spec.to_node(NodeKind::Package);
    let ports = place_ports(&node, &spec.ports);
    finish(node, ports, children)
}

/// A package pre-populated with two connected-ready example steps.
pub fn example_package(id: &str, x: f64, y: f64) -> NodeTemplate {
    let step = |suffix: &str, name: &str, cx: f64| {
        create_node(
            &NodeSpec::new(&format!("{id}-{suffix}"), cx, 60.0)
                .with_name(name)
                .with_io(true, true),
        )
    };
    create_package_node(
        &NodeSpec::new(id, x, y).with_size(320.0, 180.0).with_name("Package"),
        vec![step("a", "Step A", 20.0), step("b", "Step B", 180.0)],
    )
}

fn place_ports(node: &Node, specs: &[PortSpec]) -> Vec<Port> {
    let mut totals: HashMap<Side, usize> = HashMap::new();
    for spec in specs {
        *totals.entry(spec.resolved_side()).or_default() += 1;
    }

    let mut ordinals: HashMap<Side, usize> = HashMap::new();
    specs
        .iter()
        .map(|spec| {
            let side = spec.resolved_side();
            let ordinal = ordinals.entry(side).or_default();
            let slot = spec.index.unwrap_or(*ordinal);
            let id = match &spec.id {
                Some(suffix) => node.id.child(suffix),
                None => node.id.child(&format!(
                    "{}-{}-{}",
                    side.as_str(),
                    spec.direction.as_str(),
                    ordinal
                )),
            };
            *ordinal += 1;

            let mut port = Port::new(id, spec.direction, side);
            port.shape = spec.shape;
            port.label = spec.label.clone();
            port.position = geometry::port_position_for_side(side, slot, totals[&side], node.size);
            port
        })
        .collect()
}

fn finish(node: Node, mut ports: Vec<Port>, children: Vec<NodeTemplate>) -> NodeTemplate {
    if node.transform_state() != TransformState::Identity {
        let params = TransformParams::of(&node);
        for port in &mut ports {
            params.apply(port);
        }
    }
    NodeTemplate {
        node,
        ports,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_ids_and_centred_io() {
        let spec = NodeSpec::new("proc", 100.0, 100.0).with_ports(vec![
            PortSpec::new(PortDirection::Input, Side::Left),
            PortSpec::new(PortDirection::Output, Side::Right),
        ]);
        let t = create_node_with_ports(&spec);

        assert_eq!(t.node.position, Point::new(100.0, 100.0));
        let left = t.port("proc-left-input-0").expect("left port");
        let right = t.port("proc-right-output-0").expect("right port");
        assert_eq!(left.position, Point::new(-8.0, 22.0));
        assert_eq!(right.position, Point::new(112.0, 22.0));
    }

    #[test]
    fn three_left_inputs_are_spread_edge_to_edge() {
        let spec = NodeSpec::new("tri", 0.0, 0.0).with_ports(vec![
            PortSpec::new(PortDirection::Input, Side::Left),
            PortSpec::new(PortDirection::Input, Side::Left),
            PortSpec::new(PortDirection::Input, Side::Left),
        ]);
        let t = create_node_with_ports(&spec);
        let ys: Vec<f64> = t.ports.iter().map(|p| p.position.y).collect();
        assert_eq!(ys, vec![0.0, 22.0, 44.0]);
        assert_eq!(t.ports[2].id.as_str(), "tri-left-input-2");
    }

    #[test]
    fn ordinals_are_per_side() {
        let spec = NodeSpec::new("mix", 0.0, 0.0).with_ports(vec![
            PortSpec::new(PortDirection::Input, Side::Left),
            PortSpec::new(PortDirection::Output, Side::Right),
            PortSpec::new(PortDirection::Input, Side::Left),
        ]);
        let t = create_node_with_ports(&spec);
        let ids: Vec<&str> = t.ports.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["mix-left-input-0", "mix-right-output-0", "mix-left-input-1"]
        );
        // The lone right port is centred even though it was declared second.
        assert_eq!(t.ports[1].position.y, 22.0);
    }

    #[test]
    fn explicit_suffix_label_and_index() {
        let mut first = PortSpec::new(PortDirection::Input, Side::Top)
            .with_id("clk")
            .with_label("Clock");
        first.index = Some(1);
        let mut second = PortSpec::new(PortDirection::Input, Side::Top);
        second.index = Some(0);
        let t = create_node_with_ports(&NodeSpec::new("reg", 0.0, 0.0).with_ports(vec![first, second]));

        let clk = t.port("reg-clk").unwrap();
        assert_eq!(clk.label.as_deref(), Some("Clock"));
        assert_eq!(clk.position, Point::new(104.0, -8.0));
        assert_eq!(t.ports[1].position, Point::new(0.0, -8.0));
    }

    #[test]
    fn creation_is_deterministic() {
        let spec = NodeSpec::new("same", 5.0, 5.0).with_io(true, true);
        assert_eq!(create_node(&spec), create_node(&spec));
    }

    #[test]
    fn create_node_uses_in_out_suffixes() {
        let t = create_node(&NodeSpec::new("src", 0.0, 0.0).with_io(false, true));
        assert_eq!(t.ports.len(), 1);
        assert_eq!(t.ports[0].id.as_str(), "src-out");
        assert_eq!(t.ports[0].direction, PortDirection::Output);
        assert_eq!(t.ports[0].side, Some(Side::Right));
    }

    #[test]
    fn rotated_spec_places_rotated_ports_and_caches_baseline() {
        let t = create_node(&NodeSpec::new("rot", 0.0, 0.0).with_io(true, false).with_rotation(180.0));
        let port = &t.ports[0];
        assert_eq!(port.original_position, Some(Point::new(-8.0, 22.0)));
        assert!((port.position.x - 112.0).abs() < 1e-9);
        assert!((port.position.y - 22.0).abs() < 1e-9);
    }

    #[test]
    fn package_keeps_child_positions() {
        let t = example_package("pkg", 400.0, 50.0);
        assert_eq!(t.node.kind, NodeKind::Package);
        assert_eq!(t.children.len(), 2);
        assert_eq!(t.children[0].node.position, Point::new(20.0, 60.0));
        assert_eq!(t.children[1].node.id.as_str(), "pkg-b");
    }

    #[test]
    fn spec_from_json() {
        let spec: NodeSpec = serde_json::from_str(
            r#"{"id":"j","x":10,"ports":[{"portType":"output","shape":"diamond"}]}"#,
        )
        .unwrap();
        let t = create_node_with_ports(&spec);
        assert_eq!(t.node.size, Size::new(120.0, 60.0));
        assert_eq!(t.ports[0].id.as_str(), "j-right-output-0");
        assert_eq!(t.ports[0].shape, PortShape::Diamond);
    }
}

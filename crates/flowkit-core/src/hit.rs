//! Hit testing: logical point → port or node.
//!
//! Walks the containment tree front-to-back (last child painted is
//! topmost). Within a node, ports win over child nodes, which win over the
//! node's own body, since ports overhang the body edge.

use crate::geometry::rotate_point;
use crate::id::ElementId;
use crate::model::{Element, FlowGraph, PortDirection};
use kurbo::{Point, Rect, Vec2};
use petgraph::graph::NodeIndex;

/// What lies under a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hit {
    Port {
        id: ElementId,
        owner: ElementId,
        direction: PortDirection,
        /// Logical centre of the port.
        center: Point,
    },
    Node {
        id: ElementId,
    },
}

impl Hit {
    pub fn id(&self) -> ElementId {
        match self {
            Hit::Port { id, .. } | Hit::Node { id } => *id,
        }
    }

    /// The id of the port hit, if it is an output.
    pub fn output_port(&self) -> Option<(ElementId, Point)> {
        match *self {
            Hit::Port {
                id,
                direction: PortDirection::Output,
                center,
                ..
            } => Some((id, center)),
            _ => None,
        }
    }

    /// The id of the port hit, if it is an input.
    pub fn input_port(&self) -> Option<ElementId> {
        match *self {
            Hit::Port {
                id,
                direction: PortDirection::Input,
                ..
            } => Some(id),
            _ => None,
        }
    }

    /// The node hit, or the owner of the port hit.
    pub fn node(&self) -> ElementId {
        match *self {
            Hit::Port { owner, .. } => owner,
            Hit::Node { id } => id,
        }
    }
}

/// Find the topmost element at a logical point. `None` is the background.
pub fn hit_test(graph: &FlowGraph, point: Point) -> Option<Hit> {
    hit_children(graph, graph.root(), Vec2::ZERO, point)
}

fn hit_children(graph: &FlowGraph, parent: NodeIndex, origin: Vec2, point: Point) -> Option<Hit> {
    graph
        .node_children(parent)
        .into_iter()
        .rev()
        .find_map(|child| hit_node(graph, child, origin, point))
}

fn hit_node(graph: &FlowGraph, idx: NodeIndex, parent_origin: Vec2, point: Point) -> Option<Hit> {
    let Some(Element::Node(node)) = graph.element(idx) else {
        return None;
    };
    let origin = parent_origin + node.position.to_vec2();
    let local = point - origin;

    for &p in graph.port_indices(idx).iter().rev() {
        if let Some(Element::Port(port)) = graph.element(p)
            && port.bounds().contains(local)
        {
            return Some(Hit::Port {
                id: port.id,
                owner: node.id,
                direction: port.direction,
                center: port.bounds().center() + origin,
            });
        }
    }

    if let Some(hit) = hit_children(graph, idx, origin, point) {
        return Some(hit);
    }

    // The body is drawn rotated about its pivot; undo that before testing.
    let c = node.pivot();
    let unrotated = rotate_point(local.x, local.y, c.x, c.y, -node.rotation);
    Rect::from_origin_size(Point::ZERO, node.size)
        .contains(unrotated)
        .then_some(Hit::Node { id: node.id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{NodeSpec, create_node, create_package_node};
    use crate::transform::RotateDirection;

    fn id(s: &str) -> ElementId {
        ElementId::intern(s)
    }

    fn two_nodes() -> FlowGraph {
        let mut g = FlowGraph::new("g");
        g.add_node(create_node(&NodeSpec::new("a", 0.0, 0.0).with_io(true, true)))
            .unwrap();
        g.add_node(create_node(&NodeSpec::new("b", 200.0, 0.0).with_io(true, true)))
            .unwrap();
        g
    }

    #[test]
    fn background_is_none() {
        assert_eq!(hit_test(&two_nodes(), Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn body_hit() {
        assert_eq!(
            hit_test(&two_nodes(), Point::new(60.0, 30.0)),
            Some(Hit::Node { id: id("a") })
        );
    }

    #[test]
    fn overhanging_port_is_hit_before_body() {
        let hit = hit_test(&two_nodes(), Point::new(121.0, 30.0)).unwrap();
        assert_eq!(hit.output_port(), Some((id("a-out"), Point::new(120.0, 30.0))));
        assert_eq!(hit.node(), id("a"));

        let hit = hit_test(&two_nodes(), Point::new(195.0, 30.0)).unwrap();
        assert_eq!(hit.input_port(), Some(id("b-in")));
    }

    #[test]
    fn later_siblings_are_on_top() {
        let mut g = FlowGraph::new("g");
        g.add_node(create_node(&NodeSpec::new("under", 0.0, 0.0))).unwrap();
        g.add_node(create_node(&NodeSpec::new("over", 50.0, 0.0))).unwrap();
        assert_eq!(hit_test(&g, Point::new(60.0, 10.0)).map(|h| h.id()), Some(id("over")));
        assert_eq!(hit_test(&g, Point::new(10.0, 10.0)).map(|h| h.id()), Some(id("under")));
    }

    #[test]
    fn package_children_use_composed_origins() {
        let mut g = FlowGraph::new("g");
        g.add_node(create_package_node(
            &NodeSpec::new("pkg", 100.0, 100.0).with_size(400.0, 300.0),
            vec![create_node(&NodeSpec::new("kid", 20.0, 20.0).with_io(true, false))],
        ))
        .unwrap();

        assert_eq!(hit_test(&g, Point::new(150.0, 150.0)).map(|h| h.id()), Some(id("kid")));
        assert_eq!(hit_test(&g, Point::new(450.0, 350.0)).map(|h| h.id()), Some(id("pkg")));
        let port = hit_test(&g, Point::new(120.0, 150.0)).unwrap();
        assert_eq!(port.input_port(), Some(id("kid-in")));
    }

    #[test]
    fn rotated_port_is_hit_where_it_was_moved() {
        let mut g = two_nodes();
        g.rotate_node(id("a"), RotateDirection::Right);
        // a-in now sits above the node: centre (60, -30).
        let hit = hit_test(&g, Point::new(60.0, -30.0)).unwrap();
        assert_eq!(hit.input_port(), Some(id("a-in")));
        assert_eq!(hit_test(&g, Point::new(1.0, 30.0)), None);
    }
}

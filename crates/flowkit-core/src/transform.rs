//! Rotate/flip pipeline that keeps port positions in step with the node
//! body.
//!
//! Every transition recomputes each port from its baseline: recover the
//! unrotated position (cached on first use), mirror it on each enabled
//! flip axis, then rotate it about the node's pivot (its centre unless
//! the artwork declared another). Flip happens before rotation, the same
//! order the renderer applies to the node body.

use crate::geometry::{self, flip_coordinate, rotated_port_position};
use crate::id::ElementId;
use crate::model::{FlowGraph, Node, Port};
use kurbo::Point;
use petgraph::graph::NodeIndex;

/// Quarter-turn direction for `rotate_node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateDirection {
    /// Counter-clockwise on screen (−90°).
    Left,
    /// Clockwise on screen (+90°).
    Right,
}

/// Axis for `toggle_flip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// The next stored rotation after a quarter turn.
///
/// ±360 is a legal resting value (neutral). Turning past it lands on ±90
/// rather than 0 or ±450.
pub fn next_rotation(current: f64, direction: RotateDirection) -> f64 {
    match direction {
        RotateDirection::Right => {
            let next = current + 90.0;
            if next > 360.0 { 90.0 } else { next }
        }
        RotateDirection::Left => {
            let next = current - 90.0;
            if next < -360.0 { -90.0 } else { next }
        }
    }
}

/// A node's transform, detached from the node so ports can be updated
/// while the graph is mutably borrowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub center: Point,
    pub rotation: f64,
    pub flip_x: Option<f64>,
    pub flip_y: Option<f64>,
}

impl TransformParams {
    pub fn of(node: &Node) -> Self {
        let (flip_x, flip_y) = node.active_flips();
        Self {
            center: node.pivot(),
            rotation: node.rotation,
            flip_x,
            flip_y,
        }
    }

    /// Where a port whose untransformed corner is `baseline` ends up.
    pub fn place(&self, baseline: Point, port_width: f64, port_height: f64) -> Point {
        let x = self
            .flip_x
            .map_or(baseline.x, |offset| flip_coordinate(baseline.x, port_width, offset));
        let y = self
            .flip_y
            .map_or(baseline.y, |offset| flip_coordinate(baseline.y, port_height, offset));
        rotated_port_position(
            x,
            y,
            port_width,
            port_height,
            self.rotation,
            self.center.x,
            self.center.y,
        )
    }

    /// Recompute `port` from its baseline, caching the baseline first.
    pub fn apply(&self, port: &mut Port) {
        let baseline = *port.original_position.get_or_insert(port.position);
        port.position = self.place(baseline, port.size.width, port.size.height);
    }
}

impl FlowGraph {
    /// Rotate a node a quarter turn. Unknown ids are ignored.
    pub fn rotate_node(&mut self, id: ElementId, direction: RotateDirection) -> bool {
        let Some(current) = self.node(id).map(|n| n.rotation) else {
            return false;
        };
        self.set_rotation(id, next_rotation(current, direction))
    }

    /// Set a node's rotation in degrees and re-place its ports.
    pub fn set_rotation(&mut self, id: ElementId, degrees: f64) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        match self.node_mut(id) {
            Some(node) => node.rotation = degrees,
            None => return false,
        }
        log::debug!("node {id} rotation -> {degrees}");
        self.apply_port_transforms(idx);
        true
    }

    /// Toggle a flip. Returns `false` (and changes nothing) when the node is
    /// unknown or does not support flipping on that axis.
    pub fn toggle_flip(&mut self, id: ElementId, axis: FlipAxis) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        let (offset, enabled) = match axis {
            FlipAxis::Horizontal => (node.flip_horizontal, &mut node.flip_horizontal_enabled),
            FlipAxis::Vertical => (node.flip_vertical, &mut node.flip_vertical_enabled),
        };
        if offset.is_none() {
            log::debug!("node {id} does not support {axis:?} flip");
            return false;
        }
        *enabled = !*enabled;
        self.apply_port_transforms(idx);
        true
    }

    /// Set the flip offsets a node supports (`None` disables that axis).
    pub fn set_flip_offsets(
        &mut self,
        id: ElementId,
        horizontal: Option<f64>,
        vertical: Option<f64>,
    ) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        node.flip_horizontal = horizontal;
        node.flip_vertical = vertical;
        if horizontal.is_none() {
            node.flip_horizontal_enabled = false;
        }
        if vertical.is_none() {
            node.flip_vertical_enabled = false;
        }
        self.apply_port_transforms(idx);
        true
    }

    /// Recompute a node's ports from their baselines under its current
    /// rotation and flips.
    pub fn reapply_port_transforms(&mut self, id: ElementId) -> bool {
        match self.index_of(id) {
            Some(idx) if self.node(id).is_some() => {
                self.apply_port_transforms(idx);
                true
            }
            _ => false,
        }
    }

    /// Re-place every port of the node at `idx` from its baseline.
    ///
    /// A node in the identity state still goes through this so ports return
    /// exactly to their baselines.
    pub(crate) fn apply_port_transforms(&mut self, idx: NodeIndex) {
        let Some(params) = self
            .element(idx)
            .and_then(|e| e.as_node())
            .map(TransformParams::of)
        else {
            return;
        };
        for p in self.port_indices(idx) {
            if let Some(port) = self.port_mut_at(p) {
                if port.original_position.is_none() && is_identity(&params) {
                    continue;
                }
                params.apply(port);
            }
        }
    }
}

fn is_identity(params: &TransformParams) -> bool {
    geometry::is_neutral_rotation(params.rotation) && params.flip_x.is_none() && params.flip_y.is_none()
}

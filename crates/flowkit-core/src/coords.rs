//! Screen ↔ logical ↔ node-local coordinate conversion.
//!
//! Screen space is device pixels on the drawing surface. Logical space is
//! the diagram's own frame, independent of pan and zoom. Node-local space
//! has its origin at a node's top-left corner; container children store
//! positions in their parent's local space, so reaching logical space means
//! summing positions up the ancestor chain.

use crate::id::ElementId;
use crate::model::{Element, FlowGraph};
use kurbo::{Affine, Point, Vec2};

/// Anything that can report the live logical → screen matrix.
///
/// The matrix is re-read on every conversion; pan and zoom change while a
/// gesture is in flight.
pub trait ScreenTransform {
    /// Current logical → screen matrix, or `None` when it cannot be queried
    /// (e.g. the surface is not attached yet).
    fn screen_ctm(&self) -> Option<Affine>;

    /// Used when no matrix is available: `screen = logical + offset`.
    fn fallback_offset(&self) -> Vec2 {
        Vec2::ZERO
    }
}

fn usable(m: &Affine) -> bool {
    let det = m.determinant();
    det.is_finite() && det.abs() > f64::EPSILON
}

/// Convert a screen point to logical space.
pub fn screen_to_logical<S: ScreenTransform + ?Sized>(surface: &S, screen: Point) -> Point {
    match surface.screen_ctm().filter(usable) {
        Some(ctm) => ctm.inverse() * screen,
        None => {
            log::debug!("no usable screen transform; using fallback offset");
            screen - surface.fallback_offset()
        }
    }
}

/// Convert a logical point to screen space.
pub fn logical_to_screen<S: ScreenTransform + ?Sized>(surface: &S, logical: Point) -> Point {
    match surface.screen_ctm().filter(usable) {
        Some(ctm) => ctm * logical,
        None => logical + surface.fallback_offset(),
    }
}

/// Logical position of node `id`'s local origin: its own position plus
/// the positions of every enclosing container.
pub fn node_origin(graph: &FlowGraph, id: ElementId) -> Option<Point> {
    let idx = graph.index_of(id)?;
    let node = graph.element(idx)?.as_node()?;
    let offset = graph
        .ancestors(idx)
        .into_iter()
        .filter_map(|a| graph.element(a).and_then(Element::as_node))
        .fold(node.position.to_vec2(), |acc, n| acc + n.position.to_vec2());
    Some(offset.to_point())
}

/// A point in node `id`'s local frame, expressed in logical space.
pub fn local_to_logical(graph: &FlowGraph, id: ElementId, local: Point) -> Option<Point> {
    node_origin(graph, id).map(|origin| origin + local.to_vec2())
}

/// A logical point, expressed in node `id`'s local frame.
pub fn logical_to_local(graph: &FlowGraph, id: ElementId, logical: Point) -> Option<Point> {
    node_origin(graph, id).map(|origin| (logical - origin).to_point())
}

/// Logical centre of a port.
pub fn port_center(graph: &FlowGraph, port_id: ElementId) -> Option<Point> {
    let port = graph.port(port_id)?;
    let owner = graph.owner_of_port(port_id)?;
    local_to_logical(graph, owner, port.bounds().center())
}

/// Smallest zoom factor `Viewport` allows.
pub const MIN_ZOOM: f64 = 0.1;
/// Largest zoom factor `Viewport` allows.
pub const MAX_ZOOM: f64 = 8.0;

/// Pan and independent x/y zoom, for hosts that own their transform
/// rather than reading it back from a rendering surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Screen position of the logical origin.
    pub pan: Vec2,
    pub zoom_x: f64,
    pub zoom_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom_x: 1.0,
            zoom_y: 1.0,
        }
    }
}

impl Viewport {
    pub fn affine(&self) -> Affine {
        Affine::new([self.zoom_x, 0.0, 0.0, self.zoom_y, self.pan.x, self.pan.y])
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Scale both axes by `factor`, keeping the logical point under
    /// `screen` where it is.
    pub fn zoom_at(&mut self, screen: Point, factor: f64) {
        let anchor = screen_to_logical(self, screen);
        self.zoom_x = (self.zoom_x * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.zoom_y = (self.zoom_y * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = Vec2::new(
            screen.x - anchor.x * self.zoom_x,
            screen.y - anchor.y * self.zoom_y,
        );
    }
}

impl ScreenTransform for Viewport {
    fn screen_ctm(&self) -> Option<Affine> {
        Some(self.affine())
    }

    fn fallback_offset(&self) -> Vec2 {
        self.pan
    }
}

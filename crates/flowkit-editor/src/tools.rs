//! Tool system for canvas interactions.
//!
//! Each tool translates input events into `GraphMutation`s that the
//! editor applies through the `SyncEngine`. Tools never touch the model
//! directly; they see it only through the `Cursor` the editor builds for
//! each event (logical position plus hit-test result).
//!
//! ## Modifier behaviors
//!
//! | Modifier | Select Tool | Connect Tool |
//! |----------|-------------|--------------|
//! | **Shift** | Axis-constrain drag | — |

use crate::input::InputEvent;
use crate::sync::GraphMutation;
use flowkit_core::geometry::orthogonal_route;
use flowkit_core::{ElementId, Hit};
use kurbo::{BezPath, Point, Vec2};

/// Which tool owns the gesture in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Select,
    Connect,
}

/// Where an event landed, in logical space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    pub point: Point,
    pub hit: Option<Hit>,
}

impl Cursor {
    pub fn new(point: Point, hit: Option<Hit>) -> Self {
        Self { point, hit }
    }
}

/// Trait for tools that handle input and produce mutations.
pub trait Tool {
    fn kind(&self) -> ToolKind;

    /// Handle an input event, returning zero or more mutations.
    fn handle(&mut self, event: &InputEvent, cursor: &Cursor) -> Vec<GraphMutation>;

    /// Abandon any gesture in progress.
    fn cancel(&mut self);
}

// ─── Select Tool ─────────────────────────────────────────────────────────

/// Click to select a node, drag to move it.
#[derive(Debug)]
pub struct SelectTool {
    /// Currently selected node.
    pub selected: Option<ElementId>,
    /// Drag start, in logical space, while a drag is in progress.
    drag_origin: Option<Point>,
    /// Offset already emitted for the current drag.
    applied: Vec2,
}

impl Default for SelectTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectTool {
    pub fn new() -> Self {
        Self {
            selected: None,
            drag_origin: None,
            applied: Vec2::ZERO,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_origin.is_some()
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.cancel();
    }
}

/// With shift held, keep only the dominant axis of a drag.
fn constrain(total: Vec2, shift: bool) -> Vec2 {
    if !shift {
        total
    } else if total.x.abs() > total.y.abs() {
        Vec2::new(total.x, 0.0)
    } else {
        Vec2::new(0.0, total.y)
    }
}

impl Tool for SelectTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Select
    }

    fn handle(&mut self, event: &InputEvent, cursor: &Cursor) -> Vec<GraphMutation> {
        match event {
            InputEvent::PointerDown { .. } => {
                match cursor.hit {
                    Some(hit) => {
                        self.selected = Some(hit.node());
                        self.drag_origin = Some(cursor.point);
                        self.applied = Vec2::ZERO;
                    }
                    None => self.clear(),
                }
                vec![]
            }
            InputEvent::PointerMove { modifiers, .. } => {
                let (Some(origin), Some(id)) = (self.drag_origin, self.selected) else {
                    return vec![];
                };
                // Constrain the whole displacement, not each step, so
                // toggling shift mid-drag snaps back onto the axis.
                let target = constrain(cursor.point - origin, modifiers.shift);
                let delta = target - self.applied;
                if delta == Vec2::ZERO {
                    return vec![];
                }
                self.applied = target;
                vec![GraphMutation::MoveNode {
                    id,
                    dx: delta.x,
                    dy: delta.y,
                }]
            }
            InputEvent::PointerUp { .. } => {
                self.cancel();
                vec![]
            }
            InputEvent::Key { key, .. } if key == "Escape" => {
                self.clear();
                vec![]
            }
            InputEvent::Key { .. } => vec![],
        }
    }

    fn cancel(&mut self) {
        self.drag_origin = None;
        self.applied = Vec2::ZERO;
    }
}

// ─── Connect Tool ────────────────────────────────────────────────────────

/// Edge-creation state. `Completed` and `Cancelled` are transient: every
/// gesture ends back in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum ConnectState {
    #[default]
    Idle,
    Dragging {
        source: ElementId,
        /// Logical centre of the source port.
        origin: Point,
    },
}

/// Visual feedback for an edge being dragged.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectFeedback {
    /// Temporary H-V-H path from the source port to the pointer.
    pub path: BezPath,
    /// The input port under the pointer, to highlight.
    pub hovered_input: Option<ElementId>,
}

/// Drag from an output port to an input port to request an edge.
#[derive(Debug, Default)]
pub struct ConnectTool {
    state: ConnectState,
    feedback: Option<ConnectFeedback>,
}

/// Polyline through the points of an orthogonal route.
pub fn route_path(from: Point, to: Point) -> BezPath {
    let mut path = BezPath::new();
    let [start, rest @ ..] = orthogonal_route(from, to);
    path.move_to(start);
    for point in rest {
        path.line_to(point);
    }
    path
}

impl ConnectTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, ConnectState::Dragging { .. })
    }

    /// Source port of the drag in progress.
    pub fn source(&self) -> Option<ElementId> {
        match self.state {
            ConnectState::Dragging { source, .. } => Some(source),
            ConnectState::Idle => None,
        }
    }

    pub fn feedback(&self) -> Option<&ConnectFeedback> {
        self.feedback.as_ref()
    }
}

impl Tool for ConnectTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Connect
    }

    fn handle(&mut self, event: &InputEvent, cursor: &Cursor) -> Vec<GraphMutation> {
        match event {
            InputEvent::PointerDown { .. } => {
                if self.is_dragging() {
                    return vec![];
                }
                if let Some((source, origin)) = cursor.hit.and_then(|h| h.output_port()) {
                    log::debug!("edge drag started at {source}");
                    self.state = ConnectState::Dragging { source, origin };
                    self.feedback = Some(ConnectFeedback {
                        path: route_path(origin, origin),
                        hovered_input: None,
                    });
                }
                vec![]
            }
            InputEvent::PointerMove { .. } => {
                if let ConnectState::Dragging { origin, .. } = self.state {
                    self.feedback = Some(ConnectFeedback {
                        path: route_path(origin, cursor.point),
                        hovered_input: cursor.hit.and_then(|h| h.input_port()),
                    });
                }
                vec![]
            }
            InputEvent::PointerUp { .. } => {
                // Reset before deciding, so no exit path leaves state behind.
                let state = std::mem::take(&mut self.state);
                self.feedback = None;
                let ConnectState::Dragging { source, .. } = state else {
                    return vec![];
                };
                match cursor.hit.and_then(|h| h.input_port()) {
                    Some(target) => vec![GraphMutation::AddEdge { source, target }],
                    None => {
                        log::debug!("edge drag from {source} cancelled: no input port under pointer");
                        vec![]
                    }
                }
            }
            InputEvent::Key { key, .. } if key == "Escape" => {
                self.cancel();
                vec![]
            }
            InputEvent::Key { .. } => vec![],
        }
    }

    fn cancel(&mut self) {
        if self.is_dragging() {
            log::debug!("edge drag cancelled");
        }
        self.state = ConnectState::Idle;
        self.feedback = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use flowkit_core::PortDirection;
    use kurbo::PathEl;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> ElementId {
        ElementId::intern(s)
    }

    fn at(x: f64, y: f64, hit: Option<Hit>) -> Cursor {
        Cursor::new(Point::new(x, y), hit)
    }

    fn output(name: &str, x: f64, y: f64) -> Option<Hit> {
        Some(Hit::Port {
            id: id(name),
            owner: id("src"),
            direction: PortDirection::Output,
            center: Point::new(x, y),
        })
    }

    fn input(name: &str) -> Option<Hit> {
        Some(Hit::Port {
            id: id(name),
            owner: id("dst"),
            direction: PortDirection::Input,
            center: Point::ZERO,
        })
    }

    // ─── Select ──────────────────────────────────────────────────────────

    #[test]
    fn drag_emits_incremental_moves() {
        let mut tool = SelectTool::new();
        let node = Some(Hit::Node { id: id("box") });
        tool.handle(&InputEvent::pointer_down(10.0, 10.0), &at(10.0, 10.0, node));
        assert_eq!(tool.selected, Some(id("box")));

        let first = tool.handle(&InputEvent::pointer_move(15.0, 12.0), &at(15.0, 12.0, None));
        let second = tool.handle(&InputEvent::pointer_move(20.0, 20.0), &at(20.0, 20.0, None));
        let deltas: Vec<(f64, f64)> = first
            .iter()
            .chain(&second)
            .map(|m| match m {
                GraphMutation::MoveNode { dx, dy, .. } => (*dx, *dy),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(deltas, vec![(5.0, 2.0), (5.0, 8.0)]);

        tool.handle(&InputEvent::pointer_up(20.0, 20.0), &at(20.0, 20.0, None));
        assert!(!tool.is_dragging());
        assert_eq!(tool.selected, Some(id("box")));
    }

    #[test]
    fn shift_constrains_to_dominant_axis() {
        let mut tool = SelectTool::new();
        tool.handle(
            &InputEvent::pointer_down(0.0, 0.0),
            &at(0.0, 0.0, Some(Hit::Node { id: id("box") })),
        );
        let moved = tool.handle(
            &InputEvent::pointer_move(30.0, 10.0).with_modifiers(Modifiers::SHIFT),
            &at(30.0, 10.0, None),
        );
        assert!(matches!(moved[..], [GraphMutation::MoveNode { dx, dy, .. }] if dx == 30.0 && dy == 0.0));
    }

    #[test]
    fn clicking_background_clears_selection() {
        let mut tool = SelectTool::new();
        tool.selected = Some(id("box"));
        tool.handle(&InputEvent::pointer_down(0.0, 0.0), &at(0.0, 0.0, None));
        assert_eq!(tool.selected, None);
        assert!(tool.handle(&InputEvent::pointer_move(5.0, 5.0), &at(5.0, 5.0, None)).is_empty());
    }

    // ─── Connect ─────────────────────────────────────────────────────────

    #[test]
    fn press_on_output_starts_drag() {
        let mut tool = ConnectTool::new();
        tool.handle(&InputEvent::pointer_down(0.0, 0.0), &at(121.0, 30.0, output("src-out", 120.0, 30.0)));
        assert_eq!(tool.source(), Some(id("src-out")));
        assert!(tool.feedback().is_some());
    }

    #[test]
    fn press_on_input_does_nothing() {
        let mut tool = ConnectTool::new();
        tool.handle(&InputEvent::pointer_down(0.0, 0.0), &at(0.0, 0.0, input("dst-in")));
        assert!(!tool.is_dragging());
        assert!(tool.feedback().is_none());
    }

    #[test]
    fn move_routes_and_highlights_inputs_only() {
        let mut tool = ConnectTool::new();
        tool.handle(&InputEvent::pointer_down(0.0, 0.0), &at(0.0, 0.0, output("src-out", 0.0, 0.0)));

        tool.handle(&InputEvent::pointer_move(0.0, 0.0), &at(100.0, 40.0, input("dst-in")));
        let fb = tool.feedback().unwrap();
        assert_eq!(fb.hovered_input, Some(id("dst-in")));
        let points: Vec<Point> = fb
            .path
            .elements()
            .iter()
            .filter_map(|el| match el {
                PathEl::MoveTo(p) | PathEl::LineTo(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(
            points,
            vec![
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                Point::new(50.0, 40.0),
                Point::new(100.0, 40.0)
            ]
        );

        tool.handle(&InputEvent::pointer_move(0.0, 0.0), &at(80.0, 0.0, output("other-out", 80.0, 0.0)));
        assert_eq!(tool.feedback().unwrap().hovered_input, None);
    }

    #[test]
    fn release_over_input_requests_edge() {
        let mut tool = ConnectTool::new();
        tool.handle(&InputEvent::pointer_down(0.0, 0.0), &at(0.0, 0.0, output("src-out", 0.0, 0.0)));
        let out = tool.handle(&InputEvent::pointer_up(0.0, 0.0), &at(90.0, 0.0, input("dst-in")));
        assert!(matches!(
            out[..],
            [GraphMutation::AddEdge { source, target }] if source == id("src-out") && target == id("dst-in")
        ));
        assert!(!tool.is_dragging());
        assert!(tool.feedback().is_none());
    }

    #[test]
    fn release_elsewhere_cancels() {
        let mut tool = ConnectTool::new();
        tool.handle(&InputEvent::pointer_down(0.0, 0.0), &at(0.0, 0.0, output("src-out", 0.0, 0.0)));
        let out = tool.handle(&InputEvent::pointer_up(0.0, 0.0), &at(50.0, 50.0, output("x-out", 50.0, 50.0)));
        assert!(out.is_empty());
        assert!(!tool.is_dragging());
        assert!(tool.feedback().is_none());
    }

    #[test]
    fn escape_cancels_and_clears_feedback() {
        let mut tool = ConnectTool::new();
        tool.handle(&InputEvent::pointer_down(0.0, 0.0), &at(0.0, 0.0, output("src-out", 0.0, 0.0)));
        tool.handle(&InputEvent::pointer_move(0.0, 0.0), &at(40.0, 0.0, None));
        tool.handle(&InputEvent::key("Escape"), &at(40.0, 0.0, None));
        assert!(!tool.is_dragging());
        assert!(tool.feedback().is_none());

        // A release after cancelling produces nothing.
        assert!(tool
            .handle(&InputEvent::pointer_up(0.0, 0.0), &at(90.0, 0.0, input("dst-in")))
            .is_empty());
    }
}

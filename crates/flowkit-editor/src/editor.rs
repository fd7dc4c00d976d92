//! The editor controller: where gestures meet the model.
//!
//! Screen-space events come in from the host, are converted to logical
//! space against the live screen transform, hit-tested, and routed to the
//! tool that owns the gesture. A press on an output port hands the gesture
//! to the `ConnectTool`; any other press goes to the `SelectTool`.
//! Everything that changes the model goes through the `CommandStack`, so
//! each gesture or shortcut is one undo step.

use crate::commands::CommandStack;
use crate::input::InputEvent;
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use crate::sync::{Applied, GraphMutation, SyncEngine};
use crate::tools::{ConnectFeedback, ConnectTool, Cursor, SelectTool, Tool, ToolKind};
use flowkit_core::{
    EdgeOutcome, ElementId, FlipAxis, FlowGraph, GraphConfig, LoadError, RotateDirection, ScreenTransform,
    hit_test, screen_to_logical,
};
use kurbo::Point;

const HISTORY_DEPTH: usize = 200;

/// What the host should do after an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventResponse {
    /// The model changed; re-render and re-read the text.
    pub changed: bool,
    /// Set when the event ended an edge-creation gesture on an input port,
    /// whether the edge was accepted or not.
    pub edge: Option<EdgeOutcome>,
    /// A shortcut the editor leaves to the host (zoom).
    pub unhandled: Option<ShortcutAction>,
}

impl EventResponse {
    fn changed(changed: bool) -> Self {
        Self {
            changed,
            ..Self::default()
        }
    }
}

/// Interactive editing session over one diagram.
#[derive(Debug)]
pub struct Editor {
    engine: SyncEngine,
    history: CommandStack,
    select: SelectTool,
    connect: ConnectTool,
    /// Tool that owns the gesture in progress.
    active: ToolKind,
    /// Last pointer position, in logical space.
    cursor: Point,
}

impl Editor {
    pub fn new(graph: FlowGraph) -> Self {
        Self::with_engine(SyncEngine::new(graph))
    }

    pub fn from_text(text: &str, config: GraphConfig) -> Result<Self, LoadError> {
        Ok(Self::with_engine(SyncEngine::from_text(text, config)?))
    }

    fn with_engine(engine: SyncEngine) -> Self {
        Self {
            engine,
            history: CommandStack::new(HISTORY_DEPTH),
            select: SelectTool::new(),
            connect: ConnectTool::new(),
            active: ToolKind::Select,
            cursor: Point::ZERO,
        }
    }

    // ─── Model access ────────────────────────────────────────────────────

    pub fn graph(&self) -> &FlowGraph {
        self.engine.graph()
    }

    /// JSON text of the current model.
    pub fn text(&mut self) -> &str {
        self.engine.current_text()
    }

    /// Replace the model from JSON text, as one undo step. On error the
    /// model is untouched.
    pub fn set_text(&mut self, text: &str) -> Result<(), LoadError> {
        self.abandon_gesture();
        self.history
            .record(&mut self.engine, "Replace document", |engine| engine.set_text(text))?;
        self.forget_stale_selection();
        Ok(())
    }

    /// Apply a host-initiated mutation as one undo step.
    pub fn execute(&mut self, mutation: GraphMutation, description: &str) -> Applied {
        let applied = self.history.execute(&mut self.engine, mutation, description);
        if applied.changed() {
            self.forget_stale_selection();
        }
        applied
    }

    // ─── Selection and tool state ────────────────────────────────────────

    pub fn selected(&self) -> Option<ElementId> {
        self.select.selected
    }

    pub fn select(&mut self, id: Option<ElementId>) {
        self.select.selected = id.filter(|&id| self.engine.graph().node(id).is_some());
    }

    pub fn active_tool(&self) -> ToolKind {
        self.active
    }

    /// Path and highlight for an edge being dragged, in logical space.
    pub fn connect_feedback(&self) -> Option<&ConnectFeedback> {
        self.connect.feedback()
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> Option<String> {
        self.abandon_gesture();
        let description = self.history.undo(&mut self.engine);
        self.forget_stale_selection();
        description
    }

    pub fn redo(&mut self) -> Option<String> {
        self.abandon_gesture();
        let description = self.history.redo(&mut self.engine);
        self.forget_stale_selection();
        description
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ─── Event routing ───────────────────────────────────────────────────

    /// Handle one host event. Pointer coordinates are screen space; they
    /// are converted with the surface's transform as it is right now.
    pub fn handle_event<S: ScreenTransform + ?Sized>(&mut self, event: &InputEvent, surface: &S) -> EventResponse {
        match event {
            InputEvent::Key { key, modifiers } => match ShortcutMap::resolve(key, *modifiers) {
                Some(action) => self.run_shortcut(action),
                None => EventResponse::default(),
            },
            _ => {
                let Some(screen) = event.position() else {
                    return EventResponse::default();
                };
                let point = screen_to_logical(surface, screen);
                self.cursor = point;
                let cursor = Cursor::new(point, hit_test(self.engine.graph(), point));
                self.route_pointer(event, &cursor)
            }
        }
    }

    fn route_pointer(&mut self, event: &InputEvent, cursor: &Cursor) -> EventResponse {
        if let InputEvent::PointerDown { .. } = event {
            self.abandon_gesture();
            if cursor.hit.and_then(|h| h.output_port()).is_some() {
                self.active = ToolKind::Connect;
            } else {
                self.active = ToolKind::Select;
                if cursor.hit.is_some() {
                    self.history.begin_batch(&self.engine, "Move node");
                }
            }
        }

        let mutations = match self.active {
            ToolKind::Connect => self.connect.handle(event, cursor),
            ToolKind::Select => self.select.handle(event, cursor),
        };

        let mut response = EventResponse::default();
        for mutation in mutations {
            let description = match &mutation {
                GraphMutation::AddEdge { .. } => "Connect ports",
                _ => "Move node",
            };
            let applied = self.history.execute(&mut self.engine, mutation, description);
            response.changed |= applied.changed();
            if let Applied::Edge(outcome) = applied {
                if !outcome.success {
                    log::debug!("edge refused: {}", outcome.message);
                }
                response.edge = Some(outcome);
            }
        }

        if let InputEvent::PointerUp { .. } = event {
            self.history.end_batch(&self.engine);
            self.active = ToolKind::Select;
        }
        response
    }

    /// Drop whatever gesture is in flight, keeping the selection.
    fn abandon_gesture(&mut self) {
        self.connect.cancel();
        self.select.cancel();
        while self.history.in_batch() {
            self.history.end_batch(&self.engine);
        }
        self.active = ToolKind::Select;
    }

    fn forget_stale_selection(&mut self) {
        if let Some(id) = self.select.selected
            && self.engine.graph().node(id).is_none()
        {
            self.select.clear();
        }
    }

    // ─── Shortcuts ───────────────────────────────────────────────────────

    fn run_shortcut(&mut self, action: ShortcutAction) -> EventResponse {
        match action {
            ShortcutAction::Cancel => {
                if self.connect.is_dragging() {
                    self.abandon_gesture();
                } else {
                    self.select.clear();
                }
                EventResponse::default()
            }
            ShortcutAction::Undo => EventResponse::changed(self.undo().is_some()),
            ShortcutAction::Redo => EventResponse::changed(self.redo().is_some()),
            ShortcutAction::Delete => self.on_selection("Delete node", |id| GraphMutation::RemoveNode { id }),
            ShortcutAction::RotateRight => self.on_selection("Rotate node", |id| GraphMutation::RotateNode {
                id,
                direction: RotateDirection::Right,
            }),
            ShortcutAction::RotateLeft => self.on_selection("Rotate node", |id| GraphMutation::RotateNode {
                id,
                direction: RotateDirection::Left,
            }),
            ShortcutAction::FlipHorizontal => self.on_selection("Flip node", |id| GraphMutation::FlipNode {
                id,
                axis: FlipAxis::Horizontal,
            }),
            ShortcutAction::FlipVertical => self.on_selection("Flip node", |id| GraphMutation::FlipNode {
                id,
                axis: FlipAxis::Vertical,
            }),
            ShortcutAction::ZoomIn | ShortcutAction::ZoomOut | ShortcutAction::ZoomReset => EventResponse {
                unhandled: Some(action),
                ..EventResponse::default()
            },
        }
    }

    fn on_selection(&mut self, description: &str, make: impl FnOnce(ElementId) -> GraphMutation) -> EventResponse {
        let Some(id) = self.select.selected else {
            return EventResponse::default();
        };
        self.abandon_gesture();
        EventResponse::changed(self.execute(make(id), description).changed())
    }

    /// Logical position of the last pointer event.
    pub fn cursor(&self) -> Point {
        self.cursor
    }
}

//! Bidirectional sync between the diagram model and its JSON text.
//!
//! The `SyncEngine` holds the authoritative `FlowGraph` and the JSON text
//! kept alongside it. Canvas interactions go through `apply_mutation`,
//! which marks the text stale; the text is re-emitted lazily on
//! `flush_to_text`. A text edit replaces the whole graph through
//! `set_text`, which either succeeds or leaves both sides untouched.

use flowkit_core::document::GraphDocument;
use flowkit_core::{
    EdgeOutcome, ElementId, FlipAxis, FlowGraph, GraphConfig, LoadError, ModelError, NodeTemplate,
    RotateDirection,
};
use kurbo::Vec2;

/// The sync engine: holds the graph and its JSON text in lock-step.
#[derive(Debug)]
pub struct SyncEngine {
    graph: FlowGraph,
    text: String,
    /// Graph changed since the text was last emitted.
    text_dirty: bool,
}

impl SyncEngine {
    /// Create from JSON text, parsing it into a graph.
    pub fn from_text(text: &str, config: GraphConfig) -> Result<Self, LoadError> {
        let graph = FlowGraph::from_json(text, config)?;
        Ok(Self {
            graph,
            text: text.to_string(),
            text_dirty: false,
        })
    }

    /// Create from an existing graph. The text is emitted on first flush.
    pub fn new(graph: FlowGraph) -> Self {
        Self {
            graph,
            text: String::new(),
            text_dirty: true,
        }
    }

    /// Read-only view of the model.
    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    // ─── Canvas → Text direction ─────────────────────────────────────────

    /// Apply a mutation from the canvas. Missing ids are ignored, never
    /// an error.
    pub fn apply_mutation(&mut self, mutation: GraphMutation) -> Applied {
        let applied = match mutation {
            GraphMutation::AddNode { parent, template } => match self.graph.insert(parent, *template) {
                Ok(_) => Applied::Changed,
                Err(e) => {
                    log::warn!("add node rejected: {e}");
                    Applied::Rejected(e)
                }
            },
            GraphMutation::RemoveNode { id } => Applied::from_flag(self.graph.remove_node(id)),
            GraphMutation::MoveNode { id, dx, dy } => {
                let moved = match self.graph.node(id) {
                    Some(node) => {
                        let to = node.position + Vec2::new(dx, dy);
                        self.graph.update_node_position(id, to.x, to.y)
                    }
                    None => false,
                };
                Applied::from_flag(moved)
            }
            GraphMutation::SetPosition { id, x, y } => {
                Applied::from_flag(self.graph.update_node_position(id, x, y))
            }
            GraphMutation::ResizeNode { id, width, height } => {
                Applied::from_flag(self.graph.update_node_size(id, width, height))
            }
            GraphMutation::RotateNode { id, direction } => {
                Applied::from_flag(self.graph.rotate_node(id, direction))
            }
            GraphMutation::FlipNode { id, axis } => Applied::from_flag(self.graph.toggle_flip(id, axis)),
            GraphMutation::AddEdge { source, target } => {
                Applied::Edge(self.graph.connect(source, target))
            }
            GraphMutation::RemoveEdge { id } => Applied::from_flag(self.graph.remove_edge(id)),
        };

        if applied.changed() {
            self.text_dirty = true;
        }
        applied
    }

    /// Re-emit the text from the current graph state.
    /// Called after a batch of mutations (e.g. at the end of a drag).
    pub fn flush_to_text(&mut self) {
        if !self.text_dirty {
            return;
        }
        match self.graph.to_json() {
            Ok(text) => {
                self.text = text;
                self.text_dirty = false;
            }
            Err(e) => log::warn!("could not serialize graph: {e}"),
        }
    }

    // ─── Text → Canvas direction ─────────────────────────────────────────

    /// Replace the entire text and re-parse it into the graph.
    /// On error neither the graph nor the text changes.
    pub fn set_text(&mut self, new_text: &str) -> Result<(), LoadError> {
        self.graph.load_from_json(new_text)?;
        self.text = new_text.to_string();
        self.text_dirty = false;
        Ok(())
    }

    // ─── Snapshots ───────────────────────────────────────────────────────

    /// The model as a detached document, for history snapshots.
    pub fn snapshot(&self) -> GraphDocument {
        self.graph.to_document()
    }

    /// Replace the model with a previously captured snapshot.
    ///
    /// The edge counter never goes back: ids handed out before the restore
    /// are not reissued.
    pub fn restore(&mut self, doc: GraphDocument) -> Result<(), LoadError> {
        let counter = self.graph.edge_counter();
        self.graph.replace_with(doc)?;
        self.graph.reserve_edge_ids(counter);
        self.text_dirty = true;
        Ok(())
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Get current text (synced).
    pub fn current_text(&mut self) -> &str {
        self.flush_to_text();
        &self.text
    }

    pub fn is_text_dirty(&self) -> bool {
        self.text_dirty
    }
}

/// A mutation that can be applied to the model from canvas interactions
/// or host calls.
#[derive(Debug, Clone)]
pub enum GraphMutation {
    /// Insert a node subtree, at the top level when `parent` is `None`.
    AddNode {
        parent: Option<ElementId>,
        template: Box<NodeTemplate>,
    },
    RemoveNode {
        id: ElementId,
    },
    /// Move by a delta in the node's parent frame.
    MoveNode {
        id: ElementId,
        dx: f64,
        dy: f64,
    },
    SetPosition {
        id: ElementId,
        x: f64,
        y: f64,
    },
    ResizeNode {
        id: ElementId,
        width: f64,
        height: f64,
    },
    RotateNode {
        id: ElementId,
        direction: RotateDirection,
    },
    FlipNode {
        id: ElementId,
        axis: FlipAxis,
    },
    AddEdge {
        source: ElementId,
        target: ElementId,
    },
    RemoveEdge {
        id: ElementId,
    },
}

/// What applying a mutation did.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Changed,
    /// Unknown id, unsupported flip, non-positive size: nothing happened.
    Ignored,
    /// Result of an `AddEdge`, successful or not.
    Edge(EdgeOutcome),
    /// `AddNode` refused the template.
    Rejected(ModelError),
}

impl Applied {
    fn from_flag(changed: bool) -> Self {
        if changed { Applied::Changed } else { Applied::Ignored }
    }

    /// Whether the model changed.
    pub fn changed(&self) -> bool {
        match self {
            Applied::Changed => true,
            Applied::Edge(outcome) => outcome.success,
            Applied::Ignored | Applied::Rejected(_) => false,
        }
    }

    pub fn edge_outcome(&self) -> Option<&EdgeOutcome> {
        match self {
            Applied::Edge(outcome) => Some(outcome),
            _ => None,
        }
    }
}

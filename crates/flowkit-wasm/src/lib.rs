//! WASM bridge for flowkit: exposes the diagram core to a JavaScript host.
//!
//! Compiled via `wasm-pack build --target web`. The host owns rendering and
//! chrome; it forwards pointer and key events here, calls the model
//! operations below, and re-reads the JSON model whenever a call reports a
//! change.

mod surface;

use flowkit_core::{
    EdgeOutcome, ElementId, FlipAxis, FlowGraph, GraphConfig, NodeSpec, RotateDirection, SvgImport, create_node,
    create_node_with_ports, create_package_node, example_package, import_svg_node, lint_graph,
    screen_to_logical,
};
use flowkit_editor::{Editor, EventResponse, GraphMutation, InputEvent, Modifiers, ShortcutAction};
use kurbo::{Point, Vec2};
use serde::Serialize;
use surface::SvgSurface;
use wasm_bindgen::prelude::*;

/// The main WASM-facing canvas controller.
///
/// Holds the editor session and the drawing surface. All interaction from
/// the host goes through this struct.
#[wasm_bindgen]
pub struct FlowCanvas {
    editor: Editor,
    surface: SvgSurface,
}

#[wasm_bindgen]
impl FlowCanvas {
    /// Create an empty diagram. `config_json` may be empty; missing fields
    /// take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(graph_id: &str, config_json: &str) -> Result<FlowCanvas, JsValue> {
        // Set up panic hook for better error messages in console
        console_error_panic_hook_setup();

        let config = if config_json.trim().is_empty() {
            GraphConfig::default()
        } else {
            GraphConfig::from_json(config_json).map_err(to_js)?
        };
        Ok(Self {
            editor: Editor::new(FlowGraph::with_config(graph_id, config)),
            surface: SvgSurface::default(),
        })
    }

    // ─── Surface ─────────────────────────────────────────────────────────

    /// Attach the SVG element whose screen CTM maps logical to screen space.
    pub fn attach_surface(&mut self, element: web_sys::SvgGraphicsElement) {
        self.surface.attach(element);
    }

    pub fn detach_surface(&mut self) {
        self.surface.detach();
    }

    /// Screen offset used while no surface transform is available.
    pub fn set_fallback_offset(&mut self, x: f64, y: f64) {
        self.surface.set_fallback_offset(Vec2::new(x, y));
    }

    /// Convert a screen point to logical space. Returns `[x, y]`.
    pub fn to_logical(&self, x: f64, y: f64) -> Vec<f64> {
        let p = screen_to_logical(&self.surface, Point::new(x, y));
        vec![p.x, p.y]
    }

    // ─── Model ───────────────────────────────────────────────────────────

    /// The current JSON model.
    pub fn get_model(&mut self) -> String {
        self.editor.text().to_string()
    }

    /// Replace the model from JSON. On error the model is unchanged and the
    /// error message is thrown.
    pub fn set_model(&mut self, json: &str) -> Result<(), JsValue> {
        self.editor.set_text(json).map_err(to_js)
    }

    /// Add a process node from a JSON `NodeSpec`. With a `ports` list the
    /// ports are laid out from it; otherwise the `input`/`output` flags
    /// add a single in/out pair. Returns the node id.
    pub fn add_node(&mut self, spec_json: &str, parent_id: Option<String>) -> Result<String, JsValue> {
        let spec: NodeSpec = serde_json::from_str(spec_json).map_err(to_js)?;
        let template = if spec.ports.is_empty() {
            create_node(&spec)
        } else {
            create_node_with_ports(&spec)
        };
        self.insert(parent_id, template, "Add node")?;
        Ok(spec.id)
    }

    /// Add an empty package node from a JSON `NodeSpec`.
    pub fn add_package(&mut self, spec_json: &str, parent_id: Option<String>) -> Result<String, JsValue> {
        let spec: NodeSpec = serde_json::from_str(spec_json).map_err(to_js)?;
        self.insert(parent_id, create_package_node(&spec, Vec::new()), "Add package")?;
        Ok(spec.id)
    }

    /// Add a package pre-populated with two example steps.
    pub fn add_example_package(&mut self, id: &str, x: f64, y: f64) -> Result<(), JsValue> {
        self.insert(None, example_package(id, x, y), "Add package")
    }

    /// Import a vector-art payload dropped at `(x, y)` as a node, with
    /// ports discovered from its markers.
    #[allow(clippy::too_many_arguments)]
    pub fn import_svg(
        &mut self,
        id: &str,
        x: f64,
        y: f64,
        payload: &str,
        flip_horizontal: Option<f64>,
        flip_vertical: Option<f64>,
        parent_id: Option<String>,
    ) -> Result<(), JsValue> {
        let request =
            SvgImport::new(id, Point::new(x, y), payload).with_flips(flip_horizontal, flip_vertical);
        let template = import_svg_node(&request, self.editor.graph().config()).map_err(to_js)?;
        self.insert(parent_id, template, "Import vector art")
    }

    pub fn update_node_position(&mut self, id: &str, x: f64, y: f64) -> bool {
        self.run(
            GraphMutation::SetPosition {
                id: ElementId::intern(id),
                x,
                y,
            },
            "Move node",
        )
    }

    pub fn update_node_size(&mut self, id: &str, width: f64, height: f64) -> bool {
        self.run(
            GraphMutation::ResizeNode {
                id: ElementId::intern(id),
                width,
                height,
            },
            "Resize node",
        )
    }

    /// `direction` is `"left"` or `"right"`.
    pub fn rotate_node(&mut self, id: &str, direction: &str) -> bool {
        let direction = match direction {
            "left" => RotateDirection::Left,
            "right" => RotateDirection::Right,
            other => {
                log::warn!("unknown rotation direction '{other}'");
                return false;
            }
        };
        self.run(
            GraphMutation::RotateNode {
                id: ElementId::intern(id),
                direction,
            },
            "Rotate node",
        )
    }

    /// `axis` is `"horizontal"` or `"vertical"`. Returns `false` when the
    /// node does not support that flip.
    pub fn toggle_flip(&mut self, id: &str, axis: &str) -> bool {
        let axis = match axis {
            "horizontal" => FlipAxis::Horizontal,
            "vertical" => FlipAxis::Vertical,
            other => {
                log::warn!("unknown flip axis '{other}'");
                return false;
            }
        };
        self.run(
            GraphMutation::FlipNode {
                id: ElementId::intern(id),
                axis,
            },
            "Flip node",
        )
    }

    pub fn remove_node(&mut self, id: &str) -> bool {
        self.run(GraphMutation::RemoveNode { id: ElementId::intern(id) }, "Delete node")
    }

    /// Connect two ports. Returns `{"success":bool,"message":string}`
    /// (plus `edgeId` on success).
    pub fn add_edge(&mut self, source_id: &str, target_id: &str) -> String {
        let applied = self.editor.execute(
            GraphMutation::AddEdge {
                source: ElementId::intern(source_id),
                target: ElementId::intern(target_id),
            },
            "Connect ports",
        );
        match applied.edge_outcome() {
            Some(outcome) => serde_json::to_string(outcome).unwrap_or_else(|_| failure("serialization failed")),
            None => failure("edge was not applied"),
        }
    }

    pub fn remove_edge(&mut self, id: &str) -> bool {
        self.run(GraphMutation::RemoveEdge { id: ElementId::intern(id) }, "Delete edge")
    }

    /// Lint diagnostics as a JSON array.
    pub fn lint(&self) -> String {
        serde_json::to_string(&lint_graph(self.editor.graph())).unwrap_or_else(|_| "[]".to_string())
    }

    // ─── Selection & history ─────────────────────────────────────────────

    /// Get the selected node ID, or empty string.
    pub fn get_selected_id(&self) -> String {
        self.editor
            .selected()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default()
    }

    /// Select a node by id; an empty or unknown id clears the selection.
    pub fn select_by_id(&mut self, node_id: &str) -> bool {
        let id = (!node_id.is_empty()).then(|| ElementId::intern(node_id));
        self.editor.select(id);
        self.editor.selected().is_some()
    }

    pub fn undo(&mut self) -> bool {
        self.editor.undo().is_some()
    }

    pub fn redo(&mut self) -> bool {
        self.editor.redo().is_some()
    }

    // ─── Events ──────────────────────────────────────────────────────────

    /// Handle pointer down (screen coordinates). Returns a JSON response,
    /// see `handle_pointer_up`.
    pub fn handle_pointer_down(&mut self, x: f64, y: f64, shift: bool, ctrl: bool, alt: bool, meta: bool) -> String {
        let event = InputEvent::PointerDown {
            x,
            y,
            modifiers: modifiers(shift, ctrl, alt, meta),
        };
        self.dispatch(&event)
    }

    pub fn handle_pointer_move(&mut self, x: f64, y: f64, shift: bool, ctrl: bool, alt: bool, meta: bool) -> String {
        let event = InputEvent::PointerMove {
            x,
            y,
            modifiers: modifiers(shift, ctrl, alt, meta),
        };
        self.dispatch(&event)
    }

    /// Handle pointer up. Returns
    /// `{"changed":bool,"edge":{success,message}|null,"hostAction":string|null}`;
    /// `edge` is set when an edge drag ended on an input port.
    pub fn handle_pointer_up(&mut self, x: f64, y: f64, shift: bool, ctrl: bool, alt: bool, meta: bool) -> String {
        let event = InputEvent::PointerUp {
            x,
            y,
            modifiers: modifiers(shift, ctrl, alt, meta),
        };
        self.dispatch(&event)
    }

    /// Handle a key press (DOM `KeyboardEvent.key`). Zoom shortcuts come
    /// back as `hostAction` for the host to apply.
    pub fn handle_key(&mut self, key: &str, shift: bool, ctrl: bool, alt: bool, meta: bool) -> String {
        let event = InputEvent::Key {
            key: key.to_string(),
            modifiers: modifiers(shift, ctrl, alt, meta),
        };
        self.dispatch(&event)
    }

    /// Feedback for an edge being dragged:
    /// `{"path":"M..","hoveredInput":string|null}` in logical space, or
    /// `null` when no drag is in progress.
    pub fn get_connect_feedback(&self) -> String {
        let view = self.editor.connect_feedback().map(|fb| FeedbackView {
            path: fb.path.to_svg(),
            hovered_input: fb.hovered_input,
        });
        serde_json::to_string(&view).unwrap_or_else(|_| "null".to_string())
    }
}

impl FlowCanvas {
    fn insert(
        &mut self,
        parent_id: Option<String>,
        template: flowkit_core::NodeTemplate,
        description: &str,
    ) -> Result<(), JsValue> {
        let parent = parent_id
            .filter(|p| !p.is_empty())
            .map(|p| ElementId::intern(&p));
        let applied = self.editor.execute(
            GraphMutation::AddNode {
                parent,
                template: Box::new(template),
            },
            description,
        );
        match applied {
            flowkit_editor::Applied::Rejected(e) => Err(to_js(e)),
            _ => Ok(()),
        }
    }

    fn run(&mut self, mutation: GraphMutation, description: &str) -> bool {
        self.editor.execute(mutation, description).changed()
    }

    fn dispatch(&mut self, event: &InputEvent) -> String {
        let response = self.editor.handle_event(event, &self.surface);
        response_json(&response)
    }
}

fn modifiers(shift: bool, ctrl: bool, alt: bool, meta: bool) -> Modifiers {
    Modifiers { shift, ctrl, alt, meta }
}

fn host_action(action: ShortcutAction) -> &'static str {
    match action {
        ShortcutAction::ZoomIn => "zoomIn",
        ShortcutAction::ZoomOut => "zoomOut",
        ShortcutAction::ZoomReset => "zoomReset",
        _ => "none",
    }
}

/// JSON shape of an event response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseView<'a> {
    changed: bool,
    edge: Option<&'a EdgeOutcome>,
    host_action: Option<&'static str>,
}

/// JSON shape of edge-drag feedback.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackView {
    path: String,
    hovered_input: Option<ElementId>,
}

fn response_json(response: &EventResponse) -> String {
    let view = ResponseView {
        changed: response.changed,
        edge: response.edge.as_ref(),
        host_action: response.unhandled.map(host_action),
    };
    serde_json::to_string(&view).unwrap_or_else(|_| r#"{"changed":false}"#.to_string())
}

fn failure(message: &str) -> String {
    serde_json::json!({ "success": false, "message": message }).to_string()
}

/// Thrown to the host as a JS `Error`.
fn to_js(e: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("flowkit WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Standalone functions (no canvas needed) ─────────────────────────────

/// Validate a JSON model. Returns `{"ok":true}` or `{"ok":false,"error":"..."}`.
#[wasm_bindgen]
pub fn validate(json: &str) -> String {
    match FlowGraph::from_json(json, GraphConfig::default()) {
        Ok(_) => r#"{"ok":true}"#.to_string(),
        Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }).to_string(),
    }
}

/// Lint a JSON model without loading it into a canvas. Returns a JSON
/// array of diagnostics, or `{"error":"..."}` if it does not load.
#[wasm_bindgen]
pub fn lint_model(json: &str) -> String {
    match FlowGraph::from_json(json, GraphConfig::default()) {
        Ok(graph) => serde_json::to_string(&lint_graph(&graph)).unwrap_or_else(|_| "[]".to_string()),
        Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
    }
}

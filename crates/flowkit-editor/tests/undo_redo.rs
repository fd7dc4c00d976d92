//! Integration tests: undo/redo through the editor (flowkit-editor).
//!
//! Tests the Editor + CommandStack + SyncEngine interaction, verifying
//! that gestures, shortcuts, and host mutations each land as one undo step
//! and that restoring a snapshot brings derived port geometry back too.

use flowkit_core::{ElementId, FlowGraph, GraphConfig, Viewport, lint_graph};
use flowkit_editor::{Editor, GraphMutation, InputEvent, Modifiers};
use kurbo::{Point, Size, Vec2};
use pretty_assertions::assert_eq;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn id(s: &str) -> ElementId {
    ElementId::intern(s)
}

fn editor() -> Editor {
    Editor::from_text(include_str!("fixtures/workbench.json"), GraphConfig::default())
        .expect("fixture should load")
}

fn position(ed: &Editor, node: &str) -> Point {
    ed.graph().node(id(node)).unwrap().position
}

fn port_position(ed: &Editor, port: &str) -> Point {
    ed.graph().port(id(port)).unwrap().position
}

fn click(ed: &mut Editor, x: f64, y: f64) {
    let view = Viewport::default();
    ed.handle_event(&InputEvent::pointer_down(x, y), &view);
    ed.handle_event(&InputEvent::pointer_up(x, y), &view);
}

fn press(ed: &mut Editor, key: &str) -> bool {
    ed.handle_event(&InputEvent::key(key), &Viewport::default()).changed
}

// ─── Drag gestures ──────────────────────────────────────────────────────

#[test]
fn drag_is_a_single_undo_step() {
    init();
    let mut ed = editor();
    let view = Viewport::default();

    ed.handle_event(&InputEvent::pointer_down(60.0, 30.0), &view);
    ed.handle_event(&InputEvent::pointer_move(70.0, 30.0), &view);
    ed.handle_event(&InputEvent::pointer_move(80.0, 40.0), &view);
    ed.handle_event(&InputEvent::pointer_move(90.0, 45.0), &view);
    ed.handle_event(&InputEvent::pointer_up(90.0, 45.0), &view);
    assert_eq!(position(&ed, "reader"), Point::new(30.0, 15.0));

    assert_eq!(ed.undo().as_deref(), Some("Move node"));
    assert_eq!(position(&ed, "reader"), Point::ZERO);
    assert!(!ed.can_undo());

    assert_eq!(ed.redo().as_deref(), Some("Move node"));
    assert_eq!(position(&ed, "reader"), Point::new(30.0, 15.0));
}

#[test]
fn shift_drag_stays_on_axis() {
    let mut ed = editor();
    let view = Viewport::default();
    ed.handle_event(&InputEvent::pointer_down(60.0, 30.0), &view);
    ed.handle_event(
        &InputEvent::pointer_move(100.0, 42.0).with_modifiers(Modifiers::SHIFT),
        &view,
    );
    ed.handle_event(&InputEvent::pointer_up(100.0, 42.0), &view);
    assert_eq!(position(&ed, "reader"), Point::new(40.0, 0.0));
}

#[test]
fn nested_node_moves_in_its_parent_frame() {
    let mut ed = editor();
    let view = Viewport {
        pan: Vec2::ZERO,
        zoom_x: 2.0,
        zoom_y: 2.0,
    };
    // Mixer body centre (160, 280) on screen is (320, 560).
    ed.handle_event(&InputEvent::pointer_down(320.0, 560.0), &view);
    ed.handle_event(&InputEvent::pointer_move(340.0, 580.0), &view);
    ed.handle_event(&InputEvent::pointer_up(340.0, 580.0), &view);

    assert_eq!(ed.selected(), Some(id("mixer")));
    assert_eq!(position(&ed, "mixer"), Point::new(110.0, 60.0));
    assert_eq!(position(&ed, "group"), Point::new(0.0, 200.0));
}

// ─── Shortcuts ──────────────────────────────────────────────────────────

#[test]
fn rotate_shortcut_round_trips_ports() {
    init();
    let mut ed = editor();
    click(&mut ed, 60.0, 30.0);

    assert!(press(&mut ed, "r"));
    assert_eq!(ed.graph().node(id("reader")).unwrap().rotation, 90.0);
    // Right-edge centre (120, 30) turned about (60, 30) → (60, 90).
    let turned = port_position(&ed, "reader-out");
    assert!((turned.x - 52.0).abs() < 1e-9 && (turned.y - 82.0).abs() < 1e-9, "{turned:?}");

    assert_eq!(ed.undo().as_deref(), Some("Rotate node"));
    assert_eq!(ed.graph().node(id("reader")).unwrap().rotation, 0.0);
    assert_eq!(port_position(&ed, "reader-out"), Point::new(112.0, 22.0));

    ed.redo();
    let again = port_position(&ed, "reader-out");
    assert!((again.x - 52.0).abs() < 1e-9 && (again.y - 82.0).abs() < 1e-9, "{again:?}");
}

#[test]
fn flip_shortcut_needs_flip_support() {
    let mut ed = editor();
    click(&mut ed, 60.0, 30.0);
    assert!(!press(&mut ed, "h"));
    assert!(!ed.can_undo());

    click(&mut ed, 360.0, 30.0);
    assert_eq!(ed.selected(), Some(id("writer")));
    assert!(press(&mut ed, "h"));
    // Mirrored about x = 120: the input moves to the right edge.
    assert_eq!(port_position(&ed, "writer-in"), Point::new(112.0, 22.0));

    assert!(press(&mut ed, "h"));
    assert_eq!(port_position(&ed, "writer-in"), Point::new(-8.0, 22.0));

    ed.undo();
    assert_eq!(port_position(&ed, "writer-in"), Point::new(112.0, 22.0));
}

#[test]
fn undo_and_redo_keys() {
    let mut ed = editor();
    click(&mut ed, 60.0, 30.0);
    press(&mut ed, "r");

    let undo = InputEvent::key("z").with_modifiers(Modifiers {
        meta: true,
        ..Modifiers::NONE
    });
    let redo = InputEvent::key("z").with_modifiers(Modifiers {
        meta: true,
        shift: true,
        ..Modifiers::NONE
    });
    let view = Viewport::default();

    assert!(ed.handle_event(&undo, &view).changed);
    assert_eq!(ed.graph().node(id("reader")).unwrap().rotation, 0.0);
    assert!(ed.handle_event(&redo, &view).changed);
    assert_eq!(ed.graph().node(id("reader")).unwrap().rotation, 90.0);
    assert!(!ed.handle_event(&redo, &view).changed);
}

// ─── Deletion ───────────────────────────────────────────────────────────

#[test]
fn delete_then_undo_restores_node_and_ports() {
    init();
    let mut ed = editor();
    ed.execute(
        GraphMutation::AddEdge {
            source: id("reader-out"),
            target: id("writer-in"),
        },
        "Connect ports",
    );

    click(&mut ed, 360.0, 30.0);
    assert!(press(&mut ed, "Delete"));
    assert!(ed.graph().node(id("writer")).is_none());
    assert_eq!(ed.selected(), None);

    // Edges outlive their ports unless cascading is configured.
    assert_eq!(ed.graph().edges().len(), 1);
    let rules: Vec<&str> = lint_graph(ed.graph()).iter().map(|d| d.rule).collect();
    assert!(rules.contains(&"dangling-edge"));

    assert_eq!(ed.undo().as_deref(), Some("Delete node"));
    assert_eq!(port_position(&ed, "writer-in"), Point::new(-8.0, 22.0));
    assert!(lint_graph(ed.graph()).iter().all(|d| d.rule != "dangling-edge"));
}

#[test]
fn undone_edge_ids_are_not_reissued() {
    let mut ed = editor();
    let connect = |ed: &mut Editor| {
        ed.execute(
            GraphMutation::AddEdge {
                source: id("reader-out"),
                target: id("writer-in"),
            },
            "Connect ports",
        )
        .edge_outcome()
        .and_then(|o| o.edge_id)
    };

    assert_eq!(connect(&mut ed), Some(id("edge-1")));
    ed.undo();
    assert!(ed.graph().edges().is_empty());
    assert_eq!(connect(&mut ed), Some(id("edge-2")));
}

// ─── Host mutations ─────────────────────────────────────────────────────

#[test]
fn resize_undo_restores_port_layout() {
    let mut ed = editor();
    let applied = ed.execute(
        GraphMutation::ResizeNode {
            id: id("writer"),
            width: 200.0,
            height: 100.0,
        },
        "Resize node",
    );
    assert!(applied.changed());
    assert_eq!(port_position(&ed, "writer-out"), Point::new(192.0, 42.0));

    ed.undo();
    assert_eq!(ed.graph().node(id("writer")).unwrap().size, Size::new(120.0, 60.0));
    assert_eq!(port_position(&ed, "writer-out"), Point::new(112.0, 22.0));
}

#[test]
fn replacing_the_text_is_undoable() {
    let mut ed = editor();
    let original = ed.graph().to_json().unwrap();

    ed.set_text(r#"{"type":"graph","id":"blank","children":[]}"#)
        .unwrap();
    assert_eq!(ed.graph().node_count(), 0);

    assert_eq!(ed.undo().as_deref(), Some("Replace document"));
    assert_eq!(ed.graph().id, id("workbench"));
    assert_eq!(ed.graph().to_json().unwrap(), original);
    assert_eq!(ed.text(), original);
}

#[test]
fn editor_over_built_graph_emits_text_lazily() {
    let ed_graph = FlowGraph::new("fresh");
    let mut ed = Editor::new(ed_graph);
    assert!(ed.text().contains("\"id\": \"fresh\""));
}

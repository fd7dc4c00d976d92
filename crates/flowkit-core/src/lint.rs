//! Lint diagnostics for flow graphs.
//!
//! Reports structural issues without modifying the graph. Deleting a node
//! leaves its edges behind unless cascading is configured; hosts surface
//! the result through these diagnostics.

use crate::id::ElementId;
use crate::model::{FlowGraph, PortDirection};
use serde::Serialize;
use std::collections::HashSet;

// ─── Diagnostic types ────────────────────────────────────────────────────

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    /// Should be fixed; likely a mistake.
    Warning,
    /// Informational.
    Info,
}

/// A single lint diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintDiagnostic {
    /// The edge or port this diagnostic refers to.
    pub element_id: ElementId,
    pub message: String,
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "dangling-edge").
    pub rule: &'static str,
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Run all lint rules over the graph.
#[must_use]
pub fn lint_graph(graph: &FlowGraph) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    lint_dangling_edges(graph, &mut diags);
    lint_direction_mismatch(graph, &mut diags);
    lint_unconnected_inputs(graph, &mut diags);
    diags
}

// ─── Rules ────────────────────────────────────────────────────────────────

fn lint_dangling_edges(graph: &FlowGraph, diags: &mut Vec<LintDiagnostic>) {
    for edge in graph.edges() {
        let missing: Vec<ElementId> = [edge.source_id, edge.target_id]
            .into_iter()
            .filter(|&p| graph.port(p).is_none())
            .collect();
        if missing.is_empty() {
            continue;
        }
        let names: Vec<&str> = missing.iter().map(|p| p.as_str()).collect();
        diags.push(LintDiagnostic {
            element_id: edge.id,
            message: format!("Edge `{}` references missing port(s): {}", edge.id, names.join(", ")),
            severity: LintSeverity::Warning,
            rule: "dangling-edge",
        });
    }
}

/// Edges should run output → input. The model accepts either; the edge tool
/// only ever creates output → input.
fn lint_direction_mismatch(graph: &FlowGraph, diags: &mut Vec<LintDiagnostic>) {
    for edge in graph.edges() {
        let (Some(source), Some(target)) = (graph.port(edge.source_id), graph.port(edge.target_id))
        else {
            continue;
        };
        if source.direction == PortDirection::Output && target.direction == PortDirection::Input {
            continue;
        }
        diags.push(LintDiagnostic {
            element_id: edge.id,
            message: format!(
                "Edge `{}` runs {} → {}; expected output → input",
                edge.id,
                source.direction.as_str(),
                target.direction.as_str()
            ),
            severity: LintSeverity::Warning,
            rule: "direction-mismatch",
        });
    }
}

fn lint_unconnected_inputs(graph: &FlowGraph, diags: &mut Vec<LintDiagnostic>) {
    let connected: HashSet<ElementId> = graph
        .edges()
        .iter()
        .flat_map(|e| [e.source_id, e.target_id])
        .collect();
    for node in graph.nodes() {
        for port in graph.ports_of(node.id) {
            if port.direction == PortDirection::Input && !connected.contains(&port.id) {
                diags.push(LintDiagnostic {
                    element_id: port.id,
                    message: format!("Input `{}` on `{}` is not connected", port.id, node.id),
                    severity: LintSeverity::Info,
                    rule: "unconnected-input",
                });
            }
        }
    }
}

//! Host-tunable behaviour of the graph model.

use serde::Deserialize;

/// Configuration for a `FlowGraph`.
///
/// Hosts usually pass this as JSON; every field has a default so a partial
/// (or empty) object is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphConfig {
    /// Remove edges that reference a node's ports when the node is deleted.
    /// Default: **false**; deleted nodes leave their edges in place so a
    /// host can restore the node and keep its connections.
    pub cascade_edge_delete: bool,

    /// Size used for imported vector art that declares neither a `viewBox`
    /// nor `width`/`height`. Default: 100 × 100.
    pub default_svg_width: f64,
    pub default_svg_height: f64,

    /// Pretty-print the JSON text kept in sync with the model. Default: **true**.
    pub pretty_json: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            cascade_edge_delete: false,
            default_svg_width: 100.0,
            default_svg_height: 100.0,
            pretty_json: true,
        }
    }
}

impl GraphConfig {
    /// Parse a config object from JSON, filling gaps with defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
